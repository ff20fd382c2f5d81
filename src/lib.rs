pub mod blob;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod gallery;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod tasks;
pub mod wizard;

#[cfg(test)]
mod test_support;
