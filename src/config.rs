use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub wizard: WizardConfig,

    #[serde(default)]
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,
}

fn default_blob_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("persona-intake/blobs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_dir: default_blob_dir(),
        }
    }
}

/// Timing and retry knobs for the buffer-to-draft pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Quiet period after the last ungrouped photo before the single buffer is flushed.
    #[serde(default = "default_single_debounce_ms")]
    pub single_debounce_ms: u64,

    /// Quiet period after the last photo of a group before that group is flushed.
    #[serde(default = "default_group_debounce_ms")]
    pub group_debounce_ms: u64,

    /// Quiet period after the last commit before a results event is published.
    #[serde(default = "default_results_debounce_ms")]
    pub results_debounce_ms: u64,

    /// Maximum age of an in-memory pending photo.
    #[serde(default = "default_buffer_ttl_secs")]
    pub buffer_ttl_secs: u64,

    /// Maximum age of a photo parked in the durable overflow buffer.
    #[serde(default = "default_overflow_ttl_secs")]
    pub overflow_ttl_secs: u64,

    /// Bound applied to every storage/database call made during a flush.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// How long a flush waits for the per-user lock before re-queueing itself.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Storage attempts per photo before it is reported as failed.
    #[serde(default = "default_max_store_attempts")]
    pub max_store_attempts: u32,
}

fn default_single_debounce_ms() -> u64 {
    1500
}

fn default_group_debounce_ms() -> u64 {
    1500
}

fn default_results_debounce_ms() -> u64 {
    6000
}

fn default_buffer_ttl_secs() -> u64 {
    300
}

fn default_overflow_ttl_secs() -> u64 {
    300
}

fn default_store_timeout_ms() -> u64 {
    10_000
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

fn default_max_store_attempts() -> u32 {
    3
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            single_debounce_ms: default_single_debounce_ms(),
            group_debounce_ms: default_group_debounce_ms(),
            results_debounce_ms: default_results_debounce_ms(),
            buffer_ttl_secs: default_buffer_ttl_secs(),
            overflow_ttl_secs: default_overflow_ttl_secs(),
            store_timeout_ms: default_store_timeout_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_store_attempts: default_max_store_attempts(),
        }
    }
}

impl IngestConfig {
    pub fn single_debounce(&self) -> Duration {
        Duration::from_millis(self.single_debounce_ms)
    }

    pub fn group_debounce(&self) -> Duration {
        Duration::from_millis(self.group_debounce_ms)
    }

    pub fn results_debounce(&self) -> Duration {
        Duration::from_millis(self.results_debounce_ms)
    }

    pub fn buffer_ttl(&self) -> Duration {
        Duration::from_secs(self.buffer_ttl_secs)
    }

    pub fn overflow_ttl(&self) -> Duration {
        Duration::from_secs(self.overflow_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Allowed image formats, by canonical extension ("jpeg", "png", "webp", ...)
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    #[serde(default = "default_min_dimension")]
    pub min_width: u32,

    #[serde(default = "default_min_dimension")]
    pub min_height: u32,
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024 // 20MB
}

fn default_formats() -> Vec<String> {
    vec!["jpeg".to_string(), "png".to_string(), "webp".to_string()]
}

fn default_min_dimension() -> u32 {
    256
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            formats: default_formats(),
            min_width: default_min_dimension(),
            min_height: default_min_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Committed photos required before the type step is reachable.
    #[serde(default = "default_min_photos")]
    pub min_photos: usize,

    #[serde(default = "default_max_photos")]
    pub max_photos: usize,

    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

fn default_min_photos() -> usize {
    3
}

fn default_max_photos() -> usize {
    30
}

fn default_max_name_len() -> usize {
    64
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            min_photos: default_min_photos(),
            max_photos: default_max_photos(),
            max_name_len: default_max_name_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Minimum spacing between two successful gallery switches.
    #[serde(default = "default_nav_cooldown_ms")]
    pub nav_cooldown_ms: u64,
}

fn default_nav_cooldown_ms() -> u64 {
    700
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            nav_cooldown_ms: default_nav_cooldown_ms(),
        }
    }
}

impl GalleryConfig {
    pub fn nav_cooldown(&self) -> Duration {
        Duration::from_millis(self.nav_cooldown_ms)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("persona-intake")
        .join("persona.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage: StorageConfig::default(),
            ingest: IngestConfig::default(),
            validation: ValidationConfig::default(),
            wizard: WizardConfig::default(),
            gallery: GalleryConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path, writing defaults there if nothing exists yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("persona-intake")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PERSONA_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_documented_timings() {
        let config = Config::default();
        assert_eq!(config.ingest.single_debounce(), Duration::from_millis(1500));
        assert_eq!(config.ingest.results_debounce(), Duration::from_secs(6));
        assert_eq!(config.ingest.overflow_ttl(), Duration::from_secs(300));
        assert_eq!(config.gallery.nav_cooldown(), Duration::from_millis(700));
        assert_eq!(config.wizard.min_photos, 3);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ingest]
            single_debounce_ms = 250

            [wizard]
            min_photos = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.ingest.single_debounce_ms, 250);
        assert_eq!(config.ingest.group_debounce_ms, 1500);
        assert_eq!(config.wizard.min_photos, 5);
        assert_eq!(config.wizard.max_photos, 30);
        assert_eq!(config.validation.formats, vec!["jpeg", "png", "webp"]);
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.gallery.nav_cooldown_ms, 700);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.ingest.max_store_attempts, config.ingest.max_store_attempts);
    }
}
