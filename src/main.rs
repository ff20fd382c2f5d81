use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use persona_intake::blob::FsBlobStore;
use persona_intake::config::Config;
use persona_intake::db::Database;
use persona_intake::discovery;
use persona_intake::logging;
use persona_intake::model::{Gender, IncomingPhoto, UserId};
use persona_intake::wizard::{Collaborators, EventReceiver, Wizard, WizardEvent};

struct Args {
    config_path: Option<PathBuf>,
    user_id: UserId,
    group: bool,
    early: bool,
    name: String,
    gender: Gender,
    dir: PathBuf,
}

fn value_after(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i + 1) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {} requires an argument", flag);
            std::process::exit(1);
        }
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut user_id = 1;
    let mut group = false;
    let mut early = false;
    let mut name = "Persona".to_string();
    let mut gender = Gender::Female;
    let mut dir = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("persona-intake {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value_after(&args, i, "--config")));
                i += 1;
            }
            "--user" | "-u" => {
                let raw = value_after(&args, i, "--user");
                user_id = raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: --user expects a numeric id, got {}", raw);
                    std::process::exit(1);
                });
                i += 1;
            }
            "--name" | "-n" => {
                name = value_after(&args, i, "--name");
                i += 1;
            }
            "--gender" | "-g" => {
                let raw = value_after(&args, i, "--gender");
                gender = Gender::parse(&raw).unwrap_or_else(|| {
                    eprintln!("Error: --gender expects male or female, got {}", raw);
                    std::process::exit(1);
                });
                i += 1;
            }
            "--group" => group = true,
            "--early" => early = true,
            arg if !arg.starts_with('-') && dir.is_none() => dir = Some(PathBuf::from(arg)),
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(dir) = dir else {
        eprintln!("Error: missing photo directory");
        print_help();
        std::process::exit(1);
    };

    Args {
        config_path,
        user_id,
        group,
        early,
        name,
        gender,
        dir,
    }
}

fn print_help() {
    println!(
        r#"persona-intake - feed a directory of photos through the persona wizard

USAGE:
    persona-intake [OPTIONS] DIR

OPTIONS:
    --config, -c PATH   Path to config file
    --user, -u ID       User id to run the wizard as (default 1)
    --group             Send all photos as one grouped send
    --early             Send photos before starting the wizard
    --name, -n NAME     Persona name (default "Persona")
    --gender, -g G      male or female (default female)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PERSONA_CONFIG      Path to config file (overrides default location)
    PERSONA_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/persona-intake/config.toml

Events are printed to stdout as JSON lines."#
    );
}

fn print_event(event: &WizardEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn print_pending(events: &mut EventReceiver) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }
    Ok(())
}

/// Print events until the user's results event arrives or `limit` passes.
async fn wait_for_results(events: &mut EventReceiver, user_id: UserId, limit: Duration) -> Result<bool> {
    let waited = tokio::time::timeout(limit, async {
        while let Some(event) = events.recv().await {
            print_event(&event)?;
            if matches!(event, WizardEvent::ResultsReady { user_id: u, .. } if u == user_id) {
                return Ok(true);
            }
        }
        Ok::<bool, anyhow::Error>(false)
    })
    .await;

    match waited {
        Ok(result) => result,
        Err(_) => Ok(false),
    }
}

async fn run(args: Args, config: Config, wizard: Wizard, mut events: EventReceiver) -> Result<()> {
    let user_id = args.user_id;
    let extensions = discovery::extensions_for(&config.validation.formats);
    let paths = discovery::discover_images(&args.dir, &extensions)?;
    if paths.is_empty() {
        bail!("no images found in {}", args.dir.display());
    }
    tracing::info!(count = paths.len(), dir = %args.dir.display(), "Sending photos");

    if !args.early {
        wizard.start(user_id).await?;
    }

    let group_id = args.group.then(|| format!("cli-{}", Utc::now().timestamp_millis()));
    for path in &paths {
        let payload = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let mut photo = IncomingPhoto::new(path.display().to_string(), payload);
        if let Some(group_id) = &group_id {
            photo = photo.in_group(group_id.clone());
        }
        wizard.on_photo_received(user_id, photo).await?;
    }

    if args.early {
        wizard.start(user_id).await?;
    }

    let ingest = &config.ingest;
    let limit = ingest.single_debounce().max(ingest.group_debounce())
        + ingest.results_debounce()
        + ingest.store_timeout();
    if !wait_for_results(&mut events, user_id, limit).await? {
        tracing::warn!(user_id, "No results event before the wait limit");
    }

    let finished = async {
        wizard.select_type(user_id).await?;
        wizard.choose_gender(user_id, args.gender).await?;
        wizard.submit_name(user_id, &args.name).await?;
        wizard.confirm(user_id).await
    }
    .await;

    if let Err(e) = finished {
        print_pending(&mut events)?;
        wizard.cancel(user_id).await?;
        print_pending(&mut events)?;
        return Err(e).context("Wizard did not finish");
    }

    print_pending(&mut events)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Arc::new(Database::open(&config.db_path).context("Failed to open database")?);
    db.initialize()?;
    let blobs = Arc::new(FsBlobStore::new(&config.storage));

    let (wizard, events) = Wizard::new(
        &config,
        Collaborators {
            drafts: db.clone(),
            overflow: db,
            blobs,
        },
    );
    wizard.sweep_overflow().await?;

    let result = run(args, config, wizard.clone(), events).await;
    wizard.shutdown();
    result
}
