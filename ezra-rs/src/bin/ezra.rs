//! CLI for ezra-rs: ids, dot-notation lookups over JSON files, environment and platform boot.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ezra_rs::util::{array_dot, data_get, env, uuid, uuid4};
use ezra_rs::platform::CONFIG_FILE;
use ezra_rs::{init_logging, ActionCallback, Config, LoggingConfig, Platform, BOOT_ACTION, DEFAULT_PRIORITY};
use serde_json::Value;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "ezra")]
#[command(about = "Ezra Rust CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a random id: 32 hex chars by default, a hyphenated UUID with --v4.
    Uuid {
        /// Number of random bytes (the id has twice as many hex chars)
        #[arg(long, default_value_t = 16)]
        half: usize,
        /// Print a version 4 UUID instead
        #[arg(long, conflicts_with = "half")]
        v4: bool,
    },
    /// Look up a dot-notation path (with * wildcards) in a JSON file.
    Get {
        file: PathBuf,
        /// Path such as app.name or users.*.email
        path: String,
        /// Printed when nothing is found
        #[arg(long)]
        default: Option<String>,
    },
    /// Flatten a JSON file to dot-notation keys.
    Dot { file: PathBuf },
    /// Print an environment variable (empty counts as unset).
    Env {
        name: String,
        #[arg(long)]
        default: Option<String>,
    },
    /// Boot the platform at ROOT and report what was loaded.
    Boot {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

fn read_json(file: &Path) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let raw = fs::read_to_string(file)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{}", s),
        other => println!("{}", other),
    }
}

fn run_boot(root: &Path) -> CliResult {
    // Logging goes up before the platform so `.env` and config loading are traced.
    let logging = Config::load_with_env(root.join(CONFIG_FILE))
        .and_then(|config| LoggingConfig::from_config(&config))
        .unwrap_or_default();
    init_logging(&logging);

    let platform = Platform::new(root)?;
    let mut web = platform.into_web()?;

    web.hook_mut().add_action(
        BOOT_ACTION,
        ActionCallback::named("ezra::cli::report", |args| {
            if let Some(root) = args.first().and_then(Value::as_str) {
                println!("Booted {}", root);
            }
        }),
        DEFAULT_PRIORITY,
        Some(1),
    );
    web.run()?;

    for (key, value) in web.config().dot() {
        println!("  {} = {}", key, value);
    }
    println!("Ready in {}ms", web.time_spent(true));
    Ok(())
}

fn main() -> CliResult {
    let cli = Cli::parse();
    match cli.command {
        Commands::Uuid { half, v4 } => {
            println!("{}", if v4 { uuid4() } else { uuid(half) });
            Ok(())
        }
        Commands::Get { file, path, default } => {
            let data = read_json(&file)?;
            let default = default.map(Value::String).unwrap_or(Value::Null);
            let found = data_get(path.as_str(), &data, &default);
            if found.is_null() {
                return Err(format!("{}: nothing at {}", file.display(), path).into());
            }
            print_value(&found);
            Ok(())
        }
        Commands::Dot { file } => {
            let data = read_json(&file)?;
            for (key, value) in array_dot(&data) {
                println!("{} = {}", key, value);
            }
            Ok(())
        }
        Commands::Env { name, default } => match env(&name).or(default) {
            Some(value) => {
                println!("{}", value);
                Ok(())
            }
            None => Err(format!("{} is not set", name).into()),
        },
        Commands::Boot { root } => run_boot(&root),
    }
}
