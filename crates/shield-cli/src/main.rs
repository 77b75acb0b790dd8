//! Prompt Shield CLI - sanitize, redact and repair from the command line

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use shield_client::{parse_payload_with, JsonRepair};
use shield_core::{init_tracing, ShieldConfig};
use shield_sanitizer::{PiiGuard, Sanitizer};
use tracing::debug;

#[derive(Parser)]
#[command(name = "shield")]
#[command(about = "Prompt Shield - Input sanitization and resilient model invocation")]
struct Cli {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sanitize a message and print the result as JSON
    Sanitize {
        /// Keep code patterns (escape instead of remove)
        #[arg(long)]
        no_strict: bool,
        /// Keep line structure
        #[arg(long)]
        preserve_formatting: bool,
        /// Read the message from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Redact PII and print the text
    Redact {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Exit non-zero when the text contains PII
    CheckPii {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Recover a JSON object from a raw model reply
    Repair {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Check configuration validity
    CheckConfig,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Some(Commands::Sanitize {
            no_strict,
            preserve_formatting,
            file,
        }) => {
            let input = read_input(file.as_deref())?;
            let options = config
                .sanitize_options()
                .strict(config.sanitizer.strict && !no_strict)
                .preserve_formatting(config.sanitizer.preserve_formatting || preserve_formatting);
            let result = Sanitizer::with_config(config.sanitizer_config()).sanitize(Some(&input), &options);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Commands::Redact { file }) => {
            let input = read_input(file.as_deref())?;
            print!("{}", PiiGuard::new().redact_pii(&input));
        }
        Some(Commands::CheckPii { file }) => {
            let input = read_input(file.as_deref())?;
            let guard = PiiGuard::new();
            if !guard.is_safe_for_logging(&input) {
                let kinds: Vec<String> = guard
                    .detected_kinds(&input)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                eprintln!("PII detected: {}", kinds.join(", "));
                return Ok(ExitCode::FAILURE);
            }
            println!("No PII detected");
        }
        Some(Commands::Repair { file }) => {
            let input = read_input(file.as_deref())?;
            match parse_payload_with(&JsonRepair::new(), &input) {
                Ok(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                Err(err) => {
                    eprintln!("Repair failed: {err}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Some(Commands::CheckConfig) => {
            config.validate().context("configuration is invalid")?;
            println!("Configuration OK");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => {
            println!("Prompt Shield v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ShieldConfig> {
    let mut config = match path {
        Some(path) => ShieldConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ShieldConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("invalid SHIELD_* environment override")?;
    Ok(config)
}

fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    debug!("Read {} characters of input", input.chars().count());
    Ok(input)
}
