use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use courier_config::{
    CourierConfig, LiveRelayConfig,
    validate::{self, Severity},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration, environment overrides applied and
    /// secrets redacted.
    Show,
}

pub fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config_path, verbose),
        ConfigAction::Show => show(config_path),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

const REDACTED: &str = "[REDACTED]";

fn check(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(config_path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let (config, source) = crate::load_config(config_path)?;
    match &source {
        Some(path) => eprintln!("# loaded from {}", path.display()),
        None => eprintln!("# no config file found; defaults"),
    }
    let live = LiveRelayConfig::new(config.relay.clone(), source);
    let effective = effective_config(config, &live);
    print!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}

/// The config as the relay sees it: relay settings from a live snapshot and
/// the bot token masked.
fn effective_config(mut config: CourierConfig, live: &LiveRelayConfig) -> CourierConfig {
    config.relay = live.snapshot();
    match config.channels.telegram.get_mut("token") {
        Some(token) if token.as_str().is_some_and(|t| !t.is_empty()) => {
            *token = serde_json::Value::String(REDACTED.into());
        },
        _ => {},
    }
    config
}
