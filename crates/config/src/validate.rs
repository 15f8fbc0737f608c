//! Configuration validation.
//!
//! Reports syntax errors, unknown (likely misspelled) fields, type errors and
//! settings that would leave the relay unable to forward anything.

use std::path::Path;

use crate::{
    env_subst::{has_placeholder, substitute_env},
    live::{ENV_AUTHORIZED_SENDER, ENV_DESTINATION_CHAT_ID},
    loader::parse_config_value,
    schema::CourierConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "relay", "channel",
    /// "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "relay.destination_chat_id"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Known keys ──────────────────────────────────────────────────────────────

const TOP_LEVEL_KEYS: &[&str] = &["relay", "channels"];
const RELAY_KEYS: &[&str] = &[
    "authorized_sender",
    "destination_chat_id",
    "download_timeout_secs",
    "send_timeout_secs",
];
const CHANNEL_KEYS: &[&str] = &["telegram", "whatsapp"];
const TELEGRAM_KEYS: &[&str] = &["token", "api_url", "request_timeout_secs"];
const WHATSAPP_KEYS: &[&str] = &[
    "account_id",
    "sidecar_port",
    "sidecar_dir",
    "auth_dir",
    "auto_start_sidecar",
];

fn known_keys_at(path: &str) -> Option<&'static [&'static str]> {
    match path {
        "" => Some(TOP_LEVEL_KEYS),
        "relay" => Some(RELAY_KEYS),
        "channels" => Some(CHANNEL_KEYS),
        "channels.telegram" => Some(TELEGRAM_KEYS),
        "channels.whatsapp" => Some(WHATSAPP_KEYS),
        _ => None,
    }
}

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        )];
        check_semantics(&CourierConfig::default(), &mut diagnostics);
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let mut result = match std::fs::read_to_string(actual_path) {
        Ok(content) => validate_str(&substitute_env(&content), actual_path),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "file-ref",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate raw config text. The format is taken from `path`'s extension.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value = match parse_config_value(raw, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                e.to_string(),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, "", &mut diagnostics);

    match serde_json::from_value::<CourierConfig>(value) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            e.to_string(),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(value: &serde_json::Value, prefix: &str, diagnostics: &mut Vec<Diagnostic>) {
    let (Some(table), Some(known)) = (value.as_object(), known_keys_at(prefix)) else {
        return;
    };

    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if known.contains(&key.as_str()) {
            check_unknown_fields(child, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            " at top level"
        } else {
            ""
        };
        let message = match suggest(key, known, 3) {
            Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
            None => format!("unknown field{level}"),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            message,
        ));
    }
}

fn check_semantics(config: &CourierConfig, diagnostics: &mut Vec<Diagnostic>) {
    let relay = &config.relay;

    if relay
        .authorized_sender
        .as_deref()
        .is_none_or(|s| s.trim().is_empty())
    {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "relay",
            "relay.authorized_sender",
            format!("not set; every message is dropped unless {ENV_AUTHORIZED_SENDER} is exported"),
        ));
    }

    match relay.destination_chat_id.as_deref().map(str::trim) {
        None | Some("") => diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "relay",
            "relay.destination_chat_id",
            format!(
                "not set; every message is dropped unless {ENV_DESTINATION_CHAT_ID} is exported"
            ),
        )),
        Some(id) if id.parse::<i64>().is_err() => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "relay",
            "relay.destination_chat_id",
            format!("\"{id}\" is not a numeric Telegram chat id"),
        )),
        Some(_) => {},
    }

    for (path, secs) in [
        ("relay.download_timeout_secs", relay.download_timeout_secs),
        ("relay.send_timeout_secs", relay.send_timeout_secs),
    ] {
        if secs == 0 {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "relay",
                path,
                "must be greater than zero",
            ));
        }
    }

    match config.channels.telegram.get("token").and_then(|v| v.as_str()) {
        None | Some("") => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "channel",
            "channels.telegram.token",
            "telegram bot token is required",
        )),
        Some(token) if has_placeholder(token) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "channel",
            "channels.telegram.token",
            "token references an environment variable that is not set",
        )),
        Some(_) => {},
    }

    if let Some(port) = config.channels.whatsapp.get("sidecar_port") {
        let valid = port
            .as_u64()
            .is_some_and(|p| (1..=u64::from(u16::MAX)).contains(&p));
        if !valid {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "channel",
                "channels.whatsapp.sidecar_port",
                format!("{port} is not a valid TCP port"),
            ));
        }
    }
}
