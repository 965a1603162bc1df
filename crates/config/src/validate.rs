//! Configuration validation.
//!
//! Flags unknown or misspelled fields, type errors, and settings the relay
//! cannot run with or that Telegram will not honor.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{loader, schema::MurmurConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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
    /// Dotted path, e.g. `whisper.ttl_secs`; empty for file-level problems.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
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

/// Known sections and their fields.
const SCHEMA: &[(&str, &[&str])] = &[
    ("telegram", &[
        "token",
        "poll_timeout_secs",
        "request_timeout_secs",
        "api_url",
    ]),
    ("whisper", &[
        "ttl_secs",
        "max_length",
        "alert_max_length",
        "view_cooldown_secs",
        "inbox_limit",
        "preview_length",
        "sweep_interval_secs",
    ]),
];

/// Telegram truncates callback alerts beyond this many characters.
const TELEGRAM_ALERT_LIMIT: usize = 200;
/// Telegram accepts at most this many inline results per answer.
const TELEGRAM_INLINE_RESULTS_LIMIT: usize = 50;

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(loader::find_config_file);

    let Some(actual_path) = config_path else {
        let mut result = validate_config(&loader::apply_env_overrides(MurmurConfig::default()));
        result.diagnostics.insert(
            0,
            Diagnostic::new(Severity::Info, "", "no config file found; using defaults"),
        );
        return result;
    };

    let mut result = match loader::load_config_value(&actual_path) {
        Ok(value) => validate_value(&value),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(Severity::Error, "", e.to_string())],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate an already parsed config document.
#[must_use]
pub fn validate_value(value: &serde_json::Value) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_unknown_fields(value, &mut diagnostics);

    match serde_json::from_value::<MurmurConfig>(value.clone()) {
        Ok(config) => {
            let config = loader::apply_env_overrides(config);
            check_semantics(&config, &mut diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate_config(config: &MurmurConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(value: &serde_json::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_object() else {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "",
            "config root must be a table",
        ));
        return;
    };
    let sections: Vec<&str> = SCHEMA.iter().map(|(name, _)| *name).collect();

    for (key, section_value) in root {
        let Some((_, fields)) = SCHEMA.iter().find(|(name, _)| *name == key.as_str()) else {
            diagnostics.push(unknown_field(key.clone(), key, &sections));
            continue;
        };
        let Some(table) = section_value.as_object() else {
            continue;
        };
        for field in table.keys() {
            if !fields.contains(&field.as_str()) {
                diagnostics.push(unknown_field(format!("{key}.{field}"), field, fields));
            }
        }
    }
}

fn unknown_field(path: String, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic::new(Severity::Error, path, message)
}

fn check_semantics(config: &MurmurConfig, diagnostics: &mut Vec<Diagnostic>) {
    let tg = &config.telegram;
    if tg.token().is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "telegram.token",
            format!("bot token is not set (set it in the config or {})", loader::TOKEN_ENV),
        ));
    }
    if tg.request_timeout_secs <= u64::from(tg.poll_timeout_secs) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "telegram.request_timeout_secs",
            "must be greater than poll_timeout_secs or every long poll times out",
        ));
    }

    let w = &config.whisper;
    for (field, value) in [
        ("ttl_secs", w.ttl_secs),
        ("sweep_interval_secs", w.sweep_interval_secs),
        ("max_length", w.max_length as u64),
    ] {
        if value == 0 {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                format!("whisper.{field}"),
                "must be greater than zero",
            ));
        }
    }
    if w.view_cooldown_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "whisper.view_cooldown_secs",
            "reveals are not rate limited",
        ));
    }
    if w.alert_max_length > TELEGRAM_ALERT_LIMIT {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "whisper.alert_max_length",
            format!("Telegram truncates alerts longer than {TELEGRAM_ALERT_LIMIT} characters"),
        ));
    }
    if w.alert_max_length >= w.max_length {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "whisper.alert_max_length",
            "every whisper fits in an alert; long-message delivery is never used",
        ));
    }
    if w.inbox_limit > TELEGRAM_INLINE_RESULTS_LIMIT {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "whisper.inbox_limit",
            format!("Telegram accepts at most {TELEGRAM_INLINE_RESULTS_LIMIT} inline results"),
        ));
    }
    if w.inbox_limit == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "whisper.inbox_limit",
            "the inbox is always empty",
        ));
    }
}

/// Levenshtein edit distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}
