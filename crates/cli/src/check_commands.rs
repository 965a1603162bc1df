use std::path::Path;

use {
    anyhow::Result,
    murmur_config::validate::{self, Diagnostic, Severity, ValidationResult},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// `murmur check`: validate the config and print diagnostics.
pub fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    report(&result, verbose);
    if result.has_errors() {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

/// Print diagnostics and a summary line to stderr.
pub fn report(result: &ValidationResult, verbose: bool) {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        eprintln!("  {}", render(d));
        shown += 1;
    }
    if shown > 0 {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}

fn render(d: &Diagnostic) -> String {
    let color = match d.severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    };
    if d.path.is_empty() {
        format!("{BOLD}{color}{}{RESET} {}", d.severity, d.message)
    } else {
        format!("{BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
    }
}
