//! Table and JSON output formatting for CLI commands.

use std::path::Path;

use serde::Serialize;
use tabled::{Table, Tabled};

use designcopy_engine::Severity;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                let table = Table::new(items).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

/// Print a single item as JSON
pub fn print_json<T: Serialize>(item: &T) {
    let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
    println!("{}", json);
}

/// Print one progress line to stderr, keeping stdout for results
pub fn print_progress(percent: u8, message: &str) {
    eprintln!("[{:>3}%] {}", percent.min(100), message);
}

/// Print an engine log line according to its severity
pub fn print_log(message: &str, severity: Severity, quiet: bool) {
    match severity {
        Severity::Error => print_error(message),
        Severity::Warning if !quiet => print_warning(message),
        Severity::Success if !quiet => eprintln!("✓ {}", message),
        _ => {}
    }
}

/// Check or cross mark for a per-file outcome
pub fn status_mark(success: bool) -> String {
    if success { "✓" } else { "✗" }.to_string()
}

/// Render a path relative to a root when possible
pub fn display_under(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    eprintln!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}
