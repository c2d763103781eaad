//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a section heading with an underline
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format seconds as milliseconds
pub fn format_ms(secs: Option<f64>) -> String {
    match secs {
        Some(s) => format!("{:.1}ms", s * 1000.0),
        None => "-".to_string(),
    }
}

/// Format a 0-1 ratio as a percentage
pub fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "-".to_string(),
    }
}

/// Format a value already on a 0-100 scale
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}%", v),
        None => "-".to_string(),
    }
}

pub fn format_bandwidth(mbps: Option<f64>) -> String {
    match mbps {
        Some(b) => format!("{:.0} Mbps", b),
        None => "-".to_string(),
    }
}

/// Format a score; unscorable servers show as infinite
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{:.4}", s),
        None => "∞".red().to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" | "up" => status.green().to_string(),
        "degraded" | "explore" => status.yellow().to_string(),
        "unhealthy" | "not ready" | "down" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Mark for yes/no columns
pub fn format_flag(flag: bool) -> String {
    if flag {
        "✓".green().to_string()
    } else {
        String::new()
    }
}
