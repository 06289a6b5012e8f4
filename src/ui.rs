use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::{Padding, Style};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Tables
// ============================================================================

/// Lay out rows under headers with columns padded to their widest cell.
///
/// Cells may be colored; widths count visible characters only.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(|h| (*h).to_string()));
    for row in rows {
        builder.push_record(row.iter().cloned());
    }

    let mut table = builder.build();
    table.with(Style::empty()).with(Padding::new(0, 2, 0, 0));
    table
        .to_string()
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// Print a table; the header line is bold
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    for (i, line) in render_table(headers, rows).into_iter().enumerate() {
        if i == 0 {
            println!("{}", line.bold());
        } else {
            println!("{line}");
        }
    }
}

/// Color a service or task status for display
pub fn status(status: &str) -> String {
    if status.starts_with("Up") || status == "success" {
        status.green().to_string()
    } else if status.starts_with("Exited") || status == "fail" || status == "abort" {
        status.red().to_string()
    } else {
        status.yellow().to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
