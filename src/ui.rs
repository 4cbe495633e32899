// Terminal output helpers shared by the commands

use colored::Colorize;

const BOX_WIDTH: usize = 60;

pub fn print_header(title: &str) {
    let rule = "═".repeat(BOX_WIDTH);
    println!();
    println!("{}", format!("╔{}╗", rule).bright_blue());
    println!("{}", format!("║  {:<width$}║", title, width = BOX_WIDTH - 2).bright_blue());
    println!("{}", format!("╚{}╝", rule).bright_blue());
    println!();
}

pub fn print_section(title: &str) {
    println!("{}", title.bold().underline());
}

/// Indented `key: value` line
pub fn print_field(key: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", key).dimmed(), value);
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).bright_cyan());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).bright_yellow());
}
