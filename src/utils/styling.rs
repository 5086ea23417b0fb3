//! Terminal styling for the sieve binary

use console::{style, Emoji};
use std::path::Path;

use crate::config::Settings;

pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static DONE: Emoji<'_, '_> = Emoji("🏁 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static FILTER: Emoji<'_, '_> = Emoji("🔍 ", "");
pub static SEED: Emoji<'_, '_> = Emoji("🎲 ", "");

/// Print the name and version line
pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("sieve").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "    {}",
        style("staged feature selection and validated model comparison").dim()
    );
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print the run configuration card
pub fn print_config(input: &Path, target: &str, settings: &Settings) {
    let line = "─".repeat(54);
    println!("    ┌{}┐", line);
    println!("    │ {:<53}│", style("Configuration").cyan().bold());
    println!("    ├{}┤", line);
    println!("    │  {}Input:  {:<43}│", FOLDER, truncate_path(input, 42));
    println!("    │  {}Target: {:<43}│", TARGET, truncate_string(target, 42));
    println!("    ├{}┤", line);
    println!(
        "    │  {}Cascade: p_a={:.2} p_b={:.2} final={:<17}│",
        FILTER, settings.p_a, settings.p_b, settings.final_count
    );
    println!(
        "    │  {}Seed: {:<5} test fraction: {:<19.2}│",
        SEED, settings.seed, settings.test_fraction
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {}{}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {}{}", WARN, style(message).yellow());
}

pub fn print_completion(trained: usize) {
    println!();
    println!(
        "    {}{}",
        DONE,
        style(format!("Done: {} model(s) trained", trained)).green().bold()
    );
    println!();
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
