//! Terminal output helpers for consistent CLI formatting

/// Check if color output is enabled
fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message (green checkmark)
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {}", message);
    } else {
        println!("Success: {}", message);
    }
}

/// Print a warning message (yellow)
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33mWarning:\x1b[0m {}", message);
    } else {
        eprintln!("Warning: {}", message);
    }
}

/// Print a key-value pair with consistent formatting
pub fn print_key_value(key: &str, value: &str) {
    if use_color() {
        println!("  \x1b[1m{}:\x1b[0m {}", key, value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// `Processed N entries in S.SS seconds`
pub fn processed_message(entries: usize, elapsed: std::time::Duration) -> String {
    format!(
        "Processed {} entries in {:.2} seconds",
        entries,
        elapsed.as_secs_f64()
    )
}
