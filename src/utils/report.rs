// src/utils/report.rs

//! Framed console blocks for run headers and end-of-run summaries.
//!
//! Everything goes through the `log` facade so the CLI's logger decides
//! formatting and filtering.

/// Width of the separator rules.
const RULE_WIDTH: usize = 60;

/// Log a framed header.
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a separator line.
pub fn separator() {
    log::info!("{}", "─".repeat(RULE_WIDTH));
}

/// Render summary items as aligned `key: value` lines.
pub fn format_items(items: &[(String, String)]) -> Vec<String> {
    let width = items.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("    {key:<width$} : {value}"))
        .collect()
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(String, String)]) {
    log::info!("[SUMMARY] {}", title);
    for line in format_items(items) {
        log::info!("{}", line);
    }
    separator();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_items_aligns_keys() {
        let items = vec![
            ("applied".to_string(), "3".to_string()),
            ("company site".to_string(), "12".to_string()),
        ];
        let lines = format_items(&items);
        assert_eq!(lines[0], "    applied      : 3");
        assert_eq!(lines[1], "    company site : 12");
    }

    #[test]
    fn test_format_items_empty() {
        assert!(format_items(&[]).is_empty());
    }
}
