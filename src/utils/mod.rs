// restorectl/src/utils/mod.rs
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use std::io::Read;
use std::path::Path;

/// Formats a job creation timestamp (Unix seconds) in local time.
pub fn format_created(created: i64) -> String {
    match Local.timestamp_opt(created, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => created.to_string(),
    }
}

/// Reads the whole of `path`, or standard input when no path (or `-`) is given.
pub fn read_text_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read standard input")?;
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_created_shape() {
        let formatted = format_created(1_700_000_000);
        assert_eq!(formatted.len(), "YYYY-MM-DD HH:MM:SS".len());
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[13..14], ":");
    }

    #[test]
    fn test_read_text_input_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("query.sql");
        std::fs::write(&path, "SELECT * FROM sales.orders")?;
        assert_eq!(read_text_input(Some(&path))?, "SELECT * FROM sales.orders");
        Ok(())
    }

    #[test]
    fn test_read_text_input_missing_file() {
        assert!(read_text_input(Some(Path::new("/nonexistent/query.sql"))).is_err());
    }
}
