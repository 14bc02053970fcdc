//! Access-code ingestion from a plain-text document.

use std::collections::HashSet;
use std::path::Path;

/// Parse one code per line, trimming whitespace and skipping blank lines.
pub fn parse_codes(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Load the valid access codes from `path`.
///
/// A missing or unreadable file is not fatal: it is logged and the bot starts
/// with no valid codes.
pub async fn load_codes(path: &Path) -> HashSet<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let codes = parse_codes(&text);
            tracing::info!(path = %path.display(), count = codes.len(), "Loaded access codes");
            codes
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Error reading code file: {e}");
            HashSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parse_skips_blank_lines_and_trims() {
        let codes = parse_codes("ABC123\n\n   \n  XYZ789  \r\nABC123\n");
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("ABC123"));
        assert!(codes.contains("XYZ789"));
    }

    #[test]
    fn parse_empty_document() {
        assert!(parse_codes("").is_empty());
    }

    #[tokio::test]
    async fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CODE-1").unwrap();
        writeln!(file, "CODE-2").unwrap();

        let codes = load_codes(file.path()).await;
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("CODE-1"));
    }

    #[tokio::test]
    async fn load_missing_file_yields_empty_set() {
        let codes = load_codes(Path::new("/nonexistent/path/codes.txt")).await;
        assert!(codes.is_empty());
    }
}
