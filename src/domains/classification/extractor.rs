/// Opaque text extraction collaborator: bytes plus extension in, text out.
/// Unsupported or unreadable input yields an empty string, never an error.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, data: &[u8], extension: &str) -> String;
}

/// Extractor for plain-text formats. Anything else is unsupported and
/// extracts to empty.
pub struct PlainTextExtractor;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "log", "json", "xml", "html", "htm"];

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, data: &[u8], extension: &str) -> String {
        if !TEXT_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
            return String::new();
        }
        String::from_utf8_lossy(data).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_known_text_formats() {
        let extractor = PlainTextExtractor;
        assert_eq!(extractor.extract_text(b"hello", "txt"), "hello");
        assert_eq!(extractor.extract_text(b"a,b,c", "CSV"), "a,b,c");
    }

    #[test]
    fn test_unsupported_format_is_empty_not_error() {
        let extractor = PlainTextExtractor;
        assert_eq!(extractor.extract_text(b"\x89PNG...", "png"), "");
        assert_eq!(extractor.extract_text(b"%PDF-1.4", "pdf"), "");
    }

    #[test]
    fn test_invalid_utf8_is_lossy_not_error() {
        let extractor = PlainTextExtractor;
        let text = extractor.extract_text(&[0x68, 0x69, 0xFF], "txt");
        assert!(text.starts_with("hi"));
    }
}
