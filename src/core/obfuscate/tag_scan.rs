//! Manual mode: identifiers carrying a marker tag are renamed wherever they
//! appear, without an indexer.

use regex::Regex;

use super::NameTable;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct TagScanner {
    tag: String,
    pattern: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagScanOutcome {
    pub content: String,
    pub substitutions: usize,
}

impl TagScanner {
    pub fn new(tag: &str) -> Result<Self> {
        if tag.is_empty() {
            return Err(Error::config_invalid_value(
                "tag",
                Some(String::new()),
                "must not be empty",
            ));
        }
        let boundary = if tag.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            r"\b"
        } else {
            ""
        };
        let pattern = Regex::new(&format!("{}{}[A-Za-z0-9_]+", boundary, regex::escape(tag)))
            .map_err(|e| Error::config_invalid_value("tag", Some(tag.to_string()), e.to_string()))?;
        Ok(Self {
            tag: tag.to_string(),
            pattern,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace every tagged identifier in `text`, resolving the full token
    /// (tag included) through the table.
    pub fn scan(&self, text: &str, table: &mut NameTable) -> Result<TagScanOutcome> {
        let mut content = String::with_capacity(text.len());
        let mut last = 0;
        let mut substitutions = 0;

        for m in self.pattern.find_iter(text) {
            content.push_str(&text[last..m.start()]);
            let generated = table.resolve(m.as_str())?;
            log_status!("manual", "{} -> {}", m.as_str(), generated);
            content.push_str(&generated);
            last = m.end();
            substitutions += 1;
        }
        content.push_str(&text[last..]);

        Ok(TagScanOutcome {
            content,
            substitutions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::name_table::testing::SequenceGenerator;
    use super::*;

    fn table() -> NameTable {
        NameTable::with_generator(25, Box::new(SequenceGenerator::default()))
    }

    #[test]
    fn tagged_tokens_get_one_name_per_run() {
        let scanner = TagScanner::new("__s_").unwrap();
        let mut table = table();

        let first = scanner.scan("let x = __s_Secret()", &mut table).unwrap();
        let second = scanner
            .scan("__s_Secret.shared; __s_Other", &mut table)
            .unwrap();

        assert_eq!(first.content, "let x = X1()");
        assert_eq!(second.content, "X1.shared; X2");
        assert_eq!(table.get("__s_Secret"), Some("X1"));
    }

    #[test]
    fn random_replacement_has_configured_length() {
        let scanner = TagScanner::new("__s_").unwrap();
        let mut table = NameTable::with_length(25);
        let outcome = scanner.scan("let x = __s_Secret()", &mut table).unwrap();

        let generated = table.get("__s_Secret").unwrap();
        assert_eq!(generated.len(), 25);
        assert_eq!(outcome.content, format!("let x = {}()", generated));
    }

    #[test]
    fn tag_must_start_a_word() {
        let scanner = TagScanner::new("__s").unwrap();
        let mut table = table();
        let outcome = scanner.scan("my__sValue __sValue", &mut table).unwrap();
        assert_eq!(outcome.content, "my__sValue X1");
        assert_eq!(outcome.substitutions, 1);
    }

    #[test]
    fn non_word_tag_is_escaped() {
        let scanner = TagScanner::new("$$").unwrap();
        let mut table = table();
        let outcome = scanner.scan("a$$Key + $$", &mut table).unwrap();
        assert_eq!(outcome.content, "aX1 + $$");
    }

    #[test]
    fn untagged_text_is_untouched() {
        let scanner = TagScanner::new("__s").unwrap();
        let mut table = table();
        let text = "// héllo\nlet plain = 1\n";
        let outcome = scanner.scan(text, &mut table).unwrap();
        assert_eq!(outcome.content, text);
        assert!(table.is_empty());
    }

    #[test]
    fn empty_tag_is_rejected() {
        assert!(TagScanner::new("").is_err());
    }
}
