//! Per-language string tables.
//!
//! Translations are staged per language code and rendered into the
//! `pass.strings` file of the matching `<lang>.lproj` folder when a pass is
//! generated. A template that already ships a `pass.strings` keeps its
//! content; the rendered lines are appended after it.
//!
//! The rendered format is one entry per line:
//!
//! ```text
//! "PLACEHOLDER" = "Translated text";
//! ```

use super::{normalize_path, Bundle, LocalizationBundle, LPROJ_SUFFIX};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// String table file inside a localization folder.
pub const STRINGS_FILE: &str = "pass.strings";

/// Placeholder → translated string.
pub type Translations = BTreeMap<String, String>;

/// Staged translations, keyed by language code (`"en"`, `"zh-Hans"`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalizationMerger {
    staged: BTreeMap<String, Translations>,
}

impl LocalizationMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `translations` for `lang`, replacing earlier ones.
    ///
    /// An empty map clears the staged translations of that language; the
    /// template's own `pass.strings` for it is left alone.
    pub fn stage(&mut self, lang: impl Into<String>, translations: Translations) {
        self.staged.insert(lang.into(), translations);
    }

    pub fn staged(&self, lang: &str) -> Option<&Translations> {
        self.staged.get(lang)
    }

    /// Staged language codes.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.staged.keys().map(String::as_str)
    }

    /// Flatten the localization folders into `bundle`.
    ///
    /// Every language that is staged or has a template folder is processed,
    /// in descending language-code order. Staged translations are appended
    /// to the folder's `pass.strings`; a folder left empty is skipped.
    /// Fails with [`Error::PathCollision`] if a flattened path is already
    /// in `bundle`.
    pub fn merge_into(&self, localization: &LocalizationBundle, bundle: &mut Bundle) -> Result<()> {
        let mut languages: Vec<&str> = self
            .staged
            .keys()
            .map(String::as_str)
            .chain(
                localization
                    .keys()
                    .filter_map(|folder| folder.strip_suffix(LPROJ_SUFFIX)),
            )
            .collect();
        languages.sort_unstable();
        languages.dedup();

        for lang in languages.into_iter().rev() {
            let folder_name = format!("{lang}{LPROJ_SUFFIX}");
            let mut folder = localization.get(&folder_name).cloned().unwrap_or_default();

            if let Some(translations) = self.staged.get(lang) {
                let rendered = render_strings(translations);
                if !rendered.is_empty() {
                    let existing = folder.remove(STRINGS_FILE).unwrap_or_default();
                    folder.insert(STRINGS_FILE.to_string(), append_strings(existing, &rendered));
                }
            }

            if folder.is_empty() {
                debug!(lang = %lang, "skipping empty localization folder");
                continue;
            }

            for (file, bytes) in folder {
                let path = format!("{folder_name}/{}", normalize_path(&file));
                if bundle.contains_key(&path) {
                    return Err(Error::PathCollision(path));
                }
                bundle.insert(path, bytes);
            }
        }

        Ok(())
    }
}

/// Render translations as `pass.strings` lines.
///
/// Returns no bytes for an empty map.
pub fn render_strings(translations: &Translations) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in translations {
        out.push('"');
        escape_into(&mut out, key);
        out.push_str("\" = \"");
        escape_into(&mut out, value);
        out.push_str("\";\n");
    }
    out.into_bytes()
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// Template content first, rendered lines after, on a fresh line.
fn append_strings(mut existing: Vec<u8>, rendered: &[u8]) -> Vec<u8> {
    if !existing.is_empty() && !existing.ends_with(b"\n") {
        existing.push(b'\n');
    }
    existing.extend_from_slice(rendered);
    existing
}

/// Parse `pass.strings` content back into a map.
///
/// Understands `"key" = "value";` entries separated by whitespace, plus
/// `/* */` and `//` comments. Parsing stops at the first malformed entry;
/// entries read up to that point are returned. Later duplicates win.
pub fn parse_strings(bytes: &[u8]) -> Translations {
    let text = String::from_utf8_lossy(bytes);
    let mut parser = StringsParser {
        chars: text.chars().peekable(),
    };
    let mut translations = Translations::new();
    while let Some((key, value)) = parser.next_entry() {
        translations.insert(key, value);
    }
    translations
}

struct StringsParser<I: Iterator<Item = char>> {
    chars: std::iter::Peekable<I>,
}

impl<I: Iterator<Item = char>> StringsParser<I> {
    fn next_entry(&mut self) -> Option<(String, String)> {
        self.skip_trivia();
        let key = self.quoted()?;
        self.skip_trivia();
        self.expect('=')?;
        self.skip_trivia();
        let value = self.quoted()?;
        self.skip_trivia();
        self.expect(';')?;
        Some((key, value))
    }

    fn expect(&mut self, c: char) -> Option<()> {
        (self.chars.next()? == c).then_some(())
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() || *c == '\u{feff}' => {
                    self.chars.next();
                }
                Some('/') => {
                    self.chars.next();
                    match self.chars.next() {
                        Some('*') => {
                            let mut prev = '\0';
                            for c in self.chars.by_ref() {
                                if prev == '*' && c == '/' {
                                    break;
                                }
                                prev = c;
                            }
                        }
                        Some('/') => {
                            for c in self.chars.by_ref() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        _ => return,
                    }
                }
                _ => return,
            }
        }
    }

    fn quoted(&mut self) -> Option<String> {
        if self.chars.next()? != '"' {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.chars.next()? {
                '"' => return Some(out),
                '\\' => match self.chars.next()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translations(pairs: &[(&str, &str)]) -> Translations {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_format() {
        let rendered = render_strings(&translations(&[("EVENT", "Concerto"), ("GATE", "Porta")]));
        assert_eq!(
            String::from_utf8(rendered).unwrap(),
            "\"EVENT\" = \"Concerto\";\n\"GATE\" = \"Porta\";\n"
        );
        assert!(render_strings(&Translations::new()).is_empty());
    }

    #[test]
    fn test_render_parse_round_trip_with_escapes() {
        let staged = translations(&[
            ("QUOTE", "He said \"hi\""),
            ("PATH", "C:\\passes"),
            ("MULTI", "line one\nline two"),
            ("UNICODE", "Grüße 🎫"),
        ]);
        assert_eq!(parse_strings(&render_strings(&staged)), staged);
    }

    #[test]
    fn test_parse_skips_comments() {
        let content = b"/* Header */\n\"A\" = \"1\"; // trailing\n\n\"B\"=\"2\";";
        assert_eq!(parse_strings(content), translations(&[("A", "1"), ("B", "2")]));
    }

    #[test]
    fn test_parse_stops_at_malformed_entry() {
        let content = b"\"A\" = \"1\";\n\"B\" \"2\";\n\"C\" = \"3\";";
        assert_eq!(parse_strings(content), translations(&[("A", "1")]));
    }

    #[test]
    fn test_merge_appends_after_template_strings() {
        let mut localization = LocalizationBundle::new();
        let mut en = Bundle::new();
        en.insert(STRINGS_FILE.into(), b"\"TEMPLATE\" = \"kept\";".to_vec());
        en.insert("logo.png".into(), b"LOGO".to_vec());
        localization.insert("en.lproj".into(), en);

        let mut merger = LocalizationMerger::new();
        merger.stage("en", translations(&[("NEW", "added")]));

        let mut bundle = Bundle::new();
        merger.merge_into(&localization, &mut bundle).unwrap();

        let strings = &bundle["en.lproj/pass.strings"];
        assert!(strings.starts_with(b"\"TEMPLATE\" = \"kept\";\n"));
        assert_eq!(
            parse_strings(strings),
            translations(&[("NEW", "added"), ("TEMPLATE", "kept")])
        );
        assert_eq!(bundle["en.lproj/logo.png"], b"LOGO");
    }

    #[test]
    fn test_merge_creates_folder_for_new_language() {
        let mut merger = LocalizationMerger::new();
        merger.stage("fr", translations(&[("HELLO", "Bonjour")]));

        let mut bundle = Bundle::new();
        merger.merge_into(&LocalizationBundle::new(), &mut bundle).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(
            parse_strings(&bundle["fr.lproj/pass.strings"]),
            translations(&[("HELLO", "Bonjour")])
        );
    }

    #[test]
    fn test_empty_staging_keeps_template_content_and_skips_empty_languages() {
        let mut localization = LocalizationBundle::new();
        let mut it = Bundle::new();
        it.insert(STRINGS_FILE.into(), b"\"A\" = \"B\";".to_vec());
        localization.insert("it.lproj".into(), it);

        let mut merger = LocalizationMerger::new();
        merger.stage("it", translations(&[("X", "Y")]));
        merger.stage("it", Translations::new());
        merger.stage("de", Translations::new());

        let mut bundle = Bundle::new();
        merger.merge_into(&localization, &mut bundle).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle["it.lproj/pass.strings"], b"\"A\" = \"B\";");
    }

    #[test]
    fn test_merge_detects_collision() {
        let mut merger = LocalizationMerger::new();
        merger.stage("en", translations(&[("A", "B")]));

        let mut bundle = Bundle::new();
        bundle.insert("en.lproj/pass.strings".into(), Vec::new());
        assert!(matches!(
            merger.merge_into(&LocalizationBundle::new(), &mut bundle),
            Err(Error::PathCollision(_))
        ));
    }

    #[test]
    fn test_merge_normalizes_separators() {
        let mut localization = LocalizationBundle::new();
        let mut ja = Bundle::new();
        ja.insert("images\\strip.png".into(), b"STRIP".to_vec());
        localization.insert("ja.lproj".into(), ja);

        let mut bundle = Bundle::new();
        LocalizationMerger::new()
            .merge_into(&localization, &mut bundle)
            .unwrap();
        assert!(bundle.contains_key("ja.lproj/images/strip.png"));
    }
}
