use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::{ConfigError, ParserSettings};
use crate::model::{Category, Language};

/// What a section marker resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Section { category: Category, language: Language },
    /// Identity container (email, education, ...): ends the current section.
    Skip,
}

/// Static (language, marker) → category lookup.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    table: HashMap<(Language, String), Category>,
    skip: HashSet<String>,
    languages: BTreeSet<Language>,
}

impl CategoryClassifier {
    pub fn from_settings(
        settings: &ParserSettings,
        languages: &BTreeSet<Language>,
    ) -> Result<Self, ConfigError> {
        let mut table = HashMap::new();
        for entry in &settings.sections {
            let category = entry
                .category
                .parse::<Category>()
                .map_err(|key| ConfigError::UnknownCategory {
                    marker: entry.marker.clone(),
                    key,
                })?;
            // Unsupported-language rows are ignored, not errors: one table can serve many runs.
            if languages.contains(&entry.language) {
                table.insert((entry.language, normalize_marker(&entry.marker)), category);
            }
        }
        let skip = settings.skip_markers.iter().map(|m| normalize_marker(m)).collect();
        Ok(CategoryClassifier {
            table,
            skip,
            languages: languages.clone(),
        })
    }

    /// Hint language first, then the other supported languages, then the
    /// skip list. Anything else is `Unrecognized` in the hint language.
    pub fn classify(&self, marker: &str, hint: Language) -> Classification {
        let key = normalize_marker(marker);

        let others = self.languages.iter().copied().filter(|l| *l != hint);
        let order = std::iter::once(hint).chain(others);
        for language in order {
            if let Some(category) = self.table.get(&(language, key.clone())) {
                return Classification::Section {
                    category: *category,
                    language,
                };
            }
        }

        if self.skip.contains(&key) {
            return Classification::Skip;
        }

        Classification::Section {
            category: Category::Unrecognized,
            language: hint,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

/// Lowercase, collapse whitespace (including nbsp), drop a trailing colon.
/// Dotted and dotless i fold together, so "ULUSLARARASI" and "Uluslararası"
/// give the same key.
pub fn normalize_marker(raw: &str) -> String {
    let collapsed = raw
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace())
        .to_lowercase()
        .chars()
        // "İ" lowercases to "i" + U+0307
        .filter(|&c| c != '\u{307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}
