use std::collections::{HashMap, HashSet};

use crate::model::{Category, CitationRecord, DuplicateCitation};

#[derive(Debug, Clone, Default)]
pub struct DedupeOutcome {
    pub kept: Vec<CitationRecord>,
    pub removed: Vec<DuplicateCitation>,
}

/// First-wins citation deduplication keyed by (lowercased text, category).
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashMap<(String, Category), usize>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the earlier record with the same key, or `None` if the key is new
    /// (it is recorded against `index`).
    pub fn insert(&mut self, record: &CitationRecord, index: usize) -> Option<usize> {
        match self.seen.entry(record.identity_key()) {
            std::collections::hash_map::Entry::Occupied(e) => Some(*e.get()),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(index);
                None
            }
        }
    }

    pub fn dedupe_with_report(mut self, citations: Vec<CitationRecord>) -> DedupeOutcome {
        let mut out = DedupeOutcome::default();
        for record in citations {
            match self.insert(&record, out.kept.len()) {
                Some(first) => {
                    let kept = &out.kept[first];
                    out.removed.push(DuplicateCitation {
                        category: record.category,
                        kept: kept.text.clone(),
                        doi_match: kept.doi.is_some() && kept.doi == record.doi,
                        dropped: record.text,
                    });
                }
                None => out.kept.push(record),
            }
        }
        out
    }
}

/// Drops repeated profile URLs (exact, case-sensitive) keeping first-seen order.
#[derive(Debug, Default)]
pub struct UrlDeduplicator {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl UrlDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the URL was already seen.
    pub fn push(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.urls.push(url.to_string());
        true
    }

    pub fn extend<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        urls.into_iter().filter(|u| self.push(u.as_ref())).count()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FacultyIdentity, Language};

    fn rec(text: &str, category: Category) -> CitationRecord {
        CitationRecord {
            category,
            year: None,
            language: Language::En,
            text: text.to_string(),
            doi: None,
            owner: FacultyIdentity::stub("u"),
        }
    }

    fn dedupe(citations: Vec<CitationRecord>) -> Vec<CitationRecord> {
        Deduplicator::new().dedupe_with_report(citations).kept
    }

    fn texts(v: &[CitationRecord]) -> Vec<&str> {
        v.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn case_insensitive_first_wins() {
        let out = dedupe(vec![
            rec("Doe (2001) X", Category::NationalArticles),
            rec("DOE (2001) x", Category::NationalArticles),
        ]);
        assert_eq!(texts(&out), vec!["Doe (2001) X"]);
    }

    #[test]
    fn category_is_part_of_the_key() {
        let out = dedupe(vec![
            rec("Doe (2001) X", Category::NationalArticles),
            rec("Doe (2001) X", Category::NationalBooks),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn order_preserving_and_idempotent() {
        let input = vec![
            rec("c", Category::NationalArticles),
            rec("a", Category::NationalArticles),
            rec("c", Category::NationalArticles),
            rec("b", Category::NationalArticles),
            rec("a", Category::NationalArticles),
        ];
        let once = dedupe(input);
        assert_eq!(texts(&once), vec!["c", "a", "b"]);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn report_names_the_kept_text() {
        let out = Deduplicator::new().dedupe_with_report(vec![
            rec("Doe (2001) X", Category::NationalArticles),
            rec("doe (2001) x", Category::NationalArticles),
        ]);
        assert_eq!(out.removed.len(), 1);
        assert_eq!(out.removed[0].kept, "Doe (2001) X");
        assert_eq!(out.removed[0].dropped, "doe (2001) x");
        assert_eq!(out.removed[0].category, Category::NationalArticles);
        assert!(!out.removed[0].doi_match);
    }

    #[test]
    fn doi_match_needs_both_dois() {
        let with_doi = |text: &str| CitationRecord {
            doi: Some("10.1016/j.x.2019.01.001".into()),
            ..rec(text, Category::InternationalArticles)
        };
        let out = Deduplicator::new().dedupe_with_report(vec![
            with_doi("Doe (2019) Y. doi 10.1016/j.x.2019.01.001"),
            with_doi("DOE (2019) y. doi 10.1016/j.x.2019.01.001"),
            rec("Doe (2019) Y. doi 10.1016/j.x.2019.01.001", Category::InternationalArticles),
        ]);
        assert_eq!(out.kept.len(), 1);
        let matches: Vec<_> = out.removed.iter().map(|d| d.doi_match).collect();
        assert_eq!(matches, vec![true, false]);
    }

    #[test]
    fn urls_exact_match_only() {
        let mut d = UrlDeduplicator::new();
        let added = d.extend([
            "https://x.edu/content/a",
            "https://x.edu/content/b",
            "https://x.edu/content/a",
            "https://x.edu/content/A",
        ]);
        assert_eq!(added, 3);
        assert_eq!(
            d.into_urls(),
            vec![
                "https://x.edu/content/a",
                "https://x.edu/content/b",
                "https://x.edu/content/A",
            ]
        );
    }
}
