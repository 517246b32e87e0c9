use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Publication type a citation belongs to. Closed set: configuration may only
/// point markers at these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    InternationalArticles,
    InternationalBookChapters,
    NationalArticles,
    InternationalConferencePapers,
    NationalConferencePapers,
    NationalBooks,
    NationalConferences,
    Unrecognized,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::InternationalArticles,
        Category::InternationalBookChapters,
        Category::NationalArticles,
        Category::InternationalConferencePapers,
        Category::NationalConferencePapers,
        Category::NationalBooks,
        Category::NationalConferences,
        Category::Unrecognized,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::InternationalArticles => "international_articles",
            Category::InternationalBookChapters => "international_book_chapters",
            Category::NationalArticles => "national_articles",
            Category::InternationalConferencePapers => "international_conference_papers",
            Category::NationalConferencePapers => "national_conference_papers",
            Category::NationalBooks => "national_books",
            Category::NationalConferences => "national_conferences",
            Category::Unrecognized => "unrecognized",
        }
    }

    pub fn is_recognized(self) -> bool {
        self != Category::Unrecognized
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Tr,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Tr => "tr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Accepts bare tags and region variants ("tr-TR", "en_US").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Language::En),
            "tr" => Ok(Language::Tr),
            _ => Err(s.to_string()),
        }
    }
}

/// Who a profile belongs to. The profile URL is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacultyIdentity {
    pub url: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl FacultyIdentity {
    pub fn stub(url: &str) -> Self {
        FacultyIdentity {
            url: url.to_string(),
            name: None,
            email: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Identity fields only filled in full mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub title: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub education: Option<String>,
    pub courses_taught: Option<String>,
    pub research_interests: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub category: Category,
    /// `None` means the year could not be determined within the valid range.
    pub year: Option<i32>,
    pub language: Language,
    pub text: String,
    pub doi: Option<String>,
    pub owner: FacultyIdentity,
}

impl CitationRecord {
    /// Dedupe identity: lowercased normalized text plus category.
    pub fn identity_key(&self) -> (String, Category) {
        (self.text.to_lowercase(), self.category)
    }
}

/// A citation dropped during dedupe, next to the one that was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCitation {
    pub category: Category,
    pub kept: String,
    pub dropped: String,
    /// Both texts carry the same DOI.
    pub doi_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyRecord {
    pub identity: FacultyIdentity,
    pub details: Option<ProfileDetails>,
    pub citations: BTreeMap<Category, Vec<CitationRecord>>,
    #[serde(default)]
    pub duplicates: Vec<DuplicateCitation>,
}

impl FacultyRecord {
    pub fn empty(identity: FacultyIdentity) -> Self {
        FacultyRecord {
            identity,
            details: None,
            citations: BTreeMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// Citations in category order, insertion order within a category.
    pub fn iter_citations(&self) -> impl Iterator<Item = &CitationRecord> {
        self.citations.values().flatten()
    }

    pub fn citation_count(&self) -> usize {
        self.citations.values().map(Vec::len).sum()
    }

    pub fn count_in(&self, category: Category) -> usize {
        self.citations.get(&category).map_or(0, Vec::len)
    }
}

/// Non-fatal outcomes of parsing one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub emitted: usize,
    pub malformed: usize,
    pub unrecognized: usize,
    pub unknown_year: usize,
    pub duplicates: usize,
    pub structure_missing: bool,
}

impl ParseReport {
    pub fn absorb(&mut self, other: &ParseReport) {
        self.emitted += other.emitted;
        self.malformed += other.malformed;
        self.unrecognized += other.unrecognized;
        self.unknown_year += other.unknown_year;
        self.duplicates += other.duplicates;
        self.structure_missing |= other.structure_missing;
    }
}
