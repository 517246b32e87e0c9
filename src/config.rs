use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::model::{Category, Language};

const DEFAULT_CONFIG_FILE: &str = "faculty";
const ENV_PREFIX: &str = "FACULTY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("marker {marker:?} points at unknown category {key:?}")]
    UnknownCategory { marker: String, key: String },
    #[error("label table names unknown category {0:?}")]
    UnknownLabelCategory(String),
    #[error("year range {min}..={max} is empty")]
    InvalidYearRange { min: i32, max: i32 },
    #[error("no supported languages configured")]
    NoLanguages,
    #[error("default language {0} is not in the supported language set")]
    UnsupportedDefaultLanguage(Language),
    #[error("invalid CSS selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    pub output_dir: String,
    pub base_url: String,
    pub listing_urls: Vec<String>,
    pub listing_link_selector: String,
    pub years: YearBounds,
    pub languages: Vec<Language>,
    pub default_language: Language,
    pub parser: ParserSettings,
    pub profile: ProfileSelectors,
    pub labels: BTreeMap<String, LabelPair>,
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct YearBounds {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Tried in order; the first selector with a match picks the scan root.
    pub content_roots: Vec<String>,
    /// Class tokens with this prefix open a section.
    pub field_class_prefix: String,
    /// Markers that close a section without producing citations.
    pub skip_markers: Vec<String>,
    pub sections: Vec<SectionMarker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionMarker {
    pub language: Language,
    pub marker: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileSelectors {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub education: String,
    pub courses_taught: String,
    pub research_interests: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelPair {
    pub en: String,
    pub tr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub concurrency: usize,
    pub delay_ms: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: "data/faculty.sqlite".into(),
            output_dir: "output".into(),
            base_url: "https://mis.bogazici.edu.tr".into(),
            listing_urls: [
                "full_time_faculty",
                "part_time_faculty",
                "faculty_members_contributing_to_department",
                "teaching_assistants",
            ]
            .iter()
            .map(|p| format!("https://mis.bogazici.edu.tr/{}", p))
            .collect(),
            listing_link_selector: r#".views-field-title a[href^="/content/"]"#.into(),
            years: YearBounds { min: 1950, max: 2030 },
            languages: vec![Language::En, Language::Tr],
            default_language: Language::En,
            parser: ParserSettings::default(),
            profile: ProfileSelectors::default(),
            labels: default_labels(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            content_roots: ["#content", ".region-content", "main", "body"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            field_class_prefix: "field-name-field-".into(),
            skip_markers: [
                "field-name-field-body-computed",
                "field-name-field-email",
                "field-name-field-phone-number",
                "field-name-field-website",
                "field-name-field-education",
                "field-name-field-courses-taught",
                "field-name-field-research-interests",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sections: default_sections(),
        }
    }
}

impl Default for ProfileSelectors {
    fn default() -> Self {
        ProfileSelectors {
            name: "h1.page-title, h1".into(),
            title: ".field-name-field-body-computed".into(),
            email: ".field-name-field-email a".into(),
            phone: ".field-name-field-phone-number".into(),
            website: ".field-name-field-website a".into(),
            education: ".field-name-field-education".into(),
            courses_taught: ".field-name-field-courses-taught".into(),
            research_interests: ".field-name-field-research-interests".into(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            concurrency: 4,
            delay_ms: 1000,
            max_retries: 3,
            base_backoff_ms: 2000,
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; faculty_citations/0.1)".into(),
        }
    }
}

fn default_sections() -> Vec<SectionMarker> {
    let fields = [
        ("field-name-field-international-article", Category::InternationalArticles),
        ("field-name-field-books-book-chapters", Category::InternationalBookChapters),
        ("field-name-field-national-articles", Category::NationalArticles),
        ("field-name-field-international-abstracts-", Category::InternationalConferencePapers),
        ("field-name-field-national-abstracts-", Category::NationalConferencePapers),
        ("field-name-field-national-books", Category::NationalBooks),
        ("field-name-field-national-conferences", Category::NationalConferences),
    ];
    let en_headings = [
        ("International Articles", Category::InternationalArticles),
        ("International Book Chapters", Category::InternationalBookChapters),
        ("Books / Book Chapters", Category::InternationalBookChapters),
        ("National Articles", Category::NationalArticles),
        ("International Conference Papers", Category::InternationalConferencePapers),
        ("International Abstracts / Proceedings", Category::InternationalConferencePapers),
        ("National Conference Papers", Category::NationalConferencePapers),
        ("National Abstracts / Proceedings", Category::NationalConferencePapers),
        ("National Books", Category::NationalBooks),
        ("National Conferences", Category::NationalConferences),
    ];
    let tr_headings = [
        ("Uluslararası Makaleler", Category::InternationalArticles),
        ("Uluslararası Kitap Bölümleri", Category::InternationalBookChapters),
        ("Ulusal Makaleler", Category::NationalArticles),
        ("Uluslararası Bildiriler", Category::InternationalConferencePapers),
        ("Ulusal Bildiriler", Category::NationalConferencePapers),
        ("Ulusal Kitaplar", Category::NationalBooks),
        ("Ulusal Konferanslar", Category::NationalConferences),
    ];

    let mut out = Vec::new();
    for language in [Language::En, Language::Tr] {
        for (marker, category) in fields {
            out.push(SectionMarker {
                language,
                marker: marker.to_string(),
                category: category.key().to_string(),
            });
        }
    }
    let headings_by_language = [(Language::En, &en_headings[..]), (Language::Tr, &tr_headings[..])];
    for (language, headings) in headings_by_language {
        for (marker, category) in headings {
            out.push(SectionMarker {
                language,
                marker: marker.to_string(),
                category: category.key().to_string(),
            });
        }
    }
    out
}

fn default_labels() -> BTreeMap<String, LabelPair> {
    [
        (Category::InternationalArticles, "International Articles", "Uluslararası Makaleler"),
        (
            Category::InternationalBookChapters,
            "International Book Chapters",
            "Uluslararası Kitap Bölümleri",
        ),
        (Category::NationalArticles, "National Articles", "Ulusal Makaleler"),
        (
            Category::InternationalConferencePapers,
            "International Conference Papers",
            "Uluslararası Bildiriler",
        ),
        (Category::NationalConferencePapers, "National Conference Papers", "Ulusal Bildiriler"),
        (Category::NationalBooks, "National Books", "Ulusal Kitaplar"),
        (Category::NationalConferences, "National Conferences", "Ulusal Konferanslar"),
        (Category::Unrecognized, "Unrecognized", "Tanımlanamayan"),
    ]
    .into_iter()
    .map(|(c, en, tr)| {
        (
            c.key().to_string(),
            LabelPair {
                en: en.to_string(),
                tr: tr.to_string(),
            },
        )
    })
    .collect()
}

/// Layering: built-in defaults, then `faculty.toml` (or `path`), then
/// `FACULTY_*` environment variables (`__` separates nested keys).
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    let settings = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("listing_urls")
                .with_list_parse_key("languages"),
        )
        .build()
        .context("Failed to read configuration")?;
    settings
        .try_deserialize::<Settings>()
        .context("Invalid configuration")
}

/// Bilingual display labels for categories.
#[derive(Debug, Clone)]
pub struct Labels {
    table: BTreeMap<Category, LabelPair>,
}

impl Labels {
    pub fn from_settings(labels: &BTreeMap<String, LabelPair>) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for (key, pair) in labels {
            let category = key
                .parse::<Category>()
                .map_err(ConfigError::UnknownLabelCategory)?;
            table.insert(category, pair.clone());
        }
        Ok(Labels { table })
    }

    /// Falls back to a title-cased key when no label is configured.
    pub fn label(&self, category: Category, language: Language) -> String {
        match self.table.get(&category) {
            Some(pair) => match language {
                Language::En => pair.en.clone(),
                Language::Tr => pair.tr.clone(),
            },
            None => title_case(category.key()),
        }
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
