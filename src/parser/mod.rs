pub mod blocks;
pub mod citation;
pub mod classify;
pub mod identity;
pub mod profile;
pub mod year;

use std::collections::BTreeSet;

use scraper::Html;

use crate::config::{ConfigError, Settings};
use crate::db::StoredPage;
use crate::model::{FacultyIdentity, FacultyRecord, Language, ParseReport};
use blocks::Layout;
use citation::CitationRecordBuilder;
use classify::CategoryClassifier;
use identity::IdentitySelectors;
use year::YearExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Identity fields (email, education, ...) plus citations.
    Full,
    /// Name and citations only.
    CitationsOnly,
}

/// Everything the pipeline reads from configuration, built once per run.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub years: YearExtractor,
    pub classifier: CategoryClassifier,
    pub builder: CitationRecordBuilder,
    pub layout: Layout,
    pub selectors: IdentitySelectors,
    pub languages: BTreeSet<Language>,
    pub default_language: Language,
}

impl ParseContext {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let languages: BTreeSet<Language> = settings.languages.iter().copied().collect();
        if languages.is_empty() {
            return Err(ConfigError::NoLanguages);
        }
        if !languages.contains(&settings.default_language) {
            return Err(ConfigError::UnsupportedDefaultLanguage(settings.default_language));
        }
        let years = YearExtractor::new(settings.years)?;
        Ok(ParseContext {
            years,
            classifier: CategoryClassifier::from_settings(&settings.parser, &languages)?,
            builder: CitationRecordBuilder::new(years),
            layout: Layout::from_settings(&settings.parser)?,
            selectors: IdentitySelectors::from_settings(&settings.profile)?,
            languages,
            default_language: settings.default_language,
        })
    }
}

pub struct ProcessedProfile {
    pub record: FacultyRecord,
    pub report: ParseReport,
}

/// HTML → DOM → blocks → sections → deduplicated faculty record.
pub fn process_page(page: &StoredPage, mode: ParseMode, ctx: &ParseContext) -> ProcessedProfile {
    let document = Html::parse_document(&page.html);
    let (record, report) = profile::parse(&document, FacultyIdentity::stub(&page.url), mode, ctx);
    ProcessedProfile { record, report }
}
