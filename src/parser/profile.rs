use std::collections::BTreeMap;

use scraper::{Html, Selector};
use tracing::debug;

use super::blocks::{self, Block};
use super::classify::Classification;
use super::{identity, ParseContext, ParseMode};
use crate::dedupe::Deduplicator;
use crate::model::{
    Category, CitationRecord, FacultyIdentity, FacultyRecord, Language, ParseReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionContext {
    pub category: Category,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseState {
    ScanningForSection,
    WithinSection(SectionContext),
    /// Holds the raw item text until the driver has handled it.
    EmittingCitation(SectionContext, String),
    EndOfDocument,
}

impl ParseState {
    /// Transition on one block. `classify` resolves section markers.
    pub fn on_block<F>(self, block: &Block, classify: F) -> ParseState
    where
        F: Fn(&str) -> Classification,
    {
        let state = self.resume();
        if state == ParseState::EndOfDocument {
            return state;
        }
        match block {
            Block::Open(marker) | Block::Heading(marker) => match classify(marker) {
                Classification::Section { category, language } => {
                    ParseState::WithinSection(SectionContext { category, language })
                }
                Classification::Skip => ParseState::ScanningForSection,
            },
            Block::Close => ParseState::ScanningForSection,
            Block::Item(text) => match state {
                ParseState::WithinSection(ctx) => ParseState::EmittingCitation(ctx, text.clone()),
                other => other,
            },
        }
    }

    /// Back to the enclosing section once an emitted citation is handled.
    pub fn resume(self) -> ParseState {
        match self {
            ParseState::EmittingCitation(ctx, _) => ParseState::WithinSection(ctx),
            other => other,
        }
    }

    pub fn finish(self) -> ParseState {
        ParseState::EndOfDocument
    }

    /// Section the machine is currently inside, if any.
    pub fn section(&self) -> Option<SectionContext> {
        match self {
            ParseState::WithinSection(ctx) | ParseState::EmittingCitation(ctx, _) => Some(*ctx),
            _ => None,
        }
    }

    /// After a nested container closes, continue the section that enclosed it.
    pub fn reopen(self, enclosing: Option<SectionContext>) -> ParseState {
        match (self, enclosing) {
            (ParseState::ScanningForSection, Some(ctx)) => ParseState::WithinSection(ctx),
            (state, _) => state,
        }
    }
}

/// Citations found in one document, before deduplication.
#[derive(Debug, Default)]
pub struct Extraction {
    pub citations: Vec<CitationRecord>,
    pub malformed: usize,
    pub sections_seen: usize,
}

/// Shared by both modes so category/year/dedupe behave identically.
pub fn extract_citations(
    blocks: &[Block],
    owner: &FacultyIdentity,
    hint: Language,
    ctx: &ParseContext,
) -> Extraction {
    let mut out = Extraction::default();
    let mut state = ParseState::ScanningForSection;
    // Section in effect when each still-open container was entered.
    let mut enclosing: Vec<Option<SectionContext>> = Vec::new();
    let classify = |marker: &str| ctx.classifier.classify(marker, hint);

    for block in blocks {
        state = match block {
            Block::Open(_) => {
                enclosing.push(state.section());
                state.on_block(block, classify)
            }
            Block::Close => state
                .on_block(block, classify)
                .reopen(enclosing.pop().flatten()),
            _ => state.on_block(block, classify),
        };
        match &state {
            ParseState::WithinSection(_) if matches!(block, Block::Open(_) | Block::Heading(_)) => {
                out.sections_seen += 1;
            }
            ParseState::EmittingCitation(section, raw) => {
                let year = ctx.years.extract(raw);
                match ctx
                    .builder
                    .build(raw, section.category, year, section.language, owner)
                {
                    Ok(record) => out.citations.push(record),
                    Err(rejection) => {
                        debug!(url = %owner.url, "{}", rejection);
                        out.malformed += 1;
                    }
                }
            }
            _ => {}
        }
    }
    state = state.finish();
    debug_assert_eq!(state, ParseState::EndOfDocument);

    out
}

/// Parse one profile into a deduplicated record plus a report of what was skipped.
pub fn parse(
    document: &Html,
    identity_stub: FacultyIdentity,
    mode: ParseMode,
    ctx: &ParseContext,
) -> (FacultyRecord, ParseReport) {
    let hint = document_language(document, ctx);
    let (identity, details) = match mode {
        ParseMode::Full => {
            let (identity, details) =
                identity::extract_full(document, identity_stub, &ctx.selectors);
            (identity, Some(details))
        }
        ParseMode::CitationsOnly => (
            identity::extract_name(document, identity_stub, &ctx.selectors),
            None,
        ),
    };

    let blocks = blocks::flatten(document, &ctx.layout);
    let extraction = extract_citations(&blocks, &identity, hint, ctx);

    let outcome = Deduplicator::new().dedupe_with_report(extraction.citations);
    for dup in &outcome.removed {
        debug!(
            url = %identity.url,
            kept = %dup.kept,
            dropped = %dup.dropped,
            "duplicate citation"
        );
    }

    let report = ParseReport {
        emitted: outcome.kept.len(),
        malformed: extraction.malformed,
        unrecognized: outcome
            .kept
            .iter()
            .filter(|c| !c.category.is_recognized())
            .count(),
        unknown_year: outcome.kept.iter().filter(|c| c.year.is_none()).count(),
        duplicates: outcome.removed.len(),
        structure_missing: extraction.sections_seen == 0,
    };

    let mut citations: BTreeMap<Category, Vec<CitationRecord>> = BTreeMap::new();
    for record in outcome.kept {
        citations.entry(record.category).or_default().push(record);
    }

    (
        FacultyRecord {
            identity,
            details,
            citations,
            duplicates: outcome.removed,
        },
        report,
    )
}

/// `<html lang>` when it names a supported language, else the configured default.
pub fn document_language(document: &Html, ctx: &ParseContext) -> Language {
    let Ok(sel) = Selector::parse("html") else {
        return ctx.default_language;
    };
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .and_then(|lang| lang.parse::<Language>().ok())
        .filter(|lang| ctx.languages.contains(lang))
        .unwrap_or(ctx.default_language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::parser::classify::Classification;

    fn ctx() -> ParseContext {
        ParseContext::from_settings(&Settings::default()).unwrap()
    }

    fn stub() -> FacultyIdentity {
        FacultyIdentity::stub("https://mis.bogazici.edu.tr/content/jane-doe")
    }

    fn parse_html(html: &str, mode: ParseMode) -> (FacultyRecord, ParseReport) {
        parse(&Html::parse_document(html), stub(), mode, &ctx())
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    const SECTION: Classification = Classification::Section {
        category: Category::NationalArticles,
        language: Language::En,
    };

    #[test]
    fn state_transitions() {
        let s = ParseState::ScanningForSection;
        let s = s.on_block(&Block::Item("stray".into()), |_| SECTION);
        assert_eq!(s, ParseState::ScanningForSection);

        let s = s.on_block(&Block::Heading("National Articles".into()), |_| SECTION);
        let ctx = SectionContext {
            category: Category::NationalArticles,
            language: Language::En,
        };
        assert_eq!(s, ParseState::WithinSection(ctx));

        let s = s.on_block(&Block::Item("A (2001)".into()), |_| SECTION);
        assert_eq!(s, ParseState::EmittingCitation(ctx, "A (2001)".into()));

        let s = s.on_block(&Block::Close, |_| SECTION);
        assert_eq!(s, ParseState::ScanningForSection);

        assert_eq!(s.finish(), ParseState::EndOfDocument);
    }

    #[test]
    fn skip_marker_ends_section() {
        let s = ParseState::WithinSection(SectionContext {
            category: Category::NationalArticles,
            language: Language::En,
        });
        let s = s.on_block(&Block::Open("field-name-field-email".into()), |_| Classification::Skip);
        assert_eq!(s, ParseState::ScanningForSection);
    }

    #[test]
    fn reopen_restores_enclosing_section() {
        let outer = SectionContext {
            category: Category::InternationalArticles,
            language: Language::En,
        };
        assert_eq!(
            ParseState::ScanningForSection.reopen(Some(outer)),
            ParseState::WithinSection(outer)
        );
        assert_eq!(ParseState::ScanningForSection.reopen(None), ParseState::ScanningForSection);
        assert_eq!(
            ParseState::EmittingCitation(outer, "x".into()).section(),
            Some(outer)
        );
    }

    #[test]
    fn nested_container_resumes_outer_section() {
        let (record, report) = parse_html(
            r#"<body><div class="field-name-field-international-article">
                 <ul><li>A (2001) x</li></ul>
                 <div class="field-name-field-note"><p>note</p></div>
                 <ul><li>B (2002) y</li></ul>
               </div></body>"#,
            ParseMode::CitationsOnly,
        );
        let texts: Vec<_> = record.citations[&Category::InternationalArticles]
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["A (2001) x", "B (2002) y"]);
        assert_eq!(record.count_in(Category::Unrecognized), 1);
        assert_eq!(report.emitted, 3);
    }

    #[test]
    fn nested_skip_container_resumes_outer_section() {
        let (record, _) = parse_html(
            r#"<body><div class="field-name-field-national-articles">
                 <p>A (2001) x</p>
                 <div class="field-name-field-email"><p>a@b.edu</p></div>
                 <p>B (2002) y</p>
               </div><p>After (2003) z</p></body>"#,
            ParseMode::CitationsOnly,
        );
        assert_eq!(record.count_in(Category::NationalArticles), 2);
        assert_eq!(record.citation_count(), 2);
    }

    #[test]
    fn end_of_document_is_terminal() {
        let s = ParseState::EndOfDocument.on_block(&Block::Heading("x".into()), |_| SECTION);
        assert_eq!(s, ParseState::EndOfDocument);
    }

    #[test]
    fn malformed_item_skipped_profile_continues() {
        let (record, report) = parse_html(
            "<body><h2>National Articles</h2>\
             <ul><li>A (2001)</li><li> • </li><li>B (2002)</li></ul></body>",
            ParseMode::CitationsOnly,
        );
        assert_eq!(record.count_in(Category::NationalArticles), 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.emitted, 2);
    }

    #[test]
    fn duplicate_citations_in_same_category_collapse() {
        let (record, report) = parse_html(
            "<body><h2>National Articles</h2>\
             <ul><li>Doe, J. (2001). X.</li><li>doe, j.  (2001). x.</li></ul></body>",
            ParseMode::CitationsOnly,
        );
        let kept = &record.citations[&Category::NationalArticles];
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Doe, J. (2001). X.");
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn same_text_in_two_categories_kept_twice() {
        let (record, _) = parse_html(
            "<body><h2>National Articles</h2><p>Doe (2001) X</p>\
             <h2>National Books</h2><p>Doe (2001) X</p></body>",
            ParseMode::CitationsOnly,
        );
        assert_eq!(record.citation_count(), 2);
    }

    #[test]
    fn unrecognized_heading_still_recorded() {
        let (record, report) = parse_html(
            "<body><h2>Patents</h2><ul><li>Doe, J. (2015). Widget.</li></ul></body>",
            ParseMode::CitationsOnly,
        );
        let c = &record.citations[&Category::Unrecognized];
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].year, Some(2015));
        assert_eq!(report.unrecognized, 1);
        assert!(!report.structure_missing);
    }

    #[test]
    fn no_sections_yields_empty_record() {
        let (record, report) = parse_html(
            "<body><p>Welcome to my page</p></body>",
            ParseMode::Full,
        );
        assert_eq!(record.citation_count(), 0);
        assert!(report.structure_missing);
        assert_eq!(record.identity.url, stub().url);
    }

    #[test]
    fn html_lang_is_the_hint() {
        let (record, _) = parse_html(
            concat!(
                r#"<html lang="tr"><body><div class="field-name-field-national-articles">"#,
                "<ul><li>A (2001)</li></ul></div></body></html>",
            ),
            ParseMode::CitationsOnly,
        );
        assert_eq!(record.citations[&Category::NationalArticles][0].language, Language::Tr);
    }

    #[test]
    fn unknown_year_retained() {
        let (record, report) = parse_html(
            "<body><h2>National Conferences</h2><p>Proceedings (1899)</p></body>",
            ParseMode::CitationsOnly,
        );
        assert_eq!(record.citations[&Category::NationalConferences][0].year, None);
        assert_eq!(report.unknown_year, 1);
    }

    #[test]
    fn english_fixture_full_mode() {
        let (record, report) = parse_html(&fixture("profile_en"), ParseMode::Full);
        assert_eq!(record.identity.name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.identity.email.as_deref(), Some("jane.doe@example.edu"));
        let details = record.details.as_ref().unwrap();
        assert!(details.education.as_deref().unwrap().contains("PhD"));
        assert_eq!(record.count_in(Category::InternationalArticles), 3);
        assert_eq!(record.count_in(Category::InternationalBookChapters), 1);
        assert_eq!(record.count_in(Category::NationalArticles), 1);
        assert_eq!(record.count_in(Category::InternationalConferencePapers), 2);
        assert_eq!(record.count_in(Category::NationalConferencePapers), 1);
        assert_eq!(record.count_in(Category::Unrecognized), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(record.duplicates.len(), 1);
        assert_eq!(record.duplicates[0].category, Category::InternationalArticles);
        assert!(record.duplicates[0].kept.starts_with("Doe, J. (2015). Information sharing"));
        assert_eq!(report.malformed, 1);
        // Education list items never become citations.
        assert!(record.iter_citations().all(|c| !c.text.contains("PhD")));
        // Navigation menu is outside the content root.
        assert!(record.iter_citations().all(|c| !c.text.contains("Home")));
    }

    #[test]
    fn citations_only_mode_matches_full_mode_citations() {
        let html = fixture("profile_en");
        let (full, full_report) = parse_html(&html, ParseMode::Full);
        let (quick, quick_report) = parse_html(&html, ParseMode::CitationsOnly);
        assert_eq!(full.citations.len(), quick.citations.len());
        for (category, records) in &full.citations {
            let texts: Vec<_> = records.iter().map(|c| (&c.text, c.year)).collect();
            let other: Vec<_> =
                quick.citations[category].iter().map(|c| (&c.text, c.year)).collect();
            assert_eq!(texts, other);
        }
        assert_eq!(full_report, quick_report);
        assert!(quick.details.is_none());
        assert_eq!(quick.identity.name.as_deref(), Some("Jane Doe"));
        assert_eq!(quick.identity.email, None);
    }

    #[test]
    fn turkish_fixture() {
        let (record, _) = parse_html(&fixture("profile_tr"), ParseMode::Full);
        assert_eq!(record.count_in(Category::InternationalArticles), 2);
        assert_eq!(record.count_in(Category::NationalConferencePapers), 1);
        assert_eq!(record.count_in(Category::NationalBooks), 1);
        assert!(record.iter_citations().all(|c| c.language == Language::Tr));
        let years: Vec<_> = record.citations[&Category::InternationalArticles]
            .iter()
            .map(|c| c.year)
            .collect();
        assert_eq!(years, vec![Some(2021), None]);
    }
}
