use scraper::{Html, Selector};

use super::blocks::{element_text, parse_selector};
use crate::config::{ConfigError, ProfileSelectors};
use crate::model::{FacultyIdentity, ProfileDetails};

/// Compiled selectors for the identity fields of a profile page.
#[derive(Debug, Clone)]
pub struct IdentitySelectors {
    name: Selector,
    title: Selector,
    email: Selector,
    phone: Selector,
    website: Selector,
    education: Selector,
    courses_taught: Selector,
    research_interests: Selector,
}

impl IdentitySelectors {
    pub fn from_settings(s: &ProfileSelectors) -> Result<Self, ConfigError> {
        Ok(IdentitySelectors {
            name: parse_selector(&s.name)?,
            title: parse_selector(&s.title)?,
            email: parse_selector(&s.email)?,
            phone: parse_selector(&s.phone)?,
            website: parse_selector(&s.website)?,
            education: parse_selector(&s.education)?,
            courses_taught: parse_selector(&s.courses_taught)?,
            research_interests: parse_selector(&s.research_interests)?,
        })
    }
}

/// Citations-only mode still needs the name to attribute citations.
pub fn extract_name(
    document: &Html,
    stub: FacultyIdentity,
    sel: &IdentitySelectors,
) -> FacultyIdentity {
    FacultyIdentity {
        name: select_text(document, &sel.name).or(stub.name),
        ..stub
    }
}

pub fn extract_full(
    document: &Html,
    stub: FacultyIdentity,
    sel: &IdentitySelectors,
) -> (FacultyIdentity, ProfileDetails) {
    let email = select_href(document, &sel.email)
        .map(|href| href.trim_start_matches("mailto:").to_string())
        .or_else(|| select_text(document, &sel.email));

    let identity = FacultyIdentity {
        email: email.or(stub.email.clone()),
        ..extract_name(document, stub, sel)
    };

    let details = ProfileDetails {
        title: select_text(document, &sel.title),
        phone: select_text(document, &sel.phone),
        website: select_href(document, &sel.website),
        education: select_text(document, &sel.education),
        courses_taught: select_text(document, &sel.courses_taught),
        research_interests: select_text(document, &sel.research_interests),
    };

    (identity, details)
}

fn select_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .next()
        .map(|el| element_text(&el).split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

fn select_href(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}
