use scraper::{ElementRef, Html, Selector};

use crate::config::{ConfigError, ParserSettings};

const SKIPPED_TAGS: &[&str] = &["nav", "header", "footer", "script", "style", "form", "noscript"];
const HEADING_TAGS: &[&str] = &["h2", "h3", "h4"];
const ITEM_TAGS: &[&str] = &["li", "p"];

/// Flat, document-ordered view of a profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Entering a field container; marker is its matching class token.
    Open(String),
    /// Leaving the most recent field container.
    Close,
    Heading(String),
    Item(String),
}

/// Where to look and what counts as a section container.
#[derive(Debug, Clone)]
pub struct Layout {
    roots: Vec<Selector>,
    field_class_prefix: String,
}

impl Layout {
    pub fn from_settings(settings: &ParserSettings) -> Result<Self, ConfigError> {
        let roots = settings
            .content_roots
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Layout {
            roots,
            field_class_prefix: settings.field_class_prefix.clone(),
        })
    }

    fn root<'a>(&self, document: &'a Html) -> ElementRef<'a> {
        self.roots
            .iter()
            .find_map(|sel| document.select(sel).next())
            .unwrap_or_else(|| document.root_element())
    }

    fn field_marker(&self, el: &ElementRef) -> Option<String> {
        if self.field_class_prefix.is_empty() {
            return None;
        }
        el.value()
            .classes()
            .find(|c| c.starts_with(&self.field_class_prefix))
            .map(str::to_string)
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

pub fn flatten(document: &Html, layout: &Layout) -> Vec<Block> {
    let mut blocks = Vec::new();
    walk(layout.root(document), layout, &mut blocks);
    blocks
}

fn walk(el: ElementRef, layout: &Layout, out: &mut Vec<Block>) {
    let name = el.value().name();

    if SKIPPED_TAGS.contains(&name) {
        return;
    }

    if HEADING_TAGS.contains(&name) {
        out.push(Block::Heading(element_text(&el)));
        return;
    }

    if ITEM_TAGS.contains(&name) {
        out.push(Block::Item(element_text(&el)));
        return;
    }

    let marker = layout.field_marker(&el);
    if let Some(m) = &marker {
        out.push(Block::Open(m.clone()));
    }
    for child in el.children().filter_map(ElementRef::wrap) {
        walk(child, layout, out);
    }
    if marker.is_some() {
        out.push(Block::Close);
    }
}

/// Concatenated text nodes; whitespace is left for the citation normalizer.
pub fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(html: &str) -> Vec<Block> {
        let layout = Layout::from_settings(&ParserSettings::default()).unwrap();
        flatten(&Html::parse_document(html), &layout)
    }

    #[test]
    fn field_container_wraps_items() {
        let b = blocks(
            r#"<body><div class="field field-name-field-national-articles">
                 <div class="field-label">National Articles:</div>
                 <ol><li>A (2001)</li><li>B (2002)</li></ol>
               </div></body>"#,
        );
        assert_eq!(
            b,
            vec![
                Block::Open("field-name-field-national-articles".into()),
                Block::Item("A (2001)".into()),
                Block::Item("B (2002)".into()),
                Block::Close,
            ]
        );
    }

    #[test]
    fn headings_and_paragraphs() {
        let b = blocks("<body><h2>Ulusal Makaleler</h2><p>X (1999)</p></body>");
        assert_eq!(
            b,
            vec![Block::Heading("Ulusal Makaleler".into()), Block::Item("X (1999)".into())]
        );
    }

    #[test]
    fn navigation_is_ignored() {
        let b = blocks("<body><nav><h2>Menu</h2><ul><li>Home</li></ul></nav><p>x</p></body>");
        assert_eq!(b, vec![Block::Item("x".into())]);
    }

    #[test]
    fn content_root_preferred_over_body() {
        let b = blocks(
            r#"<body><ul><li>sidebar</li></ul><div id="content"><p>main</p></div></body>"#,
        );
        assert_eq!(b, vec![Block::Item("main".into())]);
    }

    #[test]
    fn inline_markup_keeps_text_adjacent() {
        let b = blocks("<body><ul><li>Doe, J. (2001). <i>Title</i>. Venue.</li></ul></body>");
        assert_eq!(b, vec![Block::Item("Doe, J. (2001). Title. Venue.".into())]);
    }

    #[test]
    fn bad_selector_is_config_error() {
        let settings = ParserSettings {
            content_roots: vec!["div[".into()],
            ..ParserSettings::default()
        };
        assert!(matches!(
            Layout::from_settings(&settings),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn empty_document() {
        assert!(blocks("").is_empty());
    }
}
