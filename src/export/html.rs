use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use super::YearGroup;
use crate::config::Labels;
use crate::model::{Category, Language};

fn unknown_year_label(language: Language) -> &'static str {
    match language {
        Language::En => "Unknown Year",
        Language::Tr => "Yılı Bilinmeyen",
    }
}

fn title(language: Language) -> &'static str {
    match language {
        Language::En => "Faculty Publications",
        Language::Tr => "Öğretim Üyesi Yayınları",
    }
}

pub fn render(
    organized: &BTreeMap<Category, Vec<YearGroup<'_>>>,
    labels: &Labels,
    language: Language,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"{}\">", language);
    let _ = writeln!(
        out,
        "<head><meta charset=\"utf-8\"><title>{}</title></head>",
        title(language)
    );
    let _ = writeln!(out, "<body>");

    for (category, years) in organized {
        let count: usize = years.iter().map(|(_, c)| c.len()).sum();
        let _ = writeln!(
            out,
            "<h1>{} ({})</h1>",
            html_escape(&labels.label(*category, language)),
            count
        );
        for (year, citations) in years {
            let heading = match year {
                Some(y) => y.to_string(),
                None => unknown_year_label(language).to_string(),
            };
            let _ = writeln!(out, "<h2>{}</h2>", html_escape(&heading));
            let _ = writeln!(out, "<ol>");
            for c in citations {
                let _ = writeln!(
                    out,
                    "<li>{}: {}</li>",
                    html_escape(c.owner.display_name()),
                    html_escape(&c.text)
                );
            }
            let _ = writeln!(out, "</ol>");
        }
    }

    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    out
}

pub fn write_citations(
    path: &Path,
    organized: &BTreeMap<Category, Vec<YearGroup<'_>>>,
    labels: &Labels,
    language: Language,
) -> Result<()> {
    std::fs::write(path, render(organized, labels, language))
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
