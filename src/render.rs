//! Saveable markdown output for a finished summary.

use crate::extract::ExtractedContent;
use chrono::{DateTime, NaiveDate, Utc};

const MAX_SLUG_CHARS: usize = 60;

/// Markdown document with a title, a provenance line and the summary body.
pub fn markdown_document(
    content: &ExtractedContent,
    summary: &str,
    model: Option<&str>,
    generated_at: DateTime<Utc>,
) -> String {
    let title = if content.title.is_empty() {
        "Summary"
    } else {
        content.title.as_str()
    };

    let mut provenance = format!("Source: <{}>", content.url);
    if let Some(model) = model {
        provenance.push_str(&format!(" · Model: `{model}`"));
    }
    provenance.push_str(&format!(
        " · Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    format!("# {title}\n\n_{provenance}_\n\n{}\n", summary.trim())
}

/// File name for a saved summary, e.g. `rust-in-production-2026-10-18.md`.
pub fn file_name(title: &str, date: NaiveDate) -> String {
    format!("{}-{}.md", slug(title), date.format("%Y-%m-%d"))
}

fn slug(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "summary".to_string()
    } else {
        slug.to_string()
    }
}
