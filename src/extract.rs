//! Readable-text extraction from parsed HTML.
//!
//! The input document is never mutated: noise is detached from a private copy,
//! then the surviving `<body>` is walked in document order, skipping anything
//! a browser would not render.

use lazy_static::lazy_static;
use scraper::{node::Element, ElementRef, Html, Node, Selector};

/// Elements that never contribute to the extracted text. Closed list.
const NOISE_SELECTOR: &str = "script, style, noscript, iframe, object, embed, \
     nav, footer, header, aside, .ad, .ads, .advertisement, \
     [role='alert'], [role='banner'], [role='navigation'], \
     [role='contentinfo'], [role='complementary']";

/// Elements rendered as their own block, so text on either side is separated.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "form", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main",
    "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

lazy_static! {
    static ref NOISE: Selector = Selector::parse(NOISE_SELECTOR).unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref H1: Selector = Selector::parse("h1").unwrap();
}

/// Extracted content from a webpage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// The original URL
    pub url: String,
    /// Page title, empty when the page has none
    pub title: String,
    /// Visible text, noise-stripped and whitespace-collapsed
    pub text: String,
}

/// Parse `html` and extract its readable content.
pub fn extract_html(html: &str, url: &str) -> ExtractedContent {
    extract(&Html::parse_document(html), url)
}

/// Extract the title and visible text of `document`.
pub fn extract(document: &Html, url: &str) -> ExtractedContent {
    let title = extract_title(document);

    let mut copy = document.clone();
    strip_noise(&mut copy);

    let mut rendered = String::new();
    match copy.select(&BODY).next() {
        Some(body) => push_rendered_text(body, true, &mut rendered),
        None => push_rendered_text(copy.root_element(), true, &mut rendered),
    }

    ExtractedContent {
        url: url.to_string(),
        title,
        text: collapse_whitespace(&rendered),
    }
}

/// Replace every run of whitespace with a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the page title from <title> or <h1>
fn extract_title(document: &Html) -> String {
    [&*TITLE, &*H1]
        .into_iter()
        .filter_map(|selector| document.select(selector).next())
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .find(|title| !title.is_empty())
        .unwrap_or_default()
}

fn strip_noise(document: &mut Html) {
    let noisy: Vec<_> = document.select(&NOISE).map(|element| element.id()).collect();
    for id in noisy {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn push_rendered_text(element: ElementRef<'_>, visible: bool, out: &mut String) {
    let el = element.value();
    if is_display_none(el) {
        return;
    }

    // `visibility` is inherited but, unlike `display`, a descendant may undo it.
    let visible = match style_property(el, "visibility").as_deref() {
        Some("hidden" | "collapse") => false,
        Some("visible") => true,
        _ => visible,
    };
    // A closed <details> renders only its <summary>.
    let collapsed = el.name() == "details" && el.attr("open").is_none();

    let block = BLOCK_ELEMENTS.contains(&el.name());
    if block {
        out.push(' ');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) if visible && !collapsed => out.push_str(text),
            Node::Element(child_el) if !collapsed || child_el.name() == "summary" => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_rendered_text(child, visible, out);
                }
            }
            _ => {}
        }
    }

    if block {
        out.push(' ');
    }
}

/// Whether layout removes this element and its whole subtree.
fn is_display_none(element: &Element) -> bool {
    match element.name() {
        "template" => return true,
        "dialog" if element.attr("open").is_none() => return true,
        _ => {}
    }
    element.attr("hidden").is_some()
        || style_property(element, "display").as_deref() == Some("none")
}

/// Last value of `property` in the inline style, lower-cased.
fn style_property(element: &Element, property: &str) -> Option<String> {
    element
        .attr("style")?
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .map(|(_, value)| {
            value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase()
        })
        .last()
}
