//! crates/edwin_core/src/extract.rs
//!
//! Page classification and readable-text extraction for the host page.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::domain::{PageContent, PageType};
use crate::identity::url_path;
use crate::ports::{HostPage, PageElement};
use crate::settings::ClientSettings;

const UNTITLED: &str = "Untitled Page";

fn single_assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/assignments/\d+").expect("valid assignment regex"))
}

fn newline_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("valid newline regex"))
}

fn space_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]{3,}").expect("valid space regex"))
}

/// Classifies a page by its URL path. Rules are ordered; the first match wins.
pub fn page_type(url: &str) -> PageType {
    let path = url_path(url);

    if path.contains("/assignments/syllabus") || path.ends_with("/syllabus") {
        PageType::Syllabus
    } else if single_assignment_pattern().is_match(&path) {
        PageType::Assignment
    } else if path.contains("/assignments") {
        PageType::Assignments
    } else if path.contains("/modules") {
        PageType::Modules
    } else if path.contains("/announcements") {
        PageType::Announcements
    } else if path.contains("/pages/") {
        PageType::Page
    } else {
        PageType::Unknown
    }
}

/// Collapses runs of 3+ newlines to a blank line and runs of 3+ spaces to one.
pub fn normalize_whitespace(text: &str) -> String {
    let text = newline_run_pattern().replace_all(text, "\n\n");
    let text = space_run_pattern().replace_all(&text, " ");
    text.trim().to_string()
}

/// The first `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head.trim())
}

pub struct PageExtractor {
    settings: Arc<ClientSettings>,
}

impl PageExtractor {
    pub fn new(settings: Arc<ClientSettings>) -> Self {
        Self { settings }
    }

    /// A fresh snapshot of the page's readable content.
    ///
    /// An empty `text` means there is nothing worth sending.
    pub fn extract(&self, page: &dyn HostPage) -> PageContent {
        let mut collected = String::new();

        for selector in &self.settings.content_selectors {
            for element in page.select(selector) {
                if self.is_own_ui(&element) {
                    continue;
                }
                let text = element.text.trim();
                if text.chars().count() > self.settings.min_block_chars {
                    collected.push_str(text);
                    collected.push_str("\n\n");
                }
            }
        }

        let text = normalize_whitespace(&collected);
        debug!(chars = text.len(), url = page.url(), "Extracted page content");

        PageContent {
            title: self.page_title(page),
            text,
            url: page.url().to_string(),
            page_type: page_type(page.url()),
        }
    }

    /// Breadcrumb or heading text, then the document title, then a placeholder.
    pub fn page_title(&self, page: &dyn HostPage) -> String {
        self.settings
            .title_selectors
            .iter()
            .filter_map(|selector| page.select(selector).into_iter().next())
            .map(|element| element.text.trim().to_string())
            .find(|title| !title.is_empty())
            .or_else(|| {
                page.document_title()
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty())
            })
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    fn is_own_ui(&self, element: &PageElement) -> bool {
        self.settings
            .skip_containers
            .iter()
            .any(|token| element.is_within(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ElementExt, FakePage};

    fn extractor() -> PageExtractor {
        PageExtractor::new(Arc::new(ClientSettings::default()))
    }

    #[test]
    fn classifies_canvas_paths() {
        let base = "https://canvas.example.edu/courses/12345";
        assert_eq!(page_type(&format!("{base}/assignments/syllabus")), PageType::Syllabus);
        assert_eq!(page_type(&format!("{base}/syllabus")), PageType::Syllabus);
        assert_eq!(page_type(&format!("{base}/assignments/998")), PageType::Assignment);
        assert_eq!(page_type(&format!("{base}/assignments")), PageType::Assignments);
        assert_eq!(page_type(&format!("{base}/modules")), PageType::Modules);
        assert_eq!(page_type(&format!("{base}/modules/items/5")), PageType::Modules);
        assert_eq!(page_type(&format!("{base}/announcements")), PageType::Announcements);
        assert_eq!(page_type(&format!("{base}/pages/welcome")), PageType::Page);
        assert_eq!(page_type(&format!("{base}/grades")), PageType::Unknown);
        assert_eq!(page_type("https://canvas.example.edu/"), PageType::Unknown);
    }

    #[test]
    fn query_strings_do_not_affect_classification() {
        assert_eq!(
            page_type("https://canvas.example.edu/courses/1/grades?from=/modules"),
            PageType::Unknown
        );
    }

    #[test]
    fn keeps_only_blocks_over_the_threshold() {
        let five = "abcde";
        let thirty = "x".repeat(30);
        let hundred = "y".repeat(100);
        let page = FakePage::new("https://canvas.example.edu/courses/1/modules")
            .with_element(".user_content", FakePage::element(five))
            .with_element(".user_content", FakePage::element(&thirty))
            .with_element(".user_content", FakePage::element(&hundred));

        let content = extractor().extract(&page);

        assert_eq!(content.text, format!("{}\n\n{}", thirty, hundred));
        assert!(!content.text.contains(five));
        assert_eq!(content.page_type, PageType::Modules);
        assert_eq!(content.url, "https://canvas.example.edu/courses/1/modules");
    }

    #[test]
    fn a_block_of_exactly_twenty_chars_is_dropped() {
        let page = FakePage::new("https://canvas.example.edu/courses/1/modules")
            .with_element("article", FakePage::element(&"z".repeat(20)));
        assert_eq!(extractor().extract(&page).text, "");
    }

    #[test]
    fn skips_the_clients_own_panels() {
        let inside_panel = FakePage::element("Text rendered inside the chat panel itself")
            .inside_id("edwin-panel");
        let inside_nav = FakePage::element("Course navigation links that are not content")
            .inside_class("course-navigation");
        let real = "The midterm covers chapters one through four.";
        let page = FakePage::new("https://canvas.example.edu/courses/1/announcements")
            .with_element("article", inside_panel)
            .with_element("article", inside_nav)
            .with_element("article", FakePage::element(real));

        assert_eq!(extractor().extract(&page).text, real);
    }

    #[test]
    fn empty_page_yields_empty_text() {
        let page = FakePage::new("https://canvas.example.edu/courses/1/modules");
        let content = extractor().extract(&page);
        assert_eq!(content.text, "");
        assert_eq!(content.title, "Untitled Page");
    }

    #[test]
    fn normalizes_runs_of_whitespace() {
        assert_eq!(normalize_whitespace("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_whitespace("a     b  c"), "a b  c");
        assert_eq!(normalize_whitespace("  \n a \n\n "), "a");
    }

    #[test]
    fn title_prefers_breadcrumb_then_heading_then_document() {
        let crumb = FakePage::new("https://x/courses/1/modules")
            .with_element(".ellipsible", FakePage::element(" Week 3 "))
            .with_element("h1", FakePage::element("Heading"));
        assert_eq!(extractor().page_title(&crumb), "Week 3");

        let heading = FakePage::new("https://x/courses/1/modules")
            .with_element("h1", FakePage::element("Heading"));
        assert_eq!(extractor().page_title(&heading), "Heading");

        let titled = FakePage::new("https://x/courses/1/modules").with_title("CSE 434: Modules");
        assert_eq!(extractor().page_title(&titled), "CSE 434: Modules");
    }

    #[test]
    fn excerpt_cuts_long_text() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdefghij klm", 10), "abcdefghij...");
    }
}
