//! services/client/src/adapters/html_page.rs
//!
//! A `HostPage` backed by a saved or fetched HTML document.
//!
//! `scraper::Html` is not `Sync`, so the page keeps the source text and parses
//! it again for every query.

use edwin_core::ports::{ElementMark, HostPage, PageElement};
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ClientError;

pub struct HtmlPage {
    url: String,
    source: String,
}

impl HtmlPage {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Loads a page saved from the browser; `url` is where it was saved from.
    pub async fn from_file(url: &str, path: &Path) -> Result<Self, ClientError> {
        let source = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), bytes = source.len(), "Loaded page snapshot");
        Ok(Self::new(url, source))
    }

    /// Downloads the page. Only pages readable without a Canvas session work this way.
    pub async fn fetch(http: &reqwest::Client, url: &str) -> Result<Self, ClientError> {
        let source = http.get(url).send().await?.error_for_status()?.text().await?;
        debug!(url, bytes = source.len(), "Fetched page");
        Ok(Self::new(url, source))
    }
}

fn mark(element: &ElementRef<'_>) -> ElementMark {
    let value = element.value();
    ElementMark {
        id: value.id().map(str::to_string),
        classes: value.classes().map(str::to_string).collect(),
    }
}

fn snapshot(element: ElementRef<'_>) -> PageElement {
    let lineage = std::iter::once(mark(&element))
        .chain(element.ancestors().filter_map(ElementRef::wrap).map(|a| mark(&a)))
        .collect();

    PageElement {
        text: element.text().collect::<String>(),
        attributes: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        lineage,
    }
}

impl HostPage for HtmlPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn document_title(&self) -> Option<String> {
        self.select("title").into_iter().next().map(|e| e.text)
    }

    fn select(&self, selector: &str) -> Vec<PageElement> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(selector, error = ?e, "Skipping unparseable selector");
                return Vec::new();
            }
        };
        let document = Html::parse_document(&self.source);
        document.select(&parsed).map(snapshot).collect()
    }
}
