//! Content extraction: recovering a file's bytes from whatever the remote sent.
//!
//! Raw locators yield exact bytes, classified as text, binary or empty.
//! Rendered pages go through an ordered [`ExtractionStrategy`] chain where
//! the first match wins. A page nothing matches counts as empty.

mod strategies;

use scraper::Html;
use tracing::debug;

use crate::discovery::{ContentSurface, TreeEntry};
use crate::gateway::{FetchMode, Gateway, short_error_message};

pub use strategies::{BinaryAffordance, CodeTable, EmbeddedRawLines, LegacyTextArea};

/// How many leading bytes are scanned for NUL when classifying raw content.
pub const BINARY_SNIFF_LEN: usize = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Text(Vec<u8>),
    Binary,
    Empty,
    Failed(String),
}

/// One way of reading a rendered page. `None` means the page is not in this
/// strategy's format.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_extract(&self, document: &Html) -> Option<ExtractionResult>;
}

pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(EmbeddedRawLines),
            Box::new(CodeTable),
            Box::new(LegacyTextArea),
            Box::new(BinaryAffordance),
        ])
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the strategy chain over a rendered page.
    pub fn extract_document(&self, body: &str) -> ExtractionResult {
        let document = Html::parse_document(body);

        for strategy in &self.strategies {
            if let Some(result) = strategy.try_extract(&document) {
                debug!(strategy = strategy.name(), "extraction strategy matched");
                return result;
            }
        }

        ExtractionResult::Empty
    }

    /// Fetch and extract one file entry. Network failures become `Failed`.
    pub async fn extract(&self, gateway: &Gateway, entry: &TreeEntry) -> ExtractionResult {
        let mode = match entry.surface {
            ContentSurface::Raw => FetchMode::Raw,
            ContentSurface::Rendered => FetchMode::Rendered,
        };

        let fetched = match gateway.fetch(&entry.locator, mode).await {
            Ok(fetched) => fetched,
            Err(e) => return ExtractionResult::Failed(short_error_message(&e)),
        };

        match entry.surface {
            ContentSurface::Raw => classify_bytes(fetched.into_bytes()),
            ContentSurface::Rendered => self.extract_document(&fetched.into_text()),
        }
    }
}

/// Classify exact file bytes.
pub fn classify_bytes(bytes: Vec<u8>) -> ExtractionResult {
    if bytes.is_empty() {
        return ExtractionResult::Empty;
    }
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if head.contains(&0) {
        return ExtractionResult::Binary;
    }
    ExtractionResult::Text(bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::GatewayOptions;
    use crate::http::{HttpError, HttpMethod, MockTransport};

    #[test]
    fn classify_bytes_detects_binary_in_sniff_window() {
        assert_eq!(classify_bytes(Vec::new()), ExtractionResult::Empty);
        assert_eq!(classify_bytes(b"GIF\0\x01".to_vec()), ExtractionResult::Binary);
        assert_eq!(
            classify_bytes(b"plain".to_vec()),
            ExtractionResult::Text(b"plain".to_vec())
        );

        let mut late_nul = vec![b'a'; BINARY_SNIFF_LEN];
        late_nul.push(0);
        assert!(matches!(classify_bytes(late_nul), ExtractionResult::Text(_)));
    }

    #[test]
    fn chain_prefers_earlier_strategies() {
        let extractor = Extractor::default();
        let body = r#"<html><body>
            <script type="application/json">{"payload":{"blob":{"rawLines":["from payload"]}}}</script>
            <table><tr><td class="blob-code">from table</td></tr></table>
            <a id="raw-url" href="/raw">Raw</a>
            </body></html>"#;

        assert_eq!(
            extractor.extract_document(body),
            ExtractionResult::Text(b"from payload".to_vec())
        );
    }

    #[test]
    fn unmatched_page_is_empty_and_raw_link_is_binary() {
        let extractor = Extractor::default();
        assert_eq!(
            extractor.extract_document("<html><body><p>nothing</p></body></html>"),
            ExtractionResult::Empty
        );
        assert_eq!(
            extractor.extract_document(r#"<html><body><a href="/r">View raw</a></body></html>"#),
            ExtractionResult::Binary
        );
    }

    #[test]
    fn custom_chain_is_respected() {
        let extractor = Extractor::new(vec![Box::new(BinaryAffordance)]);
        assert_eq!(extractor.strategy_names(), vec!["binary-affordance"]);
        assert_eq!(
            extractor.extract_document("<table><tr><td class=\"blob-code\">x</td></tr></table>"),
            ExtractionResult::Empty
        );
    }

    #[tokio::test]
    async fn extract_fetches_by_surface() {
        let transport = MockTransport::new();
        transport.push_ok("https://raw.test/a.txt", "hello");
        transport.push_ok(
            "https://web.test/blob/b.txt",
            "<html><body><textarea>world</textarea></body></html>",
        );
        transport.push_error(
            HttpMethod::Get,
            "https://raw.test/slow.txt",
            HttpError::Timeout("deadline".into()),
        );
        let gateway = Gateway::with_transport(GatewayOptions::default(), Arc::new(transport));
        let extractor = Extractor::default();

        let raw = TreeEntry::file(
            "a.txt",
            "https://raw.test/a.txt".into(),
            ContentSurface::Raw,
            Some(5),
        );
        let rendered = TreeEntry::file(
            "b.txt",
            "https://web.test/blob/b.txt".into(),
            ContentSurface::Rendered,
            None,
        );
        let slow = TreeEntry::file(
            "slow.txt",
            "https://raw.test/slow.txt".into(),
            ContentSurface::Raw,
            None,
        );

        assert_eq!(
            extractor.extract(&gateway, &raw).await,
            ExtractionResult::Text(b"hello".to_vec())
        );
        assert_eq!(
            extractor.extract(&gateway, &rendered).await,
            ExtractionResult::Text(b"world".to_vec())
        );
        assert!(matches!(
            extractor.extract(&gateway, &slow).await,
            ExtractionResult::Failed(_)
        ));
    }
}
