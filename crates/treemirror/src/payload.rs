//! Structured JSON payloads embedded in rendered pages.
//!
//! Rendered repository pages ship their view model inside a
//! `<script type="application/json">` element. Directory pages carry
//! `payload.tree.items`, file pages carry `payload.blob.rawLines`.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;

static EMBEDDED_JSON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/json"]"#).expect("selector should parse")
});

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct EmbeddedData {
    #[serde(default)]
    pub payload: Payload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Payload {
    #[serde(default)]
    pub tree: Option<TreePayload>,
    #[serde(default)]
    pub blob: Option<BlobPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TreePayload {
    #[serde(default)]
    pub items: Vec<TreeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeItem {
    pub path: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct BlobPayload {
    #[serde(rename = "rawLines", default)]
    pub raw_lines: Option<Vec<String>>,
}

/// Every embedded payload in the document that deserializes.
///
/// Script tags holding unrelated JSON are skipped silently.
pub(crate) fn embedded_payloads(document: &Html) -> Vec<Payload> {
    document
        .select(&EMBEDDED_JSON)
        .filter_map(|script| {
            let text: String = script.text().collect();
            serde_json::from_str::<EmbeddedData>(text.trim()).ok()
        })
        .map(|data| data.payload)
        .collect()
}

/// Directory items from the first payload that has a tree.
pub(crate) fn tree_items(document: &Html) -> Option<Vec<TreeItem>> {
    embedded_payloads(document)
        .into_iter()
        .find_map(|payload| payload.tree)
        .map(|tree| tree.items)
}

/// Raw lines from the first payload that has a blob with lines.
pub(crate) fn raw_lines(document: &Html) -> Option<Vec<String>> {
    embedded_payloads(document)
        .into_iter()
        .filter_map(|payload| payload.blob)
        .find_map(|blob| blob.raw_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body>
            <script type="application/json" data-target="other">{{"locale":"en"}}</script>
            <script type="application/json" data-target="react-app.embeddedData">{json}</script>
            </body></html>"#
        ))
    }

    #[test]
    fn tree_items_come_from_embedded_payload() {
        let document = page(
            r#"{"payload":{"tree":{"items":[
                {"name":"a.txt","path":"src/a.txt","contentType":"file"},
                {"name":"nested","path":"src/nested","contentType":"directory"}
            ]}}}"#,
        );

        let items = tree_items(&document).expect("tree payload");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "src/a.txt");
        assert_eq!(items[1].content_type, "directory");
    }

    #[test]
    fn raw_lines_skip_payloads_without_lines() {
        let document = page(r#"{"payload":{"blob":{"rawLines":["fn main() {","}"]}}}"#);
        assert_eq!(
            raw_lines(&document),
            Some(vec!["fn main() {".to_string(), "}".to_string()])
        );

        let binary = page(r#"{"payload":{"blob":{"rawLines":null}}}"#);
        assert_eq!(raw_lines(&binary), None);
    }

    #[test]
    fn documents_without_payloads_yield_nothing() {
        let document = Html::parse_document("<html><body><p>hi</p></body></html>");
        assert!(tree_items(&document).is_none());
        assert!(raw_lines(&document).is_none());
    }
}
