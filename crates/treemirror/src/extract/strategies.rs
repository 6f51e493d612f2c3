use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{ExtractionResult, ExtractionStrategy};
use crate::payload;

static CODE_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.blob-code").expect("selector should parse"));

static TEXT_AREA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("textarea").expect("selector should parse"));

static RAW_AFFORDANCE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a#raw-url, a[data-testid="raw-button"], a[download]"#)
        .expect("selector should parse")
});

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("selector should parse"));

/// `payload.blob.rawLines` from the embedded view model.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedRawLines;

impl ExtractionStrategy for EmbeddedRawLines {
    fn name(&self) -> &'static str {
        "embedded-raw-lines"
    }

    fn try_extract(&self, document: &Html) -> Option<ExtractionResult> {
        let lines = payload::raw_lines(document)?;
        if lines.is_empty() {
            return Some(ExtractionResult::Empty);
        }
        Some(ExtractionResult::Text(lines.join("\n").into_bytes()))
    }
}

/// One table cell per source line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeTable;

impl ExtractionStrategy for CodeTable {
    fn name(&self) -> &'static str {
        "code-table"
    }

    fn try_extract(&self, document: &Html) -> Option<ExtractionResult> {
        let lines: Vec<String> = document
            .select(&CODE_CELLS)
            .map(|cell| cell.text().collect())
            .collect();
        if lines.is_empty() {
            return None;
        }
        Some(ExtractionResult::Text(lines.join("\n").into_bytes()))
    }
}

/// A read-only text area holding the whole file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyTextArea;

impl ExtractionStrategy for LegacyTextArea {
    fn name(&self) -> &'static str {
        "text-area"
    }

    fn try_extract(&self, document: &Html) -> Option<ExtractionResult> {
        let area = document.select(&TEXT_AREA).next()?;
        let text: String = area.text().collect();
        if text.is_empty() {
            return Some(ExtractionResult::Empty);
        }
        Some(ExtractionResult::Text(text.into_bytes()))
    }
}

/// A "view raw" or download link with no inline content.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryAffordance;

impl ExtractionStrategy for BinaryAffordance {
    fn name(&self) -> &'static str {
        "binary-affordance"
    }

    fn try_extract(&self, document: &Html) -> Option<ExtractionResult> {
        let by_attribute = document.select(&RAW_AFFORDANCE).next().is_some();
        let by_label = || {
            document.select(&ANCHORS).any(|anchor| {
                let label: String = anchor.text().collect();
                let label = label.trim();
                label.eq_ignore_ascii_case("view raw") || label.eq_ignore_ascii_case("download")
            })
        };

        (by_attribute || by_label()).then_some(ExtractionResult::Binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn raw_lines_join_without_trailing_newline() {
        let document = doc(
            r#"<script type="application/json">{"payload":{"blob":{"rawLines":["a","","b"]}}}</script>"#,
        );
        assert_eq!(
            EmbeddedRawLines.try_extract(&document),
            Some(ExtractionResult::Text(b"a\n\nb".to_vec()))
        );
    }

    #[test]
    fn empty_raw_lines_mean_empty_file() {
        let document =
            doc(r#"<script type="application/json">{"payload":{"blob":{"rawLines":[]}}}</script>"#);
        assert_eq!(EmbeddedRawLines.try_extract(&document), Some(ExtractionResult::Empty));
    }

    #[test]
    fn code_table_reads_cells_in_order() {
        let document = doc(
            r#"<table>
                <tr><td class="blob-num">1</td><td class="blob-code blob-code-inner">fn main() {</td></tr>
                <tr><td class="blob-num">2</td><td class="blob-code blob-code-inner">    <span>println!("hi");</span></td></tr>
                <tr><td class="blob-num">3</td><td class="blob-code blob-code-inner">}</td></tr>
            </table>"#,
        );
        assert_eq!(
            CodeTable.try_extract(&document),
            Some(ExtractionResult::Text(
                b"fn main() {\n    println!(\"hi\");\n}".to_vec()
            ))
        );
        assert_eq!(CodeTable.try_extract(&doc("<p>nothing</p>")), None);
    }

    #[test]
    fn text_area_is_taken_verbatim() {
        let document = doc("<textarea>line one\nline two\n</textarea>");
        assert_eq!(
            LegacyTextArea.try_extract(&document),
            Some(ExtractionResult::Text(b"line one\nline two\n".to_vec()))
        );
    }

    #[test]
    fn binary_affordance_matches_attributes_and_labels() {
        assert_eq!(
            BinaryAffordance.try_extract(&doc(r#"<a id="raw-url" href="/raw">x</a>"#)),
            Some(ExtractionResult::Binary)
        );
        assert_eq!(
            BinaryAffordance.try_extract(&doc(r#"<a href="/raw"> View raw </a>"#)),
            Some(ExtractionResult::Binary)
        );
        assert_eq!(
            BinaryAffordance.try_extract(&doc(r#"<a href="/file.bin" download>file</a>"#)),
            Some(ExtractionResult::Binary)
        );
        assert_eq!(BinaryAffordance.try_extract(&doc(r#"<a href="/x">home</a>"#)), None);
    }
}
