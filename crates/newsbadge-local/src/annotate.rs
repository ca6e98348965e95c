//! Annotation engine, DOM side: badge construction, highlight, and filter visibility.
//!
//! Everything here is a pure function of (document, node, record, settings), so a
//! settings change can re-render every annotated element without touching the network.

use crate::dom::{Document, NodeId};
use crate::filter;
use crate::thresholds::Thresholds;
use newsbadge_core::{Classification, Settings};

pub const BADGE_CONTAINER_CLASS: &str = "sentiment-badge-container";
pub const BADGE_CLASS: &str = "sentiment-badge";
pub const CONFIDENCE_CLASS: &str = "sentiment-confidence";
pub const STYLESHEET_ID: &str = "newsbadge-styles";

pub const DIMMED_OPACITY: &str = "0.3";
const HIGHLIGHT_ALPHA: f64 = 0.1;
const MIN_PADDING: &str = "4px 8px";

const BADGE_CSS: &str = ".sentiment-badge{transition:transform .15s ease,box-shadow .15s ease;cursor:help}\
.sentiment-badge:hover{transform:scale(1.08);box-shadow:0 2px 6px rgba(0,0,0,.25)}";

const INLINE_TAGS: [&str; 12] = [
    "a", "span", "em", "strong", "b", "i", "small", "label", "abbr", "cite", "time", "u",
];

/// Inline style values present before the element was first touched. `None` means the
/// property was not set inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalStyle {
    pub opacity: Option<String>,
    pub background_color: Option<String>,
    pub border_left: Option<String>,
    pub padding: Option<String>,
}

impl OriginalStyle {
    pub fn capture(doc: &Document, node: NodeId) -> Self {
        Self {
            opacity: doc.style(node, "opacity"),
            background_color: doc.style(node, "background-color"),
            border_left: doc.style(node, "border-left"),
            padding: doc.style(node, "padding"),
        }
    }
}

/// Side-table entry for one annotated element.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub text: String,
    pub result: Classification,
    pub original: OriginalStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendered {
    Shown,
    Dimmed,
}

/// Last-chance checks before spending a remote call: text shape (link-aware) and the
/// structural cell guard.
pub fn precheck(doc: &Document, node: NodeId, text: &str, t: &Thresholds) -> bool {
    let is_link = doc.tag(node) == Some("a");
    filter::check_text_shape(text, is_link, t).is_ok()
        && !filter::is_in_cell(doc, node, t.badge_guard_depth)
}

pub fn badge_containers(doc: &Document, node: NodeId) -> Vec<NodeId> {
    doc.children(node)
        .iter()
        .copied()
        .filter(|c| doc.has_class(*c, BADGE_CONTAINER_CLASS))
        .collect()
}

pub fn remove_badges(doc: &mut Document, node: NodeId) {
    for c in badge_containers(doc, node) {
        doc.remove(c);
    }
}

/// Text of `node` as the page shows it, minus any badge we attached.
pub fn visible_text(doc: &Document, node: NodeId) -> String {
    doc.text_with(node, &|d, n| d.has_class(n, BADGE_CONTAINER_CLASS))
}

/// Bring `node` in line with its record and the current settings.
pub fn render(
    doc: &mut Document,
    node: NodeId,
    record: &AnnotationRecord,
    settings: &Settings,
) -> Rendered {
    remove_badges(doc, node);

    let sentiment = record.result.sentiment;
    if !settings.filter.admits(sentiment) {
        unhighlight(doc, node, &record.original);
        doc.set_style(node, "opacity", Some(DIMMED_OPACITY));
        return Rendered::Dimmed;
    }

    doc.set_style(node, "opacity", record.original.opacity.as_deref());
    promote_display(doc, node);
    ensure_stylesheet(doc);

    let container = build_badge(doc, &record.result, settings.show_confidence);
    doc.append_child(node, container);

    if settings.highlight {
        highlight(doc, node, record);
    } else {
        unhighlight(doc, node, &record.original);
    }
    Rendered::Shown
}

fn build_badge(doc: &mut Document, result: &Classification, show_confidence: bool) -> NodeId {
    let sentiment = result.sentiment;
    let container = doc.create_element(
        "span",
        &[
            ("class", BADGE_CONTAINER_CLASS),
            (
                "style",
                "display: inline-flex; align-items: center; gap: 4px; margin-left: 10px; vertical-align: middle",
            ),
        ],
    );

    let label_class = format!(
        "{BADGE_CLASS} {BADGE_CLASS}-{}",
        sentiment.as_str().to_ascii_lowercase()
    );
    let label_style = format!(
        "background: {}; color: white; padding: 4px 8px; border-radius: 4px; font-size: 12px; font-weight: bold; display: inline-block",
        sentiment.color()
    );
    let title = result.confidence_label();
    let label = doc.create_element(
        "span",
        &[
            ("class", label_class.as_str()),
            ("title", title.as_str()),
            ("style", label_style.as_str()),
        ],
    );
    let label_text = doc.create_text(sentiment.as_str());
    doc.append_child(label, label_text);
    doc.append_child(container, label);

    if show_confidence {
        let chip = doc.create_element(
            "span",
            &[
                ("class", CONFIDENCE_CLASS),
                (
                    "style",
                    "background: rgba(0, 0, 0, 0.08); color: #333; padding: 2px 6px; border-radius: 10px; font-size: 11px",
                ),
            ],
        );
        let pct = doc.create_text(&result.confidence_percent());
        doc.append_child(chip, pct);
        doc.append_child(container, chip);
    }
    container
}

/// Inline elements cannot host the badge layout; lift them to inline-block.
fn promote_display(doc: &mut Document, node: NodeId) {
    let inline = match doc.style(node, "display") {
        Some(d) => d.trim().eq_ignore_ascii_case("inline"),
        None => doc
            .tag(node)
            .map(|t| INLINE_TAGS.contains(&t))
            .unwrap_or(false),
    };
    if inline {
        doc.set_style(node, "display", Some("inline-block"));
    }
}

fn highlight(doc: &mut Document, node: NodeId, record: &AnnotationRecord) {
    let sentiment = record.result.sentiment;
    doc.set_style(
        node,
        "background-color",
        Some(&sentiment.tint(HIGHLIGHT_ALPHA)),
    );
    doc.set_style(
        node,
        "border-left",
        Some(&format!("4px solid {}", sentiment.color())),
    );
    if record.original.padding.is_none() {
        doc.set_style(node, "padding", Some(MIN_PADDING));
    }
}

fn unhighlight(doc: &mut Document, node: NodeId, original: &OriginalStyle) {
    doc.set_style(
        node,
        "background-color",
        original.background_color.as_deref(),
    );
    doc.set_style(node, "border-left", original.border_left.as_deref());
    doc.set_style(node, "padding", original.padding.as_deref());
}

/// Hover emphasis lives in one injected stylesheet rather than per-badge handlers.
fn ensure_stylesheet(doc: &mut Document) {
    let Some(host) = doc.head().or_else(|| doc.body()) else {
        return;
    };
    let present = doc
        .children(host)
        .iter()
        .any(|c| doc.attr(*c, "id") == Some(STYLESHEET_ID));
    if present {
        return;
    }
    let style = doc.create_element("style", &[("id", STYLESHEET_ID)]);
    let css = doc.create_text(BADGE_CSS);
    doc.append_child(style, css);
    doc.append_child(host, style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsbadge_core::{Sentiment, SentimentFilter};

    fn setup(html: &str, sel: &str) -> (Document, NodeId) {
        let doc = Document::parse(html);
        let n = doc.snapshot().select(sel).unwrap()[0];
        (doc, n)
    }

    fn record(doc: &Document, n: NodeId, s: Sentiment, c: f64) -> AnnotationRecord {
        AnnotationRecord {
            text: visible_text(doc, n),
            result: Classification::new(s, c),
            original: OriginalStyle::capture(doc, n),
        }
    }

    #[test]
    fn renders_label_tooltip_and_chip() {
        let (mut doc, h2) = setup(
            "<body><h2>Chipmaker posts record quarterly revenue</h2></body>",
            "h2",
        );
        let rec = record(&doc, h2, Sentiment::Buy, 0.82);
        assert_eq!(render(&mut doc, h2, &rec, &Settings::default()), Rendered::Shown);

        let containers = badge_containers(&doc, h2);
        assert_eq!(containers.len(), 1);
        let snap = doc.snapshot();
        let label = snap.select(".sentiment-badge").unwrap();
        assert_eq!(label.len(), 1);
        assert_eq!(doc.text(label[0]), "Buy");
        assert_eq!(doc.attr(label[0], "title"), Some("Confidence: 82.0%"));
        let chip = snap.select(".sentiment-confidence").unwrap();
        assert_eq!(doc.text(chip[0]), "82%");
        assert_eq!(visible_text(&doc, h2), "Chipmaker posts record quarterly revenue");
        assert_eq!(snap.select("#newsbadge-styles").unwrap().len(), 1);
    }

    #[test]
    fn rerender_keeps_a_single_container_and_stylesheet() {
        let (mut doc, h2) = setup(
            "<head></head><body><h2>Oil slides as supply glut fears mount</h2></body>",
            "h2",
        );
        let mut rec = record(&doc, h2, Sentiment::Sell, 0.7);
        for s in [Sentiment::Sell, Sentiment::Hold, Sentiment::Buy] {
            rec.result = Classification::new(s, 0.6);
            render(&mut doc, h2, &rec, &Settings::default());
            assert_eq!(badge_containers(&doc, h2).len(), 1);
        }
        let snap = doc.snapshot();
        assert_eq!(snap.select("#newsbadge-styles").unwrap().len(), 1);
        assert_eq!(doc.text(snap.select(".sentiment-badge").unwrap()[0]), "Buy");
    }

    #[test]
    fn hidden_by_filter_dims_and_restores_without_losing_original_styles() {
        let (mut doc, a) = setup(
            r#"<body><a href="/n" style="padding: 1px; opacity: 0.9">Retailer cuts forecast amid weak demand</a></body>"#,
            "a",
        );
        let rec = record(&doc, a, Sentiment::Sell, 0.9);
        let mut settings = Settings::default();

        render(&mut doc, a, &rec, &settings);
        assert_eq!(doc.style(a, "display").as_deref(), Some("inline-block"));
        assert_eq!(doc.style(a, "padding").as_deref(), Some("1px"));
        assert!(doc.style(a, "border-left").unwrap().contains("#f44336"));

        settings.filter = SentimentFilter::Buy;
        assert_eq!(render(&mut doc, a, &rec, &settings), Rendered::Dimmed);
        assert!(badge_containers(&doc, a).is_empty());
        assert_eq!(doc.style(a, "opacity").as_deref(), Some(DIMMED_OPACITY));
        assert_eq!(doc.style(a, "border-left"), None);

        settings.filter = SentimentFilter::Sell;
        settings.highlight = false;
        assert_eq!(render(&mut doc, a, &rec, &settings), Rendered::Shown);
        assert_eq!(doc.style(a, "opacity").as_deref(), Some("0.9"));
        assert_eq!(doc.style(a, "background-color"), None);
        assert_eq!(badge_containers(&doc, a).len(), 1);
    }

    #[test]
    fn show_confidence_off_omits_chip() {
        let (mut doc, h2) = setup(
            "<body><h2>Fed holds rates steady for another month</h2></body>",
            "h2",
        );
        let rec = record(&doc, h2, Sentiment::Hold, 0.5);
        let settings = Settings {
            show_confidence: false,
            ..Settings::default()
        };
        render(&mut doc, h2, &rec, &settings);
        assert!(doc.snapshot().select(".sentiment-confidence").unwrap().is_empty());
        assert!(doc.style(h2, "padding").is_some());
    }

    #[test]
    fn precheck_guards_cells_and_numeric_text() {
        let (doc, span) = setup(
            "<body><table><tr><td><span>Tech shares jump after upbeat guidance</span></td></tr></table></body>",
            "span",
        );
        let t = Thresholds::for_profile(crate::site::SiteProfile::Generic);
        assert!(!precheck(&doc, span, &doc.text(span), &t));

        let (doc, h2) = setup("<body><h2>Tech shares jump after upbeat guidance</h2></body>", "h2");
        assert!(precheck(&doc, h2, &doc.text(h2), &t));
        assert!(!precheck(&doc, h2, "12.5% 44 +3", &t));
    }
}
