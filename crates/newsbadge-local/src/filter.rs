//! Headline filter: is this element's text plausibly a standalone headline?

use crate::annotate::BADGE_CONTAINER_CLASS;
use crate::dom::{Document, NodeId};
use crate::thresholds::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Hidden,
    TooShort,
    TooLong,
    NumericOnly,
    DigitHeavy,
    Tabular,
    TooFewWords,
    AlreadyBadged,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::Hidden => "hidden",
            Rejection::TooShort => "too_short",
            Rejection::TooLong => "too_long",
            Rejection::NumericOnly => "numeric_only",
            Rejection::DigitHeavy => "digit_heavy",
            Rejection::Tabular => "tabular",
            Rejection::TooFewWords => "too_few_words",
            Rejection::AlreadyBadged => "already_badged",
        }
    }
}

const TABULAR_TAGS: [&str; 7] = ["table", "thead", "tbody", "tfoot", "tr", "td", "th"];
const TABULAR_ROLES: [&str; 9] = [
    "grid",
    "gridcell",
    "row",
    "rowgroup",
    "table",
    "cell",
    "columnheader",
    "rowheader",
    "treegrid",
];
const TABULAR_MARKERS: [&str; 7] = [
    "table",
    "grid",
    "data-row",
    "datarow",
    "row-data",
    "cell",
    "spreadsheet",
];

pub fn is_heading_tag(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Digits, percent, sign, separators, whitespace and currency symbols only.
pub fn is_numeric_only(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| {
            c.is_ascii_digit()
                || c.is_whitespace()
                || matches!(c, '%' | '-' | '+' | '.' | ',' | '$' | '€' | '£' | '¥' | '₹')
        })
}

pub fn digit_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    digits as f64 / total as f64
}

/// Tokens longer than `min_chars`.
pub fn word_count(text: &str, min_chars: usize) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().count() > min_chars)
        .count()
}

/// Display/visibility/opacity on the element or any ancestor, plus `hidden`.
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .all(|n| !hides(doc, n))
}

fn hides(doc: &Document, n: NodeId) -> bool {
    if doc.attr(n, "hidden").is_some() {
        return true;
    }
    if let Some(d) = doc.style(n, "display") {
        if d.trim().eq_ignore_ascii_case("none") {
            return true;
        }
    }
    if let Some(v) = doc.style(n, "visibility") {
        if v.trim().eq_ignore_ascii_case("hidden") {
            return true;
        }
    }
    if let Some(o) = doc.style(n, "opacity") {
        if o.trim().parse::<f64>().map(|x| x <= 0.0).unwrap_or(false) {
            return true;
        }
    }
    false
}

/// Does this element look like a table, grid or data row?
pub fn is_tabular_container(doc: &Document, n: NodeId) -> bool {
    if let Some(tag) = doc.tag(n) {
        if TABULAR_TAGS.contains(&tag) {
            return true;
        }
    }
    if let Some(role) = doc.attr(n, "role") {
        if TABULAR_ROLES.contains(&role.trim().to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    let hay = doc.class_id_role_lc(n);
    TABULAR_MARKERS.iter().any(|m| hay.contains(m))
}

/// Tabular container among the nearest `depth` ancestors.
pub fn inside_tabular(doc: &Document, node: NodeId, depth: usize) -> bool {
    doc.ancestors(node)
        .take(depth)
        .any(|a| is_tabular_container(doc, a))
}

fn is_cell(doc: &Document, n: NodeId) -> bool {
    matches!(doc.tag(n), Some("td" | "th"))
        || matches!(
            doc.attr(n, "role").map(|r| r.trim().to_ascii_lowercase()).as_deref(),
            Some("gridcell" | "cell")
        )
}

/// The element is, or sits within `depth` ancestors of, a table/grid cell.
pub fn is_in_cell(doc: &Document, node: NodeId, depth: usize) -> bool {
    is_cell(doc, node) || doc.ancestors(node).take(depth).any(|a| is_cell(doc, a))
}

pub fn has_badge(doc: &Document, node: NodeId) -> bool {
    doc.children(node)
        .iter()
        .any(|c| doc.has_class(*c, BADGE_CONTAINER_CLASS))
}

/// Text-shape rules shared by the filter and the pre-classification re-check.
pub fn check_text_shape(text: &str, is_link: bool, t: &Thresholds) -> Result<(), Rejection> {
    if is_numeric_only(text) {
        return Err(Rejection::NumericOnly);
    }
    if text.chars().count() < t.ratio_check_below && digit_ratio(text) > t.ratio_limit(is_link) {
        return Err(Rejection::DigitHeavy);
    }
    if word_count(text, t.word_min_chars) < t.min_words {
        return Err(Rejection::TooFewWords);
    }
    Ok(())
}

/// Full admission check. `text` is the text that would be classified (already trimmed
/// and whitespace-normalized).
pub fn check(doc: &Document, node: NodeId, text: &str, t: &Thresholds) -> Result<(), Rejection> {
    if !is_visible(doc, node) {
        return Err(Rejection::Hidden);
    }
    let len = text.chars().count();
    if len < t.min_len {
        return Err(Rejection::TooShort);
    }
    if len > t.max_len {
        return Err(Rejection::TooLong);
    }
    let tag = doc.tag(node).unwrap_or("");
    if is_numeric_only(text) {
        return Err(Rejection::NumericOnly);
    }
    if len < t.ratio_check_below && digit_ratio(text) > t.ratio_limit(tag == "a") {
        return Err(Rejection::DigitHeavy);
    }
    if !is_heading_tag(tag) && inside_tabular(doc, node, t.tabular_depth) {
        return Err(Rejection::Tabular);
    }
    if word_count(text, t.word_min_chars) < t.min_words {
        return Err(Rejection::TooFewWords);
    }
    if has_badge(doc, node) {
        return Err(Rejection::AlreadyBadged);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteProfile;
    use proptest::prelude::*;

    fn first(doc: &Document, sel: &str) -> NodeId {
        doc.snapshot().select(sel).unwrap()[0]
    }

    fn admit(html: &str, sel: &str, profile: SiteProfile) -> Result<(), Rejection> {
        let doc = Document::parse(html);
        let n = first(&doc, sel);
        let text = doc.text(n);
        check(&doc, n, &text, &Thresholds::for_profile(profile))
    }

    #[test]
    fn admits_plain_headlines() {
        let r = admit(
            "<body><h2>Stocks rally as inflation cools faster than expected</h2></body>",
            "h2",
            SiteProfile::Generic,
        );
        assert_eq!(r, Ok(()));
    }

    #[test]
    fn rejections_follow_rule_order() {
        let g = SiteProfile::Generic;
        assert_eq!(
            admit(
                r#"<body><div style="display:none"><h2>Hidden headline about the market</h2></div></body>"#,
                "h2",
                g
            ),
            Err(Rejection::Hidden)
        );
        assert_eq!(
            admit("<body><h2>Short one here</h2></body>", "h2", g),
            Err(Rejection::TooShort)
        );
        assert_eq!(
            admit("<body><h2>$1,234.56 +2.5% -0.75%</h2></body>", "h2", g),
            Err(Rejection::NumericOnly)
        );
        assert_eq!(
            admit("<body><h2>AAPL 189.22 +1.23 (0.65%)</h2></body>", "h2", g),
            Err(Rejection::DigitHeavy)
        );
        assert_eq!(
            admit(
                "<body><h2>a an of to by is it at on up we go ox</h2></body>",
                "h2",
                g
            ),
            Err(Rejection::TooFewWords)
        );
    }

    #[test]
    fn link_ratio_is_looser_on_financial_profiles() {
        // 15 chars with 5 digits: ratio 0.33.
        let html = r#"<body><a href="/x">Q3 2024 EPS due</a></body>"#;
        assert_eq!(admit(html, "a", SiteProfile::Reuters), Ok(()));
        assert_eq!(admit(html, "a", SiteProfile::GenericFinancial), Ok(()));
        let doc = Document::parse(html);
        let a = first(&doc, "a");
        let t = Thresholds::for_profile(SiteProfile::Reuters);
        assert_eq!(
            check_text_shape(&doc.text(a), false, &t),
            Err(Rejection::DigitHeavy)
        );
    }

    #[test]
    fn tabular_ancestors_reject_except_for_headings() {
        let html = r#"<body><div class="quote-table"><div><span class="x">Apple shares slide after weak outlook</span></div></div>
            <div class="data-grid"><h3>Apple shares slide after weak outlook</h3></div></body>"#;
        assert_eq!(
            admit(html, "span.x", SiteProfile::Generic),
            Err(Rejection::Tabular)
        );
        assert_eq!(admit(html, "h3", SiteProfile::Generic), Ok(()));
    }

    #[test]
    fn tabular_depth_is_bounded() {
        let html = r#"<body><table><tr><td><div><div><div><div><div><p>Markets wobble as yields spike again</p></div></div></div></div></div></td></tr></table></body>"#;
        let doc = Document::parse(html);
        let p = first(&doc, "p");
        assert!(!inside_tabular(&doc, p, 5));
        assert!(inside_tabular(&doc, p, 6));
        assert!(!is_in_cell(&doc, p, 5));
        assert!(is_in_cell(&doc, p, 6));
    }

    #[test]
    fn already_badged_elements_are_rejected() {
        let html = r#"<body><h2>Banks beat estimates on strong trading desks <span class="sentiment-badge-container">Buy</span></h2></body>"#;
        let doc = Document::parse(html);
        let h2 = first(&doc, "h2");
        let text = doc.text_with(h2, &|d, n| d.has_class(n, BADGE_CONTAINER_CLASS));
        assert_eq!(
            check(&doc, h2, &text, &Thresholds::for_profile(SiteProfile::Generic)),
            Err(Rejection::AlreadyBadged)
        );
    }

    proptest! {
        #[test]
        fn admitted_text_satisfies_shape_bounds(text in "[a-zA-Z0-9 %$]{0,120}") {
            let doc = Document::parse(&format!("<body><h2>{text}</h2></body>"));
            let h2 = first(&doc, "h2");
            let norm = doc.text(h2);
            for profile in [SiteProfile::Generic, SiteProfile::Yahoo] {
                let t = Thresholds::for_profile(profile);
                if check(&doc, h2, &norm, &t).is_ok() {
                    let len = norm.chars().count();
                    prop_assert!(len >= t.min_len && len <= t.max_len);
                    prop_assert!(word_count(&norm, 2) >= 3);
                    if len < 50 {
                        prop_assert!(digit_ratio(&norm) <= t.ratio_limit(false));
                    }
                }
            }
        }
    }
}
