//! The document plus its session, mutated only in short synchronous sections.

use crate::annotate::{self, AnnotationRecord, OriginalStyle, Rendered};
use crate::collect::{self, Candidate};
use crate::dom::{Document, NodeId};
use crate::filter;
use crate::session::Session;
use crate::site::SiteProfile;
use crate::thresholds::Thresholds;
use newsbadge_core::{Classification, SentimentFilter, Stats};

const ARTICLE_MARKERS: [&str; 3] = ["article", "story", "headline"];

#[derive(Debug)]
pub struct Page {
    pub doc: Document,
    pub session: Session,
    profile: SiteProfile,
    thresholds: Thresholds,
}

impl Page {
    pub fn new(doc: Document, session: Session, profile: SiteProfile) -> Self {
        Self {
            doc,
            session,
            profile,
            thresholds: Thresholds::for_profile(profile),
        }
    }

    pub fn profile(&self) -> SiteProfile {
        self.profile
    }

    pub fn collect(&mut self) -> Vec<Candidate> {
        self.session.prune(&self.doc);
        let session = &self.session;
        collect::collect(&self.doc, self.profile, &self.thresholds, &|n| {
            session.is_tracked(n)
        })
    }

    /// Mark a fresh candidate in flight. `None` means skip it: detached, already
    /// handled, or failing the pre-classification checks.
    pub fn claim(&mut self, c: &Candidate) -> Option<String> {
        if self.session.is_annotated(c.node) {
            return None;
        }
        self.claim_node(c.node, &c.text)
    }

    /// Claim an annotated node again so its result can be refreshed.
    pub fn claim_existing(&mut self, node: NodeId) -> Option<String> {
        let text = self.session.record(node)?.text.clone();
        self.claim_node(node, &text)
    }

    fn claim_node(&mut self, node: NodeId, text: &str) -> Option<String> {
        if !self.doc.is_attached(node) || self.session.is_in_flight(node) {
            return None;
        }
        if !annotate::precheck(&self.doc, node, text, &self.thresholds) {
            tracing::debug!(node = node.index(), "skipped by pre-classification check");
            return None;
        }
        self.session.begin(node);
        Some(text.to_string())
    }

    pub fn release(&mut self, node: NodeId) {
        self.session.finish(node);
    }

    /// Record a result and render it. Returns false when the node left the document
    /// while the request was in flight.
    pub fn apply(&mut self, node: NodeId, text: String, result: Classification) -> bool {
        self.session.finish(node);
        if !self.doc.is_attached(node) {
            return false;
        }
        let original = match self.session.record(node) {
            Some(prev) => prev.original.clone(),
            None => OriginalStyle::capture(&self.doc, node),
        };
        self.session.stats.record(result.sentiment);
        let record = AnnotationRecord {
            text,
            result,
            original,
        };
        annotate::render(&mut self.doc, node, &record, &self.session.settings);
        self.session.insert(node, record);
        true
    }

    /// Re-render every attached annotated element from its record.
    pub fn rerender(&mut self) -> (usize, usize) {
        self.session.prune(&self.doc);
        let (mut shown, mut dimmed) = (0, 0);
        for node in self.session.annotated_nodes() {
            let Some(record) = self.session.record(node) else {
                continue;
            };
            match annotate::render(&mut self.doc, node, record, &self.session.settings) {
                Rendered::Shown => shown += 1,
                Rendered::Dimmed => dimmed += 1,
            }
        }
        (shown, dimmed)
    }

    pub fn set_filter(&mut self, filter: SentimentFilter) {
        self.session.settings.filter = filter;
        self.rerender();
    }

    pub fn set_highlight(&mut self, on: bool) {
        self.session.settings.highlight = on;
        self.rerender();
    }

    pub fn set_show_confidence(&mut self, on: bool) {
        self.session.settings.show_confidence = on;
        self.rerender();
    }

    pub fn reset_stats(&mut self) -> Stats {
        self.session.stats = Stats::default();
        self.session.stats
    }

    /// Badge containers attached anywhere in the document.
    pub fn badge_count(&self) -> usize {
        self.doc
            .descendants(self.doc.root())
            .into_iter()
            .filter(|n| self.doc.has_class(*n, annotate::BADGE_CONTAINER_CLASS))
            .count()
    }

    /// Drain mutation records; true if any added subtree could hold a headline.
    pub fn drain_qualifying_mutations(&mut self) -> bool {
        let added = self.doc.take_added();
        added
            .into_iter()
            .filter(|n| self.doc.is_attached(*n))
            .any(|n| self.qualifies(n))
    }

    fn qualifies(&self, root: NodeId) -> bool {
        let financial = self.profile.is_financial();
        std::iter::once(root)
            .chain(self.doc.descendants(root))
            .any(|n| {
                let tag = self.doc.tag(n).unwrap_or("");
                if filter::is_heading_tag(tag) {
                    return true;
                }
                if !financial {
                    return false;
                }
                if tag == "a" || tag == "article" {
                    return true;
                }
                let hay = self.doc.class_id_role_lc(n);
                ARTICLE_MARKERS.iter().any(|m| hay.contains(m))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsbadge_core::Sentiment;

    fn page(html: &str, profile: SiteProfile) -> Page {
        Page::new(Document::parse(html), Session::default(), profile)
    }

    fn annotate_all(p: &mut Page, verdict: impl Fn(&str) -> Sentiment) -> usize {
        let mut n = 0;
        for c in p.collect() {
            if let Some(text) = p.claim(&c) {
                let s = verdict(&text);
                p.apply(c.node, text, Classification::new(s, 0.75));
                n += 1;
            }
        }
        n
    }

    const FEED: &str = r#"<body><main>
        <h2>Regional banks rally on strong deposit growth</h2>
        <h2>Oil producers slump as crude inventories swell</h2>
        <h2>Central bank keeps policy rate unchanged again</h2>
    </main></body>"#;

    fn verdict(text: &str) -> Sentiment {
        if text.contains("rally") {
            Sentiment::Buy
        } else if text.contains("slump") {
            Sentiment::Sell
        } else {
            Sentiment::Hold
        }
    }

    #[test]
    fn second_run_on_static_document_is_a_no_op() {
        let mut p = page(FEED, SiteProfile::Generic);
        assert_eq!(annotate_all(&mut p, verdict), 3);
        let stats = p.session.stats;
        assert_eq!(annotate_all(&mut p, verdict), 0);
        assert_eq!(p.session.stats, stats);
        assert_eq!(p.badge_count(), 3);
    }

    #[test]
    fn reclassification_replaces_badge_and_counts_again() {
        let mut p = page(FEED, SiteProfile::Generic);
        annotate_all(&mut p, verdict);
        let node = p.session.annotated_nodes()[0];
        for s in [Sentiment::Sell, Sentiment::Hold, Sentiment::Buy] {
            let text = p.claim_existing(node).unwrap();
            assert!(p.apply(node, text, Classification::new(s, 0.6)));
            assert_eq!(annotate::badge_containers(&p.doc, node).len(), 1);
        }
        assert_eq!(p.badge_count(), 3);
        assert_eq!(p.session.stats.total, 6);
        assert!(p.session.stats.is_consistent());
    }

    #[test]
    fn filter_sell_dims_everything_else_without_new_claims() {
        let mut p = page(FEED, SiteProfile::Generic);
        annotate_all(&mut p, verdict);
        p.set_filter(SentimentFilter::Sell);
        assert_eq!(p.badge_count(), 1);
        for node in p.session.annotated_nodes() {
            let sell = p.session.record(node).unwrap().result.sentiment == Sentiment::Sell;
            let opacity = p.doc.style(node, "opacity");
            if sell {
                assert_eq!(opacity, None);
                assert_eq!(annotate::badge_containers(&p.doc, node).len(), 1);
            } else {
                assert_eq!(opacity.as_deref(), Some(annotate::DIMMED_OPACITY));
                assert!(annotate::badge_containers(&p.doc, node).is_empty());
            }
        }
        assert!(p.collect().is_empty(), "dimmed elements stay tracked");
        p.set_filter(SentimentFilter::All);
        assert_eq!(p.badge_count(), 3);
    }

    #[test]
    fn removed_nodes_are_dropped_and_late_results_ignored() {
        let mut p = page(FEED, SiteProfile::Generic);
        let c = p.collect().remove(0);
        let text = p.claim(&c).unwrap();
        assert!(p.claim(&c).is_none(), "in flight");
        p.doc.remove(c.node);
        assert!(!p.apply(c.node, text, Classification::new(Sentiment::Buy, 0.9)));
        assert_eq!(p.session.stats, Stats::default());
        assert!(!p.session.is_tracked(c.node));
    }

    #[test]
    fn mutation_qualification_depends_on_profile() {
        let mut generic = page("<body><div id=\"f\"></div></body>", SiteProfile::Generic);
        let f = generic.doc.snapshot().select("#f").unwrap()[0];
        generic.doc.append_html(f, "<a href=\"/x\">link only</a>");
        assert!(!generic.drain_qualifying_mutations());
        generic.doc.append_html(f, "<div><h3>nested heading</h3></div>");
        assert!(generic.drain_qualifying_mutations());
        assert!(!generic.drain_qualifying_mutations(), "records are drained");

        let mut fin = page("<body><div id=\"f\"></div></body>", SiteProfile::Reuters);
        let f = fin.doc.snapshot().select("#f").unwrap()[0];
        fin.doc.append_html(f, "<div class=\"story-card\">x</div>");
        assert!(fin.drain_qualifying_mutations());
    }
}
