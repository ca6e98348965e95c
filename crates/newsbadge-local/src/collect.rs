//! Headline collector: four selector passes through the headline filter.

use crate::annotate::{visible_text, BADGE_CONTAINER_CLASS};
use crate::dom::{Document, NodeId, Snapshot};
use crate::filter;
use crate::selectors;
use crate::site::SiteProfile;
use crate::thresholds::Thresholds;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    ArticleContext,
    Headings,
    SiteSpecific,
    SharedClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    /// Text that will be sent for classification.
    pub text: String,
    pub pass: Pass,
}

struct Collector<'a> {
    doc: &'a Document,
    snap: Snapshot,
    t: &'a Thresholds,
    tracked: &'a dyn Fn(NodeId) -> bool,
    seen: HashSet<NodeId>,
    out: Vec<Candidate>,
}

impl<'a> Collector<'a> {
    fn matches(&self, selector: &str) -> Vec<NodeId> {
        match self.snap.select(selector) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(selector, error = %e, "selector skipped");
                Vec::new()
            }
        }
    }

    fn claimed(&self, n: NodeId) -> bool {
        self.seen.contains(&n) || (self.tracked)(n)
    }

    /// Already collected, already annotated or in flight, nested in a badge, or on the
    /// same ancestor line as a node that is.
    fn skip(&self, n: NodeId) -> bool {
        if self.claimed(n) {
            return true;
        }
        if self
            .doc
            .ancestors(n)
            .any(|a| self.claimed(a) || self.doc.has_class(a, BADGE_CONTAINER_CLASS))
        {
            return true;
        }
        self.doc.descendants(n).into_iter().any(|d| self.claimed(d))
    }

    fn push(&mut self, node: NodeId, text: String, pass: Pass) {
        self.seen.insert(node);
        self.out.push(Candidate { node, text, pass });
    }

    fn run_pass(
        &mut self,
        pass: Pass,
        selectors: &[String],
        admit: &dyn Fn(&Document, NodeId) -> Option<String>,
    ) {
        let before = self.out.len();
        for sel in selectors {
            for n in self.matches(sel) {
                if self.skip(n) {
                    continue;
                }
                if let Some(text) = admit(self.doc, n) {
                    self.push(n, text, pass);
                }
            }
        }
        tracing::debug!(
            pass = ?pass,
            found = self.out.len() - before,
            "collector pass done"
        );
    }
}

fn admitted(d: &Document, n: NodeId, text: String, t: &Thresholds) -> Option<String> {
    match filter::check(d, n, &text, t) {
        Ok(()) => Some(text),
        Err(r) => {
            tracing::trace!(node = n.index(), reason = r.as_str(), "rejected");
            None
        }
    }
}

/// Text of a nested link, when the element has one long enough to stand alone.
fn nested_link_text(doc: &Document, n: NodeId, min_len: usize) -> Option<String> {
    let tag = doc.tag(n)?;
    if tag != "a" && !filter::is_heading_tag(tag) {
        return None;
    }
    let link = doc
        .descendants(n)
        .into_iter()
        .find(|d| doc.tag(*d) == Some("a"))?;
    let text = visible_text(doc, link);
    (text.chars().count() >= min_len).then_some(text)
}

/// Run the four passes over `doc`. `tracked` reports nodes that are already annotated
/// or in flight.
pub fn collect(
    doc: &Document,
    profile: SiteProfile,
    t: &Thresholds,
    tracked: &dyn Fn(NodeId) -> bool,
) -> Vec<Candidate> {
    let mut c = Collector {
        doc,
        snap: doc.snapshot(),
        t,
        tracked,
        seen: HashSet::new(),
        out: Vec::new(),
    };

    let to_owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let base = |d: &Document, n: NodeId| admitted(d, n, visible_text(d, n), t);
    c.run_pass(
        Pass::ArticleContext,
        &to_owned(selectors::ARTICLE_CONTEXT),
        &base,
    );

    let headings = |d: &Document, n: NodeId| {
        if filter::inside_tabular(d, n, t.heading_pass_tabular_depth) {
            return None;
        }
        base(d, n)
    };
    c.run_pass(
        Pass::Headings,
        &to_owned(selectors::GENERIC_HEADINGS),
        &headings,
    );

    let relaxed = c.t.relaxed();
    let site = |d: &Document, n: NodeId| {
        let text = nested_link_text(d, n, relaxed.min_len).unwrap_or_else(|| visible_text(d, n));
        admitted(d, n, text, &relaxed)
    };
    c.run_pass(
        Pass::SiteSpecific,
        &to_owned(selectors::for_profile(profile)),
        &site,
    );

    let shared = |d: &Document, n: NodeId| {
        let text = base(d, n)?;
        (!filter::inside_tabular(d, n, t.class_pass_tabular_depth)).then_some(text)
    };
    c.run_pass(
        Pass::SharedClass,
        &selectors::shared_class_selectors(),
        &shared,
    );

    tracing::debug!(profile = %profile, candidates = c.out.len(), "collected");
    c.out
}
