use crate::site::SiteProfile;

/// Every numeric knob of the headline heuristics, resolved per profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Minimum trimmed text length (chars).
    pub min_len: usize,
    pub max_len: usize,
    /// Digit ratio ceiling for `<a>` elements.
    pub link_digit_ratio: f64,
    /// Digit ratio ceiling for everything else.
    pub digit_ratio: f64,
    /// The ratio check only applies to texts shorter than this.
    pub ratio_check_below: usize,
    pub min_words: usize,
    /// A token counts as a word when it has more than this many chars.
    pub word_min_chars: usize,
    /// Ancestor depth of the tabular exclusion in the headline filter.
    pub tabular_depth: usize,
    /// Tabular depth for the bare-heading pass.
    pub heading_pass_tabular_depth: usize,
    /// Tabular depth for the shared class-pattern pass.
    pub class_pass_tabular_depth: usize,
    /// Ancestor depth of the cell guard before a badge is attached.
    pub badge_guard_depth: usize,
}

impl Thresholds {
    pub fn for_profile(profile: SiteProfile) -> Self {
        let financial = profile.is_financial();
        Self {
            min_len: if financial { 10 } else { 20 },
            max_len: 500,
            link_digit_ratio: if financial { 0.4 } else { 0.3 },
            digit_ratio: 0.3,
            ratio_check_below: 50,
            min_words: 3,
            word_min_chars: 2,
            tabular_depth: if profile == SiteProfile::Yahoo { 6 } else { 5 },
            heading_pass_tabular_depth: 4,
            class_pass_tabular_depth: 5,
            badge_guard_depth: 5,
        }
    }

    /// The financial-site policy, used by the site-specific pass on every profile.
    pub fn relaxed(&self) -> Self {
        Self {
            min_len: self.min_len.min(10),
            link_digit_ratio: self.link_digit_ratio.max(0.4),
            ..self.clone()
        }
    }

    pub fn ratio_limit(&self, is_link: bool) -> f64 {
        if is_link {
            self.link_digit_ratio
        } else {
            self.digit_ratio
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_thresholds_follow_the_table() {
        let y = Thresholds::for_profile(SiteProfile::Yahoo);
        assert_eq!((y.min_len, y.tabular_depth), (10, 6));
        assert_eq!(y.ratio_limit(true), 0.4);
        assert_eq!(y.ratio_limit(false), 0.3);

        let g = Thresholds::for_profile(SiteProfile::Generic);
        assert_eq!((g.min_len, g.tabular_depth), (20, 5));
        assert_eq!(g.ratio_limit(true), 0.3);

        let r = g.relaxed();
        assert_eq!(r.min_len, 10);
        assert_eq!(r.ratio_limit(true), 0.4);
        assert_eq!(r.max_len, 500);
    }
}
