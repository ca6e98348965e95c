//! Website classifier: page URL → [`SiteProfile`].

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteProfile {
    Yahoo,
    Bloomberg,
    Reuters,
    Cnbc,
    MarketWatch,
    Wsj,
    Ft,
    SeekingAlpha,
    Investing,
    Fool,
    Barrons,
    Benzinga,
    Forbes,
    BusinessInsider,
    Zacks,
    Morningstar,
    TheStreet,
    Nasdaq,
    GoogleFinance,
    EconomicTimes,
    Moneycontrol,
    GenericFinancial,
    Generic,
}

impl SiteProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            SiteProfile::Yahoo => "yahoo",
            SiteProfile::Bloomberg => "bloomberg",
            SiteProfile::Reuters => "reuters",
            SiteProfile::Cnbc => "cnbc",
            SiteProfile::MarketWatch => "marketwatch",
            SiteProfile::Wsj => "wsj",
            SiteProfile::Ft => "ft",
            SiteProfile::SeekingAlpha => "seekingalpha",
            SiteProfile::Investing => "investing",
            SiteProfile::Fool => "fool",
            SiteProfile::Barrons => "barrons",
            SiteProfile::Benzinga => "benzinga",
            SiteProfile::Forbes => "forbes",
            SiteProfile::BusinessInsider => "businessinsider",
            SiteProfile::Zacks => "zacks",
            SiteProfile::Morningstar => "morningstar",
            SiteProfile::TheStreet => "thestreet",
            SiteProfile::Nasdaq => "nasdaq",
            SiteProfile::GoogleFinance => "google-finance",
            SiteProfile::EconomicTimes => "economictimes",
            SiteProfile::Moneycontrol => "moneycontrol",
            SiteProfile::GenericFinancial => "generic-financial",
            SiteProfile::Generic => "generic",
        }
    }

    /// Everything except the fully generic profile.
    pub fn is_financial(self) -> bool {
        self != SiteProfile::Generic
    }

    /// Sites whose feeds render after load (SPA shells, infinite scroll).
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            SiteProfile::Yahoo
                | SiteProfile::Cnbc
                | SiteProfile::Bloomberg
                | SiteProfile::SeekingAlpha
                | SiteProfile::Investing
                | SiteProfile::Benzinga
                | SiteProfile::GoogleFinance
        )
    }
}

impl Serialize for SiteProfile {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl fmt::Display for SiteProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host predicate. `Domain` matches the domain itself or any subdomain of it.
#[derive(Debug, Clone, Copy)]
enum HostRule {
    Domain(&'static str),
    DomainWithPath(&'static str, &'static str),
}

impl HostRule {
    fn matches(self, host: &str, path: &str) -> bool {
        match self {
            HostRule::Domain(d) => domain_matches(host, d),
            HostRule::DomainWithPath(d, prefix) => {
                domain_matches(host, d) && path.starts_with(prefix)
            }
        }
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map(|rest| rest.ends_with('.'))
            .unwrap_or(false)
}

/// Evaluated top to bottom; first match wins.
const RULES: &[(HostRule, SiteProfile)] = &[
    (HostRule::Domain("yahoo.com"), SiteProfile::Yahoo),
    (HostRule::Domain("bloomberg.com"), SiteProfile::Bloomberg),
    (HostRule::Domain("reuters.com"), SiteProfile::Reuters),
    (HostRule::Domain("cnbc.com"), SiteProfile::Cnbc),
    (HostRule::Domain("marketwatch.com"), SiteProfile::MarketWatch),
    (HostRule::Domain("wsj.com"), SiteProfile::Wsj),
    (HostRule::Domain("ft.com"), SiteProfile::Ft),
    (HostRule::Domain("seekingalpha.com"), SiteProfile::SeekingAlpha),
    (HostRule::Domain("investing.com"), SiteProfile::Investing),
    (HostRule::Domain("fool.com"), SiteProfile::Fool),
    (HostRule::Domain("barrons.com"), SiteProfile::Barrons),
    (HostRule::Domain("benzinga.com"), SiteProfile::Benzinga),
    (HostRule::Domain("forbes.com"), SiteProfile::Forbes),
    (HostRule::Domain("businessinsider.com"), SiteProfile::BusinessInsider),
    (HostRule::Domain("zacks.com"), SiteProfile::Zacks),
    (HostRule::Domain("morningstar.com"), SiteProfile::Morningstar),
    (HostRule::Domain("thestreet.com"), SiteProfile::TheStreet),
    (HostRule::Domain("nasdaq.com"), SiteProfile::Nasdaq),
    (HostRule::DomainWithPath("google.com", "/finance"), SiteProfile::GoogleFinance),
    (HostRule::Domain("economictimes.indiatimes.com"), SiteProfile::EconomicTimes),
    (HostRule::Domain("moneycontrol.com"), SiteProfile::Moneycontrol),
];

const FINANCIAL_KEYWORDS: [&str; 5] = ["finance", "markets", "stocks", "news", "article"];

/// Classify from host and path. Never fails.
pub fn classify(host: &str, path: &str) -> SiteProfile {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let path = path.to_ascii_lowercase();
    for (rule, profile) in RULES {
        if rule.matches(&host, &path) {
            return *profile;
        }
    }
    if FINANCIAL_KEYWORDS
        .iter()
        .any(|k| host.contains(k) || path.contains(k))
    {
        return SiteProfile::GenericFinancial;
    }
    SiteProfile::Generic
}

/// Classify a full URL. Unparseable URLs are `Generic`.
pub fn classify_url(page_url: &str) -> SiteProfile {
    match url::Url::parse(page_url) {
        Ok(u) => classify(u.host_str().unwrap_or(""), u.path()),
        Err(_) => SiteProfile::Generic,
    }
}
