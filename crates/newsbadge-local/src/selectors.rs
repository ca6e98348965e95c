//! Selector registry.
//!
//! Site markup changes often. When a profile stops yielding headlines, capture a
//! sample page, adjust its list here, and add a fixture-based test.

use crate::site::SiteProfile;

/// Pass 1: semantic containers crossed with top-level headings.
pub const ARTICLE_CONTEXT: &[&str] = &[
    "article h1",
    "article h2",
    "article h3",
    "main h1",
    "main h2",
    "main h3",
    "[role=\"article\"] h1",
    "[role=\"article\"] h2",
    "[role=\"article\"] h3",
    "[role=\"main\"] h1",
    "[role=\"main\"] h2",
    "[role=\"main\"] h3",
    "section h1",
    "section h2",
    "section h3",
];

/// Pass 2: bare headings anywhere.
pub const GENERIC_HEADINGS: &[&str] = &["h1", "h2", "h3"];

const EXCLUDE_LAYOUT: &str = ":not([class*=\"grid\"]):not([class*=\"list\"]):not([class*=\"table\"]):not([class*=\"cell\"])";

/// Pass 4 class/attribute patterns, before the layout exclusion is appended.
const SHARED_PATTERNS: &[&str] = &[
    "[class*=\"headline\"]",
    "[class*=\"article-title\"]",
    "[class*=\"news-title\"]",
    "[class*=\"story-title\"]",
    "[class*=\"post-title\"]",
    "[data-testid*=\"headline\"]",
    "[data-testid*=\"title\"]",
];

/// Pass 4: shared class-pattern selectors, each excluding layout-ish classes.
pub fn shared_class_selectors() -> Vec<String> {
    SHARED_PATTERNS
        .iter()
        .map(|p| format!("{p}{EXCLUDE_LAYOUT}"))
        .collect()
}

const YAHOO: &[&str] = &[
    "h3 a[href*=\"/news/\"]",
    "a[href*=\"/news/\"] h3",
    "[data-test-locator=\"headline\"]",
    "li.js-stream-content h3",
    "div[class*=\"stream-item\"] h3",
    "a.subtle-link[href*=\"/news/\"]",
    "section[data-testid=\"storyitem\"] h3",
];

const BLOOMBERG: &[&str] = &[
    "[data-component=\"headline\"]",
    "a[class*=\"storyTitle\"]",
    "div[class*=\"StoryBlock\"] a",
    "h3[class*=\"headline\"] a",
];

const REUTERS: &[&str] = &[
    "[data-testid=\"Heading\"]",
    "a[data-testid=\"Link\"] span",
    "h3[class*=\"story-card\"]",
    "a[class*=\"media-story-card__heading\"]",
];

const CNBC: &[&str] = &[
    "a.Card-title",
    ".Card-titleContainer a",
    ".LatestNews-headline",
    ".RiverHeadline-headline a",
    "a[class*=\"headline\"]",
];

const MARKETWATCH: &[&str] = &[
    "h3.article__headline a",
    "a.link[href*=\"/story/\"]",
    ".article__content h3 a",
];

const WSJ: &[&str] = &[
    "h3[class*=\"headline\"] a",
    "a[class*=\"headline\"]",
    "span[class*=\"headlineText\"]",
];

const FT: &[&str] = &[
    "a.js-teaser-heading-link",
    ".o-teaser__heading a",
    "div[class*=\"headline\"] a",
];

const SEEKINGALPHA: &[&str] = &[
    "a[data-test-id=\"post-list-item-title\"]",
    "h3 a[href*=\"/news/\"]",
    "h3 a[href*=\"/article/\"]",
    "[data-test-id=\"post-list-item\"] h3",
];

const INVESTING: &[&str] = &[
    "a[data-test=\"article-title-link\"]",
    "article a.title",
    ".largeTitle article a.title",
    "div.textDiv a.title",
];

const FOOL: &[&str] = &[
    "a[href*=\"/investing/\"] h5",
    "h4 a[href*=\"/investing/\"]",
    ".headline",
];

const BARRONS: &[&str] = &[
    "h3[class*=\"headline\"] a",
    "h4[class*=\"headline\"] a",
    "a[class*=\"headline-link\"]",
];

const BENZINGA: &[&str] = &[
    ".post-title a",
    ".newsfeed-card a.content-title",
    "a[class*=\"PostCard__Title\"]",
];

const FORBES: &[&str] = &[
    "a.stream-item__title",
    "h3 a[href*=\"/sites/\"]",
    "a[data-ga-track*=\"headline\"]",
];

const BUSINESSINSIDER: &[&str] = &[
    "a.tout-title-link",
    "h2.tout-title a",
    "a.news-link",
];

const ZACKS: &[&str] = &[
    "h3 a[href*=\"/stock/news/\"]",
    "h3 a[href*=\"/commentary/\"]",
    ".listitem a",
];

const MORNINGSTAR: &[&str] = &[
    "a.mdc-link[href*=\"/news/\"]",
    "h2[class*=\"mdc-heading\"] a",
    "h3[class*=\"mdc-heading\"]",
];

const THESTREET: &[&str] = &[
    "h2[class*=\"m-card--header-text\"]",
    "a[class*=\"m-card--header-link\"]",
    "phoenix-super-link h3",
];

const NASDAQ: &[&str] = &[
    "a.jupiter22-c-article-list__item_title",
    "a[class*=\"article-list__item_title\"]",
    ".quote-news-headlines__item a",
];

const GOOGLE_FINANCE: &[&str] = &["div.Yfwt5", "a div.Yfwt5", "div[class*=\"z4rs2b\"] a"];

const ECONOMICTIMES: &[&str] = &["div.eachStory h3 a", "a[class*=\"flt\"] h3", ".story-box h4 a"];

const MONEYCONTROL: &[&str] = &["li.clearfix h2 a", "div.news_title a", "h2 a[href*=\"/news/\"]"];

const GENERIC_FINANCIAL: &[&str] = &[
    "article a h2",
    "article h2 a",
    "article h3 a",
    "a[href*=\"/news/\"]",
    "a[href*=\"/article\"]",
    "a[href*=\"/markets/\"]",
    "[class*=\"card\"] h3",
];

const GENERIC: &[&str] = &["article h2 a", "article h3 a", "[itemprop=\"headline\"]"];

/// Site-specific selectors, in evaluation order. Unlisted profiles fall back to the
/// generic list.
pub fn for_profile(profile: SiteProfile) -> &'static [&'static str] {
    let list: &'static [&'static str] = match profile {
        SiteProfile::Yahoo => YAHOO,
        SiteProfile::Bloomberg => BLOOMBERG,
        SiteProfile::Reuters => REUTERS,
        SiteProfile::Cnbc => CNBC,
        SiteProfile::MarketWatch => MARKETWATCH,
        SiteProfile::Wsj => WSJ,
        SiteProfile::Ft => FT,
        SiteProfile::SeekingAlpha => SEEKINGALPHA,
        SiteProfile::Investing => INVESTING,
        SiteProfile::Fool => FOOL,
        SiteProfile::Barrons => BARRONS,
        SiteProfile::Benzinga => BENZINGA,
        SiteProfile::Forbes => FORBES,
        SiteProfile::BusinessInsider => BUSINESSINSIDER,
        SiteProfile::Zacks => ZACKS,
        SiteProfile::Morningstar => MORNINGSTAR,
        SiteProfile::TheStreet => THESTREET,
        SiteProfile::Nasdaq => NASDAQ,
        SiteProfile::GoogleFinance => GOOGLE_FINANCE,
        SiteProfile::EconomicTimes => ECONOMICTIMES,
        SiteProfile::Moneycontrol => MONEYCONTROL,
        SiteProfile::GenericFinancial => GENERIC_FINANCIAL,
        SiteProfile::Generic => GENERIC,
    };
    if list.is_empty() {
        GENERIC
    } else {
        list
    }
}
