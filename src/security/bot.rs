//! Signature-based bot classification.
//!
//! # Scoring
//! ```text
//! empty user-agent                         +3
//! known-good crawler                        → good, score 0 (stops here)
//! known-bad automation signature            → bad, +5
//! no referer on a non-API path             +1
//! each proxy/host-override header          +2
//! user-agent shorter than 20 chars         +2
//! user-agent without a browser engine      +2
//! ```

use axum::http::HeaderMap;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotType {
    Good,
    Bad,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotVerdict {
    pub is_bot: bool,
    pub bot_type: BotType,
    pub suspicious_score: u32,
}

/// The request attributes the classifier looks at.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    pub path: String,
    pub user_agent: String,
    pub referer: Option<String>,
    /// Lower-cased names of the request headers.
    pub header_names: Vec<String>,
}

impl RequestMetadata {
    pub fn from_headers(path: &str, headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            path: path.to_string(),
            user_agent: text("user-agent").unwrap_or_default(),
            referer: text("referer").filter(|r| !r.is_empty()),
            header_names: headers.keys().map(|k| k.as_str().to_ascii_lowercase()).collect(),
        }
    }
}

const GOOD_BOT_PATTERN: &str = r"(?i)googlebot|bingbot|slurp|duckduckbot|baiduspider|yandexbot|facebookexternalhit|twitterbot|linkedinbot|applebot";

const BAD_BOT_PATTERN: &str = r"(?i)curl|wget|python-requests|python-urllib|aiohttp|httpclient|okhttp|java/|go-http-client|libwww-perl|scrapy|phantomjs|headlesschrome|selenium|puppeteer|playwright|bot|spider|crawl|scrap";

const BROWSER_ENGINE_PATTERN: &str = r"(?i)mozilla|applewebkit|gecko|chrome|safari|firefox|edg/|opera|trident";

/// Headers used to override the host or the routed URL.
pub const SUSPICIOUS_HEADERS: &[&str] = &[
    "x-forwarded-host",
    "x-original-url",
    "x-rewrite-url",
    "x-host",
    "x-forwarded-server",
    "x-http-host-override",
];

const MIN_USER_AGENT_LEN: usize = 20;

type BadBotHook = Box<dyn Fn(&RequestMetadata, &BotVerdict) + Send + Sync>;

pub struct BotSignatureClassifier {
    good: Regex,
    bad: Regex,
    browser: Regex,
    on_bad: Option<BadBotHook>,
}

impl BotSignatureClassifier {
    pub fn new() -> Self {
        Self {
            good: Regex::new(GOOD_BOT_PATTERN).expect("good bot pattern is valid"),
            bad: Regex::new(BAD_BOT_PATTERN).expect("bad bot pattern is valid"),
            browser: Regex::new(BROWSER_ENGINE_PATTERN).expect("browser pattern is valid"),
            on_bad: None,
        }
    }

    /// Invoke `hook` whenever a request classifies as a bad bot.
    pub fn with_bad_bot_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestMetadata, &BotVerdict) + Send + Sync + 'static,
    {
        self.on_bad = Some(Box::new(hook));
        self
    }

    pub fn is_known_bad(&self, user_agent: &str) -> bool {
        !self.good.is_match(user_agent) && self.bad.is_match(user_agent)
    }

    pub fn classify(&self, meta: &RequestMetadata) -> BotVerdict {
        let ua = meta.user_agent.trim();
        let mut score = 0;

        if ua.is_empty() {
            score += 3;
        }

        if self.good.is_match(ua) {
            return BotVerdict {
                is_bot: true,
                bot_type: BotType::Good,
                suspicious_score: 0,
            };
        }

        let mut bot_type = BotType::Unknown;
        if self.bad.is_match(ua) {
            bot_type = BotType::Bad;
            score += 5;
        }

        if meta.referer.is_none() && !meta.path.starts_with("/api/") {
            score += 1;
        }

        let override_headers = meta
            .header_names
            .iter()
            .filter(|name| SUSPICIOUS_HEADERS.contains(&name.as_str()))
            .count() as u32;
        score += override_headers * 2;

        if ua.len() < MIN_USER_AGENT_LEN {
            score += 2;
        }

        if !ua.is_empty() && !self.browser.is_match(ua) {
            score += 2;
        }

        let verdict = BotVerdict {
            is_bot: bot_type == BotType::Bad,
            bot_type,
            suspicious_score: score,
        };
        if bot_type == BotType::Bad {
            if let Some(hook) = &self.on_bad {
                hook(meta, &verdict);
            }
        }
        verdict
    }
}

impl Default for BotSignatureClassifier {
    fn default() -> Self {
        Self::new()
    }
}
