//! Per-item cleaning policy: length bounds, bot authors, promotional text and
//! language.

use opmon_core::{RawItem, ReducerConfig};
use regex::{RegexSet, RegexSetBuilder};

const AD_PATTERNS: &[&str] = &[
    r"buy\s+now",
    r"click\s+here",
    r"limited\s+offer",
    r"subscribe\s+to",
    r"follow\s+me",
    r"check\s+out\s+my",
    r"promo\s*code",
    r"discount",
    r"free\s+shipping",
];

const BOT_PATTERNS: &[&str] = &[r"bot$", r"automoderator", r"^auto", r"_bot$"];

/// Texts at or below this many characters skip language detection.
const LANGUAGE_CHECK_MIN_CHARS: usize = 50;

/// Why an item was dropped by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    TooShort,
    TooLong,
    Bot,
    Ad,
    Language,
    Duplicate,
    Malformed,
}

impl RejectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::TooShort => "too_short",
            RejectReason::TooLong => "too_long",
            RejectReason::Bot => "bot",
            RejectReason::Ad => "ad",
            RejectReason::Language => "language",
            RejectReason::Duplicate => "duplicate",
            RejectReason::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A case-insensitive set of regular expressions; matches if any member does.
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: RegexSet,
}

impl PatternSet {
    /// Compile a pattern set.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if any pattern is invalid.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { set })
    }

    /// Promotional phrases ("buy now", "promo code", ...).
    #[must_use]
    pub fn default_ads() -> Self {
        Self::new(AD_PATTERNS).expect("valid ad patterns")
    }

    /// Author handles that look automated.
    #[must_use]
    pub fn default_bots() -> Self {
        Self::new(BOT_PATTERNS).expect("valid bot patterns")
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.set.is_match(text)
    }
}

/// Detects the language of a text.
///
/// Returns `None` when detection fails or is not confident; the filter keeps
/// such items.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<String>;
}

/// [`LanguageDetector`] backed by `whatlang` trigram models.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        if !info.is_reliable() {
            return None;
        }
        let code = match info.lang() {
            whatlang::Lang::Eng => "en",
            whatlang::Lang::Cmn => "zh",
            whatlang::Lang::Spa => "es",
            whatlang::Lang::Fra => "fr",
            whatlang::Lang::Deu => "de",
            whatlang::Lang::Jpn => "ja",
            whatlang::Lang::Kor => "ko",
            whatlang::Lang::Rus => "ru",
            whatlang::Lang::Por => "pt",
            whatlang::Lang::Ita => "it",
            other => other.code(),
        };
        Some(code.to_string())
    }
}

/// Whether a detected language code satisfies the requested target.
fn language_matches(detected: &str, target: &str) -> bool {
    match target {
        "auto" | "" => true,
        "zh" => matches!(detected, "zh" | "zh-cn" | "zh-tw"),
        _ => detected.eq_ignore_ascii_case(target),
    }
}

/// The cleaning policy applied to every raw item before top-K selection.
pub struct ContentFilter {
    min_length: usize,
    max_length: usize,
    target_language: String,
    bots: Option<PatternSet>,
    ads: Option<PatternSet>,
    detector: Box<dyn LanguageDetector>,
}

impl ContentFilter {
    /// Build the default policy for a reducer config and target language.
    #[must_use]
    pub fn new(config: &ReducerConfig, target_language: &str) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            target_language: target_language.trim().to_ascii_lowercase(),
            bots: config.filter_bots.then(PatternSet::default_bots),
            ads: config.filter_ads.then(PatternSet::default_ads),
            detector: Box::new(WhatlangDetector),
        }
    }

    #[must_use]
    pub fn with_bot_patterns(mut self, patterns: PatternSet) -> Self {
        self.bots = Some(patterns);
        self
    }

    #[must_use]
    pub fn with_ad_patterns(mut self, patterns: PatternSet) -> Self {
        self.ads = Some(patterns);
        self
    }

    #[must_use]
    pub fn with_detector(mut self, detector: impl LanguageDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Decide whether an item is kept.
    ///
    /// # Errors
    ///
    /// Returns the first [`RejectReason`] that applies.
    pub fn check(&self, item: &RawItem) -> Result<(), RejectReason> {
        if item.source_id.trim().is_empty() {
            return Err(RejectReason::Malformed);
        }

        let text = item.visible_text();
        let len = text.chars().count();
        if len < self.min_length {
            return Err(RejectReason::TooShort);
        }
        if len > self.max_length {
            return Err(RejectReason::TooLong);
        }

        if let (Some(bots), Some(author)) = (&self.bots, item.author.as_deref()) {
            if bots.is_match(author) {
                return Err(RejectReason::Bot);
            }
        }

        if let Some(ads) = &self.ads {
            if ads.is_match(text) {
                return Err(RejectReason::Ad);
            }
        }

        if len > LANGUAGE_CHECK_MIN_CHARS {
            if let Some(detected) = self.detector.detect(text) {
                if !language_matches(&detected, &self.target_language) {
                    return Err(RejectReason::Language);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use opmon_core::{ContentType, Platform};

    use super::*;

    struct FixedDetector(Option<&'static str>);

    impl LanguageDetector for FixedDetector {
        fn detect(&self, _text: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn item(text: &str, author: Option<&str>) -> RawItem {
        RawItem {
            platform: Platform::Reddit,
            content_type: ContentType::Comment,
            source_id: "c1".to_string(),
            title: None,
            content: Some(text.to_string()),
            author: author.map(str::to_string),
            url: None,
            metrics: Default::default(),
            extra_fields: serde_json::Map::new(),
            published_at: None,
        }
    }

    fn filter() -> ContentFilter {
        ContentFilter::new(&ReducerConfig::default(), "en").with_detector(FixedDetector(None))
    }

    #[test]
    fn length_bounds_are_enforced() {
        let f = filter();
        assert_eq!(f.check(&item("too short", None)), Err(RejectReason::TooShort));
        assert_eq!(f.check(&item(&"a".repeat(5001), None)), Err(RejectReason::TooLong));
        assert_eq!(f.check(&item("exactly ten", None)), Ok(()));
    }

    #[test]
    fn bot_authors_are_rejected_case_insensitively() {
        let f = filter();
        for author in ["AutoModerator", "helper_bot", "NewsBot", "autoposter"] {
            assert_eq!(
                f.check(&item("perfectly normal comment", Some(author))),
                Err(RejectReason::Bot),
                "author {author} should be treated as a bot"
            );
        }
        assert_eq!(f.check(&item("perfectly normal comment", Some("robert"))), Ok(()));
    }

    #[test]
    fn promotional_text_is_rejected() {
        let f = filter();
        assert_eq!(
            f.check(&item("Use PROMO CODE save20 for a deal", None)),
            Err(RejectReason::Ad)
        );
        assert_eq!(
            f.check(&item("Click here to win a prize today", None)),
            Err(RejectReason::Ad)
        );
    }

    #[test]
    fn disabled_filters_let_items_through() {
        let config = ReducerConfig {
            filter_ads: false,
            filter_bots: false,
            ..ReducerConfig::default()
        };
        let f = ContentFilter::new(&config, "en").with_detector(FixedDetector(None));
        assert_eq!(f.check(&item("buy now while stocks last", Some("x_bot"))), Ok(()));
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let f = filter().with_ad_patterns(PatternSet::new(["giveaway"]).unwrap());
        assert_eq!(f.check(&item("buy now while stocks last", None)), Ok(()));
        assert_eq!(
            f.check(&item("huge GIVEAWAY this weekend", None)),
            Err(RejectReason::Ad)
        );
    }

    #[test]
    fn language_mismatch_rejects_only_long_texts() {
        let f = ContentFilter::new(&ReducerConfig::default(), "en")
            .with_detector(FixedDetector(Some("fr")));
        let long = "x".repeat(60);
        assert_eq!(f.check(&item(&long, None)), Err(RejectReason::Language));
        assert_eq!(f.check(&item("short but valid text", None)), Ok(()));
    }

    #[test]
    fn failed_detection_keeps_item() {
        let f = filter();
        assert_eq!(f.check(&item(&"y".repeat(80), None)), Ok(()));
    }

    #[test]
    fn chinese_variants_satisfy_zh_target() {
        assert!(language_matches("zh-tw", "zh"));
        assert!(language_matches("zh", "zh"));
        assert!(!language_matches("ja", "zh"));
        assert!(language_matches("fr", "auto"));
    }

    #[test]
    fn empty_source_id_is_malformed() {
        let mut it = item("a normal looking comment", None);
        it.source_id = "  ".to_string();
        assert_eq!(filter().check(&it), Err(RejectReason::Malformed));
    }

    #[test]
    fn whatlang_detects_plain_english() {
        let text = "The new phone has an excellent battery and the camera quality is \
                    much better than last year's model, which honestly surprised me. I have \
                    been using it every day for three weeks and would recommend it to anyone.";
        assert_eq!(WhatlangDetector.detect(text).as_deref(), Some("en"));
    }
}
