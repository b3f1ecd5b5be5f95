use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::json;
use unicode_segmentation::UnicodeSegmentation;

use super::settings::Sentiment;
use super::validators::CodeValidator;
use crate::domain::grader::{GraderVerdict, MAX_SCORE};

/// Polarity beyond which text counts as positive or negative
const NEUTRAL_BAND: f64 = 0.1;

/// Words after a negator whose polarity gets flipped
const NEGATION_WINDOW: usize = 3;

static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let positive: &[(&str, f64)] = &[
        ("good", 0.7),
        ("great", 0.8),
        ("excellent", 1.0),
        ("amazing", 0.9),
        ("awesome", 1.0),
        ("fantastic", 0.9),
        ("wonderful", 1.0),
        ("love", 0.5),
        ("loved", 0.7),
        ("like", 0.2),
        ("happy", 0.8),
        ("glad", 0.5),
        ("pleased", 0.5),
        ("best", 1.0),
        ("nice", 0.6),
        ("perfect", 1.0),
        ("positive", 0.2),
        ("helpful", 0.5),
        ("thanks", 0.2),
        ("thank", 0.2),
        ("enjoy", 0.4),
        ("enjoyed", 0.5),
        ("satisfied", 0.5),
        ("recommend", 0.4),
        ("beautiful", 0.85),
        ("fast", 0.2),
        ("easy", 0.4),
    ];
    let negative: &[(&str, f64)] = &[
        ("bad", -0.7),
        ("terrible", -1.0),
        ("awful", -1.0),
        ("horrible", -1.0),
        ("worst", -1.0),
        ("poor", -0.4),
        ("hate", -0.8),
        ("hated", -0.9),
        ("angry", -0.5),
        ("sad", -0.5),
        ("disappointed", -0.75),
        ("disappointing", -0.6),
        ("broken", -0.4),
        ("negative", -0.3),
        ("useless", -0.5),
        ("slow", -0.3),
        ("wrong", -0.5),
        ("problem", -0.2),
        ("annoying", -0.8),
        ("frustrating", -0.7),
        ("sorry", -0.5),
        ("fail", -0.5),
        ("failed", -0.5),
        ("never", -0.1),
        ("difficult", -0.5),
        ("expensive", -0.5),
        ("rude", -0.3),
    ];

    positive.iter().chain(negative.iter()).copied().collect()
});

static NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "cannot", "dont",
    "don't", "doesn't", "isn't", "wasn't", "aren't", "won't", "didn't", "can't", "couldn't",
];

/// Mean lexicon polarity of the text in `[-1, 1]`; 0 when no sentiment words
/// are present
pub fn polarity(text: &str) -> f64 {
    let words: Vec<String> = text.unicode_words().map(str::to_lowercase).collect();

    let mut total = 0.0;
    let mut hits = 0usize;
    let mut negated_for = 0usize;

    for word in &words {
        if NEGATORS.contains(&word.as_str()) {
            negated_for = NEGATION_WINDOW;
            continue;
        }

        if let Some(weight) = LEXICON.get(word.as_str()) {
            total += if negated_for > 0 { -weight * 0.5 } else { *weight };
            hits += 1;
        }

        negated_for = negated_for.saturating_sub(1);
    }

    if hits == 0 {
        0.0
    } else {
        (total / hits as f64).clamp(-1.0, 1.0)
    }
}

pub fn classify(polarity: f64) -> Sentiment {
    if polarity > NEUTRAL_BAND {
        Sentiment::Positive
    } else if polarity < -NEUTRAL_BAND {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    expected: Sentiment,
    threshold: f64,
}

impl SentimentAnalyzer {
    pub const NAME: &'static str = "sentiment_analyzer";

    pub fn new(expected: Sentiment, threshold: f64) -> Self {
        Self {
            expected,
            threshold,
        }
    }
}

impl CodeValidator for SentimentAnalyzer {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        let polarity = polarity(response);
        let detected = classify(polarity);
        let matches = detected == self.expected;

        let score = if matches {
            MAX_SCORE
        } else {
            (MAX_SCORE - polarity.abs() * MAX_SCORE).max(0.0).trunc()
        };

        GraderVerdict::new(
            Self::NAME,
            score,
            matches && score >= self.threshold,
            format!(
                "Detected {} sentiment (polarity: {:.2}), expected {}",
                detected, polarity, self.expected
            ),
        )
        .with_details(json!({
            "polarity": (polarity * 1000.0).round() / 1000.0,
            "detected": detected.as_str(),
            "expected": self.expected.as_str(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_direction() {
        assert!(polarity("This is a great and wonderful product") > NEUTRAL_BAND);
        assert!(polarity("Terrible service, I hated it") < -NEUTRAL_BAND);
        assert_eq!(polarity("The package arrived on Tuesday"), 0.0);
    }

    #[test]
    fn test_negation_flips_polarity() {
        assert!(polarity("The food was good") > 0.0);
        assert!(polarity("The food was not good") < 0.0);
    }

    #[test]
    fn test_classify_band() {
        assert_eq!(classify(0.1), Sentiment::Neutral);
        assert_eq!(classify(-0.1), Sentiment::Neutral);
        assert_eq!(classify(0.11), Sentiment::Positive);
        assert_eq!(classify(-0.5), Sentiment::Negative);
    }

    #[test]
    fn test_matching_sentiment_scores_ten() {
        let analyzer = SentimentAnalyzer::new(Sentiment::Positive, 7.0);
        let verdict = analyzer.check("Excellent, I love it!");

        assert_eq!(verdict.score, 10.0);
        assert!(verdict.passed);
        assert_eq!(
            verdict.details.as_ref().unwrap()["detected"],
            serde_json::json!("positive")
        );
    }

    #[test]
    fn test_mismatched_sentiment_scores_by_distance() {
        let analyzer = SentimentAnalyzer::new(Sentiment::Neutral, 7.0);
        // "awful" alone has polarity -1.0
        let verdict = analyzer.check("awful");

        assert_eq!(verdict.score, 0.0);
        assert!(!verdict.passed);
        assert!(verdict.reason.contains("expected neutral"));
    }
}
