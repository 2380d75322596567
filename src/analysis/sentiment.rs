// Lexicon-based employee sentiment analysis

use crate::core::models::round_to;
use serde::Serialize;

const POSITIVE_WORDS: [&str; 16] = [
    "bien", "bon", "bonne", "satisfait", "satisfaite", "content", "contente", "merci",
    "excellent", "sécurisé", "amélioration", "efficace", "motivé", "confiance", "agréable", "clair",
];

const NEGATIVE_WORDS: [&str; 18] = [
    "mal", "mauvais", "mauvaise", "dangereux", "dangereuse", "peur", "stress", "fatigue",
    "fatigué", "insatisfait", "problème", "accident", "risque", "inquiet", "inquiète", "manque",
    "épuisé", "difficile",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextSentiment {
    pub text: String,
    pub sentiment: Sentiment,
    /// Share of matched lexicon words that agree with the label
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalSentiment {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub sentiment_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentReport {
    pub individual_analysis: Vec<TextSentiment>,
    pub global_sentiment: GlobalSentiment,
    pub recommendations: Vec<String>,
}

fn classify(text: &str) -> TextSentiment {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count();
    let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count();
    let matched = positive + negative;

    let (sentiment, score) = if positive > negative {
        (Sentiment::Positive, positive as f64 / matched as f64)
    } else if negative > positive {
        (Sentiment::Negative, negative as f64 / matched as f64)
    } else {
        (Sentiment::Neutral, if matched == 0 { 1.0 } else { 0.5 })
    };

    TextSentiment {
        text: text.to_string(),
        sentiment,
        score: round_to(score, 2),
    }
}

/// Classify each text and summarise the batch
///
/// Recommendations are only produced when more than 30% of texts are negative.
pub fn analyze_sentiment(texts: &[String]) -> SentimentReport {
    let individual_analysis: Vec<TextSentiment> = texts.iter().map(|t| classify(t)).collect();

    let count = |s: Sentiment| individual_analysis.iter().filter(|a| a.sentiment == s).count();
    let positive = count(Sentiment::Positive);
    let negative = count(Sentiment::Negative);
    let neutral = count(Sentiment::Neutral);
    let total = individual_analysis.len();

    let sentiment_score = if total > 0 {
        round_to((positive as f64 - negative as f64) / total as f64, 2)
    } else {
        0.0
    };

    let recommendations = if total > 0 && negative as f64 > total as f64 * 0.3 {
        vec![
            "Sentiment négatif élevé - Enquête de satisfaction nécessaire".to_string(),
            "Mise en place d'un plan d'amélioration du climat social".to_string(),
            "Formation des managers sur la communication".to_string(),
        ]
    } else {
        Vec::new()
    };

    SentimentReport {
        individual_analysis,
        global_sentiment: GlobalSentiment {
            positive,
            negative,
            neutral,
            sentiment_score,
        },
        recommendations,
    }
}
