// Text, sentiment and cost analysis

pub mod cost;
pub mod forecast;
pub mod llm_client;
pub mod sentiment;
pub mod text_analyzer;

pub use cost::{CostEstimate, CostInput, CostModel};
pub use forecast::{IncidentForecast, IncidentForecaster};
pub use llm_client::LlmTextAnalyzer;
pub use sentiment::{analyze_sentiment, SentimentReport};
pub use text_analyzer::{KeywordTextAnalyzer, ResilientTextAnalyzer, TextAnalysis};
