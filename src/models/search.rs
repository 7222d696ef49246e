//! Query-side models: distance metric, ranked results and answers.

use serde::{Deserialize, Serialize};

use super::document::{Metadata, SOURCE_KEY};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Distance between two embedding vectors. Smaller is closer for both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`. A zero vector is at distance 1 from everything.
    #[default]
    Cosine,
    /// L2 distance.
    Euclidean,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
                1.0 - similarity.clamp(-1.0, 1.0)
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            _ => Err(format!("unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}

impl ScoredEntry {
    pub fn source(&self) -> &str {
        self.metadata
            .get(SOURCE_KEY)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

/// Passages ranked nearest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub entries: Vec<ScoredEntry>,
}

impl QueryResult {
    pub fn new(entries: Vec<ScoredEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn best(&self) -> Option<&ScoredEntry> {
        self.entries.first()
    }

    pub fn sources(&self) -> Vec<&str> {
        self.entries.iter().map(ScoredEntry::source).collect()
    }
}

/// Why a question produced no passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoAnswerReason {
    BlankQuestion,
    MissingIndex,
    EmptyIndex,
}

impl NoAnswerReason {
    pub fn message(&self) -> &'static str {
        match self {
            NoAnswerReason::BlankQuestion => "Please enter a question.",
            NoAnswerReason::MissingIndex => "No index available. Add files to the data directory and run `docqa index`.",
            NoAnswerReason::EmptyIndex => "The index is empty. Add files to the data directory and rebuild.",
        }
    }
}

/// Outcome of resolving one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    Found { question: String, result: QueryResult },
    NoAnswer { question: String, reason: NoAnswerReason },
}

impl Answer {
    pub fn question(&self) -> &str {
        match self {
            Answer::Found { question, .. } | Answer::NoAnswer { question, .. } => question,
        }
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            Answer::Found { result, .. } => Some(result),
            Answer::NoAnswer { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Answer::Found { .. })
    }
}
