use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One recorded hand result. `Player` and `Banker` are the primary outcomes the
/// engine forecasts; `Tie` is neutral and only annotates the preceding hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Player,
    Banker,
    Tie,
}

impl Outcome {
    pub fn is_primary(self) -> bool {
        !matches!(self, Self::Tie)
    }

    /// The other primary outcome. A tie has no opposite and maps to itself.
    pub fn opposite(self) -> Self {
        match self {
            Self::Player => Self::Banker,
            Self::Banker => Self::Player,
            Self::Tie => Self::Tie,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Player => 'P',
            Self::Banker => 'B',
            Self::Tie => 'T',
        }
    }

    pub fn from_symbol(c: char) -> Result<Self, OracleError> {
        match c.to_ascii_uppercase() {
            'P' => Ok(Self::Player),
            'B' => Ok(Self::Banker),
            'T' => Ok(Self::Tie),
            other => Err(OracleError::MalformedOutcome(other.to_string())),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Outcome {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_symbol(c),
            _ => match trimmed.to_ascii_lowercase().as_str() {
                "player" => Ok(Self::Player),
                "banker" => Ok(Self::Banker),
                "tie" => Ok(Self::Tie),
                _ => Err(OracleError::MalformedOutcome(trimmed.to_string())),
            },
        }
    }
}

/// Parses a compact sequence such as `"PPBT BPB"`. Whitespace, commas and dashes
/// are separators; any other symbol rejects the whole sequence.
pub fn parse_sequence(raw: &str) -> Result<Vec<Outcome>, OracleError> {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '-')
        .map(Outcome::from_symbol)
        .collect()
}

/// Renders outcomes back into the compact `PBT` form.
pub fn format_sequence(outcomes: &[Outcome]) -> String {
    outcomes.iter().map(|o| o.symbol()).collect()
}

/// Identifies a detector module. Declaration order is registration order and
/// is the aggregator's tie-break order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    StreakRule,
    SuffixPattern,
    MajorityTrend,
    TwoBlock,
    DnaFollower,
    Momentum,
    CounterBias,
}

impl ModuleId {
    pub const ALL: [ModuleId; 7] = [
        Self::StreakRule,
        Self::SuffixPattern,
        Self::MajorityTrend,
        Self::TwoBlock,
        Self::DnaFollower,
        Self::Momentum,
        Self::CounterBias,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StreakRule => "streak_rule",
            Self::SuffixPattern => "suffix_pattern",
            Self::MajorityTrend => "majority_trend",
            Self::TwoBlock => "two_block",
            Self::DnaFollower => "dna_follower",
            Self::Momentum => "momentum",
            Self::CounterBias => "counter_bias",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single module's vote for the next primary outcome.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Candidate {
    pub outcome: Outcome,
    /// Confidence in [0,1].
    pub confidence: f64,
    pub source: ModuleId,
    /// Set when the candidate bets against an observed streak.
    pub is_counter: bool,
    /// Display label of the trailing pattern that produced the vote, if any.
    pub pattern: Option<&'static str>,
}

impl Candidate {
    pub fn new(outcome: Outcome, confidence: f64, source: ModuleId) -> Self {
        Self {
            outcome,
            confidence: confidence.clamp(0.0, 1.0),
            source,
            is_counter: false,
            pattern: None,
        }
    }

    pub fn counter(mut self) -> Self {
        self.is_counter = true;
        self
    }

    pub fn with_pattern(mut self, label: &'static str) -> Self {
        self.pattern = Some(label);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Play,
    Avoid,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Play => "play",
            Self::Avoid => "avoid",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForecastKind {
    /// A real forecast the caller may act on.
    Prediction(Outcome),
    /// Candidates existed but the best aggregate stayed under the play threshold.
    Unclear { leaning: Outcome },
    /// No module produced a candidate.
    NoPattern,
    /// Fewer primary outcomes recorded than the engine needs.
    InsufficientHistory,
    /// Suppressed by the miss-streak gate.
    Gated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub kind: ForecastKind,
    /// Aggregate confidence in [0,1]; still reported for `Unclear`.
    pub confidence: f64,
    pub sources: Vec<ModuleId>,
    pub is_counter: bool,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Chosen by the best recent module while the miss streak was elevated.
    #[serde(default)]
    pub recovery: bool,
    /// Max confidence, clean miss streak and proven contributors.
    #[serde(default)]
    pub sniper: bool,
    #[serde(default)]
    pub miss_streak: u32,
}

impl Forecast {
    pub fn sentinel(kind: ForecastKind) -> Self {
        Self {
            kind,
            confidence: 0.0,
            sources: Vec::new(),
            is_counter: false,
            recommendation: Recommendation::Avoid,
            pattern: None,
            recovery: false,
            sniper: false,
            miss_streak: 0,
        }
    }

    pub fn insufficient_history() -> Self {
        Self::sentinel(ForecastKind::InsufficientHistory)
    }

    pub fn no_pattern() -> Self {
        Self::sentinel(ForecastKind::NoPattern)
    }

    pub fn gated(miss_streak: u32) -> Self {
        Self {
            miss_streak,
            ..Self::sentinel(ForecastKind::Gated)
        }
    }

    /// The forecast outcome, only for real predictions.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.kind {
            ForecastKind::Prediction(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_real(&self) -> bool {
        self.outcome().is_some()
    }

    /// Confidence as a 0-100 score for display.
    pub fn confidence_pct(&self) -> f64 {
        (self.confidence * 100.0).clamp(0.0, 100.0)
    }
}

/// A pattern heuristic over the primary-only view. Implementations are pure:
/// the same view always yields the same candidate.
pub trait Detector: Send + Sync {
    fn id(&self) -> ModuleId;

    /// Shortest primary-only view the module can read. Shorter views never
    /// produce a candidate.
    fn min_window(&self) -> usize;

    fn predict(&self, view: &[Outcome]) -> Option<Candidate>;
}

#[derive(Debug, Error, PartialEq)]
pub enum OracleError {
    #[error("malformed outcome: {0:?} (expected P, B or T)")]
    MalformedOutcome(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
