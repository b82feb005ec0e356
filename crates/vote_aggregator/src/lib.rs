use core_types::{Candidate, Forecast, ForecastKind, ModuleId, Outcome, Recommendation};
use pattern_detectors::match_suffix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Votes per outcome; confidence = votes / all candidates.
    #[default]
    Plurality,
    /// Mean candidate confidence of the modules backing each outcome.
    WeightedConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregatorConfig {
    pub policy: AggregationPolicy,
    /// Minimum vote share for a Play under `Plurality`.
    pub plurality_threshold: f64,
    /// Minimum mean confidence for a Play under `WeightedConfidence`.
    pub weighted_threshold: f64,
    /// A counter-bias candidate at or above this confidence wins outright.
    pub counter_threshold: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            policy: AggregationPolicy::Plurality,
            plurality_threshold: 0.55,
            weighted_threshold: 0.60,
            counter_threshold: 0.65,
        }
    }
}

#[derive(Debug, Clone)]
struct Tally {
    outcome: Outcome,
    votes: usize,
    confidence_sum: f64,
    sources: Vec<ModuleId>,
    pattern: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    cfg: AggregatorConfig,
}

impl Aggregator {
    pub fn new(cfg: AggregatorConfig) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &AggregatorConfig {
        &self.cfg
    }

    pub fn set_cfg(&mut self, cfg: AggregatorConfig) {
        self.cfg = cfg;
    }

    /// Folds the candidates (in module registration order) into one forecast.
    /// `view` is the primary-only history they were computed from.
    pub fn combine(&self, candidates: &[Candidate], view: &[Outcome]) -> Forecast {
        let active: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.outcome.is_primary())
            .collect();
        if active.is_empty() {
            return Forecast::no_pattern();
        }

        // Counter-bias short circuit.
        if let Some(c) = active
            .iter()
            .find(|c| c.is_counter && c.confidence >= self.cfg.counter_threshold)
        {
            return Forecast {
                kind: ForecastKind::Prediction(c.outcome),
                confidence: c.confidence,
                sources: vec![c.source],
                is_counter: true,
                recommendation: Recommendation::Play,
                pattern: c.pattern.map(str::to_string),
                ..Forecast::no_pattern()
            };
        }

        // Tallies stay in first-seen order so earlier modules win ties.
        let mut tallies: Vec<Tally> = Vec::with_capacity(2);
        for c in &active {
            match tallies.iter_mut().find(|t| t.outcome == c.outcome) {
                Some(t) => {
                    t.votes += 1;
                    t.confidence_sum += c.confidence;
                    t.sources.push(c.source);
                    t.pattern = t.pattern.or(c.pattern);
                }
                None => tallies.push(Tally {
                    outcome: c.outcome,
                    votes: 1,
                    confidence_sum: c.confidence,
                    sources: vec![c.source],
                    pattern: c.pattern,
                }),
            }
        }

        let total = active.len();
        let mut best: Option<(&Tally, f64)> = None;
        for t in &tallies {
            let score = self.score(t, total);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((t, score));
            }
        }
        let Some((winner, confidence)) = best else {
            return Forecast::no_pattern();
        };
        let confidence = confidence.clamp(0.0, 1.0);
        let pattern = winner
            .pattern
            .or_else(|| match_suffix(view).map(|r| r.label))
            .map(str::to_string);

        let (kind, recommendation) = if confidence >= self.play_threshold() {
            (ForecastKind::Prediction(winner.outcome), Recommendation::Play)
        } else {
            (
                ForecastKind::Unclear {
                    leaning: winner.outcome,
                },
                Recommendation::Avoid,
            )
        };
        Forecast {
            kind,
            confidence,
            sources: winner.sources.clone(),
            is_counter: false,
            recommendation,
            pattern,
            ..Forecast::no_pattern()
        }
    }

    /// Play threshold of the active policy.
    pub fn play_threshold(&self) -> f64 {
        match self.cfg.policy {
            AggregationPolicy::Plurality => self.cfg.plurality_threshold,
            AggregationPolicy::WeightedConfidence => self.cfg.weighted_threshold,
        }
    }

    fn score(&self, t: &Tally, total: usize) -> f64 {
        match self.cfg.policy {
            AggregationPolicy::Plurality => t.votes as f64 / total.max(1) as f64,
            AggregationPolicy::WeightedConfidence => t.confidence_sum / t.votes.max(1) as f64,
        }
    }
}
