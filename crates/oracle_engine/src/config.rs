use big_road::BigRoadConfig;
use core_types::OracleError;
use miss_gate::GateConfig;
use outcome_stream::StreamConfig;
use pattern_detectors::DetectorConfig;
use serde::{Deserialize, Serialize};
use vote_aggregator::AggregatorConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary outcomes required before any real forecast.
    pub min_primary_history: usize,
    /// Appends that can be rolled back exactly.
    pub undo_depth: usize,
    /// Miss streak at which the best recent module takes over; 0 disables.
    pub recovery_from_miss: u32,
    /// First miss streak past the recovery window (exclusive bound).
    pub recovery_until_miss: u32,
    /// Prefixes replayed when ranking modules for recovery.
    pub recovery_lookback: usize,
    pub sniper_min_confidence: f64,
    /// Live accuracy (percent) every contributing module needs for a sniper call.
    pub sniper_min_module_accuracy: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_primary_history: 20,
            undo_depth: 100,
            recovery_from_miss: 3,
            recovery_until_miss: 5,
            recovery_lookback: 10,
            sniper_min_confidence: 0.95,
            sniper_min_module_accuracy: 85.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub engine: EngineConfig,
    pub stream: StreamConfig,
    pub detectors: DetectorConfig,
    pub aggregator: AggregatorConfig,
    pub gate: GateConfig,
    pub big_road: BigRoadConfig,
}

impl OracleConfig {
    /// Rejects sizes that would make the engine inert or thresholds that are
    /// not numbers, then clamps every probability-like threshold into [0,1].
    pub fn validate(mut self) -> Result<Self, OracleError> {
        self.check_finite()?;
        if self.stream.max_len == 0 {
            return Err(OracleError::InvalidConfig("stream.max_len must be > 0".into()));
        }
        if self.gate.max_miss_streak == 0 {
            return Err(OracleError::InvalidConfig(
                "gate.max_miss_streak must be > 0".into(),
            ));
        }
        if self.big_road.max_column_height == 0 {
            return Err(OracleError::InvalidConfig(
                "big_road.max_column_height must be > 0".into(),
            ));
        }
        if self.engine.min_primary_history == 0 {
            return Err(OracleError::InvalidConfig(
                "engine.min_primary_history must be > 0".into(),
            ));
        }
        if self.engine.min_primary_history > self.stream.max_len {
            return Err(OracleError::InvalidConfig(format!(
                "engine.min_primary_history ({}) exceeds stream.max_len ({})",
                self.engine.min_primary_history, self.stream.max_len
            )));
        }

        let agg = &mut self.aggregator;
        agg.plurality_threshold = agg.plurality_threshold.clamp(0.0, 1.0);
        agg.weighted_threshold = agg.weighted_threshold.clamp(0.0, 1.0);
        agg.counter_threshold = agg.counter_threshold.clamp(0.0, 1.0);
        let det = &mut self.detectors;
        for v in [
            &mut det.two_block_confidence,
            &mut det.momentum_base_confidence,
            &mut det.alternation_confidence,
            &mut det.counter_break_rate,
            &mut det.counter_confidence,
            &mut det.two_cut_confidence,
            &mut det.ping_pong_confidence,
        ] {
            *v = v.clamp(0.0, 1.0);
        }
        self.engine.sniper_min_confidence = self.engine.sniper_min_confidence.clamp(0.0, 1.0);
        self.engine.sniper_min_module_accuracy =
            self.engine.sniper_min_module_accuracy.clamp(0.0, 100.0);
        Ok(self)
    }

    fn check_finite(&self) -> Result<(), OracleError> {
        let agg = &self.aggregator;
        let det = &self.detectors;
        let eng = &self.engine;
        let fields = [
            ("aggregator.plurality_threshold", agg.plurality_threshold),
            ("aggregator.weighted_threshold", agg.weighted_threshold),
            ("aggregator.counter_threshold", agg.counter_threshold),
            ("detectors.two_block_confidence", det.two_block_confidence),
            ("detectors.momentum_base_confidence", det.momentum_base_confidence),
            ("detectors.alternation_confidence", det.alternation_confidence),
            ("detectors.counter_break_rate", det.counter_break_rate),
            ("detectors.counter_confidence", det.counter_confidence),
            ("detectors.two_cut_confidence", det.two_cut_confidence),
            ("detectors.ping_pong_confidence", det.ping_pong_confidence),
            ("engine.sniper_min_confidence", eng.sniper_min_confidence),
            ("engine.sniper_min_module_accuracy", eng.sniper_min_module_accuracy),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, v)) => Err(OracleError::InvalidConfig(format!(
                "{name} must be a finite number, got {v}"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vote_aggregator::AggregationPolicy;

    #[test]
    fn defaults_validate() {
        let cfg = OracleConfig::default().validate().unwrap();
        assert_eq!(cfg.engine.min_primary_history, 20);
        assert_eq!(cfg.gate.max_miss_streak, 6);
        assert_eq!(cfg.big_road.max_column_height, 6);
        assert_eq!(cfg.stream.max_len, 100);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            [aggregator]
            policy = "weighted_confidence"

            [gate]
            max_miss_streak = 4
        "#;
        let cfg: OracleConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.aggregator.policy, AggregationPolicy::WeightedConfidence);
        assert!((cfg.aggregator.plurality_threshold - 0.55).abs() < 1e-9);
        assert!((cfg.aggregator.weighted_threshold - 0.60).abs() < 1e-9);
        assert_eq!(cfg.gate.max_miss_streak, 4);
        assert_eq!(cfg.detectors, DetectorConfig::default());
    }

    #[test]
    fn validate_rejects_zero_caps_and_clamps_thresholds() {
        let mut cfg = OracleConfig::default();
        cfg.gate.max_miss_streak = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = OracleConfig::default();
        cfg.engine.min_primary_history = 500;
        assert!(cfg.validate().is_err());

        let mut cfg = OracleConfig::default();
        cfg.aggregator.plurality_threshold = 3.0;
        cfg.detectors.counter_confidence = -1.0;
        let cfg = cfg.validate().unwrap();
        assert!((cfg.aggregator.plurality_threshold - 1.0).abs() < 1e-9);
        assert_eq!(cfg.detectors.counter_confidence, 0.0);
    }

    #[test]
    fn validate_rejects_non_finite_thresholds() {
        let cfg: OracleConfig = toml::from_str(
            r#"
            [aggregator]
            weighted_threshold = nan
        "#,
        )
        .unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, OracleError::InvalidConfig(ref m) if m.contains("weighted_threshold")));

        let mut cfg = OracleConfig::default();
        cfg.detectors.counter_confidence = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }
}
