mod config;


use std::collections::{BTreeMap, VecDeque};

use big_road::{BigRoadBuilder, RoadColumn, RoadTrend};
use core_types::{
    format_sequence, Candidate, Detector, Forecast, ForecastKind, ModuleId, OracleError, Outcome,
    Recommendation,
};
use learning_tracker::{accuracy_map, backtest, best_module, LearningCounters, ModuleAccuracy};
use miss_gate::{GateEvent, MissStreakGate};
use outcome_stream::OutcomeStream;
use pattern_detectors::default_detectors;
use serde::Serialize;
use vote_aggregator::Aggregator;

pub use config::{EngineConfig, OracleConfig};

/// The forecast handed out for the current stream state, with the raw votes
/// behind it so the next recorded outcome can score each module.
#[derive(Debug, Clone)]
struct Pending {
    forecast: Forecast,
    candidates: Vec<Candidate>,
}

/// State captured before an append so `undo` can put it back exactly.
#[derive(Debug, Clone)]
struct UndoEntry {
    evicted: Vec<Outcome>,
    gate: MissStreakGate,
    learning: LearningCounters,
    pending: Option<Pending>,
}

/// Read-only summary of a session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub history: String,
    pub recorded: usize,
    pub primary: usize,
    pub ties: usize,
    pub miss_streak: u32,
    pub gate_closed: bool,
    pub trend: Option<RoadTrend>,
    pub columns: usize,
}

// ============================================================
// OracleEngine — one interactive session. Owns the stream, the
// gate and the learning counters; callers serialize access.
// ============================================================
pub struct OracleEngine {
    cfg: OracleConfig,
    stream: OutcomeStream,
    detectors: Vec<Box<dyn Detector>>,
    aggregator: Aggregator,
    gate: MissStreakGate,
    learning: LearningCounters,
    road: BigRoadBuilder,
    columns: Vec<RoadColumn>,
    pending: Option<Pending>,
    undo_log: VecDeque<UndoEntry>,
}

impl Default for OracleEngine {
    fn default() -> Self {
        let cfg = OracleConfig::default();
        let detectors = default_detectors(&cfg.detectors);
        Self::assemble(cfg, detectors)
    }
}

impl OracleEngine {
    pub fn new(cfg: OracleConfig) -> Result<Self, OracleError> {
        let cfg = cfg.validate()?;
        let detectors = default_detectors(&cfg.detectors);
        Ok(Self::assemble(cfg, detectors))
    }

    /// Engine over a custom module set; registration order is tie-break order.
    pub fn with_detectors(
        cfg: OracleConfig,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Result<Self, OracleError> {
        let cfg = cfg.validate()?;
        Ok(Self::assemble(cfg, detectors))
    }

    fn assemble(cfg: OracleConfig, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            stream: OutcomeStream::new(cfg.stream.clone()),
            aggregator: Aggregator::new(cfg.aggregator.clone()),
            gate: MissStreakGate::new(&cfg.gate),
            road: BigRoadBuilder::new(cfg.big_road.clone()),
            learning: LearningCounters::default(),
            columns: Vec::new(),
            pending: None,
            undo_log: VecDeque::new(),
            detectors,
            cfg,
        }
    }

    pub fn cfg(&self) -> &OracleConfig {
        &self.cfg
    }

    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    // --------------------------------------------------------
    // Recording
    // --------------------------------------------------------

    /// Parses and records one symbol; a malformed symbol leaves the session untouched.
    pub fn record_symbol(&mut self, raw: &str) -> Result<(), OracleError> {
        let outcome: Outcome = raw.parse()?;
        self.record(outcome);
        Ok(())
    }

    /// Records the actual outcome of the hand the last forecast was about.
    pub fn record(&mut self, outcome: Outcome) {
        if !outcome.is_primary() && self.stream.primary_len() == 0 {
            tracing::debug!(%outcome, "dropping tie recorded before any hand");
            return;
        }

        let gate_before = self.gate;
        let learning_before = self.learning.clone();
        let pending = self.pending.take();

        if outcome.is_primary() {
            self.score(pending.as_ref(), outcome);
        }

        let appended = self.stream.append(outcome);
        self.undo_log.push_back(UndoEntry {
            evicted: appended.evicted,
            gate: gate_before,
            learning: learning_before,
            pending,
        });
        while self.undo_log.len() > self.cfg.engine.undo_depth {
            self.undo_log.pop_front();
        }
        self.rebuild_road();
        metrics::counter!("oracle.record").increment(1);
        tracing::debug!(
            %outcome,
            primary_len = self.stream.primary_len(),
            miss_streak = self.gate.streak(),
            "outcome recorded"
        );
    }

    fn score(&mut self, pending: Option<&Pending>, actual: Outcome) {
        if let Some(p) = pending {
            if let Some(predicted) = p.forecast.outcome() {
                let event = self.gate.record(predicted == actual);
                self.learning
                    .record_forecast(predicted, actual, &p.candidates);
                self.log_gate_event(event, predicted, actual);
                return;
            }
        }
        if self.gate.is_closed() && self.has_min_history() {
            // Shadow forecast from the state the actual outcome follows.
            let view = self.stream.primary_view();
            let (_, shadow) = self.vote(&view);
            if shadow.outcome() == Some(actual) {
                let event = self.gate.record(true);
                self.log_gate_event(event, actual, actual);
            }
        }
    }

    fn log_gate_event(&self, event: GateEvent, predicted: Outcome, actual: Outcome) {
        match event {
            GateEvent::Tripped => {
                metrics::counter!("oracle.gate.tripped").increment(1);
                tracing::warn!(
                    %predicted,
                    %actual,
                    miss_streak = self.gate.streak(),
                    "miss streak hit cap, forecasting suspended"
                );
            }
            GateEvent::Released => {
                tracing::info!(%actual, "correct call while gated, forecasting resumed");
            }
            GateEvent::Miss => {
                tracing::debug!(%predicted, %actual, miss_streak = self.gate.streak(), "miss");
            }
            GateEvent::Hit => {
                tracing::debug!(%predicted, "hit");
            }
        }
    }

    /// Removes the last recorded outcome and restores the counters captured
    /// before it. Once the undo log is exhausted only the stream is rolled back.
    pub fn remove_last(&mut self) {
        let Some(removed) = self.stream.remove_last() else {
            return;
        };
        match self.undo_log.pop_back() {
            Some(entry) => {
                self.stream.restore_front(&entry.evicted);
                self.gate = entry.gate;
                self.learning = entry.learning;
                self.pending = entry.pending;
            }
            None => {
                tracing::warn!(
                    outcome = %removed,
                    "undo log exhausted, counters kept as they are"
                );
                self.pending = None;
            }
        }
        self.rebuild_road();
        tracing::debug!(outcome = %removed, primary_len = self.stream.primary_len(), "undo");
    }

    pub fn reset(&mut self) {
        self.stream.reset();
        self.gate.reset();
        self.learning.reset();
        self.columns.clear();
        self.pending = None;
        self.undo_log.clear();
        tracing::info!("session reset");
    }

    // --------------------------------------------------------
    // Forecasting
    // --------------------------------------------------------

    /// Forecast for the next hand. Repeated calls without a recording in
    /// between return the same value.
    pub fn predict_next(&mut self) -> Forecast {
        if let Some(p) = &self.pending {
            return p.forecast.clone();
        }
        let (candidates, forecast) = self.forecast_fresh();
        match forecast.recommendation {
            Recommendation::Play => metrics::counter!("oracle.forecast.play").increment(1),
            Recommendation::Avoid => metrics::counter!("oracle.forecast.avoid").increment(1),
        }
        self.pending = Some(Pending {
            forecast: forecast.clone(),
            candidates,
        });
        forecast
    }

    fn has_min_history(&self) -> bool {
        self.stream.primary_len() >= self.cfg.engine.min_primary_history
    }

    fn forecast_fresh(&self) -> (Vec<Candidate>, Forecast) {
        if !self.has_min_history() {
            return (Vec::new(), Forecast::insufficient_history());
        }
        if self.gate.is_closed() {
            return (Vec::new(), Forecast::gated(self.gate.streak()));
        }
        let view = self.stream.primary_view();
        let (candidates, mut forecast) = self.vote(&view);
        self.apply_recovery(&view, &candidates, &mut forecast);
        forecast.sniper = self.is_sniper(&forecast);
        forecast.miss_streak = self.gate.streak();
        (candidates, forecast)
    }

    fn vote(&self, view: &[Outcome]) -> (Vec<Candidate>, Forecast) {
        let candidates: Vec<Candidate> = self
            .detectors
            .iter()
            .filter_map(|d| d.predict(view))
            .collect();
        let forecast = self.aggregator.combine(&candidates, view);
        (candidates, forecast)
    }

    fn apply_recovery(&self, view: &[Outcome], candidates: &[Candidate], forecast: &mut Forecast) {
        let from = self.cfg.engine.recovery_from_miss;
        let streak = self.gate.streak();
        if from == 0 || streak < from || streak >= self.cfg.engine.recovery_until_miss {
            return;
        }
        let report = backtest(
            &self.detectors,
            view,
            Some(self.cfg.engine.recovery_lookback.max(1)),
        );
        let Some(best) = best_module(&report) else {
            return;
        };
        let Some(c) = candidates.iter().find(|c| c.source == best) else {
            return;
        };
        tracing::info!(
            module = %best,
            outcome = %c.outcome,
            miss_streak = self.gate.streak(),
            "recovery: following best recent module"
        );
        let pattern = c.pattern.map(str::to_string).or(forecast.pattern.take());
        *forecast = Forecast {
            kind: ForecastKind::Prediction(c.outcome),
            confidence: c.confidence,
            sources: vec![best],
            is_counter: c.is_counter,
            recommendation: Recommendation::Play,
            pattern,
            recovery: true,
            ..Forecast::no_pattern()
        };
    }

    fn is_sniper(&self, forecast: &Forecast) -> bool {
        if !forecast.is_real()
            || forecast.recovery
            || forecast.sources.is_empty()
            || self.gate.streak() != 0
            || forecast.confidence < self.cfg.engine.sniper_min_confidence
        {
            return false;
        }
        forecast.sources.iter().all(|id| {
            let live = self.learning.module(*id);
            live.total > 0 && live.accuracy_pct() >= self.cfg.engine.sniper_min_module_accuracy
        })
    }

    // --------------------------------------------------------
    // Backtest and learning
    // --------------------------------------------------------

    /// Historical hit rate (percent) of every module over the whole history.
    pub fn module_accuracy(&self) -> BTreeMap<ModuleId, f64> {
        accuracy_map(&self.module_accuracy_report(None))
    }

    /// Hit rate over the last `lookback` replayed prefixes only.
    pub fn module_accuracy_recent(&self, lookback: usize) -> BTreeMap<ModuleId, f64> {
        accuracy_map(&self.module_accuracy_report(Some(lookback)))
    }

    pub fn module_accuracy_report(&self, lookback: Option<usize>) -> Vec<ModuleAccuracy> {
        backtest(&self.detectors, &self.stream.primary_view(), lookback)
    }

    /// Accuracy of each module's own calls on scored forecasts this session.
    pub fn live_module_accuracy(&self) -> BTreeMap<ModuleId, f64> {
        self.learning.module_accuracy()
    }

    /// Accuracy of real forecasts grouped by the outcome that was called.
    pub fn outcome_accuracy(&self) -> BTreeMap<Outcome, f64> {
        self.learning.outcome_accuracy()
    }

    pub fn learning(&self) -> &LearningCounters {
        &self.learning
    }

    pub fn miss_streak(&self) -> u32 {
        self.gate.streak()
    }

    pub fn gate_closed(&self) -> bool {
        self.gate.is_closed()
    }

    // --------------------------------------------------------
    // Stream and Big Road views
    // --------------------------------------------------------

    pub fn history(&self) -> Vec<Outcome> {
        self.stream.to_vec()
    }

    pub fn primary_view(&self) -> Vec<Outcome> {
        self.stream.primary_view()
    }

    pub fn tie_attachments(&self) -> Vec<usize> {
        self.stream.tie_attachments()
    }

    pub fn stream(&self) -> &OutcomeStream {
        &self.stream
    }

    pub fn big_road_columns(&self) -> &[RoadColumn] {
        &self.columns
    }

    pub fn road_trend(&self) -> Option<RoadTrend> {
        self.road.classify(&self.columns, self.stream.primary_len())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            history: format_sequence(&self.stream.to_vec()),
            recorded: self.stream.len(),
            primary: self.stream.primary_len(),
            ties: self.stream.tie_count(),
            miss_streak: self.gate.streak(),
            gate_closed: self.gate.is_closed(),
            trend: self.road_trend(),
            columns: self.columns.len(),
        }
    }

    fn rebuild_road(&mut self) {
        self.columns = self.road.build(self.stream.iter());
    }
}
