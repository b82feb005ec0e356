use std::collections::BTreeMap;

use core_types::{Candidate, Detector, ModuleId, Outcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinTotal {
    pub wins: u64,
    pub total: u64,
}

impl WinTotal {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.wins += 1;
        }
    }

    /// Win share in percent; 0 when nothing was scored.
    pub fn accuracy_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.wins as f64 / self.total as f64 * 100.0
        }
    }
}

/// Live hit counters, updated once per scored forecast. Purely observational:
/// detectors never read them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearningCounters {
    by_module: BTreeMap<ModuleId, WinTotal>,
    by_outcome: BTreeMap<Outcome, WinTotal>,
}

impl LearningCounters {
    /// Scores a real forecast of `predicted` against `actual`. Every module that
    /// voted in that cycle is scored on its own candidate.
    pub fn record_forecast(&mut self, predicted: Outcome, actual: Outcome, candidates: &[Candidate]) {
        self.by_outcome
            .entry(predicted)
            .or_default()
            .record(predicted == actual);
        for c in candidates {
            self.by_module
                .entry(c.source)
                .or_default()
                .record(c.outcome == actual);
        }
    }

    pub fn module(&self, id: ModuleId) -> WinTotal {
        self.by_module.get(&id).copied().unwrap_or_default()
    }

    pub fn outcome(&self, outcome: Outcome) -> WinTotal {
        self.by_outcome.get(&outcome).copied().unwrap_or_default()
    }

    pub fn module_accuracy(&self) -> BTreeMap<ModuleId, f64> {
        self.by_module
            .iter()
            .map(|(id, wt)| (*id, wt.accuracy_pct()))
            .collect()
    }

    pub fn outcome_accuracy(&self) -> BTreeMap<Outcome, f64> {
        self.by_outcome
            .iter()
            .map(|(o, wt)| (*o, wt.accuracy_pct()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_module.is_empty() && self.by_outcome.is_empty()
    }

    pub fn reset(&mut self) {
        self.by_module.clear();
        self.by_outcome.clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleAccuracy {
    pub module: ModuleId,
    pub wins: u64,
    pub total: u64,
    pub accuracy_pct: f64,
}

// ============================================================
// Backtest — replays each module over growing prefixes of the
// primary-only view. Read-only; nothing is persisted.
// ============================================================

/// Scores every detector on each prefix it can read, comparing its candidate
/// with the outcome that followed. With `lookback`, only the last `lookback`
/// prefixes are replayed.
pub fn backtest(
    detectors: &[Box<dyn Detector>],
    view: &[Outcome],
    lookback: Option<usize>,
) -> Vec<ModuleAccuracy> {
    let window_start = lookback.map_or(0, |n| view.len().saturating_sub(n));
    detectors
        .iter()
        .map(|det| {
            let mut wt = WinTotal::default();
            let start = det.min_window().max(window_start);
            for prefix_len in start..view.len() {
                let Some(c) = det.predict(&view[..prefix_len]) else {
                    continue;
                };
                wt.record(c.outcome == view[prefix_len]);
            }
            ModuleAccuracy {
                module: det.id(),
                wins: wt.wins,
                total: wt.total,
                accuracy_pct: wt.accuracy_pct(),
            }
        })
        .collect()
}

pub fn accuracy_map(report: &[ModuleAccuracy]) -> BTreeMap<ModuleId, f64> {
    report.iter().map(|m| (m.module, m.accuracy_pct)).collect()
}

/// Most accurate module that made at least one call; earlier modules win ties.
pub fn best_module(report: &[ModuleAccuracy]) -> Option<ModuleId> {
    let mut best: Option<&ModuleAccuracy> = None;
    for m in report.iter().filter(|m| m.total > 0) {
        if best.map_or(true, |b| m.accuracy_pct > b.accuracy_pct) {
            best = Some(m);
        }
    }
    best.map(|m| m.module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::parse_sequence;
    use pattern_detectors::{default_detectors, DetectorConfig};

    fn alternating(len: usize) -> Vec<Outcome> {
        (0..len)
            .map(|i| if i % 2 == 0 { Outcome::Player } else { Outcome::Banker })
            .collect()
    }

    fn find(report: &[ModuleAccuracy], id: ModuleId) -> &ModuleAccuracy {
        report.iter().find(|m| m.module == id).unwrap()
    }

    #[test]
    fn win_total_accuracy() {
        let mut wt = WinTotal::default();
        assert_eq!(wt.accuracy_pct(), 0.0);
        wt.record(true);
        wt.record(false);
        wt.record(true);
        wt.record(true);
        assert!((wt.accuracy_pct() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn counters_score_forecast_and_each_voter() {
        let mut counters = LearningCounters::default();
        let candidates = [
            Candidate::new(Outcome::Player, 0.6, ModuleId::StreakRule),
            Candidate::new(Outcome::Banker, 0.6, ModuleId::TwoBlock),
        ];
        counters.record_forecast(Outcome::Player, Outcome::Banker, &candidates);
        assert_eq!(counters.outcome(Outcome::Player), WinTotal { wins: 0, total: 1 });
        assert_eq!(counters.module(ModuleId::StreakRule), WinTotal { wins: 0, total: 1 });
        assert_eq!(counters.module(ModuleId::TwoBlock), WinTotal { wins: 1, total: 1 });
        assert_eq!(counters.module(ModuleId::Momentum), WinTotal::default());
        counters.reset();
        assert!(counters.is_empty());
    }

    #[test]
    fn alternating_history_favours_momentum_not_majority() {
        let detectors = default_detectors(&DetectorConfig::default());
        let report = backtest(&detectors, &alternating(24), None);
        let momentum = find(&report, ModuleId::Momentum);
        assert!(momentum.total > 0);
        assert!(momentum.accuracy_pct > 99.0);
        let majority = find(&report, ModuleId::MajorityTrend);
        assert!(majority.accuracy_pct < 1.0);
        assert_eq!(best_module(&report), Some(ModuleId::SuffixPattern));
    }

    #[test]
    fn lookback_limits_replayed_prefixes() {
        let detectors = default_detectors(&DetectorConfig::default());
        let view = parse_sequence("PPPPPPPPPPBBBBBBBBBB").unwrap();
        let recent = backtest(&detectors, &view, Some(4));
        let streak = find(&recent, ModuleId::StreakRule);
        assert_eq!(streak.total, 4);
        assert_eq!(streak.wins, 4);
    }

    #[test]
    fn empty_view_scores_nothing() {
        let detectors = default_detectors(&DetectorConfig::default());
        let report = backtest(&detectors, &[], None);
        assert_eq!(report.len(), ModuleId::ALL.len());
        assert!(report.iter().all(|m| m.total == 0 && m.accuracy_pct == 0.0));
        assert_eq!(best_module(&report), None);
        assert_eq!(accuracy_map(&report).len(), ModuleId::ALL.len());
    }
}
