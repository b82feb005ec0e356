use std::collections::HashMap;

use core_types::{Candidate, Detector, ModuleId, Outcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Streak rule fires once the trailing run reaches this length.
    pub streak_min_len: usize,
    /// Majority trend lookback (primary outcomes).
    pub majority_window: usize,
    /// Votes needed inside the window, i.e. strictly more than 6 of 10.
    pub majority_min_count: usize,
    pub two_block_confidence: f64,
    /// Length of the trailing "DNA" pattern searched for in history.
    pub dna_pattern_len: usize,
    pub momentum_min_streak: usize,
    /// Momentum confidence at exactly `momentum_min_streak`; +0.1 per extra hand.
    pub momentum_base_confidence: f64,
    pub alternation_confidence: f64,
    pub counter_min_streak: usize,
    /// Break share among earlier same-length streaks that triggers a counter vote.
    pub counter_break_rate: f64,
    /// Earlier streaks needed before the break rate is trusted.
    pub counter_min_observations: usize,
    pub counter_confidence: f64,
    pub two_cut_confidence: f64,
    pub ping_pong_confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            streak_min_len: 3,
            majority_window: 10,
            majority_min_count: 7,
            two_block_confidence: 0.60,
            dna_pattern_len: 5,
            momentum_min_streak: 3,
            momentum_base_confidence: 0.60,
            alternation_confidence: 0.65,
            counter_min_streak: 3,
            counter_break_rate: 0.50,
            counter_min_observations: 1,
            counter_confidence: 0.75,
            two_cut_confidence: 0.60,
            ping_pong_confidence: 0.55,
        }
    }
}

/// All modules in registration order. The aggregator breaks ties by this order.
pub fn default_detectors(cfg: &DetectorConfig) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(StreakRule::new(cfg)),
        Box::new(SuffixPatternTable),
        Box::new(MajorityTrend::new(cfg)),
        Box::new(TwoBlock::new(cfg)),
        Box::new(DnaFollower::new(cfg)),
        Box::new(Momentum::new(cfg)),
        Box::new(CounterBias::new(cfg)),
    ]
}

// ============================================================
// Shared view helpers
// ============================================================

/// Symbol and length of the trailing run of identical outcomes.
pub fn trailing_streak(view: &[Outcome]) -> Option<(Outcome, usize)> {
    let last = *view.last()?;
    let len = view.iter().rev().take_while(|o| **o == last).count();
    Some((last, len))
}

/// Maximal runs of identical outcomes, oldest first.
pub fn runs(view: &[Outcome]) -> Vec<(Outcome, usize)> {
    let mut out: Vec<(Outcome, usize)> = Vec::new();
    for &o in view {
        match out.last_mut() {
            Some((sym, len)) if *sym == o => *len += 1,
            _ => out.push((o, 1)),
        }
    }
    out
}

/// True when every neighbouring pair differs.
pub fn is_alternating(slice: &[Outcome]) -> bool {
    slice.len() >= 2 && slice.windows(2).all(|w| w[0] != w[1])
}

fn ends_with_symbols(view: &[Outcome], pattern: &str) -> bool {
    let n = pattern.len();
    if view.len() < n {
        return false;
    }
    view[view.len() - n..]
        .iter()
        .zip(pattern.chars())
        .all(|(o, c)| o.symbol() == c)
}

// ============================================================
// Streak rule: three of a kind keeps going.
// ============================================================
#[derive(Debug, Clone)]
pub struct StreakRule {
    min_len: usize,
}

impl StreakRule {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            min_len: cfg.streak_min_len.max(2),
        }
    }
}

impl Detector for StreakRule {
    fn id(&self) -> ModuleId {
        ModuleId::StreakRule
    }

    fn min_window(&self) -> usize {
        self.min_len
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        let (sym, len) = trailing_streak(view)?;
        if len < self.min_len {
            return None;
        }
        let confidence = (0.5 + 0.1 * (len - self.min_len) as f64).min(1.0);
        Some(Candidate::new(sym, confidence, self.id()))
    }
}

// ============================================================
// Suffix pattern table. Longest patterns first; the first entry
// that is a suffix of the view wins.
// ============================================================
#[derive(Debug, Clone, Copy)]
pub struct SuffixRule {
    pub pattern: &'static str,
    pub predicts: Outcome,
    pub label: &'static str,
    pub confidence: f64,
}

pub const SUFFIX_TABLE: [SuffixRule; 12] = [
    SuffixRule { pattern: "PPPBBB", predicts: Outcome::Banker, label: "three_cut", confidence: 0.80 },
    SuffixRule { pattern: "BBBPBB", predicts: Outcome::Player, label: "three_cut", confidence: 0.80 },
    SuffixRule { pattern: "PPBPP", predicts: Outcome::Player, label: "long_ping_pong", confidence: 0.70 },
    SuffixRule { pattern: "BBPBB", predicts: Outcome::Banker, label: "long_ping_pong", confidence: 0.70 },
    SuffixRule { pattern: "PBPB", predicts: Outcome::Player, label: "ping_pong", confidence: 0.90 },
    SuffixRule { pattern: "BPBP", predicts: Outcome::Banker, label: "ping_pong", confidence: 0.90 },
    SuffixRule { pattern: "PPBB", predicts: Outcome::Player, label: "two_two", confidence: 0.80 },
    SuffixRule { pattern: "BBPP", predicts: Outcome::Banker, label: "two_two", confidence: 0.80 },
    SuffixRule { pattern: "PPPP", predicts: Outcome::Player, label: "dragon", confidence: 1.00 },
    SuffixRule { pattern: "BBBB", predicts: Outcome::Banker, label: "dragon", confidence: 1.00 },
    SuffixRule { pattern: "PBBP", predicts: Outcome::Banker, label: "paired_alternate", confidence: 0.60 },
    SuffixRule { pattern: "BPPB", predicts: Outcome::Player, label: "paired_alternate", confidence: 0.60 },
];

/// Longest pattern in the table; only this many trailing hands are inspected.
pub const SUFFIX_WINDOW: usize = 6;

/// First table entry matching the tail of `view`, if any.
pub fn match_suffix(view: &[Outcome]) -> Option<&'static SuffixRule> {
    let tail = &view[view.len().saturating_sub(SUFFIX_WINDOW)..];
    SUFFIX_TABLE
        .iter()
        .find(|rule| ends_with_symbols(tail, rule.pattern))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixPatternTable;

impl Detector for SuffixPatternTable {
    fn id(&self) -> ModuleId {
        ModuleId::SuffixPattern
    }

    fn min_window(&self) -> usize {
        4
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        if view.len() < self.min_window() {
            return None;
        }
        let rule = match_suffix(view)?;
        Some(Candidate::new(rule.predicts, rule.confidence, self.id()).with_pattern(rule.label))
    }
}

// ============================================================
// Majority trend over the recent window.
// ============================================================
#[derive(Debug, Clone)]
pub struct MajorityTrend {
    window: usize,
    min_count: usize,
}

impl MajorityTrend {
    pub fn new(cfg: &DetectorConfig) -> Self {
        let window = cfg.majority_window.max(1);
        Self {
            window,
            min_count: cfg.majority_min_count.clamp(1, window),
        }
    }
}

impl Detector for MajorityTrend {
    fn id(&self) -> ModuleId {
        ModuleId::MajorityTrend
    }

    fn min_window(&self) -> usize {
        self.window
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        if view.len() < self.window {
            return None;
        }
        let recent = &view[view.len() - self.window..];
        let players = recent.iter().filter(|o| **o == Outcome::Player).count();
        let bankers = recent.len() - players;
        let (sym, count) = if players >= bankers {
            (Outcome::Player, players)
        } else {
            (Outcome::Banker, bankers)
        };
        if count < self.min_count {
            return None;
        }
        Some(Candidate::new(
            sym,
            count as f64 / self.window as f64,
            self.id(),
        ))
    }
}

// ============================================================
// Two-block XXYY: bet the first pair comes back.
// ============================================================
#[derive(Debug, Clone)]
pub struct TwoBlock {
    confidence: f64,
}

impl TwoBlock {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            confidence: cfg.two_block_confidence,
        }
    }
}

impl Detector for TwoBlock {
    fn id(&self) -> ModuleId {
        ModuleId::TwoBlock
    }

    fn min_window(&self) -> usize {
        4
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        if view.len() < 4 {
            return None;
        }
        let last4 = &view[view.len() - 4..];
        if last4[0] == last4[1] && last4[2] == last4[3] && last4[0] != last4[2] {
            return Some(Candidate::new(last4[0], self.confidence, self.id()));
        }
        None
    }
}

// ============================================================
// DNA follower frequency: what followed this exact tail before?
// ============================================================
#[derive(Debug, Clone)]
pub struct DnaFollower {
    pattern_len: usize,
}

impl DnaFollower {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            pattern_len: cfg.dna_pattern_len.max(1),
        }
    }
}

impl Detector for DnaFollower {
    fn id(&self) -> ModuleId {
        ModuleId::DnaFollower
    }

    fn min_window(&self) -> usize {
        self.pattern_len + 1
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        let n = self.pattern_len;
        if view.len() < self.min_window() {
            return None;
        }
        let target = &view[view.len() - n..];
        let mut followers: HashMap<Outcome, usize> = HashMap::new();
        // Every start whose follower is still inside the view.
        for start in 0..view.len() - n {
            if &view[start..start + n] == target {
                *followers.entry(view[start + n]).or_insert(0) += 1;
            }
        }
        let total: usize = followers.values().sum();
        if total == 0 {
            return None;
        }
        let players = followers.get(&Outcome::Player).copied().unwrap_or(0);
        let bankers = followers.get(&Outcome::Banker).copied().unwrap_or(0);
        // An even split carries no information.
        let (sym, count) = match players.cmp(&bankers) {
            std::cmp::Ordering::Greater => (Outcome::Player, players),
            std::cmp::Ordering::Less => (Outcome::Banker, bankers),
            std::cmp::Ordering::Equal => return None,
        };
        Some(Candidate::new(sym, count as f64 / total as f64, self.id()))
    }
}

// ============================================================
// Momentum / alternation.
// ============================================================
#[derive(Debug, Clone)]
pub struct Momentum {
    min_streak: usize,
    base_confidence: f64,
    alternation_confidence: f64,
}

impl Momentum {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            min_streak: cfg.momentum_min_streak.max(2),
            base_confidence: cfg.momentum_base_confidence,
            alternation_confidence: cfg.alternation_confidence,
        }
    }
}

impl Detector for Momentum {
    fn id(&self) -> ModuleId {
        ModuleId::Momentum
    }

    fn min_window(&self) -> usize {
        self.min_streak
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        if view.len() < self.min_window() {
            return None;
        }
        let (sym, len) = trailing_streak(view)?;
        if len >= self.min_streak {
            let confidence =
                (self.base_confidence + 0.1 * (len - self.min_streak) as f64).min(1.0);
            return Some(Candidate::new(sym, confidence, self.id()));
        }
        if view.len() >= 4 && is_alternating(&view[view.len() - 4..]) {
            return Some(
                Candidate::new(sym.opposite(), self.alternation_confidence, self.id())
                    .with_pattern("ping_pong"),
            );
        }
        None
    }
}

// ============================================================
// Intuition / counter-bias: bet against a streak that has
// historically broken at this length.
// ============================================================
#[derive(Debug, Clone)]
pub struct CounterBias {
    min_streak: usize,
    break_rate: f64,
    min_observations: usize,
    confidence: f64,
    two_cut_confidence: f64,
    ping_pong_confidence: f64,
}

/// How earlier streaks of the current symbol and length resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakHistory {
    pub continued: usize,
    pub broke: usize,
}

impl StreakHistory {
    pub fn observed(&self) -> usize {
        self.continued + self.broke
    }

    pub fn break_rate(&self) -> f64 {
        if self.observed() == 0 {
            0.0
        } else {
            self.broke as f64 / self.observed() as f64
        }
    }
}

/// Scans every run before the trailing one: a run of `sym` that reached
/// `len` either continued past it or broke exactly there.
pub fn streak_history(view: &[Outcome], sym: Outcome, len: usize) -> StreakHistory {
    let all = runs(view);
    let mut out = StreakHistory::default();
    let earlier = &all[..all.len().saturating_sub(1)];
    for &(s, run_len) in earlier {
        if s != sym || run_len < len {
            continue;
        }
        if run_len == len {
            out.broke += 1;
        } else {
            out.continued += 1;
        }
    }
    out
}

impl CounterBias {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            min_streak: cfg.counter_min_streak.max(2),
            break_rate: cfg.counter_break_rate.clamp(0.0, 1.0),
            min_observations: cfg.counter_min_observations.max(1),
            confidence: cfg.counter_confidence,
            two_cut_confidence: cfg.two_cut_confidence,
            ping_pong_confidence: cfg.ping_pong_confidence,
        }
    }

    fn fallback(&self, view: &[Outcome]) -> Option<Candidate> {
        let n = view.len();
        if n >= 4 {
            let last4 = &view[n - 4..];
            if last4[0] == last4[1] && last4[2] == last4[3] && last4[1] != last4[2] {
                return Some(
                    Candidate::new(last4[3], self.two_cut_confidence, self.id())
                        .with_pattern("two_cut"),
                );
            }
        }
        if n >= 3 && is_alternating(&view[n - 3..]) {
            return Some(
                Candidate::new(view[n - 1].opposite(), self.ping_pong_confidence, self.id())
                    .with_pattern("ping_pong"),
            );
        }
        None
    }
}

impl Detector for CounterBias {
    fn id(&self) -> ModuleId {
        ModuleId::CounterBias
    }

    fn min_window(&self) -> usize {
        3
    }

    fn predict(&self, view: &[Outcome]) -> Option<Candidate> {
        if view.len() < self.min_window() {
            return None;
        }
        let (sym, len) = trailing_streak(view)?;
        if len >= self.min_streak {
            let history = streak_history(view, sym, len);
            if history.observed() >= self.min_observations
                && history.break_rate() >= self.break_rate
            {
                return Some(
                    Candidate::new(sym.opposite(), self.confidence, self.id())
                        .counter()
                        .with_pattern("streak_break"),
                );
            }
        }
        self.fallback(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::parse_sequence;

    fn v(seq: &str) -> Vec<Outcome> {
        parse_sequence(seq).unwrap()
    }

    fn cfg() -> DetectorConfig {
        DetectorConfig::default()
    }

    #[test]
    fn registry_follows_module_order() {
        let ids: Vec<ModuleId> = default_detectors(&cfg()).iter().map(|d| d.id()).collect();
        assert_eq!(ids, ModuleId::ALL.to_vec());
    }

    #[test]
    fn short_views_never_vote() {
        for det in default_detectors(&cfg()) {
            let short = vec![Outcome::Player; det.min_window().saturating_sub(1)];
            assert_eq!(det.predict(&short), None, "{}", det.id());
        }
    }

    #[test]
    fn trailing_streak_and_runs() {
        assert_eq!(trailing_streak(&v("PBBB")), Some((Outcome::Banker, 3)));
        assert_eq!(trailing_streak(&[]), None);
        assert_eq!(
            runs(&v("PPBP")),
            vec![(Outcome::Player, 2), (Outcome::Banker, 1), (Outcome::Player, 1)]
        );
    }

    #[test]
    fn streak_rule_confidence_grows_with_length() {
        let rule = StreakRule::new(&cfg());
        let c3 = rule.predict(&v("BPPP")).unwrap();
        assert_eq!(c3.outcome, Outcome::Player);
        assert!((c3.confidence - 0.5).abs() < 1e-9);
        let c5 = rule.predict(&v("PPPPP")).unwrap();
        assert!((c5.confidence - 0.7).abs() < 1e-9);
        let c20 = rule.predict(&vec![Outcome::Banker; 20]).unwrap();
        assert!((c20.confidence - 1.0).abs() < 1e-9);
        assert_eq!(rule.predict(&v("PPBB")), None);
    }

    #[test]
    fn suffix_table_prefers_longest_entry() {
        let det = SuffixPatternTable;
        // PPPBBB also ends with BBB but no 4-long dragon; three-cut wins.
        let c = det.predict(&v("PPPBBB")).unwrap();
        assert_eq!(c.outcome, Outcome::Banker);
        assert_eq!(c.pattern, Some("three_cut"));
        let c = det.predict(&v("BBPBPB")).unwrap();
        assert_eq!(c.outcome, Outcome::Player);
        assert_eq!(c.pattern, Some("ping_pong"));
        let c = det.predict(&v("PBBPP")).unwrap();
        assert_eq!(c.pattern, Some("two_two"));
        assert_eq!(c.outcome, Outcome::Banker);
        assert_eq!(det.predict(&v("PPBPB")).map(|c| c.pattern), Some(Some("ping_pong")));
        assert_eq!(det.predict(&v("PPPB")), None);
    }

    #[test]
    fn majority_needs_more_than_six_of_ten() {
        let det = MajorityTrend::new(&cfg());
        let c = det.predict(&v("BBPPPPBPPP")).unwrap();
        assert_eq!(c.outcome, Outcome::Player);
        assert!((c.confidence - 0.7).abs() < 1e-9);
        assert_eq!(det.predict(&v("BBBPPPBPPP")), None);
        assert_eq!(det.predict(&v("PBPBPBPBPB")), None);
    }

    #[test]
    fn two_block_predicts_first_pair() {
        let det = TwoBlock::new(&cfg());
        assert_eq!(det.predict(&v("PPBB")).unwrap().outcome, Outcome::Player);
        assert_eq!(det.predict(&v("BBBPP")).unwrap().outcome, Outcome::Banker);
        assert_eq!(det.predict(&v("PPPP")), None);
        assert_eq!(det.predict(&v("PBBP")), None);
    }

    #[test]
    fn dna_follower_tallies_earlier_occurrences() {
        let det = DnaFollower::new(&cfg());
        // PBPPB seen twice before: followed by P then P.
        let c = det.predict(&v("PBPPBPBPPBPBBPBPPB")).unwrap();
        assert_eq!(c.outcome, Outcome::Player);
        assert!(c.confidence > 0.5);
        assert_eq!(det.predict(&v("PPPPPBBBBP")), None);
    }

    #[test]
    fn dna_follower_even_split_is_silent() {
        let det = DnaFollower::new(&DetectorConfig {
            dna_pattern_len: 3,
            ..DetectorConfig::default()
        });
        // PBB followed once by P and once by B.
        assert_eq!(det.predict(&v("PBBPPBBBPBB")), None);
    }

    #[test]
    fn momentum_streak_and_alternation() {
        let det = Momentum::new(&cfg());
        let c = det.predict(&v("PBBBB")).unwrap();
        assert_eq!(c.outcome, Outcome::Banker);
        assert!((c.confidence - 0.7).abs() < 1e-9);
        let c = det.predict(&v("PPBPB")).unwrap();
        assert_eq!(c.outcome, Outcome::Player);
        assert!((c.confidence - 0.65).abs() < 1e-9);
        assert_eq!(det.predict(&v("PPBB")), None);
    }

    #[test]
    fn counter_bias_bets_against_streaks_that_broke_before() {
        let det = CounterBias::new(&cfg());
        // Two earlier P-runs of exactly 3 both broke.
        let c = det.predict(&v("PPPBPPPBBPPP")).unwrap();
        assert_eq!(c.outcome, Outcome::Banker);
        assert!(c.is_counter);
        assert!(c.confidence >= 0.65);
    }

    #[test]
    fn counter_bias_stands_down_when_streaks_continued() {
        let det = CounterBias::new(&cfg());
        // The only earlier 3-run of P went on to 5.
        assert_eq!(det.predict(&v("PPPPPBBPPP")), None);
        let h = streak_history(&v("PPPPPBBPPP"), Outcome::Player, 3);
        assert_eq!(h, StreakHistory { continued: 1, broke: 0 });
    }

    #[test]
    fn counter_bias_falls_back_to_cuts_and_ping_pong() {
        let det = CounterBias::new(&cfg());
        let c = det.predict(&v("BBPP")).unwrap();
        assert_eq!(c.outcome, Outcome::Player);
        assert!(!c.is_counter);
        assert_eq!(c.pattern, Some("two_cut"));
        let c = det.predict(&v("PBP")).unwrap();
        assert_eq!(c.outcome, Outcome::Banker);
        assert_eq!(c.pattern, Some("ping_pong"));
    }
}
