use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Consecutive wrong forecasts that close the gate.
    pub max_miss_streak: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { max_miss_streak: 6 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateEvent {
    Hit,
    Miss,
    /// This miss closed the gate.
    Tripped,
    /// This hit reopened a closed gate.
    Released,
}

/// Suspends forecasting after too many consecutive misses. The streak
/// saturates at the cap and only a correct forecast clears it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissStreakGate {
    cap: u32,
    streak: u32,
}

impl Default for MissStreakGate {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}

impl MissStreakGate {
    pub fn new(cfg: &GateConfig) -> Self {
        Self {
            cap: cfg.max_miss_streak.max(1),
            streak: 0,
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn is_closed(&self) -> bool {
        self.streak >= self.cap
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    /// Scores one real forecast against the actual outcome.
    pub fn record(&mut self, correct: bool) -> GateEvent {
        let was_closed = self.is_closed();
        if correct {
            self.streak = 0;
            return if was_closed {
                GateEvent::Released
            } else {
                GateEvent::Hit
            };
        }
        self.streak = self.streak.saturating_add(1).min(self.cap);
        if !was_closed && self.is_closed() {
            GateEvent::Tripped
        } else {
            GateEvent::Miss
        }
    }

    pub fn reset(&mut self) {
        self.streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_at_cap_and_saturates() {
        let mut gate = MissStreakGate::new(&GateConfig { max_miss_streak: 3 });
        assert_eq!(gate.record(false), GateEvent::Miss);
        assert_eq!(gate.record(false), GateEvent::Miss);
        assert!(gate.is_open());
        assert_eq!(gate.record(false), GateEvent::Tripped);
        assert!(gate.is_closed());
        assert_eq!(gate.record(false), GateEvent::Miss);
        assert_eq!(gate.streak(), 3);
    }

    #[test]
    fn hit_clears_streak() {
        let mut gate = MissStreakGate::default();
        gate.record(false);
        gate.record(false);
        assert_eq!(gate.record(true), GateEvent::Hit);
        assert_eq!(gate.streak(), 0);
    }

    #[test]
    fn hit_while_closed_releases() {
        let mut gate = MissStreakGate::new(&GateConfig { max_miss_streak: 1 });
        assert_eq!(gate.record(false), GateEvent::Tripped);
        assert_eq!(gate.record(true), GateEvent::Released);
        assert!(gate.is_open());
    }

    #[test]
    fn zero_cap_is_raised_to_one() {
        let gate = MissStreakGate::new(&GateConfig { max_miss_streak: 0 });
        assert_eq!(gate.cap(), 1);
        assert!(gate.is_open());
    }
}
