use core_types::Outcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BigRoadConfig {
    /// Cells per column before the road tails into a new column.
    pub max_column_height: usize,
    /// Primary outcomes needed before an otherwise quiet road reads as a trend.
    pub following_trend_min_history: usize,
    /// A column at least this tall reads as a streak.
    pub streaky_min_height: usize,
}

impl Default for BigRoadConfig {
    fn default() -> Self {
        Self {
            max_column_height: 6,
            following_trend_min_history: 20,
            streaky_min_height: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoadCell {
    pub outcome: Outcome,
    /// Ties recorded right after this hand.
    pub ties: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoadColumn {
    pub outcome: Outcome,
    pub cells: Vec<RoadCell>,
}

impl RoadColumn {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ties(&self) -> usize {
        self.cells.iter().map(|c| c.ties).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoadTrend {
    Alternating,
    Choppy,
    Streaky(Outcome),
    FollowingTrend,
}

#[derive(Debug, Clone, Default)]
pub struct BigRoadBuilder {
    cfg: BigRoadConfig,
}

impl BigRoadBuilder {
    pub fn new(cfg: BigRoadConfig) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &BigRoadConfig {
        &self.cfg
    }

    pub fn set_cfg(&mut self, cfg: BigRoadConfig) {
        self.cfg = cfg;
    }

    /// Groups the full outcome stream into columns. A new column starts when the
    /// outcome changes, the column is full, or a tie closed the previous cell.
    /// Ties never get a cell of their own; a tie with no hand before it is dropped.
    pub fn build(&self, outcomes: impl IntoIterator<Item = Outcome>) -> Vec<RoadColumn> {
        let height = self.cfg.max_column_height.max(1);
        let mut columns: Vec<RoadColumn> = Vec::new();
        let mut closed = false;
        for outcome in outcomes {
            if !outcome.is_primary() {
                if let Some(cell) = columns.last_mut().and_then(|c| c.cells.last_mut()) {
                    cell.ties += 1;
                    closed = true;
                }
                continue;
            }
            let cell = RoadCell { outcome, ties: 0 };
            match columns.last_mut() {
                Some(col) if !closed && col.outcome == outcome && col.len() < height => {
                    col.cells.push(cell);
                }
                _ => columns.push(RoadColumn {
                    outcome,
                    cells: vec![cell],
                }),
            }
            closed = false;
        }
        columns
    }

    /// Reads the shape of the last three columns.
    pub fn classify(&self, columns: &[RoadColumn], primary_len: usize) -> Option<RoadTrend> {
        let current = columns.last()?;
        let n = columns.len();
        if n >= 3 {
            let (a, b, c) = (
                columns[n - 3].outcome,
                columns[n - 2].outcome,
                current.outcome,
            );
            if a != b && b != c {
                return Some(RoadTrend::Alternating);
            }
        }
        if n >= 2 && columns[n - 2].outcome != current.outcome {
            return Some(RoadTrend::Choppy);
        }
        if current.len() >= self.cfg.streaky_min_height {
            return Some(RoadTrend::Streaky(current.outcome));
        }
        if primary_len >= self.cfg.following_trend_min_history {
            return Some(RoadTrend::FollowingTrend);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{format_sequence, parse_sequence};

    fn road(seq: &str) -> Vec<RoadColumn> {
        BigRoadBuilder::default().build(parse_sequence(seq).unwrap())
    }

    fn shape(columns: &[RoadColumn]) -> Vec<String> {
        columns
            .iter()
            .map(|c| format_sequence(&c.cells.iter().map(|x| x.outcome).collect::<Vec<_>>()))
            .collect()
    }

    #[test]
    fn reference_shoe_groups_into_thirteen_columns() {
        let cols = road("PPPPBBBBTBBPPBPPBBPBTBPBP");
        assert_eq!(
            shape(&cols),
            vec![
                "PPPP", "BBBB", "BB", "PP", "B", "PP", "BB", "P", "B", "B", "P", "B", "P"
            ]
        );
        assert_eq!(cols[1].cells[3].ties, 1);
        assert_eq!(cols[8].cells[0].ties, 1);
        let ties: usize = cols.iter().map(RoadColumn::ties).sum();
        let cells: usize = cols.iter().map(RoadColumn::len).sum();
        assert_eq!(ties, 2);
        assert_eq!(cells, 23);
    }

    #[test]
    fn long_run_tails_into_new_column() {
        let cols = road("PPPPPPPPP");
        assert_eq!(shape(&cols), vec!["PPPPPP", "PPP"]);
        assert!(cols.iter().all(|c| c.len() <= 6));
    }

    #[test]
    fn orphan_tie_and_empty_stream() {
        assert!(road("").is_empty());
        assert!(road("TT").is_empty());
        let cols = road("TPTT");
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].cells[0].ties, 2);
    }

    #[test]
    fn trend_classification() {
        let b = BigRoadBuilder::default();
        let cols = road("PBP");
        assert_eq!(b.classify(&cols, 3), Some(RoadTrend::Alternating));
        let cols = road("PTPB");
        assert_eq!(b.classify(&cols, 3), Some(RoadTrend::Choppy));
        let cols = road("BBBB");
        assert_eq!(b.classify(&cols, 4), Some(RoadTrend::Streaky(Outcome::Banker)));
        let cols = road("PTPTP");
        assert_eq!(b.classify(&cols, 3), None);
        assert_eq!(b.classify(&cols, 20), Some(RoadTrend::FollowingTrend));
        assert_eq!(b.classify(&[], 0), None);
    }
}
