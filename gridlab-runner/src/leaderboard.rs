//! Leaderboard ranking — stable descending sort by the chosen objective.
//!
//! Ties keep grid order: the sort is stable and runs are fed in submission
//! order. Scores are compared with `total_cmp`.

use serde::{Deserialize, Serialize};

use gridlab_core::{Params, RunResult};

use crate::walk_forward::Overfitting;

/// Default number of leaderboard rows.
pub const DEFAULT_TOP_K: usize = 5;

/// Which metric to maximize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Objective {
    #[default]
    Sharpe,
    Pnl,
    WinRate,
}

impl Objective {
    /// Extract the objective's value from a finished run.
    pub fn extract(&self, run: &RunSummary) -> f64 {
        match self {
            Self::Sharpe => run.sharpe,
            Self::Pnl => run.pnl,
            Self::WinRate => run.win_rate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::Pnl => "pnl",
            Self::WinRate => "winRate",
        }
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar outcome of one run. Equity history and fills are not kept, so a
/// full grid of summaries stays small.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub final_equity: f64,
    pub pnl: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub trades: usize,
    pub skipped_orders: usize,
}

impl From<&RunResult> for RunSummary {
    fn from(r: &RunResult) -> Self {
        Self {
            final_equity: r.final_equity,
            pnl: r.pnl,
            sharpe: r.sharpe,
            win_rate: r.win_rate,
            max_drawdown: r.max_drawdown,
            trades: r.trade_count,
            skipped_orders: r.skipped_order_count,
        }
    }
}

/// One finished grid combination.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRun {
    pub params: Params,
    pub summary: RunSummary,
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position in the grid-search ranking.
    pub rank: usize,
    pub params: Params,
    pub score: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub pnl: f64,
    pub trades: usize,
    pub max_drawdown: f64,
    /// Walk-forward verdict, when the request asked for one and it succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wfo: Option<Overfitting>,
}

/// Ranked output: the winner plus the top-K rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub best_params: Params,
    pub best_score: f64,
    pub entries: Vec<LeaderboardEntry>,
}

/// Rank `runs` by `objective`, best first. Returns `None` for no runs.
pub fn rank(runs: &[ScoredRun], objective: Objective, top_k: usize) -> Option<Ranking> {
    let mut order: Vec<(usize, f64)> = runs
        .iter()
        .enumerate()
        .map(|(i, run)| (i, objective.extract(&run.summary)))
        .collect();
    // Sort descending by score; stable, so equal scores keep grid order.
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let &(best_index, best_score) = order.first()?;
    let entries = order
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(pos, &(i, score))| {
            let run = &runs[i];
            LeaderboardEntry {
                rank: pos + 1,
                params: run.params.clone(),
                score,
                sharpe: run.summary.sharpe,
                win_rate: run.summary.win_rate,
                pnl: run.summary.pnl,
                trades: run.summary.trades,
                max_drawdown: run.summary.max_drawdown,
                wfo: None,
            }
        })
        .collect();

    Some(Ranking {
        best_params: runs[best_index].params.clone(),
        best_score,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(id: i64, sharpe: f64, pnl: f64) -> ScoredRun {
        let mut params = Params::new();
        params.insert("id".into(), json!(id));
        ScoredRun {
            params,
            summary: RunSummary {
                final_equity: 10_000.0 + pnl,
                pnl,
                sharpe,
                win_rate: 0.5,
                max_drawdown: 0.1,
                trades: 2,
                skipped_orders: 0,
            },
        }
    }

    #[test]
    fn best_sharpe_ranks_first() {
        let runs = vec![run(0, 1.2, 10.0), run(1, 0.5, 30.0), run(2, 2.0, 20.0)];
        let ranking = rank(&runs, Objective::Sharpe, DEFAULT_TOP_K).unwrap();

        assert_eq!(ranking.best_score, 2.0);
        assert_eq!(ranking.best_params.get("id"), Some(&json!(2)));
        assert_eq!(ranking.entries[0].rank, 1);
        assert_eq!(ranking.entries[0].params.get("id"), Some(&json!(2)));
        let ids: Vec<_> = ranking.entries.iter().map(|e| e.params["id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(0), json!(1)]);
    }

    #[test]
    fn objective_switches_the_ordering() {
        let runs = vec![run(0, 1.2, 10.0), run(1, 0.5, 30.0), run(2, 2.0, 20.0)];
        let ranking = rank(&runs, Objective::Pnl, DEFAULT_TOP_K).unwrap();
        assert_eq!(ranking.best_score, 30.0);
        assert_eq!(ranking.best_params.get("id"), Some(&json!(1)));
    }

    #[test]
    fn ties_keep_submission_order() {
        let runs = vec![run(0, 1.0, 0.0), run(1, 3.0, 0.0), run(2, 1.0, 0.0), run(3, 1.0, 0.0)];
        let ranking = rank(&runs, Objective::Sharpe, DEFAULT_TOP_K).unwrap();
        let ids: Vec<_> = ranking.entries.iter().map(|e| e.params["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(0), json!(2), json!(3)]);
    }

    #[test]
    fn top_k_truncates_the_board() {
        let runs: Vec<_> = (0..12).map(|i| run(i, i as f64, 0.0)).collect();
        let ranking = rank(&runs, Objective::Sharpe, 5).unwrap();
        assert_eq!(ranking.entries.len(), 5);
        assert_eq!(ranking.entries.last().unwrap().rank, 5);
        assert_eq!(ranking.entries.last().unwrap().score, 7.0);
    }

    #[test]
    fn empty_input_has_no_ranking() {
        assert!(rank(&[], Objective::Sharpe, 5).is_none());
    }

    #[test]
    fn objective_wire_names() {
        assert_eq!(serde_json::to_string(&Objective::WinRate).unwrap(), "\"winRate\"");
        let o: Objective = serde_json::from_str("\"pnl\"").unwrap();
        assert_eq!(o, Objective::Pnl);
    }
}
