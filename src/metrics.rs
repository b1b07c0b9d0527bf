//! Aggregates the council's per-judge rankings into the quality metrics
//! attached to indexed documents.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::QualityMetrics;

/// One judge's vote: model identifiers ordered best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRanking {
    pub judge: String,
    pub ranking: Vec<String>,
}

/// Per-model quality across all judges.
///
/// `avg_rank` is the mean 1-based position a model received;
/// `consensus_score` is the fraction of judges that placed it first. Models
/// no judge ranked are absent from the result; the indexer then falls back
/// to the documented sentinels.
pub fn aggregate_quality(rankings: &[JudgeRanking]) -> HashMap<String, QualityMetrics> {
    struct Tally {
        total_rank: u64,
        count: u64,
        wins: u64,
    }

    let mut tallies: HashMap<String, Tally> = HashMap::new();

    for judge in rankings {
        for (position, model) in judge.ranking.iter().enumerate() {
            let rank = (position + 1) as u64;
            let tally = tallies.entry(model.clone()).or_insert(Tally {
                total_rank: 0,
                count: 0,
                wins: 0,
            });
            tally.total_rank += rank;
            tally.count += 1;
            if rank == 1 {
                tally.wins += 1;
            }
        }
    }

    tallies
        .into_iter()
        .map(|(model, t)| {
            (
                model,
                QualityMetrics {
                    avg_rank: t.total_rank as f64 / t.count as f64,
                    consensus_score: t.wins as f64 / t.count as f64,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judge(judge: &str, ranking: &[&str]) -> JudgeRanking {
        JudgeRanking {
            judge: judge.to_string(),
            ranking: ranking.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_rankings_yield_no_metrics() {
        assert!(aggregate_quality(&[]).is_empty());
    }

    #[test]
    fn test_unanimous_winner() {
        let metrics = aggregate_quality(&[
            judge("j1", &["m1", "m2"]),
            judge("j2", &["m1", "m2"]),
        ]);

        assert_eq!(metrics["m1"].avg_rank, 1.0);
        assert_eq!(metrics["m1"].consensus_score, 1.0);
        assert_eq!(metrics["m2"].avg_rank, 2.0);
        assert_eq!(metrics["m2"].consensus_score, 0.0);
    }

    #[test]
    fn test_split_vote() {
        let metrics = aggregate_quality(&[
            judge("j1", &["m1", "m2"]),
            judge("j2", &["m2", "m1"]),
        ]);

        assert_eq!(metrics["m1"].avg_rank, 1.5);
        assert_eq!(metrics["m1"].consensus_score, 0.5);
        assert_eq!(metrics["m2"].avg_rank, 1.5);
        assert_eq!(metrics["m2"].consensus_score, 0.5);
    }

    #[test]
    fn test_model_missing_from_one_judge() {
        // j2 only ranked m1; m2's stats come from j1 alone.
        let metrics = aggregate_quality(&[judge("j1", &["m2", "m1"]), judge("j2", &["m1"])]);

        assert_eq!(metrics["m2"].avg_rank, 1.0);
        assert_eq!(metrics["m1"].avg_rank, 1.5);
    }

    #[test]
    fn test_unranked_model_absent() {
        let metrics = aggregate_quality(&[judge("j1", &["m1"])]);
        assert!(!metrics.contains_key("never-ranked"));
    }
}
