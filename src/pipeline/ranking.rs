//! Verdict ranking and best-candidate retention.

use crate::models::{BestCandidate, GeneratedCandidate, VerificationVerdict};

/// Points per status tier. Larger than any realistic blocker/warning penalty.
const TIER_WEIGHT: i64 = 1000;
const BLOCKER_PENALTY: i64 = 10;
const WARNING_PENALTY: i64 = 1;

/// Total order over verdicts: tier first, then fewer blockers, then fewer warnings.
pub fn rank_verdict(verdict: &VerificationVerdict) -> i64 {
    verdict.status.tier_score() * TIER_WEIGHT
        - BLOCKER_PENALTY * verdict.blockers.len() as i64
        - WARNING_PENALTY * verdict.warnings.len() as i64
}

/// Best candidate seen so far in a run.
///
/// Replaced only by a strictly higher rank, so ties keep the earliest candidate.
#[derive(Debug, Default)]
pub struct BestSoFar {
    best: BestCandidate,
}

impl BestSoFar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rank(&self) -> Option<i64> {
        self.best.rank
    }

    /// Offer a verified candidate. Returns true if it became the new best.
    pub fn offer(
        &mut self,
        iteration: u32,
        candidate: &GeneratedCandidate,
        verdict: &VerificationVerdict,
        rank: i64,
    ) -> bool {
        if self.best.rank.is_some_and(|current| rank <= current) {
            return false;
        }
        self.best = BestCandidate {
            candidate: Some(candidate.clone()),
            verdict: Some(verdict.clone()),
            iteration: Some(iteration),
            rank: Some(rank),
        };
        true
    }

    pub fn into_inner(self) -> BestCandidate {
        self.best
    }
}
