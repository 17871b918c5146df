use crate::models::{HasOwner, OwnerId};
use std::collections::VecDeque;
use tracing::debug;

/// Diversity Layer - 作者多樣性重排
///
/// Greedy reorder of a score-sorted sequence: each slot takes the first
/// pending item whose owner fills fewer than `max_consecutive` of the last
/// `max_consecutive` slots. When nothing qualifies the next pending item is
/// taken anyway, so every item is placed exactly once.
///
/// Linear scan per slot, O(n²) overall; meant for page-sized inputs.
pub struct DiversityLayer {
    max_consecutive: usize, // 同一作者最多連續出現次數
}

impl Default for DiversityLayer {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DiversityLayer {
    /// `max_consecutive == 0` disables diversification.
    pub fn new(max_consecutive: usize) -> Self {
        Self { max_consecutive }
    }

    pub fn max_consecutive(&self) -> usize {
        self.max_consecutive
    }

    /// 重排以避免同一作者連續出現
    pub fn diversify<T: HasOwner>(&self, items: Vec<T>) -> Vec<T> {
        if self.max_consecutive == 0 || items.len() <= 2 {
            return items;
        }

        let mut placed: Vec<T> = Vec::with_capacity(items.len());
        let mut pending: VecDeque<T> = items.into();
        let mut forced = 0usize;

        while !pending.is_empty() {
            let pick = match pending
                .iter()
                .position(|candidate| self.fits(&placed, candidate.owner()))
            {
                Some(idx) => idx,
                None => {
                    forced += 1;
                    0
                }
            };

            if let Some(next) = pending.remove(pick) {
                placed.push(next);
            }
        }

        if forced > 0 {
            debug!(
                forced,
                max_consecutive = self.max_consecutive,
                "Diversity constraint relaxed for dominant owner"
            );
        }

        placed
    }

    /// Whether `owner` may take the next slot after `placed`
    fn fits<T: HasOwner>(&self, placed: &[T], owner: &OwnerId) -> bool {
        let recent_same_owner = placed
            .iter()
            .rev()
            .take(self.max_consecutive)
            .filter(|p| p.owner() == owner)
            .count();

        recent_same_owner < self.max_consecutive
    }
}
