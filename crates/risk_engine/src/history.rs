//! Bounded per-category score history, used to estimate simulation parameters.

use std::collections::VecDeque;
use std::sync::Arc;

use common::Category;
use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct ScoreHistory {
    limit: usize,
    scores: Arc<DashMap<Category, VecDeque<f64>>>,
}

impl ScoreHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            scores: Arc::new(DashMap::new()),
        }
    }

    /// Append a score, evicting the oldest once the limit is reached.
    pub fn record(&self, category: Category, value: f64) {
        if !value.is_finite() {
            return;
        }
        let mut entry = self.scores.entry(category).or_default();
        if entry.len() == self.limit {
            entry.pop_front();
        }
        entry.push_back(value);
    }

    /// Oldest first.
    pub fn recent(&self, category: Category) -> Vec<f64> {
        self.scores
            .get(&category)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, category: Category) -> usize {
        self.scores.get(&category).map(|s| s.len()).unwrap_or(0)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let history = ScoreHistory::new(3);
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            history.record(Category::Market, v);
        }
        assert_eq!(history.recent(Category::Market), vec![30.0, 40.0, 50.0]);
        assert_eq!(history.len(Category::Hr), 0);
    }

    #[test]
    fn test_history_ignores_non_finite() {
        let history = ScoreHistory::new(5);
        history.record(Category::Hr, f64::NAN);
        history.record(Category::Hr, 42.0);
        assert_eq!(history.recent(Category::Hr), vec![42.0]);
    }
}
