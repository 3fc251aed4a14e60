use patchloop_review::count_rejections;

/// Upper bound on review rejections for one change request.
///
/// Holds no state: the count is re-derived from the comment history on every
/// check, so restarts and concurrent processes see the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationBudget {
    max: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetStatus {
    pub rejections: usize,
    pub max: usize,
    pub exhausted: bool,
}

impl IterationBudget {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn check(&self, history: &str) -> BudgetStatus {
        let rejections = count_rejections(history);
        BudgetStatus {
            rejections,
            max: self.max,
            exhausted: rejections >= self.max,
        }
    }
}
