//! Aggregate status of a manager pass

use notifyr_domain::status::ComponentStatus;
use std::collections::HashMap;

/// Worst-status-wins aggregation over the mini-services of one manager pass
///
/// Omitted entities do not lower the aggregate, but they count against the
/// expected total: a pass where nothing survived is `Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct StatusCounter {
    expected: usize,
    counts: HashMap<ComponentStatus, usize>,
    omitted: usize,
}

impl StatusCounter {
    /// Counter for a pass over `expected` entities
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            ..Self::default()
        }
    }

    /// Reset the expected total
    pub fn expect(&mut self, expected: usize) {
        self.expected = expected;
    }

    /// Record a surviving mini-service
    pub fn record(&mut self, status: ComponentStatus) {
        *self.counts.entry(status).or_default() += 1;
    }

    /// Record an omitted mini-service
    pub fn omit(&mut self) {
        self.omitted += 1;
    }

    /// Entities expected for this pass
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Mini-services that survived
    pub fn built(&self) -> usize {
        self.counts.values().sum()
    }

    /// Mini-services omitted from the pool
    pub fn omitted(&self) -> usize {
        self.omitted
    }

    /// Survivors with `status`
    pub fn count(&self, status: ComponentStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Aggregate status for the manager
    pub fn status(&self) -> ComponentStatus {
        let built = self.built();
        if self.expected > 0 && built == 0 {
            return ComponentStatus::Unavailable;
        }
        self.counts
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(status, _)| *status)
            .fold(ComponentStatus::Available, ComponentStatus::worst)
    }
}
