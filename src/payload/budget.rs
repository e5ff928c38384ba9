//! Size budgeting for the serialized payload
//!
//! Cards are described declaratively as (key, priority, size, pinned) entries.
//! [`fit_to_budget`] drops the lowest-priority unpinned entries until the total
//! fits, so the rule lives in one place.

/// One droppable unit of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetEntry<K> {
    pub key: K,
    /// Rank in the priority order; 0 is the most important
    pub priority: usize,
    /// Serialized size in bytes
    pub size: usize,
    /// Pinned entries are never dropped
    pub pinned: bool,
}

/// Outcome of fitting entries to a budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetFit<K> {
    /// Surviving keys, in their original order
    pub kept: Vec<K>,
    /// Dropped keys, in the order they were dropped
    pub dropped: Vec<K>,
    /// Total size of the kept entries plus overhead and separators
    pub size: usize,
}

impl<K> BudgetFit<K> {
    pub fn fits(&self, ceiling: usize) -> bool {
        self.size <= ceiling
    }
}

/// Total size of a selection: overhead + entries + one separator between each pair
pub fn total_size<K>(entries: &[&BudgetEntry<K>], overhead: usize, separator: usize) -> usize {
    let body: usize = entries.iter().map(|e| e.size).sum();
    overhead + body + separator * entries.len().saturating_sub(1)
}

/// Drop the lowest-priority unpinned entries until the total fits `ceiling`.
///
/// Ties in priority drop the later entry first. If the pinned entries alone
/// exceed the ceiling, everything droppable is dropped and the returned fit
/// reports the oversize total.
pub fn fit_to_budget<K: Clone>(
    entries: &[BudgetEntry<K>],
    overhead: usize,
    separator: usize,
    ceiling: usize,
) -> BudgetFit<K> {
    let mut kept: Vec<&BudgetEntry<K>> = entries.iter().collect();
    let mut dropped = Vec::new();

    while total_size(&kept, overhead, separator) > ceiling {
        let victim = kept
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.pinned)
            .max_by_key(|(idx, e)| (e.priority, *idx))
            .map(|(idx, _)| idx);

        match victim {
            Some(idx) => dropped.push(kept.remove(idx).key.clone()),
            None => break,
        }
    }

    BudgetFit {
        size: total_size(&kept, overhead, separator),
        kept: kept.into_iter().map(|e| e.key.clone()).collect(),
        dropped,
    }
}
