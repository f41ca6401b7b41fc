//! `MarketStore`: shared, transactional access to [`Tables`].
//!
//! Every write runs as one unit of work: the closure mutates a staged copy
//! of the tables, and the copy replaces the live tables only if the closure
//! returns `Ok` and the commit itself succeeds. Readers never observe a
//! partially applied unit.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use ecomarket_types::{MarketError, Result};

use crate::tables::Tables;

/// Thread-safe store of orders, wallets, ledger and inventory.
///
/// Cost: each unit of work clones every table, wallet and inventory history
/// included, while holding the lock. A write therefore costs time and memory
/// proportional to the whole store, and writers are serialized behind it.
/// A payout sweep pays that once per order. Fine for a single node's working
/// set; a store that keeps long histories needs per-table undo logs instead
/// of whole-table staging.
#[derive(Debug, Default)]
pub struct MarketStore {
    tables: Mutex<Tables>,
    /// Number of upcoming commits that will fail (fault injection).
    pending_faults: AtomicUsize,
    commits: AtomicU64,
}

impl MarketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-populated tables (seed data, legacy imports).
    #[must_use]
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: Mutex::new(tables),
            ..Self::default()
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| MarketError::StoreUnavailable("table lock poisoned".into()))
    }

    /// Run a read-only closure against a consistent snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// `label` names the unit in logs. On any error, from `f` or from the
    /// commit, the live tables are left exactly as they were.
    ///
    /// # Errors
    /// Whatever `f` returns, `CommitFailed` if the commit fails, or
    /// `StoreUnavailable` if the store lock is poisoned.
    pub fn transaction<T>(
        &self,
        label: &'static str,
        f: impl FnOnce(&mut Tables) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock()?;
        let mut staged = guard.clone();

        let value = match f(&mut staged) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(unit = label, error = %e, "unit of work rolled back");
                return Err(e);
            }
        };

        if self.take_fault() {
            tracing::debug!(unit = label, "commit failed, unit of work rolled back");
            return Err(MarketError::CommitFailed(format!("{label}: commit rejected")));
        }

        *guard = staged;
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Number of committed units of work.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    fn take_fault(&self) -> bool {
        self.pending_faults
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Make the next `n` commits fail with `CommitFailed`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn fail_next_commits(&self, n: usize) {
        self.pending_faults.store(n, Ordering::Release);
    }
}
