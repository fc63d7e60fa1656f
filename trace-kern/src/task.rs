//! Task domain: the single unit of work shown to the operator.

use trace_abi::{TaskId, TaskKind, TaskStatus, IGNORE_KILL_THRESHOLD, SNOOZE_DURATION_MS};

use crate::err::TaskOutcome;
use crate::time::Timestamp;

/// A single unit of work owed to a table.
///
/// `(table_number, kind)` is this task's logical key: the pool guarantees at
/// most one live (`Eligible` or `Suppressed`) task exists for a given key at
/// any time (see [`crate::pool::TaskPool::add`]).
#[derive(Copy, Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub kind: TaskKind,
    pub table_number: u8,
    pub base_priority: f32,
    pub created_at: Timestamp,
    /// Absolute deadline: `created_at + kind.time_limit_ms()`.
    pub time_limit: Timestamp,
    /// Absolute wake time while `Suppressed`; zero otherwise.
    pub suppress_until: Timestamp,
    pub ignore_count: u8,
}

impl Task {
    /// Builds a fresh, `Eligible` task for `kind` owed by `table_number`,
    /// admitted at `created_at`.
    pub fn init(id: TaskId, kind: TaskKind, created_at: Timestamp, table_number: u8) -> Self {
        Self {
            id,
            status: TaskStatus::Eligible,
            kind,
            table_number,
            base_priority: kind.base_priority(),
            created_at,
            time_limit: created_at.saturating_add_millis(kind.time_limit_ms()),
            suppress_until: Timestamp::ZERO,
            ignore_count: 0,
        }
    }

    /// This task's logical identity, independent of its generational id.
    pub fn key(&self) -> (u8, TaskKind) {
        (self.table_number, self.kind)
    }

    /// Marks this task as satisfied by the operator. Terminal: never chosen
    /// again, and the slot is free to recycle once nothing else references
    /// it.
    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.suppress_until = Timestamp::ZERO;
    }

    /// Drops this task outright, e.g. ignored to death.
    pub fn kill(&mut self) {
        self.status = TaskStatus::Killed;
        self.suppress_until = Timestamp::ZERO;
    }

    /// Applies an `Ignore` action at `now`.
    ///
    /// A task that has been waved off repeatedly is noise: past
    /// [`trace_abi::IGNORE_KILL_THRESHOLD`] ignores it is killed instead of
    /// suppressed again. The count is checked *before* being incremented, so
    /// the kill happens on the call that finds the count already at the
    /// threshold — not on the call that brings it there. See `DESIGN.md` for
    /// the worked-out call sequence.
    pub fn apply_ignore(&mut self, now: Timestamp) -> TaskOutcome {
        self.suppress_until = now.saturating_add_millis(SNOOZE_DURATION_MS);

        if self.ignore_count < IGNORE_KILL_THRESHOLD {
            self.ignore_count += 1;
            self.status = TaskStatus::Suppressed;
            TaskOutcome::Updated
        } else {
            self.kill();
            TaskOutcome::Removed
        }
    }

    /// Refreshes time-dependent state. Idempotent; safe to call on every
    /// task, every tick.
    pub fn refresh(&mut self, now: Timestamp) {
        if self.status == TaskStatus::Suppressed && now >= self.suppress_until {
            self.status = TaskStatus::Eligible;
        }
    }

    /// Whether this task currently participates in scoring.
    pub fn is_eligible(&self) -> bool {
        self.status == TaskStatus::Eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(now: u32) -> Task {
        Task::init(
            TaskId::from_index_and_generation(0, 0),
            TaskKind::ServeWater,
            Timestamp::from_millis(now),
            3,
        )
    }

    #[test]
    fn init_sets_time_limit_from_kind() {
        let t = fresh(1_000);
        assert_eq!(t.status, TaskStatus::Eligible);
        assert_eq!(t.base_priority, 5.0);
        assert_eq!(t.time_limit.as_millis(), 1_000 + TaskKind::ServeWater.time_limit_ms());
        assert_eq!(t.ignore_count, 0);
        assert_eq!(t.suppress_until, Timestamp::ZERO);
    }

    #[test]
    fn mark_completed_is_terminal() {
        let mut t = fresh(0);
        t.mark_completed();
        assert_eq!(t.status, TaskStatus::Completed);
        assert!(!t.is_eligible());
    }

    #[test]
    fn three_ignores_suppress_fourth_kills() {
        let mut t = fresh(0);
        for expected_count in 1..=3 {
            let outcome = t.apply_ignore(Timestamp::from_millis(0));
            assert_eq!(outcome, TaskOutcome::Updated);
            assert_eq!(t.status, TaskStatus::Suppressed);
            assert_eq!(t.ignore_count, expected_count);
        }
        let outcome = t.apply_ignore(Timestamp::from_millis(0));
        assert_eq!(outcome, TaskOutcome::Removed);
        assert_eq!(t.status, TaskStatus::Killed);
    }

    #[test]
    fn refresh_clears_suppression_after_deadline() {
        let mut t = fresh(0);
        t.apply_ignore(Timestamp::from_millis(1_000));
        assert_eq!(t.suppress_until.as_millis(), 1_000 + SNOOZE_DURATION_MS);

        t.refresh(Timestamp::from_millis(1_000 + SNOOZE_DURATION_MS - 1));
        assert_eq!(t.status, TaskStatus::Suppressed);

        t.refresh(Timestamp::from_millis(1_000 + SNOOZE_DURATION_MS));
        assert_eq!(t.status, TaskStatus::Eligible);
        // suppress_until is preserved, only status flips.
        assert_eq!(t.suppress_until.as_millis(), 1_000 + SNOOZE_DURATION_MS);
    }

    #[test]
    fn refresh_is_idempotent() {
        let mut t = fresh(0);
        t.apply_ignore(Timestamp::from_millis(0));
        t.refresh(Timestamp::from_millis(SNOOZE_DURATION_MS));
        let snapshot = t.status;
        t.refresh(Timestamp::from_millis(SNOOZE_DURATION_MS + 1));
        assert_eq!(t.status, snapshot);
    }
}
