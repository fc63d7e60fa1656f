//! Shared type and constant definitions for the table-workflow scheduling
//! core, analogous to `abi` in the kernel this crate is modeled on: the types
//! named here are safe to depend on from any consumer (the scheduling core
//! itself, a future touch/display crate, or a host-side test harness)
//! without pulling in the scheduling logic.

#![cfg_attr(target_os = "none", no_std)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of tables this build supports.
pub const MAX_TABLES: usize = 28;

/// Number of slots in the task pool.
pub const TASK_POOL_CAPACITY: usize = 32;

/// Duration a task stays suppressed after an `Ignore` action, in
/// milliseconds.
pub const SNOOZE_DURATION_MS: u32 = 30_000;

/// Number of ignores a task tolerates before it is killed outright.
pub const IGNORE_KILL_THRESHOLD: u8 = 3;

/// Dining-to-checkup timeout used in production builds, in milliseconds.
/// Tests construct a [`crate::TraceSystemConfig`]-style override with a
/// smaller value; this constant only supplies the production default.
pub const DINING_CHECKIN_MS_DEFAULT: u32 = 600_000;

/// Index part of a [`TaskId`] is stored in the low bits; this is the number
/// of bits given to it. `TASK_POOL_CAPACITY` fits comfortably under `2^6`,
/// leaving the rest of a `u16` for the generation.
pub const TASK_ID_INDEX_BITS: u32 = 6;

/// The kind of work a table can owe the operator.
///
/// Base priority and time limit are properties of the kind, not of any one
/// task instance; see [`TaskKind::base_priority`] and
/// [`TaskKind::time_limit_ms`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TaskKind {
    ServeWater,
    TakeOrder,
    ServeOrder,
    MonitorTable,
    ClearTable,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::ServeWater,
        TaskKind::TakeOrder,
        TaskKind::ServeOrder,
        TaskKind::MonitorTable,
        TaskKind::ClearTable,
    ];

    /// Kind-derived constant base priority, higher is more important.
    pub const fn base_priority(self) -> f32 {
        match self {
            TaskKind::ServeWater => 5.0,
            TaskKind::TakeOrder => 7.0,
            TaskKind::ServeOrder => 8.0,
            TaskKind::MonitorTable => 4.0,
            TaskKind::ClearTable => 3.0,
        }
    }

    /// Kind-derived time limit, in milliseconds, added to `created_at` to
    /// produce a task's absolute `time_limit`.
    pub const fn time_limit_ms(self) -> u32 {
        match self {
            TaskKind::ServeWater => 5 * 60 * 1000,
            TaskKind::TakeOrder => 4 * 60 * 1000,
            TaskKind::ServeOrder => 3 * 60 * 1000,
            TaskKind::MonitorTable => 10 * 60 * 1000,
            TaskKind::ClearTable => 10 * 60 * 1000,
        }
    }
}

impl core::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TaskKind::ServeWater => "serve-water",
            TaskKind::TakeOrder => "take-order",
            TaskKind::ServeOrder => "serve-order",
            TaskKind::MonitorTable => "monitor-table",
            TaskKind::ClearTable => "clear-table",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of a task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TaskStatus {
    /// Participates in scheduling.
    Eligible,
    /// Ineligible until `suppress_until` elapses.
    Suppressed,
    /// Terminal: satisfied by the operator.
    Completed,
    /// Terminal: dropped, e.g. ignored to death.
    Killed,
}

impl TaskStatus {
    /// Completed and Killed are terminal: never chosen by the scheduler, and
    /// the slot they occupy is free to recycle.
    pub const fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Killed)
    }
}

impl core::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TaskStatus::Eligible => "eligible",
            TaskStatus::Suppressed => "suppressed",
            TaskStatus::Completed => "completed",
            TaskStatus::Killed => "killed",
        };
        f.write_str(s)
    }
}

/// A table's position in its seated-to-cleared lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TableState {
    Idle,
    Seated,
    ReadyForOrder,
    WaitingForOrder,
    Dining,
    Checkup,
    Done,
}

impl TableState {
    /// The task kind this state owes the operator, if any. Pure function of
    /// state, single-valued, per the table in spec.
    pub const fn owed_kind(self) -> Option<TaskKind> {
        match self {
            TableState::Seated => Some(TaskKind::ServeWater),
            TableState::ReadyForOrder => Some(TaskKind::TakeOrder),
            TableState::WaitingForOrder => Some(TaskKind::ServeOrder),
            TableState::Checkup => Some(TaskKind::MonitorTable),
            TableState::Done => Some(TaskKind::ClearTable),
            TableState::Idle | TableState::Dining => None,
        }
    }
}

/// Events that can drive a table's finite state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FsmEvent {
    MarkComplete,
    TakeOrderEarlyOrRepeat,
    CustomersSeated,
    TableClosed,
    TimeoutPeriodicCheckin,
}

/// Actions the operator can apply to the task currently shown on the UI.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UserAction {
    Complete,
    Ignore,
    TakeOrder,
    CloseTable,
}

/// Names a particular incarnation of a task-pool slot.
///
/// A `TaskId` combines a slot index (fixed at allocation) and a generation
/// number that increments every time the slot is freed. A handle whose
/// generation doesn't match the slot's current generation refers to a task
/// that is gone — this is what makes the pool resistant to use-after-free
/// through stale ids, without requiring lifetimes or reference counting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaskId(u16);

impl TaskId {
    /// The all-ones id, reserved to mean "no task".
    pub const INVALID: Self = Self(u16::MAX);

    pub const INDEX_BITS: u32 = TASK_ID_INDEX_BITS;
    pub const INDEX_MASK: u16 = (1 << Self::INDEX_BITS) - 1;
    /// Bits left over for the generation once the index has its field.
    pub const GENERATION_BITS: u32 = 16 - Self::INDEX_BITS;
    /// A free-running generation counter (e.g. `Slot::generation`) must be
    /// masked with this before packing into or comparing against a `TaskId`
    /// — the packed field only has room for `GENERATION_BITS` bits, and an
    /// unmasked counter silently diverges from the packed value once it
    /// wraps past `GENERATION_MASK + 1`.
    pub const GENERATION_MASK: u16 = (1 << Self::GENERATION_BITS) - 1;

    /// Fabricates a `TaskId` for a known index and generation. `generation`
    /// is masked to [`Self::GENERATION_MASK`] so a caller's free-running
    /// counter packs consistently no matter how far it has wrapped.
    pub const fn from_index_and_generation(index: usize, generation: u16) -> Self {
        Self((index as u16 & Self::INDEX_MASK) | ((generation & Self::GENERATION_MASK) << Self::INDEX_BITS))
    }

    /// Extracts the index part of this id.
    pub const fn index(self) -> usize {
        (self.0 & Self::INDEX_MASK) as usize
    }

    /// Extracts the generation part of this id, already masked to
    /// [`Self::GENERATION_MASK`].
    pub const fn generation(self) -> u16 {
        self.0 >> Self::INDEX_BITS
    }

    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_round_trips_index_and_generation() {
        let id = TaskId::from_index_and_generation(17, 5);
        assert_eq!(id.index(), 17);
        assert_eq!(id.generation(), 5);
    }

    #[test]
    fn generation_is_masked_consistently_on_construction_and_extraction() {
        // A generation counter one past the packed field's range must come
        // back out exactly as it would if it had started counting from 0 —
        // otherwise a caller computing `raw_counter & MASK` and a caller
        // relying on `from_index_and_generation`'s own masking could
        // disagree.
        let wrapped = TaskId::GENERATION_MASK + 1 + 7;
        let id = TaskId::from_index_and_generation(3, wrapped);
        assert_eq!(id.generation(), 7);
        assert_eq!(id, TaskId::from_index_and_generation(3, 7));
    }

    #[test]
    fn invalid_id_is_invalid() {
        assert!(TaskId::INVALID.is_invalid());
        assert!(!TaskId::from_index_and_generation(0, 0).is_invalid());
    }

    #[test]
    fn owed_kind_is_single_valued() {
        assert_eq!(TableState::Idle.owed_kind(), None);
        assert_eq!(TableState::Seated.owed_kind(), Some(TaskKind::ServeWater));
        assert_eq!(TableState::Dining.owed_kind(), None);
        assert_eq!(TableState::Done.owed_kind(), Some(TaskKind::ClearTable));
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Killed.is_terminal());
        assert!(!TaskStatus::Eligible.is_terminal());
        assert!(!TaskStatus::Suppressed.is_terminal());
    }
}
