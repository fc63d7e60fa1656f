//! Per-table finite state machine.

use trace_abi::{FsmEvent, TableState, TaskKind};

use crate::time::Timestamp;

/// One table's position in its lifecycle, plus when it got there.
#[derive(Copy, Clone, Debug)]
pub struct TableContext {
    pub table_number: u8,
    pub state: TableState,
    pub state_entered_at: Timestamp,
}

impl TableContext {
    pub fn new(table_number: u8) -> Self {
        Self {
            table_number,
            state: TableState::Idle,
            state_entered_at: Timestamp::ZERO,
        }
    }

    /// Applies `event` to this table's FSM at `now`. Returns whether the
    /// state actually changed — callers use this to decide whether a new
    /// task needs admitting. Event/state pairs with no entry in the
    /// transition table are no-ops.
    pub fn apply_event(&mut self, event: FsmEvent, now: Timestamp) -> bool {
        use FsmEvent::*;
        use TableState::*;

        let next = match (self.state, event) {
            (Idle, CustomersSeated) => Seated,
            (Seated, MarkComplete) => ReadyForOrder,
            (Seated, TakeOrderEarlyOrRepeat) => ReadyForOrder,
            (ReadyForOrder, MarkComplete) => WaitingForOrder,
            (WaitingForOrder, MarkComplete) => Dining,
            (Dining, TimeoutPeriodicCheckin) => Checkup,
            (Dining, TakeOrderEarlyOrRepeat) => ReadyForOrder,
            (Checkup, MarkComplete) => Dining,
            (Checkup, TakeOrderEarlyOrRepeat) => ReadyForOrder,
            (Checkup, TableClosed) => Done,
            (Done, MarkComplete) => Idle,
            (state, _) => state,
        };

        if next == self.state {
            return false;
        }
        self.state = next;
        self.state_entered_at = now;
        true
    }

    /// Advances time-driven transitions: only `Dining` -> `Checkup` after
    /// `dining_checkin_ms` have elapsed since `state_entered_at`. Returns
    /// whether the state changed.
    pub fn tick(&mut self, now: Timestamp, dining_checkin_ms: u32) -> bool {
        if self.state == TableState::Dining
            && now.saturating_since(self.state_entered_at) >= dining_checkin_ms
        {
            return self.apply_event(FsmEvent::TimeoutPeriodicCheckin, now);
        }
        false
    }

    /// The task kind this table currently owes the operator, if any: a pure
    /// function of `state`.
    pub fn owed_kind(&self) -> Option<TaskKind> {
        self.state.owed_kind()
    }
}
