//! The façade that ties tables, the task pool, and the scheduler together.
//!
//! This is the one type an embedding application talks to. It owns all
//! state the scheduling core needs and exposes the handful of operations the
//! rest of the device (touch input, display, FSM timers) actually calls.

use trace_abi::{FsmEvent, TableState, TaskId, UserAction, MAX_TABLES};

use crate::pool::TaskPool;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::table::TableContext;
use crate::task::Task;
use crate::time::Timestamp;

/// Capacity of the façade's own event log. Independent of
/// [`trace_abi::TASK_POOL_CAPACITY`]; this just needs to be big enough to
/// cover a few ticks' worth of activity for a post-mortem dump.
pub const EVENT_LOG_CAPACITY: usize = 64;

/// A single notable occurrence, recorded for diagnostics.
#[derive(Copy, Clone, Debug)]
pub enum SystemEvent {
    /// A table's FSM moved from one state to another.
    TableTransitioned {
        table_number: u8,
        from: TableState,
        to: TableState,
    },
    /// A task was admitted to or refreshed in the pool as a result of a
    /// table's current owed kind.
    TaskAdmitted { table_number: u8, task_id: TaskId },
    /// The scheduler selected a new active task.
    ActiveTaskChanged { task_id: TaskId },
    /// A user action was applied to the currently active task.
    UserActionApplied { task_id: TaskId, action: UserAction },
    /// A user action referenced a task id that no longer resolves.
    StaleTaskId { task_id: TaskId },
}

/// Owns every table's FSM, the task pool, and the scheduler; exposes the
/// operations an embedding application drives this crate with.
pub struct TraceSystem {
    tables: [TableContext; MAX_TABLES],
    pool: TaskPool,
    scheduler: Scheduler,
    dining_checkin_ms: u32,
    events: trace_ringbuf::Ringbuf<SystemEvent, EVENT_LOG_CAPACITY>,
}

impl TraceSystem {
    /// Builds a fresh system: every table `Idle`, an empty pool, and a
    /// scheduler built from `cfg`.
    pub fn new(cfg: SchedulerConfig, dining_checkin_ms: u32) -> Self {
        let mut tables = [TableContext::new(0); MAX_TABLES];
        for (index, table) in tables.iter_mut().enumerate() {
            *table = TableContext::new(index as u8);
        }

        Self {
            tables,
            pool: TaskPool::new(),
            scheduler: Scheduler::new(cfg),
            dining_checkin_ms,
            events: trace_ringbuf::Ringbuf::new(),
        }
    }

    fn is_valid_table(table_number: u8) -> bool {
        (table_number as usize) < MAX_TABLES
    }

    /// Admits the task implied by a table's current owed kind, if any.
    fn admit_task(&mut self, table_number: u8, now: Timestamp) {
        if !Self::is_valid_table(table_number) {
            return;
        }
        let Some(kind) = self.tables[table_number as usize].owed_kind() else {
            return;
        };
        let task_id = self.pool.add(table_number, kind, now);
        self.events.push(SystemEvent::TaskAdmitted { table_number, task_id });
    }

    /// Applies an FSM event directly to a table (e.g. a touch on "seat
    /// table" or a timer firing). Admits the newly-owed task if the state
    /// actually changed, then ticks the scheduler.
    pub fn apply_table_fsm_event(&mut self, table_number: u8, event: FsmEvent, now: Timestamp) {
        if !Self::is_valid_table(table_number) {
            return;
        }
        let table = &mut self.tables[table_number as usize];
        let from = table.state;
        let changed = table.apply_event(event, now);
        if changed {
            let to = table.state;
            self.events.push(SystemEvent::TableTransitioned { table_number, from, to });
            self.admit_task(table_number, now);
        }
        self.tick_scheduler(now);
    }

    /// Convenience wrapper: jump a table straight to `ReadyForOrder`,
    /// whatever state it's currently in (e.g. the operator walks up and
    /// takes the order before the usual water-then-order sequence).
    pub fn take_order_now(&mut self, table_number: u8, now: Timestamp) {
        self.apply_table_fsm_event(table_number, FsmEvent::TakeOrderEarlyOrRepeat, now);
    }

    /// Convenience wrapper: closes out a table, normally from `Checkup`.
    pub fn close_table(&mut self, table_number: u8, now: Timestamp) {
        self.apply_table_fsm_event(table_number, FsmEvent::TableClosed, now);
    }

    /// Advances the table whose completed task just satisfied `kind`'s
    /// state, and admits whatever it owes next.
    fn advance_table_fsm(&mut self, table_number: u8, now: Timestamp) {
        self.apply_table_fsm_event(table_number, FsmEvent::MarkComplete, now);
    }

    /// Applies a user action — typically from a touch on the currently
    /// displayed task — to the task named by `task_id`.
    ///
    /// Returns `false` if `task_id` is stale (already recycled) or doesn't
    /// resolve; returns `true` once the action has been applied, whether or
    /// not it changed anything externally visible.
    pub fn apply_user_action_to_task(&mut self, task_id: TaskId, action: UserAction, now: Timestamp) -> bool {
        if !self.pool.refresh(task_id, now).is_updated() {
            self.events.push(SystemEvent::StaleTaskId { task_id });
            return false;
        }

        let table_number = {
            // `refresh` just confirmed `task_id` resolves; it cannot have
            // gone stale in between on this single-threaded façade.
            let task = self.pool.get(task_id).expect("refreshed id must still resolve");
            if !task.is_eligible() {
                self.tick_scheduler(now);
                return false;
            }
            task.table_number
        };

        self.events.push(SystemEvent::UserActionApplied { task_id, action });

        match action {
            UserAction::Complete => {
                self.pool.mark_completed(task_id);
                self.advance_table_fsm(table_number, now);
            }
            UserAction::Ignore => {
                self.pool.apply_ignore(task_id, now);
            }
            UserAction::TakeOrder => {
                self.pool.mark_completed(task_id);
                self.take_order_now(table_number, now);
            }
            UserAction::CloseTable => {
                self.pool.mark_completed(task_id);
                self.close_table(table_number, now);
            }
        }

        self.tick_scheduler(now);
        true
    }

    fn tick_scheduler(&mut self, now: Timestamp) {
        let before = self.scheduler.active_task_id();
        self.scheduler.tick(&mut self.pool, now);
        let after = self.scheduler.active_task_id();
        if after.is_some() && after != before {
            self.events.push(SystemEvent::ActiveTaskChanged { task_id: after.unwrap() });
        }
    }

    /// Advances every table's time-driven transitions, admitting newly-owed
    /// tasks, then ticks the scheduler. Drive this from a periodic timer.
    pub fn tick(&mut self, now: Timestamp) {
        for index in 0..MAX_TABLES {
            let table_number = index as u8;
            let changed = self.tables[index].tick(now, self.dining_checkin_ms);
            if changed {
                let table = &self.tables[index];
                self.events.push(SystemEvent::TableTransitioned {
                    table_number,
                    // `tick` only ever moves Dining -> Checkup.
                    from: TableState::Dining,
                    to: table.state,
                });
                self.admit_task(table_number, now);
            }
        }
        self.tick_scheduler(now);
    }

    /// Read-only accessor for a table's FSM context, or `None` for an
    /// out-of-range index.
    pub fn get_table(&self, table_number: u8) -> Option<&TableContext> {
        self.tables.get(table_number as usize)
    }

    pub fn get_active_task_id(&self) -> Option<TaskId> {
        self.scheduler.active_task_id()
    }

    pub fn get_active_task(&self) -> Option<&Task> {
        self.pool.get(self.scheduler.active_task_id()?)
    }

    /// Sets the exhaustion signal the scheduler uses to widen dwell time and
    /// the preemption margin. See [`Scheduler::set_human_state_indicator`].
    pub fn set_human_state_indicator(&mut self, value: f32) {
        self.scheduler.set_human_state_indicator(value);
    }

    /// Recorded system events, oldest first, for diagnostics.
    pub fn events(&self) -> impl Iterator<Item = &SystemEvent> {
        self.events.iter().map(|entry| &entry.payload)
    }
}
