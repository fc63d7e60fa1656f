//! Generational task-pool (slab).
//!
//! Fixed capacity, no allocation, O(capacity) per operation. Mirrors the
//! `TaskId`/`Generation` split the kernel this crate is modeled on uses to
//! name tasks: a handle resolves only if its generation matches the slot's
//! *current* occupant, so a handle to a freed task can never be mistaken for
//! a handle to whatever gets allocated into that slot next.

use trace_abi::{TaskId, TaskKind, TASK_POOL_CAPACITY};

use crate::err::TaskOutcome;
use crate::task::Task;
use crate::time::Timestamp;

#[derive(Copy, Clone, Debug)]
struct Slot {
    task: Option<Task>,
    generation: u16,
    occupied: bool,
}

impl Slot {
    const EMPTY: Self = Self {
        task: None,
        generation: 0,
        occupied: false,
    };

    /// `generation`, masked to the width a [`TaskId`] actually has room to
    /// carry. `generation` itself is a free-running counter that keeps
    /// incrementing past that width; every comparison against an id's
    /// generation must go through this so a wrapped counter still matches
    /// the truncated value packed into ids minted after the wrap.
    const fn masked_generation(&self) -> u16 {
        self.generation & TaskId::GENERATION_MASK
    }
}

/// A fixed-capacity generational slab of [`Task`]s.
#[derive(Copy, Clone, Debug)]
pub struct TaskPool {
    slots: [Slot; TASK_POOL_CAPACITY],
}

impl TaskPool {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; TASK_POOL_CAPACITY],
        }
    }

    /// Finds the first unoccupied slot, marks it occupied, and returns its
    /// id. The slot's task contents are left empty — callers must store a
    /// task into the returned id (see [`TaskPool::add`]) before it can be
    /// resolved by [`TaskPool::get`].
    ///
    /// Returns [`TaskId::INVALID`] if the pool is full.
    fn allocate(&mut self) -> TaskId {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.occupied {
                slot.occupied = true;
                slot.task = None;
                return TaskId::from_index_and_generation(index, slot.generation);
            }
        }
        TaskId::INVALID
    }

    /// Frees the slot named by `id`, invalidating any outstanding copies of
    /// `id` by bumping the slot's generation. No-op (returns `false`) if
    /// `id` doesn't resolve to a currently-occupied slot with a matching
    /// generation.
    fn free(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.slot_mut_if_current(id) else {
            return false;
        };
        slot.occupied = false;
        slot.task = None;
        slot.generation = slot.generation.wrapping_add(1);
        true
    }

    fn slot_mut_if_current(&mut self, id: TaskId) -> Option<&mut Slot> {
        let index = id.index();
        let slot = self.slots.get_mut(index)?;
        if slot.occupied && slot.masked_generation() == id.generation() {
            Some(slot)
        } else {
            None
        }
    }

    /// Resolves `id` to its task, or `None` if the handle is stale or
    /// out of range.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        let index = id.index();
        let slot = self.slots.get(index)?;
        if slot.occupied && slot.masked_generation() == id.generation() {
            slot.task.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        let slot = self.slot_mut_if_current(id)?;
        slot.task.as_mut()
    }

    /// Applies [`Task::mark_completed`] to `id`. Reports
    /// [`TaskOutcome::NotFound`] if the handle is stale instead of silently
    /// doing nothing.
    pub fn mark_completed(&mut self, id: TaskId) -> TaskOutcome {
        match self.get_mut(id) {
            Some(task) => {
                task.mark_completed();
                TaskOutcome::Updated
            }
            None => TaskOutcome::NotFound,
        }
    }

    /// Applies [`Task::kill`] to `id`. Reports [`TaskOutcome::NotFound`] if
    /// the handle is stale instead of silently doing nothing.
    pub fn kill(&mut self, id: TaskId) -> TaskOutcome {
        match self.get_mut(id) {
            Some(task) => {
                task.kill();
                TaskOutcome::Updated
            }
            None => TaskOutcome::NotFound,
        }
    }

    /// Applies [`Task::apply_ignore`] to `id`, forwarding its outcome.
    /// Reports [`TaskOutcome::NotFound`] if the handle is stale.
    pub fn apply_ignore(&mut self, id: TaskId, now: Timestamp) -> TaskOutcome {
        match self.get_mut(id) {
            Some(task) => task.apply_ignore(now),
            None => TaskOutcome::NotFound,
        }
    }

    /// Applies [`Task::refresh`] to `id`. Reports [`TaskOutcome::NotFound`]
    /// if the handle is stale instead of silently doing nothing.
    pub fn refresh(&mut self, id: TaskId, now: Timestamp) -> TaskOutcome {
        match self.get_mut(id) {
            Some(task) => {
                task.refresh(now);
                TaskOutcome::Updated
            }
            None => TaskOutcome::NotFound,
        }
    }

    /// Finds the live (not `Completed`/`Killed`) task matching the logical
    /// key `(table_number, kind)`, if any. At most one can exist at a time
    /// (see [`TaskPool::add`]).
    pub fn find_by_key(&self, table_number: u8, kind: TaskKind) -> Option<TaskId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let task = slot.task.as_ref()?;
            if slot.occupied
                && task.table_number == table_number
                && task.kind == kind
                && !task.status.is_terminal()
            {
                Some(TaskId::from_index_and_generation(index, slot.generation))
            } else {
                None
            }
        })
    }

    fn find_dead_by_key(&self, table_number: u8, kind: TaskKind) -> Option<TaskId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let task = slot.task.as_ref()?;
            if slot.occupied
                && task.table_number == table_number
                && task.kind == kind
                && task.status.is_terminal()
            {
                Some(TaskId::from_index_and_generation(index, slot.generation))
            } else {
                None
            }
        })
    }

    /// Upserts the task owed for `(table_number, kind)` at `now`.
    ///
    /// - If a live task already exists for this key, its `base_priority` and
    ///   `time_limit` are refreshed in place (its `created_at`,
    ///   `ignore_count`, `status`, and `suppress_until` are left alone), and
    ///   its id is returned.
    /// - Otherwise, a dead (`Completed`/`Killed`) slot with the same key is
    ///   freed to make room, a fresh slot is allocated, and a brand-new task
    ///   is admitted.
    ///
    /// Returns [`TaskId::INVALID`] if the pool is full and no slot can be
    /// reused or allocated; the caller's FSM transition still happened, so a
    /// later tick or admission attempt can retry.
    pub fn add(&mut self, table_number: u8, kind: TaskKind, now: Timestamp) -> TaskId {
        if let Some(id) = self.find_by_key(table_number, kind) {
            if let Some(task) = self.get_mut(id) {
                task.base_priority = kind.base_priority();
                task.time_limit = now.saturating_add_millis(kind.time_limit_ms());
            }
            return id;
        }

        if let Some(dead_id) = self.find_dead_by_key(table_number, kind) {
            self.free(dead_id);
        }

        let id = self.allocate();
        if id.is_invalid() {
            return id;
        }
        if let Some(slot) = self.slot_mut_if_current(id) {
            slot.task = Some(Task::init(id, kind, now, table_number));
        }
        id
    }

    /// Calls [`Task::refresh`] on every occupied slot, flipping any
    /// `Suppressed` task whose `suppress_until` has elapsed back to
    /// `Eligible`. Idempotent; meant to be called once per scheduler tick
    /// before scoring.
    pub fn refresh_all(&mut self, now: Timestamp) {
        for (_, task) in self.iter_mut() {
            task.refresh(now);
        }
    }

    /// Iterates every currently-occupied slot's id and task.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let task = slot.task.as_ref()?;
            slot.occupied
                .then(|| (TaskId::from_index_and_generation(index, slot.generation), task))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TaskId, &mut Task)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            if !slot.occupied {
                return None;
            }
            let generation = slot.generation;
            slot.task
                .as_mut()
                .map(|task| (TaskId::from_index_and_generation(index, generation), task))
        })
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}
