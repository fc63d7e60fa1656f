//! Utility-based preemptive scheduler.
//!
//! Picks, each tick, the single highest-scoring eligible task across the
//! whole pool, then decides whether to preempt whatever is currently active.
//! Preemption is deliberately sticky: a minimum dwell time and a hysteresis
//! margin both have to clear before the active task changes, so the operator
//! isn't yanked between near-tied tasks every tick.

use trace_abi::TaskId;

use crate::pool::TaskPool;
use crate::task::Task;
use crate::time::Timestamp;

/// Scoring and anti-thrash tuning. All fields are public so a caller can
/// build one with struct-update syntax from [`SchedulerConfig::default`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub base_priority_weight: f32,
    pub urgency_weight: f32,
    pub age_weight: f32,
    pub ignore_penalty_weight: f32,

    /// Hysteresis margin: a candidate must beat the active task's score by
    /// more than this to trigger a switch.
    pub preempt_delta: f32,
    /// Minimum time the active task stays active before any switch is
    /// considered, in milliseconds.
    pub min_dwell_time_ms: u32,
    /// Added to `min_dwell_time_ms`, scaled by `human_state_indicator`, when
    /// the operator is most exhausted.
    pub extra_dwell_ms_at_max_exhaustion: u32,
    /// Added to `preempt_delta`, scaled by `human_state_indicator`, when the
    /// operator is most exhausted.
    pub extra_delta_at_max_exhaustion: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_priority_weight: 1.0,
            urgency_weight: 4.0,
            age_weight: 0.2,
            ignore_penalty_weight: 1.0,
            preempt_delta: 0.8,
            min_dwell_time_ms: 20_000,
            extra_dwell_ms_at_max_exhaustion: 0,
            extra_delta_at_max_exhaustion: 0.0,
        }
    }
}

/// Cap applied to the urgency term, in minutes-overdue equivalent.
const URGENCY_CAP: f32 = 10.0;
/// Milliseconds of overdue time that contribute one full point of urgency.
const URGENCY_SCALE_MS: f32 = 60_000.0;
/// Cap applied to the age term.
const AGE_CAP: f32 = 7.0;
/// Milliseconds of age that contribute one full point of age.
const AGE_SCALE_MS: f32 = 120_000.0;

/// Picks and tracks the one active task shown to the operator.
#[derive(Copy, Clone, Debug)]
pub struct Scheduler {
    pub cfg: SchedulerConfig,
    active_task_id: Option<TaskId>,
    task_active_since: Timestamp,
    /// Exhaustion signal in `[0, 1]`, set externally; see
    /// [`Scheduler::set_human_state_indicator`].
    human_state_indicator: f32,
}

impl Scheduler {
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            active_task_id: None,
            task_active_since: Timestamp::ZERO,
            human_state_indicator: 0.0,
        }
    }

    pub fn active_task_id(&self) -> Option<TaskId> {
        self.active_task_id
    }

    /// Sets the exhaustion signal that modulates dwell time and the
    /// preemption margin. Clamped to `[0, 1]`; nothing in this crate writes
    /// this automatically.
    pub fn set_human_state_indicator(&mut self, value: f32) {
        self.human_state_indicator = value.clamp(0.0, 1.0);
    }

    pub fn human_state_indicator(&self) -> f32 {
        self.human_state_indicator
    }

    fn calculate_task_score(&self, task: &Task, now: Timestamp) -> f32 {
        let overdue_ms = now.saturating_since(task.time_limit) as f32;
        let urgency = (overdue_ms / URGENCY_SCALE_MS).min(URGENCY_CAP);

        let age_ms = now.saturating_since(task.created_at) as f32;
        let age = (age_ms / AGE_SCALE_MS).min(AGE_CAP);

        let ignore_penalty = task.ignore_count as f32;

        self.cfg.base_priority_weight * task.base_priority
            + self.cfg.urgency_weight * urgency
            + self.cfg.age_weight * age
            - self.cfg.ignore_penalty_weight * ignore_penalty
    }

    fn effective_dwell_time_ms(&self) -> u32 {
        self.cfg.min_dwell_time_ms
            + (self.cfg.extra_dwell_ms_at_max_exhaustion as f32 * self.human_state_indicator) as u32
    }

    fn effective_preempt_delta(&self) -> f32 {
        self.cfg.preempt_delta + self.cfg.extra_delta_at_max_exhaustion * self.human_state_indicator
    }

    fn should_switch(&self, active_score: f32, candidate_score: f32, now: Timestamp) -> bool {
        let dwell_elapsed = now.saturating_since(self.task_active_since);
        if dwell_elapsed < self.effective_dwell_time_ms() {
            return false;
        }
        candidate_score > active_score + self.effective_preempt_delta()
    }

    /// Refreshes every task in `pool` for `now` (flipping elapsed
    /// suppressions back to `Eligible`), then scans for the best eligible
    /// task and decides whether to (re)select it as active.
    pub fn tick(&mut self, pool: &mut TaskPool, now: Timestamp) {
        pool.refresh_all(now);

        let best = pool
            .iter()
            .filter(|(_, task)| task.is_eligible())
            .map(|(id, task)| (id, self.calculate_task_score(task, now)))
            .fold(None, |best: Option<(TaskId, f32)>, (id, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((id, score)),
            });

        let Some((best_id, best_score)) = best else {
            if self.active_task_id.is_some() {
                self.active_task_id = None;
                self.task_active_since = now;
            }
            return;
        };

        let Some(active_id) = self.active_task_id else {
            self.active_task_id = Some(best_id);
            self.task_active_since = now;
            return;
        };

        let Some(active_task) = pool.get(active_id) else {
            self.active_task_id = Some(best_id);
            self.task_active_since = now;
            return;
        };

        if !active_task.is_eligible() {
            self.active_task_id = Some(best_id);
            self.task_active_since = now;
            return;
        }

        if active_id == best_id {
            return;
        }

        let active_score = self.calculate_task_score(active_task, now);
        if self.should_switch(active_score, best_score, now) {
            self.active_task_id = Some(best_id);
            self.task_active_since = now;
        }
    }

    /// Clears the active task, e.g. after it's been completed or killed.
    /// The next [`Scheduler::tick`] call will pick a fresh one immediately,
    /// bypassing dwell/hysteresis (there's nothing to preempt).
    pub fn clear_active(&mut self) {
        self.active_task_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_abi::TaskKind;

    fn pool_with(tasks: &[(u8, TaskKind, u32)]) -> TaskPool {
        let mut pool = TaskPool::new();
        for &(table, kind, created_ms) in tasks {
            pool.add(table, kind, Timestamp::from_millis(created_ms));
        }
        pool
    }

    #[test]
    fn first_tick_picks_the_only_candidate_immediately() {
        let mut pool = pool_with(&[(0, TaskKind::ServeWater, 0)]);
        let mut sched = Scheduler::new(SchedulerConfig::default());
        sched.tick(&mut pool, Timestamp::from_millis(0));
        assert!(sched.active_task_id().is_some());
    }

    #[test]
    fn higher_base_priority_wins_when_otherwise_equal() {
        let mut pool = pool_with(&[
            (0, TaskKind::ClearTable, 0),  // base priority 3.0
            (1, TaskKind::ServeOrder, 0),  // base priority 8.0
        ]);
        let mut sched = Scheduler::new(SchedulerConfig::default());
        sched.tick(&mut pool, Timestamp::from_millis(0));
        let active = sched.active_task_id().unwrap();
        let task = pool.get(active).unwrap();
        assert_eq!(task.kind, TaskKind::ServeOrder);
    }

    #[test]
    fn dwell_time_blocks_immediate_preemption() {
        let mut pool = pool_with(&[(0, TaskKind::ClearTable, 0)]);
        let mut sched = Scheduler::new(SchedulerConfig::default());
        sched.tick(&mut pool, Timestamp::from_millis(0));
        let first = sched.active_task_id().unwrap();

        // A much more urgent task shows up, but inside the dwell window.
        pool.add(1, TaskKind::ServeOrder, Timestamp::from_millis(100));
        sched.tick(&mut pool, Timestamp::from_millis(100));
        assert_eq!(sched.active_task_id().unwrap(), first, "dwell should block the switch");
    }

    #[test]
    fn switch_allowed_past_dwell_when_margin_cleared() {
        let mut pool = pool_with(&[(0, TaskKind::ClearTable, 0)]);
        let mut sched = Scheduler::new(SchedulerConfig {
            min_dwell_time_ms: 1_000,
            ..SchedulerConfig::default()
        });
        sched.tick(&mut pool, Timestamp::from_millis(0));

        pool.add(1, TaskKind::ServeOrder, Timestamp::from_millis(0));
        sched.tick(&mut pool, Timestamp::from_millis(2_000));
        let active = sched.active_task_id().unwrap();
        assert_eq!(pool.get(active).unwrap().kind, TaskKind::ServeOrder);
    }

    #[test]
    fn small_margin_does_not_trigger_switch() {
        let mut pool = pool_with(&[(0, TaskKind::TakeOrder, 0)]); // 7.0
        let mut sched = Scheduler::new(SchedulerConfig {
            min_dwell_time_ms: 0,
            preempt_delta: 10.0,
            ..SchedulerConfig::default()
        });
        sched.tick(&mut pool, Timestamp::from_millis(0));
        let first = sched.active_task_id().unwrap();

        pool.add(1, TaskKind::ServeOrder, Timestamp::from_millis(0)); // 8.0, delta 1.0 < 10.0
        sched.tick(&mut pool, Timestamp::from_millis(1));
        assert_eq!(sched.active_task_id().unwrap(), first);
    }

    #[test]
    fn stale_active_handle_falls_back_to_best_candidate() {
        let mut pool = pool_with(&[(0, TaskKind::ClearTable, 0)]);
        let mut sched = Scheduler::new(SchedulerConfig::default());
        sched.tick(&mut pool, Timestamp::from_millis(0));
        let stale = sched.active_task_id().unwrap();

        pool.get_mut(stale).unwrap().mark_completed();
        pool.add(1, TaskKind::ServeOrder, Timestamp::from_millis(1));

        sched.tick(&mut pool, Timestamp::from_millis(1));
        let active = sched.active_task_id().unwrap();
        assert_eq!(pool.get(active).unwrap().kind, TaskKind::ServeOrder);
    }

    #[test]
    fn no_remaining_candidates_clears_the_active_task() {
        let mut pool = pool_with(&[(0, TaskKind::ClearTable, 0)]);
        let mut sched = Scheduler::new(SchedulerConfig::default());
        sched.tick(&mut pool, Timestamp::from_millis(0));
        let active = sched.active_task_id().unwrap();

        pool.get_mut(active).unwrap().mark_completed();
        sched.tick(&mut pool, Timestamp::from_millis(1));
        assert!(sched.active_task_id().is_none(), "last eligible task going away clears active");
    }

    #[test]
    fn exhaustion_widens_dwell_and_margin() {
        let cfg = SchedulerConfig {
            min_dwell_time_ms: 1_000,
            extra_dwell_ms_at_max_exhaustion: 9_000,
            preempt_delta: 0.5,
            extra_delta_at_max_exhaustion: 5.0,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(cfg);
        sched.set_human_state_indicator(1.0);
        assert_eq!(sched.effective_dwell_time_ms(), 10_000);
        assert_eq!(sched.effective_preempt_delta(), 5.5);
    }
}
