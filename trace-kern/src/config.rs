//! Optional on-disk configuration loading.
//!
//! Pulled in only under the `config-toml` feature, mirroring how `abi` and
//! `userlib` in the kernel this crate is modeled on pull in `serde` with
//! `default-features = false` to stay usable in a `no_std` build while still
//! letting a host-side tool deserialize a config file. The in-memory
//! [`crate::scheduler::SchedulerConfig`] and its zero-means-default
//! initialization are unaffected; this module only adds a way to produce one
//! from TOML.

use serde::Deserialize;

use crate::scheduler::SchedulerConfig;

/// On-disk mirror of [`SchedulerConfig`]. Every field is optional; an absent
/// field falls back to [`SchedulerConfig::default`]'s value for it, the same
/// "zero means default" convention the in-memory struct uses.
#[derive(Debug, Default, Deserialize)]
pub struct SchedulerConfigToml {
    pub base_priority_weight: Option<f32>,
    pub urgency_weight: Option<f32>,
    pub age_weight: Option<f32>,
    pub ignore_penalty_weight: Option<f32>,
    pub preempt_delta: Option<f32>,
    pub min_dwell_time_ms: Option<u32>,
    pub extra_dwell_ms_at_max_exhaustion: Option<u32>,
    pub extra_delta_at_max_exhaustion: Option<f32>,
}

impl SchedulerConfigToml {
    /// Parses a TOML document into a [`SchedulerConfig`], filling in any
    /// field the document omits from [`SchedulerConfig::default`].
    pub fn parse(toml_source: &str) -> Result<SchedulerConfig, toml::de::Error> {
        let raw: SchedulerConfigToml = toml::from_str(toml_source)?;
        Ok(raw.into_config())
    }

    fn into_config(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            base_priority_weight: self.base_priority_weight.unwrap_or(defaults.base_priority_weight),
            urgency_weight: self.urgency_weight.unwrap_or(defaults.urgency_weight),
            age_weight: self.age_weight.unwrap_or(defaults.age_weight),
            ignore_penalty_weight: self.ignore_penalty_weight.unwrap_or(defaults.ignore_penalty_weight),
            preempt_delta: self.preempt_delta.unwrap_or(defaults.preempt_delta),
            min_dwell_time_ms: self.min_dwell_time_ms.unwrap_or(defaults.min_dwell_time_ms),
            extra_dwell_ms_at_max_exhaustion: self
                .extra_dwell_ms_at_max_exhaustion
                .unwrap_or(defaults.extra_dwell_ms_at_max_exhaustion),
            extra_delta_at_max_exhaustion: self
                .extra_delta_at_max_exhaustion
                .unwrap_or(defaults.extra_delta_at_max_exhaustion),
        }
    }
}
