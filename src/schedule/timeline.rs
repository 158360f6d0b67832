//! # Timeline builder.
//!
//! For position `i` in the order:
//! ```text
//! rank         = stage.weight() + len(dependencies)
//! start_offset = i * unit
//! end_offset   = start_offset + rank * unit
//! starts_at    = base_time + start_offset
//! ```
//! Offsets saturate at `Duration::MAX`; `starts_at` is `None` when the sum
//! is past what `SystemTime` can represent. Start offsets are non-decreasing by position. Slots are never mutated;
//! a new timeline is built per run.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::plugins::{PluginRegistry, Stage};
use crate::resolve::ExecutionOrder;

/// Placeholder dependent name used when the order names an unknown plugin.
const TIMELINE_ORIGIN: &str = "<timeline>";

/// One planned slot of the timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub plugin: String,
    pub stage: Stage,
    /// Position in the execution order.
    pub position: usize,
    pub rank: u32,
    pub start_offset: Duration,
    pub end_offset: Duration,
    /// `base_time + start_offset`, `None` if it overflows `SystemTime`.
    pub starts_at: Option<SystemTime>,
}

impl ScheduleSlot {
    /// Estimated duration (`end_offset - start_offset`).
    pub fn estimated(&self) -> Duration {
        self.end_offset.saturating_sub(self.start_offset)
    }
}

/// Builds the slot list for `order`.
///
/// Fails with [`ResolveError::MissingDependency`] (dependent `"<timeline>"`)
/// if the order names a plugin that is not registered.
///
/// # Example
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use plugvisor::{PluginDefinition, PluginRegistry, Stage, build_timeline, resolve_order};
///
/// let mut reg = PluginRegistry::new();
/// reg.register(PluginDefinition::new("scan", Stage::Discover)).unwrap();
/// reg.register(PluginDefinition::new("apply", Stage::Execute).with_dependencies(["scan"])).unwrap();
///
/// let order = resolve_order(&reg).unwrap();
/// let slots = build_timeline(&order, &reg, UNIX_EPOCH, Duration::from_secs(1)).unwrap();
///
/// assert_eq!(slots[1].rank, 4);
/// assert_eq!(slots[1].start_offset, Duration::from_secs(1));
/// assert_eq!(slots[1].end_offset, Duration::from_secs(5));
/// ```
pub fn build_timeline(
    order: &ExecutionOrder,
    registry: &PluginRegistry,
    base_time: SystemTime,
    unit: Duration,
) -> Result<Vec<ScheduleSlot>, ResolveError> {
    order
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let def = registry
                .get(name)
                .ok_or_else(|| ResolveError::MissingDependency {
                    from: TIMELINE_ORIGIN.to_string(),
                    to: name.to_string(),
                })?;

            let rank = def.rank();
            let start_offset = unit.saturating_mul(u32::try_from(position).unwrap_or(u32::MAX));
            let end_offset = start_offset.saturating_add(unit.saturating_mul(rank));

            Ok(ScheduleSlot {
                plugin: def.name.clone(),
                stage: def.stage,
                position,
                rank,
                start_offset,
                end_offset,
                starts_at: base_time.checked_add(start_offset),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::PluginDefinition;
    use crate::resolve::resolve_order;
    use std::time::UNIX_EPOCH;

    fn registry() -> PluginRegistry {
        let mut reg = PluginRegistry::new();
        reg.register_all([
            PluginDefinition::new("a", Stage::Discover),
            PluginDefinition::new("b", Stage::Simulate).with_dependencies(["a"]),
            PluginDefinition::new("c", Stage::Execute).with_dependencies(["a", "b"]),
            PluginDefinition::new("d", Stage::Archive),
        ])
        .unwrap();
        reg
    }

    #[test]
    fn ranks_combine_stage_weight_and_dependency_count() {
        let reg = registry();
        let order = resolve_order(&reg).unwrap();
        let slots = build_timeline(&order, &reg, UNIX_EPOCH, Duration::from_millis(100)).unwrap();

        let ranks: Vec<(&str, u32)> = slots.iter().map(|s| (s.plugin.as_str(), s.rank)).collect();
        assert_eq!(ranks, vec![("a", 1), ("b", 3), ("c", 5), ("d", 1)]);
        assert_eq!(slots[2].estimated(), Duration::from_millis(500));
    }

    #[test]
    fn start_offsets_are_monotonic() {
        let reg = registry();
        let order = resolve_order(&reg).unwrap();
        let base = UNIX_EPOCH + Duration::from_secs(1_000);
        let slots = build_timeline(&order, &reg, base, Duration::from_secs(2)).unwrap();

        for pair in slots.windows(2) {
            assert!(pair[0].start_offset <= pair[1].start_offset);
        }
        assert_eq!(slots[3].starts_at, Some(base + Duration::from_secs(6)));
        assert_eq!(slots[3].position, 3);
    }

    #[test]
    fn huge_units_saturate_instead_of_overflowing() {
        let mut reg = PluginRegistry::new();
        reg.register_all([
            PluginDefinition::new("a", Stage::Discover),
            PluginDefinition::new("b", Stage::Execute).with_dependencies(["a"]),
        ])
        .unwrap();
        let order = resolve_order(&reg).unwrap();
        let base = UNIX_EPOCH + Duration::from_secs(1_000);
        let slots = build_timeline(&order, &reg, base, Duration::MAX).unwrap();

        assert_eq!(slots[0].starts_at, Some(base));
        assert_eq!(slots[1].start_offset, Duration::MAX);
        assert_eq!(slots[1].end_offset, Duration::MAX);
        assert_eq!(slots[1].starts_at, None);
    }

    #[test]
    fn unknown_name_in_order_fails() {
        let reg = registry();
        let order = ExecutionOrder::from_names(["a", "ghost"]);
        let err = build_timeline(&order, &reg, UNIX_EPOCH, Duration::from_secs(1)).unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingDependency {
                from: "<timeline>".into(),
                to: "ghost".into(),
            }
        );
    }
}
