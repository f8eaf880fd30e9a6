//! Which scenarios a bring-up run covers.

/// Scenario ids in run order.
pub const RUN_ORDER: &[&str] = &["smoke", "full-boot", "virtio-disk"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioSelection {
    pub smoke_only: bool,
    pub skip_virtio_disk: bool,
}

impl ScenarioSelection {
    pub fn scenario_ids(&self) -> Vec<&'static str> {
        if self.smoke_only {
            return vec!["smoke"];
        }
        RUN_ORDER
            .iter()
            .copied()
            .filter(|id| !(self.skip_virtio_disk && *id == "virtio-disk"))
            .collect()
    }
}
