//! Typed cluster configuration.

use std::path::Path;

pub mod cluster;
pub mod scheduling;
pub mod storage;

pub use cluster::ClusterModel;
pub use scheduling::{ComputeResource, Queue, SchedulerKind};
pub use storage::{SharedStorage, StorageKind};

pub fn parse_cluster_model(text: &str) -> crate::Result<ClusterModel> {
    Ok(serde_yaml::from_str(text)?)
}

pub fn load_cluster_model(path: &Path) -> crate::Result<ClusterModel> {
    let text = std::fs::read_to_string(path)?;
    let model = parse_cluster_model(&text)?;
    log::debug!(
        "Loaded cluster configuration {} ({} queue(s), scheduler {})",
        path.display(),
        model.scheduling.queues.len(),
        model.scheduler_kind()
    );
    Ok(model)
}
