//! Platform ceilings consulted by every stage of the build.

use crate::model::StorageKind;

pub const MAX_TEMPLATE_SIZE_BYTES: usize = 1024 * 1024;
pub const MAX_RESOURCES_PER_TEMPLATE: usize = 500;
pub const MAX_PARAMETERS_PER_NESTED_STACK: usize = 200;
pub const MAX_OUTPUTS_PER_TEMPLATE: usize = 200;

pub const MAX_NUMBER_OF_QUEUES: usize = 50;
pub const MAX_NUMBER_OF_COMPUTE_RESOURCES_PER_CLUSTER: usize = 150;
pub const MAX_COMPUTE_RESOURCES_PER_QUEUE: usize = 40;
/// A nested stack never holds more compute resources than a single queue may define.
pub const MAX_COMPUTE_RESOURCES_PER_NESTED_STACK: usize = MAX_COMPUTE_RESOURCES_PER_QUEUE;
pub const MAX_EBS_COUNT: usize = 5;

/// Ceilings applied to a single build.
///
/// [`ResourceLimits::default`] returns the platform ceilings. A build can be given stricter
/// ceilings, it is never allowed to exceed the platform ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    pub max_template_bytes: usize,
    pub max_resources_per_template: usize,
    pub max_parameters_per_nested_stack: usize,
    pub max_outputs_per_template: usize,
    pub max_queues: usize,
    pub max_compute_resources_per_cluster: usize,
    pub max_compute_resources_per_queue: usize,
    pub max_compute_resources_per_nested_stack: usize,
    pub max_ebs_volumes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_template_bytes: MAX_TEMPLATE_SIZE_BYTES,
            max_resources_per_template: MAX_RESOURCES_PER_TEMPLATE,
            max_parameters_per_nested_stack: MAX_PARAMETERS_PER_NESTED_STACK,
            max_outputs_per_template: MAX_OUTPUTS_PER_TEMPLATE,
            max_queues: MAX_NUMBER_OF_QUEUES,
            max_compute_resources_per_cluster: MAX_NUMBER_OF_COMPUTE_RESOURCES_PER_CLUSTER,
            max_compute_resources_per_queue: MAX_COMPUTE_RESOURCES_PER_QUEUE,
            max_compute_resources_per_nested_stack: MAX_COMPUTE_RESOURCES_PER_NESTED_STACK,
            max_ebs_volumes: MAX_EBS_COUNT,
        }
    }
}

/// Maximum number of shared storage mounts of `kind` created with the cluster.
pub fn max_new_storage_count(kind: StorageKind) -> usize {
    match kind {
        StorageKind::Ebs => MAX_EBS_COUNT,
        StorageKind::Raid | StorageKind::Efs | StorageKind::Fsx => 1,
    }
}

/// Maximum number of already existing shared storage mounts of `kind`.
pub fn max_existing_storage_count(kind: StorageKind) -> usize {
    match kind {
        StorageKind::Ebs => MAX_EBS_COUNT,
        StorageKind::Efs | StorageKind::Fsx => 20,
        StorageKind::Raid => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_limits() {
        assert_eq!(max_new_storage_count(StorageKind::Efs), 1);
        assert_eq!(max_new_storage_count(StorageKind::Fsx), 1);
        assert_eq!(max_new_storage_count(StorageKind::Raid), 1);
        assert_eq!(max_existing_storage_count(StorageKind::Efs), 20);
        assert_eq!(max_existing_storage_count(StorageKind::Fsx), 20);
        assert_eq!(max_existing_storage_count(StorageKind::Raid), 0);
    }

    #[test]
    fn nested_stack_follows_queue_ceiling() {
        let limits = ResourceLimits::default();
        assert_eq!(
            limits.max_compute_resources_per_nested_stack,
            limits.max_compute_resources_per_queue
        );
        assert_eq!(limits.max_template_bytes, 1_048_576);
    }
}
