use derive_more::{Add, AddAssign, Sum};
use stackdoc::ids::canonical_digest;

use crate::limits::ResourceLimits;
use crate::model::cluster::RoleSource;
use crate::templates::walker::{ClusterLayout, ComputeResourceShape, QueueLayout};

/// Parameters every nested stack imports from the root stack regardless of its queues
/// (tables, security groups and cluster identity referenced by the bootstrap descriptor).
const BASE_IMPORTED_PARAMETERS: usize = 16;

/// Estimated contribution of a part of the cluster to its nested document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Add, AddAssign, Sum)]
pub struct Footprint {
    pub resources: usize,
    pub parameters: usize,
    pub outputs: usize,
    pub compute_resources: usize,
    pub bytes: usize,
}

impl Footprint {
    /// Document counts stay strictly below their ceilings, the compute resource cap is inclusive.
    fn fits(&self, limits: &ResourceLimits) -> bool {
        self.resources < limits.max_resources_per_template
            && self.parameters < limits.max_parameters_per_nested_stack
            && self.outputs < limits.max_outputs_per_template
            && self.compute_resources <= limits.max_compute_resources_per_nested_stack
            && self.bytes < limits.max_template_bytes
    }
}

/// A launch template with its id and version outputs.
pub fn compute_resource_footprint(shape: &ComputeResourceShape) -> Footprint {
    Footprint {
        resources: 1,
        parameters: 0,
        outputs: 2,
        compute_resources: 1,
        bytes: 6_000 + 600 * shape.network_interfaces as usize + 200 * shape.instance_type_count,
    }
}

/// Queue level resources: IAM identity, placement group and imported security groups.
fn queue_overhead(queue: &QueueLayout) -> Footprint {
    let (resources, outputs) = match queue.role {
        RoleSource::Managed => (3, 1),
        RoleSource::InstanceRole(_) => (1, 0),
        RoleSource::InstanceProfile(_) => (0, 0),
    };
    let placement_group = usize::from(queue.queue.is_managed_placement_group());
    Footprint {
        resources: resources + placement_group,
        parameters: 1,
        outputs,
        compute_resources: 0,
        bytes: 2_000 * (resources + placement_group),
    }
}

pub fn queue_footprint(queue: &QueueLayout) -> Footprint {
    queue_overhead(queue)
        + queue
            .compute_resources
            .iter()
            .map(|compute_resource| compute_resource_footprint(&compute_resource.shape))
            .sum::<Footprint>()
}

/// Queues whose infrastructure is placed into a single nested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Derived from the names of the member queues and compute resources.
    pub id: String,
    /// Indices into [`ClusterLayout::queues`], in configuration order.
    pub queues: Vec<usize>,
    pub footprint: Footprint,
}

impl Partition {
    fn new(layout: &ClusterLayout, queues: Vec<usize>, footprint: Footprint) -> Self {
        let members = queues.iter().flat_map(|&index| {
            let queue = &layout.queues[index];
            queue
                .compute_resources
                .iter()
                .map(move |compute_resource| format!("{}\t{}", queue.name(), compute_resource.name()))
        });
        let id = canonical_digest(members)[..8].to_uppercase();
        Self {
            id,
            queues,
            footprint,
        }
    }

    pub fn name(&self) -> String {
        format!("QueueGroup{}", self.id)
    }

    pub fn stack_logical_id(&self) -> String {
        format!("ComputeFleet{}NestedStack", self.name())
    }
}

/// Groups queues into nested documents.
///
/// Queues are packed greedily in configuration order, a queue is never split. A partition is
/// closed when the next queue would push any of its estimated counts over a ceiling.
pub fn partition_queues(
    layout: &ClusterLayout,
    limits: &ResourceLimits,
) -> crate::Result<Vec<Partition>> {
    for queue in &layout.queues {
        let count = queue.compute_resources.len();
        if count > limits.max_compute_resources_per_queue {
            return Err(crate::Error::ConfigurationLimitExceeded(format!(
                "Queue {} has {count} compute resources and exceeds maximum compute resources per queue ({})",
                queue.name(),
                limits.max_compute_resources_per_queue
            )));
        }
    }

    let footprints: Vec<Footprint> = layout.queues.iter().map(queue_footprint).collect();
    let partitions: Vec<Partition> = pack(&footprints, limits)
        .into_iter()
        .map(|queues| {
            let footprint = queues.iter().map(|&index| footprints[index]).sum();
            Partition::new(layout, queues, footprint)
        })
        .collect();

    for partition in &partitions {
        log::debug!(
            "Partition {} holds {} queue(s): {:?}",
            partition.name(),
            partition.queues.len(),
            partition.footprint
        );
    }
    Ok(partitions)
}

fn pack(footprints: &[Footprint], limits: &ResourceLimits) -> Vec<Vec<usize>> {
    let base = Footprint {
        parameters: BASE_IMPORTED_PARAMETERS,
        ..Default::default()
    };
    let mut partitions = vec![];
    let mut current: Vec<usize> = vec![];
    let mut used = base;

    for (index, footprint) in footprints.iter().enumerate() {
        if !current.is_empty() && !(used + *footprint).fits(limits) {
            partitions.push(std::mem::take(&mut current));
            used = base;
        }
        current.push(index);
        used += *footprint;
    }
    if !current.is_empty() {
        partitions.push(current);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(compute_resources: usize) -> Footprint {
        let shape = ComputeResourceShape {
            instance_type_count: 1,
            pinned: true,
            network_interfaces: 1,
            ebs_optimized: Some(true),
            efa: false,
        };
        Footprint {
            resources: 3,
            parameters: 1,
            outputs: 1,
            compute_resources: 0,
            bytes: 6_000,
        } + (0..compute_resources)
            .map(|_| compute_resource_footprint(&shape))
            .sum::<Footprint>()
    }

    fn partition_sizes(queues: usize, compute_resources: usize) -> Vec<usize> {
        let footprints = vec![queue_of(compute_resources); queues];
        pack(&footprints, &ResourceLimits::default())
            .iter()
            .map(Vec::len)
            .collect()
    }

    #[test]
    fn footprint_sum() {
        let total: Footprint = vec![queue_of(1), queue_of(2)].into_iter().sum();
        assert_eq!(total.compute_resources, 3);
        assert_eq!(total.resources, 9);
        assert_eq!(total.outputs, 8);
    }

    #[test]
    fn queues_are_packed_until_ceiling() {
        assert_eq!(partition_sizes(10, 5), vec![8, 2]);
        assert_eq!(partition_sizes(20, 5), vec![8, 8, 4]);
        assert_eq!(partition_sizes(30, 5), vec![8, 8, 8, 6]);
    }

    #[test]
    fn full_queue_gets_own_partition() {
        assert_eq!(partition_sizes(1, 40), vec![1]);
        assert_eq!(partition_sizes(3, 40), vec![1, 1, 1]);
    }

    #[test]
    fn no_queues_no_partitions() {
        assert!(pack(&[], &ResourceLimits::default()).is_empty());
    }

    #[test]
    fn stricter_limits_split_earlier() {
        let limits = ResourceLimits {
            max_outputs_per_template: 25,
            ..Default::default()
        };
        let footprints = vec![queue_of(5); 4];
        let sizes: Vec<usize> = pack(&footprints, &limits).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2]);
    }

    #[test]
    fn reaching_a_document_ceiling_splits() {
        // Two queues of 5 need exactly 22 outputs.
        let footprints = vec![queue_of(5); 2];
        let limits = ResourceLimits {
            max_outputs_per_template: 22,
            ..Default::default()
        };
        assert_eq!(pack(&footprints, &limits), vec![vec![0], vec![1]]);
        let limits = ResourceLimits {
            max_outputs_per_template: 23,
            ..Default::default()
        };
        assert_eq!(pack(&footprints, &limits), vec![vec![0, 1]]);
    }
}
