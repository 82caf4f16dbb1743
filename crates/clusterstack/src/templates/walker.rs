use crate::aws::{Ec2Catalog, InstanceTypeInfo, SubnetInfo};
use crate::common::error::limit_exceeded;
use crate::limits::{ResourceLimits, max_existing_storage_count, max_new_storage_count};
use crate::model::cluster::RoleSource;
use crate::model::storage::StorageSettings;
use crate::model::{ClusterModel, ComputeResource, Queue, SchedulerKind, StorageKind};

/// Everything the size of the generated resources of a compute resource depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeResourceShape {
    pub instance_type_count: usize,
    /// A single instance type is pinned.
    pub pinned: bool,
    pub network_interfaces: u32,
    /// Known only when a single instance type is pinned.
    pub ebs_optimized: Option<bool>,
    pub efa: bool,
}

impl ComputeResourceShape {
    /// Flexible compute resources get as many network interfaces as the most limited of their
    /// instance types supports.
    pub fn of(compute_resource: &ComputeResource, instance_types: &[InstanceTypeInfo]) -> Self {
        let pinned = compute_resource.instance_types.pinned().is_some();
        Self {
            instance_type_count: compute_resource.instance_types.instance_types().len(),
            pinned,
            network_interfaces: instance_types
                .iter()
                .map(InstanceTypeInfo::max_network_cards)
                .min()
                .unwrap_or(1),
            ebs_optimized: instance_types
                .first()
                .filter(|_| pinned)
                .map(InstanceTypeInfo::is_ebs_optimized),
            efa: compute_resource.efa.enabled,
        }
    }
}

pub struct ComputeResourceLayout<'a> {
    pub compute_resource: &'a ComputeResource,
    /// Metadata of the instance types, in the order they are configured.
    pub instance_types: Vec<InstanceTypeInfo>,
    pub shape: ComputeResourceShape,
}

impl ComputeResourceLayout<'_> {
    pub fn name(&self) -> &str {
        &self.compute_resource.name
    }

    /// CPU options applied when simultaneous multithreading is disabled on a pinned type.
    pub fn disabled_threads_cores(&self) -> Option<u32> {
        match self.instance_types.as_slice() {
            [info]
                if self.compute_resource.disable_simultaneous_multithreading
                    && info.threads_per_core() > 1 =>
            {
                Some(info.cores())
            }
            _ => None,
        }
    }
}

pub struct QueueLayout<'a> {
    pub queue: &'a Queue,
    pub role: RoleSource,
    pub image_id: String,
    pub compute_resources: Vec<ComputeResourceLayout<'a>>,
}

impl QueueLayout<'_> {
    pub fn name(&self) -> &str {
        &self.queue.name
    }

    /// The only subnet of the queue, instances of pinned types are launched into it directly.
    pub fn single_subnet(&self) -> Option<&str> {
        match self.queue.networking.subnet_ids.as_slice() {
            [subnet] => Some(subnet),
            _ => None,
        }
    }
}

pub struct HeadNodeLayout {
    pub instance_type: InstanceTypeInfo,
    pub subnet_id: String,
    pub subnet: SubnetInfo,
    pub role: RoleSource,
    pub image_id: String,
}

/// Number of shared storage mounts of every kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageCounts {
    pub ebs: usize,
    pub raid: usize,
    /// Member volumes of all RAID arrays.
    pub raid_volumes: usize,
    pub efs: usize,
    pub fsx: usize,
}

/// Resolved view of a cluster model: every queue and compute resource in configuration order,
/// with the instance type and subnet metadata the generated resources depend on.
pub struct ClusterLayout<'a> {
    pub cluster: &'a ClusterModel,
    pub head_node: HeadNodeLayout,
    pub queues: Vec<QueueLayout<'a>>,
    /// Availability zone and a subnet in it, for every zone nodes are launched in.
    pub availability_zones: Vec<(String, String)>,
    pub storage: StorageCounts,
}

impl<'a> ClusterLayout<'a> {
    pub fn compute_resources(
        &self,
    ) -> impl Iterator<Item = (&QueueLayout<'a>, &ComputeResourceLayout<'a>)> {
        self.queues.iter().flat_map(|queue| {
            queue
                .compute_resources
                .iter()
                .map(move |compute_resource| (queue, compute_resource))
        })
    }

    pub fn compute_resource_count(&self) -> usize {
        self.queues
            .iter()
            .map(|queue| queue.compute_resources.len())
            .sum()
    }

    pub fn is_efa_enabled(&self) -> bool {
        self.compute_resources()
            .any(|(_, compute_resource)| compute_resource.shape.efa)
    }

    pub fn architecture(&self) -> &str {
        self.head_node.instance_type.architecture()
    }

    pub fn vpc_id(&self) -> &str {
        &self.head_node.subnet.vpc_id
    }
}

/// Resolves the cluster model and checks the cluster-wide ceilings.
pub fn walk_cluster<'a>(
    cluster: &'a ClusterModel,
    catalog: &dyn Ec2Catalog,
    limits: &ResourceLimits,
) -> crate::Result<ClusterLayout<'a>> {
    let queues = &cluster.scheduling.queues;
    if queues.len() > limits.max_queues {
        return limit_exceeded(format!(
            "Number of queues ({}) exceeds maximum number of queues ({})",
            queues.len(),
            limits.max_queues
        ));
    }
    let compute_resource_count: usize = queues
        .iter()
        .map(|queue| queue.compute_resources.len())
        .sum();
    if compute_resource_count > limits.max_compute_resources_per_cluster {
        return limit_exceeded(format!(
            "Number of compute resources ({compute_resource_count}) exceeds maximum compute resources per cluster ({})",
            limits.max_compute_resources_per_cluster
        ));
    }
    let storage = count_storage(cluster, limits)?;

    let head_node_type = catalog.instance_type_info(&cluster.head_node.instance_type)?;
    let image_id = match &cluster.image.custom_ami {
        Some(image_id) => image_id.clone(),
        None => catalog.official_ami(cluster.image.os, head_node_type.architecture())?,
    };
    let head_subnet_id = cluster.head_node.networking.subnet_id.clone();
    let head_node = HeadNodeLayout {
        subnet: catalog.subnet_info(&head_subnet_id)?,
        subnet_id: head_subnet_id,
        role: cluster.head_node_role(),
        image_id,
        instance_type: head_node_type,
    };

    let mut availability_zones = vec![(
        head_node.subnet.availability_zone.clone(),
        head_node.subnet_id.clone(),
    )];
    let queues = queues
        .iter()
        .map(|queue| {
            for subnet_id in &queue.networking.subnet_ids {
                let subnet = catalog.subnet_info(subnet_id)?;
                if !availability_zones
                    .iter()
                    .any(|(zone, _)| *zone == subnet.availability_zone)
                {
                    availability_zones.push((subnet.availability_zone, subnet_id.clone()));
                }
            }
            walk_queue(cluster, queue, catalog, &head_node)
        })
        .collect::<crate::Result<Vec<_>>>()?;

    log::debug!(
        "Cluster has {} queue(s) with {compute_resource_count} compute resource(s) in {} availability zone(s)",
        queues.len(),
        availability_zones.len()
    );

    Ok(ClusterLayout {
        cluster,
        head_node,
        queues,
        availability_zones,
        storage,
    })
}

fn walk_queue<'a>(
    cluster: &ClusterModel,
    queue: &'a Queue,
    catalog: &dyn Ec2Catalog,
    head_node: &HeadNodeLayout,
) -> crate::Result<QueueLayout<'a>> {
    let compute_resources = queue
        .compute_resources
        .iter()
        .map(|compute_resource| {
            // AWS Batch accepts instance families and `optimal`, which are not instance types.
            let instance_types = if cluster.scheduler_kind() == SchedulerKind::AwsBatch {
                vec![]
            } else {
                compute_resource
                    .instance_types
                    .instance_types()
                    .iter()
                    .map(|instance_type| catalog.instance_type_info(instance_type))
                    .collect::<crate::Result<Vec<_>>>()?
            };
            Ok(ComputeResourceLayout {
                compute_resource,
                shape: ComputeResourceShape::of(compute_resource, &instance_types),
                instance_types,
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    let image_id = match queue.custom_ami().or(cluster.image.custom_ami.as_deref()) {
        Some(image_id) => image_id.to_string(),
        None => {
            let architecture = compute_resources
                .iter()
                .flat_map(|compute_resource| compute_resource.instance_types.first())
                .map(InstanceTypeInfo::architecture)
                .next()
                .unwrap_or_else(|| head_node.instance_type.architecture());
            if architecture == head_node.instance_type.architecture() {
                head_node.image_id.clone()
            } else {
                catalog.official_ami(cluster.image.os, architecture)?
            }
        }
    };

    Ok(QueueLayout {
        queue,
        role: queue.role(),
        image_id,
        compute_resources,
    })
}

fn count_storage(cluster: &ClusterModel, limits: &ResourceLimits) -> crate::Result<StorageCounts> {
    let mut counts = StorageCounts::default();
    for kind in [
        StorageKind::Ebs,
        StorageKind::Raid,
        StorageKind::Efs,
        StorageKind::Fsx,
    ] {
        let (existing, new): (Vec<_>, Vec<_>) = cluster
            .shared_storage
            .iter()
            .filter(|storage| storage.kind() == kind)
            .partition(|storage| storage.is_existing());

        let (max_new, max_existing) = match kind {
            StorageKind::Ebs => (limits.max_ebs_volumes, limits.max_ebs_volumes),
            kind => (max_new_storage_count(kind), max_existing_storage_count(kind)),
        };
        if new.len() > max_new {
            return limit_exceeded(format!(
                "Number of new {kind} shared storage ({}) exceeds the maximum of {max_new}",
                new.len()
            ));
        }
        if existing.len() > max_existing {
            return limit_exceeded(format!(
                "Number of existing {kind} shared storage ({}) exceeds the maximum of {max_existing}",
                existing.len()
            ));
        }
        if kind == StorageKind::Ebs && new.len() + existing.len() > limits.max_ebs_volumes {
            return limit_exceeded(format!(
                "Number of EBS volumes ({}) exceeds the maximum of {}",
                new.len() + existing.len(),
                limits.max_ebs_volumes
            ));
        }

        let count = new.len() + existing.len();
        match kind {
            StorageKind::Ebs => counts.ebs = count,
            StorageKind::Raid => {
                counts.raid = count;
                counts.raid_volumes = new
                    .iter()
                    .chain(existing.iter())
                    .map(|storage| match &storage.settings {
                        StorageSettings::Ebs(settings) => settings
                            .raid
                            .as_ref()
                            .map(|raid| raid.number_of_volumes as usize)
                            .unwrap_or(0),
                        _ => 0,
                    })
                    .sum();
            }
            StorageKind::Efs => counts.efs = count,
            StorageKind::Fsx => counts.fsx = count,
        }
    }
    Ok(counts)
}
