//! Logical ids of generated resources.
//!
//! Ids of per-queue and per-compute-resource resources carry a hash suffix of the names they
//! are derived from, so they stay the same for an unchanged cluster model.

use chrono::{DateTime, Utc};
use stackdoc::ids::{create_hash_suffix, sanitize_logical_id};

use crate::common::clock::compact_timestamp;

pub const HEAD_NODE: &str = "HeadNode";
pub const HEAD_NODE_LAUNCH_TEMPLATE: &str = "HeadNodeLaunchTemplate";
pub const HEAD_NODE_SECURITY_GROUP: &str = "HeadNodeSecurityGroup";
pub const COMPUTE_SECURITY_GROUP: &str = "ComputeSecurityGroup";
pub const DYNAMODB_TABLE: &str = "DynamoDBTable";
pub const SLURM_DYNAMODB_TABLE: &str = "SlurmDynamoDBTable";
pub const HOSTED_ZONE: &str = "Route53HostedZone";
pub const CLUSTER_DNS_DOMAIN: &str = "ClusterDNSDomain";
pub const LOG_GROUP: &str = "CloudWatchLogGroup";
pub const DASHBOARD: &str = "CloudwatchDashboard";
pub const SCHEDULER_PLUGIN_STACK: &str = "SchedulerPluginStack";

pub fn launch_template_id(queue: &str, compute_resource: &str) -> String {
    format!(
        "LaunchTemplate{}",
        create_hash_suffix(&format!("{queue}\t{compute_resource}"))
    )
}

/// `node` is a queue name or [`HEAD_NODE`].
pub fn role_id(node: &str) -> String {
    format!("Role{}", create_hash_suffix(node))
}

pub fn policies_id(node: &str) -> String {
    format!("ParallelClusterPolicies{}", create_hash_suffix(node))
}

pub fn instance_profile_id(node: &str) -> String {
    format!("InstanceProfile{}", create_hash_suffix(node))
}

pub fn placement_group_id(queue: &str) -> String {
    format!("PlacementGroup{}", create_hash_suffix(queue))
}

pub fn wait_condition_id(timestamp: DateTime<Utc>) -> String {
    format!("HeadNodeWaitCondition{}", compact_timestamp(timestamp))
}

pub fn wait_condition_handle_id(timestamp: DateTime<Utc>) -> String {
    format!("HeadNodeWaitConditionHandle{}", compact_timestamp(timestamp))
}

/// Key of an output of a nested stack, unique across all nested stacks of the cluster.
pub fn nested_output_key(
    stack_name: &str,
    partition_name: &str,
    logical_id: &str,
    attribute: &str,
) -> String {
    format!(
        "{}{partition_name}{logical_id}{attribute}",
        sanitize_logical_id(stack_name)
    )
}

/// `kind` is one of `EBS`, `RAID`, `EFS` or `FSX`.
pub fn storage_id(kind: &str, name: &str) -> String {
    format!("{kind}{}", create_hash_suffix(name))
}

pub fn mount_target_id(storage_name: &str, availability_zone: &str) -> String {
    format!(
        "EFSMountTarget{}",
        create_hash_suffix(&format!("{storage_name}\t{availability_zone}"))
    )
}
