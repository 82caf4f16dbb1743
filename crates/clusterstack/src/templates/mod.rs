//! Assembly of the cluster documents.
//!
//! A build walks the cluster model ([`walker`]), groups queues into nested documents
//! ([`partition`]), adds the resources of every part of the cluster to the root or nested
//! documents and finally serializes all of them ([`emitter`]).

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::aws::ClusterBucket;
use crate::common::clock::minute_timestamp;
use crate::limits::ResourceLimits;
use crate::model::{ClusterModel, SchedulerKind};
use crate::templates::walker::ClusterLayout;

pub mod awsbatch;
pub mod builder;
pub mod compute_fleet;
pub mod dna;
pub mod emitter;
pub mod head_node;
pub mod iam;
pub mod lambda;
pub mod launch_template;
pub mod monitoring;
pub mod naming;
pub mod networking;
pub mod partition;
pub mod scheduler_plugin;
pub mod scheduler_resources;
pub mod storage;
pub mod tags;
pub mod walker;

pub use builder::ClusterStackBuilder;
pub use emitter::{AssetMetadata, EmittedStack};

/// Inputs shared by every stage of a single build.
pub struct StackContext<'a> {
    pub cluster: &'a ClusterModel,
    pub layout: &'a ClusterLayout<'a>,
    pub bucket: &'a ClusterBucket,
    pub stack_name: &'a str,
    /// Time of the build, the only input that is not part of the cluster model.
    pub timestamp: DateTime<Utc>,
    pub limits: &'a ResourceLimits,
}

impl StackContext<'_> {
    pub fn kind(&self) -> SchedulerKind {
        self.cluster.scheduler_kind()
    }

    pub fn log_group_name(&self) -> String {
        format!(
            "/aws/parallelcluster/{}-{}",
            self.stack_name,
            minute_timestamp(self.timestamp)
        )
    }

    /// The scheduler plugin brings a template of its own infrastructure.
    pub fn has_plugin_substack(&self) -> bool {
        self.cluster
            .scheduling
            .settings
            .plugin()
            .and_then(|plugin| plugin.cluster_infrastructure_template())
            .is_some()
    }

    /// A hosted zone for the cluster DNS domain is created with the cluster.
    pub fn has_managed_hosted_zone(&self) -> bool {
        self.cluster
            .scheduling
            .settings
            .slurm()
            .is_some_and(|slurm| slurm.is_managed_dns())
    }

    /// The cluster DNS domain is resolved by the nodes.
    pub fn has_cluster_dns_domain(&self) -> bool {
        self.cluster
            .scheduling
            .settings
            .slurm()
            .is_some_and(|slurm| !slurm.dns.disable_managed_dns)
    }

    /// Compute fleet nested stacks exist for every scheduler that does not manage its own fleet.
    pub fn has_compute_fleet(&self) -> bool {
        self.kind() != SchedulerKind::AwsBatch
    }
}

/// Joins values with commas, as a plain string when none of them is an intrinsic.
pub(crate) fn comma_separated(values: Vec<Value>) -> Value {
    if values.iter().all(Value::is_string) {
        Value::String(
            values
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        )
    } else {
        stackdoc::intrinsic::join(",", values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackdoc::intrinsic::reference;

    #[test]
    fn comma_separated_values() {
        assert_eq!(comma_separated(vec![]), json!(""));
        assert_eq!(
            comma_separated(vec![json!("vol-1"), json!("vol-2")]),
            json!("vol-1,vol-2")
        );
        assert_eq!(
            comma_separated(vec![json!("vol-1"), reference("EBS1")]),
            json!({"Fn::Join": [",", ["vol-1", {"Ref": "EBS1"}]]})
        );
    }
}
