use stackdoc::Template;

use crate::CLUSTERSTACK_VERSION;
use crate::aws::{ClusterBucket, Ec2Catalog};
use crate::common::clock::Clock;
use crate::limits::ResourceLimits;
use crate::model::ClusterModel;
use crate::templates::StackContext;
use crate::templates::awsbatch::add_batch_resources;
use crate::templates::compute_fleet::{FleetOutputs, add_compute_fleet};
use crate::templates::dna::BootstrapDescriptor;
use crate::templates::emitter::{EmittedStack, emit};
use crate::templates::head_node::add_head_node;
use crate::templates::iam::{add_node_iam, head_node_statements};
use crate::templates::lambda::add_cleanup_functions;
use crate::templates::monitoring::{add_alarms_and_dashboard, add_log_group};
use crate::templates::naming::HEAD_NODE;
use crate::templates::networking::add_security_groups;
use crate::templates::partition::partition_queues;
use crate::templates::scheduler_plugin::add_scheduler_plugin_stack;
use crate::templates::scheduler_resources::add_scheduler_resources;
use crate::templates::storage::add_shared_storage;
use crate::templates::walker::walk_cluster;
use crate::validators::database::{DatabaseUriValidator, SlurmdbdStorageParametersValidator};
use crate::validators::{Validator, check_failures};

/// Compiles cluster models into the documents of a cluster stack.
///
/// A builder holds no state between builds, building the same model twice with the same clock
/// gives identical documents.
pub struct ClusterStackBuilder<'a> {
    catalog: &'a dyn Ec2Catalog,
    clock: &'a dyn Clock,
    limits: ResourceLimits,
}

impl<'a> ClusterStackBuilder<'a> {
    pub fn new(catalog: &'a dyn Ec2Catalog, clock: &'a dyn Clock) -> Self {
        Self {
            catalog,
            clock,
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build_cluster_template(
        &self,
        cluster: &ClusterModel,
        bucket: &ClusterBucket,
        stack_name: &str,
    ) -> crate::Result<EmittedStack> {
        validate_database(cluster)?;
        let layout = walk_cluster(cluster, self.catalog, &self.limits)?;
        let ctx = StackContext {
            cluster,
            layout: &layout,
            bucket,
            stack_name,
            timestamp: self.clock.now(),
            limits: &self.limits,
        };
        let partitions = if ctx.has_compute_fleet() {
            partition_queues(&layout, ctx.limits)?
        } else {
            vec![]
        };
        log::info!(
            "Building cluster {stack_name} ({}): {} queue(s) in {} nested document(s)",
            ctx.kind(),
            layout.queues.len(),
            partitions.len()
        );

        let mut root = Template::new(format!(
            "Cluster {stack_name}, generated by clusterstack {CLUSTERSTACK_VERSION}"
        ));
        add_security_groups(&mut root, &ctx)?;
        let head_node_iam = add_node_iam(
            &mut root,
            HEAD_NODE,
            &layout.head_node.role,
            head_node_statements(&ctx),
            cluster
                .head_node
                .iam
                .as_ref()
                .map(|iam| iam.additional_iam_policies.as_slice())
                .unwrap_or_default(),
        )?;
        let storage = add_shared_storage(&mut root, &ctx)?;
        add_scheduler_resources(&mut root, &ctx)?;
        add_cleanup_functions(&mut root, &ctx)?;
        add_log_group(&mut root, &ctx)?;

        let descriptor = BootstrapDescriptor::build(&ctx, &storage);
        let (nested, fleet) = if ctx.has_compute_fleet() {
            add_compute_fleet(&mut root, &ctx, &partitions, &descriptor)?
        } else {
            add_batch_resources(&mut root, &ctx, &descriptor)?;
            (vec![], FleetOutputs::default())
        };
        add_scheduler_plugin_stack(&mut root, &ctx, &head_node_iam, &fleet)?;
        add_head_node(&mut root, &ctx, &head_node_iam, &descriptor, &fleet)?;
        add_alarms_and_dashboard(&mut root, &ctx)?;

        emit(root, nested, &self.limits)
    }
}

/// The accounting database settings are copied into the bootstrap descriptor, a malformed URI
/// aborts the build.
fn validate_database(cluster: &ClusterModel) -> crate::Result<()> {
    let Some(database) = cluster
        .scheduling
        .settings
        .slurm()
        .and_then(|slurm| slurm.database.as_ref())
    else {
        return Ok(());
    };
    let mut failures = DatabaseUriValidator.validate(&database.uri);
    failures.extend(
        SlurmdbdStorageParametersValidator
            .validate(&database.storage_parameters.clone().unwrap_or_default()),
    );
    check_failures(failures)
}
