//! Bootstrap descriptor ("dna") of the cluster nodes.
//!
//! The descriptor is built once per build from three layers, later layers override earlier
//! ones: platform defaults, settings of the scheduler family and settings of the user. Values
//! referencing other resources are stored as tokens and become a `Fn::Join` when the descriptor
//! is rendered into a document.

use itertools::Itertools;
use serde_json::{Value, json};
use stackdoc::intrinsic::{REGION, STACK_ID, is_intrinsic, reference};
use stackdoc::{Map, TokenMap};

use crate::common::defaults::{DEFAULT_BOOTSTRAP_TIMEOUT_SECS, DEFAULT_EPHEMERAL_DIR};
use crate::model::{ClusterModel, SchedulerKind};
use crate::templates::naming::{
    CLUSTER_DNS_DOMAIN, DYNAMODB_TABLE, HOSTED_ZONE, SCHEDULER_PLUGIN_STACK, SLURM_DYNAMODB_TABLE,
};
use crate::templates::storage::{MountRef, SharedStorageRefs};
use crate::templates::{StackContext, comma_separated};
use crate::validators::database::uri_with_default_port;

const DCV_PORT: u16 = 8443;

/// Settings only the head node receives. The plugin stack depends on the compute fleet, so
/// compute nodes can not reference it.
const HEAD_NODE_ONLY_SETTINGS: [&str; 1] = ["scheduler_plugin_substack_arn"];

type Settings = Vec<(&'static str, Value)>;

/// Bootstrap timeout of the head node, also the timeout of its wait condition.
pub fn head_node_bootstrap_timeout(cluster: &ClusterModel) -> u32 {
    cluster
        .head_node_bootstrap_timeout()
        .unwrap_or(DEFAULT_BOOTSTRAP_TIMEOUT_SECS)
}

/// Escapes the placeholder prefix in literal settings, which may hold any user text.
fn escape_literals(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(TokenMap::escape(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(escape_literals).collect()),
        value => value,
    }
}

fn flag(value: bool) -> Value {
    json!(value.to_string())
}

fn platform_settings(ctx: &StackContext, storage: &SharedStorageRefs) -> Settings {
    let cluster = ctx.cluster;
    let mut imds_allowed_users = vec!["root", "pcluster-admin"];
    if cluster.is_dcv_enabled() {
        imds_allowed_users.push("dcvextauth");
    }
    let dirs = |mounts: &[MountRef]| json!(mounts.iter().map(|mount| &mount.mount_dir).join(","));
    let raid = storage.raid.as_ref();

    vec![
        ("base_os", json!(cluster.image.os.as_str())),
        ("cluster_config_s3_key", json!(ctx.bucket.config_key())),
        ("cluster_name", json!(ctx.stack_name)),
        ("cluster_s3_bucket", json!(ctx.bucket.name)),
        ("cluster_user", json!(cluster.image.os.default_user())),
        (
            "compute_node_bootstrap_timeout",
            json!(DEFAULT_BOOTSTRAP_TIMEOUT_SECS),
        ),
        (
            "custom_awsbatchcli_package",
            json!(cluster.dev_settings.aws_batch_cli_package.as_deref().unwrap_or("")),
        ),
        (
            "custom_node_package",
            json!(cluster.dev_settings.node_package.as_deref().unwrap_or("")),
        ),
        ("cw_logging_enabled", flag(cluster.is_cw_logging_enabled())),
        (
            "dcv_enabled",
            json!(if cluster.is_dcv_enabled() { "head_node" } else { "false" }),
        ),
        ("dcv_port", json!(DCV_PORT.to_string())),
        ("ebs_shared_dirs", dirs(&storage.ebs)),
        (
            "efs_fs_ids",
            comma_separated(storage.efs.iter().map(|efs| efs.id.clone()).collect()),
        ),
        ("efs_shared_dirs", dirs(&storage.efs)),
        (
            "enable_intel_hpc_platform",
            flag(cluster.is_intel_hpc_platform_enabled()),
        ),
        (
            "ephemeral_dir",
            json!(
                cluster
                    .head_node
                    .local_storage
                    .ephemeral_volume
                    .as_ref()
                    .and_then(|volume| volume.mount_dir.as_deref())
                    .unwrap_or(DEFAULT_EPHEMERAL_DIR)
            ),
        ),
        (
            "fsx_dns_names",
            comma_separated(storage.fsx.iter().map(|fsx| fsx.dns_name.clone()).collect()),
        ),
        (
            "fsx_fs_ids",
            comma_separated(storage.fsx.iter().map(|fsx| fsx.id.clone()).collect()),
        ),
        (
            "fsx_mount_names",
            comma_separated(storage.fsx.iter().map(|fsx| fsx.mount_name.clone()).collect()),
        ),
        (
            "fsx_shared_dirs",
            json!(storage.fsx.iter().map(|fsx| &fsx.mount_dir).join(",")),
        ),
        ("head_node_imds_allowed_users", json!(imds_allowed_users)),
        ("head_node_imds_secured", flag(true)),
        ("log_group_name", json!(ctx.log_group_name())),
        ("log_rotation_enabled", flag(cluster.is_log_rotation_enabled())),
        ("node_type", json!("HeadNode")),
        ("proxy", json!(cluster.proxy())),
        (
            "raid_shared_dir",
            json!(raid.map(|raid| raid.mount_dir.as_str()).unwrap_or("")),
        ),
        (
            "raid_type",
            json!(raid.map(|raid| raid.raid_type.to_string()).unwrap_or_default()),
        ),
        (
            "raid_vol_ids",
            comma_separated(raid.map(|raid| raid.volume_ids.clone()).unwrap_or_default()),
        ),
        ("region", reference(REGION)),
        ("scheduler", json!(ctx.kind().as_str())),
        ("stack_arn", reference(STACK_ID)),
        ("stack_name", json!(ctx.stack_name)),
        (
            "volume",
            comma_separated(storage.ebs.iter().map(|ebs| ebs.id.clone()).collect()),
        ),
    ]
}

/// Settings every scheduler family adds on top of the platform defaults.
fn family_settings(ctx: &StackContext) -> Settings {
    match ctx.kind() {
        SchedulerKind::Slurm => {
            let mut settings = vec![
                ("ddb_table", reference(DYNAMODB_TABLE)),
                (
                    "dns_domain",
                    if ctx.has_cluster_dns_domain() {
                        reference(CLUSTER_DNS_DOMAIN)
                    } else {
                        json!("")
                    },
                ),
                ("hosted_zone", hosted_zone(ctx)),
                ("slurm_ddb_table", reference(SLURM_DYNAMODB_TABLE)),
                (
                    "use_private_hostname",
                    flag(
                        ctx.cluster
                            .scheduling
                            .settings
                            .slurm()
                            .is_some_and(|slurm| slurm.dns.use_ec2_hostnames),
                    ),
                ),
            ];
            settings.extend(database_settings(ctx));
            settings
        }
        SchedulerKind::Plugin => vec![
            ("ddb_table", reference(DYNAMODB_TABLE)),
            (
                "scheduler_plugin_substack_arn",
                if ctx.has_plugin_substack() {
                    reference(SCHEDULER_PLUGIN_STACK)
                } else {
                    json!("")
                },
            ),
        ],
        SchedulerKind::AwsBatch => vec![],
    }
}

fn hosted_zone(ctx: &StackContext) -> Value {
    let Some(slurm) = ctx.cluster.scheduling.settings.slurm() else {
        return json!("");
    };
    if ctx.has_managed_hosted_zone() {
        reference(HOSTED_ZONE)
    } else if slurm.dns.disable_managed_dns {
        json!("")
    } else {
        json!(slurm.dns.hosted_zone_id.as_deref().unwrap_or(""))
    }
}

/// Accounting database settings, only present when a database is configured.
fn database_settings(ctx: &StackContext) -> Settings {
    let Some(database) = ctx
        .cluster
        .scheduling
        .settings
        .slurm()
        .and_then(|slurm| slurm.database.as_ref())
    else {
        return vec![];
    };
    let storage_parameters = database
        .storage_parameters
        .iter()
        .flatten()
        .map(|(name, value)| format!("{name}={value}"))
        .join(",");
    vec![
        ("database_uri", json!(uri_with_default_port(&database.uri))),
        ("database_user_name", json!(database.user_name)),
        (
            "database_password_secret_arn",
            json!(database.password_secret_arn),
        ),
        ("database_storage_parameters", json!(storage_parameters)),
    ]
}

/// Values configured by the user. Custom actions are run by the nodes and do not alter the
/// descriptor.
fn user_settings(cluster: &ClusterModel) -> Settings {
    let mut settings = vec![];
    if let Some(timeout) = cluster.compute_node_bootstrap_timeout() {
        settings.push(("compute_node_bootstrap_timeout", json!(timeout)));
    }
    if let Some(secured) = cluster.head_node.imds.secured {
        settings.push(("head_node_imds_secured", flag(secured)));
    }
    settings
}

#[derive(Debug, Clone)]
pub struct BootstrapDescriptor {
    settings: Map<String, Value>,
    tokens: TokenMap,
}

impl BootstrapDescriptor {
    pub fn build(ctx: &StackContext, storage: &SharedStorageRefs) -> Self {
        let mut descriptor = Self {
            settings: Map::new(),
            tokens: TokenMap::new(),
        };
        let layers = [
            platform_settings(ctx, storage),
            family_settings(ctx),
            user_settings(ctx.cluster),
        ];
        for (key, value) in layers.into_iter().flatten() {
            descriptor.set(key, value);
        }
        log::debug!(
            "Bootstrap descriptor has {} settings referencing {} resources",
            descriptor.settings.len(),
            descriptor.tokens.len()
        );
        descriptor
    }

    fn set(&mut self, key: &str, value: Value) {
        let value = if is_intrinsic(&value) {
            Value::String(self.tokens.tokenize(value))
        } else {
            escape_literals(value)
        };
        self.settings.insert(key.to_string(), value);
    }

    /// Value of a setting, references are returned as tokens.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Descriptor text with `overrides` applied, still containing tokens.
    fn text(&self, overrides: &[(&str, &str)], excluded: &[&str]) -> crate::Result<String> {
        let mut settings = self.settings.clone();
        settings.retain(|key, _| !excluded.contains(&key.as_str()));
        for (key, value) in overrides {
            settings.insert(key.to_string(), json!(TokenMap::escape(value)));
        }
        Ok(serde_json::to_string_pretty(&json!({ "cluster": settings }))?)
    }

    /// Replaces the tokens of a text containing the descriptor.
    pub fn resolve(&self, text: &str) -> crate::Result<Value> {
        Ok(self.tokens.resolve(text)?)
    }

    pub fn render_head_node(&self) -> crate::Result<Value> {
        self.resolve(&self.text(&[], &[])?)
    }

    /// Descriptor of a compute node of `compute_resource` in `queue`, still containing tokens.
    pub fn compute_node_text(&self, queue: &str, compute_resource: &str) -> crate::Result<String> {
        self.text(
            &[
                ("node_type", "ComputeFleet"),
                ("scheduler_queue_name", queue),
                ("scheduler_compute_resource_name", compute_resource),
            ],
            &HEAD_NODE_ONLY_SETTINGS,
        )
    }

    pub fn render_compute_node(&self, queue: &str, compute_resource: &str) -> crate::Result<Value> {
        self.resolve(&self.compute_node_text(queue, compute_resource)?)
    }
}
