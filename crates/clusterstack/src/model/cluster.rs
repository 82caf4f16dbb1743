use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::common::defaults::DEFAULT_PROXY;
use crate::model::scheduling::{SchedulerKind, Scheduling};
use crate::model::storage::SharedStorage;

/// Validated cluster configuration.
///
/// The model is read only during a build. Keys follow the PascalCase layout of the cluster
/// configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterModel {
    pub image: Image,
    pub head_node: HeadNode,
    pub scheduling: Scheduling,
    #[serde(default)]
    pub shared_storage: Vec<SharedStorage>,
    #[serde(default)]
    pub monitoring: Monitoring,
    #[serde(default)]
    pub imds: Imds,
    #[serde(default)]
    pub deployment_settings: DeploymentSettings,
    #[serde(default)]
    pub additional_packages: AdditionalPackages,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub dev_settings: DevSettings,
}

impl ClusterModel {
    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.scheduling.settings.kind()
    }

    pub fn head_node_role(&self) -> RoleSource {
        RoleSource::of(self.head_node.iam.as_ref())
    }

    pub fn head_node_imds_secured(&self) -> bool {
        self.head_node.imds.secured.unwrap_or(true)
    }

    pub fn is_cw_logging_enabled(&self) -> bool {
        self.monitoring.logs.cloud_watch.enabled
    }

    pub fn is_cw_dashboard_enabled(&self) -> bool {
        self.monitoring.dashboards.cloud_watch.enabled
    }

    pub fn is_log_rotation_enabled(&self) -> bool {
        self.monitoring.logs.rotation.enabled
    }

    pub fn is_dcv_enabled(&self) -> bool {
        self.head_node.dcv.as_ref().is_some_and(|dcv| dcv.enabled)
    }

    pub fn is_intel_hpc_platform_enabled(&self) -> bool {
        self.additional_packages
            .intel_software
            .as_ref()
            .is_some_and(|intel| intel.intel_hpc_platform)
    }

    pub fn proxy(&self) -> &str {
        self.head_node
            .networking
            .proxy
            .as_ref()
            .map(|proxy| proxy.http_proxy_address.as_str())
            .unwrap_or(DEFAULT_PROXY)
    }

    pub fn head_node_bootstrap_timeout(&self) -> Option<u32> {
        self.dev_settings
            .timeouts
            .as_ref()
            .and_then(|timeouts| timeouts.head_node_bootstrap_timeout)
    }

    pub fn compute_node_bootstrap_timeout(&self) -> Option<u32> {
        self.dev_settings
            .timeouts
            .as_ref()
            .and_then(|timeouts| timeouts.compute_node_bootstrap_timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Alinux2,
    Centos7,
    Ubuntu1804,
    Ubuntu2004,
    Rhel8,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Alinux2 => "alinux2",
            Os::Centos7 => "centos7",
            Os::Ubuntu1804 => "ubuntu1804",
            Os::Ubuntu2004 => "ubuntu2004",
            Os::Rhel8 => "rhel8",
        }
    }

    /// User created by the official image of the OS.
    pub fn default_user(&self) -> &'static str {
        match self {
            Os::Alinux2 | Os::Rhel8 => "ec2-user",
            Os::Centos7 => "centos",
            Os::Ubuntu1804 | Os::Ubuntu2004 => "ubuntu",
        }
    }

    /// Device of the root volume of the official image.
    pub fn root_device_name(&self) -> &'static str {
        match self {
            Os::Alinux2 => "/dev/xvda",
            Os::Centos7 | Os::Ubuntu1804 | Os::Ubuntu2004 | Os::Rhel8 => "/dev/sda1",
        }
    }
}

impl Display for Os {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    pub os: Os,
    #[serde(default)]
    pub custom_ami: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadNode {
    pub instance_type: String,
    pub networking: HeadNodeNetworking,
    #[serde(default)]
    pub ssh: Option<Ssh>,
    #[serde(default)]
    pub local_storage: LocalStorage,
    #[serde(default)]
    pub iam: Option<Iam>,
    #[serde(default)]
    pub imds: NodeImds,
    #[serde(default)]
    pub custom_actions: Option<CustomActions>,
    #[serde(default)]
    pub dcv: Option<Dcv>,
    #[serde(default)]
    pub disable_simultaneous_multithreading: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeadNodeNetworking {
    pub subnet_id: String,
    #[serde(default)]
    pub security_groups: Option<Vec<String>>,
    #[serde(default)]
    pub additional_security_groups: Vec<String>,
    #[serde(default)]
    pub proxy: Option<Proxy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Proxy {
    pub http_proxy_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ssh {
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub allowed_ips: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LocalStorage {
    pub root_volume: RootVolume,
    pub ephemeral_volume: Option<EphemeralVolume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RootVolume {
    pub size: Option<u32>,
    pub encrypted: Option<bool>,
    pub volume_type: Option<String>,
    pub delete_on_termination: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EphemeralVolume {
    pub mount_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeImds {
    pub secured: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dcv {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CustomActions {
    pub on_node_start: Option<CustomAction>,
    pub on_node_configured: Option<CustomAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomAction {
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Iam {
    pub instance_role: Option<String>,
    pub instance_profile: Option<String>,
    pub additional_iam_policies: Vec<IamPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamPolicy {
    pub policy: String,
}

/// Who provides the IAM identity of a node class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSource {
    /// Role, policies and instance profile are created with the cluster.
    Managed,
    /// Role ARN supplied by the user, only the instance profile is created.
    InstanceRole(String),
    /// Instance profile ARN supplied by the user.
    InstanceProfile(String),
}

impl RoleSource {
    pub fn of(iam: Option<&Iam>) -> Self {
        match iam {
            Some(Iam {
                instance_profile: Some(profile),
                ..
            }) => RoleSource::InstanceProfile(profile.clone()),
            Some(Iam {
                instance_role: Some(role),
                ..
            }) => RoleSource::InstanceRole(role.clone()),
            _ => RoleSource::Managed,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, RoleSource::Managed)
    }
}

/// `arn:aws:iam::123456789012:role/path/name` -> `name`
pub fn resource_name_from_arn(arn: &str) -> &str {
    arn.rsplit(['/', ':']).next().unwrap_or(arn)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Monitoring {
    pub detailed_monitoring: bool,
    pub logs: Logs,
    pub dashboards: Dashboards,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Logs {
    pub cloud_watch: CloudWatchLogs,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CloudWatchLogs {
    pub enabled: bool,
    pub retention_in_days: Option<u32>,
    pub deletion_policy: Option<String>,
}

impl Default for CloudWatchLogs {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_in_days: None,
            deletion_policy: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LogRotation {
    pub enabled: bool,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Dashboards {
    pub cloud_watch: CloudWatchDashboard,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CloudWatchDashboard {
    pub enabled: bool,
}

impl Default for CloudWatchDashboard {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ImdsSupport {
    #[default]
    #[serde(rename = "v1.0")]
    V1,
    #[serde(rename = "v2.0")]
    V2,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Imds {
    pub imds_support: ImdsSupport,
}

impl Imds {
    /// Value of `MetadataOptions.HttpTokens` for every launch template of the cluster.
    pub fn http_tokens(&self) -> &'static str {
        match self.imds_support {
            ImdsSupport::V1 => "optional",
            ImdsSupport::V2 => "required",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentSettings {
    pub lambda_functions_vpc_config: Option<VpcConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcConfig {
    pub security_group_ids: Vec<String>,
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AdditionalPackages {
    pub intel_software: Option<IntelSoftware>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IntelSoftware {
    pub intel_hpc_platform: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DevSettings {
    pub timeouts: Option<Timeouts>,
    pub cookbook: Option<Cookbook>,
    pub node_package: Option<String>,
    pub aws_batch_cli_package: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Timeouts {
    pub head_node_bootstrap_timeout: Option<u32>,
    pub compute_node_bootstrap_timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Cookbook {
    pub chef_cookbook: Option<String>,
    pub extra_chef_attributes: Option<String>,
}
