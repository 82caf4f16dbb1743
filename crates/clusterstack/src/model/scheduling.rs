use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Deserialize;

use crate::Error;
use crate::model::cluster::{CustomActions, Iam, RoleSource};

/// Scheduler family of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum SchedulerKind {
    #[serde(rename = "slurm")]
    Slurm,
    #[serde(rename = "awsbatch")]
    AwsBatch,
    #[serde(rename = "plugin")]
    Plugin,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Slurm => "slurm",
            SchedulerKind::AwsBatch => "awsbatch",
            SchedulerKind::Plugin => "plugin",
        }
    }
}

impl Display for SchedulerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SchedulingDef")]
pub struct Scheduling {
    pub settings: SchedulerSettings,
    pub queues: Vec<Queue>,
}

#[derive(Debug, Clone)]
pub enum SchedulerSettings {
    Slurm(SlurmSettings),
    AwsBatch,
    Plugin(PluginSettings),
}

impl SchedulerSettings {
    pub fn kind(&self) -> SchedulerKind {
        match self {
            SchedulerSettings::Slurm(_) => SchedulerKind::Slurm,
            SchedulerSettings::AwsBatch => SchedulerKind::AwsBatch,
            SchedulerSettings::Plugin(_) => SchedulerKind::Plugin,
        }
    }

    pub fn slurm(&self) -> Option<&SlurmSettings> {
        match self {
            SchedulerSettings::Slurm(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn plugin(&self) -> Option<&PluginSettings> {
        match self {
            SchedulerSettings::Plugin(settings) => Some(settings),
            _ => None,
        }
    }
}

/// `Scheduling` section as it is written in the configuration file. Settings and queue lists are
/// keyed by the scheduler family.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SchedulingDef {
    scheduler: SchedulerKind,
    #[serde(default)]
    scheduler_settings: Option<serde_yaml::Value>,
    #[serde(default)]
    slurm_queues: Vec<Queue>,
    #[serde(default)]
    aws_batch_queues: Vec<Queue>,
    #[serde(default)]
    scheduler_queues: Vec<Queue>,
}

impl TryFrom<SchedulingDef> for Scheduling {
    type Error = Error;

    fn try_from(def: SchedulingDef) -> Result<Self, Self::Error> {
        let SchedulingDef {
            scheduler,
            scheduler_settings,
            slurm_queues,
            aws_batch_queues,
            scheduler_queues,
        } = def;

        let (settings, queues, others) = match scheduler {
            SchedulerKind::Slurm => {
                let settings = match scheduler_settings {
                    Some(value) => serde_yaml::from_value(value)?,
                    None => SlurmSettings::default(),
                };
                (
                    SchedulerSettings::Slurm(settings),
                    slurm_queues,
                    [aws_batch_queues, scheduler_queues],
                )
            }
            SchedulerKind::AwsBatch => (
                SchedulerSettings::AwsBatch,
                aws_batch_queues,
                [slurm_queues, scheduler_queues],
            ),
            SchedulerKind::Plugin => {
                let settings = scheduler_settings.ok_or_else(|| {
                    Error::InvalidConfiguration(
                        "SchedulerSettings are required by the plugin scheduler".to_string(),
                    )
                })?;
                (
                    SchedulerSettings::Plugin(serde_yaml::from_value(settings)?),
                    scheduler_queues,
                    [slurm_queues, aws_batch_queues],
                )
            }
        };

        if queues.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "Scheduler {scheduler} requires at least one queue"
            )));
        }
        if others.iter().any(|queues| !queues.is_empty()) {
            return Err(Error::InvalidConfiguration(format!(
                "Only queues of scheduler {scheduler} can be defined"
            )));
        }
        Ok(Scheduling { settings, queues })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SlurmSettings {
    pub scaledown_idletime: Option<u32>,
    pub dns: Dns,
    pub database: Option<Database>,
}

impl SlurmSettings {
    /// A Route53 hosted zone is created with the cluster.
    pub fn is_managed_dns(&self) -> bool {
        !self.dns.disable_managed_dns && self.dns.hosted_zone_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Dns {
    pub disable_managed_dns: bool,
    pub hosted_zone_id: Option<String>,
    pub use_ec2_hostnames: bool,
}

/// Slurm accounting database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Database {
    pub uri: String,
    pub user_name: String,
    pub password_secret_arn: String,
    #[serde(default)]
    pub storage_parameters: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginSettings {
    pub scheduler_definition: SchedulerDefinition,
}

impl PluginSettings {
    /// Location of the template provisioning the plugin's own infrastructure, if any.
    pub fn cluster_infrastructure_template(&self) -> Option<&str> {
        self.scheduler_definition
            .cluster_infrastructure
            .as_ref()
            .map(|infrastructure| infrastructure.cloud_formation.template.as_str())
            .filter(|template| !template.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchedulerDefinition {
    pub plugin_interface_version: String,
    #[serde(default)]
    pub cluster_infrastructure: Option<ClusterInfrastructure>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterInfrastructure {
    pub cloud_formation: CloudFormationTemplate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudFormationTemplate {
    pub template: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum CapacityType {
    #[default]
    #[serde(rename = "ONDEMAND")]
    OnDemand,
    #[serde(rename = "SPOT")]
    Spot,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Queue {
    pub name: String,
    #[serde(default)]
    pub capacity_type: CapacityType,
    pub networking: QueueNetworking,
    pub compute_resources: Vec<ComputeResource>,
    #[serde(default)]
    pub iam: Option<Iam>,
    #[serde(default)]
    pub custom_actions: Option<CustomActions>,
    #[serde(default)]
    pub image: Option<QueueImage>,
}

impl Queue {
    pub fn role(&self) -> RoleSource {
        RoleSource::of(self.iam.as_ref())
    }

    pub fn custom_ami(&self) -> Option<&str> {
        self.image.as_ref().and_then(|image| image.custom_ami.as_deref())
    }

    /// A placement group has to be created for the queue.
    pub fn is_managed_placement_group(&self) -> bool {
        self.networking
            .placement_group
            .as_ref()
            .is_some_and(|group| group.enabled && group.id.is_none())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueNetworking {
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_groups: Option<Vec<String>>,
    #[serde(default)]
    pub additional_security_groups: Vec<String>,
    #[serde(default)]
    pub assign_public_ip: Option<bool>,
    #[serde(default)]
    pub placement_group: Option<PlacementGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlacementGroup {
    pub enabled: bool,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueueImage {
    pub custom_ami: Option<String>,
}

/// Instance types a compute resource launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceTypeSelector {
    /// A single pinned instance type.
    Single(String),
    /// A list of interchangeable instance types.
    Flexible(Vec<String>),
}

impl InstanceTypeSelector {
    pub fn instance_types(&self) -> &[String] {
        match self {
            InstanceTypeSelector::Single(instance_type) => std::slice::from_ref(instance_type),
            InstanceTypeSelector::Flexible(instance_types) => instance_types,
        }
    }

    pub fn pinned(&self) -> Option<&str> {
        match self {
            InstanceTypeSelector::Single(instance_type) => Some(instance_type),
            InstanceTypeSelector::Flexible(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Efa {
    pub enabled: bool,
    pub gdr_support: bool,
}

/// vCPU bounds of an AWS Batch compute environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcpuRange {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ComputeResourceDef")]
pub struct ComputeResource {
    pub name: String,
    pub instance_types: InstanceTypeSelector,
    pub min_count: u32,
    pub max_count: u32,
    pub spot_price: Option<f64>,
    pub efa: Efa,
    pub disable_simultaneous_multithreading: bool,
    pub vcpus: VcpuRange,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlexibleInstance {
    instance_type: String,
}

fn default_max_count() -> u32 {
    10
}

fn default_max_vcpus() -> u32 {
    10
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ComputeResourceDef {
    name: String,
    #[serde(default)]
    instance_type: Option<String>,
    #[serde(default)]
    instances: Vec<FlexibleInstance>,
    #[serde(default)]
    instance_types: Vec<String>,
    #[serde(default)]
    min_count: u32,
    #[serde(default = "default_max_count")]
    max_count: u32,
    #[serde(default)]
    spot_price: Option<f64>,
    #[serde(default)]
    efa: Efa,
    #[serde(default)]
    disable_simultaneous_multithreading: bool,
    #[serde(default, rename = "MinvCpus")]
    min_vcpus: u32,
    #[serde(default, rename = "DesiredvCpus")]
    desired_vcpus: u32,
    #[serde(default = "default_max_vcpus", rename = "MaxvCpus")]
    max_vcpus: u32,
}

impl TryFrom<ComputeResourceDef> for ComputeResource {
    type Error = Error;

    fn try_from(def: ComputeResourceDef) -> Result<Self, Self::Error> {
        let instance_types = match (def.instance_type, def.instances, def.instance_types) {
            (Some(instance_type), instances, types) if instances.is_empty() && types.is_empty() => {
                InstanceTypeSelector::Single(instance_type)
            }
            (None, instances, types) if !instances.is_empty() && types.is_empty() => {
                InstanceTypeSelector::Flexible(
                    instances
                        .into_iter()
                        .map(|instance| instance.instance_type)
                        .collect(),
                )
            }
            (None, instances, types) if instances.is_empty() && !types.is_empty() => {
                InstanceTypeSelector::Flexible(types)
            }
            _ => {
                return Err(Error::InvalidConfiguration(format!(
                    "Compute resource {} has to define exactly one of InstanceType, Instances or InstanceTypes",
                    def.name
                )));
            }
        };

        Ok(ComputeResource {
            name: def.name,
            instance_types,
            min_count: def.min_count,
            max_count: def.max_count,
            spot_price: def.spot_price,
            efa: def.efa,
            disable_simultaneous_multithreading: def.disable_simultaneous_multithreading,
            vcpus: VcpuRange {
                min: def.min_vcpus,
                desired: def.desired_vcpus,
                max: def.max_vcpus,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn yaml<T: serde::de::DeserializeOwned>(text: &str) -> crate::Result<T> {
        Ok(serde_yaml::from_str(text)?)
    }

    const QUEUE: &str = indoc! {"
        - Name: q
          Networking:
            SubnetIds: [subnet-1]
          ComputeResources:
            - Name: cr
              InstanceType: c5.xlarge
    "};

    #[test]
    fn single_instance_type() {
        let resource: ComputeResource = yaml("Name: cr1\nInstanceType: c5.xlarge\n").unwrap();
        assert_eq!(
            resource.instance_types,
            InstanceTypeSelector::Single("c5.xlarge".to_string())
        );
        assert_eq!(resource.max_count, 10);
    }

    #[test]
    fn flexible_instance_types() {
        let resource: ComputeResource = yaml(indoc! {"
            Name: cr1
            Instances:
              - InstanceType: c4.xlarge
              - InstanceType: t2.micro
        "})
        .unwrap();
        assert_eq!(resource.instance_types.pinned(), None);
        assert_eq!(resource.instance_types.instance_types().len(), 2);
    }

    #[test]
    fn instance_type_is_required() {
        assert!(yaml::<ComputeResource>("Name: cr1\n").is_err());
        assert!(yaml::<ComputeResource>(indoc! {"
            Name: cr1
            InstanceType: a
            Instances:
              - InstanceType: b
        "})
        .is_err());
    }

    #[test]
    fn batch_vcpus() {
        let resource: ComputeResource = yaml(indoc! {"
            Name: cr1
            InstanceTypes: [optimal]
            MinvCpus: 1
            DesiredvCpus: 2
            MaxvCpus: 40
        "})
        .unwrap();
        assert_eq!(
            resource.vcpus,
            VcpuRange {
                min: 1,
                desired: 2,
                max: 40
            }
        );
    }

    #[test]
    fn plugin_requires_settings() {
        let result = yaml::<Scheduling>(&format!("Scheduler: plugin\nSchedulerQueues:\n{QUEUE}"));
        assert!(result.is_err());
    }

    #[test]
    fn queues_of_other_family_are_rejected() {
        let result = yaml::<Scheduling>(&format!(
            "Scheduler: slurm\nSlurmQueues:\n{QUEUE}SchedulerQueues:\n{QUEUE}"
        ));
        assert!(result.is_err());
    }

    #[test]
    fn slurm_settings_default() {
        let scheduling = yaml::<Scheduling>(&format!("Scheduler: slurm\nSlurmQueues:\n{QUEUE}")).unwrap();
        let settings = scheduling.settings.slurm().unwrap();
        assert!(settings.is_managed_dns());
        assert!(settings.database.is_none());
        assert_eq!(scheduling.queues[0].compute_resources[0].name, "cr");
    }
}
