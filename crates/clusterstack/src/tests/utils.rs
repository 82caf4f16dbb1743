use std::fmt::Write;

use chrono::{TimeZone, Utc};
use derive_builder::Builder;
use serde_json::Value;
use stackdoc::{Resource, Template};

use crate::aws::catalog::{EbsInfo, EbsOptimizedSupport, NetworkInfo, ProcessorInfo, VCpuInfo};
use crate::aws::{ClusterBucket, InstanceTypeInfo, StaticCatalog};
use crate::common::clock::FixedClock;
use crate::limits::ResourceLimits;
use crate::model::cluster::Os;
use crate::model::{ClusterModel, parse_cluster_model};
use crate::templates::{ClusterStackBuilder, EmittedStack};

pub const BUCKET_NAME: &str = "parallelcluster-a69601b5ee1fc2f2-v1-do-not-delete";
pub const REGION: &str = "fake-region";
pub const ARTIFACT_DIR: &str = "parallelcluster/clusters/dummy-cluster-randomstring123";
pub const STACK_NAME: &str = "clustername";

pub const SLURM_REQUIRED: &str = include_str!("configs/slurm.required.yaml");
pub const SLURM_FULL: &str = include_str!("configs/slurm.full.yaml");
pub const AWSBATCH_SIMPLE: &str = include_str!("configs/awsbatch.simple.yaml");
pub const AWSBATCH_FULL: &str = include_str!("configs/awsbatch.full.yaml");
pub const PLUGIN_REQUIRED: &str = include_str!("configs/plugin.required.yaml");
pub const PLUGIN_FULL: &str = include_str!("configs/plugin.full.yaml");

fn instance_type(
    name: &str,
    vcpus: u32,
    network_cards: u32,
    ebs: EbsOptimizedSupport,
    efa: bool,
) -> InstanceTypeInfo {
    InstanceTypeInfo {
        instance_type: name.to_string(),
        v_cpu_info: VCpuInfo {
            default_v_cpus: vcpus,
            default_cores: Some(vcpus / 2),
            default_threads_per_core: Some(2),
            valid_cores: vec![],
            valid_threads_per_core: vec![1, 2],
        },
        ebs_info: EbsInfo {
            ebs_optimized_support: ebs,
        },
        network_info: NetworkInfo {
            efa_supported: efa,
            maximum_network_cards: network_cards,
        },
        processor_info: ProcessorInfo {
            supported_architectures: vec!["x86_64".to_string()],
        },
    }
}

pub fn test_catalog() -> StaticCatalog {
    StaticCatalog::default()
        .with_instance_type(instance_type(
            "t2.micro",
            2,
            2,
            EbsOptimizedSupport::Unsupported,
            false,
        ))
        .with_instance_type(instance_type(
            "c4.xlarge",
            4,
            3,
            EbsOptimizedSupport::Default,
            false,
        ))
        .with_instance_type(instance_type(
            "c5.xlarge",
            4,
            1,
            EbsOptimizedSupport::Default,
            false,
        ))
        .with_instance_type(instance_type(
            "c5n.18xlarge",
            72,
            1,
            EbsOptimizedSupport::Default,
            true,
        ))
        .with_subnet("subnet-12345678", "fake-region-1a", "vpc-06e4ab6c6cEXAMPLE")
        .with_subnet("subnet-23456789", "fake-region-1b", "vpc-06e4ab6c6cEXAMPLE")
        .with_subnet("subnet-34567890", "fake-region-1a", "vpc-06e4ab6c6cEXAMPLE")
        .with_image(Os::Centos7, "x86_64", "ami-centos7")
        .with_image(Os::Alinux2, "x86_64", "ami-alinux2")
}

pub fn test_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2021, 1, 1, 1, 1, 1).unwrap())
}

pub fn test_bucket() -> ClusterBucket {
    ClusterBucket::new(BUCKET_NAME, REGION, ARTIFACT_DIR)
}

pub fn parse(config: &str) -> ClusterModel {
    parse_cluster_model(config).unwrap()
}

pub fn build_with_limits(config: &str, limits: ResourceLimits) -> crate::Result<EmittedStack> {
    let cluster = parse_cluster_model(config)?;
    let catalog = test_catalog();
    let clock = test_clock();
    ClusterStackBuilder::new(&catalog, &clock)
        .with_limits(limits)
        .build_cluster_template(&cluster, &test_bucket(), STACK_NAME)
}

pub fn build(config: &str) -> EmittedStack {
    build_with_limits(config, ResourceLimits::default()).unwrap()
}

/// Slurm cluster with generated queues, every compute resource pins the same instance type.
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(name = "finish"))]
pub struct GeneratedCluster {
    #[builder(default = "1")]
    queues: usize,
    #[builder(default = "1")]
    compute_resources: usize,
    #[builder(default = "\"c5.xlarge\".to_string()", setter(into))]
    instance_type: String,
}

impl GeneratedClusterBuilder {
    pub fn build(self) -> String {
        let GeneratedCluster {
            queues,
            compute_resources,
            instance_type,
        } = self.finish().unwrap();
        let mut config = String::from(
            "Image:\n  Os: centos7\nHeadNode:\n  InstanceType: t2.micro\n  Networking:\n    SubnetId: subnet-12345678\nScheduling:\n  Scheduler: slurm\n  SlurmQueues:\n",
        );
        for queue in 0..queues {
            writeln!(config, "    - Name: queue{queue}").unwrap();
            config.push_str("      Networking:\n        SubnetIds: [subnet-12345678]\n");
            config.push_str("      ComputeResources:\n");
            for compute_resource in 0..compute_resources {
                writeln!(config, "        - Name: compute-resource{compute_resource}").unwrap();
                writeln!(config, "          InstanceType: {instance_type}").unwrap();
            }
        }
        config
    }
}

/// Text of a value built from `Fn::Join`/`Fn::Base64`, references are written as `<Ref X>` and
/// `<GetAtt X.Y>`.
pub fn flatten(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(object) if object.len() == 1 => {
            let (name, args) = object.iter().next().unwrap();
            match (name.as_str(), args) {
                ("Fn::Join", Value::Array(args)) => {
                    let separator = args[0].as_str().unwrap();
                    args[1]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(flatten)
                        .collect::<Vec<_>>()
                        .join(separator)
                }
                ("Fn::Base64", args) => flatten(args),
                ("Ref", Value::String(target)) => format!("<Ref {target}>"),
                ("Fn::GetAtt", Value::Array(parts)) => format!(
                    "<GetAtt {}.{}>",
                    parts[0].as_str().unwrap(),
                    parts[1].as_str().unwrap()
                ),
                _ => panic!("Cannot flatten {value}"),
            }
        }
        _ => panic!("Cannot flatten {value}"),
    }
}

/// Bootstrap descriptor written by a compute node boot script.
pub fn compute_dna(launch_template: &Resource) -> Value {
    let script = flatten(&launch_template.properties["LaunchTemplateData"]["UserData"]);
    let start = script.find("<< 'EOF'\n").unwrap() + "<< 'EOF'\n".len();
    let end = script[start..].find("\nEOF\n").unwrap() + start;
    serde_json::from_str(&script[start..end]).unwrap()
}

/// Bootstrap descriptor deployed to the head node.
pub fn head_node_dna(root: &Template) -> Value {
    let metadata = root
        .resource("HeadNodeLaunchTemplate")
        .unwrap()
        .metadata
        .as_ref()
        .unwrap();
    let content =
        &metadata["AWS::CloudFormation::Init"]["deployConfigFiles"]["files"]["/tmp/dna.json"]["content"];
    serde_json::from_str(&flatten(content)).unwrap()
}

pub fn resource_ids_of_type(template: &Template, resource_type: &str) -> Vec<String> {
    template
        .resources_of_type(resource_type)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Value of the tag `key` in a list of `{"Key": ..., "Value": ...}` objects.
pub fn tag_value<'a>(tags: &'a Value, key: &str) -> Option<&'a str> {
    tags.as_array()?
        .iter()
        .find(|tag| tag["Key"] == key)
        .and_then(|tag| tag["Value"].as_str())
}
