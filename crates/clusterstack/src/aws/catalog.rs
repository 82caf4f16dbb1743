use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::model::cluster::Os;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EbsOptimizedSupport {
    #[default]
    Default,
    Supported,
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VCpuInfo {
    pub default_v_cpus: u32,
    pub default_cores: Option<u32>,
    pub default_threads_per_core: Option<u32>,
    pub valid_cores: Vec<u32>,
    pub valid_threads_per_core: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EbsInfo {
    pub ebs_optimized_support: EbsOptimizedSupport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkInfo {
    pub efa_supported: bool,
    pub maximum_network_cards: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProcessorInfo {
    pub supported_architectures: Vec<String>,
}

/// Instance type metadata in the shape returned by `DescribeInstanceTypes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceTypeInfo {
    pub instance_type: String,
    #[serde(default)]
    pub v_cpu_info: VCpuInfo,
    #[serde(default)]
    pub ebs_info: EbsInfo,
    #[serde(default)]
    pub network_info: NetworkInfo,
    #[serde(default)]
    pub processor_info: ProcessorInfo,
}

impl InstanceTypeInfo {
    pub fn vcpus(&self) -> u32 {
        self.v_cpu_info.default_v_cpus
    }

    pub fn cores(&self) -> u32 {
        self.v_cpu_info
            .default_cores
            .unwrap_or_else(|| self.vcpus())
    }

    pub fn threads_per_core(&self) -> u32 {
        self.v_cpu_info.default_threads_per_core.unwrap_or(1)
    }

    /// At least one network card is always present.
    pub fn max_network_cards(&self) -> u32 {
        self.network_info.maximum_network_cards.max(1)
    }

    pub fn is_ebs_optimized(&self) -> bool {
        self.ebs_info.ebs_optimized_support != EbsOptimizedSupport::Unsupported
    }

    pub fn is_efa_supported(&self) -> bool {
        self.network_info.efa_supported
    }

    pub fn architecture(&self) -> &str {
        self.processor_info
            .supported_architectures
            .first()
            .map(String::as_str)
            .unwrap_or("x86_64")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetInfo {
    pub availability_zone: String,
    pub vpc_id: String,
}

/// Read-only view of the EC2 metadata the build depends on.
pub trait Ec2Catalog {
    fn instance_type_info(&self, instance_type: &str) -> crate::Result<InstanceTypeInfo>;

    fn subnet_info(&self, subnet_id: &str) -> crate::Result<SubnetInfo>;

    /// Image published for `os` on `architecture`.
    fn official_ami(&self, os: Os, architecture: &str) -> crate::Result<String>;
}

/// Catalog backed by a JSON document.
///
/// ```json
/// {
///   "InstanceTypes": [{"InstanceType": "c5.xlarge", ...}],
///   "Subnets": {"subnet-123": {"AvailabilityZone": "us-east-1a", "VpcId": "vpc-123"}},
///   "Images": {"alinux2/x86_64": "ami-123"}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StaticCatalog {
    instance_types: Vec<InstanceTypeInfo>,
    subnets: BTreeMap<String, SubnetInfo>,
    images: BTreeMap<String, String>,
}

impl StaticCatalog {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let catalog = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::debug!(
            "Loaded catalog {} with {} instance type(s) and {} subnet(s)",
            path.display(),
            catalog.instance_types.len(),
            catalog.subnets.len()
        );
        Ok(catalog)
    }

    pub fn with_instance_type(mut self, info: InstanceTypeInfo) -> Self {
        self.instance_types
            .retain(|existing| existing.instance_type != info.instance_type);
        self.instance_types.push(info);
        self
    }

    pub fn with_subnet(mut self, subnet_id: &str, availability_zone: &str, vpc_id: &str) -> Self {
        self.subnets.insert(
            subnet_id.to_string(),
            SubnetInfo {
                availability_zone: availability_zone.to_string(),
                vpc_id: vpc_id.to_string(),
            },
        );
        self
    }

    pub fn with_image(mut self, os: Os, architecture: &str, image_id: &str) -> Self {
        self.images
            .insert(image_key(os, architecture), image_id.to_string());
        self
    }
}

fn image_key(os: Os, architecture: &str) -> String {
    format!("{os}/{architecture}")
}

impl Ec2Catalog for StaticCatalog {
    fn instance_type_info(&self, instance_type: &str) -> crate::Result<InstanceTypeInfo> {
        self.instance_types
            .iter()
            .find(|info| info.instance_type == instance_type)
            .cloned()
            .ok_or_else(|| Error::UnknownInstanceType(instance_type.to_string()))
    }

    fn subnet_info(&self, subnet_id: &str) -> crate::Result<SubnetInfo> {
        self.subnets
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| Error::UnknownSubnet(subnet_id.to_string()))
    }

    fn official_ami(&self, os: Os, architecture: &str) -> crate::Result<String> {
        self.images
            .get(&image_key(os, architecture))
            .cloned()
            .ok_or_else(|| Error::UnknownImage {
                os: os.to_string(),
                architecture: architecture.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const CATALOG: &str = indoc! {r#"
        {
          "InstanceTypes": [
            {
              "InstanceType": "t2.micro",
              "VCpuInfo": {"DefaultVCpus": 4, "DefaultCores": 2, "DefaultThreadsPerCore": 2},
              "EbsInfo": {"EbsOptimizedSupport": "unsupported"},
              "NetworkInfo": {"EfaSupported": false, "MaximumNetworkCards": 2},
              "ProcessorInfo": {"SupportedArchitectures": ["x86_64"]}
            },
            {"InstanceType": "m6g.large", "ProcessorInfo": {"SupportedArchitectures": ["arm64"]}}
          ],
          "Subnets": {"subnet-1": {"AvailabilityZone": "us-east-1a", "VpcId": "vpc-123"}},
          "Images": {"alinux2/x86_64": "ami-123"}
        }
    "#};

    #[test]
    fn load_catalog() {
        let catalog = StaticCatalog::from_json(CATALOG).unwrap();
        let info = catalog.instance_type_info("t2.micro").unwrap();
        assert_eq!(info.max_network_cards(), 2);
        assert!(!info.is_ebs_optimized());
        assert_eq!(info.cores(), 2);
        assert_eq!(info.threads_per_core(), 2);

        let graviton = catalog.instance_type_info("m6g.large").unwrap();
        assert_eq!(graviton.architecture(), "arm64");
        assert_eq!(graviton.max_network_cards(), 1);
        assert!(graviton.is_ebs_optimized());

        assert_eq!(catalog.subnet_info("subnet-1").unwrap().vpc_id, "vpc-123");
        assert_eq!(catalog.official_ami(Os::Alinux2, "x86_64").unwrap(), "ami-123");
    }

    #[test]
    fn unknown_lookups_fail() {
        let catalog = StaticCatalog::from_json(CATALOG).unwrap();
        assert!(matches!(
            catalog.instance_type_info("c5.24xlarge"),
            Err(Error::UnknownInstanceType(name)) if name == "c5.24xlarge"
        ));
        assert!(matches!(
            catalog.subnet_info("subnet-2"),
            Err(Error::UnknownSubnet(_))
        ));
        assert!(catalog.official_ami(Os::Centos7, "x86_64").is_err());
    }
}
