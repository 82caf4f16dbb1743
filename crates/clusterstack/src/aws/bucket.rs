/// Directory of the artifact directory holding generated templates.
pub const TEMPLATES_DIR: &str = "templates";
/// Directory of the artifact directory holding the cluster configuration.
pub const CONFIGS_DIR: &str = "configs";

pub const CLUSTER_CONFIG_NAME: &str = "cluster-config.yaml";

/// Bucket where the cluster artifacts are staged.
///
/// Only used to compute the locations of objects; reading and writing objects is done by an
/// [`AssetStore`](crate::aws::store::AssetStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterBucket {
    pub name: String,
    pub region: String,
    /// Per-cluster prefix of every object, e.g. `parallelcluster/clusters/<cluster>-<suffix>`.
    pub artifact_directory: String,
}

impl ClusterBucket {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        artifact_directory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            artifact_directory: artifact_directory.into().trim_matches('/').to_string(),
        }
    }

    pub fn url_suffix(&self) -> &'static str {
        if self.region.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        }
    }

    /// `https://<bucket>.s3.<region>.<suffix>/<artifact directory>`
    pub fn root_url(&self) -> String {
        format!(
            "https://{}.s3.{}.{}/{}",
            self.name,
            self.region,
            self.url_suffix(),
            self.artifact_directory
        )
    }

    pub fn object_key(&self, directory: &str, name: &str) -> String {
        format!("{}/{directory}/{name}", self.artifact_directory)
    }

    pub fn object_url(&self, directory: &str, name: &str) -> String {
        format!("{}/{directory}/{name}", self.root_url())
    }

    pub fn template_url(&self, name: &str) -> String {
        self.object_url(TEMPLATES_DIR, name)
    }

    pub fn config_key(&self) -> String {
        self.object_key(CONFIGS_DIR, CLUSTER_CONFIG_NAME)
    }
}
