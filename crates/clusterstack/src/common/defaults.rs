/// Seconds a node may take to bootstrap when no timeout is configured.
pub const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u32 = 1800;

/// Port used for the slurm accounting database when its URI does not name one.
pub const DEFAULT_SLURMDBD_PORT: u16 = 3306;

/// Directory on the head node shared with compute nodes.
pub const SHARED_DIR: &str = "/opt/parallelcluster/shared";

pub const DEFAULT_EPHEMERAL_DIR: &str = "/scratch";

pub const DEFAULT_PROXY: &str = "NONE";

/// Namespace of the tags reserved for the cluster itself.
pub const TAG_NAMESPACE: &str = "parallelcluster";

/// Days log events are kept in the cluster log group.
pub fn log_retention_days() -> u32 {
    std::env::var("CLUSTERSTACK_LOG_RETENTION_DAYS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(14)
}
