//! Interfaces to the cloud services the build reads from or writes to.

pub mod bucket;
pub mod catalog;
pub mod store;

pub use bucket::ClusterBucket;
pub use catalog::{Ec2Catalog, InstanceTypeInfo, StaticCatalog, SubnetInfo};
pub use store::{AssetStore, DirectoryAssetStore, StagedAsset};
