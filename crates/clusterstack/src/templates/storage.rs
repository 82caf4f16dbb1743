//! Shared storage mounted by every node of the cluster.

use serde_json::{Value, json};
use stackdoc::intrinsic::{get_att, reference};
use stackdoc::{Resource, Template};

use crate::model::storage::{EbsSettings, EfsSettings, FsxLustreSettings, StorageSettings};
use crate::model::SharedStorage;
use crate::templates::StackContext;
use crate::templates::naming::{mount_target_id, storage_id};
use crate::templates::networking::storage_security_groups;
use crate::templates::tags::cluster_tags;

const DEFAULT_EBS_SIZE_GIB: u32 = 35;
const DEFAULT_EBS_VOLUME_TYPE: &str = "gp3";
const DEFAULT_FSX_CAPACITY_GIB: u32 = 1200;

#[derive(Debug, Clone, PartialEq)]
pub struct MountRef {
    pub mount_dir: String,
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaidRef {
    pub mount_dir: String,
    pub raid_type: u8,
    pub volume_ids: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsxRef {
    pub mount_dir: String,
    pub id: Value,
    pub mount_name: Value,
    pub dns_name: Value,
}

/// Ids of the shared storage, either created with the cluster or passed through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedStorageRefs {
    pub ebs: Vec<MountRef>,
    pub raid: Option<RaidRef>,
    pub efs: Vec<MountRef>,
    pub fsx: Vec<FsxRef>,
}

fn retain_if_requested(resource: Resource, deletion_policy: Option<&str>) -> Resource {
    match deletion_policy {
        Some("Retain") => resource.retained(),
        _ => resource,
    }
}

fn volume(ctx: &StackContext, settings: &EbsSettings) -> Resource {
    let mut properties = json!({
        "AvailabilityZone": ctx.layout.head_node.subnet.availability_zone,
        "Size": settings.size.unwrap_or(DEFAULT_EBS_SIZE_GIB),
        "VolumeType": settings.volume_type.as_deref().unwrap_or(DEFAULT_EBS_VOLUME_TYPE),
        "Encrypted": settings.encrypted.unwrap_or(true),
        "Tags": cluster_tags(ctx),
    });
    let optional = [
        ("Iops", settings.iops.map(Value::from)),
        ("Throughput", settings.throughput.map(Value::from)),
        ("KmsKeyId", settings.kms_key_id.clone().map(Value::from)),
        ("SnapshotId", settings.snapshot_id.clone().map(Value::from)),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            properties[name] = value;
        }
    }
    retain_if_requested(
        Resource::new("AWS::EC2::Volume", properties),
        settings.deletion_policy.as_deref(),
    )
}

fn add_ebs(
    template: &mut Template,
    ctx: &StackContext,
    storage: &SharedStorage,
    settings: &EbsSettings,
    refs: &mut SharedStorageRefs,
) -> crate::Result<()> {
    match &settings.raid {
        Some(raid) => {
            let mut volume_ids = vec![];
            for index in 0..raid.number_of_volumes {
                let logical_id = storage_id("RAID", &format!("{}{index}", storage.name));
                template.add_resource(&logical_id, volume(ctx, settings))?;
                volume_ids.push(reference(&logical_id));
            }
            refs.raid = Some(RaidRef {
                mount_dir: storage.mount_dir.clone(),
                raid_type: raid.raid_type,
                volume_ids,
            });
        }
        None => {
            let id = match &settings.volume_id {
                Some(volume_id) => json!(volume_id),
                None => {
                    let logical_id = storage_id("EBS", &storage.name);
                    template.add_resource(&logical_id, volume(ctx, settings))?;
                    reference(&logical_id)
                }
            };
            refs.ebs.push(MountRef {
                mount_dir: storage.mount_dir.clone(),
                id,
            });
        }
    }
    Ok(())
}

fn add_efs(
    template: &mut Template,
    ctx: &StackContext,
    storage: &SharedStorage,
    settings: &EfsSettings,
) -> crate::Result<Value> {
    if let Some(file_system_id) = &settings.file_system_id {
        return Ok(json!(file_system_id));
    }
    let logical_id = storage_id("EFS", &storage.name);
    let mut properties = json!({
        "Encrypted": settings.encrypted.unwrap_or(false),
        "PerformanceMode": settings.performance_mode.as_deref().unwrap_or("generalPurpose"),
        "ThroughputMode": settings.throughput_mode.as_deref().unwrap_or("bursting"),
        "FileSystemTags": cluster_tags(ctx),
    });
    if let Some(kms_key_id) = &settings.kms_key_id {
        properties["KmsKeyId"] = json!(kms_key_id);
    }
    if let Some(throughput) = settings.provisioned_throughput {
        properties["ProvisionedThroughputInMibps"] = json!(throughput);
    }
    template.add_resource(
        &logical_id,
        retain_if_requested(
            Resource::new("AWS::EFS::FileSystem", properties),
            settings.deletion_policy.as_deref(),
        ),
    )?;

    // One mount target per availability zone nodes are launched in.
    for (zone, subnet_id) in &ctx.layout.availability_zones {
        template.add_resource(
            mount_target_id(&storage.name, zone),
            Resource::new(
                "AWS::EFS::MountTarget",
                json!({
                    "FileSystemId": reference(&logical_id),
                    "SubnetId": subnet_id,
                    "SecurityGroups": storage_security_groups(ctx),
                }),
            ),
        )?;
    }
    Ok(reference(&logical_id))
}

fn add_fsx(
    template: &mut Template,
    ctx: &StackContext,
    storage: &SharedStorage,
    settings: &FsxLustreSettings,
) -> crate::Result<FsxRef> {
    if let Some(file_system_id) = &settings.file_system_id {
        // Mount name and DNS name of an existing file system are resolved by the nodes.
        return Ok(FsxRef {
            mount_dir: storage.mount_dir.clone(),
            id: json!(file_system_id),
            mount_name: json!(""),
            dns_name: json!(""),
        });
    }
    let logical_id = storage_id("FSX", &storage.name);
    let mut lustre = json!({
        "DeploymentType": settings.deployment_type.as_deref().unwrap_or("SCRATCH_2"),
    });
    let optional = [
        (
            "PerUnitStorageThroughput",
            settings.per_unit_storage_throughput.map(Value::from),
        ),
        ("ImportPath", settings.import_path.clone().map(Value::from)),
        ("ExportPath", settings.export_path.clone().map(Value::from)),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            lustre[name] = value;
        }
    }
    let mut properties = json!({
        "FileSystemType": "LUSTRE",
        "StorageCapacity": settings.storage_capacity.unwrap_or(DEFAULT_FSX_CAPACITY_GIB),
        "SubnetIds": [ctx.layout.head_node.subnet_id],
        "SecurityGroupIds": storage_security_groups(ctx),
        "LustreConfiguration": lustre,
        "Tags": cluster_tags(ctx),
    });
    if let Some(kms_key_id) = &settings.kms_key_id {
        properties["KmsKeyId"] = json!(kms_key_id);
    }
    template.add_resource(
        &logical_id,
        retain_if_requested(
            Resource::new("AWS::FSx::FileSystem", properties),
            settings.deletion_policy.as_deref(),
        ),
    )?;
    Ok(FsxRef {
        mount_dir: storage.mount_dir.clone(),
        id: reference(&logical_id),
        mount_name: get_att(&logical_id, "LustreMountName"),
        dns_name: get_att(&logical_id, "DNSName"),
    })
}

/// Adds the shared storage created with the cluster and collects the ids of all of it.
pub fn add_shared_storage(
    template: &mut Template,
    ctx: &StackContext,
) -> crate::Result<SharedStorageRefs> {
    let mut refs = SharedStorageRefs::default();
    for storage in &ctx.cluster.shared_storage {
        match &storage.settings {
            StorageSettings::Ebs(settings) => add_ebs(template, ctx, storage, settings, &mut refs)?,
            StorageSettings::Efs(settings) => {
                let id = add_efs(template, ctx, storage, settings)?;
                refs.efs.push(MountRef {
                    mount_dir: storage.mount_dir.clone(),
                    id,
                });
            }
            StorageSettings::FsxLustre(settings) => {
                let fsx = add_fsx(template, ctx, storage, settings)?;
                refs.fsx.push(fsx);
            }
        }
    }
    log::debug!(
        "Shared storage: {} EBS, {} EFS, {} FSx, RAID: {}",
        refs.ebs.len(),
        refs.efs.len(),
        refs.fsx.len(),
        refs.raid.is_some()
    );
    Ok(refs)
}
