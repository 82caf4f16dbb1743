use std::fmt::{Display, Formatter};

use serde::Deserialize;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StorageType {
    Ebs,
    Efs,
    FsxLustre,
}

/// Kinds of shared storage that are limited separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKind {
    Ebs,
    Raid,
    Efs,
    Fsx,
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StorageKind::Ebs => "EBS",
            StorageKind::Raid => "RAID",
            StorageKind::Efs => "EFS",
            StorageKind::Fsx => "FSx",
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SharedStorageDef")]
pub struct SharedStorage {
    pub mount_dir: String,
    pub name: String,
    pub settings: StorageSettings,
}

#[derive(Debug, Clone)]
pub enum StorageSettings {
    Ebs(EbsSettings),
    Efs(EfsSettings),
    FsxLustre(FsxLustreSettings),
}

impl SharedStorage {
    pub fn kind(&self) -> StorageKind {
        match &self.settings {
            StorageSettings::Ebs(settings) if settings.raid.is_some() => StorageKind::Raid,
            StorageSettings::Ebs(_) => StorageKind::Ebs,
            StorageSettings::Efs(_) => StorageKind::Efs,
            StorageSettings::FsxLustre(_) => StorageKind::Fsx,
        }
    }

    /// The storage exists already and is only mounted by the cluster.
    pub fn is_existing(&self) -> bool {
        match &self.settings {
            StorageSettings::Ebs(settings) => settings.volume_id.is_some(),
            StorageSettings::Efs(settings) => settings.file_system_id.is_some(),
            StorageSettings::FsxLustre(settings) => settings.file_system_id.is_some(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SharedStorageDef {
    mount_dir: String,
    name: String,
    storage_type: StorageType,
    #[serde(default)]
    ebs_settings: Option<EbsSettings>,
    #[serde(default)]
    efs_settings: Option<EfsSettings>,
    #[serde(default)]
    fsx_lustre_settings: Option<FsxLustreSettings>,
}

impl TryFrom<SharedStorageDef> for SharedStorage {
    type Error = Error;

    fn try_from(def: SharedStorageDef) -> Result<Self, Self::Error> {
        let settings = match (
            def.storage_type,
            def.ebs_settings,
            def.efs_settings,
            def.fsx_lustre_settings,
        ) {
            (StorageType::Ebs, ebs, None, None) => StorageSettings::Ebs(ebs.unwrap_or_default()),
            (StorageType::Efs, None, efs, None) => StorageSettings::Efs(efs.unwrap_or_default()),
            (StorageType::FsxLustre, None, None, fsx) => {
                StorageSettings::FsxLustre(fsx.unwrap_or_default())
            }
            (storage_type, ..) => {
                return Err(Error::InvalidConfiguration(format!(
                    "Shared storage {} of type {storage_type:?} defines settings of another storage type",
                    def.name
                )));
            }
        };
        Ok(SharedStorage {
            mount_dir: def.mount_dir,
            name: def.name,
            settings,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EbsSettings {
    pub volume_type: Option<String>,
    pub iops: Option<u32>,
    pub throughput: Option<u32>,
    pub size: Option<u32>,
    pub encrypted: Option<bool>,
    pub kms_key_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub volume_id: Option<String>,
    pub raid: Option<Raid>,
    pub deletion_policy: Option<String>,
}

fn default_raid_volumes() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Raid {
    #[serde(rename = "Type")]
    pub raid_type: u8,
    #[serde(default = "default_raid_volumes")]
    pub number_of_volumes: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EfsSettings {
    pub file_system_id: Option<String>,
    pub encrypted: Option<bool>,
    pub kms_key_id: Option<String>,
    pub performance_mode: Option<String>,
    pub throughput_mode: Option<String>,
    pub provisioned_throughput: Option<u32>,
    pub deletion_policy: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FsxLustreSettings {
    pub file_system_id: Option<String>,
    pub storage_capacity: Option<u32>,
    pub deployment_type: Option<String>,
    pub per_unit_storage_throughput: Option<u32>,
    pub import_path: Option<String>,
    pub export_path: Option<String>,
    pub kms_key_id: Option<String>,
    pub deletion_policy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn storage(text: &str) -> crate::Result<SharedStorage> {
        Ok(serde_yaml::from_str(text)?)
    }

    #[test]
    fn raid_is_separate_kind() {
        let storage = storage(indoc! {"
            MountDir: /raid
            Name: raid
            StorageType: Ebs
            EbsSettings:
              Raid:
                Type: 0
                NumberOfVolumes: 3
        "})
        .unwrap();
        assert_eq!(storage.kind(), StorageKind::Raid);
        assert!(!storage.is_existing());
    }

    #[test]
    fn existing_file_system() {
        let storage = storage(indoc! {"
            MountDir: /fsx
            Name: fsx
            StorageType: FsxLustre
            FsxLustreSettings:
              FileSystemId: fs-0123
        "})
        .unwrap();
        assert_eq!(storage.kind(), StorageKind::Fsx);
        assert!(storage.is_existing());
    }

    #[test]
    fn mismatched_settings() {
        assert!(
            storage(indoc! {"
                MountDir: /efs
                Name: efs
                StorageType: Efs
                EbsSettings:
                  Size: 10
            "})
            .is_err()
        );
    }
}
