use std::path::{Path, PathBuf};

/// Serialized document ready to be staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub content: String,
    pub name: String,
}

/// Persists generated assets and returns a locator for each of them, in the same order.
pub trait AssetStore {
    fn store(&mut self, assets: &[StagedAsset]) -> crate::Result<Vec<String>>;
}

/// Stores assets as files of a local directory. Locators are the file paths.
pub struct DirectoryAssetStore {
    root: PathBuf,
}

impl DirectoryAssetStore {
    pub fn new(root: &Path) -> crate::Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl AssetStore for DirectoryAssetStore {
    fn store(&mut self, assets: &[StagedAsset]) -> crate::Result<Vec<String>> {
        assets
            .iter()
            .map(|asset| -> crate::Result<String> {
                let path = self.root.join(&asset.name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &asset.content)?;
                log::debug!("Stored {} ({} bytes)", path.display(), asset.content.len());
                Ok(path.display().to_string())
            })
            .collect()
    }
}
