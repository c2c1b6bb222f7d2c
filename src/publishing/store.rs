//! Persisting embedded images into the vault

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};

use super::ImageBlob;
use crate::utils::url_utils::extension_for_mime;

/// Saves an image and answers with a locator the document can reference
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn save(&self, folder: &str, blob: &ImageBlob) -> Option<String>;
}

/// Store writing into a folder of the vault on disk
#[derive(Debug, Clone)]
pub struct VaultStore {
    vault_root: PathBuf,
}

impl VaultStore {
    pub fn new(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
        }
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    /// Create each level of `folder` in turn, tolerating levels that already exist
    async fn ensure_folder(&self, folder: &Path) -> std::io::Result<PathBuf> {
        let mut current = self.vault_root.clone();
        for component in folder.components() {
            let Component::Normal(level) = component else {
                continue;
            };
            current.push(level);
            match tokio::fs::create_dir(&current).await {
                Ok(()) => debug!("Created vault folder {}", current.display()),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        Ok(current)
    }
}

/// Folder relative to the vault root, rejecting anything that could escape it
fn relative_folder(folder: &str) -> Option<PathBuf> {
    let path = Path::new(folder.trim_matches('/'));
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| path.to_path_buf())
}

/// File name derived from the image content
#[must_use]
pub fn content_file_name(blob: &ImageBlob) -> String {
    let hash = xxhash_rust::xxh3::xxh3_64(&blob.bytes);
    format!("{hash:016x}.{}", extension_for_mime(&blob.mime))
}

#[async_trait]
impl LocalStore for VaultStore {
    async fn save(&self, folder: &str, blob: &ImageBlob) -> Option<String> {
        let Some(relative) = relative_folder(folder) else {
            warn!("Refusing to save outside the vault: {folder}");
            return None;
        };

        let directory = match self.ensure_folder(&relative).await {
            Ok(directory) => directory,
            Err(e) => {
                warn!("Failed to create vault folder {folder}: {e}");
                return None;
            }
        };

        let file_name = content_file_name(blob);
        let target = directory.join(&file_name);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!("Image already stored at {}", target.display());
        } else if let Err(e) = tokio::fs::write(&target, &blob.bytes).await {
            warn!("Failed to write image {}: {e}", target.display());
            return None;
        }

        let locator = relative
            .join(&file_name)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        Some(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_folder_rejects_escapes() {
        assert_eq!(relative_folder("assets/mp/"), Some(PathBuf::from("assets/mp")));
        assert_eq!(relative_folder("../outside"), None);
        assert_eq!(relative_folder("a/../../b"), None);
    }

    #[test]
    fn test_content_file_name_is_stable() {
        let blob = ImageBlob::new(b"png bytes".to_vec(), "image/png");
        let name = content_file_name(&blob);
        assert_eq!(name, content_file_name(&blob.clone()));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 16 + ".png".len());
    }

    #[tokio::test]
    async fn test_save_tolerates_existing_levels() {
        let vault = tempfile::tempdir().unwrap();
        std::fs::create_dir(vault.path().join("assets")).unwrap();

        let store = VaultStore::new(vault.path());
        let blob = ImageBlob::new(vec![7; 10], "image/jpeg");
        let locator = store.save("assets/export", &blob).await.unwrap();

        assert!(locator.starts_with("assets/export/"));
        assert!(locator.ends_with(".jpg"));
        assert_eq!(std::fs::read(vault.path().join(&locator)).unwrap(), vec![7; 10]);

        // Same content lands on the same file
        assert_eq!(store.save("assets/export", &blob).await.unwrap(), locator);
    }
}
