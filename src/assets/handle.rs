//! Object-URL style handles for uploaded files.

use super::AssetError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

const HANDLE_SCHEME: &str = "blob:modelview/";

/// Transient reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File contents as picked or dropped by the user.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
    /// Where the file came from, when known. Lets `.gltf` files resolve
    /// sibling `.bin` / texture files.
    pub origin: Option<PathBuf>,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            origin: None,
        }
    }

    pub fn read(path: PathBuf) -> Result<Self, AssetError> {
        let bytes = std::fs::read(&path).map_err(|source| AssetError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("model")
            .to_string();
        Ok(Self {
            name,
            bytes: bytes.into(),
            origin: Some(path),
        })
    }
}

/// Registry of live handles, standing in for the platform's object-URL table.
///
/// Handles are never reused: every `create` yields a fresh sequence number.
#[derive(Default)]
pub struct ObjectUrlRegistry {
    next_id: u64,
    live: HashMap<ResourceHandle, SelectedFile>,
    revoked_total: u64,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file: SelectedFile) -> ResourceHandle {
        self.next_id += 1;
        let digest = Sha256::digest(&file.bytes[..]);
        let short: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
        let handle = ResourceHandle(format!("{}{}-{}", HANDLE_SCHEME, self.next_id, short));
        log::info!(
            "Created handle {} for '{}' ({} bytes)",
            handle,
            file.name,
            file.bytes.len()
        );
        self.live.insert(handle.clone(), file);
        handle
    }

    /// Releases `handle`. Returns `false` when it was unknown or already revoked.
    pub fn revoke(&mut self, handle: &ResourceHandle) -> bool {
        match self.live.remove(handle) {
            Some(file) => {
                self.revoked_total += 1;
                log::info!(
                    "Revoked handle {} ('{}'), {} live",
                    handle,
                    file.name,
                    self.live_count()
                );
                true
            }
            None => {
                log::warn!("Ignoring revoke of unknown handle {}", handle);
                false
            }
        }
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> Option<&SelectedFile> {
        self.live.get(handle)
    }

    #[cfg(test)]
    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.live.contains_key(handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn revoked_total(&self) -> u64 {
        self.revoked_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_even_for_identical_files() {
        let mut registry = ObjectUrlRegistry::new();
        let a = registry.create(SelectedFile::from_bytes("a.glb", vec![1u8, 2, 3]));
        let b = registry.create(SelectedFile::from_bytes("a.glb", vec![1u8, 2, 3]));
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(HANDLE_SCHEME));
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn revoke_is_single_shot() {
        let mut registry = ObjectUrlRegistry::new();
        let handle = registry.create(SelectedFile::from_bytes("model.glb", vec![0u8; 8]));
        assert!(registry.resolve(&handle).is_some());
        assert!(registry.revoke(&handle));
        assert!(!registry.revoke(&handle));
        assert!(registry.resolve(&handle).is_none());
        assert_eq!(registry.revoked_total(), 1);
        assert_eq!(registry.live_count(), 0);
    }
}
