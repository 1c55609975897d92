//! Per-saree image directories on the local filesystem.
//!
//! Each saree owns `<upload_root>/<identifier>/`; the files in that directory
//! are its images. Nothing about the images is recorded in the database.

use async_trait::async_trait;
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Extensions accepted on upload and shown in listings (lowercase)
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Errors raised by image storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload root {} is not usable: {reason}", .path.display())]
    UnusableRoot { path: PathBuf, reason: String },

    #[error("Identifier cannot be used as a directory name: {0:?}")]
    UnsafeIdentifier(String),

    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file {}: {source}", .path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A file received in a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as supplied by the client (untrusted)
    pub file_name: String,
    /// File contents
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// Storage of image files grouped by saree identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Create the directory for `identifier` if it does not exist
    async fn ensure_directory(&self, identifier: &str) -> Result<()>;

    /// Stored image names for `identifier`, sorted; empty when none exist
    async fn list_images(&self, identifier: &str) -> Result<Vec<String>>;

    /// Store one upload, returning the generated file name.
    ///
    /// Returns `Ok(None)` when the file is skipped because its extension is
    /// not allowed.
    async fn store(&self, identifier: &str, file: &UploadedFile) -> Result<Option<String>>;
}

/// [`ImageRepository`] backed by a directory tree
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
}

impl ImageFolder {
    /// Open the upload root, creating it when absent.
    ///
    /// The root is made absolute and must be a writable directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: root.to_path_buf(),
                source: e,
            })?;

        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| StorageError::UnusableRoot {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| StorageError::UnusableRoot {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        if !metadata.is_dir() {
            return Err(StorageError::UnusableRoot {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        // Mode bits miss foreign ownership, read-only mounts and ACLs
        let check = root.join(format!(".{}.write-check", Uuid::new_v4().simple()));
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&check)
            .await
            .map_err(|e| StorageError::UnusableRoot {
                path: root.clone(),
                reason: format!("directory is not writable: {}", e),
            })?;
        tokio::fs::remove_file(&check)
            .await
            .map_err(|e| StorageError::UnusableRoot {
                path: root.clone(),
                reason: format!("write check could not be cleaned up: {}", e),
            })?;

        info!(root = %root.display(), "Image folder ready");

        Ok(Self { root })
    }

    /// Absolute upload root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the images of `identifier`
    pub fn directory_for(&self, identifier: &str) -> Result<PathBuf> {
        if !identifier_is_path_safe(identifier) {
            return Err(StorageError::UnsafeIdentifier(identifier.to_string()));
        }
        Ok(self.root.join(identifier))
    }
}

#[async_trait]
impl ImageRepository for ImageFolder {
    async fn ensure_directory(&self, identifier: &str) -> Result<()> {
        let dir = self.directory_for(identifier)?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::CreateDirectory { path: dir, source: e })
    }

    async fn list_images(&self, identifier: &str) -> Result<Vec<String>> {
        let dir = self.directory_for(identifier)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::ReadDirectory { path: dir, source: e }),
        };

        let mut images = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(StorageError::ReadDirectory { path: dir, source: e }),
            };

            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }

            // Names that are not valid UTF-8 were never written by `store`
            if let Ok(name) = entry.file_name().into_string() {
                if has_allowed_extension(&name) {
                    images.push(name);
                }
            }
        }

        images.sort();
        Ok(images)
    }

    #[instrument(skip(self, file), fields(file_name = %file.file_name, size_bytes = file.data.len()))]
    async fn store(&self, identifier: &str, file: &UploadedFile) -> Result<Option<String>> {
        let Some(extension) = allowed_extension(&file.file_name) else {
            debug!("Skipping upload with disallowed extension");
            metrics::counter!("catalog.images.skipped").increment(1);
            return Ok(None);
        };

        let dir = self.directory_for(identifier)?;
        let stored_name = generate_stored_name(&file.file_name, &extension);
        let path = dir.join(&stored_name);

        // create_new: never overwrite, even on a (theoretical) uuid collision
        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        out.write_all(&file.data)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        out.flush().await.map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        debug!(stored_name = %stored_name, "Image stored");
        metrics::counter!("catalog.images.stored").increment(1);

        Ok(Some(stored_name))
    }
}

/// Whether `identifier` can be used verbatim as one directory component
pub fn identifier_is_path_safe(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\', '\0'])
}

/// Lowercased extension of `file_name` if it is in [`ALLOWED_EXTENSIONS`]
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Whether `file_name` carries an allowed image extension
pub fn has_allowed_extension(file_name: &str) -> bool {
    allowed_extension(file_name).is_some()
}

/// Reduce a client-supplied file name to a safe ASCII name.
///
/// Only the last path component survives; whitespace becomes `_`; anything
/// outside `[A-Za-z0-9._-]` is dropped; leading and trailing `.`/`_` are
/// trimmed. The result may be empty.
pub fn secure_filename(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    for word in base.split_whitespace() {
        if !out.is_empty() {
            out.push('_');
        }
        out.extend(
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')),
        );
    }

    out.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `<uuid>_<sanitized name>`, keeping the allowed extension visible
fn generate_stored_name(file_name: &str, extension: &str) -> String {
    let mut safe = secure_filename(file_name);

    if safe.is_empty() {
        safe = format!("image.{}", extension);
    } else if allowed_extension(&safe).as_deref() != Some(extension) {
        safe = format!("{}.{}", safe, extension);
    }

    format!("{}_{}", Uuid::new_v4().simple(), safe)
}
