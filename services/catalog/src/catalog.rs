use crate::image_folder::{identifier_is_path_safe, ImageRepository, StorageError, UploadedFile};
use crate::item_store::{ItemStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Longest identifier accepted by the `sarees` table
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Errors returned by catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Saree ID is required")]
    MissingIdentifier,

    #[error("Invalid saree ID: {0}")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// One saree and its images, as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub identifier: String,
    pub images: Vec<String>,
}

/// Result of a successful add
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddItemOutcome {
    /// Trimmed identifier the images were stored under
    pub identifier: String,
    /// Generated names of the stored files
    pub stored: Vec<String>,
    /// Number of uploads dropped for their extension
    pub skipped: usize,
}

/// Catalog operations over the record store and the image repository
pub struct CatalogService {
    items: Arc<ItemStore>,
    images: Arc<dyn ImageRepository>,
}

impl CatalogService {
    pub fn new(items: Arc<ItemStore>, images: Arc<dyn ImageRepository>) -> Self {
        Self { items, images }
    }

    /// Sarees (newest first) with their images.
    ///
    /// A non-blank `query` restricts the result to identifiers containing it,
    /// ignoring case.
    #[instrument(skip(self))]
    pub async fn list_catalog(&self, query: Option<&str>) -> Result<Vec<CatalogEntry>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        let items = match query {
            Some(q) => self.items.list_matching(q).await?,
            None => self.items.list_all().await?,
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let images = match self.images.list_images(&item.identifier).await {
                Ok(images) => images,
                // Rows written before identifiers were validated
                Err(StorageError::UnsafeIdentifier(_)) => {
                    warn!(saree_id = %item.identifier, "Saree ID has no usable image directory");
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            entries.push(CatalogEntry {
                identifier: item.identifier,
                images,
            });
        }

        Ok(entries)
    }

    /// Register `identifier` (if new) and store the accepted `files` under it
    #[instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn add_item(&self, identifier: &str, files: &[UploadedFile]) -> Result<AddItemOutcome> {
        let identifier = validate_identifier(identifier)?;

        self.items.ensure(identifier).await?;
        self.images.ensure_directory(identifier).await?;

        let mut stored = Vec::new();
        let mut skipped = 0;
        for file in files {
            match self.images.store(identifier, file).await? {
                Some(name) => stored.push(name),
                None => skipped += 1,
            }
        }

        info!(
            saree_id = %identifier,
            stored = stored.len(),
            skipped = skipped,
            "Saree added"
        );

        Ok(AddItemOutcome {
            identifier: identifier.to_string(),
            stored,
            skipped,
        })
    }
}

/// Trim `raw` and check it can name both a row and a directory
pub fn validate_identifier(raw: &str) -> Result<&str> {
    let identifier = raw.trim();

    if identifier.is_empty() {
        return Err(CatalogError::MissingIdentifier);
    }

    if identifier.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(CatalogError::InvalidIdentifier(format!(
            "must be at most {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }

    if !identifier_is_path_safe(identifier) {
        return Err(CatalogError::InvalidIdentifier(
            "must not be '.', '..' or contain path separators".to_string(),
        ));
    }

    Ok(identifier)
}
