//! Saree Catalog Service
//!
//! Inventory catalog for sarees identified by a scannable ID. Each saree is a
//! row in SQLite plus a directory of uploaded images; a QR endpoint turns a
//! photographed label back into the ID.
//!
//! ## Features
//!
//! - **Record Store**: one row per saree ID, uniqueness enforced by the
//!   database, duplicate inserts from concurrent submissions absorbed
//! - **Image Folders**: uploads stored under `<upload_root>/<saree_id>/` with
//!   collision-resistant, sanitized names
//! - **Catalog Listing**: newest first, optional case-insensitive ID search
//! - **QR Decoding**: single-shot detection on uploaded photos, with "no code
//!   found" kept distinct from "image could not be processed"
//!
//! ## Architecture
//!
//! ```text
//!   HTTP (axum)
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │ GET /        │─────▶│ Catalog      │─────▶│ Item Store   │──▶ SQLite
//! │ GET|POST /add│      │ Service      │      └──────────────┘
//! └──────────────┘      │              │      ┌──────────────┐
//!                       │              │─────▶│ Image Folder │──▶ uploads/
//! ┌──────────────┐      └──────────────┘      └──────────────┘        ▲
//! │ POST         │      ┌──────────────┐                              │
//! │ /decode-qr   │─────▶│ QR Decoder   │      GET /uploads/{id}/{file}┘
//! └──────────────┘      └──────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod flash;
pub mod image_folder;
pub mod item_store;
pub mod qr_decode;
pub mod routes;
pub mod views;

pub use catalog::{AddItemOutcome, CatalogEntry, CatalogError, CatalogService};
pub use config::Config;
pub use flash::{Notice, NoticeLevel};
pub use image_folder::{ImageFolder, ImageRepository, StorageError, UploadedFile};
pub use item_store::{Item, ItemStore, StoreError};
pub use qr_decode::{DecodeError, QrDecoder, QrOutcome};
pub use routes::{create_router, AppState, QrDecodeResponse};
