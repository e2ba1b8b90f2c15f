//! # ARKLA Common Library
//!
//! Shared code for the ARKLA archive backend including:
//! - Letter categories and their per-category field schemas
//! - Export column layouts for the DPRD ledgers
//! - API error codes and error payload types
//! - Configuration loading and root folder resolution
//! - Date normalization for extracted fields

pub mod api;
pub mod config;
pub mod dates;
pub mod error;
pub mod kategori;
pub mod text;

pub use error::{Error, Result};
pub use kategori::Kategori;
