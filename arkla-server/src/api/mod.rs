//! HTTP API handlers for arkla-server
//!
//! Each module owns its request/response types and exposes a route builder
//! merged by [`crate::build_router`].

pub mod disposisi;
pub mod export;
pub mod health;
pub mod master_data;
pub mod params;
pub mod process;
pub mod surat;

pub use disposisi::disposisi_routes;
pub use export::export_routes;
pub use health::{health_routes, root_routes};
pub use master_data::master_data_routes;
pub use process::process_routes;
pub use surat::surat_routes;
