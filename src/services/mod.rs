//! Service layer for NormaDeck business logic.
//!
//! Domain logic separated from interface concerns, usable from the CLI, the
//! server, or other front ends.

pub mod admin;
pub mod download;

pub use admin::{AdminError, AdminService};
pub use download::{DownloadResolver, SystemOpener, UrlOpener};
