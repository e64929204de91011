//! NormaDeck: a catalog of graphic identity guideline documents.
//!
//! Each record ("norma") pairs metadata with a cover image and a PDF hosted
//! on a managed backend. This crate provides:
//! - the in-memory catalog with its search/filter/sort pipeline,
//! - a best-effort PDF download resolver,
//! - the session guard gating administrative operations,
//! - the backend collaborator contracts and their HTTP implementation,
//! - the server-side PDF resolution endpoint.

pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod models;
pub mod server;
pub mod services;

pub use config::{load_settings, Config, Settings};
