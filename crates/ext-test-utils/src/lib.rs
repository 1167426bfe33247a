//! Shared test utilities for the extension registry workspace.
//!
//! This crate provides manifest fixtures so crate test suites do not each
//! hand-roll JSON and directory layouts. It is a dev-dependency only, never
//! published.
//!
//! # Modules
//!
//! - [`manifest`]: [`ManifestBuilder`] for manifest JSON bodies
//! - [`install`]: [`TestInstall`], an on-disk installation in a temp dir,
//!   and [`memory_fs`] for the in-memory equivalent

pub mod install;
pub mod manifest;

pub use install::{TestInstall, memory_fs};
pub use manifest::ManifestBuilder;
