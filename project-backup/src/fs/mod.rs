//! File system helpers for building bundles.

pub mod metadata;
pub mod walker;
