//! Shared types, error model, and configuration for brewsync.
//!
//! This crate is the foundation depended on by all other brewsync crates.
//! It provides:
//! - [`BrewSyncError`]: the unified error type
//! - The canonical recipe model ([`Recipe`], [`Brew`], ingredients, usage enums)
//! - Configuration ([`AppConfig`], [`SyncOptions`], config loading)
//! - [`NamePattern`]: shell-style recipe name selection

pub mod brew;
pub mod config;
pub mod error;
pub mod pattern;
pub mod recipe;
pub mod types;
pub mod wire;

// Re-export public API at crate root for ergonomic imports.
pub use brew::{Brew, BrewStatus, Carbonation, GravityReading};
pub use config::{
    AppConfig, RemoteConfig, SourcesConfig, SyncConfig, SyncOptions, config_dir,
    config_file_path, expand_tilde, init_config, load_config, load_config_from,
    read_password_file,
};
pub use error::{BrewSyncError, Result};
pub use pattern::NamePattern;
pub use recipe::Recipe;
pub use types::{
    Adjunct, AdjunctUnit, AdjunctUsage, DEFAULT_SOURCE, Fermentable, FermentableUsage, Hop,
    HopForm, HopUsage, RecipeType, Step, UnitType, Yeast, YeastUnit,
};
