//! Shared domain types, text utilities, and configuration for the prospect
//! pipeline. Everything here is pure and store-agnostic; persistence lives in
//! `prospect-db` and external calls in `prospect-ai` / `prospect-pipeline`.

pub mod app_config;
pub mod config;
pub mod providers;
pub mod scoring;
pub mod status;
pub mod taxonomy;
pub mod text;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use providers::{load_providers, ProviderConfig, ProvidersFile};
pub use scoring::{load_scoring, DimensionWeight, ScoringConfig, Thresholds, VIABILITY_DIMENSION};
pub use status::{DerivedStatus, OpportunityStatus, SignalStatus, WindowStatus};
pub use taxonomy::{BuildEffort, CompetitionLevel, DerivativeType, ProductForm, SearchVolume};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {kind} value: {value}")]
    InvalidEnum { kind: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read scoring config at {path}: {source}")]
    ScoringFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scoring config: {0}")]
    ScoringFileParse(#[source] serde_yaml::Error),

    #[error("failed to read providers config at {path}: {source}")]
    ProvidersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse providers config: {0}")]
    ProvidersFileParse(#[source] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}
