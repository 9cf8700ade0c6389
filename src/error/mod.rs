//! # Error Module
//!
//! Error types for the media manager.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, keys, what went wrong
//! - **Contain per-file failures** - only index errors are fatal to a run

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum MediaManagerError {
    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that occur while walking a source tree
#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Errors that occur while computing a content digest
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the persistent key-value index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to open index at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Index query failed: {0}")]
    QueryFailed(String),

    #[error("Index lock poisoned at {path}. Another worker panicked while writing.")]
    Poisoned { path: PathBuf },
}

/// Errors that occur while copying or moving a file into place
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to reserve destination {path}: {source}")]
    Reserve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the image format converter
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion of {path} failed: {reason}")]
    Failed { path: PathBuf, reason: String },
}

/// Errors from the reverse geocoding service
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Geocoding request failed: {0}")]
    Request(String),

    #[error("Unexpected geocoding response: {0}")]
    InvalidResponse(String),
}

/// Errors loading or saving settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}. Run `mediamanager config init` first.")]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("Could not determine the home directory")]
    NoHomeDirectory,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, MediaManagerError>;
