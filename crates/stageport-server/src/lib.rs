//! Stageport Server Library
//!
//! Submits staged CSV files to a bulk-import service in configured batches
//! and tracks each run's progress in a document store.
//!
//! # Overview
//!
//! - **import**: the pipeline (discovery, job building, submission, run state)
//! - **storage**: the staging area (S3-compatible, or in memory)
//! - **api**: HTTP trigger and run status endpoints
//! - **bootstrap**: production wiring shared by the server and job binaries
//!
//! # Example
//!
//! ```no_run
//! use stageport_server::{bootstrap, config::Config, import::BatchSelector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let services = bootstrap::build(&config).await?;
//!     let outcome = services
//!         .orchestrator
//!         .run("2025-05-22", BatchSelector::Explicit(1))
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod middleware;
pub mod storage;

pub use error::AppError;
