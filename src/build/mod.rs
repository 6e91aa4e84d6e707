//! Asset build pipeline for bakery
//!
//! Converts a project's source asset tree into its exported form, doing
//! only the work whose inputs changed.
//!
//! # Overview
//!
//! A build pass consists of:
//! - **Discovery**: Find source files using glob patterns from config
//! - **Streams**: Group files by extension (or explicit config entries)
//!   into converter-bound batches
//! - **Staleness**: Drop files whose outputs are already up to date
//! - **Scheduling**: Chunk the rest into jobs and run them on a worker
//!   pool, recording each conversion in the build database
//!
//! # Example
//!
//! ```ignore
//! use bakery::build::{BuildContext, BuildPipeline};
//! use bakery::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let pipeline = BuildPipeline::new(context);
//!
//! let summary = pipeline.build()?;
//! println!("Converted {} files", summary.converted);
//! ```

pub mod context;
pub mod database;
pub mod discovery;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod staleness;
pub mod stream;

pub use context::*;
pub use database::*;
pub use discovery::*;
pub use pipeline::*;
pub use progress::*;
pub use scheduler::*;
pub use staleness::*;
pub use stream::*;
