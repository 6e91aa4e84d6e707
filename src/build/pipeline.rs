//! Build orchestration.
//!
//! A build is one pass over the whole pipeline: load the build database,
//! plan streams, drop up-to-date files, chunk the rest into jobs, run
//! them on the worker pool, then merge the new conversion records and
//! persist the database. Persistence is all-or-nothing per run: a failed
//! or interrupted build leaves the database file untouched, so the next
//! build simply redoes the lost work.

use crate::build::context::BuildContext;
use crate::build::database::BuildDatabase;
use crate::build::discovery::DiscoveryError;
use crate::build::progress::{NullProgress, ProgressEvent, ProgressReporter};
use crate::build::scheduler::{CancelToken, Job, JobScheduler};
use crate::build::staleness::filter_stale;
use crate::build::stream::plan_streams;
use crate::converter::ConverterRegistry;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Error during a build run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// File discovery failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A stream names a plugin no registered converter provides
    #[error("No converter registered for plugin '{0}'")]
    UnknownConverter(String),
    /// A conversion job failed
    #[error("Job '{job}' failed: {message}")]
    Conversion {
        /// Label of the failed job
        job: String,
        /// Converter error message
        message: String,
    },
    /// The build was cancelled before completion
    #[error("Build interrupted")]
    Interrupted,
}

/// Outcome of a successful build run.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// Number of jobs executed
    pub jobs_run: usize,
    /// Number of conversion records produced
    pub converted: usize,
    /// Number of files skipped as up to date
    pub up_to_date: usize,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// The full asset build pipeline.
pub struct BuildPipeline {
    context: BuildContext,
    registry: ConverterRegistry,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
    dry_run: bool,
}

impl BuildPipeline {
    /// Create a pipeline with the built-in converters and no reporting.
    pub fn new(context: BuildContext) -> Self {
        Self {
            context,
            registry: ConverterRegistry::with_builtins(),
            reporter: Arc::new(NullProgress),
            cancel: CancelToken::new(),
            dry_run: false,
        }
    }

    /// Replace the converter registry.
    pub fn with_registry(mut self, registry: ConverterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Plan only: report what would be built without running any job.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get a token that cancels this pipeline's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run one build pass.
    pub fn build(&self) -> Result<BuildSummary, BuildError> {
        let start = Instant::now();
        let result = self.run(start);

        if let Err(error) = &result {
            // Tear down the job display before surfacing the error.
            self.reporter.report(ProgressEvent::BuildCompleted {
                success: false,
                converted: 0,
                up_to_date: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            });
            self.reporter.report(ProgressEvent::Error { message: error.to_string() });
        }

        result
    }

    fn run(&self, start: Instant) -> Result<BuildSummary, BuildError> {
        let ctx = &self.context;
        let reporter = self.reporter.as_ref();
        let src_dir = ctx.asset_dir();
        let dst_dir = ctx.export_dir();

        reporter.report(ProgressEvent::Notice {
            message: format!(
                "Reading assets from {}, exporting to {}",
                src_dir.display(),
                dst_dir.display()
            ),
        });

        // A project without its asset directory yet is not an error.
        if !src_dir.is_dir() {
            reporter.report(ProgressEvent::Warning {
                message: format!("Could not find asset directory: {}", src_dir.display()),
            });
            return Ok(BuildSummary {
                duration_ms: start.elapsed().as_millis() as u64,
                ..BuildSummary::default()
            });
        }

        if !dst_dir.is_dir() {
            reporter.report(ProgressEvent::Notice {
                message: format!("Creating asset export directory: {}", dst_dir.display()),
            });
            fs::create_dir_all(&dst_dir)?;
        }

        let db_path = ctx.database_path();
        let db = BuildDatabase::load(&db_path);

        let converters = self.registry.enabled(&ctx.config().general.plugins);
        let streams = plan_streams(ctx, &converters, reporter)?;

        let mut jobs = Vec::new();
        let mut up_to_date = 0;
        for stream in &streams {
            // Misconfigured plugins abort the run before any job starts.
            let converter = stream
                .converter
                .as_ref()
                .ok_or_else(|| BuildError::UnknownConverter(stream.plugin.clone()))?;

            let stale =
                filter_stale(converter, &stream.files, &db, &src_dir, &dst_dir, reporter);
            up_to_date += stream.files.len() - stale.len();
            jobs.extend(Job::chunk(converter, &stream.options, &stale, &src_dir));
        }

        if self.dry_run {
            for job in &jobs {
                reporter.report(ProgressEvent::Notice {
                    message: format!("Would run {}", job.label),
                });
            }
            return Ok(BuildSummary {
                jobs_run: 0,
                converted: 0,
                up_to_date,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let scheduler = JobScheduler::new()
            .with_workers(ctx.config().build.jobs)
            .with_reporter(Arc::clone(&self.reporter))
            .with_cancel_token(self.cancel.clone());

        let records = scheduler.run(ctx, &jobs)?;
        let converted = records.len();

        let mut db = db;
        db.merge(records);
        db.save(&db_path)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        reporter.report(ProgressEvent::BuildCompleted {
            success: true,
            converted,
            up_to_date,
            duration_ms,
        });

        Ok(BuildSummary { jobs_run: jobs.len(), converted, up_to_date, duration_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(&path).unwrap().write_all(b"data").unwrap();
        path
    }

    fn pipeline(temp: &TempDir) -> BuildPipeline {
        BuildPipeline::new(BuildContext::new(default_config(), temp.path().to_path_buf()))
    }

    #[test]
    fn test_build_copies_assets() {
        let temp = TempDir::new().unwrap();
        create_test_file(&temp.path().join("assets"), "a.txt");
        create_test_file(&temp.path().join("assets"), "maps/level1.txt");

        let summary = pipeline(&temp).build().unwrap();
        assert_eq!(summary.converted, 2);
        assert!(temp.path().join(".built_assets/a.txt").is_file());
        assert!(temp.path().join(".built_assets/maps/level1.txt").is_file());
    }

    #[test]
    fn test_build_missing_asset_dir_succeeds_empty() {
        let temp = TempDir::new().unwrap();

        let summary = pipeline(&temp).build().unwrap();
        assert_eq!(summary.jobs_run, 0);
        assert!(!temp.path().join(".built_assets").exists());
    }

    #[test]
    fn test_build_persists_database() {
        let temp = TempDir::new().unwrap();
        create_test_file(&temp.path().join("assets"), "a.txt");

        pipeline(&temp).build().unwrap();

        let db = BuildDatabase::load(&temp.path().join(".bakery-builddb"));
        assert_eq!(db.len(), 1);
        assert!(db.get("a.txt").is_some());
    }

    #[test]
    fn test_second_build_is_noop() {
        let temp = TempDir::new().unwrap();
        create_test_file(&temp.path().join("assets"), "a.txt");

        pipeline(&temp).build().unwrap();
        let summary = pipeline(&temp).build().unwrap();
        assert_eq!(summary.converted, 0);
        assert_eq!(summary.up_to_date, 1);
    }

    #[test]
    fn test_dry_run_runs_nothing() {
        let temp = TempDir::new().unwrap();
        create_test_file(&temp.path().join("assets"), "a.txt");

        let summary = pipeline(&temp).with_dry_run(true).build().unwrap();
        assert_eq!(summary.jobs_run, 0);
        assert!(!temp.path().join(".built_assets/a.txt").exists());
        assert!(!temp.path().join(".bakery-builddb").exists());
    }

    #[test]
    fn test_unknown_plugin_fails_before_jobs() {
        let temp = TempDir::new().unwrap();
        create_test_file(&temp.path().join("assets"), "a.txt");

        let mut config = default_config();
        config.build.streams.push(crate::config::StreamConfig {
            plugin: "ghost".to_string(),
            include_patterns: vec!["*".to_string()],
            ..Default::default()
        });

        let pipeline =
            BuildPipeline::new(BuildContext::new(config, temp.path().to_path_buf()));
        let result = pipeline.build();
        assert!(matches!(result, Err(BuildError::UnknownConverter(name)) if name == "ghost"));
        assert!(!temp.path().join(".built_assets/a.txt").exists());
    }

    #[test]
    fn test_cancelled_build_leaves_database_untouched() {
        let temp = TempDir::new().unwrap();
        create_test_file(&temp.path().join("assets"), "a.txt");

        let pipeline = pipeline(&temp);
        pipeline.cancel_token().cancel();

        let result = pipeline.build();
        assert!(matches!(result, Err(BuildError::Interrupted)));
        assert!(!temp.path().join(".bakery-builddb").exists());
    }
}
