//! Build pipeline integration tests.
//!
//! Exercises the full pass over a real temporary project: discovery,
//! stream planning, staleness filtering, job scheduling, and build
//! database persistence.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use bakery::build::progress::{ProgressEvent, ProgressReporter};
use bakery::build::{BuildContext, BuildDatabase, BuildError, BuildPipeline, DATABASE_FILENAME};
use bakery::config::{default_config, BakeryConfig, StreamConfig};
use bakery::converter::{
    Convert, ConversionRecord, Converter, ConverterRegistry, ConvertError,
};

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a test file with content.
fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

/// A converter that writes `<stem>.out` files and records whatever extra
/// dependency its options declare.
struct MockConvert;

impl Convert for MockConvert {
    fn convert(
        &self,
        _config: &BakeryConfig,
        options: &toml::Table,
        src_dir: &Path,
        dst_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Vec<ConversionRecord>, ConvertError> {
        let mut records = Vec::new();
        for file in files {
            let rel = file.strip_prefix(src_dir).unwrap();
            let name = rel.file_name().unwrap().to_string_lossy();
            let stem = name.split('.').next().unwrap_or(&name);
            let out_rel = rel.with_file_name(format!("{}.out", stem));

            let dst = dst_dir.join(&out_rel);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            let quality = options.get("quality").and_then(|v| v.as_str()).unwrap_or("default");
            fs::write(&dst, quality)?;

            let dependencies = options
                .get("extra_dep")
                .and_then(|v| v.as_str())
                .map(|d| vec![d.to_string()])
                .unwrap_or_default();

            records.push(ConversionRecord {
                input_file: rel.to_string_lossy().into_owned(),
                output_file: out_rel.to_string_lossy().into_owned(),
                dependencies,
            });
        }
        Ok(records)
    }
}

/// A converter that always fails.
struct FailingConvert;

impl Convert for FailingConvert {
    fn convert(
        &self,
        _config: &BakeryConfig,
        _options: &toml::Table,
        _src_dir: &Path,
        _dst_dir: &Path,
        _files: &[PathBuf],
    ) -> Result<Vec<ConversionRecord>, ConvertError> {
        Err(ConvertError::Failed("mock failure".to_string()))
    }
}

fn mock_registry(batch_size: usize) -> ConverterRegistry {
    let mut registry = ConverterRegistry::with_builtins();
    registry.register(
        Converter::new("mock", Arc::new(MockConvert))
            .with_extensions([".special"])
            .with_output_extension(".out")
            .with_batch_size(batch_size),
    );
    registry
}

fn mock_config() -> BakeryConfig {
    let mut config = default_config();
    config.general.plugins.push("mock".to_string());
    config
}

fn pipeline_with(temp: &TempDir, config: BakeryConfig, registry: ConverterRegistry) -> BuildPipeline {
    let context = BuildContext::new(config, temp.path().to_path_buf());
    BuildPipeline::new(context).with_registry(registry)
}

/// Reporter that records every event for later inspection.
#[derive(Default)]
struct EventLog(Mutex<Vec<ProgressEvent>>);

impl ProgressReporter for EventLog {
    fn report(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

impl EventLog {
    fn total_jobs(&self) -> Option<usize> {
        self.0.lock().unwrap().iter().find_map(|e| match e {
            ProgressEvent::BuildStarted { total_jobs } => Some(*total_jobs),
            _ => None,
        })
    }

    fn completed_labels(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::JobCompleted { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// End-to-End Builds
// ============================================================================

#[test]
fn test_mixed_tree_routes_and_converts() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");
    create_test_file(&assets, "b.special", "source");
    create_test_file(&assets, "sub/c.special", "source");

    let summary = pipeline_with(&temp, mock_config(), mock_registry(16)).build().unwrap();
    assert_eq!(summary.converted, 3);

    let export = temp.path().join(".built_assets");
    assert_eq!(fs::read_to_string(export.join("a.txt")).unwrap(), "text");
    assert!(export.join("b.out").is_file());
    assert!(export.join("sub/c.out").is_file());
    assert!(!export.join("b.special").exists());
}

#[test]
fn test_rebuild_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");
    create_test_file(&assets, "b.special", "source");

    pipeline_with(&temp, mock_config(), mock_registry(16)).build().unwrap();
    let db_path = temp.path().join(DATABASE_FILENAME);
    let before = fs::read(&db_path).unwrap();

    let summary = pipeline_with(&temp, mock_config(), mock_registry(16)).build().unwrap();
    assert_eq!(summary.converted, 0);
    assert_eq!(summary.up_to_date, 2);
    assert_eq!(fs::read(&db_path).unwrap(), before);
}

#[test]
fn test_touched_source_rebuilds_only_that_file() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    let a = create_test_file(&assets, "a.txt", "text");
    create_test_file(&assets, "b.special", "source");

    pipeline_with(&temp, mock_config(), mock_registry(16)).build().unwrap();
    set_mtime(&a, SystemTime::now() + Duration::from_secs(5));

    let summary = pipeline_with(&temp, mock_config(), mock_registry(16)).build().unwrap();
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.up_to_date, 1);
}

#[test]
fn test_recorded_dependency_triggers_rebuild() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "b.special", "source");
    let dep = create_test_file(&assets, "d.dat", "palette");

    // d.dat routes to copyfile; the mock converter also declares it as a
    // dependency of b.out via its options block.
    let mut config = mock_config();
    let block: toml::Table = toml::from_str("extra_dep = \"d.dat\"").unwrap();
    config.plugins.insert("mock".to_string(), toml::Value::Table(block));

    pipeline_with(&temp, config.clone(), mock_registry(16)).build().unwrap();

    set_mtime(&dep, SystemTime::now() + Duration::from_secs(5));
    let summary = pipeline_with(&temp, config, mock_registry(16)).build().unwrap();

    // d.dat itself is stale for copyfile, and its staleness propagates to
    // b.special through the recorded dependency.
    assert_eq!(summary.converted, 2);
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_batch_size_chunks_jobs() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    for i in 0..5 {
        create_test_file(&assets, &format!("f{}.special", i), "source");
    }

    let log = Arc::new(EventLog::default());
    let pipeline = pipeline_with(&temp, mock_config(), mock_registry(2))
        .with_reporter(Arc::clone(&log) as Arc<dyn ProgressReporter>);
    pipeline.build().unwrap();

    assert_eq!(log.total_jobs(), Some(3)); // ceil(5/2)
    assert_eq!(log.completed_labels().len(), 3);

    for i in 0..5 {
        assert!(temp.path().join(format!(".built_assets/f{}.out", i)).is_file());
    }
}

#[test]
fn test_failed_job_discards_run() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");

    pipeline_with(&temp, default_config(), ConverterRegistry::with_builtins())
        .build()
        .unwrap();
    let db_path = temp.path().join(DATABASE_FILENAME);
    let before = fs::read(&db_path).unwrap();

    create_test_file(&assets, "b.boom", "source");
    let mut registry = ConverterRegistry::with_builtins();
    registry.register(Converter::new("boom", Arc::new(FailingConvert)).with_extensions([".boom"]));
    let mut config = default_config();
    config.general.plugins.push("boom".to_string());
    set_mtime(&assets.join("a.txt"), SystemTime::now() + Duration::from_secs(5));

    let result = pipeline_with(&temp, config, registry).build();
    assert!(matches!(result, Err(BuildError::Conversion { .. })));
    assert_eq!(fs::read(&db_path).unwrap(), before, "failed run must not touch the database");
}

/// A converter that cancels the build from inside its first invocation,
/// the way a Ctrl-C handler would mid-run.
struct CancellingConvert {
    token: bakery::build::CancelToken,
}

impl Convert for CancellingConvert {
    fn convert(
        &self,
        config: &BakeryConfig,
        options: &toml::Table,
        src_dir: &Path,
        dst_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Vec<ConversionRecord>, ConvertError> {
        self.token.cancel();
        MockConvert.convert(config, options, src_dir, dst_dir, files)
    }
}

#[test]
fn test_midbuild_cancel_leaves_database_untouched() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");

    // Seed the database with a clean run first.
    pipeline_with(&temp, default_config(), ConverterRegistry::with_builtins())
        .build()
        .unwrap();
    let db_path = temp.path().join(DATABASE_FILENAME);
    let before = fs::read(&db_path).unwrap();

    for i in 0..4 {
        create_test_file(&assets, &format!("f{}.special", i), "source");
    }

    let context = BuildContext::new(mock_config(), temp.path().to_path_buf());
    let pipeline = BuildPipeline::new(context);

    // Cancellation arrives while the first job is already running.
    let mut registry = ConverterRegistry::with_builtins();
    registry.register(
        Converter::new("mock", Arc::new(CancellingConvert { token: pipeline.cancel_token() }))
            .with_extensions([".special"])
            .with_output_extension(".out"),
    );

    let result = pipeline.with_registry(registry).build();
    assert!(matches!(result, Err(BuildError::Interrupted)));
    assert_eq!(
        fs::read(&db_path).unwrap(),
        before,
        "interrupted run must leave the database byte-identical"
    );
}

#[test]
fn test_cancelled_run_discards_results() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");

    let pipeline = pipeline_with(&temp, default_config(), ConverterRegistry::with_builtins());
    pipeline.cancel_token().cancel();

    let result = pipeline.build();
    assert!(matches!(result, Err(BuildError::Interrupted)));
    assert!(!temp.path().join(DATABASE_FILENAME).exists());
}

// ============================================================================
// Database Recovery
// ============================================================================

#[test]
fn test_malformed_database_forces_full_rebuild() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");
    create_test_file(temp.path(), DATABASE_FILENAME, "not json at all {{{");

    let summary = pipeline_with(&temp, default_config(), ConverterRegistry::with_builtins())
        .build()
        .unwrap();
    assert_eq!(summary.converted, 1);

    let db = BuildDatabase::load(&temp.path().join(DATABASE_FILENAME));
    assert_eq!(db.len(), 1);
}

// ============================================================================
// Explicit Streams and Overrides
// ============================================================================

#[test]
fn test_override_options_reach_converter() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "hero.special", "source");
    create_test_file(&assets, "low_rock.special", "source");

    let mut config = mock_config();
    let block: toml::Table = toml::from_str(
        r#"
        quality = "high"

        [[overrides]]
        pattern = "low_*"
        quality = "low"
    "#,
    )
    .unwrap();
    config.plugins.insert("mock".to_string(), toml::Value::Table(block));

    pipeline_with(&temp, config, mock_registry(16)).build().unwrap();

    let export = temp.path().join(".built_assets");
    assert_eq!(fs::read_to_string(export.join("hero.out")).unwrap(), "high");
    assert_eq!(fs::read_to_string(export.join("low_rock.out")).unwrap(), "low");
}

#[test]
fn test_explicit_streams_replace_implicit_routing() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");
    create_test_file(&assets, "b.special", "source");

    // Only the declared stream builds; b.special is left out entirely.
    let mut config = mock_config();
    config.build.streams.push(StreamConfig {
        plugin: "copyfile".to_string(),
        include_patterns: vec!["*.txt".to_string()],
        ..Default::default()
    });

    let summary = pipeline_with(&temp, config, mock_registry(16)).build().unwrap();
    assert_eq!(summary.converted, 1);
    assert!(temp.path().join(".built_assets/a.txt").is_file());
    assert!(!temp.path().join(".built_assets/b.out").exists());
}

#[test]
fn test_unknown_plugin_aborts_without_building() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");

    let mut config = default_config();
    config.build.streams.push(StreamConfig {
        plugin: "copyfile".to_string(),
        include_patterns: vec!["*.txt".to_string()],
        ..Default::default()
    });
    config.build.streams.push(StreamConfig {
        plugin: "ghost".to_string(),
        include_patterns: vec!["*".to_string()],
        ..Default::default()
    });

    let result = pipeline_with(&temp, config, ConverterRegistry::with_builtins()).build();
    assert!(matches!(result, Err(BuildError::UnknownConverter(name)) if name == "ghost"));
    assert!(!temp.path().join(".built_assets/a.txt").exists());
}

// ============================================================================
// Ignore Patterns
// ============================================================================

#[test]
fn test_ignore_patterns_exclude_files() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    create_test_file(&assets, "a.txt", "text");
    create_test_file(&assets, "a.txt~", "backup");
    create_test_file(&assets, "notes/scratch.tmp", "scratch");

    let mut config = default_config();
    config.build.ignore_patterns = vec!["*~".to_string(), "*.tmp".to_string()];

    let summary = pipeline_with(&temp, config, ConverterRegistry::with_builtins())
        .build()
        .unwrap();
    assert_eq!(summary.converted, 1);
    assert!(!temp.path().join(".built_assets/a.txt~").exists());
    assert!(!temp.path().join(".built_assets/notes/scratch.tmp").exists());
}
