//! Integration tests for configuration loading

use stepgen::config::ConfigLoader;
use stepgen::generation::ImageFailurePolicy;
use stepgen::pipeline::SamplerKind;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that touch STEPGEN_* variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_file_sets_run_and_logging() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("stepgen.toml");
    std::fs::write(
        &config_file,
        r#"
[run]
outpath = "/data/out"
data_type = "bridge_data"
task = "u-plan"
use_task_hint = true
n_samples = 4
n_iter = 2
scale = 7.5
sampler = "dpm"
save_task_grid = true
failure_policy = "abort"
caption_suppressed_tasks = ["u-plan"]

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.run.n_samples, 4);
    assert_eq!(config.run.n_iter, 2);
    assert_eq!(config.run.scale, 7.5);
    assert_eq!(config.run.sampler, SamplerKind::Dpm);
    assert_eq!(config.run.failure_policy, ImageFailurePolicy::Abort);
    assert!(config.run.save_task_grid);
    assert!(!config.run.writes_captions());
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("stepgen.toml");
    std::fs::write(&config_file, "[run]\nn_samples = 4\ntask = \"caption\"\n").unwrap();

    std::env::set_var("STEPGEN_RUN__N_SAMPLES", "8");
    std::env::set_var("STEPGEN_RUN__USE_BRIDGE", "true");
    let loaded = ConfigLoader::load(Some(&config_file));
    std::env::remove_var("STEPGEN_RUN__N_SAMPLES");
    std::env::remove_var("STEPGEN_RUN__USE_BRIDGE");

    let config = loaded.unwrap();
    assert_eq!(config.run.n_samples, 8);
    assert!(config.run.use_bridge);
    assert_eq!(config.run.task, "caption");
}

#[test]
fn test_defaults_without_sources() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let config = ConfigLoader::load(None).unwrap();
    assert_eq!(config.run.watermark, "SDV2");
    assert_eq!(
        config.run.caption_suppressed_tasks,
        vec!["u-plan".to_string(), "m-plan".to_string()]
    );
}
