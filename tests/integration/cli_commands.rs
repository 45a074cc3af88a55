//! CLI route tests: dry-run planning and inventory through RunContext.

use super::test_utils::{run, run_config};
use stepgen::cli::{Commands, RunContext};
use stepgen::config::StepgenConfig;
use stepgen::error::RunError;
use stepgen::generation::{Addressing, TaskBoundaries};
use tempfile::TempDir;

fn context(temp: &TempDir) -> RunContext {
    RunContext::from_config(StepgenConfig {
        run: run_config(temp.path()),
        ..StepgenConfig::default()
    })
}

fn prompt_file(temp: &TempDir, count: usize) -> std::path::PathBuf {
    let path = temp.path().join("prompts.txt");
    let body: Vec<String> = (0..count).map(|i| format!("prompt {i}")).collect();
    std::fs::write(&path, body.join("\n")).unwrap();
    path
}

#[test]
fn plan_json_lists_every_file() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let output = ctx
        .execute(&Commands::Plan {
            prompts: prompt_file(&temp, 5),
            boundaries: Some("0,3".to_string()),
            step: None,
            format: "json".to_string(),
        })
        .unwrap();

    let report: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(report["total_images"], 5);
    assert_eq!(report["total_tasks"], 2);
    let files = report["files"].as_array().unwrap();
    assert_eq!(files.len(), 5);
    let image = files[3]["image"].as_str().unwrap();
    assert!(image.ends_with("task_1/step_0.png"));
    assert!(files[3]["caption"].as_str().unwrap().ends_with("task_1/step_0.txt"));
    assert!(files[3].get("grid").is_none());
    // planning never touches the output tree
    assert!(!temp.path().join("bridge_data").exists());
}

#[test]
fn plan_text_shows_task_relative_paths() {
    let temp = TempDir::new().unwrap();
    let output = context(&temp)
        .execute(&Commands::Plan {
            prompts: prompt_file(&temp, 1),
            boundaries: None,
            step: Some(4),
            format: "text".to_string(),
        })
        .unwrap();
    assert!(output.contains("task_0/step_4.png"));
    assert!(output.contains("1 images in 1 tasks"));
}

#[test]
fn plan_rejects_step_with_boundaries() {
    let temp = TempDir::new().unwrap();
    let result = context(&temp).execute(&Commands::Plan {
        prompts: prompt_file(&temp, 2),
        boundaries: Some("0,1".to_string()),
        step: Some(1),
        format: "text".to_string(),
    });
    assert!(matches!(result, Err(RunError::Config(_))));
}

#[test]
fn plan_accepts_step_with_empty_boundaries() {
    let temp = TempDir::new().unwrap();
    let output = context(&temp)
        .execute(&Commands::Plan {
            prompts: prompt_file(&temp, 1),
            boundaries: Some(String::new()),
            step: Some(3),
            format: "text".to_string(),
        })
        .unwrap();
    assert!(output.contains("task_0/step_3.png"));
}

#[test]
fn plan_step_zero_opens_task_per_image_despite_boundaries() {
    let temp = TempDir::new().unwrap();
    let output = context(&temp)
        .execute(&Commands::Plan {
            prompts: prompt_file(&temp, 3),
            boundaries: Some("0,2".to_string()),
            step: Some(0),
            format: "json".to_string(),
        })
        .unwrap();

    let report: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(report["total_tasks"], 3);
    let files = report["files"].as_array().unwrap();
    assert!(files[1]["image"].as_str().unwrap().ends_with("task_1/step_0.png"));
    assert!(files[2]["image"].as_str().unwrap().ends_with("task_2/step_0.png"));
}

#[test]
fn inspect_reports_written_tasks() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.save_task_grid = true;
    run(
        &config,
        5,
        &Addressing::StreamPosition(TaskBoundaries::new([3])),
    )
    .unwrap();

    let ctx = RunContext::from_config(StepgenConfig {
        run: config,
        ..StepgenConfig::default()
    });
    let output = ctx
        .execute(&Commands::Inspect {
            root: None,
            format: "json".to_string(),
        })
        .unwrap();
    let tasks: serde_json::Value = serde_json::from_str(&output).unwrap();
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["steps"], serde_json::json!([0, 1, 2]));
    assert_eq!(tasks[1]["has_grid"], true);

    let text = ctx
        .execute(&Commands::Inspect {
            root: None,
            format: "text".to_string(),
        })
        .unwrap();
    assert!(text.contains("task_1"));
}

#[test]
fn unknown_format_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let result = context(&temp).execute(&Commands::Inspect {
        root: None,
        format: "yaml".to_string(),
    });
    assert!(matches!(result, Err(RunError::Config(_))));
}
