//! End-to-end runs through the orchestrator against the fake pipeline.

use super::test_utils::{list, run, run_config, SIDE};
use stepgen::error::RunError;
use stepgen::generation::{Addressing, OutputLayout, TaskBoundaries};
use stepgen::watermark::SignatureWatermark;
use tempfile::TempDir;

fn stream_at(starts: &[usize]) -> Addressing {
    Addressing::StreamPosition(TaskBoundaries::new(starts.iter().copied()))
}

#[test]
fn five_prompts_split_into_two_tasks() {
    let temp = TempDir::new().unwrap();
    let config = run_config(temp.path());
    let summary = run(&config, 5, &stream_at(&[0, 3])).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(
        layout.task_root(),
        temp.path().join("bridge_data/origin/caption")
    );
    assert_eq!(list(layout.task_root()), vec!["task_0", "task_1"]);
    assert_eq!(
        list(&layout.task_dir(0)),
        vec![
            "step_0.png",
            "step_0.txt",
            "step_1.png",
            "step_1.txt",
            "step_2.png",
            "step_2.txt"
        ]
    );
    assert_eq!(
        list(&layout.task_dir(1)),
        vec!["step_0.png", "step_0.txt", "step_1.png", "step_1.txt"]
    );
    assert_eq!(
        std::fs::read_to_string(layout.caption_path(1, 0)).unwrap(),
        "move the block 3"
    );
    assert_eq!(summary.sample_count, 5);
    assert_eq!(summary.tasks_opened, 2);
    assert_eq!(summary.images_written, 5);
    assert_eq!(summary.captions_written, 5);
    assert_eq!(summary.grids_written, 0);

    let first_of_second_task = image::open(layout.image_path(1, 0)).unwrap().to_rgb8();
    assert_eq!(first_of_second_task.get_pixel(0, 0).0[0], 3);
}

#[test]
fn caption_suppressed_tasks_write_images_only() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.task = "u-plan".to_string();
    let summary = run(&config, 3, &stream_at(&[0])).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(
        list(&layout.task_dir(0)),
        vec!["step_0.png", "step_1.png", "step_2.png"]
    );
    assert_eq!(summary.captions_written, 0);
}

#[test]
fn task_directories_match_boundary_crossings() {
    let temp = TempDir::new().unwrap();
    let config = run_config(temp.path());
    run(&config, 7, &stream_at(&[2, 4, 5])).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(
        list(layout.task_root()),
        vec!["task_0", "task_1", "task_2", "task_3"]
    );
    let pngs = |task| {
        list(&layout.task_dir(task))
            .into_iter()
            .filter(|n| n.ends_with(".png"))
            .count()
    };
    assert_eq!(
        (pngs(0), pngs(1), pngs(2), pngs(3)),
        (2, 2, 1, 2)
    );
}

#[test]
fn grid_written_once_per_task_without_reference_frame() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.save_task_grid = true;
    let summary = run(&config, 5, &stream_at(&[0, 3])).unwrap();
    assert_eq!(summary.grids_written, 2);

    let layout = OutputLayout::from_config(&config);
    let cell = SIDE + 2;
    let grid_0 = image::open(layout.grid_path(0)).unwrap().to_rgb8();
    assert_eq!(grid_0.dimensions(), (2 * cell + 2, SIDE + 4));
    // first cell shows step 1, not the reference frame
    assert_eq!(grid_0.get_pixel(2, 2).0[0], 1);
    assert_eq!(grid_0.get_pixel(2 + cell, 2).0[0], 2);
    assert_eq!(SignatureWatermark::decode(&grid_0, 4), b"SDV2".to_vec());

    let grid_1 = image::open(layout.grid_path(1)).unwrap().to_rgb8();
    assert_eq!(grid_1.dimensions(), (cell + 2, SIDE + 4));
    assert!(list(&layout.task_dir(1)).contains(&"task-grid-1.png".to_string()));
}

#[test]
fn grid_can_keep_reference_frame() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.save_task_grid = true;
    config.exclude_reference_frame_from_grid = false;
    run(&config, 3, &stream_at(&[0])).unwrap();

    let layout = OutputLayout::from_config(&config);
    let grid = image::open(layout.grid_path(0)).unwrap().to_rgb8();
    assert_eq!(grid.dimensions(), (3 * (SIDE + 2) + 2, SIDE + 4));
    assert_eq!(grid.get_pixel(2, 2).0[0], 0);
}

#[test]
fn single_image_task_gets_no_grid() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.save_task_grid = true;
    let summary = run(&config, 3, &stream_at(&[0, 2])).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(summary.grids_written, 1);
    assert!(layout.grid_path(0).exists());
    assert!(!layout.grid_path(1).exists());
}

#[test]
fn every_image_carries_the_watermark() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.watermark = "TASK".to_string();
    run(&config, 2, &stream_at(&[0])).unwrap();

    let layout = OutputLayout::from_config(&config);
    for step in 0..2 {
        let written = image::open(layout.image_path(0, step)).unwrap().to_rgb8();
        assert_eq!(SignatureWatermark::decode(&written, 4), b"TASK".to_vec());
    }
}

#[test]
fn boundaries_continue_across_iterations() {
    let temp = TempDir::new().unwrap();
    let mut config = run_config(temp.path());
    config.n_iter = 2;
    let summary = run(&config, 2, &stream_at(&[0, 3])).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(summary.sample_count, 4);
    assert_eq!(
        list(&layout.task_dir(0))
            .into_iter()
            .filter(|n| n.ends_with(".png"))
            .collect::<Vec<_>>(),
        vec!["step_0.png", "step_1.png", "step_2.png"]
    );
    assert_eq!(
        list(&layout.task_dir(1)),
        vec!["step_0.png", "step_0.txt"]
    );
}

#[test]
fn explicit_step_names_file_verbatim() {
    let temp = TempDir::new().unwrap();
    let config = run_config(temp.path());
    let summary = run(&config, 1, &Addressing::ExplicitStep(7)).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(list(layout.task_root()), vec!["task_0"]);
    assert_eq!(
        list(&layout.task_dir(0)),
        vec!["step_7.png", "step_7.txt"]
    );
    assert_eq!(summary.tasks_opened, 1);
}

#[test]
fn explicit_step_zero_opens_a_task_per_image() {
    let temp = TempDir::new().unwrap();
    let config = run_config(temp.path());
    run(&config, 2, &Addressing::ExplicitStep(0)).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(list(layout.task_root()), vec!["task_0", "task_1"]);
    assert_eq!(
        list(&layout.task_dir(1)),
        vec!["step_0.png", "step_0.txt"]
    );
}

#[test]
fn contradictory_addressing_is_rejected_before_writing() {
    let temp = TempDir::new().unwrap();
    let resolved = Addressing::resolve(Some(vec![0, 3]), Some(2));
    assert!(matches!(resolved, Err(RunError::Config(_))));

    let config = run_config(temp.path());
    let result = run(&config, 3, &Addressing::ExplicitStep(2));
    assert!(matches!(result, Err(RunError::Config(_))));
    assert!(list(temp.path()).is_empty());
}

#[test]
fn rerun_over_existing_tree_succeeds() {
    let temp = TempDir::new().unwrap();
    let config = run_config(temp.path());
    run(&config, 4, &stream_at(&[0, 2])).unwrap();
    let summary = run(&config, 4, &stream_at(&[0, 2])).unwrap();

    let layout = OutputLayout::from_config(&config);
    assert_eq!(summary.images_written, 4);
    assert_eq!(list(layout.task_root()), vec!["task_0", "task_1"]);
}

#[test]
fn blocked_output_location_is_fatal() {
    let temp = TempDir::new().unwrap();
    let config = run_config(temp.path());
    std::fs::create_dir_all(temp.path().join("bridge_data")).unwrap();
    std::fs::write(temp.path().join("bridge_data/origin"), b"not a directory").unwrap();

    let result = run(&config, 2, &stream_at(&[0]));
    assert!(matches!(result, Err(RunError::Io { .. })));
}
