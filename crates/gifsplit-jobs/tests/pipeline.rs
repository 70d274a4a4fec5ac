//! End-to-end pipeline tests that run without the external engine:
//! frames are generated in-process and encoded through a real job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::{Rgba, RgbaImage};

use gifsplit_jobs::{
    EncodeRequest, JobManager, JobRegistry, JobsConfig, ProgressMessage,
};
use gifsplit_media::EncodeOptions;
use gifsplit_models::{JobId, JobState, JobStatus};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gifsplit_jobs=debug")
        .try_init();
}

fn test_manager() -> (Arc<JobManager>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = JobsConfig {
        work_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let manager = Arc::new(JobManager::new(Arc::new(JobRegistry::new()), config));
    (manager, dir)
}

fn write_frames(dir: &Path, count: usize) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for i in 0..count {
        let shade = ((i * 60) % 256) as u8;
        let img = RgbaImage::from_pixel(24, 24, Rgba([shade, 80, 160, 255]));
        let path = dir.join(format!("input_{:02}.png", i + 1));
        img.save(&path)?;
        paths.push(path);
    }
    Ok(paths)
}

async fn wait_terminal(manager: &JobManager, id: &JobId) -> JobStatus {
    for _ in 0..400 {
        if let Some(status) = manager.status(id).await {
            if status.state.is_terminal() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job did not reach a terminal state in time");
}

fn decoded_frame_count(bytes: &[u8]) -> usize {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes).unwrap();
    let mut count = 0;
    while decoder.read_next_frame().unwrap().is_some() {
        count += 1;
    }
    count
}

#[tokio::test]
async fn encode_job_produces_playable_gif() -> Result<()> {
    init_tracing();
    let (manager, dir) = test_manager();
    let frames = write_frames(dir.path(), 4)?;

    let id = manager
        .spawn_encode(EncodeRequest {
            frames,
            options: EncodeOptions::default(),
            file_name: Some("clip".to_string()),
        })
        .await?;

    // Collect whatever events we are subscribed in time for.
    let mut rx = manager.subscribe(&id).await.expect("channel exists");
    let collector = tokio::spawn(async move {
        let mut percents = Vec::new();
        while let Ok(event) = rx.recv().await {
            match event.message {
                ProgressMessage::Progress { percent } => percents.push(percent),
                ProgressMessage::ItemCompleted { percent, .. } => percents.push(percent),
                ProgressMessage::Completed
                | ProgressMessage::Failed { .. }
                | ProgressMessage::Cancelled => break,
                _ => {}
            }
        }
        percents
    });

    let status = wait_terminal(&manager, &id).await;
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.progress, 100.0);
    assert_eq!(status.item_count, 1);

    let output = manager.result(&id).await.expect("completed job has a result");
    assert_eq!(output.items.len(), 1);
    assert_eq!(output.items[0].name, "clip.gif");

    let bytes = tokio::fs::read(&output.items[0].path).await?;
    assert_eq!(decoded_frame_count(&bytes), 4);

    let percents = collector.await?;
    for pair in percents.windows(2) {
        assert!(pair[1] >= pair[0], "progress must be non-decreasing: {:?}", percents);
    }
    Ok(())
}

#[tokio::test]
async fn single_frame_encodes_as_static_gif() -> Result<()> {
    let (manager, dir) = test_manager();
    let frames = write_frames(dir.path(), 1)?;

    let id = manager
        .spawn_encode(EncodeRequest {
            frames,
            options: EncodeOptions::default(),
            file_name: None,
        })
        .await?;

    let status = wait_terminal(&manager, &id).await;
    assert_eq!(status.state, JobState::Completed);

    let output = manager.result(&id).await.unwrap();
    assert_eq!(output.items[0].name, "animation.gif");
    let bytes = tokio::fs::read(&output.items[0].path).await?;
    assert_eq!(decoded_frame_count(&bytes), 1);
    Ok(())
}

#[tokio::test]
async fn unreadable_frames_are_skipped_not_fatal() -> Result<()> {
    let (manager, dir) = test_manager();
    let mut frames = write_frames(dir.path(), 2)?;

    // A corrupt entry in the middle is logged and skipped.
    let bad = dir.path().join("corrupt.png");
    tokio::fs::write(&bad, b"not a png").await?;
    frames.insert(1, bad);

    let id = manager
        .spawn_encode(EncodeRequest {
            frames,
            options: EncodeOptions::default(),
            file_name: None,
        })
        .await?;

    let status = wait_terminal(&manager, &id).await;
    assert_eq!(status.state, JobState::Completed);

    let output = manager.result(&id).await.unwrap();
    let bytes = tokio::fs::read(&output.items[0].path).await?;
    assert_eq!(decoded_frame_count(&bytes), 2);
    Ok(())
}

#[tokio::test]
async fn all_frames_unreadable_fails_the_job() -> Result<()> {
    let (manager, dir) = test_manager();
    let bad = dir.path().join("corrupt.png");
    tokio::fs::write(&bad, b"not a png").await?;

    let id = manager
        .spawn_encode(EncodeRequest {
            frames: vec![bad],
            options: EncodeOptions::default(),
            file_name: None,
        })
        .await?;

    let status = wait_terminal(&manager, &id).await;
    assert_eq!(status.state, JobState::Failed);
    assert!(status.error.is_some());
    Ok(())
}

#[tokio::test]
async fn archive_requests_are_idempotent() -> Result<()> {
    let (manager, dir) = test_manager();
    let frames = write_frames(dir.path(), 3)?;

    let id = manager
        .spawn_encode(EncodeRequest {
            frames,
            options: EncodeOptions::default(),
            file_name: None,
        })
        .await?;
    wait_terminal(&manager, &id).await;

    let first_path = manager.archive(&id, "gifs").await?;
    let first = tokio::fs::read(&first_path).await?;

    let second_path = manager.archive(&id, "gifs").await?;
    let second = tokio::fs::read(&second_path).await?;

    assert_eq!(first_path, second_path);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn archive_of_incomplete_job_is_rejected() -> Result<()> {
    let (manager, dir) = test_manager();
    let frames = write_frames(dir.path(), 2)?;

    let id = manager
        .spawn_encode(EncodeRequest {
            frames,
            options: EncodeOptions::default(),
            file_name: None,
        })
        .await?;

    // Whether or not the worker has finished by now, an unknown job id
    // must always be a lookup failure, never a crash.
    let missing = JobId::new();
    assert!(manager.archive(&missing, "gifs").await.is_err());

    wait_terminal(&manager, &id).await;
    Ok(())
}
