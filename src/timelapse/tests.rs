// Orchestrator scenarios against a scripted ffmpeg stand-in

use super::*;
use crate::test_support::{test_config, FakeRunner};
use chrono::TimeZone;
use std::path::Path;
use tempfile::TempDir;

fn started() -> DateTime<Tz> {
    chrono_tz::America::New_York.with_ymd_and_hms(2024, 6, 21, 5, 5, 0).unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_successful_run_assembles_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(12);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let mut req = CaptureRequest::new("cam1", 60, 5);
    req.suffix = Some("sunrise".into());
    let out = orch.capture_at(&req, started()).unwrap();

    assert_eq!(runner.labels(), vec![CAPTURE_LABEL, ASSEMBLY_LABEL]);
    assert_eq!(out.expected_frames, 12);
    assert_eq!(out.frames_captured, 12);
    assert_eq!(out.cleanup, CleanupReport { removed: 12, failed: 0 });
    assert!(!out.raw_kept);

    assert!(out.run_prefix.starts_with("cam1_2024-06-21_05-05-00_"));
    let video = out.video_path.unwrap();
    assert!(video.exists());
    assert_eq!(
        video.file_name().unwrap().to_str().unwrap(),
        format!("{}_sunrise.mp4", out.run_prefix)
    );
    assert!(files_in(&config.raw_images_dir("cam1")).is_empty());
    assert_eq!(
        out.states,
        vec![
            RunState::Idle,
            RunState::Capturing,
            RunState::Captured,
            RunState::Assembling,
            RunState::Assembled,
            RunState::CleaningUp,
            RunState::Done,
        ]
    );
}

#[test]
fn test_capture_command_shape() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(1);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("/opt/ffmpeg/bin/ffmpeg");

    let mut req = CaptureRequest::new("cam1", 3000, 10);
    req.resolution = Some("1280x720".into());
    orch.capture_at(&req, started()).unwrap();

    let capture = runner.call(CAPTURE_LABEL).unwrap();
    assert_eq!(capture.program, Path::new("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(capture.value_of("-rtsp_transport"), Some("tcp"));
    assert_eq!(capture.value_of("-i"), Some("rtsp://192.168.1.20:554/stream1"));
    assert_eq!(capture.value_of("-t"), Some("3000"));
    assert_eq!(capture.value_of("-vf"), Some("fps=1/10"));

    let assembly = runner.call(ASSEMBLY_LABEL).unwrap();
    assert_eq!(assembly.value_of("-framerate"), Some("30"));
    assert_eq!(assembly.value_of("-vf"), Some("scale=1280:720"));
    assert_eq!(assembly.value_of("-i"), capture.args.last().map(String::as_str));
}

#[test]
fn test_http_source_has_no_rtsp_transport() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(1);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    orch.capture_at(&CaptureRequest::new("backyard", 10, 5), started()).unwrap();

    let capture = runner.call(CAPTURE_LABEL).unwrap();
    assert!(!capture.has_arg("-rtsp_transport"));
    assert!(runner.call(ASSEMBLY_LABEL).unwrap().value_of("-vf").is_none());
}

#[test]
fn test_skip_assembly_keeps_frames_even_without_keep_raw() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(6);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let mut req = CaptureRequest::new("cam1", 30, 5);
    req.skip_assembly = true;
    req.keep_raw = false;
    let out = orch.capture_at(&req, started()).unwrap();

    assert_eq!(runner.labels(), vec![CAPTURE_LABEL]);
    assert!(out.raw_kept);
    assert!(out.video_path.is_none());
    assert_eq!(files_in(&config.raw_images_dir("cam1")).len(), 6);
    assert!(files_in(&config.videos_dir("cam1")).is_empty());
    assert_eq!(
        out.states,
        vec![RunState::Idle, RunState::Capturing, RunState::Captured, RunState::Done]
    );
}

#[test]
fn test_keep_raw_skips_cleanup() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(4);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let mut req = CaptureRequest::new("cam1", 20, 5);
    req.keep_raw = true;
    let out = orch.capture_at(&req, started()).unwrap();

    assert!(out.video_path.unwrap().exists());
    assert_eq!(files_in(&config.raw_images_dir("cam1")).len(), 4);
    assert!(!out.states.contains(&RunState::CleaningUp));
}

#[test]
fn test_capture_failure_stops_before_assembly() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner {
        frames: 12,
        fail_capture: true,
        ..Default::default()
    };
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let err = orch.capture_at(&CaptureRequest::new("cam1", 60, 5), started()).unwrap_err();

    match err {
        SunlapseError::CaptureFailure(ref detail) => {
            assert!(detail.contains(CAPTURE_LABEL));
            assert!(detail.contains("exit code 1"));
            assert!(detail.contains("Connection timed out"));
        }
        ref other => panic!("expected CaptureFailure, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 7);
    assert_eq!(runner.labels(), vec![CAPTURE_LABEL]);
    assert!(files_in(&config.videos_dir("cam1")).is_empty());
}

#[test]
fn test_assembly_failure_preserves_raw_frames() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner {
        frames: 12,
        fail_assembly: true,
        ..Default::default()
    };
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let mut req = CaptureRequest::new("cam1", 60, 5);
    req.keep_raw = false;
    let err = orch.capture_at(&req, started()).unwrap_err();

    assert!(matches!(err, SunlapseError::AssemblyFailure(_)));
    assert_eq!(err.exit_code(), 8);
    assert_eq!(runner.labels(), vec![CAPTURE_LABEL, ASSEMBLY_LABEL]);
    let frames = files_in(&config.raw_images_dir("cam1"));
    assert_eq!(frames.len(), 12);
    assert!(frames.iter().all(|f| f.starts_with("cam1_2024-06-21_05-05-00_")));
}

#[test]
fn test_prior_run_frames_are_never_touched() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let raw = config.raw_images_dir("cam1");
    std::fs::create_dir_all(&raw).unwrap();

    // Leftovers from an earlier failed run in the same folder
    let old = ["cam1_2024-06-20_05-04-00_00001.jpg", "cam1_2024-06-20_05-04-00_00002.jpg"];
    for name in &old {
        std::fs::write(raw.join(name), b"old").unwrap();
    }

    let runner = FakeRunner::producing(3);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");
    let out = orch.capture_at(&CaptureRequest::new("cam1", 15, 5), started()).unwrap();

    assert_eq!(out.frames_captured, 3);
    assert_eq!(out.cleanup.removed, 3);
    assert_eq!(files_in(&raw), old.iter().map(|s| s.to_string()).collect::<Vec<_>>());

    let input = runner.call(ASSEMBLY_LABEL).unwrap().value_of("-i").unwrap().to_string();
    assert!(input.contains(&format!("{}_%05d", out.run_prefix)));
}

#[test]
fn test_same_second_runs_keep_their_own_frames() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(5);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let mut first = CaptureRequest::new("cam1", 25, 5);
    first.suffix = Some("sunrise".into());
    first.keep_raw = true;
    let a = orch.capture_at(&first, started()).unwrap();

    let mut second = first.clone();
    second.keep_raw = false;
    let b = orch.capture_at(&second, started()).unwrap();

    assert_ne!(a.run_prefix, b.run_prefix);
    assert_ne!(a.video_path, b.video_path);
    assert!(a.video_path.unwrap().exists());
    assert_eq!(b.cleanup.removed, 5);

    let frames = files_in(&config.raw_images_dir("cam1"));
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|f| f.starts_with(&format!("{}_", a.run_prefix))));
}

#[test]
fn test_cleanup_failure_is_only_a_warning() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner {
        frames: 4,
        undeletable: 1,
        ..Default::default()
    };
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let out = orch.capture_at(&CaptureRequest::new("cam1", 20, 5), started()).unwrap();

    assert_eq!(out.frames_captured, 4);
    assert_eq!(out.cleanup, CleanupReport { removed: 4, failed: 1 });
    assert!(out.video_path.unwrap().exists());
    assert_eq!(out.states.last(), Some(&RunState::Done));
    assert!(out.states.contains(&RunState::CleaningUp));
    assert_eq!(
        files_in(&config.raw_images_dir("cam1")),
        vec![format!("{}_00005.jpg", out.run_prefix)]
    );
}

#[test]
fn test_actual_frame_count_is_authoritative() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(9);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let out = orch.capture_at(&CaptureRequest::new("cam1", 60, 5), started()).unwrap();
    assert_eq!(out.expected_frames, 12);
    assert_eq!(out.frames_captured, 9);
    assert!(out.video_path.is_some());
}

#[test]
fn test_invalid_requests_spawn_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let runner = FakeRunner::producing(1);
    let orch = Orchestrator::new(&config, &runner).with_ffmpeg("ffmpeg");

    let zero_interval = orch.capture_at(&CaptureRequest::new("cam1", 60, 0), started());
    assert!(matches!(zero_interval, Err(SunlapseError::InvalidInterval)));

    let unknown = orch.capture_at(&CaptureRequest::new("frontdoor", 60, 5), started());
    assert!(matches!(unknown, Err(SunlapseError::UnknownCamera { .. })));

    let mut bad_res = CaptureRequest::new("cam1", 60, 5);
    bad_res.resolution = Some("  ".into());
    let result = orch.capture_at(&bad_res, started());
    assert!(matches!(result, Err(SunlapseError::InvalidResolution(_))));

    assert!(runner.labels().is_empty());
    assert!(!config.camera_dir("cam1").exists());
    assert!(!config.camera_dir("frontdoor").exists());
}

#[test]
fn test_state_transitions() {
    assert!(RunState::Idle.can_advance_to(RunState::Capturing));
    assert!(RunState::Assembled.can_advance_to(RunState::CleaningUp));
    assert!(!RunState::AssemblyFailed.can_advance_to(RunState::CleaningUp));
    assert!(!RunState::Captured.can_advance_to(RunState::CleaningUp));
    assert!(!RunState::CaptureFailed.can_advance_to(RunState::Assembling));
    assert!(RunState::AssemblyFailed.is_terminal());
    assert!(!RunState::Assembling.is_terminal());
}
