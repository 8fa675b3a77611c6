//! Recording controller driven through its spawned actor
//!
//! All tests run on paused tokio time, so the 10 second cap and the 100ms
//! ticker advance instantly and deterministically.

use crabclip::invariant_ppt::{contract_test, invariants};
use crabclip::recording::{ControllerHandle, RecordingController, RecordingLimits};
use crabclip::testing::{DeviceStats, SyntheticDevice};
use crabclip::{ClipRecord, ControllerState, QualityTier};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Harness {
    handle: ControllerHandle,
    task: JoinHandle<()>,
    clips: mpsc::UnboundedReceiver<ClipRecord>,
    stats: DeviceStats,
}

fn spawn(device: SyntheticDevice, tier: QualityTier) -> Harness {
    let stats = device.stats();
    let (tx, clips) = mpsc::unbounded_channel();
    let (handle, task) =
        RecordingController::new(device, tx, RecordingLimits::default(), tier).spawn();
    Harness {
        handle,
        task,
        clips,
        stats,
    }
}

async fn armed(handle: &ControllerHandle) {
    handle
        .wait_for(|s| s.state == ControllerState::Armed)
        .await
        .unwrap();
}

async fn start(handle: &ControllerHandle) {
    armed(handle).await;
    handle.start_recording();
    handle.wait_for(|s| s.is_recording()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_forced_stop_at_max_duration() {
    let mut h = spawn(SyntheticDevice::new(), QualityTier::Medium);
    start(&h.handle).await;

    let clip = h.clips.recv().await.unwrap();
    assert!(
        (10_000..10_100).contains(&clip.duration_ms),
        "duration {}",
        clip.duration_ms
    );
    assert_eq!(clip.quality, QualityTier::Medium);
    assert!(!clip.payload.is_empty());

    let status = h.handle.wait_for(|s| s.state == ControllerState::Armed).await.unwrap();
    assert_eq!(status.elapsed_ms, 0);
    assert_eq!(status.progress, 0.0);

    contract_test(
        "forced stop",
        &[invariants::SINGLE_SESSION, invariants::DURATION_MATCHES_CLOCK],
    );
}

#[tokio::test(start_paused = true)]
async fn test_progress_reported_while_recording() {
    let h = spawn(SyntheticDevice::new(), QualityTier::Low);
    start(&h.handle).await;

    let status = h.handle.wait_for(|s| s.elapsed_ms >= 5_000).await.unwrap();
    assert_eq!(status.elapsed_ms, 5_000);
    assert!((status.progress - 0.5).abs() < 1e-9);
    assert!(status.is_recording());
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_before_cap() {
    let mut h = spawn(SyntheticDevice::new(), QualityTier::High);
    start(&h.handle).await;

    tokio::time::sleep(Duration::from_millis(2_345)).await;
    h.handle.stop_recording();

    let clip = h.clips.recv().await.unwrap();
    assert_eq!(clip.duration_ms, 2_345);
    assert_eq!(clip.quality, QualityTier::High);
}

#[tokio::test(start_paused = true)]
async fn test_mid_session_quality_change_keeps_start_tier() {
    let mut h = spawn(SyntheticDevice::new(), QualityTier::Medium);
    start(&h.handle).await;

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    h.handle.set_quality_tier(QualityTier::High);
    h.handle
        .wait_for(|s| s.pending_tier == Some(QualityTier::High))
        .await
        .unwrap();
    h.handle.stop_recording();

    let clip = h.clips.recv().await.unwrap();
    assert_eq!(clip.quality, QualityTier::Medium);

    h.handle
        .wait_for(|s| s.state == ControllerState::Armed && s.tier == QualityTier::High)
        .await
        .unwrap();
    assert_eq!(h.stats.last_constraints(), Some(QualityTier::High.constraints()));
    assert_eq!(h.stats.max_live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_camera_switch_mid_session_applies_after_clip() {
    let mut h = spawn(SyntheticDevice::new(), QualityTier::Medium);
    start(&h.handle).await;
    let front = h.stats.last_input().unwrap();

    h.handle.switch_input("synthetic-back");
    h.handle
        .wait_for(|s| s.pending_input.as_deref() == Some("synthetic-back"))
        .await
        .unwrap();
    assert_eq!(h.stats.last_input(), Some(front));
    tokio::time::sleep(Duration::from_millis(600)).await;
    h.handle.stop_recording();

    let clip = h.clips.recv().await.unwrap();
    assert_eq!(clip.duration_ms, 600);

    let status = h
        .handle
        .wait_for(|s| s.state == ControllerState::Armed && s.input.is_some())
        .await
        .unwrap();
    assert_eq!(status.input.as_deref(), Some("synthetic-back"));
    assert_eq!(h.stats.last_input().as_deref(), Some("synthetic-back"));
    assert_eq!(h.stats.max_live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_failure_stays_idle_until_retry() {
    let device = SyntheticDevice::new();
    device.stats().fail_next_acquisitions(1);
    let h = spawn(device, QualityTier::Medium);

    let status = h.handle.wait_for(|s| s.last_error.is_some()).await.unwrap();
    assert_eq!(status.state, ControllerState::Idle);
    assert!(status.last_error.unwrap().contains("permission denied"));

    // Not armed: ignored
    h.handle.start_recording();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.handle.status().state, ControllerState::Idle);

    h.handle.retry_arm();
    let status = h.handle.wait_for(|s| s.state == ControllerState::Armed).await.unwrap();
    assert_eq!(status.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_partial_recording() {
    let mut h = spawn(SyntheticDevice::new(), QualityTier::Medium);
    start(&h.handle).await;
    tokio::time::sleep(Duration::from_millis(3_000)).await;

    h.handle.shutdown();
    h.task.await.unwrap();

    assert_eq!(h.clips.recv().await, None);
    assert_eq!(h.stats.live_handles(), 0);
    assert_eq!(h.handle.status().state, ControllerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_reconfiguration_never_holds_two_streams() {
    let device = SyntheticDevice::new()
        .with_acquire_delay(Duration::from_millis(20))
        .with_release_delay(Duration::from_millis(50));
    let h = spawn(device, QualityTier::Medium);

    for tier in [
        QualityTier::Low,
        QualityTier::High,
        QualityTier::Medium,
        QualityTier::Low,
    ] {
        h.handle.set_quality_tier(tier);
    }
    h.handle.shutdown();
    h.task.await.unwrap();

    assert_eq!(h.stats.acquisitions(), 5);
    assert_eq!(h.stats.max_live_handles(), 1);
    assert_eq!(h.stats.live_handles(), 0);
    assert_eq!(h.stats.last_constraints(), Some(QualityTier::Low.constraints()));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_the_controller() {
    let h = spawn(SyntheticDevice::new(), QualityTier::Medium);
    armed(&h.handle).await;

    let stats = h.stats.clone();
    drop(h.handle);
    h.task.await.unwrap();
    assert_eq!(stats.live_handles(), 0);
}
