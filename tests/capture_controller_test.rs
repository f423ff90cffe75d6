use camrelay::capture::{CaptureController, ControllerState, TrackRole};
use camrelay::errors::CameraError;
use camrelay::testing::{FakeMediaHost, HostEvent};
use camrelay::types::{Device, Resolution};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn two_cameras() -> Arc<FakeMediaHost> {
    Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("cam-1", "Front"))
            .with_device(Device::video_input("cam-2", "Back")),
    )
}

fn counted(controller: &CaptureController) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    controller.on_stream_ready(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    calls
}

fn opened(id: &str) -> HostEvent {
    HostEvent::Opened(id.to_string())
}

fn stopped(id: &str) -> HostEvent {
    HostEvent::Stopped(id.to_string())
}

#[tokio::test]
async fn test_select_acquires_exact_capture_resolution() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());

    let handle = controller.select("cam-1").await.unwrap();

    assert_eq!(handle.device_id(), "cam-1");
    assert_eq!(handle.settings().resolution, Resolution::new(512, 512));
    assert!(handle.is_live());
    assert_eq!(controller.state(), ControllerState::Active);
    assert_eq!(controller.active(), Some(handle));
}

#[tokio::test]
async fn test_switching_devices_stops_previous_first() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());

    let first = controller.select("cam-1").await.unwrap();
    let second = controller.select("cam-2").await.unwrap();

    assert!(!first.is_live());
    assert!(second.is_live());
    assert_ne!(first.session_id(), second.session_id());
    assert_eq!(
        fake.events(),
        vec![opened("cam-1"), stopped("cam-1"), opened("cam-2")]
    );
    assert_eq!(fake.live_tracks(), 1);
    assert_eq!(fake.peak_live_tracks(), 1);
}

#[tokio::test]
async fn test_reselecting_same_device_keeps_one_session() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    let calls = counted(&controller);

    controller.select("cam-1").await.unwrap();
    controller.select("cam-1").await.unwrap();

    assert_eq!(fake.live_tracks(), 1);
    assert_eq!(fake.peak_live_tracks(), 1);
    assert_eq!(fake.open_count(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_callback_receives_each_new_session_once() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    controller.on_stream_ready(move |handle| {
        sink.lock().unwrap().push(handle.device_id().to_string());
    });

    controller.select("cam-1").await.unwrap();
    controller.select("cam-2").await.unwrap();
    fake.set_busy("cam-1", true);
    let _ = controller.select("cam-1").await;

    assert_eq!(*delivered.lock().unwrap(), vec!["cam-1", "cam-2"]);
}

#[tokio::test]
async fn test_failed_reselect_keeps_previous_session() {
    let fake = Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("cam-1", "Front"))
            .with_device(Device::video_input("cam-2", "Back"))
            .with_busy_device("cam-2"),
    );
    let controller = CaptureController::new(fake.clone());
    let calls = counted(&controller);

    let original = controller.select("cam-1").await.unwrap();
    let err = controller.select("cam-2").await.unwrap_err();

    assert!(matches!(err, CameraError::DeviceUnavailable { .. }));
    assert_eq!(
        err.user_message(),
        "the selected device is currently unavailable"
    );

    let active = controller.active().unwrap();
    assert_eq!(active, original);
    assert_eq!(active.session_id(), original.session_id());
    assert_eq!(active.device_id(), "cam-1");
    assert!(original.is_live());
    assert_eq!(controller.state(), ControllerState::Active);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.live_tracks(), 1);
    assert_eq!(
        fake.events(),
        vec![opened("cam-1"), stopped("cam-1"), opened("cam-1")]
    );
}

#[tokio::test]
async fn test_failed_reselect_invalidates_old_transmit_stream() {
    let fake = Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("cam-1", "Front"))
            .with_device(Device::video_input("cam-2", "Back"))
            .with_busy_device("cam-2"),
    );
    let controller = CaptureController::new(fake.clone());
    let original = controller.select("cam-1").await.unwrap();
    let old_stream = controller.capture_as_stream().await.unwrap();
    assert_eq!(old_stream.role(), TrackRole::Transmit);

    controller.select("cam-2").await.unwrap_err();

    // the session survives on cam-1, but its stream was replaced
    assert!(original.is_live());
    assert_eq!(controller.active(), Some(original.clone()));
    assert!(!old_stream.is_live());

    let new_stream = controller.capture_as_stream().await.unwrap();
    assert!(new_stream.is_live());
    assert_eq!(new_stream.session_id(), original.session_id());
    assert_eq!(new_stream.device_id(), "cam-1");
    assert_ne!(new_stream.track_id(), old_stream.track_id());
    assert_ne!(new_stream, old_stream);
    assert_eq!(fake.live_tracks(), 1);
}

#[tokio::test]
async fn test_source_and_transmit_handles_differ() {
    let controller = CaptureController::new(two_cameras());
    let source = controller.select("cam-1").await.unwrap();
    let stream = controller.capture_as_stream().await.unwrap();

    assert_eq!(source.role(), TrackRole::Source);
    assert_ne!(source, stream);
    assert_eq!(stream, controller.capture_as_stream().await.unwrap());
}

#[tokio::test]
async fn test_failed_restore_goes_idle() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());

    let original = controller.select("cam-1").await.unwrap();
    fake.set_busy("cam-1", true);
    fake.set_busy("cam-2", true);

    let err = controller.select("cam-2").await.unwrap_err();

    assert!(matches!(err, CameraError::DeviceUnavailable { .. }));
    assert!(!original.is_live());
    assert!(controller.active().is_none());
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(fake.live_tracks(), 0);
}

#[tokio::test]
async fn test_unknown_device_from_idle_stays_idle() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    let calls = counted(&controller);

    let err = controller.select("cam-9").await.unwrap_err();

    assert!(matches!(err, CameraError::DeviceUnavailable { .. }));
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(fake.open_count(), 0);
}

#[tokio::test]
async fn test_device_without_exact_resolution_is_unavailable() {
    let fake = Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("cam-hd", "HD only"))
            .with_fixed_resolution("cam-hd", Resolution::new(1280, 720)),
    );
    let controller = CaptureController::new(fake.clone());

    let err = controller.select("cam-hd").await.unwrap_err();
    assert!(matches!(err, CameraError::DeviceUnavailable { .. }));
    assert_eq!(fake.live_tracks(), 0);
}

#[tokio::test]
async fn test_permission_refusal_is_reported() {
    let fake = Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("cam-1", "Front"))
            .deny_permission(),
    );
    let controller = CaptureController::new(fake.clone());

    let err = controller.select("cam-1").await.unwrap_err();

    assert!(matches!(err, CameraError::PermissionDenied(_)));
    assert_eq!(err.user_message(), "no camera access");
    assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test]
async fn test_default_selection_without_devices_fails() {
    let controller = CaptureController::new(Arc::new(FakeMediaHost::new()));
    let err = controller.select_default().await.unwrap_err();
    assert!(matches!(err, CameraError::DeviceUnavailable { .. }));
}

#[tokio::test]
async fn test_capture_as_stream_runs_at_thirty_fps() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    let source = controller.select("cam-2").await.unwrap();

    let stream = controller.capture_as_stream().await.unwrap();
    let again = controller.capture_as_stream().await.unwrap();

    assert_eq!(stream.session_id(), source.session_id());
    assert_eq!(stream.settings().frame_rate, Some(30));
    assert_eq!(stream.settings().resolution, Resolution::new(512, 512));
    assert_eq!(stream.track_id(), again.track_id());
    assert_ne!(stream.track_id(), source.track_id());
    // the stream does not hold a second device open
    assert_eq!(fake.live_tracks(), 1);
}

#[tokio::test]
async fn test_capture_unsupported_leaves_session_intact() {
    let fake = Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("cam-1", "Front"))
            .without_capture_stream(),
    );
    let controller = CaptureController::new(fake.clone());
    let source = controller.select("cam-1").await.unwrap();

    let err = controller.capture_as_stream().await.unwrap_err();

    assert!(matches!(err, CameraError::CaptureUnsupported(_)));
    assert!(source.is_live());
    assert_eq!(controller.state(), ControllerState::Active);
    assert_eq!(controller.active(), Some(source));
}

#[tokio::test]
async fn test_stream_ends_with_its_session() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    controller.select("cam-1").await.unwrap();
    let stream = controller.capture_as_stream().await.unwrap();

    controller.select("cam-2").await.unwrap();

    assert!(!stream.is_live());
    let fresh = controller.capture_as_stream().await.unwrap();
    assert_eq!(fresh.device_id(), "cam-2");
}

#[tokio::test]
async fn test_state_transitions_are_observable() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    let mut rx = controller.watch_state();
    assert_eq!(*rx.borrow(), ControllerState::Idle);

    controller.select("cam-1").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), ControllerState::Active);

    controller.stop().await;
    assert_eq!(*rx.borrow_and_update(), ControllerState::Idle);
}

#[tokio::test]
async fn test_concurrent_selects_never_overlap() {
    let fake = two_cameras();
    let controller = Arc::new(CaptureController::new(fake.clone()));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let controller = controller.clone();
            let device = if i % 2 == 0 { "cam-1" } else { "cam-2" };
            tokio::spawn(async move { controller.select(device).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(fake.peak_live_tracks(), 1);
    assert_eq!(fake.live_tracks(), 1);
    assert_eq!(fake.open_count(), 8);
}

#[tokio::test]
async fn test_drop_releases_device() {
    let fake = two_cameras();
    let controller = CaptureController::new(fake.clone());
    let handle = controller.select("cam-1").await.unwrap();
    controller.capture_as_stream().await.unwrap();

    drop(controller);

    assert!(!handle.is_live());
    assert_eq!(fake.live_tracks(), 0);
    assert_eq!(fake.events().last(), Some(&stopped("cam-1")));
}
