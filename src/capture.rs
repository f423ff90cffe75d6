//! Capture lifecycle for one selected device
//!
//! A [`CaptureController`] owns at most one live media session. Selecting a
//! device stops the current session before the next one is opened, so a
//! controller never holds two devices at once. When the new acquisition
//! fails, the previous device is re-opened under the same session identity
//! and the consumer's source handle stays valid. Transmit streams do not
//! survive that: a restored session gets a fresh one.

use crate::errors::CameraError;
use crate::platform::{MediaHost, MediaTrack};
use crate::types::{CaptureConstraint, TrackSettings, CAPTURE_FRAME_RATE};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, RwLock as SyncRwLock};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ControllerState {
    Idle,
    Acquiring,
    Active,
}

/// Which track of a session a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TrackRole {
    /// The 512x512 capture bound to the device
    Source,
    /// The 30 fps stream derived from the source
    Transmit,
}

/// Consumer view of one track of a session.
///
/// Handles are cheap to clone. Once the track is torn down `is_live`
/// returns false and the handle must not be used for streaming.
///
/// A source handle stands for the session on its device and stays valid
/// across a restore. A transmit handle stands for one concrete stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    session_id: Uuid,
    role: TrackRole,
    track_id: String,
    device_id: String,
    settings: TrackSettings,
    acquired_at: DateTime<Utc>,
    live: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn role(&self) -> TrackRole {
        self.role
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn settings(&self) -> TrackSettings {
        self.settings
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        if self.session_id != other.session_id || self.role != other.role {
            return false;
        }
        match self.role {
            TrackRole::Source => self.device_id == other.device_id,
            TrackRole::Transmit => self.track_id == other.track_id,
        }
    }
}

/// Callback receiving each newly acquired session
pub type StreamReadyCallback = Arc<dyn Fn(StreamHandle) + Send + Sync>;

/// A host track together with the liveness flag its handles share
struct LiveTrack {
    track: Box<dyn MediaTrack>,
    live: Arc<AtomicBool>,
}

impl LiveTrack {
    fn new(track: Box<dyn MediaTrack>) -> Self {
        Self::with_flag(track, Arc::new(AtomicBool::new(true)))
    }

    fn with_flag(track: Box<dyn MediaTrack>, live: Arc<AtomicBool>) -> Self {
        live.store(true, Ordering::SeqCst);
        Self { track, live }
    }

    fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        self.track.stop();
    }
}

struct MediaSession {
    id: Uuid,
    constraint: CaptureConstraint,
    source: LiveTrack,
    transmit: Option<LiveTrack>,
    acquired_at: DateTime<Utc>,
}

impl MediaSession {
    fn handle(&self) -> StreamHandle {
        self.handle_for(&self.source, TrackRole::Source)
    }

    fn transmit_handle(&self) -> Option<StreamHandle> {
        self.transmit
            .as_ref()
            .map(|transmit| self.handle_for(transmit, TrackRole::Transmit))
    }

    fn handle_for(&self, live: &LiveTrack, role: TrackRole) -> StreamHandle {
        StreamHandle {
            session_id: self.id,
            role,
            track_id: live.track.id().to_string(),
            device_id: live.track.device_id().to_string(),
            settings: live.track.settings(),
            acquired_at: self.acquired_at,
            live: live.live.clone(),
        }
    }

    /// Stop every track of the session, transmit track first.
    fn teardown(&mut self) {
        if let Some(transmit) = self.transmit.as_mut() {
            transmit.stop();
        }
        self.source.stop();
    }
}

/// What is needed to put a torn-down session back on its device
struct RestorePoint {
    id: Uuid,
    constraint: CaptureConstraint,
    acquired_at: DateTime<Utc>,
    /// Flag of the source handles; transmit flags are not carried over
    source_live: Arc<AtomicBool>,
    had_transmit: bool,
}

pub struct CaptureController {
    host: Arc<dyn MediaHost>,
    session: Mutex<Option<MediaSession>>,
    active: SyncMutex<Option<StreamHandle>>,
    state: watch::Sender<ControllerState>,
    on_stream_ready: SyncRwLock<Option<StreamReadyCallback>>,
}

impl CaptureController {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        let (state, _) = watch::channel(ControllerState::Idle);
        Self {
            host,
            session: Mutex::new(None),
            active: SyncMutex::new(None),
            state,
            on_stream_ready: SyncRwLock::new(None),
        }
    }

    /// Register the consumer of newly acquired sessions, replacing any
    /// previous one.
    ///
    /// The callback runs while the selection is still in progress and must
    /// not block.
    pub fn on_stream_ready<F>(&self, callback: F)
    where
        F: Fn(StreamHandle) + Send + Sync + 'static,
    {
        let mut slot = self
            .on_stream_ready
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Arc::new(callback));
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Handle of the active session, if any
    pub fn active(&self) -> Option<StreamHandle> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Select `device_id` and acquire a 512x512 session from it.
    pub async fn select(&self, device_id: &str) -> Result<StreamHandle, CameraError> {
        self.select_constraint(CaptureConstraint::exact(Some(device_id.to_string())))
            .await
    }

    /// Acquire a session from the host's default device.
    pub async fn select_default(&self) -> Result<StreamHandle, CameraError> {
        self.select_constraint(CaptureConstraint::exact(None)).await
    }

    async fn select_constraint(
        &self,
        constraint: CaptureConstraint,
    ) -> Result<StreamHandle, CameraError> {
        let mut slot = self.session.lock().await;

        let restore = slot.take().map(|mut previous| {
            log::info!(
                "Stopping session {} on device {} before reselecting",
                previous.id,
                previous.source.track.device_id()
            );
            previous.teardown();
            RestorePoint {
                id: previous.id,
                constraint: previous.constraint.clone(),
                acquired_at: previous.acquired_at,
                source_live: previous.source.live.clone(),
                had_transmit: previous.transmit.is_some(),
            }
        });
        self.set_active(None);
        self.state.send_replace(ControllerState::Acquiring);

        log::info!(
            "Acquiring {}x{} stream from device {}",
            constraint.width,
            constraint.height,
            constraint.device_id.as_deref().unwrap_or("<default>")
        );

        match self.host.get_user_media(&constraint).await {
            Ok(track) => {
                let session = MediaSession {
                    id: Uuid::new_v4(),
                    constraint,
                    source: LiveTrack::new(track),
                    transmit: None,
                    acquired_at: Utc::now(),
                };
                let handle = session.handle();
                log::info!(
                    "Session {} active on device {}",
                    handle.session_id(),
                    handle.device_id()
                );

                *slot = Some(session);
                self.set_active(Some(handle.clone()));
                self.state.send_replace(ControllerState::Active);
                self.deliver(handle.clone());
                Ok(handle)
            }
            Err(err) => {
                match &err {
                    CameraError::DeviceUnavailable { .. } => {
                        log::error!("The selected device is currently unavailable: {}", err)
                    }
                    _ => log::error!("Error accessing webcam: {}", err),
                }

                match restore {
                    Some(point) => {
                        *slot = self.restore(point).await;
                        let handle = slot.as_ref().map(MediaSession::handle);
                        let state = if handle.is_some() {
                            ControllerState::Active
                        } else {
                            ControllerState::Idle
                        };
                        self.set_active(handle);
                        self.state.send_replace(state);
                    }
                    None => {
                        self.state.send_replace(ControllerState::Idle);
                    }
                }
                Err(err)
            }
        }
    }

    /// Re-open the device of a torn-down session under its old identity.
    async fn restore(&self, point: RestorePoint) -> Option<MediaSession> {
        let device = point
            .constraint
            .device_id
            .clone()
            .unwrap_or_else(|| "<default>".to_string());

        let source = match self.host.get_user_media(&point.constraint).await {
            Ok(track) => track,
            Err(e) => {
                log::error!(
                    "Failed to restore session {} on device {}: {}",
                    point.id,
                    device,
                    e
                );
                return None;
            }
        };

        let mut session = MediaSession {
            id: point.id,
            constraint: point.constraint,
            source: LiveTrack::with_flag(source, point.source_live),
            transmit: None,
            acquired_at: point.acquired_at,
        };

        if point.had_transmit && self.host.supports_capture_stream() {
            match self
                .host
                .capture_stream(session.source.track.as_ref(), CAPTURE_FRAME_RATE)
                .await
            {
                Ok(track) => session.transmit = Some(LiveTrack::new(track)),
                Err(e) => log::warn!("Restored session {} without its stream: {}", point.id, e),
            }
        }

        log::info!("Session {} restored on device {}", session.id, device);
        Some(session)
    }

    /// Produce the transmissible 30 fps stream of the active session.
    ///
    /// Repeated calls return the same stream. Fails with
    /// [`CameraError::CaptureUnsupported`] when the host cannot capture a
    /// stream; the session itself is left untouched.
    pub async fn capture_as_stream(&self) -> Result<StreamHandle, CameraError> {
        let mut slot = self.session.lock().await;
        let session = slot
            .as_mut()
            .ok_or_else(|| CameraError::InvalidState("no active session".to_string()))?;

        if let Some(existing) = session.transmit_handle() {
            return Ok(existing);
        }

        if !self.host.supports_capture_stream() {
            log::warn!("Stream capture is not available on this host");
            return Err(CameraError::CaptureUnsupported(
                "host cannot capture a stream from the playback surface".to_string(),
            ));
        }

        let track = self
            .host
            .capture_stream(session.source.track.as_ref(), CAPTURE_FRAME_RATE)
            .await?;
        session.transmit = Some(LiveTrack::new(track));

        let handle = session
            .transmit_handle()
            .ok_or_else(|| CameraError::InvalidState("stream vanished".to_string()))?;
        log::info!(
            "Session {} streaming at {} fps",
            handle.session_id(),
            CAPTURE_FRAME_RATE
        );
        Ok(handle)
    }

    /// Tear down the active session, if any, and return to `Idle`.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            log::info!("Stopping session {}", session.id);
            session.teardown();
        }
        self.set_active(None);
        self.state.send_replace(ControllerState::Idle);
    }

    fn set_active(&self, handle: Option<StreamHandle>) {
        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = handle;
    }

    fn deliver(&self, handle: StreamHandle) {
        let callback = self
            .on_stream_ready
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match callback {
            Some(callback) => callback(handle),
            None => log::debug!("No stream consumer registered"),
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.get_mut().take() {
            log::debug!("Releasing session {} on drop", session.id);
            session.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMediaHost;
    use crate::types::Device;

    fn host() -> Arc<FakeMediaHost> {
        Arc::new(
            FakeMediaHost::new()
                .with_device(Device::video_input("cam-1", "Front"))
                .with_device(Device::video_input("cam-2", "Back")),
        )
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let controller = CaptureController::new(host());
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.active().is_none());
    }

    #[tokio::test]
    async fn test_select_default_uses_first_video_input() {
        let controller = CaptureController::new(host());
        let handle = controller.select_default().await.unwrap();
        assert_eq!(handle.device_id(), "cam-1");
    }

    #[tokio::test]
    async fn test_stop_returns_to_idle() {
        let fake = host();
        let controller = CaptureController::new(fake.clone());
        let handle = controller.select("cam-2").await.unwrap();

        controller.stop().await;
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(!handle.is_live());
        assert_eq!(fake.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_capture_without_session_is_invalid_state() {
        let controller = CaptureController::new(host());
        let err = controller.capture_as_stream().await.unwrap_err();
        assert!(matches!(err, CameraError::InvalidState(_)));
    }
}
