//! In-memory capture host
//!
//! Mimics the browser media-devices contract closely enough for tests:
//! labels stay empty until the capability is granted, busy devices fail to
//! open, and every opened or stopped device is recorded in order.

use crate::errors::CameraError;
use crate::permissions::{PermissionInfo, PermissionStatus};
use crate::platform::{MediaHost, MediaTrack};
use crate::types::{CaptureConstraint, Device, Resolution, TrackSettings};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// Device-level activity observed by the fake host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Opened(String),
    Stopped(String),
}

struct FakeState {
    devices: Vec<Device>,
    prompt_outcome: PermissionStatus,
    granted: bool,
    prompts: usize,
    busy: HashSet<String>,
    fixed_resolution: HashMap<String, Resolution>,
    capture_stream_supported: bool,
    prompt_delay: Option<Duration>,
}

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

impl Counters {
    fn track_opened(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn track_stopped(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeMediaHost {
    state: Mutex<FakeState>,
    counters: Arc<Counters>,
    events: Arc<Mutex<Vec<HostEvent>>>,
}

impl Default for FakeMediaHost {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FakeMediaHost {
    /// Host with no devices whose capability prompt is accepted.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                devices: Vec::new(),
                prompt_outcome: PermissionStatus::Granted,
                granted: false,
                prompts: 0,
                busy: HashSet::new(),
                fixed_resolution: HashMap::new(),
                capture_stream_supported: true,
                prompt_delay: None,
            }),
            counters: Arc::new(Counters::default()),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_device(self, device: Device) -> Self {
        lock(&self.state).devices.push(device);
        self
    }

    /// Outcome of every capability prompt
    pub fn with_prompt_outcome(self, status: PermissionStatus) -> Self {
        lock(&self.state).prompt_outcome = status;
        self
    }

    pub fn deny_permission(self) -> Self {
        self.with_prompt_outcome(PermissionStatus::Denied)
    }

    pub fn with_busy_device(self, device_id: &str) -> Self {
        self.set_busy(device_id, true);
        self
    }

    /// The device can only deliver `resolution`; exact requests for anything
    /// else fail.
    pub fn with_fixed_resolution(self, device_id: &str, resolution: Resolution) -> Self {
        lock(&self.state)
            .fixed_resolution
            .insert(device_id.to_string(), resolution);
        self
    }

    /// Time the user takes to answer each capability prompt
    pub fn with_prompt_delay(self, delay: Duration) -> Self {
        lock(&self.state).prompt_delay = Some(delay);
        self
    }

    pub fn without_capture_stream(self) -> Self {
        lock(&self.state).capture_stream_supported = false;
        self
    }

    pub fn add_device(&self, device: Device) {
        lock(&self.state).devices.push(device);
    }

    pub fn remove_device(&self, device_id: &str) {
        lock(&self.state).devices.retain(|d| d.id != device_id);
    }

    pub fn set_busy(&self, device_id: &str, busy: bool) {
        let mut state = lock(&self.state);
        if busy {
            state.busy.insert(device_id.to_string());
        } else {
            state.busy.remove(device_id);
        }
    }

    pub fn capability_prompts(&self) -> usize {
        lock(&self.state).prompts
    }

    /// Device tracks currently open
    pub fn live_tracks(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Highest number of device tracks that were ever open at once
    pub fn peak_live_tracks(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.events).clone()
    }

    fn prompt(state: &mut FakeState) -> PermissionInfo {
        state.prompts += 1;
        match state.prompt_outcome {
            PermissionStatus::Granted => {
                state.granted = true;
                PermissionInfo::granted("Camera access authorized")
            }
            PermissionStatus::Denied => PermissionInfo::denied("Camera access denied by user"),
            PermissionStatus::Restricted => PermissionInfo {
                status: PermissionStatus::Restricted,
                message: "Camera access restricted by system policy".to_string(),
                can_request: false,
            },
            PermissionStatus::NotDetermined => {
                PermissionInfo::not_determined("Prompt dismissed without a decision")
            }
        }
    }
}

#[async_trait]
impl MediaHost for FakeMediaHost {
    async fn request_capability(&self) -> Result<PermissionInfo, CameraError> {
        let delay = {
            let state = lock(&self.state);
            if state.granted {
                return Ok(PermissionInfo::granted("Camera access authorized"));
            }
            state.prompt_delay
        };

        // every caller that arrives before the grant sees its own prompt
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Self::prompt(&mut lock(&self.state)))
    }

    async fn enumerate_devices(&self) -> Result<Vec<Device>, CameraError> {
        let state = lock(&self.state);
        Ok(state
            .devices
            .iter()
            .map(|d| {
                let mut device = d.clone();
                if !state.granted {
                    device.label.clear();
                }
                device
            })
            .collect())
    }

    async fn get_user_media(
        &self,
        constraint: &CaptureConstraint,
    ) -> Result<Box<dyn MediaTrack>, CameraError> {
        let device_id = {
            let mut state = lock(&self.state);
            if !state.granted {
                let info = Self::prompt(&mut state);
                if info.status != PermissionStatus::Granted {
                    return Err(CameraError::PermissionDenied(info.message));
                }
            }

            let device = match &constraint.device_id {
                Some(id) => state
                    .devices
                    .iter()
                    .find(|d| &d.id == id && d.kind.is_video_input())
                    .ok_or_else(|| CameraError::device_unavailable(id, "device not found"))?,
                None => state
                    .devices
                    .iter()
                    .find(|d| d.kind.is_video_input())
                    .ok_or_else(|| {
                        CameraError::device_unavailable("default", "no video input available")
                    })?,
            };

            if state.busy.contains(&device.id) {
                return Err(CameraError::device_unavailable(
                    &device.id,
                    "device is in use by another application",
                ));
            }

            if let Some(native) = state.fixed_resolution.get(&device.id) {
                if *native != constraint.resolution() {
                    return Err(CameraError::device_unavailable(
                        &device.id,
                        format!(
                            "requested {} but device only delivers {}",
                            constraint.resolution(),
                            native
                        ),
                    ));
                }
            }

            device.id.clone()
        };

        self.counters.track_opened();
        lock(&self.events).push(HostEvent::Opened(device_id.clone()));

        Ok(Box::new(FakeTrack {
            id: Uuid::new_v4().to_string(),
            device_id,
            settings: TrackSettings {
                resolution: constraint.resolution(),
                frame_rate: None,
            },
            live: true,
            device_counters: Some(self.counters.clone()),
            events: self.events.clone(),
        }))
    }

    fn supports_capture_stream(&self) -> bool {
        lock(&self.state).capture_stream_supported
    }

    async fn capture_stream(
        &self,
        source: &dyn MediaTrack,
        frame_rate: u32,
    ) -> Result<Box<dyn MediaTrack>, CameraError> {
        if !self.supports_capture_stream() {
            return Err(CameraError::CaptureUnsupported(
                "fake host configured without stream capture".to_string(),
            ));
        }
        if !source.is_live() {
            return Err(CameraError::InvalidState(
                "cannot capture from a stopped track".to_string(),
            ));
        }

        Ok(Box::new(FakeTrack {
            id: Uuid::new_v4().to_string(),
            device_id: source.device_id().to_string(),
            settings: TrackSettings {
                resolution: source.settings().resolution,
                frame_rate: Some(frame_rate),
            },
            live: true,
            device_counters: None,
            events: self.events.clone(),
        }))
    }
}

struct FakeTrack {
    id: String,
    device_id: String,
    settings: TrackSettings,
    live: bool,
    /// Present for tracks that hold a device open
    device_counters: Option<Arc<Counters>>,
    events: Arc<Mutex<Vec<HostEvent>>>,
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn settings(&self) -> TrackSettings {
        self.settings
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        if let Some(counters) = &self.device_counters {
            counters.track_stopped();
            lock(&self.events).push(HostEvent::Stopped(self.device_id.clone()));
        }
    }
}
