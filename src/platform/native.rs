//! Native camera host backed by nokhwa
//!
//! Device ids are nokhwa camera indices rendered as strings. Cameras are
//! opened with an exact 512x512 request; hosts that cannot honour it fail the
//! acquisition instead of picking another resolution.

use crate::errors::CameraError;
use crate::permissions::{check_permission_detailed, PermissionInfo, PermissionStatus};
use crate::platform::{MediaHost, MediaTrack};
use crate::types::{CaptureConstraint, Device, Resolution, TrackSettings};
use async_trait::async_trait;
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution as NokhwaResolution,
    },
    CallbackCamera,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

type SharedCamera = Arc<Mutex<CallbackCamera>>;

#[derive(Default)]
pub struct NativeMediaHost {
    /// Open cameras by source track id
    open: Mutex<HashMap<String, Weak<Mutex<CallbackCamera>>>>,
}

impl NativeMediaHost {
    pub fn new() -> Self {
        Self::default()
    }
}

fn camera_index(device_id: &str) -> CameraIndex {
    match device_id.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device_id.to_string()),
    }
}

fn open_camera(constraint: &CaptureConstraint) -> Result<(String, CallbackCamera), CameraError> {
    let device_id = constraint
        .device_id
        .clone()
        .unwrap_or_else(|| "0".to_string());

    let format = CameraFormat::new(
        NokhwaResolution::new(constraint.width, constraint.height),
        FrameFormat::MJPEG,
        30,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));

    let mut camera = CallbackCamera::new(camera_index(&device_id), requested, |_| {})
        .map_err(|e| CameraError::device_unavailable(&device_id, e.to_string()))?;

    camera
        .open_stream()
        .map_err(|e| CameraError::device_unavailable(&device_id, e.to_string()))?;

    Ok((device_id, camera))
}

#[async_trait]
impl MediaHost for NativeMediaHost {
    async fn request_capability(&self) -> Result<PermissionInfo, CameraError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        nokhwa::nokhwa_initialize(move |granted| {
            if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(granted);
            }
        });

        let granted = rx
            .await
            .map_err(|_| CameraError::Backend("permission prompt was abandoned".to_string()))?;
        if !granted {
            return Ok(PermissionInfo::denied("Camera access denied by user"));
        }

        let os = check_permission_detailed();
        if os.status == PermissionStatus::Denied {
            return Ok(os);
        }
        Ok(PermissionInfo::granted("Camera access authorized"))
    }

    async fn enumerate_devices(&self) -> Result<Vec<Device>, CameraError> {
        let cameras = tokio::task::spawn_blocking(|| query(ApiBackend::Auto))
            .await
            .map_err(|e| CameraError::Backend(format!("Task join error: {}", e)))?
            .map_err(|e| CameraError::Backend(format!("Failed to query cameras: {}", e)))?;

        Ok(cameras
            .into_iter()
            .map(|info| Device::video_input(info.index().to_string(), info.human_name()))
            .collect())
    }

    async fn get_user_media(
        &self,
        constraint: &CaptureConstraint,
    ) -> Result<Box<dyn MediaTrack>, CameraError> {
        let owned = constraint.clone();
        let (device_id, camera) = tokio::task::spawn_blocking(move || open_camera(&owned))
            .await
            .map_err(|e| CameraError::Backend(format!("Task join error: {}", e)))??;

        let camera: SharedCamera = Arc::new(Mutex::new(camera));
        let id = Uuid::new_v4().to_string();
        if let Ok(mut open) = self.open.lock() {
            open.retain(|_, cam| cam.strong_count() > 0);
            open.insert(id.clone(), Arc::downgrade(&camera));
        }

        Ok(Box::new(NativeTrack {
            id,
            device_id,
            settings: TrackSettings {
                resolution: Resolution::new(constraint.width, constraint.height),
                frame_rate: None,
            },
            camera,
            live: true,
            owns_device: true,
        }))
    }

    fn supports_capture_stream(&self) -> bool {
        true
    }

    async fn capture_stream(
        &self,
        source: &dyn MediaTrack,
        frame_rate: u32,
    ) -> Result<Box<dyn MediaTrack>, CameraError> {
        let camera = self
            .open
            .lock()
            .ok()
            .and_then(|open| open.get(source.id()).and_then(Weak::upgrade))
            .ok_or_else(|| CameraError::InvalidState("source track is not open".to_string()))?;

        {
            let mut guard = camera
                .lock()
                .map_err(|_| CameraError::Backend("Failed to lock camera".to_string()))?;
            guard.set_frame_rate(frame_rate).map_err(|e| {
                CameraError::CaptureUnsupported(format!("cannot stream at {} fps: {}", frame_rate, e))
            })?;
        }

        Ok(Box::new(NativeTrack {
            id: Uuid::new_v4().to_string(),
            device_id: source.device_id().to_string(),
            settings: TrackSettings {
                resolution: source.settings().resolution,
                frame_rate: Some(frame_rate),
            },
            camera,
            live: true,
            owns_device: false,
        }))
    }
}

struct NativeTrack {
    id: String,
    device_id: String,
    settings: TrackSettings,
    camera: SharedCamera,
    live: bool,
    /// Only the source track closes the device
    owns_device: bool,
}

impl MediaTrack for NativeTrack {
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
        if !self.owns_device {
            return;
        }
        match self.camera.lock() {
            Ok(mut camera) => {
                if let Err(e) = camera.stop_stream() {
                    log::warn!("Failed to stop camera {}: {}", self.device_id, e);
                }
            }
            Err(_) => log::warn!("Failed to lock camera {} for stop", self.device_id),
        }
    }
}
