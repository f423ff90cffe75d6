//! Capture device discovery
//!
//! The registry gates enumeration behind a one-time capability grant and
//! keeps the latest snapshot of video inputs for selection lists.

use crate::errors::CameraError;
use crate::permissions::{PermissionInfo, PermissionStatus};
use crate::platform::MediaHost;
use crate::types::Device;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct DeviceRegistry {
    host: Arc<dyn MediaHost>,
    granted: RwLock<bool>,
    /// Held for the whole prompt so concurrent callers share one prompt
    prompting: Mutex<()>,
    snapshot: RwLock<Vec<Device>>,
}

impl DeviceRegistry {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        Self {
            host,
            granted: RwLock::new(false),
            prompting: Mutex::new(()),
            snapshot: RwLock::new(Vec::new()),
        }
    }

    /// Request camera access from the host.
    ///
    /// Once granted the host is not prompted again.
    pub async fn request_capability(&self) -> Result<PermissionInfo, CameraError> {
        if *self.granted.read().await {
            log::debug!("Camera capability already granted");
            return Ok(PermissionInfo::granted("Camera access already granted"));
        }

        let _prompting = self.prompting.lock().await;
        if *self.granted.read().await {
            log::debug!("Camera capability granted by a concurrent prompt");
            return Ok(PermissionInfo::granted("Camera access already granted"));
        }

        log::info!("Requesting camera capability");
        let info = self.host.request_capability().await?;

        match info.status {
            PermissionStatus::Granted => {
                *self.granted.write().await = true;
                log::info!("Camera capability granted");
                Ok(info)
            }
            status if status.is_refusal() => {
                log::warn!("Camera capability refused: {}", info.message);
                Err(CameraError::PermissionDenied(info.message))
            }
            _ => {
                log::warn!("Camera capability undecided: {}", info.message);
                Err(CameraError::PermissionDenied(info.message))
            }
        }
    }

    /// Enumerate video inputs in host order and replace the stored snapshot.
    ///
    /// An empty list is a valid outcome, not an error.
    pub async fn enumerate(&self) -> Result<Vec<Device>, CameraError> {
        let devices: Vec<Device> = self
            .host
            .enumerate_devices()
            .await?
            .into_iter()
            .filter(|d| d.kind.is_video_input())
            .collect();

        if devices.is_empty() {
            log::info!("No webcams found.");
        } else {
            for (index, device) in devices.iter().enumerate() {
                log::info!("{}. {} - ID: {}", index + 1, device.label, device.id);
            }
        }

        *self.snapshot.write().await = devices.clone();
        Ok(devices)
    }

    /// Prompt for the capability if needed, then enumerate.
    pub async fn refresh(&self) -> Result<Vec<Device>, CameraError> {
        self.request_capability().await?;
        self.enumerate().await
    }

    /// Devices from the last enumeration
    pub async fn devices(&self) -> Vec<Device> {
        self.snapshot.read().await.clone()
    }

    pub async fn find(&self, device_id: &str) -> Option<Device> {
        self.snapshot
            .read()
            .await
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
    }

    pub async fn is_granted(&self) -> bool {
        *self.granted.read().await
    }
}
