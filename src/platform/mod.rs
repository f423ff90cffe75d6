//! Host boundary for device discovery and stream acquisition
//!
//! The capability prompt, device enumeration and stream acquisition are
//! supplied by the environment the crate runs in. They are modelled as the
//! [`MediaHost`] trait so registry and controller logic can run against the
//! in-memory host in [`crate::testing`] as well as the native camera stack.

use crate::errors::CameraError;
use crate::permissions::PermissionInfo;
use crate::types::{CaptureConstraint, Device, TrackSettings};
use async_trait::async_trait;

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::NativeMediaHost;

/// A live media track handed out by a host.
pub trait MediaTrack: Send + Sync {
    /// Host-assigned track identifier
    fn id(&self) -> &str;

    /// Id of the device the track reads from
    fn device_id(&self) -> &str;

    fn settings(&self) -> TrackSettings;

    fn is_live(&self) -> bool;

    /// Release the underlying device. Calling this twice is a no-op.
    fn stop(&mut self);
}

impl std::fmt::Debug for dyn MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id())
            .field("device_id", &self.device_id())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Capture environment: capability prompt, enumeration and acquisition.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Ask the user/environment for camera access.
    ///
    /// A refusal is reported through the returned status, not as an error;
    /// errors are reserved for the prompt itself failing.
    async fn request_capability(&self) -> Result<PermissionInfo, CameraError>;

    /// Every device the host knows about, of any kind, in host order.
    async fn enumerate_devices(&self) -> Result<Vec<Device>, CameraError>;

    /// Open a track satisfying `constraint` exactly.
    async fn get_user_media(
        &self,
        constraint: &CaptureConstraint,
    ) -> Result<Box<dyn MediaTrack>, CameraError>;

    /// Whether [`MediaHost::capture_stream`] is available on this host.
    fn supports_capture_stream(&self) -> bool {
        false
    }

    /// Turn a bound source track into a transmissible track at `frame_rate`.
    async fn capture_stream(
        &self,
        source: &dyn MediaTrack,
        frame_rate: u32,
    ) -> Result<Box<dyn MediaTrack>, CameraError> {
        let _ = (source, frame_rate);
        Err(CameraError::CaptureUnsupported(
            "host cannot capture a stream from the playback surface".to_string(),
        ))
    }
}
