//! Core data types shared by the registry, controller and relay.

use serde::{Deserialize, Serialize};

/// Fixed capture width requested from every device.
pub const CAPTURE_WIDTH: u32 = 512;
/// Fixed capture height requested from every device.
pub const CAPTURE_HEIGHT: u32 = 512;
/// Frame rate of the transmissible stream produced from a bound session.
pub const CAPTURE_FRAME_RATE: u32 = 30;

/// Kind of a host-reported media device
///
/// On the wire this is the host's kind string: `"videoinput"` or whatever
/// else the host reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceKind {
    VideoInput,
    /// Anything else the host reports (audio inputs, outputs, ...)
    Other(String),
}

impl DeviceKind {
    const VIDEO_INPUT: &'static str = "videoinput";

    pub fn is_video_input(&self) -> bool {
        matches!(self, DeviceKind::VideoInput)
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeviceKind::VideoInput => Self::VIDEO_INPUT,
            DeviceKind::Other(kind) => kind,
        }
    }
}

impl From<String> for DeviceKind {
    fn from(kind: String) -> Self {
        if kind == Self::VIDEO_INPUT {
            DeviceKind::VideoInput
        } else {
            DeviceKind::Other(kind)
        }
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::VideoInput => DeviceKind::VIDEO_INPUT.to_string(),
            DeviceKind::Other(kind) => kind,
        }
    }
}

/// A capture device from one enumeration snapshot.
///
/// Devices are immutable; the next enumeration supersedes the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    /// Empty until the capability grant has been given
    pub label: String,
    pub kind: DeviceKind,
}

impl Device {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }

    pub fn video_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, DeviceKind::VideoInput)
    }

    pub fn has_label(&self) -> bool {
        !self.label.trim().is_empty()
    }

    /// Label suitable for a selection list; falls back to the device id.
    pub fn display_label(&self) -> String {
        if self.has_label() {
            self.label.clone()
        } else {
            format!("Device {}", self.id)
        }
    }
}

/// Pixel dimensions of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const CAPTURE: Self = Self::new(CAPTURE_WIDTH, CAPTURE_HEIGHT);
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Constraint handed to the host when acquiring a stream.
///
/// Width and height are exact: the host must fail rather than fall back to
/// another resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraint {
    /// `None` asks the host for its default device
    pub device_id: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl CaptureConstraint {
    /// Constraint for `device_id` at the fixed capture resolution.
    pub fn exact(device_id: Option<String>) -> Self {
        Self {
            device_id,
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Settings reported by a live track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub resolution: Resolution,
    pub frame_rate: Option<u32>,
}

/// Platform the crate was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOS => "macos",
            Platform::Linux => "linux",
            Platform::Unknown => "unknown",
        }
    }
}
