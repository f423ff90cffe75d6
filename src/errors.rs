use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classification shared by device, capture and relay errors
///
/// Serialized as the snake_case name returned by [`ErrorKind::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    CaptureUnsupported,
    Backend,
    InvalidState,
    UpstreamProtocol,
    Transport,
    MalformedBody,
    InvalidEndpoint,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::PermissionDenied,
        ErrorKind::DeviceUnavailable,
        ErrorKind::CaptureUnsupported,
        ErrorKind::Backend,
        ErrorKind::InvalidState,
        ErrorKind::UpstreamProtocol,
        ErrorKind::Transport,
        ErrorKind::MalformedBody,
        ErrorKind::InvalidEndpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::CaptureUnsupported => "capture_unsupported",
            ErrorKind::Backend => "backend",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::UpstreamProtocol => "upstream_protocol",
            ErrorKind::Transport => "transport",
            ErrorKind::MalformedBody => "malformed_body",
            ErrorKind::InvalidEndpoint => "invalid_endpoint",
        }
    }

    pub fn is_relay_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamProtocol
                | ErrorKind::Transport
                | ErrorKind::MalformedBody
                | ErrorKind::InvalidEndpoint
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorKind> for String {
    fn from(kind: ErrorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for ErrorKind {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| format!("unknown error kind: {}", name))
    }
}

/// Errors raised by the device registry, the capture controller and hosts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Device unavailable: {device_id}: {reason}")]
    DeviceUnavailable { device_id: String, reason: String },
    #[error("Capture unsupported: {0}")]
    CaptureUnsupported(String),
    #[error("Camera backend error: {0}")]
    Backend(String),
    #[error("Invalid controller state: {0}")]
    InvalidState(String),
}

impl CameraError {
    pub fn device_unavailable(device_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CameraError::DeviceUnavailable {
            device_id: device_id.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CameraError::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            CameraError::CaptureUnsupported(_) => ErrorKind::CaptureUnsupported,
            CameraError::Backend(_) => ErrorKind::Backend,
            CameraError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// Short text meant for the person in front of the camera.
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied(_) => "no camera access",
            CameraError::DeviceUnavailable { .. } => "the selected device is currently unavailable",
            CameraError::CaptureUnsupported(_) => "streaming from this camera is not supported here",
            CameraError::Backend(_) | CameraError::InvalidState(_) => {
                "an unknown error occurred while accessing the webcam"
            }
        }
    }
}

/// A relay-local failure. Never crosses the relay boundary in this form;
/// callers only ever see the opaque error body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RelayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RelayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn upstream_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamProtocol, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedBody, message)
    }

    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEndpoint, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_user_message() {
        let err = CameraError::PermissionDenied("user dismissed prompt".to_string());
        assert_eq!(err.user_message(), "no camera access");
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(
            err.to_string(),
            "Permission denied error: user dismissed prompt"
        );
    }

    #[test]
    fn test_device_unavailable_display() {
        let err = CameraError::device_unavailable("cam-2", "in use by another application");
        assert_eq!(
            err.to_string(),
            "Device unavailable: cam-2: in use by another application"
        );
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn test_relay_kinds() {
        assert!(ErrorKind::UpstreamProtocol.is_relay_failure());
        assert!(ErrorKind::Transport.is_relay_failure());
        assert!(!ErrorKind::DeviceUnavailable.is_relay_failure());

        let err = RelayError::upstream_protocol("expected JSON, got non-JSON");
        assert_eq!(err.to_string(), "upstream_protocol: expected JSON, got non-JSON");
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::CaptureUnsupported).unwrap();
        assert_eq!(json, "\"capture_unsupported\"");
    }

    #[test]
    fn test_error_kind_wire_name_matches_display() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.to_string()));
            assert_eq!(serde_json::from_value::<ErrorKind>(json).unwrap(), kind);
        }
        assert!(serde_json::from_str::<ErrorKind>("\"PermissionDenied\"").is_err());
    }
}
