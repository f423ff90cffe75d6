use serde::{Deserialize, Serialize};

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl PermissionStatus {
    /// Whether the status prevents any camera use.
    pub fn is_refusal(&self) -> bool {
        matches!(self, PermissionStatus::Denied | PermissionStatus::Restricted)
    }
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

impl PermissionInfo {
    pub fn granted(message: impl Into<String>) -> Self {
        Self {
            status: PermissionStatus::Granted,
            message: message.into(),
            can_request: false,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            status: PermissionStatus::Denied,
            message: message.into(),
            can_request: true,
        }
    }

    pub fn not_determined(message: impl Into<String>) -> Self {
        Self {
            status: PermissionStatus::NotDetermined,
            message: message.into(),
            can_request: true,
        }
    }
}

/// Check the OS-level camera permission for the current platform
pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

/// Check the OS-level camera permission with detailed information
pub fn check_permission_detailed() -> PermissionInfo {
    #[cfg(target_os = "linux")]
    {
        check_permission_linux()
    }

    #[cfg(not(target_os = "linux"))]
    {
        // Windows privacy settings and the macOS TCC prompt are only reachable
        // through the native host.
        PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Permission is decided by the host prompt on this platform".to_string(),
            can_request: true,
        }
    }
}

#[cfg(target_os = "linux")]
fn check_permission_linux() -> PermissionInfo {
    use std::fs;
    use std::path::Path;

    let video_devices: Vec<_> = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .collect();

    let Some(first_device) = video_devices.first() else {
        return PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "No video devices found at /dev/video*".to_string(),
            can_request: false,
        };
    };

    match fs::metadata(first_device) {
        Ok(_) if check_linux_group_membership() => PermissionInfo::granted(format!(
            "Camera access granted (user in video group, {} found)",
            first_device
        )),
        Ok(_) => PermissionInfo::denied(format!(
            "Camera device {} exists but user not in video group - run: sudo usermod -a -G video $USER",
            first_device
        )),
        Err(e) => PermissionInfo::denied(format!("Cannot access {}: {}", first_device, e)),
    }
}

#[cfg(target_os = "linux")]
fn check_linux_group_membership() -> bool {
    use std::process::Command;

    let Ok(output) = Command::new("groups").output() else {
        return false;
    };

    String::from_utf8(output.stdout)
        .map(|groups| in_camera_group(&groups))
        .unwrap_or(false)
}

/// `groups` output lists whole names separated by whitespace
#[cfg(any(target_os = "linux", test))]
fn in_camera_group(groups: &str) -> bool {
    groups
        .split_whitespace()
        .any(|group| group == "video" || group == "plugdev")
}
