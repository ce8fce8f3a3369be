//! Platform toast delivery through the OS notification helpers.

use super::{Notification, NotificationSurface, NotifyError};
use log::debug;
use std::process::Command;

/// Shows toasts via `notify-send` (Linux/BSD) or `osascript` (macOS).
///
/// The helper binary is resolved on every call so a notification daemon that
/// comes up after start is picked up on the next cycle.
#[derive(Debug, Clone)]
pub struct DesktopSurface {
    app_name: String,
}

impl DesktopSurface {
    pub fn new() -> Self {
        Self {
            app_name: "duetask".to_string(),
        }
    }

    fn command_for(&self, notification: &Notification) -> Result<Command, NotifyError> {
        if cfg!(target_os = "macos") {
            let osascript = which::which("osascript")
                .map_err(|err| NotifyError::Unavailable(format!("osascript not found: {err}")))?;
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(&notification.body),
                escape_applescript(&notification.title)
            );
            let mut cmd = Command::new(osascript);
            cmd.arg("-e").arg(script);
            return Ok(cmd);
        }

        if cfg!(unix) {
            let notify_send = which::which("notify-send").map_err(|err| {
                NotifyError::Unavailable(format!("notify-send not found: {err}"))
            })?;
            let mut cmd = Command::new(notify_send);
            cmd.args(["--app-name", self.app_name.as_str()])
                .arg("--")
                .arg(&notification.title)
                .arg(&notification.body);
            return Ok(cmd);
        }

        Err(NotifyError::Unavailable(format!(
            "no desktop notification helper for platform {}",
            std::env::consts::OS
        )))
    }
}

impl Default for DesktopSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSurface for DesktopSurface {
    fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        let output = self
            .command_for(notification)?
            .output()
            .map_err(|err| NotifyError::Unavailable(format!("cannot spawn helper: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Failed(format!(
                "helper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        debug!("event=notification_shown module=notify status=ok backend=desktop");
        Ok(())
    }
}

fn escape_applescript(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\n', '\r'], " ")
}
