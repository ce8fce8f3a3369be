//! User-facing notification surfaces.
//!
//! # Responsibility
//! - Define the `show(title, body)` contract consumed by the engine and CRUD.
//! - Provide a platform toast surface and a log-only surface.
//!
//! # Invariants
//! - `show` is fire-and-forget: it reports whether the toast was handed to the
//!   platform, never whether the user saw it.

mod desktop;

pub use desktop::DesktopSurface;

use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// One toast/alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// No notification backend can be reached on this host.
    Unavailable(String),
    /// The backend was reached but refused or failed the request.
    Failed(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "notification surface unavailable: {reason}"),
            Self::Failed(reason) => write!(f, "notification failed: {reason}"),
        }
    }
}

impl Error for NotifyError {}

/// Notification surface contract.
pub trait NotificationSurface {
    fn show(&self, notification: &Notification) -> Result<(), NotifyError>;
}

impl<N: NotificationSurface + ?Sized> NotificationSurface for Arc<N> {
    fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).show(notification)
    }
}

impl<N: NotificationSurface + ?Sized> NotificationSurface for Box<N> {
    fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).show(notification)
    }
}

/// Writes notifications to the log instead of the desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSurface;

impl NotificationSurface for LogSurface {
    fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            "event=notification_shown module=notify status=ok backend=log title_chars={} body_chars={}",
            notification.title.chars().count(),
            notification.body.chars().count()
        );
        Ok(())
    }
}

/// Configured notification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationBackend {
    #[default]
    Desktop,
    Log,
}

/// Shared surface handle used by the CLI and scheduler.
pub type SharedSurface = Arc<dyn NotificationSurface + Send + Sync>;

/// Builds the surface for a configured backend.
pub fn surface_for(backend: NotificationBackend) -> SharedSurface {
    match backend {
        NotificationBackend::Desktop => Arc::new(DesktopSurface::new()),
        NotificationBackend::Log => Arc::new(LogSurface),
    }
}
