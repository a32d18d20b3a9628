//! Anonymizing-transport control
//!
//! The only capability consumed is "rotate identity". Which rotator is used
//! is decided once at startup: the control-port client when rotation is
//! enabled, otherwise [`NoopRotator`].

mod tor;

pub use tor::TorControl;

use crate::config::{ControlConfig, ScheduleConfig};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the control channel
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Cannot reach control port {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("Control port {0} did not answer in time")]
    Timeout(String),

    #[error("Control command {command} rejected: {reply}")]
    Rejected { command: String, reply: String },

    #[error("Control channel IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can ask the transport for a fresh identity
pub trait IdentityRotator: Send + Sync {
    /// Requests a new identity; best effort
    fn rotate(&self) -> BoxFuture<'_, Result<(), ControlError>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Rotator used when no control channel is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRotator;

impl IdentityRotator for NoopRotator {
    fn rotate(&self) -> BoxFuture<'_, Result<(), ControlError>> {
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Picks the rotator for this process
pub fn select_rotator(
    schedule: &ScheduleConfig,
    control: &ControlConfig,
) -> Arc<dyn IdentityRotator> {
    if schedule.rotate_identity {
        tracing::info!("Identity rotation enabled via {}", control.address);
        Arc::new(TorControl::new(
            control.address.clone(),
            control.password.clone(),
        ))
    } else {
        Arc::new(NoopRotator)
    }
}
