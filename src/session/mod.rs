//! Call session module — lifecycle of one embedded call room.
//!
//! `CallSession` wraps an external RTC widget and reconciles its asynchronous
//! events with local state. The widget itself sits behind the `RtcWidget`
//! trait; `loopback` provides an in-process implementation.

pub mod call;
pub mod call_test;
#[cfg(test)]
pub mod fake;
pub mod loopback;
pub mod widget;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use call::CallSession;
pub use widget::{WidgetError, WidgetMessage};

/// Which side of the consultation the local participant is on.
///
/// Only affects display text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Nutritionist,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Nutritionist => "Nutritionist",
        }
    }

    /// Label for the other side of the call.
    pub fn counterpart_label(&self) -> &'static str {
        match self {
            Role::Patient => "Nutritionist",
            Role::Nutritionist => "Patient",
        }
    }
}

/// Call lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Idle,
    Connecting,
    Active,
    Ended,
    /// The widget could not be constructed.
    Failed(String),
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Active => "active",
            LifecycleState::Ended => "ended",
            LifecycleState::Failed(_) => "failed",
        }
    }

    /// States in which a widget handle must be live.
    pub fn has_widget(&self) -> bool {
        matches!(self, LifecycleState::Connecting | LifecycleState::Active)
    }
}

/// Props supplied by the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallProps {
    pub room: String,
    pub display_name: String,
    pub role: Role,
    pub is_open: bool,
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error("Room and display name are required (room={room:?}, display_name={display_name:?})")]
    InvalidParams { room: String, display_name: String },

    #[error("Call widget unavailable: {0}")]
    WidgetUnavailable(#[from] WidgetError),

    #[error("No call widget is connected")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::Patient.label(), "Patient");
        assert_eq!(Role::Patient.counterpart_label(), "Nutritionist");
        assert_eq!(Role::Nutritionist.counterpart_label(), "Patient");
    }

    #[test]
    fn test_role_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            role: Role,
        }
        let w: Wrapper = toml::from_str("role = \"nutritionist\"").unwrap();
        assert_eq!(w.role, Role::Nutritionist);
    }

    #[test]
    fn test_widget_states() {
        assert!(LifecycleState::Connecting.has_widget());
        assert!(LifecycleState::Active.has_widget());
        assert!(!LifecycleState::Idle.has_widget());
        assert!(!LifecycleState::Ended.has_widget());
        assert!(!LifecycleState::Failed("x".into()).has_widget());
    }
}
