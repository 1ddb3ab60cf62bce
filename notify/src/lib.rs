pub mod action;
pub mod anchor;
pub mod dbus;
mod error;
pub mod hints;
mod notification;
mod session;

pub use action::{Action, UserData};
pub use anchor::Anchor;
pub use dbus::{Bus, CloseReason, NotifyRequest, ServerInformation, Signal};
pub use error::{Error, Result};
pub use hints::{Hint, Hints};
pub use notification::{Notification, State};
pub use session::Session;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(PartialEq, Eq, Serialize, Deserialize, Default, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low = 0,
    #[default]
    Normal = 1,
    Critical = 2,
}

impl FromStr for Urgency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "critical" => Ok(Self::Critical),
            _ => Err(Error::InvalidArgument(
                format!(
                    "Unknown urgency {s} specified. Known urgency levels: low, normal, critical."
                )
                .into(),
            )),
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Expiration policy of a notification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Let the server decide (`-1` on the wire).
    #[default]
    Default,
    /// Stay until dismissed (`0` on the wire).
    Never,
    Milliseconds(u32),
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        match ms {
            0 => Self::Never,
            ms if ms < 0 => Self::Default,
            ms => Self::Milliseconds(ms.unsigned_abs()),
        }
    }
}

impl From<Timeout> for i32 {
    fn from(timeout: Timeout) -> Self {
        match timeout {
            Timeout::Default => -1,
            Timeout::Never => 0,
            Timeout::Milliseconds(ms) => i32::try_from(ms).unwrap_or(i32::MAX),
        }
    }
}
