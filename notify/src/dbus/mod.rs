#[cfg(test)]
pub(crate) mod mock;
pub mod xdg;

use crate::{hints::Hints, Result};
use futures_lite::{future::BoxedLocal, stream};

/// Arguments of a single `Notify` call, in wire order:
/// `Notify(susssasa{sv}i)` with `replaces_id` right after `app_name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotifyRequest {
    pub app_name: String,
    pub replaces_id: u32,
    pub app_icon: String,
    pub summary: String,
    pub body: String,
    pub actions: Vec<String>,
    pub hints: Hints,
    pub expire_timeout: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Expired = 1,
    Dismissed = 2,
    Closed = 3,
    Undefined = 4,
}

impl From<u32> for CloseReason {
    fn from(reason: u32) -> Self {
        match reason {
            1 => Self::Expired,
            2 => Self::Dismissed,
            3 => Self::Closed,
            _ => Self::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    NotificationClosed { id: u32, reason: CloseReason },
    ActionInvoked { id: u32, action_key: String },
}

impl Signal {
    pub fn id(&self) -> u32 {
        match self {
            Signal::NotificationClosed { id, .. } | Signal::ActionInvoked { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInformation {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub spec_version: String,
}

pub type Signals = stream::BoxedLocal<Signal>;

/// Transport to the notification service.
///
/// Every call resolves only once the service replied. Dropping the stream
/// returned by [`Bus::subscribe`] ends the subscription.
pub trait Bus {
    fn notify(&self, request: NotifyRequest) -> BoxedLocal<Result<u32>>;

    fn close_notification(&self, id: u32) -> BoxedLocal<Result<()>>;

    fn capabilities(&self) -> BoxedLocal<Result<Vec<String>>>;

    fn server_information(&self) -> BoxedLocal<Result<ServerInformation>>;

    fn subscribe(&self) -> BoxedLocal<Result<Signals>>;
}
