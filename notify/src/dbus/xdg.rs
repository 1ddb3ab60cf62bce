use super::{Bus, CloseReason, NotifyRequest, ServerInformation, Signal, Signals};
use crate::{Error, Result};
use futures_lite::{future::BoxedLocal, FutureExt, StreamExt};
use std::collections::HashMap;
use zbus::zvariant::Value;

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    async fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    async fn close_notification(&self, id: u32) -> zbus::Result<()>;

    async fn get_capabilities(&self) -> zbus::Result<Vec<String>>;

    async fn get_server_information(&self) -> zbus::Result<(String, String, String, String)>;

    #[zbus(signal)]
    async fn notification_closed(&self, id: u32, reason: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn action_invoked(&self, id: u32, action_key: &str) -> zbus::Result<()>;
}

/// `org.freedesktop.Notifications` on the session bus.
#[derive(Clone)]
pub struct Xdg {
    proxy: NotificationsProxy<'static>,
}

impl Xdg {
    pub async fn connect() -> Result<Self> {
        let conn = zbus::Connection::session()
            .await
            .map_err(Error::BusUnavailable)?;
        let proxy = NotificationsProxy::new(&conn)
            .await
            .map_err(Error::BusUnavailable)?;

        Ok(Self { proxy })
    }
}

impl Bus for Xdg {
    fn notify(&self, request: NotifyRequest) -> BoxedLocal<Result<u32>> {
        let proxy = self.proxy.clone();

        async move {
            let hints = request.hints.to_wire()?;
            let actions: Vec<&str> = request.actions.iter().map(String::as_str).collect();

            log::debug!(
                "Notify(app_name: {}, replaces_id: {}, summary: {})",
                request.app_name,
                request.replaces_id,
                request.summary
            );

            proxy
                .notify(
                    &request.app_name,
                    request.replaces_id,
                    &request.app_icon,
                    &request.summary,
                    &request.body,
                    &actions,
                    hints,
                    request.expire_timeout,
                )
                .await
                .map_err(Error::BusCallFailed)
        }
        .boxed_local()
    }

    fn close_notification(&self, id: u32) -> BoxedLocal<Result<()>> {
        let proxy = self.proxy.clone();

        async move {
            log::debug!("CloseNotification({id})");
            proxy
                .close_notification(id)
                .await
                .map_err(Error::BusCallFailed)
        }
        .boxed_local()
    }

    fn capabilities(&self) -> BoxedLocal<Result<Vec<String>>> {
        let proxy = self.proxy.clone();

        async move { proxy.get_capabilities().await.map_err(Error::BusCallFailed) }.boxed_local()
    }

    fn server_information(&self) -> BoxedLocal<Result<ServerInformation>> {
        let proxy = self.proxy.clone();

        async move {
            let (name, vendor, version, spec_version) = proxy
                .get_server_information()
                .await
                .map_err(Error::BusCallFailed)?;

            Ok(ServerInformation {
                name,
                vendor,
                version,
                spec_version,
            })
        }
        .boxed_local()
    }

    fn subscribe(&self) -> BoxedLocal<Result<Signals>> {
        let proxy = self.proxy.clone();

        async move {
            let closed = proxy
                .receive_notification_closed()
                .await
                .map_err(Error::BusCallFailed)?
                .filter_map(|signal| match signal.args() {
                    Ok(args) => Some(Signal::NotificationClosed {
                        id: *args.id(),
                        reason: CloseReason::from(*args.reason()),
                    }),
                    Err(e) => {
                        log::warn!("Malformed NotificationClosed signal: {e}");
                        None
                    }
                });

            let invoked = proxy
                .receive_action_invoked()
                .await
                .map_err(Error::BusCallFailed)?
                .filter_map(|signal| match signal.args() {
                    Ok(args) => Some(Signal::ActionInvoked {
                        id: *args.id(),
                        action_key: args.action_key().to_string(),
                    }),
                    Err(e) => {
                        log::warn!("Malformed ActionInvoked signal: {e}");
                        None
                    }
                });

            log::debug!("Subscribed to notification signals");

            Ok(closed.or(invoked).boxed_local())
        }
        .boxed_local()
    }
}
