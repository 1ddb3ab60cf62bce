use crate::{
    dbus::{xdg::Xdg, Bus, NotifyRequest, ServerInformation, Signal, Signals},
    notification::{self, SharedRef},
    Result,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    future::poll_fn,
    rc::{Rc, Weak},
    task::Poll,
};

/// Routes signals to live notifications by their server assigned id.
#[derive(Default)]
struct Demultiplexer {
    records: HashMap<u32, Weak<RefCell<notification::Shared>>>,
}

impl Demultiplexer {
    fn register(&mut self, id: u32, record: &SharedRef) {
        self.records.insert(id, Rc::downgrade(record));
    }

    /// Removes `id` if it still belongs to `record`.
    fn deregister(&mut self, id: u32, record: &SharedRef) -> bool {
        match self.records.get(&id) {
            Some(weak) if std::ptr::eq(weak.as_ptr(), Rc::as_ptr(record)) => {
                self.records.remove(&id);
                true
            }
            _ => false,
        }
    }

    fn lookup(&self, id: u32) -> Option<SharedRef> {
        self.records.get(&id).and_then(Weak::upgrade)
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct Inner {
    bus: Box<dyn Bus>,
    app_name: RefCell<String>,
    signals: RefCell<Option<Signals>>,
    demux: RefCell<Demultiplexer>,
}

/// Connection to the notification service shared by every notification
/// created from it.
///
/// Everything here is single threaded. Signals are only delivered while
/// somebody drives [`Session::process`] (or feeds [`Session::dispatch`]).
#[derive(Clone)]
pub struct Session {
    inner: Rc<Inner>,
}

fn default_app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

impl Session {
    pub async fn connect() -> Result<Self> {
        let bus = Xdg::connect().await?;
        Ok(Self::new(bus))
    }

    pub fn new<B>(bus: B) -> Self
    where
        B: Bus + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                bus: Box::new(bus),
                app_name: RefCell::new(default_app_name()),
                signals: RefCell::new(None),
                demux: RefCell::new(Demultiplexer::default()),
            }),
        }
    }

    pub fn app_name(&self) -> String {
        self.inner.app_name.borrow().clone()
    }

    pub fn set_app_name<T>(&self, app_name: T)
    where
        T: Into<String>,
    {
        *self.inner.app_name.borrow_mut() = app_name.into();
    }

    pub async fn capabilities(&self) -> Result<Vec<String>> {
        self.inner.bus.capabilities().await
    }

    pub async fn has_capability(&self, name: &str) -> Result<bool> {
        Ok(self
            .capabilities()
            .await?
            .iter()
            .any(|capability| capability.eq_ignore_ascii_case(name)))
    }

    pub async fn server_information(&self) -> Result<ServerInformation> {
        self.inner.bus.server_information().await
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.signals.borrow().is_some()
    }

    pub fn ptr_eq(&self, other: &Session) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) async fn subscribe(&self) -> Result<()> {
        if self.is_subscribed() {
            return Ok(());
        }

        let signals = self.inner.bus.subscribe().await?;
        let mut slot = self.inner.signals.borrow_mut();
        if slot.is_none() {
            *slot = Some(signals);
        }

        Ok(())
    }

    pub(crate) async fn notify(&self, request: NotifyRequest) -> Result<u32> {
        self.inner.bus.notify(request).await
    }

    pub(crate) async fn close_notification(&self, id: u32) -> Result<()> {
        self.inner.bus.close_notification(id).await
    }

    pub(crate) fn register(&self, previous_id: u32, id: u32, record: &SharedRef) {
        let mut demux = self.inner.demux.borrow_mut();
        if previous_id != id {
            demux.deregister(previous_id, record);
        }
        demux.register(id, record);
    }

    /// Forgets `record`. The subscription goes away with the last one.
    pub(crate) fn release(&self, id: u32, record: &SharedRef) {
        if self.inner.demux.borrow_mut().deregister(id, record) {
            self.release_unused();
        }
    }

    /// Drops the subscription when no notification is registered.
    pub(crate) fn release_unused(&self) {
        if !self.inner.demux.borrow().is_empty() {
            return;
        }

        if self.inner.signals.borrow_mut().take().is_some() {
            log::debug!("Last notification released, dropping signal subscription");
        }
    }

    /// Waits for the next signal of the subscription. Cancel safe.
    pub async fn next_signal(&self) -> Option<Signal> {
        poll_fn(|cx| {
            let mut slot = self.inner.signals.borrow_mut();
            let Some(signals) = slot.as_mut() else {
                return Poll::Ready(None);
            };

            let polled = signals.as_mut().poll_next(cx);
            if let Poll::Ready(None) = polled {
                log::warn!("Notification signal stream ended");
                *slot = None;
            }
            polled
        })
        .await
    }

    /// Receives and dispatches a single signal. Returns `false` once there
    /// is nothing left to listen to.
    pub async fn process(&self) -> Result<bool> {
        let Some(signal) = self.next_signal().await else {
            return Ok(false);
        };

        self.dispatch(signal).await?;
        Ok(true)
    }

    /// Hands `signal` to the notification it belongs to. Signals for ids
    /// nobody owns are dropped.
    pub async fn dispatch(&self, signal: Signal) -> Result<()> {
        let Some(record) = self.inner.demux.borrow().lookup(signal.id()) else {
            log::debug!("Dropping {signal:?}: no such notification");
            return Ok(());
        };

        match signal {
            Signal::NotificationClosed { id, reason } => {
                notification::closed(&record, id, reason);
            }
            Signal::ActionInvoked { id, action_key } => {
                if notification::invoke_action(&record, id, &action_key) {
                    self.close_notification(id).await?;
                }
            }
        }

        Ok(())
    }
}
