use crate::{
    action::{self, Action, UserData},
    anchor::{Anchor, AnchorTracker},
    dbus::{CloseReason, NotifyRequest},
    hints::{Hint, Hints},
    Error, Result, Session, Timeout, Urgency,
};
use image::DynamicImage;
use std::{cell::RefCell, mem, rc::Rc};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[default]
    Unsent,
    Shown,
    Closed,
}

pub type ClosedCallback = Box<dyn FnMut(u32, CloseReason)>;

/// The part of a notification the session reaches through signals.
#[derive(Default)]
pub(crate) struct Shared {
    id: u32,
    state: State,
    actions: Vec<Action>,
    closed_handlers: Vec<ClosedCallback>,
}

pub(crate) type SharedRef = Rc<RefCell<Shared>>;

pub(crate) fn closed(record: &SharedRef, id: u32, reason: CloseReason) {
    let mut handlers = {
        let mut shared = record.borrow_mut();
        if shared.state == State::Closed {
            return;
        }
        shared.state = State::Closed;
        mem::take(&mut shared.closed_handlers)
    };

    log::debug!("Notification {id} closed: {reason:?}");
    handlers.iter_mut().for_each(|handler| handler(id, reason));

    let mut shared = record.borrow_mut();
    handlers.append(&mut shared.closed_handlers);
    shared.closed_handlers = handlers;
}

/// Runs the callback registered for `key`. Returns whether one was found.
pub(crate) fn invoke_action(record: &SharedRef, id: u32, key: &str) -> bool {
    let (index, mut callback, mut user_data) = {
        let mut shared = record.borrow_mut();
        if shared.state == State::Closed {
            log::debug!("Ignoring action {key} of closed notification {id}");
            return false;
        }

        let Some(index) = shared.actions.iter().position(|action| action.id() == key) else {
            log::debug!("Notification {id} has no action {key}");
            return false;
        };

        let action = &mut shared.actions[index];
        (index, action.callback.take(), action.user_data.take())
    };

    log::debug!("Action {key} invoked on notification {id}");
    if let Some(callback) = callback.as_mut() {
        callback(id, key, user_data.as_mut());
    }

    let mut shared = record.borrow_mut();
    let action = &mut shared.actions[index];
    action.callback = callback;
    action.user_data = user_data;

    true
}

/// A desktop notification.
///
/// Mutations only change local state and mark the notification as having
/// pending updates; nothing reaches the server before [`Notification::show`].
pub struct Notification {
    shared: SharedRef,
    summary: String,
    body: Option<String>,
    icon: Option<String>,
    app_name: Option<String>,
    timeout: Timeout,
    hints: Hints,
    anchor: AnchorTracker,
    user_data: Option<UserData>,
    updates_pending: bool,
    session: Option<Session>,
}

fn validate_summary(summary: &str) -> Result<()> {
    if summary.is_empty() {
        return Err(Error::invalid("summary must not be empty"));
    }

    Ok(())
}

impl Notification {
    pub fn new(summary: &str, body: Option<&str>, icon: Option<&str>) -> Result<Self> {
        validate_summary(summary)?;

        Ok(Self {
            shared: SharedRef::default(),
            summary: summary.into(),
            body: body.map(Into::into),
            icon: icon.map(Into::into),
            app_name: None,
            timeout: Timeout::Default,
            hints: Hints::new(),
            anchor: AnchorTracker::default(),
            user_data: None,
            updates_pending: false,
            session: None,
        })
    }

    /// Like [`Notification::new`], positioned next to `anchor` on every show.
    pub fn with_anchor(
        summary: &str,
        body: Option<&str>,
        icon: Option<&str>,
        anchor: Box<dyn Anchor>,
    ) -> Result<Self> {
        let mut notification = Self::new(summary, body, icon)?;
        notification.attach_to_anchor(Some(anchor));
        Ok(notification)
    }

    pub fn update(&mut self, summary: &str, body: Option<&str>, icon: Option<&str>) -> Result<()> {
        validate_summary(summary)?;

        self.summary = summary.into();
        self.body = body.map(Into::into);
        self.icon = icon.map(Into::into);
        self.updates_pending = true;

        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.shared.borrow().id
    }

    pub fn state(&self) -> State {
        self.shared.borrow().state
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    pub fn hints(&self) -> &Hints {
        &self.hints
    }

    pub fn updates_pending(&self) -> bool {
        self.updates_pending
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Sends through `session` instead of connecting on first show.
    pub fn set_session(&mut self, session: &Session) {
        if let Some(previous) = self.session.replace(session.clone()) {
            if !previous.ptr_eq(session) {
                previous.release(self.id(), &self.shared);
            }
        }
    }

    /// Overrides the session's application name for this notification.
    pub fn set_app_name(&mut self, app_name: Option<&str>) {
        self.app_name = app_name.map(Into::into);
        self.updates_pending = true;
    }

    pub fn set_timeout<T>(&mut self, timeout: T)
    where
        T: Into<Timeout>,
    {
        self.timeout = timeout.into();
        self.updates_pending = true;
    }

    pub fn set_hint(&mut self, key: &str, value: Hint) -> Result<()> {
        self.hints.set(key, value)?;
        self.updates_pending = true;
        Ok(())
    }

    pub fn set_hint_int32(&mut self, key: &str, value: i32) -> Result<()> {
        self.set_hint(key, Hint::Int32(value))
    }

    pub fn set_hint_double(&mut self, key: &str, value: f64) -> Result<()> {
        self.set_hint(key, Hint::Double(value))
    }

    pub fn set_hint_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_hint(key, Hint::String(value.into()))
    }

    pub fn set_hint_byte(&mut self, key: &str, value: i64) -> Result<()> {
        self.set_hint(key, Hint::byte(key, value)?)
    }

    pub fn set_hint_byte_array(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.set_hint(key, Hint::ByteArray(value.to_vec()))
    }

    pub fn clear_hints(&mut self) {
        self.hints.clear();
        self.updates_pending = true;
    }

    pub fn set_category(&mut self, category: &str) -> Result<()> {
        self.set_hint_string("category", category)
    }

    pub fn set_urgency(&mut self, urgency: Urgency) -> Result<()> {
        self.set_hint("urgency", Hint::Byte(urgency as u8))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_icon_from_raster(
        &mut self,
        pixels: &[u8],
        width: i32,
        height: i32,
        rowstride: i32,
        channels: i32,
        bits_per_sample: i32,
        has_alpha: bool,
    ) -> Result<()> {
        self.hints.set_icon_from_raster(
            pixels,
            width,
            height,
            rowstride,
            channels,
            bits_per_sample,
            has_alpha,
        )?;
        self.updates_pending = true;
        Ok(())
    }

    pub fn set_icon_from_image(&mut self, image: &DynamicImage) -> Result<()> {
        self.hints.set_icon_from_image(image)?;
        self.updates_pending = true;
        Ok(())
    }

    /// Replaces the anchor. The previous one is dropped.
    pub fn attach_to_anchor(&mut self, anchor: Option<Box<dyn Anchor>>) {
        self.anchor.attach(anchor);
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_attached()
    }

    /// Stores `user_data`, dropping (and so destroying) the previous value
    /// first.
    pub fn set_user_data(&mut self, user_data: Option<UserData>) {
        drop(self.user_data.take());
        self.user_data = user_data;
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub fn user_data_mut(&mut self) -> Option<&mut UserData> {
        self.user_data.as_mut()
    }

    /// Appends an action. Actions are fixed once the notification has been
    /// shown.
    pub fn add_action<F>(
        &mut self,
        id: &str,
        label: &str,
        callback: F,
        user_data: Option<UserData>,
    ) -> Result<()>
    where
        F: FnMut(u32, &str, Option<&mut UserData>) + 'static,
    {
        if id.is_empty() {
            return Err(Error::invalid("action id must not be empty"));
        }

        let mut shared = self.shared.borrow_mut();
        if shared.state != State::Unsent {
            return Err(Error::Unsupported(
                "actions cannot be added after the notification was shown".into(),
            ));
        }

        shared
            .actions
            .try_reserve(1)
            .map_err(|_| Error::ResourceExhausted)?;
        shared
            .actions
            .push(Action::new(id, label, callback, user_data));
        drop(shared);

        self.updates_pending = true;
        Ok(())
    }

    pub fn connect_closed<F>(&mut self, callback: F)
    where
        F: FnMut(u32, CloseReason) + 'static,
    {
        self.shared
            .borrow_mut()
            .closed_handlers
            .push(Box::new(callback));
    }

    /// The `Notify` arguments this notification currently translates to.
    pub fn to_request(&self, app_name: &str) -> NotifyRequest {
        let shared = self.shared.borrow();

        NotifyRequest {
            app_name: self.app_name.as_deref().unwrap_or(app_name).into(),
            replaces_id: shared.id,
            app_icon: self.icon.clone().unwrap_or_default(),
            summary: self.summary.clone(),
            body: self.body.clone().unwrap_or_default(),
            actions: action::flatten(&shared.actions),
            hints: self.hints.clone(),
            expire_timeout: self.timeout.into(),
        }
    }

    async fn acquire_session(&mut self) -> Result<Session> {
        if let Some(session) = self.session.as_ref() {
            return Ok(session.clone());
        }

        let session = Session::connect().await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Sends the notification, replacing the previously shown one if any.
    /// Resolves once the server assigned an id.
    pub async fn show(&mut self) -> Result<()> {
        let session = self.acquire_session().await?;
        session.subscribe().await?;

        let previous_id = self.id();
        let id = self.send(&session).await.inspect_err(|e| {
            log::warn!("Failed to show notification \"{}\": {e}", self.summary);
            session.release_unused();
        })?;

        {
            let mut shared = self.shared.borrow_mut();
            shared.id = id;
            shared.state = State::Shown;
        }
        session.register(previous_id, id, &self.shared);
        self.updates_pending = false;

        log::debug!("Notification \"{}\" shown with id {id}", self.summary);
        Ok(())
    }

    async fn send(&mut self, session: &Session) -> Result<u32> {
        if self.anchor.refresh(&mut self.hints)? {
            self.updates_pending = true;
        }

        session.notify(self.to_request(&session.app_name())).await
    }

    /// Asks the server to close the notification. The state only changes
    /// once the server reports the closure.
    pub async fn close(&mut self) -> Result<()> {
        let session = self.acquire_session().await?;
        session.close_notification(self.id()).await
    }
}

impl Drop for Notification {
    fn drop(&mut self) {
        let id = self.shared.borrow().id;
        if id == 0 {
            return;
        }

        if let Some(session) = self.session.as_ref() {
            session.release(id, &self.shared);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dbus::mock::MockBus, Signal};
    use std::cell::Cell;

    fn notification(bus: &MockBus, summary: &str) -> Notification {
        let mut notification = Notification::new(summary, None, None).unwrap();
        notification.set_session(&Session::new(bus.clone()));
        notification
    }

    #[test]
    fn empty_summary_is_rejected() {
        assert!(matches!(
            Notification::new("", Some("body"), None),
            Err(Error::InvalidArgument(_))
        ));

        let mut notification = Notification::new("Summary", None, None).unwrap();
        assert!(matches!(
            notification.update("", None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(notification.summary(), "Summary");
    }

    #[test]
    fn missing_body_and_icon_are_sent_empty() {
        let notification = Notification::new("Summary", Some(""), None).unwrap();
        let request = notification.to_request("app");

        assert_eq!(request.body, "");
        assert_eq!(request.app_icon, "");
        assert_eq!(request.replaces_id, 0);
        assert_eq!(request.expire_timeout, -1);
        assert!(request.hints.is_empty());
        assert!(request.actions.is_empty());
    }

    #[test]
    fn update_marks_pending_without_touching_hints() {
        let mut notification = Notification::new("Summary", None, None).unwrap();
        notification.set_timeout(5000);
        notification.set_category("email.arrived").unwrap();
        notification.update("New", Some("Body"), Some("mail")).unwrap();

        assert!(notification.updates_pending());
        assert_eq!(notification.body(), Some("Body"));
        assert_eq!(notification.icon(), Some("mail"));
        assert_eq!(notification.timeout(), Timeout::Milliseconds(5000));
        assert_eq!(
            notification.hints().get("category"),
            Some(&Hint::String("email.arrived".into()))
        );
    }

    #[test]
    fn urgency_and_app_name_translation() {
        let mut notification = Notification::new("Summary", None, None).unwrap();
        notification.set_urgency(Urgency::Critical).unwrap();

        assert_eq!(notification.to_request("fallback").app_name, "fallback");
        notification.set_app_name(Some("mail"));
        assert_eq!(notification.to_request("fallback").app_name, "mail");
        assert_eq!(
            notification.hints().get("urgency"),
            Some(&Hint::Byte(2))
        );
    }

    #[test]
    fn byte_hint_range_checked() {
        let mut notification = Notification::new("Summary", None, None).unwrap();

        assert!(matches!(
            notification.set_hint_byte("level", 300),
            Err(Error::ValueOutOfRange { value: 300, .. })
        ));
        assert!(notification.hints().get("level").is_none());
    }

    #[test]
    fn user_data_destructor_runs_before_replacement() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut notification = Notification::new("Summary", None, None).unwrap();

        let first = Rc::clone(&log);
        notification.set_user_data(Some(UserData::with_destructor("first", move |data| {
            first.borrow_mut().push(data)
        })));
        let second = Rc::clone(&log);
        notification.set_user_data(Some(UserData::with_destructor("second", move |data| {
            second.borrow_mut().push(data)
        })));

        assert_eq!(*log.borrow(), ["first"]);
        assert_eq!(
            notification.user_data().and_then(|d| d.downcast_ref::<&str>()),
            Some(&"second")
        );

        drop(notification);
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn anchor_is_released_on_replace() {
        let released = Rc::new(Cell::new(false));

        struct Widget(Rc<Cell<bool>>);

        impl Anchor for Widget {
            fn screen_center(&self) -> Result<(i32, i32)> {
                Ok((1, 1))
            }
        }

        impl Drop for Widget {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let mut notification = Notification::new("Summary", None, None).unwrap();
        notification.attach_to_anchor(Some(Box::new(Widget(Rc::clone(&released)))));
        assert!(notification.is_anchored());

        notification.attach_to_anchor(None);
        assert!(released.get());
        assert!(!notification.is_anchored());
    }

    #[tokio::test]
    async fn show_assigns_id_and_reuses_it() {
        let bus = MockBus::default();
        let mut notification = notification(&bus, "Summary");

        notification.show().await.unwrap();
        assert_eq!(notification.id(), 1);
        assert_eq!(notification.state(), State::Shown);
        assert!(!notification.updates_pending());

        notification.update("Updated", None, None).unwrap();
        notification.show().await.unwrap();
        assert_eq!(notification.id(), 1);

        let state = bus.state.borrow();
        assert_eq!(state.requests.len(), 2);
        assert_eq!(state.requests[0].replaces_id, 0);
        assert_eq!(state.requests[1].replaces_id, 1);
        assert_eq!(state.requests[1].summary, "Updated");
    }

    #[tokio::test]
    async fn failed_show_keeps_notification_unsent() {
        let bus = MockBus::default();
        bus.state.borrow_mut().fail_calls = true;
        let mut notification = notification(&bus, "Summary");

        let result = notification.show().await;

        assert!(matches!(result, Err(Error::BusCallFailed(_))));
        assert_eq!(notification.state(), State::Unsent);
        assert_eq!(notification.id(), 0);
    }

    #[tokio::test]
    async fn anchor_position_becomes_hints() {
        let bus = MockBus::default();
        let mut notification = notification(&bus, "Summary");
        notification.attach_to_anchor(Some(Box::new(|| -> Result<(i32, i32)> {
            Ok((640, 20))
        })));

        notification.show().await.unwrap();

        let state = bus.state.borrow();
        let hints = &state.requests[0].hints;
        assert_eq!(hints.get("x"), Some(&Hint::Int32(640)));
        assert_eq!(hints.get("y"), Some(&Hint::Int32(20)));
    }

    #[test]
    fn anchored_constructor() {
        let notification = Notification::with_anchor(
            "Summary",
            None,
            None,
            Box::new(|| -> Result<(i32, i32)> { Ok((0, 0)) }),
        )
        .unwrap();

        assert!(notification.is_anchored());
    }

    #[tokio::test]
    async fn unmapped_anchor_aborts_show() {
        let bus = MockBus::default();
        let mut notification = notification(&bus, "Summary");
        notification.attach_to_anchor(Some(Box::new(|| -> Result<(i32, i32)> {
            Err(Error::NoWindow)
        })));

        assert!(matches!(notification.show().await, Err(Error::NoWindow)));
        assert!(bus.state.borrow().requests.is_empty());
    }

    #[tokio::test]
    async fn actions_are_flattened_and_frozen_after_show() {
        let bus = MockBus::default();
        let mut notification = notification(&bus, "Summary");
        notification
            .add_action("default", "Open", |_, _, _| {}, None)
            .unwrap();
        notification
            .add_action("2", "Later", |_, _, _| {}, None)
            .unwrap();
        assert!(matches!(
            notification.add_action("", "Nameless", |_, _, _| {}, None),
            Err(Error::InvalidArgument(_))
        ));

        notification.show().await.unwrap();

        assert_eq!(
            bus.state.borrow().requests[0].actions,
            ["default", "Open", "2", "Later"]
        );
        assert!(matches!(
            notification.add_action("3", "Too late", |_, _, _| {}, None),
            Err(Error::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn close_sends_current_id_without_changing_state() {
        let bus = MockBus::default();
        let mut notification = notification(&bus, "Summary");
        notification.show().await.unwrap();

        notification.close().await.unwrap();

        assert_eq!(bus.state.borrow().closed, [1]);
        assert_eq!(notification.state(), State::Shown);
    }

    #[tokio::test]
    async fn dropped_notification_no_longer_receives_signals() {
        let bus = MockBus::default();
        let session = Session::new(bus.clone());
        let mut notification = Notification::new("Summary", None, None).unwrap();
        notification.set_session(&session);
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        notification.connect_closed(move |_, _| flag.set(true));
        notification.show().await.unwrap();

        drop(notification);
        session
            .dispatch(Signal::NotificationClosed {
                id: 1,
                reason: CloseReason::Closed,
            })
            .await
            .unwrap();

        assert!(!fired.get());
        assert!(!session.is_subscribed());
    }

    #[tokio::test]
    async fn closed_notification_can_be_shown_again() {
        let bus = MockBus::default();
        let session = Session::new(bus.clone());
        let mut notification = Notification::new("Summary", None, None).unwrap();
        notification.set_session(&session);
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        notification.connect_closed(move |_, _| counter.set(counter.get() + 1));

        notification.show().await.unwrap();
        let closed = Signal::NotificationClosed {
            id: 1,
            reason: CloseReason::Expired,
        };
        session.dispatch(closed.clone()).await.unwrap();
        notification.show().await.unwrap();
        session.dispatch(closed).await.unwrap();

        assert_eq!(fired.get(), 2);
    }
}
