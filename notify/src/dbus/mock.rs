use super::{Bus, NotifyRequest, ServerInformation, Signal, Signals};
use crate::{Error, Result};
use futures_lite::{future::BoxedLocal, stream, FutureExt, StreamExt};
use std::{cell::RefCell, rc::Rc};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MockState {
    pub requests: Vec<NotifyRequest>,
    pub closed: Vec<u32>,
    pub next_id: u32,
    pub fail_calls: bool,
    pub capabilities: Vec<String>,
    pub subscriptions: usize,
    pub active_subscriptions: usize,
    pub sender: Option<mpsc::UnboundedSender<Signal>>,
}

/// In-memory notification service handing out sequential ids.
#[derive(Clone, Default)]
pub struct MockBus {
    pub state: Rc<RefCell<MockState>>,
}

impl MockBus {
    pub fn emit(&self, signal: Signal) {
        if let Some(sender) = self.state.borrow().sender.as_ref() {
            _ = sender.send(signal);
        }
    }

    fn failure(&self) -> Option<Error> {
        self.state
            .borrow()
            .fail_calls
            .then(|| Error::BusCallFailed(zbus::Error::Failure("service exploded".into())))
    }
}

struct SubscriptionGuard(Rc<RefCell<MockState>>);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.borrow_mut().active_subscriptions -= 1;
    }
}

impl Bus for MockBus {
    fn notify(&self, request: NotifyRequest) -> BoxedLocal<Result<u32>> {
        let result = match self.failure() {
            Some(e) => Err(e),
            None => {
                let mut state = self.state.borrow_mut();
                let id = match request.replaces_id {
                    0 => {
                        state.next_id += 1;
                        state.next_id
                    }
                    id => id,
                };
                state.requests.push(request);
                Ok(id)
            }
        };

        async move { result }.boxed_local()
    }

    fn close_notification(&self, id: u32) -> BoxedLocal<Result<()>> {
        let result = match self.failure() {
            Some(e) => Err(e),
            None => {
                self.state.borrow_mut().closed.push(id);
                Ok(())
            }
        };

        async move { result }.boxed_local()
    }

    fn capabilities(&self) -> BoxedLocal<Result<Vec<String>>> {
        let capabilities = self.state.borrow().capabilities.clone();
        async move { Ok(capabilities) }.boxed_local()
    }

    fn server_information(&self) -> BoxedLocal<Result<ServerInformation>> {
        async move {
            Ok(ServerInformation {
                name: "mock".into(),
                vendor: "mox".into(),
                version: "0.1.0".into(),
                spec_version: "1.2".into(),
            })
        }
        .boxed_local()
    }

    fn subscribe(&self) -> BoxedLocal<Result<Signals>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        {
            let mut state = self.state.borrow_mut();
            state.sender = Some(sender);
            state.subscriptions += 1;
            state.active_subscriptions += 1;
        }

        let guard = SubscriptionGuard(Rc::clone(&self.state));
        let signals = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
            let signal = receiver.recv().await?;
            Some((signal, (receiver, guard)))
        });

        async move { Ok(signals.boxed_local()) }.boxed_local()
    }
}
