//! Per-callback relays and the last-set-wins slots that hold them.
//!
//! Registering a callback wraps it in a fresh `CallbackRelay`. A work item
//! enqueued through a relay holds an `Arc` to that relay, so replacing or
//! clearing the slot never invalidates an item already in flight: it still
//! runs with the callback that was current when it was enqueued.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, warn};

use super::{panic_message, HostHandle, HostScope};
use crate::error::PayloadError;

type Callback<P> = dyn Fn(P) + Send + Sync;

pub struct CallbackRelay<P> {
    name: &'static str,
    callback: Box<Callback<P>>,
    host: HostHandle,
}

impl<P: 'static> CallbackRelay<P> {
    pub fn new<F>(name: &'static str, host: HostHandle, callback: F) -> Arc<Self>
    where
        F: Fn(P) + Send + Sync + 'static,
    {
        Arc::new(Self {
            name,
            callback: Box::new(callback),
            host,
        })
    }

    /// Queue a delivery. `build` runs later on the host and produces the
    /// callback argument.
    ///
    /// A builder error or panic drops this delivery only. A panicking
    /// callback is logged. Neither reaches the caller.
    pub fn call<B>(self: &Arc<Self>, build: B)
    where
        B: FnOnce(&HostScope) -> Result<P, PayloadError> + Send + 'static,
    {
        let relay = Arc::clone(self);
        self.host
            .post(self.name, move |scope| relay.deliver(scope, build));
    }

    fn deliver<B>(&self, scope: &HostScope, build: B)
    where
        B: FnOnce(&HostScope) -> Result<P, PayloadError>,
    {
        let built = catch_unwind(AssertUnwindSafe(|| build(scope)))
            .unwrap_or_else(|panic| Err(PayloadError::Panicked(panic_message(panic.as_ref()))));

        let payload = match built {
            Ok(payload) => payload,
            Err(e) => {
                error!(relay = self.name, seq = scope.seq(), error = %e, "event dropped");
                return;
            }
        };

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (self.callback)(payload))) {
            warn!(
                relay = self.name,
                seq = scope.seq(),
                panic = %panic_message(panic.as_ref()),
                "host callback panicked"
            );
        }
    }
}

impl<P> std::fmt::Debug for CallbackRelay<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRelay")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Holds at most one relay. Setting replaces, readers get a counted handle.
pub struct CallbackSlot<P> {
    name: &'static str,
    host: HostHandle,
    current: RwLock<Option<Arc<CallbackRelay<P>>>>,
}

impl<P: 'static> CallbackSlot<P> {
    pub fn new(name: &'static str, host: HostHandle) -> Self {
        Self {
            name,
            host,
            current: RwLock::new(None),
        }
    }

    /// Install `callback`, replacing whatever was set before.
    pub fn set<F>(&self, callback: F)
    where
        F: Fn(P) + Send + Sync + 'static,
    {
        let relay = CallbackRelay::new(self.name, self.host.clone(), callback);
        let previous = self.current.write().replace(relay);
        // Dropped outside the lock; in-flight items keep their own handle.
        drop(previous);
    }

    pub fn clear(&self) {
        let previous = self.current.write().take();
        drop(previous);
    }

    /// Snapshot of the current relay, if any.
    pub fn current(&self) -> Option<Arc<CallbackRelay<P>>> {
        self.current.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.current.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::HostContext;
    use parking_lot::Mutex;

    #[test]
    fn payload_is_built_on_the_host_at_drain_time() {
        let host = HostContext::new();
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        let relay = CallbackRelay::new("test", host.handle(), move |v: u32| sink.lock().push(v));

        relay.call(|scope| Ok(scope.seq() as u32 + 100));
        assert!(got.lock().is_empty(), "nothing runs before the host drains");

        host.run_pending();
        assert_eq!(*got.lock(), vec![100]);
    }

    #[test]
    fn builder_failure_drops_only_that_event() {
        let host = HostContext::new();
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        let relay = CallbackRelay::new("test", host.handle(), move |v: &'static str| {
            sink.lock().push(v)
        });

        relay.call(|_| Ok("a"));
        relay.call(|_| Err(PayloadError::Build("bad entity".into())));
        relay.call(|_| panic!("builder blew up"));
        relay.call(|_| Ok("d"));

        assert_eq!(host.run_pending(), 4);
        assert_eq!(*got.lock(), vec!["a", "d"]);
    }

    #[test]
    fn panicking_callback_does_not_poison_the_relay() {
        let host = HostContext::new();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let relay = CallbackRelay::new("test", host.handle(), move |fail: bool| {
            *counter.lock() += 1;
            if fail {
                panic!("host handler threw");
            }
        });

        relay.call(|_| Ok(true));
        relay.call(|_| Ok(false));
        host.run_pending();
        assert_eq!(*calls.lock(), 2);
    }

    #[test]
    fn replacing_a_slot_keeps_in_flight_items_on_the_old_callback() {
        let host = HostContext::new();
        let slot: CallbackSlot<&'static str> = CallbackSlot::new("recognized", host.handle());
        let got = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&got);
        slot.set(move |v| sink.lock().push(format!("old:{v}")));
        slot.current().expect("slot set").call(|_| Ok("first"));

        let sink = Arc::clone(&got);
        slot.set(move |v| sink.lock().push(format!("new:{v}")));
        slot.current().expect("slot set").call(|_| Ok("second"));

        host.run_pending();
        assert_eq!(*got.lock(), vec!["old:first", "new:second"]);
    }

    #[test]
    fn clearing_a_slot_still_delivers_in_flight_items() {
        let host = HostContext::new();
        let slot: CallbackSlot<u8> = CallbackSlot::new("stopped", host.handle());
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        slot.set(move |v| sink.lock().push(v));

        slot.current().expect("slot set").call(|_| Ok(7));
        slot.clear();
        assert!(!slot.is_set());
        assert!(slot.current().is_none());

        host.run_pending();
        assert_eq!(*got.lock(), vec![7]);
    }
}
