// This is free and unencumbered software released into the public domain.

use crate::shared::HandleEvent;
use std::collections::HashMap;
use std::sync::{
    Arc, OnceLock, RwLock,
    atomic::{AtomicU64, Ordering},
    mpsc::Sender,
};

/// Process-wide routing table from open-camera serials to session channels.
///
/// Written only when a session opens or closes a camera; read on every
/// hardware callback dispatch. Platform callback threads hold no session
/// references: a dispatch for a serial that has been unregistered is
/// silently dropped.
#[derive(Default)]
pub struct CallbackRegistry {
    routes: RwLock<HashMap<u64, Sender<HandleEvent>>>,
    next_serial: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by all sessions in this process.
    pub fn global() -> &'static Arc<CallbackRegistry> {
        static GLOBAL: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(CallbackRegistry::new()))
    }

    /// Allocate a serial and install a route for it.
    pub fn register(&self, route: Sender<HandleEvent>) -> u64 {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed) + 1;
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.insert(serial, route);
        serial
    }

    pub fn unregister(&self, serial: u64) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.remove(&serial);
    }

    /// Forward an event to the session owning `serial`, if still present.
    pub fn dispatch(&self, serial: u64, event: HandleEvent) -> bool {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        match routes.get(&serial) {
            Some(route) => route.send(event).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn dispatch_reaches_registered_route() {
        let registry = CallbackRegistry::new();
        let (tx, rx) = channel();
        let serial = registry.register(tx);

        assert!(registry.dispatch(serial, HandleEvent::PreviewStarted));
        assert!(matches!(rx.try_recv(), Ok(HandleEvent::PreviewStarted)));
    }

    #[test]
    fn dispatch_after_unregister_is_dropped() {
        let registry = CallbackRegistry::new();
        let (tx, rx) = channel();
        let serial = registry.register(tx);
        registry.unregister(serial);

        assert!(!registry.dispatch(serial, HandleEvent::PreviewStopped));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn serials_are_not_reused() {
        let registry = CallbackRegistry::new();
        let (a, _rx_a) = channel();
        let (b, _rx_b) = channel();
        let first = registry.register(a);
        registry.unregister(first);
        let second = registry.register(b);
        assert_ne!(first, second);
    }
}
