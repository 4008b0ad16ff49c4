use std::sync::Arc;

use tokio::sync::broadcast;

use torque_types::events::LedgerEvent;

/// Fan-out hub for change-feed events. API handlers broadcast after
/// every successful mutation; WebSocket connections subscribe and filter
/// by employee scope. Lagged subscribers lose events, which is fine:
/// consumers reload their full working set on the next one.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<LedgerEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to ledger events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: LedgerEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn events_reach_all_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        dispatcher.broadcast(LedgerEvent::SaleCreated {
            sale_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
        });

        assert!(matches!(a.try_recv(), Ok(LedgerEvent::SaleCreated { .. })));
        assert!(matches!(b.try_recv(), Ok(LedgerEvent::SaleCreated { .. })));
    }
}
