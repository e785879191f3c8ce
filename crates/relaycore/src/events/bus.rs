use super::ExecutionEvent;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError};

/// Event channel with a bounded replay buffer.
///
/// Late subscribers first receive the most recent `replay_capacity` events
/// and then the live stream. Consumers must tolerate seeing an event they
/// already processed through another subscription.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
    backlog: Mutex<VecDeque<ExecutionEvent>>,
    replay_capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize, replay_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            backlog: Mutex::new(VecDeque::with_capacity(replay_capacity)),
            replay_capacity,
        }
    }

    /// Subscribe: backlog snapshot first, then live events.
    pub fn subscribe(&self) -> EventSubscription {
        // Holding the backlog lock keeps the snapshot and the receiver aligned.
        let backlog = self.lock_backlog();
        EventSubscription {
            backlog: backlog.iter().cloned().collect(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let mut backlog = self.lock_backlog();
        if self.replay_capacity > 0 {
            if backlog.len() == self.replay_capacity {
                backlog.pop_front();
            }
            backlog.push_back(event.clone());
        }
        let _ = self.sender.send(event);
    }

    /// Events currently held for replay, oldest first.
    pub fn backlog(&self) -> Vec<ExecutionEvent> {
        self.lock_backlog().iter().cloned().collect()
    }

    fn lock_backlog(&self) -> MutexGuard<'_, VecDeque<ExecutionEvent>> {
        self.backlog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Receiving half returned by [`EventBus::subscribe`].
pub struct EventSubscription {
    backlog: VecDeque<ExecutionEvent>,
    receiver: broadcast::Receiver<ExecutionEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the bus is gone and the backlog drained.
    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn started(execution_id: Uuid) -> ExecutionEvent {
        ExecutionEvent::ExecutionStarted {
            execution_id,
            workflow_id: "wf".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn late_subscriber_gets_backlog_then_live() {
        let bus = EventBus::new(16, 2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            bus.emit(started(*id));
        }

        let mut sub = bus.subscribe();
        let live = Uuid::new_v4();
        bus.emit(started(live));

        // Oldest event fell out of the two-slot replay buffer.
        assert_eq!(sub.recv().await.unwrap().execution_id(), ids[1]);
        assert_eq!(sub.recv().await.unwrap().execution_id(), ids[2]);
        assert_eq!(sub.recv().await.unwrap().execution_id(), live);
    }

    #[tokio::test]
    async fn closes_when_bus_is_dropped() {
        let bus = EventBus::new(4, 0);
        let mut sub = bus.subscribe();
        bus.emit(started(Uuid::new_v4()));
        drop(bus);

        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }
}
