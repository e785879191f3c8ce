// crates/relaycore/src/events/mod.rs

mod bus;
mod event;

pub use bus::{EventBus, EventSubscription};
pub use event::{EventKind, ExecutionEvent, ExecutionId};
