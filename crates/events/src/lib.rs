//! Domain & integration events.
//!
//! Messages leave the transactional core only through an [`EventBus`], after
//! the store transaction has committed. The notification collaborator is the
//! main consumer.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod notification;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{NotificationKind, NotificationRequested};
pub use tenant::TenantScoped;
