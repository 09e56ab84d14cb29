//! The session event queue and the process-wide session registry.

pub mod event;
pub mod queue;
pub mod registry;

pub use event::{Event, EventKind};
pub use queue::EventStream;
pub use registry::{Session, SessionRegistry};
