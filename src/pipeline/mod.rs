//! Orchestration: the gate, the processor and the thread merger.

mod gate;
mod processor;
mod thread_merge;

pub use gate::SerializationGate;
pub use processor::{NotificationProcessor, ProcessorSettings, DEFAULT_POSTS_PER_PAGE};
pub use thread_merge::merge_threads;
