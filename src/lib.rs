// Core modules
mod error;
mod types;
pub mod promise;
pub mod events;
pub mod config;
pub mod logging;

// Coordinator, workers and the façade in front of them
pub mod actor;
mod facade;
pub mod scenarios;

// Re-export key types
pub use actor::{Coordinator, CoordinatorHandle};
pub use config::{CoordinatorConfig, EventSinkKind, load_config};
pub use error::{ComputationFailure, CoordinatorError, CoordinatorResult};
pub use events::{Event, EventCategory, EventSink, MemorySink, NullSink, Operation, Payload, TracingSink};
pub use facade::{AsyncContext, BoxFuture, Computation};
pub use promise::{Outcome, TableStats};
pub use types::{CallerName, ComputationName, Participant, PromiseId, WorkerId};

/// Start a coordinator wired up from `config`.
///
/// The in-memory event log is returned as well when the config asks for one.
pub fn start_from_config(config: &CoordinatorConfig) -> (CoordinatorHandle, Option<MemorySink>) {
    let (sink, memory) = config.build_sink();
    (Coordinator::start(sink), memory)
}
