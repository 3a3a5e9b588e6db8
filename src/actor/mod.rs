// Coordinator actor and the one-shot workers it spawns

pub mod coordinator;
mod worker;


pub use coordinator::{Coordinator, CoordinatorHandle};
pub(crate) use coordinator::Request;
