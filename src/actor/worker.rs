// One-shot execution of a single computation

use crate::actor::Request;
use crate::error::{ComputationFailure, CoordinatorError};
use crate::facade::{AsyncContext, Computation};
use crate::promise::Outcome;
use crate::types::{Participant, PromiseId, WorkerId};
use serde_json::Value;
use std::any::Any;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

/// Runs exactly one computation, reports its outcome once, then exits.
pub(crate) struct Worker {
    id: WorkerId,
    promise: PromiseId,
    computation: Computation,
    args: Vec<Value>,
    requests: mpsc::UnboundedSender<Request>,
}

impl Worker {
    pub fn new(
        promise: PromiseId,
        computation: Computation,
        args: Vec<Value>,
        requests: mpsc::UnboundedSender<Request>,
    ) -> Self {
        Self {
            id: WorkerId::new(),
            promise,
            computation,
            args,
            requests,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Worker {
            id,
            promise,
            computation,
            args,
            requests,
        } = self;

        let context = AsyncContext::new(Participant::Worker(id), requests);
        let start = std::time::Instant::now();

        // Nested task so a panic surfaces as a JoinError instead of killing us.
        let task = tokio::spawn(computation.call(context.clone(), args));
        let outcome: Outcome = match task.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ComputationFailure::Error(format!("{:#}", err))),
            Err(join_err) => Err(failure_from_join(join_err)),
        };

        tracing::debug!(
            "{} finished {} for promise {} in {:.3}s (ok: {})",
            id,
            computation.name(),
            promise,
            start.elapsed().as_secs_f64(),
            outcome.is_ok()
        );

        match context.report_return(promise, outcome).await {
            Ok(()) => {}
            Err(CoordinatorError::CoordinatorClosed) => {
                tracing::debug!("{}: coordinator closed before promise {} was reported", id, promise);
            }
            Err(err) => {
                tracing::warn!("{}: return for promise {} rejected: {}", id, promise, err);
            }
        }
    }
}

fn failure_from_join(err: JoinError) -> ComputationFailure {
    if err.is_panic() {
        ComputationFailure::Panicked(panic_message(err.into_panic()))
    } else {
        ComputationFailure::Error(err.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        assert_eq!(panic_message(Box::new("static str")), "static str");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(5u8)), "non-string panic payload");
    }

    #[tokio::test]
    async fn join_error_from_panic_becomes_panicked() {
        let handle = tokio::spawn(async {
            panic!("worker blew up");
        });
        let err = handle.await.unwrap_err();
        assert_eq!(
            failure_from_join(err),
            ComputationFailure::Panicked("worker blew up".into())
        );
    }
}
