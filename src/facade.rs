//! The async façade: the one call surface into the coordinator.
//!
//! Top-level callers get an [`AsyncContext`] from the coordinator handle;
//! workers get one bound to their own identity and pass it into the
//! computation they run, so computations can invoke and await other
//! computations.

use crate::actor::Request;
use crate::error::CoordinatorResult;
use crate::promise::Outcome;
use crate::types::{ComputationName, Participant, PromiseId};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type ComputationFn =
    dyn Fn(AsyncContext, Vec<Value>) -> BoxFuture<anyhow::Result<Value>> + Send + Sync;

/// A named async callable that a worker runs exactly once per invocation.
#[derive(Clone)]
pub struct Computation {
    name: ComputationName,
    func: Arc<ComputationFn>,
}

impl Computation {
    pub fn new<F, Fut>(name: impl Into<ComputationName>, func: F) -> Self
    where
        F: Fn(AsyncContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |ctx, args| Box::pin(func(ctx, args))),
        }
    }

    pub fn name(&self) -> &ComputationName {
        &self.name
    }

    pub(crate) fn call(&self, ctx: AsyncContext, args: Vec<Value>) -> BoxFuture<anyhow::Result<Value>> {
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Caller-side handle for `invoke` and `await`.
///
/// Cheap to clone; every clone speaks as the same participant.
#[derive(Clone)]
pub struct AsyncContext {
    participant: Participant,
    requests: mpsc::UnboundedSender<Request>,
}

impl AsyncContext {
    pub(crate) fn new(participant: Participant, requests: mpsc::UnboundedSender<Request>) -> Self {
        Self {
            participant,
            requests,
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Start `computation(args)` on a new worker and return its promise.
    ///
    /// Only waits for the coordinator to allocate the promise, never for the
    /// computation itself.
    pub async fn invoke(
        &self,
        computation: Computation,
        args: Vec<Value>,
    ) -> CoordinatorResult<PromiseId> {
        let (reply, rx) = oneshot::channel();
        self.requests.send(Request::Invoke {
            caller: self.participant.clone(),
            computation,
            args,
            reply,
        })?;
        Ok(rx.await?)
    }

    /// Wait for the value of `promise`. Suspends only while it is pending.
    pub async fn await_promise(&self, promise: PromiseId) -> CoordinatorResult<Value> {
        let (reply, rx) = oneshot::channel();
        self.requests.send(Request::Await {
            caller: self.participant.clone(),
            promise,
            reply,
        })?;
        rx.await?
    }

    /// Drop a completed promise from the coordinator's table.
    pub async fn release(&self, promise: PromiseId) -> CoordinatorResult<()> {
        let (reply, rx) = oneshot::channel();
        self.requests.send(Request::Release {
            caller: self.participant.clone(),
            promise,
            reply,
        })?;
        rx.await?
    }

    /// Report the outcome of the computation behind `promise`.
    pub(crate) async fn report_return(
        &self,
        promise: PromiseId,
        outcome: Outcome,
    ) -> CoordinatorResult<()> {
        let (ack, rx) = oneshot::channel();
        self.requests.send(Request::Return {
            reporter: self.participant.clone(),
            promise,
            outcome,
            ack,
        })?;
        rx.await?
    }
}

impl fmt::Debug for AsyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContext")
            .field("participant", &self.participant)
            .finish_non_exhaustive()
    }
}
