// Promise coordination: one actor task owns the promise table

use crate::actor::worker::Worker;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::{Event, EventCategory, EventSink, Operation, Payload};
use crate::facade::{AsyncContext, Computation};
use crate::promise::{AwaitDisposition, Outcome, PromiseTable, Rejected, TableStats};
use crate::types::{CallerName, Participant, PromiseId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Messages accepted by the coordinator, processed strictly one at a time.
#[derive(Debug)]
pub(crate) enum Request {
    Invoke {
        caller: Participant,
        computation: Computation,
        args: Vec<Value>,
        reply: oneshot::Sender<PromiseId>,
    },
    Await {
        caller: Participant,
        promise: PromiseId,
        reply: oneshot::Sender<CoordinatorResult<Value>>,
    },
    Return {
        reporter: Participant,
        promise: PromiseId,
        outcome: Outcome,
        ack: oneshot::Sender<CoordinatorResult<()>>,
    },
    Release {
        caller: Participant,
        promise: PromiseId,
        reply: oneshot::Sender<CoordinatorResult<()>>,
    },
    Stats {
        reply: oneshot::Sender<TableStats>,
    },
    Shutdown,
}

/// A caller parked on a pending promise.
#[derive(Debug)]
struct Waiter {
    caller: Participant,
    reply: oneshot::Sender<CoordinatorResult<Value>>,
}

pub struct Coordinator {
    table: PromiseTable<Waiter>,
    requests: mpsc::UnboundedReceiver<Request>,
    // Weak so that the coordinator's own reference does not keep it alive.
    spawner: mpsc::WeakUnboundedSender<Request>,
    sink: Arc<dyn EventSink>,
}

impl Coordinator {
    /// Spawn the coordinator on the current tokio runtime.
    pub fn start(sink: Arc<dyn EventSink>) -> CoordinatorHandle {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel::<Request>();

        let coordinator = Coordinator {
            table: PromiseTable::new(),
            requests: requests_rx,
            spawner: requests_tx.downgrade(),
            sink,
        };

        let task = tokio::spawn(coordinator.run());

        CoordinatorHandle {
            requests: requests_tx,
            task,
        }
    }

    async fn run(mut self) -> TableStats {
        tracing::info!("Coordinator started");

        while let Some(request) = self.requests.recv().await {
            if !self.handle(request) {
                tracing::info!("Coordinator shutdown requested");
                break;
            }
        }

        let stats = self.table.stats();
        if stats.waiters > 0 {
            tracing::warn!(
                "Coordinator stopping with {} parked waiters on {} pending promises",
                stats.waiters,
                stats.pending
            );
        }
        tracing::info!(
            "Coordinator stopped: {} promises allocated, {} completed, {} pending",
            stats.allocated,
            stats.completed,
            stats.pending
        );
        stats
    }

    /// Process a single request to completion. Returns `false` on shutdown.
    fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::Invoke {
                caller,
                computation,
                args,
                reply,
            } => self.handle_invoke(caller, computation, args, reply),
            Request::Await {
                caller,
                promise,
                reply,
            } => self.handle_await(caller, promise, reply),
            Request::Return {
                reporter,
                promise,
                outcome,
                ack,
            } => {
                let result = self.handle_return(reporter, promise, outcome);
                let _ = ack.send(result);
            }
            Request::Release {
                caller,
                promise,
                reply,
            } => {
                let result = self.handle_release(caller, promise);
                let _ = reply.send(result);
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.table.stats());
            }
            Request::Shutdown => return false,
        }
        true
    }

    fn handle_invoke(
        &mut self,
        caller: Participant,
        computation: Computation,
        args: Vec<Value>,
        reply: oneshot::Sender<PromiseId>,
    ) {
        self.emit(
            EventCategory::InvokeRequested,
            caller.clone(),
            Participant::Coordinator,
            Operation::Invoke,
            Some(Payload::Computation(computation.name().clone())),
        );

        let promise = self.table.allocate();
        self.emit(
            EventCategory::PromiseCreated,
            Participant::Coordinator,
            Participant::Coordinator,
            Operation::Invoke,
            Some(Payload::Promise(promise)),
        );

        match self.spawner.upgrade() {
            Some(requests) => {
                let name = computation.name().clone();
                let worker = Worker::new(promise, computation, args, requests);
                tracing::debug!(
                    "{} invoked {} as promise {} on {}",
                    caller,
                    name,
                    promise,
                    worker.id()
                );
                self.emit(
                    EventCategory::WorkerSpawned,
                    Participant::Coordinator,
                    Participant::Worker(worker.id()),
                    Operation::Invoke,
                    Some(Payload::Computation(name)),
                );
                worker.spawn();
            }
            None => {
                // Every sender is gone, so nobody could ever observe the result.
                tracing::warn!(
                    "No live request senders; promise {} will never be computed",
                    promise
                );
            }
        }

        self.emit(
            EventCategory::InvokeReplied,
            Participant::Coordinator,
            caller,
            Operation::Invoke,
            Some(Payload::Promise(promise)),
        );
        let _ = reply.send(promise);
    }

    fn handle_await(
        &mut self,
        caller: Participant,
        promise: PromiseId,
        reply: oneshot::Sender<CoordinatorResult<Value>>,
    ) {
        let waiter = Waiter {
            caller: caller.clone(),
            reply,
        };

        match self.table.await_or_park(promise, waiter) {
            Ok(AwaitDisposition::Ready { outcome, waiter }) => {
                self.emit(
                    EventCategory::AwaitImmediate,
                    caller,
                    Participant::Coordinator,
                    Operation::Await,
                    Some(Payload::Promise(promise)),
                );
                self.notify(promise, waiter, outcome);
            }
            Ok(AwaitDisposition::Parked { position }) => {
                tracing::debug!(
                    "{} parked on pending promise {} (position {})",
                    caller,
                    promise,
                    position
                );
                self.emit(
                    EventCategory::AwaitPending,
                    caller,
                    Participant::Coordinator,
                    Operation::Await,
                    Some(Payload::Promise(promise)),
                );
            }
            Err(Rejected { error, waiter }) => {
                self.reject(&caller, Operation::Await, promise, &error);
                let _ = waiter.reply.send(Err(error));
            }
        }
    }

    fn handle_return(
        &mut self,
        reporter: Participant,
        promise: PromiseId,
        outcome: Outcome,
    ) -> CoordinatorResult<()> {
        self.emit(
            EventCategory::Returned,
            reporter.clone(),
            Participant::Coordinator,
            Operation::Return,
            Some(outcome_payload(&outcome)),
        );

        match self.table.complete(promise, outcome.clone()) {
            Ok(waiters) => {
                tracing::debug!(
                    "Promise {} completed by {}, notifying {} waiters",
                    promise,
                    reporter,
                    waiters.len()
                );
                for waiter in waiters {
                    self.notify(promise, waiter, outcome.clone());
                }
                Ok(())
            }
            Err(error) => {
                self.reject(&reporter, Operation::Return, promise, &error);
                Err(error)
            }
        }
    }

    fn handle_release(&mut self, caller: Participant, promise: PromiseId) -> CoordinatorResult<()> {
        match self.table.release(promise) {
            Ok(_) => {
                tracing::debug!("{} released promise {}", caller, promise);
                self.emit(
                    EventCategory::Released,
                    caller,
                    Participant::Coordinator,
                    Operation::Release,
                    Some(Payload::Promise(promise)),
                );
                Ok(())
            }
            Err(error) => {
                self.reject(&caller, Operation::Release, promise, &error);
                Err(error)
            }
        }
    }

    /// Deliver a completed outcome to one waiter.
    fn notify(&self, promise: PromiseId, waiter: Waiter, outcome: Outcome) {
        self.emit(
            EventCategory::WaiterNotified,
            Participant::Coordinator,
            waiter.caller.clone(),
            Operation::Await,
            Some(outcome_payload(&outcome)),
        );

        let result =
            outcome.map_err(|reason| CoordinatorError::ComputationFailure { promise, reason });
        if waiter.reply.send(result).is_err() {
            tracing::debug!(
                "{} stopped waiting before promise {} was delivered",
                waiter.caller,
                promise
            );
        }
    }

    fn reject(
        &self,
        caller: &Participant,
        operation: Operation,
        promise: PromiseId,
        error: &CoordinatorError,
    ) {
        tracing::warn!("Rejected {:?} from {}: {}", operation, caller, error);
        self.emit(
            EventCategory::Rejected,
            Participant::Coordinator,
            caller.clone(),
            operation,
            Some(Payload::Promise(promise)),
        );
    }

    fn emit(
        &self,
        category: EventCategory,
        from: Participant,
        to: Participant,
        operation: Operation,
        payload: Option<Payload>,
    ) {
        self.sink
            .record(Event::new(category, from, to, operation, payload));
    }
}

fn outcome_payload(outcome: &Outcome) -> Payload {
    match outcome {
        Ok(value) => Payload::Value(value.clone()),
        Err(failure) => Payload::Failure(failure.clone()),
    }
}

/// Owner's handle on a running coordinator.
///
/// The coordinator keeps running while this handle, any [`AsyncContext`]
/// or any running worker is alive, or until [`shutdown`](Self::shutdown).
pub struct CoordinatorHandle {
    requests: mpsc::UnboundedSender<Request>,
    task: JoinHandle<TableStats>,
}

impl CoordinatorHandle {
    /// A façade speaking as the top-level caller `name`.
    pub fn context(&self, name: impl Into<CallerName>) -> AsyncContext {
        AsyncContext::new(Participant::Caller(name.into()), self.requests.clone())
    }

    pub async fn stats(&self) -> CoordinatorResult<TableStats> {
        let (reply, rx) = oneshot::channel();
        self.requests.send(Request::Stats { reply })?;
        Ok(rx.await?)
    }

    /// Ask the coordinator to stop after the requests already queued.
    ///
    /// Callers still parked on pending promises observe
    /// [`CoordinatorError::CoordinatorClosed`].
    pub fn shutdown(&self) -> CoordinatorResult<()> {
        self.requests.send(Request::Shutdown)?;
        Ok(())
    }

    /// Wait for the coordinator task to finish and return its final stats.
    pub async fn join(self) -> CoordinatorResult<TableStats> {
        let Self { requests, task } = self;
        drop(requests);
        task.await.map_err(|e| {
            tracing::error!("Coordinator task failed: {}", e);
            CoordinatorError::CoordinatorClosed
        })
    }
}
