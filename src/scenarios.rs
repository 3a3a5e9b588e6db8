//! Demonstration computations and the scenarios that drive them.
//!
//! These are the classic walkthroughs of the coordinator: a plain
//! invocation, a nested invocation, two callers sharing one promise, a
//! fan-out, and a failing computation.

use crate::actor::CoordinatorHandle;
use crate::facade::{AsyncContext, Computation};
use crate::types::PromiseId;
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::time::Duration;

/// `h() = 42`
pub fn answer() -> Computation {
    Computation::new("answer", |_ctx, _args| async { Ok(json!(42)) })
}

/// `g() = 2 * await(invoke(h))`
pub fn double_of_answer() -> Computation {
    Computation::new("double_of_answer", |ctx: AsyncContext, _args| async move {
        let inner = ctx.invoke(answer(), vec![]).await?;
        let value = ctx.await_promise(inner).await?;
        let value = value.as_i64().context("answer did not produce an integer")?;
        Ok(json!(2 * value))
    })
}

/// Sleeps for `args[1]` milliseconds, then returns `args[0]`.
pub fn delayed() -> Computation {
    Computation::new("delayed", |_ctx, args: Vec<Value>| async move {
        let value = args.first().cloned().unwrap_or(Value::Null);
        let millis = args.get(1).and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(value)
    })
}

/// `square(n) = n * n`
pub fn square() -> Computation {
    Computation::new("square", |_ctx, args: Vec<Value>| async move {
        let n = int_arg(&args, 0)?;
        let squared = n
            .checked_mul(n)
            .ok_or_else(|| anyhow!("square of {} overflows i64", n))?;
        Ok(json!(squared))
    })
}

/// Invokes `square(1..=count)` in parallel and sums the results.
pub fn sum_of_squares() -> Computation {
    Computation::new("sum_of_squares", |ctx: AsyncContext, args: Vec<Value>| async move {
        let count = int_arg(&args, 0)?;
        let mut promises = Vec::new();
        for n in 1..=count {
            promises.push(ctx.invoke(square(), vec![json!(n)]).await?);
        }

        let mut total = 0i64;
        for promise in promises {
            let value = ctx.await_promise(promise).await?;
            let value = value.as_i64().context("square did not produce an integer")?;
            total = accumulate(total, value)?;
        }
        Ok(json!(total))
    })
}

pub fn failing() -> Computation {
    Computation::new("failing", |_ctx, _args| async {
        Err(anyhow!("this computation always fails"))
    })
}

fn accumulate(total: i64, value: i64) -> Result<i64> {
    total
        .checked_add(value)
        .ok_or_else(|| anyhow!("sum of squares overflows i64"))
}

fn int_arg(args: &[Value], index: usize) -> Result<i64> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("argument {} must be an integer", index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Simple,
    Nested,
    SharedAwait,
    Fanout { count: u32 },
    Failing,
}

/// Run `scenario` as `caller` and return what the caller ended up with.
///
/// With `release` set, every promise the scenario awaited is released
/// afterwards.
pub async fn run(
    handle: &CoordinatorHandle,
    caller: &str,
    scenario: Scenario,
    release: bool,
) -> Result<Value> {
    let ctx = handle.context(caller);

    let (value, promises) = match scenario {
        Scenario::Simple => {
            let p = ctx.invoke(answer(), vec![]).await?;
            (ctx.await_promise(p).await?, vec![p])
        }
        Scenario::Nested => {
            let p = ctx.invoke(double_of_answer(), vec![]).await?;
            (ctx.await_promise(p).await?, vec![p])
        }
        Scenario::SharedAwait => {
            let p = ctx.invoke(delayed(), vec![json!(7), json!(50)]).await?;
            let first = spawn_awaiter(handle.context(format!("{}-a", caller)), p);
            let second = spawn_awaiter(handle.context(format!("{}-b", caller)), p);
            let a = first.await.context("first awaiter panicked")??;
            let b = second.await.context("second awaiter panicked")??;
            (json!([a, b]), vec![p])
        }
        Scenario::Fanout { count } => {
            let p = ctx.invoke(sum_of_squares(), vec![json!(count)]).await?;
            (ctx.await_promise(p).await?, vec![p])
        }
        Scenario::Failing => {
            let p = ctx.invoke(failing(), vec![]).await?;
            match ctx.await_promise(p).await {
                Ok(value) => (value, vec![p]),
                Err(err) => (json!({ "error": err.to_string() }), vec![p]),
            }
        }
    };

    if release {
        for p in promises {
            ctx.release(p).await?;
        }
    }

    Ok(value)
}

fn spawn_awaiter(
    ctx: AsyncContext,
    promise: PromiseId,
) -> tokio::task::JoinHandle<Result<Value>> {
    tokio::spawn(async move { Ok(ctx.await_promise(promise).await?) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Coordinator;
    use crate::error::{ComputationFailure, CoordinatorError};
    use crate::events::NullSink;
    use std::sync::Arc;

    #[test]
    fn int_arg_validation() {
        assert_eq!(int_arg(&[json!(3)], 0).unwrap(), 3);
        assert!(int_arg(&[json!("3")], 0).is_err());
        assert!(int_arg(&[], 0).is_err());
    }

    #[tokio::test]
    async fn square_overflow_is_reported_as_failure() {
        let handle = Coordinator::start(Arc::new(NullSink));
        let ctx = handle.context("main");

        let p = ctx.invoke(square(), vec![json!(i64::MAX)]).await.unwrap();
        match ctx.await_promise(p).await.unwrap_err() {
            CoordinatorError::ComputationFailure {
                reason: ComputationFailure::Error(msg),
                ..
            } => assert!(msg.contains("overflows")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn accumulate_rejects_overflow() {
        assert_eq!(accumulate(1, 4).unwrap(), 5);
        let err = accumulate(i64::MAX, 1).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[tokio::test]
    async fn every_scenario_produces_its_value() {
        let handle = Coordinator::start(Arc::new(NullSink));

        assert_eq!(run(&handle, "main", Scenario::Simple, false).await.unwrap(), json!(42));
        assert_eq!(run(&handle, "main", Scenario::Nested, false).await.unwrap(), json!(84));
        assert_eq!(
            run(&handle, "main", Scenario::SharedAwait, false).await.unwrap(),
            json!([7, 7])
        );
        assert_eq!(
            run(&handle, "main", Scenario::Fanout { count: 4 }, false).await.unwrap(),
            json!(1 + 4 + 9 + 16)
        );

        let failed = run(&handle, "main", Scenario::Failing, false).await.unwrap();
        assert!(failed["error"].as_str().unwrap().contains("always fails"));
    }

    #[tokio::test]
    async fn release_leaves_no_completed_promises_behind() {
        let handle = Coordinator::start(Arc::new(NullSink));
        run(&handle, "main", Scenario::Simple, true).await.unwrap();

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.pending, 0);
    }
}
