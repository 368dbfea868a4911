use crate::dependencies::scope::{CleanupEntry, CleanupStack, ResolutionScope, RunningFinalizer};
use crate::errors::{panic_message, ChainedFinalizationError};
use crate::types::BoxError;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Drains every finalizer registered in `scope`, last acquired first.
pub(crate) async fn finalize(scope: &mut ResolutionScope) -> Result<(), ChainedFinalizationError> {
    drain(scope.cleanup_mut()).await
}

/// Runs the finalizers left in `stack` in reverse registration order. A
/// failing finalizer never stops the ones after it; each failure is chained
/// onto the previous one and the last failure is returned.
///
/// Works on `stack` in place: if this future is dropped, the in-flight
/// finalizer, the ones not yet started and the failures so far all stay in
/// `stack`, and a later `drain` picks up where this one stopped.
pub(crate) async fn drain(stack: &mut CleanupStack) -> Result<(), ChainedFinalizationError> {
    if stack.pending() > 0 {
        log::debug!("finalizing {} resources", stack.pending());
    }

    loop {
        if stack.running.is_none() {
            let Some(CleanupEntry {
                provider,
                finalizer,
            }) = stack.entries.pop()
            else {
                break;
            };
            match std::panic::catch_unwind(AssertUnwindSafe(finalizer)) {
                Ok(future) => stack.running = Some(RunningFinalizer { provider, future }),
                Err(payload) => {
                    fail(stack, provider, panic_message(payload).into());
                    continue;
                }
            }
        }

        let Some(running) = stack.running.as_mut() else {
            break;
        };
        let outcome = AssertUnwindSafe(&mut running.future)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_message(payload).into()));

        let Some(RunningFinalizer { provider, .. }) = stack.running.take() else {
            break;
        };
        match outcome {
            Ok(()) => log::trace!("released `{provider}`"),
            Err(reason) => fail(stack, provider, reason),
        }
    }

    match stack.failure.take() {
        Some(chain) => Err(chain),
        None => Ok(()),
    }
}

fn fail(stack: &mut CleanupStack, provider: String, reason: BoxError) {
    log::warn!("finalizer of `{provider}` failed: {reason}");
    stack.failure = Some(ChainedFinalizationError::new(
        provider,
        reason,
        stack.failure.take(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::context::Context;
    use crate::dependencies::provider::Finalizer;
    use futures::future::BoxFuture;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn finalizer(log: &Log, name: &'static str, fail: bool) -> Finalizer {
        let log = log.clone();
        Box::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
            Box::pin(async move {
                log.lock().unwrap().push(name.to_string());
                if fail {
                    Err(format!("{name} failed").into())
                } else {
                    Ok(())
                }
            })
        })
    }

    fn stack_of(log: &Log, entries: &[(&'static str, bool)]) -> CleanupStack {
        let mut stack = CleanupStack::default();
        for &(name, fail) in entries {
            stack.push(name.to_string(), finalizer(log, name, fail));
        }
        stack
    }

    #[tokio::test]
    async fn test_drain_runs_in_reverse() {
        let log = Log::default();
        let mut stack = stack_of(&log, &[("r1", false), ("r2", false)]);

        assert!(drain(&mut stack).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["r2", "r1"]);
        assert!(stack.is_settled());
    }

    #[tokio::test]
    async fn test_failures_are_chained_and_do_not_stop_drain() {
        let log = Log::default();
        let mut stack = stack_of(&log, &[("a", true), ("ok", false), ("b", true)]);

        let chain = drain(&mut stack).await.unwrap_err();
        assert_eq!(*log.lock().unwrap(), vec!["b", "ok", "a"]);
        assert_eq!(chain.provider(), "a");
        assert_eq!(chain.reason().to_string(), "a failed");
        let providers: Vec<&str> = chain.chain().map(|link| link.provider()).collect();
        assert_eq!(providers, vec!["a", "b"]);
    }

    fn explode() -> Result<(), BoxError> {
        panic!("finalizer exploded")
    }

    #[tokio::test]
    async fn test_panicking_finalizer_is_reported() {
        let log = Log::default();
        let mut stack = stack_of(&log, &[("first", false)]);
        stack.push(
            "boom".to_string(),
            Box::new(|| -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(async { explode() })
            }),
        );

        let chain = drain(&mut stack).await.unwrap_err();
        assert_eq!(chain.provider(), "boom");
        assert!(chain.reason().to_string().contains("finalizer exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_interrupted_drain_leaves_remainder_in_scope() {
        let log = Log::default();
        let mut scope = ResolutionScope::new(&Context::empty());
        scope.register_cleanup("outer", finalizer(&log, "outer", false));
        let slow_log = log.clone();
        scope.register_cleanup(
            "slow",
            Box::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    slow_log.lock().unwrap().push("slow".to_string());
                    Ok(())
                })
            }),
        );

        let interrupted = tokio::time::timeout(Duration::from_millis(5), finalize(&mut scope)).await;
        assert!(interrupted.is_err());
        assert_eq!(scope.pending_cleanup(), 2);
        assert!(log.lock().unwrap().is_empty());

        // The in-flight finalizer is resumed, not restarted.
        assert!(finalize(&mut scope).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["slow", "outer"]);
        assert_eq!(scope.pending_cleanup(), 0);
    }

    #[tokio::test]
    async fn test_failures_survive_interruption() {
        let log = Log::default();
        let mut stack = CleanupStack::default();
        let slow_log = log.clone();
        stack.push(
            "slow".to_string(),
            Box::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    slow_log.lock().unwrap().push("slow".to_string());
                    Ok(())
                })
            }),
        );
        stack.push("broken".to_string(), finalizer(&log, "broken", true));

        assert!(tokio::time::timeout(Duration::from_millis(5), drain(&mut stack))
            .await
            .is_err());
        assert!(stack.failure.is_some());

        let chain = drain(&mut stack).await.unwrap_err();
        assert_eq!(chain.provider(), "broken");
        assert_eq!(*log.lock().unwrap(), vec!["broken", "slow"]);
    }
}
