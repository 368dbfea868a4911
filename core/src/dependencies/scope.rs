use crate::dependencies::cleanup;
use crate::dependencies::context::Context;
use crate::dependencies::provider::{Finalizer, ProviderKey};
use crate::errors::ChainedFinalizationError;
use crate::types::{BoxError, DynValue};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub(crate) struct CleanupEntry {
    pub(crate) provider: String,
    pub(crate) finalizer: Finalizer,
}

/// A finalizer whose teardown has started but not finished.
pub(crate) struct RunningFinalizer {
    pub(crate) provider: String,
    pub(crate) future: BoxFuture<'static, Result<(), BoxError>>,
}

/// Finalization state of a scope: the finalizers not yet started, the one in
/// flight, and the failures chained so far. Everything still in here when the
/// scope is dropped is handed to the runtime.
#[derive(Default)]
pub(crate) struct CleanupStack {
    pub(crate) entries: Vec<CleanupEntry>,
    pub(crate) running: Option<RunningFinalizer>,
    pub(crate) failure: Option<ChainedFinalizationError>,
}

impl CleanupStack {
    pub(crate) fn push(&mut self, provider: String, finalizer: Finalizer) {
        self.entries.push(CleanupEntry {
            provider,
            finalizer,
        });
    }

    /// Finalizers that have not completed, the in-flight one included.
    pub(crate) fn pending(&self) -> usize {
        self.entries.len() + usize::from(self.running.is_some())
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.pending() == 0 && self.failure.is_none()
    }
}

/// Mutable state of one root call: memoized values, the providers currently
/// being resolved, and the finalizers of acquired resources.
///
/// Owned by a single root call and never shared.
pub(crate) struct ResolutionScope {
    cache: HashMap<ProviderKey, DynValue>,
    in_progress: HashSet<ProviderKey>,
    cleanup: CleanupStack,
}

impl ResolutionScope {
    /// The cache starts with `context` itself under the `Context` type so a
    /// parameter declared as `Context` with an inferred marker receives it.
    pub(crate) fn new(context: &Context) -> Self {
        let mut cache: HashMap<ProviderKey, DynValue> = HashMap::new();
        cache.insert(ProviderKey::of_type::<Context>(), Arc::new(context.clone()));
        Self {
            cache,
            in_progress: HashSet::new(),
            cleanup: CleanupStack::default(),
        }
    }

    pub(crate) fn cached(&self, key: &ProviderKey) -> Option<DynValue> {
        self.cache.get(key).cloned()
    }

    pub(crate) fn store(&mut self, key: ProviderKey, value: DynValue) {
        self.cache.insert(key, value);
    }

    /// Marks `key` as in progress. `false` means it already was: a cycle.
    pub(crate) fn enter(&mut self, key: ProviderKey) -> bool {
        self.in_progress.insert(key)
    }

    pub(crate) fn leave(&mut self, key: &ProviderKey) {
        self.in_progress.remove(key);
    }

    pub(crate) fn register_cleanup(&mut self, provider: impl Into<String>, finalizer: Finalizer) {
        self.cleanup.push(provider.into(), finalizer);
    }

    /// Finalization state, drained in place so an interrupted drain leaves
    /// the remainder here.
    pub(crate) fn cleanup_mut(&mut self) -> &mut CleanupStack {
        &mut self.cleanup
    }

    #[cfg(test)]
    pub(crate) fn pending_cleanup(&self) -> usize {
        self.cleanup.pending()
    }
}

impl Drop for ResolutionScope {
    // Reached with unfinished cleanup only when the root call's future was
    // dropped, either mid-resolution or mid-finalization.
    fn drop(&mut self) {
        if self.cleanup.is_settled() {
            return;
        }
        let mut remaining = std::mem::take(&mut self.cleanup);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                log::warn!(
                    "root call dropped with {} unreleased resources, finalizing in background",
                    remaining.pending()
                );
                handle.spawn(async move {
                    if let Err(err) = cleanup::drain(&mut remaining).await {
                        log::warn!("background finalization failed: {err}");
                    }
                });
            }
            Err(_) => {
                log::warn!(
                    "root call dropped outside a runtime, {} finalizers were not run",
                    remaining.pending()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_enter_detects_reentry() {
        let mut scope = ResolutionScope::new(&Context::empty());
        let key = ProviderKey::Instance(7);

        assert!(scope.enter(key));
        assert!(!scope.enter(key));
        scope.leave(&key);
        assert!(scope.enter(key));
    }

    #[test]
    fn test_context_is_preseeded() {
        let scope = ResolutionScope::new(&Context::empty());
        let seeded = scope.cached(&ProviderKey::of_type::<Context>()).unwrap();
        assert!(seeded.is::<Context>());
    }

    #[tokio::test]
    async fn test_dropped_scope_finalizes_in_background() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();

        let mut scope = ResolutionScope::new(&Context::empty());
        scope.register_cleanup(
            "conn",
            Box::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                })
            }),
        );
        assert_eq!(scope.pending_cleanup(), 1);
        drop(scope);

        for _ in 0..50 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(released.load(Ordering::SeqCst));
    }
}
