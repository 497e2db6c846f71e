use std::sync::{Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::warn;

use super::session::CredentialPair;
use crate::api::ApiError;

type SharedRefresh = Shared<BoxFuture<'static, Result<CredentialPair, ApiError>>>;

/// Single-flight guard around token refresh.
///
/// The refresh runs on its own task, so it completes and stores its result
/// even when every caller waiting on it is cancelled. Callers arriving while
/// it runs await a shared handle to that task. A handle whose task has already
/// settled is never joined; the next expiry starts a fresh refresh.
#[derive(Default)]
pub(crate) struct RefreshGate {
    slot: Mutex<Option<SharedRefresh>>,
}

impl RefreshGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight refresh, or start one with `start`.
    pub(crate) async fn run<F>(&self, start: F) -> Result<CredentialPair, ApiError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<CredentialPair, ApiError>>,
    {
        let refresh = {
            let mut slot = self.slot();
            let pending = slot
                .as_ref()
                .filter(|pending| pending.peek().is_none())
                .cloned();
            match pending {
                Some(pending) => pending,
                None => {
                    let task = tokio::spawn(start());
                    let pending = async move {
                        task.await.unwrap_or_else(|e| {
                            warn!(error = %e, "Token refresh task failed");
                            Err(ApiError::RefreshInterrupted)
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = refresh.clone().await;

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&refresh)) {
            *slot = None;
        }

        result
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> bool {
        self.slot().as_ref().is_some_and(|pending| pending.peek().is_none())
    }

    fn slot(&self) -> MutexGuard<'_, Option<SharedRefresh>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn counting_refresh(
        calls: Arc<AtomicUsize>,
        outcome: Result<CredentialPair, ApiError>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<CredentialPair, ApiError>> {
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                outcome
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let gate = RefreshGate::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let pair = CredentialPair::new("a2", "r2");

        let (first, second, third) = tokio::join!(
            gate.run(counting_refresh(calls.clone(), Ok(pair.clone()))),
            gate.run(counting_refresh(calls.clone(), Ok(CredentialPair::new("x", "y")))),
            gate.run(counting_refresh(calls.clone(), Ok(CredentialPair::new("x", "y")))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap(), pair);
        assert_eq!(second.unwrap(), pair);
        assert_eq!(third.unwrap(), pair);
        assert!(!gate.in_flight());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_slot_is_released() {
        let gate = RefreshGate::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, second) = tokio::join!(
            gate.run(counting_refresh(calls.clone(), Err(ApiError::MissingCredential))),
            gate.run(counting_refresh(calls.clone(), Err(ApiError::Timeout))),
        );
        assert!(matches!(first, Err(ApiError::MissingCredential)));
        assert!(matches!(second, Err(ApiError::MissingCredential)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A later expiry starts a new refresh
        let again = gate
            .run(counting_refresh(calls.clone(), Ok(CredentialPair::new("a3", "r3"))))
            .await;
        assert_eq!(again.unwrap(), CredentialPair::new("a3", "r3"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_leave_stale_refresh() {
        let gate = RefreshGate::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            gate.run(counting_refresh(calls.clone(), Err(ApiError::Timeout))),
        )
        .await;
        assert!(cancelled.is_err());

        // The refresh keeps running without anyone waiting on it
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!gate.in_flight());

        // Its settled failure is not handed to the next caller
        let next = gate
            .run(counting_refresh(calls.clone(), Ok(CredentialPair::new("a2", "r2"))))
            .await;
        assert_eq!(next.unwrap(), CredentialPair::new("a2", "r2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_refresh_is_reported() {
        let gate = RefreshGate::new();
        let result = gate
            .run(|| {
                async {
                    if true {
                        panic!("refresh exploded");
                    }
                    Ok(CredentialPair::new("a", "r"))
                }
                .boxed()
            })
            .await;
        assert!(matches!(result, Err(ApiError::RefreshInterrupted)));
        assert!(!gate.in_flight());
    }
}
