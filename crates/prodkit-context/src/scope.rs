//! The generic scoped-context contract.

use std::future::Future;

use tokio::task::LocalKey;
use tokio::task::futures::TaskLocalFuture;

/// A value that can be made ambient for the dynamic extent of a block.
///
/// Implementors are plain data; the storage lives in a `task_local!` slot
/// returned by [`ScopedContext::local_key`]. Scopes nest: an inner scope
/// shadows the outer value and the outer value is visible again as soon as
/// the inner block completes.
pub trait ScopedContext: Clone + Default + Send + Sync + 'static {
    /// The task-local slot backing this context type.
    fn local_key() -> &'static LocalKey<Self>;

    /// Value returned by [`ScopedContext::current`] when no scope is active.
    fn fallback() -> Self {
        Self::default()
    }

    /// The innermost scoped value, or [`ScopedContext::fallback`].
    fn current() -> Self {
        Self::local_key()
            .try_with(Clone::clone)
            .unwrap_or_else(|_| Self::fallback())
    }

    /// The innermost scoped value, if any scope is active.
    fn try_current() -> Option<Self> {
        Self::local_key().try_with(Clone::clone).ok()
    }

    /// Whether a scope for this context type is active on the current task.
    fn is_active() -> bool {
        Self::local_key().try_with(|_| ()).is_ok()
    }

    /// Run `future` with `self` as the ambient value.
    fn scope<F>(self, future: F) -> TaskLocalFuture<Self, F>
    where
        F: Future,
    {
        Self::local_key().scope(self, future)
    }

    /// Run `f` synchronously with `self` as the ambient value.
    fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        Self::local_key().sync_scope(self, f)
    }
}

/// Declare the task-local slot for a context type and wire it to
/// [`ScopedContext`] with the default fallback.
macro_rules! scoped_context {
    ($(#[$meta:meta])* static $key:ident: $ty:ty;) => {
        ::tokio::task_local! {
            $(#[$meta])*
            static $key: $ty;
        }

        impl $crate::scope::ScopedContext for $ty {
            fn local_key() -> &'static ::tokio::task::LocalKey<Self> {
                &$key
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct Probe(u32);

    scoped_context! {
        static PROBE: Probe;
    }

    #[test]
    fn test_current_without_scope_is_fallback() {
        assert_eq!(Probe::current(), Probe(0));
        assert!(Probe::try_current().is_none());
        assert!(!Probe::is_active());
    }

    #[test]
    fn test_sync_scope_nests_and_restores() {
        Probe(1).sync_scope(|| {
            assert_eq!(Probe::current(), Probe(1));
            Probe(2).sync_scope(|| {
                assert_eq!(Probe::current(), Probe(2));
                Probe(3).sync_scope(|| assert_eq!(Probe::current(), Probe(3)));
                assert_eq!(Probe::current(), Probe(2));
            });
            assert_eq!(Probe::current(), Probe(1));
        });
        assert!(Probe::try_current().is_none());
    }

    #[tokio::test]
    async fn test_scope_restores_after_error() {
        let result: Result<(), &str> = Probe(7)
            .scope(async {
                Probe(8)
                    .scope(async {
                        assert_eq!(Probe::current(), Probe(8));
                        Err::<(), _>("boom")
                    })
                    .await?;
                Ok(())
            })
            .await;

        assert_eq!(result, Err("boom"));
        assert!(!Probe::is_active());
    }

    #[test]
    fn test_scope_restores_after_panic() {
        Probe(1).sync_scope(|| {
            let outcome = std::panic::catch_unwind(|| {
                Probe(2).sync_scope(|| panic!("scoped block panicked"));
            });
            assert!(outcome.is_err());
            assert_eq!(Probe::current(), Probe(1));
        });
    }

    #[tokio::test]
    async fn test_value_survives_suspension() {
        Probe(5)
            .scope(async {
                tokio::task::yield_now().await;
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                assert_eq!(Probe::current(), Probe(5));
            })
            .await;
    }

    #[tokio::test]
    async fn test_concurrent_tasks_are_isolated() {
        let mut handles = Vec::new();
        for n in 0..16u32 {
            handles.push(tokio::spawn(Probe(n).scope(async move {
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                    assert_eq!(Probe::current(), Probe(n));
                }
                Probe::current()
            })));
        }

        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Probe(n as u32));
        }
    }

    #[tokio::test]
    async fn test_interleaved_futures_on_one_task_are_isolated() {
        let left = Probe(1).scope(async {
            tokio::task::yield_now().await;
            Probe::current()
        });
        let right = Probe(2).scope(async {
            tokio::task::yield_now().await;
            Probe::current()
        });

        let (l, r) = tokio::join!(left, right);
        assert_eq!(l, Probe(1));
        assert_eq!(r, Probe(2));
        assert!(!Probe::is_active());
    }

    #[tokio::test]
    async fn test_dropped_scope_restores() {
        Probe(1)
            .scope(async {
                let pending = Probe(2).scope(std::future::pending::<()>());
                let timed_out =
                    tokio::time::timeout(std::time::Duration::from_millis(1), pending).await;
                assert!(timed_out.is_err());
                assert_eq!(Probe::current(), Probe(1));
            })
            .await;
    }
}
