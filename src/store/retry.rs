//! Bounded retry for database operations.
//!
//! Two kinds of failure are retried, each with its own budget:
//!
//! - unique-constraint violations on `(event_id, version_number)`, which
//!   mean another writer allocated the same version first;
//! - transient connectivity failures, retried with exponential backoff.
//!
//! Everything else surfaces immediately.

use std::future::Future;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::domain::EventId;
use crate::error::GatewayError;

/// How a database error should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Lost a version-allocation race; retry the allocation.
    VersionConflict,
    /// Connection hiccup; retry after a backoff.
    Transient,
    /// Not retryable.
    Fatal,
}

/// Classifies a `sqlx` error for retry purposes.
#[must_use]
pub fn classify(err: &sqlx::Error) -> FailureClass {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => FailureClass::VersionConflict,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // serialization_failure, deadlock_detected, connection exceptions
            Some("40001" | "40P01") => FailureClass::Transient,
            Some(code) if code.starts_with("08") => FailureClass::Transient,
            _ => FailureClass::Fatal,
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => FailureClass::Transient,
        _ => FailureClass::Fatal,
    }
}

/// Outcome of one version-allocation attempt that produced no snapshot.
#[derive(Debug)]
pub enum AllocationError {
    /// Rejected by a precondition; never retried.
    Rejected(GatewayError),
    /// Database failure; retried according to its [`FailureClass`].
    Db(sqlx::Error),
}

impl From<sqlx::Error> for AllocationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

/// Retry budgets for database access.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum extra attempts after a version-allocation conflict.
    pub version_retry_limit: u32,
    /// Maximum extra attempts after a transient failure.
    pub transient_retry_limit: u32,
    /// Backoff before the first transient retry; doubles each time.
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            version_retry_limit: 5,
            transient_retry_limit: 3,
            transient_backoff: Duration::from_millis(50),
        }
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            version_retry_limit: config.version_retry_limit,
            transient_retry_limit: config.transient_retry_limit,
            transient_backoff: Duration::from_millis(config.transient_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Backoff before transient retry number `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.transient_backoff
            .saturating_mul(2_u32.saturating_pow(attempt.min(16)))
    }

    /// Runs `op`, retrying transient failures within budget.
    ///
    /// # Errors
    ///
    /// Returns the last error once it is not transient or the budget is
    /// spent.
    pub async fn run_transient<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, sqlx::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err)
                    if classify(&err) == FailureClass::Transient
                        && attempt < self.transient_retry_limit =>
                {
                    let delay = self.backoff(attempt);
                    tracing::warn!(error = %err, attempt, ?delay, what, "transient database error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Runs one version allocation `op` until it succeeds or runs out of
    /// budget.
    ///
    /// Unique violations consume the version budget and fail with
    /// [`GatewayError::ConcurrencyConflict`] once it is spent. Transient
    /// failures consume the transient budget with backoff. `op` must only
    /// report a transient failure when its write is known not to have been
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns rejections unchanged, `ConcurrencyConflict` on exhausted
    /// version retries, and [`GatewayError::PersistenceError`] otherwise.
    pub async fn run_allocation<T, F, Fut>(
        &self,
        event_id: EventId,
        mut op: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AllocationError>>,
    {
        let mut conflicts = 0;
        let mut transient = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(AllocationError::Rejected(err)) => return Err(err),
                Err(AllocationError::Db(err)) => err,
            };
            match classify(&err) {
                FailureClass::VersionConflict if conflicts < self.version_retry_limit => {
                    conflicts += 1;
                    tracing::warn!(%event_id, conflicts, "version allocation race, retrying");
                }
                FailureClass::VersionConflict => {
                    tracing::warn!(%event_id, conflicts, "version allocation retries exhausted");
                    return Err(GatewayError::ConcurrencyConflict(*event_id.as_uuid()));
                }
                FailureClass::Transient if transient < self.transient_retry_limit => {
                    let delay = self.backoff(transient);
                    tracing::warn!(%event_id, error = %err, ?delay, "transient database error, retrying");
                    tokio::time::sleep(delay).await;
                    transient += 1;
                }
                _ => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};

    use sqlx::error::{DatabaseError, ErrorKind};

    /// Unique-constraint violation as the Postgres driver would report it.
    #[derive(Debug)]
    struct DuplicateVersion;

    impl fmt::Display for DuplicateVersion {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for DuplicateVersion {}

    impl DatabaseError for DuplicateVersion {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn unique_violation() -> sqlx::Error {
        sqlx::Error::Database(Box::new(DuplicateVersion))
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            version_retry_limit: 3,
            transient_retry_limit: 2,
            transient_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn unique_violation_is_a_version_conflict() {
        assert_eq!(classify(&unique_violation()), FailureClass::VersionConflict);
    }

    #[tokio::test]
    async fn allocation_conflicts_exhaust_into_concurrency_conflict() {
        let policy = fast_policy();
        let event_id = EventId::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), GatewayError> = policy
            .run_allocation(event_id, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AllocationError::Db(unique_violation())) }
            })
            .await;
        let Err(GatewayError::ConcurrencyConflict(id)) = result else {
            panic!("expected ConcurrencyConflict, got {result:?}");
        };
        assert_eq!(id, *event_id.as_uuid());
        assert_eq!(calls.load(Ordering::SeqCst), policy.version_retry_limit + 1);
    }

    #[tokio::test]
    async fn allocation_recovers_after_lost_races() {
        let policy = fast_policy();
        let calls = AtomicU32::new(0);
        let result = policy
            .run_allocation(EventId::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 | 1 => Err(AllocationError::Db(unique_violation())),
                        2 => Err(AllocationError::Db(sqlx::Error::PoolTimedOut)),
                        _ => Ok(n),
                    }
                }
            })
            .await;
        assert!(matches!(result, Ok(3)));
    }

    #[tokio::test]
    async fn allocation_rejections_and_fatal_errors_are_not_retried() {
        let policy = fast_policy();
        let calls = AtomicU32::new(0);
        let rejected: Result<(), GatewayError> = policy
            .run_allocation(EventId::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AllocationError::Rejected(GatewayError::InvalidVersion(0))) }
            })
            .await;
        assert!(matches!(rejected, Err(GatewayError::InvalidVersion(0))));

        let fatal: Result<(), GatewayError> = policy
            .run_allocation(EventId::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AllocationError::Db(sqlx::Error::PoolClosed)) }
            })
            .await;
        assert!(matches!(fatal, Err(GatewayError::PersistenceError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn io_and_pool_timeout_are_transient() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert_eq!(classify(&io), FailureClass::Transient);
        assert_eq!(classify(&sqlx::Error::PoolTimedOut), FailureClass::Transient);
    }

    #[test]
    fn row_not_found_is_fatal() {
        assert_eq!(classify(&sqlx::Error::RowNotFound), FailureClass::Fatal);
        assert_eq!(classify(&sqlx::Error::PoolClosed), FailureClass::Fatal);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            transient_backoff: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(10));
        assert_eq!(policy.backoff(1), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(80));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_within_budget() {
        let policy = RetryPolicy {
            transient_retry_limit: 2,
            transient_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run_transient("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(sqlx::Error::PoolTimedOut)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert!(matches!(result, Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let policy = RetryPolicy {
            transient_retry_limit: 1,
            transient_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), sqlx::Error> = policy
            .run_transient("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(sqlx::Error::PoolTimedOut) }
            })
            .await;
        assert!(matches!(result, Err(sqlx::Error::PoolTimedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), sqlx::Error> = policy
            .run_transient("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(sqlx::Error::RowNotFound) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
