//! Closing a unit of work on every exit path.

use std::time::Instant;

use datastore::UnitOfWork;

use crate::error::{CafeError, Result};

/// Commits `unit` if `outcome` is `Ok`, otherwise rolls it back and returns
/// the original error.
///
/// Records `unit_of_work_duration_seconds{operation}` either way.
pub(crate) async fn settle<U, T>(
    unit: U,
    operation: &'static str,
    started: Instant,
    outcome: Result<T>,
) -> Result<T>
where
    U: UnitOfWork,
{
    let result = match outcome {
        Ok(value) => match unit.commit().await {
            Ok(()) => Ok(value),
            Err(err) => {
                tracing::error!(operation, error = %err, "commit failed");
                Err(CafeError::from(err))
            }
        },
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                tracing::warn!(operation, error = %rollback_err, "rollback failed");
            }
            tracing::debug!(operation, error = %err, "unit of work rolled back");
            Err(err)
        }
    };

    metrics::histogram!("unit_of_work_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
    result
}
