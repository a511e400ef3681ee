//! Bounded retry loop
//!
//! The loop itself does no logging. Callers inspect the returned report, or
//! watch failures as they happen through `retry_with`.

/// One failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord<E> {
    /// Zero-based attempt index
    pub index: u32,
    pub error: E,
}

/// Result of running an operation under `retry`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport<E> {
    /// Number of times the operation was invoked
    pub attempts: u32,
    /// Whether the last invocation succeeded
    pub succeeded: bool,
    /// Every failed attempt, in order
    pub failures: Vec<AttemptRecord<E>>,
}

impl<E> RetryReport<E> {
    pub fn last_error(&self) -> Option<&E> {
        self.failures.last().map(|record| &record.error)
    }
}

/// Invokes `op` until it succeeds or `max_retries` attempts have been made
///
/// `max_retries` is the total attempt budget: 0 never invokes `op`, 1 invokes
/// it exactly once. The closure receives the zero-based attempt index.
pub fn retry<E, F>(max_retries: u32, op: F) -> RetryReport<E>
where
    F: FnMut(u32) -> Result<(), E>,
{
    retry_with(max_retries, op, |_| {})
}

/// Like `retry`, calling `on_failure` right after each failed attempt
pub fn retry_with<E, F, N>(max_retries: u32, mut op: F, mut on_failure: N) -> RetryReport<E>
where
    F: FnMut(u32) -> Result<(), E>,
    N: FnMut(&AttemptRecord<E>),
{
    let mut attempts = 0;
    let mut failures = Vec::new();

    while attempts < max_retries {
        match op(attempts) {
            Ok(()) => {
                return RetryReport {
                    attempts: attempts + 1,
                    succeeded: true,
                    failures,
                };
            }
            Err(error) => {
                let record = AttemptRecord {
                    index: attempts,
                    error,
                };
                on_failure(&record);
                failures.push(record);
                attempts += 1;
            }
        }
    }

    RetryReport {
        attempts,
        succeeded: false,
        failures,
    }
}
