//! Metrics recording shared by the storage backends.

use crate::Result;
use std::time::Instant;

/// Records operation metrics for storage operations.
///
/// This function records two metrics for each operation:
/// 1. `storage_operations_total` - Counter for operation count by status
/// 2. `storage_operation_duration_ms` - Histogram for operation latency
///
/// # Arguments
///
/// * `backend` - Backend name ("relational" or "document")
/// * `operation` - Operation name (e.g., "upsert", "query", "flush")
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - Operation status ("success" or "error")
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Records metrics for a finished operation and passes its result through.
pub fn observe<T>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: Result<T>,
) -> Result<T> {
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}

/// Recorder that captures which backend operations reported a status.
#[cfg(test)]
pub mod testing {
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct OperationLog {
        entries: Mutex<Vec<(String, String, String)>>,
    }

    impl OperationLog {
        /// `(operation, status)` pairs recorded for `backend`, in order.
        pub fn operations(&self, backend: &str) -> Vec<(String, String)> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(b, _, _)| b == backend)
                .map(|(_, operation, status)| (operation.clone(), status.clone()))
                .collect()
        }
    }

    impl Recorder for OperationLog {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == "storage_operations_total" {
                let label = |name: &str| {
                    key.labels()
                        .find(|l| l.key() == name)
                        .map(|l| l.value().to_string())
                        .unwrap_or_default()
                };
                self.entries.lock().unwrap().push((
                    label("backend"),
                    label("operation"),
                    label("status"),
                ));
            }
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    /// Runs `f` with a thread-local recorder and returns what it captured.
    pub fn capture(f: impl FnOnce()) -> OperationLog {
        let log = OperationLog::default();
        metrics::with_local_recorder(&log, f);
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_operation_metrics_timing() {
        let start = Instant::now();
        thread::sleep(Duration::from_millis(10));

        record_operation_metrics("relational", "timed_operation", start, "success");

        assert!(start.elapsed().as_millis() >= 10);
    }

    #[test]
    fn test_record_operation_metrics_concurrent() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let status = if i % 2 == 0 { "success" } else { "error" };
                thread::spawn(move || {
                    let start = Instant::now();
                    thread::sleep(Duration::from_millis(i * 2));
                    record_operation_metrics("document", "concurrent_operation", start, status);
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }
    }

    #[test]
    fn test_observe_passes_result_through() {
        let start = Instant::now();
        assert_eq!(observe("document", "get", start, Ok(3)).unwrap(), 3);

        let failed: Result<()> = Err(Error::InvalidInput("bad".to_string()));
        assert!(observe("document", "get", start, failed).is_err());
    }

    #[test]
    fn test_observe_records_status_label() {
        let log = testing::capture(|| {
            let start = Instant::now();
            let _ = observe("document", "get", start, Ok(()));
            let _ = observe::<()>("document", "get", start, Err(Error::InvalidInput("x".into())));
        });
        assert_eq!(
            log.operations("document"),
            vec![
                ("get".to_string(), "success".to_string()),
                ("get".to_string(), "error".to_string()),
            ]
        );
    }
}
