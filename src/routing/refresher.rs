//! Background refresh of the routing table.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::table::RoutingTable;

/// Default cadence of the background refresh.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

struct Shutdown {
    requested: Mutex<bool>,
    signal: Condvar,
}

/// Owns the background thread that periodically rewrites the routing table
/// from observed execution times. Dropping the refresher stops the thread
/// and joins it.
pub struct TableRefresher {
    shutdown: Arc<Shutdown>,
    handle: Option<JoinHandle<()>>,
}

impl TableRefresher {
    /// Start refreshing the given table on a fixed cadence.
    pub fn start(table: Arc<RoutingTable>, interval: Duration) -> Self {
        let shutdown = Arc::new(Shutdown {
            requested: Mutex::new(false),
            signal: Condvar::new(),
        });
        let thread_shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("routing-table-refresh".to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "refresher started");
                loop {
                    {
                        let mut requested = thread_shutdown.requested.lock();
                        if !*requested {
                            thread_shutdown.signal.wait_for(&mut requested, interval);
                        }
                        if *requested {
                            break;
                        }
                    }
                    table.refresh();
                }
                debug!("refresher stopped");
            })
            .expect("failed to spawn routing-table-refresh thread");
        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for TableRefresher {
    fn drop(&mut self) {
        *self.shutdown.requested.lock() = true;
        self.shutdown.signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::QueryClass;
    use crate::config::RouterConfig;
    use crate::monitoring::{ExecutionTimeObserver, InMemoryMonitor, RoutingRef};
    use crate::routing::{PlacementSet, Weight};

    #[test]
    fn test_refresher_applies_samples() {
        let config = Arc::new(RouterConfig::default());
        let monitor = Arc::new(InMemoryMonitor::new(config.clone()));
        let table = Arc::new(RoutingTable::new(monitor, config));

        let class = QueryClass::new("c");
        let placement = PlacementSet::singleton(1);
        table.register_placement(&placement, "pg0".to_string(), None);
        table.initialize_row(&class, std::slice::from_ref(&placement));
        table.execution_time(&RoutingRef::new(placement.clone(), class.clone()), 5_000_000);

        let refresher = TableRefresher::start(table.clone(), Duration::from_millis(10));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let row = table.row(&class).unwrap();
            if row.get(&placement) == Some(Weight::Share(100)) {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "refresher never rewrote the row"
            );
            std::thread::sleep(Duration::from_millis(5));
        }
        drop(refresher);
    }

    #[test]
    fn test_drop_joins_promptly() {
        let config = Arc::new(RouterConfig::default());
        let monitor = Arc::new(InMemoryMonitor::new(config.clone()));
        let table = Arc::new(RoutingTable::new(monitor, config));

        let refresher = TableRefresher::start(table, Duration::from_secs(3600));
        let started = std::time::Instant::now();
        drop(refresher);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
