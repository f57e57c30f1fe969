//! Bootstrap - store connection, trust-list seeding and listener setup
//!
//! Startup order:
//! 1. Connect the store (a failure is logged; the loop keeps retrying)
//! 2. Seed configured trust entries
//! 3. Bind the listener, retrying with a fixed backoff until it succeeds,
//!    the attempt limit is hit, or shutdown is requested
//! 4. Hand everything to the [`Tracker`] loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fgtracker_clock::SystemClock;
use fgtracker_core::TrustEntry;
use fgtracker_gateway::{BoundedResolver, ConnectionManager, IdentityResolver, TransportConfig};
use fgtracker_ports::{Clock, FlightStore};
use fgtracker_store::{SqliteFlightStore, StoreTarget};
use log::{error, info, warn};
use tokio::sync::watch;

use crate::config::TrackerConfig;
use crate::driver::Tracker;
use crate::error::RunnerError;
use crate::reconnect::ReconnectPolicy;

/// Listener bind retry policy
#[derive(Debug, Clone)]
pub struct BindRetry {
    pub backoff: Duration,
    /// `None` retries until shutdown
    pub max_attempts: Option<u32>,
}

impl Default for BindRetry {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

/// Bind the listener, retrying on failure
///
/// Returns `Ok(None)` when shutdown is requested before a bind succeeds.
pub async fn bind_with_retry(
    addr: SocketAddr,
    transport: TransportConfig,
    policy: &BindRetry,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<ConnectionManager>, RunnerError> {
    let mut attempts = 0u32;
    loop {
        if *shutdown.borrow() {
            return Ok(None);
        }

        attempts += 1;
        let err = match ConnectionManager::bind(addr, transport.clone()) {
            Ok(manager) => return Ok(Some(manager)),
            Err(e) => e,
        };

        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            error!("Giving up on {} after {} attempt(s): {}", addr, attempts, err);
            return Err(RunnerError::Bind {
                addr,
                attempts,
                source: err,
            });
        }
        error!(
            "{}; retrying in {} seconds",
            err,
            policy.backoff.as_secs_f64()
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.backoff) => {}
            changed = shutdown.changed() => {
                // A dropped sender can never signal again; treat it as shutdown
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(None);
                }
            }
        }
    }
}

/// Connect to the configured store
///
/// A store that cannot be reached yet is returned disconnected; the tick
/// loop reconnects it.
pub fn open_store(target: StoreTarget) -> SqliteFlightStore {
    match SqliteFlightStore::open(target.clone()) {
        Ok(store) => store,
        Err(e) => {
            error!("Store unavailable at startup: {}", e);
            SqliteFlightStore::deferred(target)
        }
    }
}

/// Upsert configured trust entries; returns how many were written
///
/// Run at startup and again whenever the store comes back, since a
/// reconnected store may be a fresh database.
pub fn seed_trust_entries(store: &mut dyn FlightStore, entries: &[TrustEntry]) -> usize {
    if entries.is_empty() {
        return 0;
    }
    if !store.is_connected() {
        warn!(
            "Store down, {} configured trust entries not seeded",
            entries.len()
        );
        return 0;
    }

    let mut seeded = 0;
    for entry in entries {
        match store.upsert_trust_entry(entry) {
            Ok(()) => seeded += 1,
            Err(e) => {
                error!("Seeding trust entry {}/{} failed: {}", entry.name, entry.protocol, e);
                break;
            }
        }
    }
    info!("Seeded {} trust entries", seeded);
    seeded
}

/// Run the daemon until shutdown is signalled
pub async fn launch(
    config: TrackerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), RunnerError> {
    config.validate()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let target = config.store_target();
    if target == StoreTarget::Memory {
        warn!("In-memory store: flights are lost whenever the store reconnects");
    }
    let mut store = open_store(target);
    seed_trust_entries(&mut store, &config.trusted_servers);

    let addr = config.listen_addr()?;
    let Some(manager) =
        bind_with_retry(addr, config.transport(), &config.bind_retry(), &mut shutdown).await?
    else {
        info!("Shutdown requested before the listener was bound");
        return Ok(());
    };

    let ident = IdentityResolver::new(
        config.protocols.clone(),
        Arc::new(BoundedResolver::system()),
        Arc::clone(&clock),
    );
    let mut tracker = Tracker::new(
        manager,
        store,
        ident,
        clock,
        ReconnectPolicy::new(config.reconnect_interval()),
        config.tick_interval(),
    )
    .with_trust_entries(config.trusted_servers.clone());
    tracker.run(shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[tokio::test]
    async fn test_bind_succeeds_first_time() {
        let (_tx, mut rx) = watch::channel(false);
        let manager = bind_with_retry(
            "127.0.0.1:0".parse().unwrap(),
            TransportConfig::default(),
            &BindRetry::default(),
            &mut rx,
        )
        .await
        .unwrap();
        assert!(manager.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_gives_up_after_max_attempts() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let (_tx, mut rx) = watch::channel(false);
        let policy = BindRetry {
            backoff: Duration::from_secs(10),
            max_attempts: Some(3),
        };

        let result = bind_with_retry(addr, TransportConfig::default(), &policy, &mut rx).await;
        assert!(matches!(result, Err(RunnerError::Bind { attempts: 3, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_retry_observes_shutdown() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let (tx, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            bind_with_retry(addr, TransportConfig::default(), &BindRetry::default(), &mut rx).await
        });
        tokio::time::sleep(Duration::from_secs(15)).await;
        tx.send(true).unwrap();

        let result = task.await.unwrap().unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_before_bind() {
        let (_tx, mut rx) = watch::channel(true);
        let result = bind_with_retry(
            "127.0.0.1:0".parse().unwrap(),
            TransportConfig::default(),
            &BindRetry::default(),
            &mut rx,
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_seed_trust_entries() {
        let mut store = SqliteFlightStore::in_memory().unwrap();
        let addr = "192.0.2.10".parse().unwrap();
        let entries = vec![
            TrustEntry::by_address("mpserver01", "NOWAIT", addr),
            TrustEntry::by_domain("mpserver02", "V20151207", "mpserver02.example.org"),
        ];

        assert_eq!(seed_trust_entries(&mut store, &entries), 2);
        assert_eq!(
            store.find_authorized_server("NOWAIT", addr).unwrap(),
            Some("mpserver01".to_string())
        );
    }

    #[test]
    fn test_seed_skipped_when_store_down() {
        let mut store = SqliteFlightStore::deferred(StoreTarget::Memory);
        let entries = vec![TrustEntry::by_address(
            "mpserver01",
            "NOWAIT",
            "192.0.2.10".parse().unwrap(),
        )];
        assert_eq!(seed_trust_entries(&mut store, &entries), 0);
    }

    #[test]
    fn test_open_store_falls_back_to_deferred() {
        let store = open_store(StoreTarget::File("/nonexistent/dir/fgtracker.sqlite".into()));
        assert!(!store.is_connected());
    }
}
