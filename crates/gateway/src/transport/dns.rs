//! Forward DNS for the declared-name identification fallback
//!
//! Lookups run on the tick thread, so the OS resolver is wrapped in a
//! [`BoundedResolver`]: each lookup gets a deadline, and answers are cached
//! for a while so a reconnecting server costs one lookup, not one per attempt.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use fgtracker_ports::HostResolver;
use log::{debug, warn};

/// Longest a lookup may hold up the tick
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a successful answer is reused
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Resolver backed by the operating system (`getaddrinfo`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = (host, 0).to_socket_addrs()?;
        Ok(addrs.map(|a| a.ip().to_canonical()).collect())
    }
}

/// Deadline and answer cache around another resolver
///
/// The inner lookup runs on its own thread. When the deadline passes the
/// caller gets `TimedOut` and the thread is left to finish on its own.
/// Failures are not cached.
pub struct BoundedResolver<R> {
    inner: Arc<R>,
    timeout: Duration,
    ttl: Duration,
    cache: Mutex<HashMap<String, (Instant, Vec<IpAddr>)>>,
}

impl BoundedResolver<SystemResolver> {
    /// OS resolver with the default deadline and cache lifetime
    pub fn system() -> Self {
        Self::new(SystemResolver, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_CACHE_TTL)
    }
}

impl<R: HostResolver + 'static> BoundedResolver<R> {
    pub fn new(inner: R, timeout: Duration, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<Vec<IpAddr>> {
        let cache = self.cache.lock().ok()?;
        let (at, addrs) = cache.get(key)?;
        (at.elapsed() < self.ttl).then(|| addrs.clone())
    }

    fn remember(&self, key: String, addrs: &[IpAddr]) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|_, (at, _)| at.elapsed() < self.ttl);
            cache.insert(key, (Instant::now(), addrs.to_vec()));
        }
    }
}

impl<R: HostResolver + 'static> HostResolver for BoundedResolver<R> {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let key = host.to_ascii_lowercase();
        if let Some(addrs) = self.cached(&key) {
            debug!("DNS cache hit for {}", host);
            return Ok(addrs);
        }

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let name = host.to_string();
        thread::Builder::new()
            .name("fgtracker-dns".into())
            .spawn(move || {
                let _ = tx.send(inner.resolve(&name));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(addrs)) => {
                self.remember(key, &addrs);
                Ok(addrs)
            }
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Lookup of {} took longer than {} ms, giving up",
                    host,
                    self.timeout.as_millis()
                );
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("lookup of {host} timed out"),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(io::Error::other(format!("lookup of {host} aborted")))
            }
        }
    }
}

/// Fixed host table, for tests and for deployments without working DNS
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, addr: IpAddr) -> Self {
        self.hosts
            .entry(host.into().to_ascii_lowercase())
            .or_default()
            .push(addr);
        self
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {host}")))
    }
}
