//! Per-client fixed-window rate limiting.
//!
//! Each client IP gets a counter and a window start. Once the window has been
//! open for longer than the configured duration, the next request resets it.
//! Requests landing on both sides of a boundary can therefore reach twice the
//! limit in a short span; that burst is accepted behaviour of a fixed window.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::AdmissionConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Counter state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    pub count: u32,
    pub window_start: Instant,
}

impl ClientWindow {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }
}

/// In-memory limiter shared by every connection of one gateway instance.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<IpAddr, ClientWindow>,
    window: Duration,
    max_requests: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(Duration::from_millis(config.window_ms), config.max_requests)
    }

    /// Count a request from `client` and report whether it is within the limit.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let (allowed, created) = {
            // The entry guard holds the shard lock for the whole read-modify-write.
            let (mut window, created) = match self.windows.entry(client) {
                Entry::Occupied(occupied) => (occupied.into_ref(), false),
                Entry::Vacant(vacant) => (vacant.insert(ClientWindow::new(now)), true),
            };
            if window.is_expired(now, self.window) {
                *window = ClientWindow::new(now);
            }
            window.count = window.count.saturating_add(1);
            (window.count <= self.max_requests, created)
        };

        // `len` visits every shard, so it must run after the guard is released.
        if created {
            metrics::set_tracked_clients(self.windows.len());
        }
        allowed
    }

    /// Current window for `client`, if one is tracked.
    pub fn window_of(&self, client: IpAddr) -> Option<ClientWindow> {
        self.windows.get(&client).map(|w| *w)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Drop every window that has already expired. Returns how many were removed.
    ///
    /// An expired window is reset on the client's next request anyway, so
    /// removing it early changes nothing a client can observe.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.window;
        self.windows.retain(|_, w| !w.is_expired(now, window));
        let removed = before.saturating_sub(self.windows.len());

        metrics::set_tracked_clients(self.windows.len());
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Sweep every `every` until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: ShutdownSignal,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = self.tracked_clients(),
                                "Swept expired rate-limit windows"
                            );
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn new_clients_update_tracked_gauge_immediately() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 10);
        let t0 = Instant::now();

        ::metrics::with_local_recorder(&recorder, || {
            limiter.check_at(client(1), t0);
            limiter.check_at(client(1), t0);
            limiter.check_at(client(2), t0);
        });

        let rendered = handle.render();
        assert!(
            rendered.contains("gateway_tracked_clients 2"),
            "{}",
            rendered
        );
    }

    #[test]
    fn limits_within_window_and_resets_after() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(60_000), 2);
        let t0 = Instant::now();
        let ip = client(5);

        assert!(limiter.check_at(ip, t0));
        assert!(limiter.check_at(ip, t0 + Duration::from_millis(10)));
        assert!(!limiter.check_at(ip, t0 + Duration::from_millis(20)));

        assert!(limiter.check_at(ip, t0 + Duration::from_millis(61_000)));
        let window = limiter.window_of(ip).unwrap();
        assert_eq!(window.count, 1);
        assert_eq!(window.window_start, t0 + Duration::from_millis(61_000));
    }

    #[test]
    fn n_requests_allowed_then_rejected() {
        let max = 7;
        let limiter = FixedWindowLimiter::new(Duration::from_secs(1), max);
        let t0 = Instant::now();

        for i in 0..max {
            assert!(limiter.check_at(client(1), t0 + Duration::from_millis(i as u64)));
        }
        assert!(!limiter.check_at(client(1), t0 + Duration::from_millis(500)));
        // Still limited at the boundary itself; reset only once strictly past it.
        assert!(!limiter.check_at(client(1), t0 + Duration::from_secs(1)));
        assert!(limiter.check_at(client(1), t0 + Duration::from_millis(1001)));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        let t0 = Instant::now();

        assert!(limiter.check_at(client(1), t0));
        assert!(!limiter.check_at(client(1), t0));
        assert!(limiter.check_at(client(2), t0));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn sweep_removes_only_expired_windows() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(10), 5);
        let t0 = Instant::now();

        limiter.check_at(client(1), t0);
        limiter.check_at(client(2), t0 + Duration::from_secs(8));

        assert_eq!(limiter.sweep_at(t0 + Duration::from_secs(11)), 1);
        assert!(limiter.window_of(client(1)).is_none());
        assert!(limiter.window_of(client(2)).is_some());
    }

    #[test]
    fn concurrent_checks_do_not_lose_updates() {
        let limiter = std::sync::Arc::new(FixedWindowLimiter::new(Duration::from_secs(60), 10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        limiter.check(client(9));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(limiter.window_of(client(9)).unwrap().count, 2_000);
    }

    #[tokio::test]
    async fn sweeper_evicts_and_stops_on_shutdown() {
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_millis(5), 5));
        limiter.check(client(3));

        let shutdown = crate::lifecycle::Shutdown::new();
        let handle = Arc::clone(&limiter).spawn_sweeper(Duration::from_millis(10), shutdown.subscribe());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
