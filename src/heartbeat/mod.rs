//! Heartbeat-based liveness monitoring
//!
//! A `HeartbeatMonitor` polls a registry of responders on behalf of one
//! listener. A probe that errors at the transport level and a probe that
//! answers `false` both count as a dead responder. By default a dead
//! responder is detached after its first failure report, so one death is
//! reported exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One monitored liveness endpoint.
#[derive(Debug, Clone)]
pub enum HeartbeatTarget {
    /// Remote responder: `GET url` must answer 2xx to count as alive.
    Http { url: String },
    /// In-process responder backed by a shared flag.
    Flag(Arc<AtomicBool>),
}

impl HeartbeatTarget {
    pub async fn probe(&self, http: &reqwest::Client) -> bool {
        match self {
            HeartbeatTarget::Http { url } => match http.get(url).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(_) => false,
            },
            HeartbeatTarget::Flag(flag) => flag.load(Ordering::SeqCst),
        }
    }
}

pub struct HeartbeatMonitor {
    period: Duration,
    detach_on_failure: bool,
    responders: Arc<Mutex<HashMap<u32, HeartbeatTarget>>>,
    http: reqwest::Client,
}

impl HeartbeatMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            detach_on_failure: true,
            responders: Arc::new(Mutex::new(HashMap::new())),
            http: reqwest::Client::new(),
        }
    }

    /// Keep probing (and re-reporting) dead responders instead of
    /// detaching them after the first failure.
    pub fn with_detach_on_failure(mut self, detach_on_failure: bool) -> Self {
        self.detach_on_failure = detach_on_failure;
        self
    }

    /// Attach a responder under a caller-chosen id. Replaces any previous
    /// responder with the same id.
    pub fn attach(&self, id: u32, target: HeartbeatTarget) {
        self.responders.lock().unwrap().insert(id, target);
    }

    /// Stop probing the given id.
    pub fn detach(&self, id: u32) {
        self.responders.lock().unwrap().remove(&id);
    }

    pub fn monitored_count(&self) -> usize {
        self.responders.lock().unwrap().len()
    }

    /// Probe every attached responder once, invoking `on_failure` for each
    /// dead one.
    pub async fn sweep_once<F>(&self, on_failure: &mut F)
    where
        F: FnMut(u32, HeartbeatTarget),
    {
        let snapshot: Vec<(u32, HeartbeatTarget)> = self
            .responders
            .lock()
            .unwrap()
            .iter()
            .map(|(id, t)| (*id, t.clone()))
            .collect();

        for (id, target) in snapshot {
            if target.probe(&self.http).await {
                continue;
            }

            tracing::warn!("heartbeat responder {} failed its probe", id);
            if self.detach_on_failure {
                self.responders.lock().unwrap().remove(&id);
            }
            on_failure(id, target);
        }
    }

    /// Run the monitoring loop until the process exits. A single sweep's
    /// failure is the responder's problem, never the loop's.
    pub fn spawn<F>(self: Arc<Self>, mut on_failure: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(u32, HeartbeatTarget) + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                self.sweep_once(&mut on_failure).await;
                tokio::time::sleep(self.period).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_target(alive: bool) -> (HeartbeatTarget, Arc<AtomicBool>) {
        let f = Arc::new(AtomicBool::new(alive));
        (HeartbeatTarget::Flag(f.clone()), f)
    }

    #[tokio::test]
    async fn test_alive_responder_never_fires() {
        let monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        let (target, _) = flag_target(true);
        monitor.attach(0, target);

        let mut fired = 0;
        for _ in 0..5 {
            monitor.sweep_once(&mut |_, _| fired += 1).await;
        }

        assert_eq!(fired, 0);
        assert_eq!(monitor.monitored_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_responder_fires_once_then_detaches() {
        let monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        let (target, flag) = flag_target(true);
        monitor.attach(7, target);

        let mut fired = Vec::new();
        monitor.sweep_once(&mut |id, _| fired.push(id)).await;
        assert!(fired.is_empty());

        flag.store(false, Ordering::SeqCst);
        monitor.sweep_once(&mut |id, _| fired.push(id)).await;
        monitor.sweep_once(&mut |id, _| fired.push(id)).await;

        // default detach-on-failure: one death, one report
        assert_eq!(fired, vec![7]);
        assert_eq!(monitor.monitored_count(), 0);
    }

    #[tokio::test]
    async fn test_dead_responder_refires_without_detach() {
        let monitor =
            HeartbeatMonitor::new(Duration::from_millis(10)).with_detach_on_failure(false);
        let (target, _) = flag_target(false);
        monitor.attach(1, target);

        let mut fired = 0;
        monitor.sweep_once(&mut |_, _| fired += 1).await;
        monitor.sweep_once(&mut |_, _| fired += 1).await;

        assert_eq!(fired, 2);
        assert_eq!(monitor.monitored_count(), 1);
    }

    #[tokio::test]
    async fn test_detach_stops_probing() {
        let monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        let (target, flag) = flag_target(true);
        monitor.attach(3, target);
        monitor.detach(3);

        flag.store(false, Ordering::SeqCst);
        let mut fired = 0;
        monitor.sweep_once(&mut |_, _| fired += 1).await;

        assert_eq!(fired, 0);
        assert_eq!(monitor.monitored_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_http_responder_counts_as_dead() {
        let monitor = HeartbeatMonitor::new(Duration::from_millis(10));
        // nothing listens here; the probe fails at the transport level
        monitor.attach(
            2,
            HeartbeatTarget::Http {
                url: "http://127.0.0.1:1/health/live".to_string(),
            },
        );

        let mut fired = Vec::new();
        monitor.sweep_once(&mut |id, _| fired.push(id)).await;

        assert_eq!(fired, vec![2]);
    }
}
