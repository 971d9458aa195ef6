//! ICMP echo sweep.
//!
//! A target containing `/` is swept: every host of the range except its
//! network and broadcast addresses is probed, bounded by the concurrency
//! gate. A plain address is pinged on its own, with each reply reported as
//! it arrives.
//!
//! Unanswered hosts are treated as down, never as errors.

use super::gate::Gate;
use super::ping::EchoProber;
use super::rate_limiter::RateLimiter;
use super::{ScanOptions, MAX_PROBE_COUNT};
use crate::error::ScanResult;
use crate::storage::{IcmpResult, IcmpStore, ScanSession};
use crate::types::subnet;
use crate::types::TargetSpec;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which path an ICMP scan took and what it found.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IcmpOutcome {
    /// A range sweep.
    Sweep {
        network: String,
        results: Vec<IcmpResult>,
        /// Enumeration stopped early on cancellation.
        interrupted: bool,
    },
    /// A single host.
    Host {
        ip: Ipv4Addr,
        result: Option<IcmpResult>,
    },
}

impl IcmpOutcome {
    pub fn is_sweep(&self) -> bool {
        matches!(self, Self::Sweep { .. })
    }

    pub fn was_interrupted(&self) -> bool {
        matches!(self, Self::Sweep { interrupted: true, .. })
    }

    /// Hosts that answered.
    pub fn results(&self) -> Vec<IcmpResult> {
        match self {
            Self::Sweep { results, .. } => results.clone(),
            Self::Host { result, .. } => result.iter().cloned().collect(),
        }
    }
}

/// Reply statistics for one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingStats {
    pub sent: u32,
    pub received: u32,
    pub total_rtt: Duration,
}

impl PingStats {
    /// Mean RTT over the replies, `None` if nothing came back.
    pub fn avg_rtt(&self) -> Option<Duration> {
        (self.received > 0).then(|| self.total_rtt / self.received)
    }
}

/// Send `count` echoes to `ip`, `interval` apart.
///
/// With `report` set every reply and failure is logged at info/warn level;
/// otherwise failures only show up in debug output.
pub async fn ping_host(
    prober: &dyn EchoProber,
    ip: Ipv4Addr,
    count: u32,
    timeout: Duration,
    interval: Duration,
    report: bool,
) -> PingStats {
    let mut stats = PingStats::default();

    for seq in 0..count.min(MAX_PROBE_COUNT) as u16 {
        if seq > 0 {
            tokio::time::sleep(interval).await;
        }
        stats.sent += 1;

        match prober.echo(ip, seq, timeout).await {
            Ok(rtt) => {
                stats.received += 1;
                stats.total_rtt += rtt;
                if report {
                    info!("reply from {}: icmp_seq={} time={:?}", ip, seq, rtt);
                }
            }
            Err(e) if report => warn!("ping {} icmp_seq={} failed: {}", ip, seq, e),
            Err(e) => debug!("ping {} icmp_seq={} failed: {}", ip, seq, e),
        }
    }

    stats
}

/// Run an ICMP scan against `target`.
///
/// `cancel` is checked once per host before it is dispatched; probes that are
/// already running are allowed to finish.
pub async fn icmp_scan(
    session: &ScanSession,
    prober: Arc<dyn EchoProber>,
    target: &str,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> ScanResult<IcmpOutcome> {
    options.validate()?;

    match TargetSpec::parse(target)? {
        TargetSpec::Range(network) => {
            info!("Target is a CIDR: {} (network {})", target.trim(), subnet::align_to_network(&network));
            let outcome = sweep(session, prober, network, options, cancel).await?;
            info!("Ping sweep complete.");
            Ok(outcome)
        }
        TargetSpec::Host(ip) => {
            info!("Target is a single IP: {}", ip);
            Ok(single_host(session, prober.as_ref(), ip, options).await)
        }
    }
}

async fn sweep(
    session: &ScanSession,
    prober: Arc<dyn EchoProber>,
    network: Ipv4Network,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> ScanResult<IcmpOutcome> {
    let hosts = subnet::hosts(&network, &network);
    let run = run_sweep(Arc::clone(&session.icmp), prober, hosts, options, cancel).await?;
    debug!("Sweep of {} kept at most {} probe tasks", network, run.peak_tasks);

    Ok(IcmpOutcome::Sweep {
        network: subnet::align_to_network(&network).to_string(),
        results: run.results,
        interrupted: run.interrupted,
    })
}

struct SweepRun {
    results: Vec<IcmpResult>,
    interrupted: bool,
    /// Most probe tasks held by the sweep at any one time.
    peak_tasks: usize,
}

fn collect(joined: Result<Option<IcmpResult>, JoinError>, results: &mut Vec<IcmpResult>) {
    match joined {
        Ok(Some(result)) => results.push(result),
        Ok(None) => {}
        Err(e) => warn!("ICMP probe task failed: {}", e),
    }
}

/// Probe `hosts` under the gate. Finished tasks are reaped while dispatching,
/// so at most `options.concurrency` tasks are held regardless of range size.
async fn run_sweep(
    store: Arc<IcmpStore>,
    prober: Arc<dyn EchoProber>,
    hosts: impl Iterator<Item = Ipv4Addr>,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> ScanResult<SweepRun> {
    let gate = Gate::new(options.concurrency);
    let limiter = RateLimiter::per_second(options.rate_limit);
    let mut tasks = JoinSet::new();
    let mut results = Vec::new();
    let mut interrupted = false;
    let mut peak_tasks = 0;

    for ip in hosts {
        if cancel.is_cancelled() {
            interrupted = true;
            break;
        }

        let permit = tokio::select! {
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            permit = gate.acquire() => permit?,
        };
        if let Some(limiter) = &limiter {
            limiter.wait().await;
        }

        while let Some(joined) = tasks.try_join_next() {
            collect(joined, &mut results);
        }
        // A free permit means a task is finishing; wait for it to be reaped.
        while tasks.len() >= options.concurrency {
            match tasks.join_next().await {
                Some(joined) => collect(joined, &mut results),
                None => break,
            }
        }

        let prober = Arc::clone(&prober);
        let store = Arc::clone(&store);
        let (count, timeout, interval) = (options.count, options.timeout, options.probe_interval);

        tasks.spawn(async move {
            let _permit = permit;
            let stats = ping_host(prober.as_ref(), ip, count, timeout, interval, false).await;
            let avg_rtt = stats.avg_rtt()?;

            info!("Host alive: {:<15} (avg RTT: {:?})", ip, avg_rtt);
            let result = IcmpResult::new(ip, avg_rtt);
            store.insert(ip, result.clone()).then_some(result)
        });
        peak_tasks = peak_tasks.max(tasks.len());
    }

    if interrupted {
        warn!("Interrupted; waiting for {} dispatched probes", tasks.len());
    }

    while let Some(joined) = tasks.join_next().await {
        collect(joined, &mut results);
    }

    Ok(SweepRun {
        results,
        interrupted,
        peak_tasks,
    })
}

async fn single_host(
    session: &ScanSession,
    prober: &dyn EchoProber,
    ip: Ipv4Addr,
    options: &ScanOptions,
) -> IcmpOutcome {
    let stats = ping_host(prober, ip, options.count, options.timeout, options.probe_interval, true).await;

    info!(
        "{} probes sent to {}, {} received",
        stats.sent, ip, stats.received
    );

    let result = stats.avg_rtt().map(|avg_rtt| {
        let result = IcmpResult::new(ip, avg_rtt);
        session.icmp.insert(ip, result.clone());
        result
    });

    IcmpOutcome::Host { ip, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::testing::FakeProber;

    fn options(concurrency: usize) -> ScanOptions {
        ScanOptions::default()
            .with_concurrency(concurrency)
            .with_timeout(Duration::from_millis(50))
            .with_probe_interval(Duration::from_millis(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_host_path() {
        let session = ScanSession::new();
        let prober = Arc::new(FakeProber::new().alive(Ipv4Addr::LOCALHOST, Duration::from_millis(2)));

        let outcome = icmp_scan(
            &session,
            prober.clone(),
            "127.0.0.1",
            &options(4).with_count(3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!outcome.is_sweep());
        assert_eq!(prober.probed(), vec![Ipv4Addr::LOCALHOST; 3]);
        let results = outcome.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].avg_rtt, Duration::from_millis(2));
        assert_eq!(session.icmp_results(), results);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_host_down_is_not_an_error() {
        let session = ScanSession::new();
        let prober = Arc::new(FakeProber::new());
        let outcome = icmp_scan(&session, prober, "10.9.9.9", &options(1), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.results().is_empty());
        assert!(session.icmp_results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_skips_network_and_broadcast() {
        let session = ScanSession::new();
        let prober = Arc::new(
            FakeProber::new()
                .alive(Ipv4Addr::new(192, 168, 1, 2), Duration::from_millis(1))
                .alive(Ipv4Addr::new(192, 168, 1, 3), Duration::from_millis(1)),
        );

        let outcome = icmp_scan(
            &session,
            prober.clone(),
            "192.168.1.1/30",
            &options(8),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.is_sweep());
        let mut probed = prober.probed();
        probed.sort();
        assert_eq!(
            probed,
            vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]
        );
        let results = outcome.results();
        assert_eq!(results, vec![IcmpResult::new(Ipv4Addr::new(192, 168, 1, 2), Duration::from_millis(1))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_averages_rtt() {
        let session = ScanSession::new();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        let prober = Arc::new(FakeProber::new().alive(ip, Duration::from_millis(4)));
        icmp_scan(&session, prober, "10.0.0.0/30", &options(2).with_count(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(session.icmp_results(), vec![IcmpResult::new(ip, Duration::from_millis(4))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_concurrency_bound() {
        for concurrency in [1, 5, 50] {
            let session = ScanSession::new();
            let prober = Arc::new(FakeProber::new().with_delay(Duration::from_millis(5)));
            icmp_scan(
                &session,
                prober.clone(),
                "10.1.0.0/24",
                &options(concurrency),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
            assert!(
                prober.peak_in_flight() <= concurrency,
                "peak {} exceeded {}",
                prober.peak_in_flight(),
                concurrency
            );
            assert_eq!(prober.probed().len(), 254);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_sweep_dispatches_nothing() {
        let session = ScanSession::new();
        let prober = Arc::new(FakeProber::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = icmp_scan(&session, prober.clone(), "10.0.0.0/24", &options(4), &cancel)
            .await
            .unwrap();

        assert!(outcome.was_interrupted());
        assert!(prober.probed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_sweep_lets_running_probes_finish() {
        let session = ScanSession::new();
        let prober = Arc::new(FakeProber::new().with_delay(Duration::from_millis(20)));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let outcome = icmp_scan(&session, prober.clone(), "10.2.0.0/24", &options(2), &cancel)
            .await
            .unwrap();

        assert!(outcome.was_interrupted());
        let probed = prober.probed().len();
        assert!(probed > 0 && probed < 254, "probed {}", probed);
        assert_eq!(prober.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_large_sweep_holds_at_most_concurrency_tasks() {
        let network: Ipv4Network = "10.20.0.0/16".parse().unwrap();
        let store = Arc::new(IcmpStore::new());
        let prober = Arc::new(FakeProber::new().alive(Ipv4Addr::new(10, 20, 7, 7), Duration::from_millis(1)));

        let run = run_sweep(
            Arc::clone(&store),
            prober.clone(),
            subnet::hosts(&network, &network),
            &options(50),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(prober.probed().len(), 65534);
        assert!(run.peak_tasks <= 50, "held {} tasks", run.peak_tasks);
        assert!(!run.interrupted);
        assert_eq!(run.results.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_probe_count_is_capped_to_sequence_space() {
        let options = options(1).with_count(MAX_PROBE_COUNT + 1);
        assert!(matches!(options.validate(), Err(ScanError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_invalid_target() {
        let session = ScanSession::new();
        let result = icmp_scan(
            &session,
            Arc::new(FakeProber::new()),
            "bogus",
            &options(1),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(ScanError::InvalidTarget(_))));
    }
}
