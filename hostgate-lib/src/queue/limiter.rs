use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::queue::{Policy, QueueStats, RoutingKey};

/// Emitted every time a limiter admits a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionEvent {
    /// Key of the admitting limiter
    pub key: RoutingKey,
    /// Policy of the admitting limiter
    pub policy: Policy,
    /// Requests still waiting after this admission
    pub queued: usize,
    /// Requests running, including the one just admitted
    pub running: usize,
}

impl fmt::Display for AdmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | queue: {} | running: {}",
            self.key, self.policy, self.queued, self.running
        )
    }
}

/// Callback receiving every [`AdmissionEvent`]
pub type AdmissionObserver = Arc<dyn Fn(&AdmissionEvent) + Send + Sync>;

/// How a limiter decides when to admit
enum Gate {
    /// Fair semaphore; admission order is submission order
    Concurrency(Semaphore),
    /// GCRA limiter with burst 1. The mutex is fair and makes waiters queue
    /// up in submission order instead of racing for the next cell.
    Rate {
        limiter: DefaultDirectRateLimiter,
        turn: Mutex<()>,
    },
}

impl Gate {
    fn new(policy: Policy) -> Self {
        match policy {
            Policy::Concurrency(n) => {
                Gate::Concurrency(Semaphore::new(n.get().min(Semaphore::MAX_PERMITS)))
            }
            Policy::Rate { requests, interval } => {
                // Spacing admissions by `interval / n` keeps every window of
                // length `interval` at `n` admissions or fewer
                let quota = Quota::with_period(interval / requests.get())
                    .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
                Gate::Rate {
                    limiter: RateLimiter::direct(quota),
                    turn: Mutex::new(()),
                }
            }
        }
    }
}

/// Increments a counter for as long as it is alive
struct Gauge<'a>(&'a AtomicUsize);

impl<'a> Gauge<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Gauge<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Admission control for a single routing key.
///
/// A limiter never rejects work; it only delays it until the policy allows
/// it to start. Work that was admitted runs to completion.
pub struct Limiter {
    key: RoutingKey,
    policy: Policy,
    gate: Gate,
    queued: AtomicUsize,
    running: AtomicUsize,
    admitted: AtomicU64,
    observer: Option<AdmissionObserver>,
}

impl Limiter {
    /// Create a limiter enforcing `policy`
    #[must_use]
    pub fn new(key: RoutingKey, policy: Policy, observer: Option<AdmissionObserver>) -> Self {
        Self {
            key,
            policy,
            gate: Gate::new(policy),
            queued: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            admitted: AtomicU64::new(0),
            observer,
        }
    }

    /// Wait for admission, then run `work` to completion.
    ///
    /// The output of `work` is returned unchanged.
    pub async fn run<F: Future>(&self, work: F) -> F::Output {
        let waiting = Gauge::enter(&self.queued);
        let permit = self.admit().await;
        drop(waiting);

        let _running = Gauge::enter(&self.running);
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.emit();

        let output = work.await;
        drop(permit);
        output
    }

    async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        match &self.gate {
            Gate::Concurrency(semaphore) => Some(
                semaphore
                    .acquire()
                    .await
                    // SAFETY: this should not panic as we never close the semaphore
                    .expect("Semaphore was closed unexpectedly"),
            ),
            Gate::Rate { limiter, turn } => {
                let _turn = turn.lock().await;
                limiter.until_ready().await;
                None
            }
        }
    }

    fn emit(&self) {
        let event = AdmissionEvent {
            key: self.key.clone(),
            policy: self.policy,
            queued: self.queued(),
            running: self.running(),
        };
        log::debug!("{event}");
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// The key this limiter is bound to
    #[must_use]
    pub const fn key(&self) -> &RoutingKey {
        &self.key
    }

    /// The policy this limiter enforces
    #[must_use]
    pub const fn policy(&self) -> Policy {
        self.policy
    }

    /// Requests waiting for admission
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Requests admitted and not yet finished
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests admitted since creation
    #[must_use]
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            policy: self.policy,
            queued: self.queued(),
            running: self.running(),
            admitted: self.admitted(),
        }
    }
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limiter")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("queued", &self.queued())
            .field("running", &self.running())
            .field("admitted", &self.admitted())
            .finish_non_exhaustive()
    }
}
