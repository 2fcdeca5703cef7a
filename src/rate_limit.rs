use std::time::Duration;
use tokio::time::Instant;

/// Paces successive external calls to a fixed rate ceiling.
///
/// `acquire()` waits as needed so callers never sleep inline; the pacing
/// policy lives here and can be swapped without touching call sites.
/// No adaptive backoff and no concurrency: the geocoding service's
/// free-tier limit is a hard per-second ceiling.
pub struct Pacer {
    interval: Duration,
    next_slot: Option<Instant>,
}

impl Pacer {
    /// Creates a pacer allowing at most `calls_per_second` acquisitions
    /// per second, evenly spaced.
    pub fn new(calls_per_second: u32) -> Self {
        let calls = calls_per_second.max(1);
        Self {
            interval: Duration::from_secs(1) / calls,
            next_slot: None,
        }
    }

    /// Waits until the next call slot is available.
    pub async fn acquire(&mut self) {
        let now = Instant::now();
        match self.next_slot {
            None => {
                self.next_slot = Some(now + self.interval);
            }
            Some(slot) => {
                if slot > now {
                    tokio::time::sleep_until(slot).await;
                }
                self.next_slot = Some(slot.max(now) + self.interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let mut pacer = Pacer::new(10);
        let before = Instant::now();
        pacer.acquire().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn acquires_are_spaced_by_interval() {
        let mut pacer = Pacer::new(10);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.acquire().await;
        }
        // 5 calls at 10/sec: the 5th fires no earlier than 400ms in
        assert!(Instant::now() - start >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_pacer_does_not_accumulate_burst() {
        let mut pacer = Pacer::new(10);
        pacer.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let before = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        // Second call after the idle gap still waits one interval
        assert!(Instant::now() - before >= Duration::from_millis(100));
    }
}
