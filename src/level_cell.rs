//! Last known detection score, shared between the capture worker and hosts.
//! One writer (the worker), any number of readers. The value lives in an
//! `AtomicU64` holding f64 bits; subscribers get pushes through a watch channel.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

pub struct LevelCell {
    bits: AtomicU64,
    tx: watch::Sender<f64>,
}

impl LevelCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0.0);
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
            tx,
        }
    }

    /// Latest published score, 0 if nothing was ever published.
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Publish a new score. Subscribers are notified even when the value repeats.
    pub fn publish(&self, score: f64) {
        self.bits.store(score.to_bits(), Ordering::Release);
        self.tx.send_replace(score);
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero() {
        assert_eq!(LevelCell::new().get(), 0.0);
    }

    #[test]
    fn publish_is_visible_to_readers() {
        let cell = Arc::new(LevelCell::new());
        let mut rx = cell.subscribe();
        cell.publish(71.5);
        assert_eq!(cell.get(), 71.5);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 71.5);
    }

    #[test]
    fn concurrent_reads_see_whole_values() {
        let cell = Arc::new(LevelCell::new());
        let writer = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    cell.publish(if i % 2 == 0 { 12.5 } else { 87.25 });
                }
            })
        };
        for _ in 0..10_000 {
            let v = cell.get();
            assert!(v == 0.0 || v == 12.5 || v == 87.25);
        }
        writer.join().unwrap();
    }
}
