//! Rolling-window request rate.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Counts events over a sliding window in one-second buckets.
///
/// Memory is fixed at one slot per second of window regardless of how many
/// events arrive.
pub struct RateCounter {
    origin: Instant,
    slots: Mutex<Vec<Slot>>,
}

#[derive(Clone, Copy, Default)]
struct Slot {
    /// Seconds since `origin` this slot was last written for.
    second: u64,
    count: u64,
}

impl RateCounter {
    pub fn new(window: Duration) -> Self {
        let len = window.as_secs().max(1) as usize;
        Self {
            origin: Instant::now(),
            slots: Mutex::new(vec![Slot::default(); len]),
        }
    }

    pub fn incr(&self) {
        let now = self.elapsed_secs();
        let mut slots = self.slots.lock();
        let idx = (now % slots.len() as u64) as usize;
        let slot = &mut slots[idx];
        if slot.second != now {
            *slot = Slot { second: now, count: 0 };
        }
        slot.count += 1;
    }

    /// Events seen within the window.
    pub fn count(&self) -> u64 {
        let now = self.elapsed_secs();
        let slots = self.slots.lock();
        let len = slots.len() as u64;
        slots
            .iter()
            .filter(|slot| slot.count > 0 && slot.second <= now && now - slot.second < len)
            .map(|slot| slot.count)
            .sum()
    }

    /// Events per second averaged over the window.
    pub fn rate(&self) -> f64 {
        self.count() as f64 / self.slots.lock().len() as f64
    }

    fn elapsed_secs(&self) -> u64 {
        Instant::now().duration_since(self.origin).as_secs()
    }
}
