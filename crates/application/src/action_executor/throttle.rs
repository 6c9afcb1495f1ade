use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces outbound request starts at least `min_interval` apart.
#[derive(Debug)]
pub(super) struct Throttle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub(super) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits for the next free request slot.
    pub(super) async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait_until = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.map_or(now, |slot| slot.max(now));
            *next_slot = Some(slot + self.min_interval);
            slot
        };

        tokio::time::sleep_until(wait_until).await;
    }
}
