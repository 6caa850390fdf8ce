use tokio::{
    sync::Mutex,
    time::{self, Duration, Instant},
};

/// Global spacing of outbound calls.
///
/// A single clock is shared by every caller. Callers queue on the mutex and each one
/// leaves with the next slot reserved `min_delay` after its own start.
pub struct RequestPacer {
    min_delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next call slot is open and claim it.
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            time::sleep_until(slot).await;
        }
        *next_slot = Some(Instant::now() + self.min_delay);
    }
}
