//! Time source for runner delays and execution timing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type SharedClock = Arc<dyn Clock>;

#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Real time via the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
