//! In-memory bus fed through an SPSC ring.
//!
//! The producer half goes to whoever generates samples (a host capture
//! callback, a file replayer, a test); `RingBus` owns the consumer half and
//! serves `read` calls from it with the same blocking/timeout semantics as a
//! hardware bus.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{AudioBus, BusConfig, ReadTimeout};
use crate::{
    buffering::{create_wide_ring, Consumer, Observer, WideConsumer, WideProducer},
    error::{MicError, Result},
};

/// Poll interval while waiting for the producer to catch up.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct RingBus {
    consumer: WideConsumer,
    config: Option<BusConfig>,
}

impl RingBus {
    /// Create a bus and the producer that feeds it.
    pub fn new(capacity: usize) -> (Self, WideProducer) {
        let (producer, consumer) = create_wide_ring(capacity);
        (Self::from_consumer(consumer), producer)
    }

    pub fn from_consumer(consumer: WideConsumer) -> Self {
        Self {
            consumer,
            config: None,
        }
    }

    /// Configuration passed to the last successful `open`, if still open.
    pub fn config(&self) -> Option<&BusConfig> {
        self.config.as_ref()
    }

    /// Samples waiting to be read.
    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }
}

impl AudioBus for RingBus {
    fn open(&mut self, config: &BusConfig) -> Result<()> {
        info!(
            port = config.port,
            sample_rate = config.sample_rate,
            dma_buf_count = config.dma_buf_count,
            dma_buf_len = config.dma_buf_len,
            "ring bus opened"
        );
        self.config = Some(config.clone());
        Ok(())
    }

    fn read(&mut self, dst: &mut [i32], timeout: ReadTimeout) -> Result<usize> {
        if self.config.is_none() {
            return Err(MicError::BusFault("ring bus is not open".into()));
        }

        let deadline = timeout.deadline();
        let mut filled = 0usize;
        loop {
            filled += self.consumer.pop_slice(&mut dst[filled..]);
            if filled == dst.len() {
                return Ok(filled);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(filled, requested = dst.len(), "ring bus read timed out");
                return Ok(filled);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn zero_dma_buffer(&mut self) -> Result<()> {
        let dropped = self.consumer.clear();
        debug!(dropped, "ring bus purged");
        Ok(())
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            info!("ring bus closed");
        }
    }
}
