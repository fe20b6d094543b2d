//! Lock-free SPSC ring buffer for wide bus samples.
//!
//! Uses `ringbuf::HeapRb<i32>`, whose `push_slice` is wait-free and safe to
//! call from a real-time capture callback.

pub mod frame;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half, held by whatever feeds the bus (capture callback, replay, tests).
pub type WideProducer = ringbuf::HeapProd<i32>;

/// Consumer half, held by the bus read side.
pub type WideConsumer = ringbuf::HeapCons<i32>;

/// Default capacity: 2^16 = 65 536 wide samples ≈ 1.36 s at 48 kHz.
pub const RING_CAPACITY: usize = 1 << 16;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_wide_ring(capacity: usize) -> (WideProducer, WideConsumer) {
    HeapRb::<i32>::new(capacity.max(1)).split()
}
