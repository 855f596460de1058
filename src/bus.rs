//! Boundary to the physical transport talking to tracking hardware.
//!
//! The transport itself lives outside this crate; the poller only needs
//! the message-channel surface below. One implementation wraps the real
//! hardware link, tests script a fake.

/// Bidirectional message channel to tracking hardware.
///
/// Reads are consumed by exactly one thread (the poller). Writes may come
/// from any thread; the poller serializes them under its send lock, so an
/// implementation sees at most one in-flight begin/append/send sequence.
///
/// `next_signal_id` may block, but implementations must surface
/// [`SIG_IDLE`](crate::protocol::SIG_IDLE) periodically (for example via
/// an internal receive timeout) so the poll loop can observe its stop
/// flag in bounded time.
pub trait HardwareBus: Send + Sync {
    /// Block until the next message arrives and return its signal id.
    /// `None` means the channel closed (hardware disconnect).
    fn next_signal_id(&self) -> Option<i32>;

    /// Read the next `i32` of the current message body.
    /// `None` on a short read; the caller drops the message.
    fn read_int(&self) -> Option<i32>;

    /// Read the next `u32` of the current message body.
    fn read_uint(&self) -> Option<u32>;

    /// Fill `buf` with the next doubles of the current message body.
    /// Returns `false` on a short or inconsistent read.
    fn read_doubles(&self, buf: &mut [f64]) -> bool;

    /// Start composing an outgoing control message with the given id.
    fn begin_message(&self, id: i32);

    /// Append an `i32` argument to the message being composed.
    fn append_int(&self, v: i32);

    /// Transmit the composed message. Send failures are swallowed by the
    /// transport and not observable here.
    fn send_message(&self);
}
