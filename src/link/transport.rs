//! Transport abstraction: the TX half of a UART-like channel.
//!
//! Concrete implementations:
//! - modem UART (AT commands)
//! - inter-MCU bridge UART (framed packets)
//! - host simulation adapters
//!
//! The RX half is interrupt driven and arrives through a
//! [`FrameQueue`](super::channels::FrameQueue), so it is not part of this
//! trait.

/// Byte-oriented output channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Outcome of [`write_all`] when the transport stops making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAllError<E> {
    /// The transport itself reported an error.
    Transport(E),
    /// The transport accepted zero bytes.
    Stalled { written: usize },
}

/// Write every byte of `data`, looping over partial writes, then flush.
pub fn write_all<T: Transport>(tx: &mut T, data: &[u8]) -> Result<(), WriteAllError<T::Error>> {
    let mut written = 0;
    while written < data.len() {
        match tx.write(&data[written..]) {
            Ok(0) => return Err(WriteAllError::Stalled { written }),
            Ok(n) => written += n,
            Err(e) => return Err(WriteAllError::Transport(e)),
        }
    }
    tx.flush().map_err(WriteAllError::Transport)
}
