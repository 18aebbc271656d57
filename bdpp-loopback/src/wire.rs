use core::task::{Context, Poll};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use bdpp_core::MAX_PACKET_DATA_SIZE;
use bdpp_driver::packet::HEADER_LEN;

/// Longest record a wire carries
pub const MAX_RECORD_LEN: usize = HEADER_LEN + MAX_PACKET_DATA_SIZE;
/// Number of records in transit a wire holds
pub const WIRE_DEPTH: usize = 4;

pub type Record = heapless::Vec<u8, MAX_RECORD_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WireError {
    /// The wire holds `WIRE_DEPTH` records already
    Full,
    /// The record exceeds `MAX_RECORD_LEN`
    TooLong,
}

/// One direction of a serial line carrying whole records
pub struct Wire<M: RawMutex> {
    channel: Channel<M, Record, WIRE_DEPTH>,
}

impl<M: RawMutex> Wire<M> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Puts a record on the wire.
    pub fn try_send(&self, bytes: &[u8]) -> Result<(), WireError> {
        if self.channel.is_full() {
            return Err(WireError::Full);
        }
        let record = Record::from_slice(bytes).map_err(|_| WireError::TooLong)?;
        self.channel.try_send(record).map_err(|_| WireError::Full)
    }

    /// Takes the oldest record off the wire.
    pub fn try_receive(&self) -> Option<Record> {
        self.channel.try_receive().ok()
    }

    /// Registers the waker for free room, unless there is some already.
    pub fn poll_ready_to_send(&self, cx: &mut Context<'_>) -> Poll<()> {
        self.channel.poll_ready_to_send(cx)
    }

    /// Registers the waker for an arriving record, unless one is waiting already.
    pub fn poll_ready_to_receive(&self, cx: &mut Context<'_>) -> Poll<()> {
        self.channel.poll_ready_to_receive(cx)
    }

    /// Number of records in transit
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl<M: RawMutex> Default for Wire<M> {
    fn default() -> Self {
        Self::new()
    }
}
