//! Hardware transfer engine interface

use core::task::Waker;

use crate::config::LinkConfig;
use crate::packet::Packet;

/// Finished transfer reported by the engine
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion<'a> {
    /// The packet record went out on the wire
    Sent(Packet<'a>),
    /// A record was received into a posted buffer.
    ///
    /// The engine must have called `Packet::complete_receive` on it. A buffer that failed
    /// validation is reported as well; the stack recycles it.
    Received(Packet<'a>),
}

/// Bulk transfer engine behind the serial link
///
/// The stack owns the engine and calls it from the completion context only. Every packet
/// handed over is returned exactly once through `poll_completion`; the engine must never
/// drop one.
pub trait TransferEngine<'a> {
    type Error: core::fmt::Debug;

    /// Configures the serial port and the transfer hardware. Called once, before any transfer.
    fn install(&mut self, config: &LinkConfig) -> Result<(), Self::Error>;

    /// Maximum number of receive buffers the engine can hold posted at once
    fn rx_capacity(&self) -> usize;

    /// Starts sending the packet record.
    ///
    /// The stack keeps at most one packet in flight for transmission.
    fn submit(&mut self, packet: Packet<'a>);

    /// Posts a buffer to receive the next record into.
    ///
    /// Buffers are filled in the order they were posted.
    fn post_receive(&mut self, packet: Packet<'a>);

    /// Fetches the next finished transfer.
    fn poll_completion(&mut self) -> Option<Completion<'a>>;

    /// Registers a waker to be woken when a transfer finishes.
    fn register_waker(&mut self, waker: &Waker);
}
