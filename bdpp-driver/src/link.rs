//! Channels connecting the hardware bridge and the BDPP engine

use core::task::Waker;

use crate::internal;
use crate::packet::Packet;

/// Producer of packets for transmission
pub struct Tx<'a>(&'a (dyn internal::DynamicTx<'a> + Sync));

impl<'a> Tx<'a> {
    /// Fetches the next ready packet, in queueing order.
    pub fn pop(&mut self) -> Option<Packet<'a>> {
        self.0.try_pop()
    }

    /// Registers a waker to be woken when a packet is queued.
    pub fn register_waker(&mut self, waker: &Waker) {
        self.0.register_tx_waker(waker)
    }

    /// Hands back a packet whose record has been sent.
    pub fn complete(&mut self, packet: Packet<'a>) {
        self.0.recycle(packet)
    }
}

/// Source of free receive buffers and consumer of received packets
///
/// Buffers taken from the channel are marked ready for reception. Every buffer must come
/// back through `push` or `discard`.
pub struct Rx<'a>(&'a (dyn internal::DynamicRx<'a> + Sync));

impl<'a> Rx<'a> {
    /// Takes a free receive buffer.
    pub fn take_free(&mut self) -> Option<Packet<'a>> {
        self.0.try_take_free()
    }

    pub fn has_free(&self) -> bool {
        self.0.has_free()
    }

    /// Registers a waker to be woken when a receive buffer is released.
    pub fn register_waker(&mut self, waker: &Waker) {
        self.0.register_rx_waker(waker)
    }

    /// Delivers a received packet to its stream.
    ///
    /// A packet without a valid record goes straight back to the free pool.
    pub fn push(&mut self, packet: Packet<'a>) {
        self.0.push(packet)
    }

    /// Drops the received record and returns the buffer ready for reception again.
    pub fn discard(&mut self, packet: Packet<'a>) -> Packet<'a> {
        self.0.discard(packet)
    }

    /// Reports that a buffer could not be re-armed for lack of free buffers.
    pub fn note_stall(&mut self) {
        self.0.note_stall()
    }
}

/// Channel container. The hardware bridge consumes it.
pub struct Link<'a>(&'a (dyn internal::DynamicLink<'a> + Sync));

impl<'a> Link<'a> {
    pub fn new(access: &'a (dyn internal::DynamicLink<'a> + Sync)) -> Self {
        Self(access)
    }

    pub fn split(self) -> (Rx<'a>, Tx<'a>) {
        (Rx(self.0), Tx(self.0))
    }
}
