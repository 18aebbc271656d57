/// Private interfaces for the BDPP engine
///
/// Drivers should not use this module.
/// Backward-incompatible changes can be made without major version bump.
use core::task::Waker;

use bdpp_core::{PacketFlags, PacketId};

use crate::packet::{Origin, Packet};

pub trait DynamicTx<'a> {
    fn try_pop(&self) -> Option<Packet<'a>>;
    fn register_tx_waker(&self, waker: &Waker);
    fn recycle(&self, packet: Packet<'a>);
}

pub trait DynamicRx<'a> {
    fn try_take_free(&self) -> Option<Packet<'a>>;
    fn has_free(&self) -> bool;
    fn register_rx_waker(&self, waker: &Waker);
    fn push(&self, packet: Packet<'a>);
    fn discard(&self, packet: Packet<'a>) -> Packet<'a>;
    fn note_stall(&self);
}

pub trait DynamicLink<'a>: DynamicRx<'a> + DynamicTx<'a> {}

/// Creates a packet over a record buffer. The buffer is zeroed.
pub fn new_packet<'a>(
    origin: Origin,
    record: &'a mut [u8],
    flags: PacketFlags,
    id: PacketId,
) -> Packet<'a> {
    Packet::new(origin, record, flags, id)
}

/// Returns the packet to its freshly created state, keeping the data bytes.
pub fn reset_packet(packet: &mut Packet<'_>, flags: PacketFlags) {
    packet.reset(flags)
}
