//! Completion-side packet routing

use bdpp_core::{PacketFlags, StreamId};
use bdpp_driver::packet::Packet;

/// Destination of a completed receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxRoute {
    /// Valid record, handed to the stream consumer
    Deliver(StreamId),
    /// Nothing valid landed in the buffer; back to the free pool
    Reclaim,
}

/// Marks a sent packet done.
pub fn finish_tx(packet: &mut Packet<'_>) {
    packet.clear_flags(PacketFlags::READY);
    packet.set_flags(PacketFlags::DONE);
}

/// Routes a completed receive buffer by its declared stream id.
///
/// Delivered packets are marked done and app-owned; the sender's usage and segment bits
/// are kept.
pub fn route_rx(packet: &mut Packet<'_>) -> RxRoute {
    if packet.is_flag_clear(PacketFlags::DONE) {
        return RxRoute::Reclaim;
    }
    packet.clear_flags(PacketFlags::READY);
    packet.set_flags(PacketFlags::DONE | PacketFlags::FOR_RX | PacketFlags::APP_OWNED);
    RxRoute::Deliver(packet.stream_id())
}
