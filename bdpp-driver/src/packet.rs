//! Packet handle and its wire record
//!
//! A packet owns the unique borrow of one pre-allocated buffer. The buffer holds the record
//! exactly as it travels below the framing layer:
//!
//! | offset | width | field |
//! |---|---|---|
//! | 0 | 1 | flags |
//! | 1 | 1 | stream id (upper nibble), packet id (lower nibble) |
//! | 2 | 2 | actual data size, little-endian |
//! | 4 | actual size | data |
//!
//! Packets are neither `Clone` nor `Copy`. Handing one to a queue, the transfer engine or a
//! consumer moves it, so a buffer can never be referenced from two places at once.

use bdpp_core::{
    Ownership, PacketFlags, PacketId, Segment, StreamId, Usage, pack_indexes, unpack_indexes,
};

/// Length of the record header preceding the data
pub const HEADER_LEN: usize = 4;

const FLAGS_OFFSET: usize = 0;
const INDEXES_OFFSET: usize = 1;
const SIZE_OFFSET: usize = 2;

/// Pool a packet was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketClass {
    /// Small driver-owned transmit packet
    Driver,
    /// Large app-owned transmit packet
    App,
    /// Large receive packet
    Rx,
}

impl From<Ownership> for PacketClass {
    fn from(value: Ownership) -> Self {
        match value {
            Ownership::Driver => PacketClass::Driver,
            Ownership::App => PacketClass::App,
        }
    }
}

/// Identity of the packet pool a buffer belongs to
///
/// Pools derive it from the address of their storage, so two live pools never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolId(pub usize);

/// Identity of the buffer behind a packet
///
/// Kept outside the wire record, so it survives the transfer engine overwriting the header
/// of a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Origin {
    pub pool: PoolId,
    pub class: PacketClass,
    pub slot: u8,
}

/// Append would exceed the packet capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError;

/// Received record failed header validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Shorter than the header or than the declared data size
    Truncated,
    /// Declared data size or record length exceeds the buffer capacity
    Oversized,
}

#[must_use]
pub struct Packet<'a> {
    origin: Origin,
    record: &'a mut [u8],
}

impl<'a> Packet<'a> {
    /// Takes over a record buffer and zeroes it.
    ///
    /// The buffer must hold at least `HEADER_LEN` bytes; the rest is the data capacity.
    pub(crate) fn new(
        origin: Origin,
        record: &'a mut [u8],
        flags: PacketFlags,
        id: PacketId,
    ) -> Self {
        assert!(record.len() > HEADER_LEN);
        assert!(record.len() - HEADER_LEN <= usize::from(u16::MAX));
        record.fill(0);

        let mut packet = Self { origin, record };
        packet.record[FLAGS_OFFSET] = flags.into_bits();
        packet.record[INDEXES_OFFSET] = pack_indexes(StreamId::MIN, id);
        packet
    }

    /// Restores the freshly created state without touching the data bytes.
    pub(crate) fn reset(&mut self, flags: PacketFlags) {
        let id = PacketId::from_u8_truncating(self.origin.slot);
        self.record[FLAGS_OFFSET] = flags.into_bits();
        self.record[INDEXES_OFFSET] = pack_indexes(StreamId::MIN, id);
        self.set_actual_size(0);
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn class(&self) -> PacketClass {
        self.origin.class
    }

    pub fn flags(&self) -> PacketFlags {
        PacketFlags::from_bits(self.record[FLAGS_OFFSET])
    }

    /// Sets one or more flags.
    pub fn set_flags(&mut self, flags: PacketFlags) {
        self.record[FLAGS_OFFSET] |= flags.into_bits();
    }

    /// Clears one or more flags.
    pub fn clear_flags(&mut self, flags: PacketFlags) {
        self.record[FLAGS_OFFSET] &= !flags.into_bits();
    }

    /// Tests whether any of the flags is set.
    pub fn is_flag_set(&self, flags: PacketFlags) -> bool {
        self.flags().intersects(flags)
    }

    /// Tests whether all of the flags are clear.
    pub fn is_flag_clear(&self, flags: PacketFlags) -> bool {
        !self.flags().intersects(flags)
    }

    pub fn usage(&self) -> Option<Usage> {
        self.flags().usage()
    }

    pub fn set_usage(&mut self, usage: Usage) {
        let mut flags = self.flags();
        flags.set_usage(usage);
        self.record[FLAGS_OFFSET] = flags.into_bits();
    }

    pub fn segment(&self) -> Segment {
        self.flags().segment()
    }

    pub fn set_segment(&mut self, segment: Segment) {
        let mut flags = self.flags();
        flags.set_segment(segment);
        self.record[FLAGS_OFFSET] = flags.into_bits();
    }

    pub fn ownership(&self) -> Ownership {
        self.flags().ownership()
    }

    pub fn stream_id(&self) -> StreamId {
        unpack_indexes(self.record[INDEXES_OFFSET]).0
    }

    pub fn packet_id(&self) -> PacketId {
        unpack_indexes(self.record[INDEXES_OFFSET]).1
    }

    pub fn set_stream_id(&mut self, stream: StreamId) {
        self.record[INDEXES_OFFSET] = pack_indexes(stream, self.packet_id());
    }

    /// Data capacity in bytes
    pub fn max_size(&self) -> usize {
        self.record.len() - HEADER_LEN
    }

    /// Number of valid data bytes
    pub fn actual_size(&self) -> usize {
        let bytes = [self.record[SIZE_OFFSET], self.record[SIZE_OFFSET + 1]];
        usize::from(u16::from_le_bytes(bytes))
    }

    pub fn remaining(&self) -> usize {
        self.max_size() - self.actual_size()
    }

    pub fn is_full(&self) -> bool {
        self.actual_size() >= self.max_size()
    }

    pub fn is_empty(&self) -> bool {
        self.actual_size() == 0
    }

    /// Appends a data byte.
    pub fn append(&mut self, byte: u8) -> Result<(), CapacityError> {
        self.append_slice(&[byte])
    }

    /// Appends data bytes.
    ///
    /// Either all bytes fit and are appended or the packet stays unchanged.
    pub fn append_slice(&mut self, bytes: &[u8]) -> Result<(), CapacityError> {
        if bytes.len() > self.remaining() {
            return Err(CapacityError);
        }
        let start = HEADER_LEN + self.actual_size();
        self.record[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_actual_size(self.actual_size() + bytes.len());
        Ok(())
    }

    /// Valid data bytes
    pub fn data(&self) -> &[u8] {
        &self.record[HEADER_LEN..HEADER_LEN + self.actual_size()]
    }

    /// Wire record: header and valid data bytes
    pub fn record(&self) -> &[u8] {
        &self.record[..HEADER_LEN + self.actual_size()]
    }

    /// Whole record buffer for a transfer engine to receive into.
    ///
    /// Call `complete_receive` once the engine has written the record.
    pub fn dma_buffer_mut(&mut self) -> &mut [u8] {
        self.record
    }

    /// Validates a record the transfer engine has written into the buffer.
    ///
    /// On success the packet is marked done. On failure the packet is left empty and not done,
    /// so the engine recycles it instead of delivering it.
    pub fn complete_receive(&mut self, length: usize) -> Result<(), RecordError> {
        let res = self.validate_record(length);
        match res {
            Ok(()) => self.set_flags(PacketFlags::DONE),
            Err(_) => {
                self.clear_flags(PacketFlags::DONE);
                self.set_actual_size(0);
            }
        }
        res
    }

    /// Copies a received record into the buffer and validates it.
    pub fn load_record(&mut self, bytes: &[u8]) -> Result<(), RecordError> {
        if bytes.len() > self.record.len() {
            self.clear_flags(PacketFlags::DONE);
            self.set_actual_size(0);
            return Err(RecordError::Oversized);
        }
        self.record[..bytes.len()].copy_from_slice(bytes);
        self.complete_receive(bytes.len())
    }

    fn validate_record(&self, length: usize) -> Result<(), RecordError> {
        if length > self.record.len() {
            return Err(RecordError::Oversized);
        }
        if length < HEADER_LEN {
            return Err(RecordError::Truncated);
        }
        let declared = self.actual_size();
        if declared > self.max_size() {
            return Err(RecordError::Oversized);
        }
        if HEADER_LEN + declared > length {
            return Err(RecordError::Truncated);
        }
        Ok(())
    }

    fn set_actual_size(&mut self, size: usize) {
        let size = unwrap!(u16::try_from(size));
        self.record[SIZE_OFFSET..SIZE_OFFSET + 2].copy_from_slice(&size.to_le_bytes());
    }
}

impl<'a> core::fmt::Debug for Packet<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Packet")
            .field("origin", &self.origin)
            .field("flags", &self.flags())
            .field("stream", &self.stream_id())
            .field("id", &self.packet_id())
            .field("actual_size", &self.actual_size())
            .field("max_size", &self.max_size())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<'a> defmt::Format for Packet<'a> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Packet {{ origin: {}, flags: {}, stream: {}, size: {}/{} }}",
            self.origin,
            self.flags(),
            self.stream_id(),
            self.actual_size(),
            self.max_size()
        )
    }
}
