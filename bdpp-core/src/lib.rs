//! BDPP protocol core data types
//!
//! This crate provides basic data type definitions used by other BDPP crates.
//! BDPP users should not depend on this crate directly. Use the `bdpp::core` reexport instead.
#![no_std]

/// Maximum number of command/data streams multiplexed on the link
pub const MAX_STREAMS: usize = 16;
/// Maximum payload length of an app-owned or receive packet
pub const MAX_PACKET_DATA_SIZE: usize = 4072;
/// Maximum payload length of a driver-owned packet
pub const SMALL_PACKET_DATA_SIZE: usize = 32;
/// Maximum number of driver-owned packets
pub const MAX_DRIVER_PACKETS: usize = 16;
/// Maximum number of app-owned packets
pub const MAX_APP_PACKETS: usize = 16;
/// Maximum number of receive packets
pub const MAX_RX_PACKETS: usize = 16;
/// Number of receive packets kept armed with the transfer engine
pub const ARMED_RX_PACKETS: usize = 4;

const STREAM_INDEX_BITS: u8 = 0xf0;
const PACKET_INDEX_BITS: u8 = 0x0f;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Logical channel multiplexed onto the link
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamId(u8);

impl StreamId {
    const MAX_VALUE: u8 = 0x0f;
    pub const MIN: StreamId = StreamId(0);
    pub const MAX: StreamId = StreamId(Self::MAX_VALUE);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }

    pub fn iter() -> impl Iterator<Item = StreamId> {
        (0..=Self::MAX_VALUE).map(StreamId)
    }
}

impl From<StreamId> for u8 {
    fn from(value: StreamId) -> Self {
        value.into_u8()
    }
}

impl From<StreamId> for usize {
    fn from(value: StreamId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for StreamId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Slot identifier of a packet within its pool
///
/// Not globally unique: a driver-owned and an app-owned packet may share the same id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketId(u8);

impl PacketId {
    const MAX_VALUE: u8 = 0x0f;
    pub const MAX: PacketId = PacketId(Self::MAX_VALUE);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl From<PacketId> for u8 {
    fn from(value: PacketId) -> Self {
        value.into_u8()
    }
}

impl From<PacketId> for usize {
    fn from(value: PacketId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for PacketId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Packs a stream id (upper nibble) and a packet id (lower nibble) into one byte
pub const fn pack_indexes(stream: StreamId, packet: PacketId) -> u8 {
    (stream.into_u8() << 4) | packet.into_u8()
}

/// Inverse of [`pack_indexes`]
pub const fn unpack_indexes(indexes: u8) -> (StreamId, PacketId) {
    (
        StreamId::from_u8_truncating((indexes & STREAM_INDEX_BITS) >> 4),
        PacketId::from_u8_truncating(indexes & PACKET_INDEX_BITS),
    )
}

/// What the packet payload carries
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Usage {
    /// Printable data
    Print,
    /// A command or request
    Command,
    /// A response
    Response,
}

/// Position of the packet within a multi-packet message
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Segment {
    Middle,
    First,
    Last,
    /// The message fits a single packet
    Only,
}

/// Which pool class the packet belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ownership {
    /// Small packets managed by the driver itself
    Driver,
    /// Large packets handed out to the application
    App,
}

/// Packet flag byte
///
/// The lower nibble describes the packet usage, the upper nibble affects packet processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const NONE: Self = Self(0);
    pub const COMMAND: Self = Self(0x01);
    pub const RESPONSE: Self = Self(0x02);
    pub const FIRST: Self = Self(0x04);
    pub const LAST: Self = Self(0x08);
    pub const READY: Self = Self(0x10);
    pub const DONE: Self = Self(0x20);
    pub const FOR_RX: Self = Self(0x40);
    pub const APP_OWNED: Self = Self(0x80);

    pub const USAGE_BITS: Self = Self(0x0f);
    pub const PROCESS_BITS: Self = Self(0xf0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn into_bits(self) -> u8 {
        self.0
    }

    /// Tests whether all flags of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Tests whether any flag of `other` is set
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0
    }

    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `None` when both command and response bits are set
    pub const fn usage(&self) -> Option<Usage> {
        match self.0 & (Self::COMMAND.0 | Self::RESPONSE.0) {
            0 => Some(Usage::Print),
            0x01 => Some(Usage::Command),
            0x02 => Some(Usage::Response),
            _ => None,
        }
    }

    pub const fn set_usage(&mut self, usage: Usage) {
        self.remove(Self(Self::COMMAND.0 | Self::RESPONSE.0));
        match usage {
            Usage::Print => {}
            Usage::Command => self.insert(Self::COMMAND),
            Usage::Response => self.insert(Self::RESPONSE),
        }
    }

    pub const fn segment(&self) -> Segment {
        match (self.contains(Self::FIRST), self.contains(Self::LAST)) {
            (false, false) => Segment::Middle,
            (true, false) => Segment::First,
            (false, true) => Segment::Last,
            (true, true) => Segment::Only,
        }
    }

    pub const fn set_segment(&mut self, segment: Segment) {
        self.remove(Self(Self::FIRST.0 | Self::LAST.0));
        match segment {
            Segment::Middle => {}
            Segment::First => self.insert(Self::FIRST),
            Segment::Last => self.insert(Self::LAST),
            Segment::Only => self.insert(Self(Self::FIRST.0 | Self::LAST.0)),
        }
    }

    pub const fn ownership(&self) -> Ownership {
        if self.contains(Self::APP_OWNED) {
            Ownership::App
        } else {
            Ownership::Driver
        }
    }
}

impl core::ops::Not for PacketFlags {
    type Output = Self;
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl core::ops::BitAnd<PacketFlags> for PacketFlags {
    type Output = Self;
    fn bitand(self, rhs: PacketFlags) -> Self::Output {
        PacketFlags(self.0 & rhs.0)
    }
}

impl core::ops::BitOr<PacketFlags> for PacketFlags {
    type Output = Self;
    fn bitor(self, rhs: PacketFlags) -> Self::Output {
        PacketFlags(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign<PacketFlags> for PacketFlags {
    fn bitor_assign(&mut self, rhs: PacketFlags) {
        self.0 |= rhs.0;
    }
}

/// A set of streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamSet(u16);

impl StreamSet {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u16::MAX);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn into_bits(self) -> u16 {
        self.0
    }

    pub const fn new_eq(stream: StreamId) -> Self {
        Self(1u16 << stream.into_u8())
    }

    pub const fn contains(&self, stream: StreamId) -> bool {
        (self.0 >> stream.into_u8()) & 0x1 != 0
    }

    pub const fn insert(&mut self, stream: StreamId) {
        self.0 |= Self::new_eq(stream).0
    }

    pub const fn remove(&mut self, stream: StreamId) {
        self.0 &= !Self::new_eq(stream).0
    }

    /// Lowest stream id in the set
    pub const fn first(&self) -> Option<StreamId> {
        StreamId::new(self.0.trailing_zeros() as u8)
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == Self::NONE.0
    }
}

impl Default for StreamSet {
    fn default() -> Self {
        StreamSet::NONE
    }
}

impl core::ops::Not for StreamSet {
    type Output = Self;
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl core::ops::BitAnd<StreamSet> for StreamSet {
    type Output = Self;
    fn bitand(self, rhs: StreamSet) -> Self::Output {
        StreamSet(self.0 & rhs.0)
    }
}

impl core::ops::BitOr<StreamSet> for StreamSet {
    type Output = Self;
    fn bitor(self, rhs: StreamSet) -> Self::Output {
        StreamSet(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign<StreamSet> for StreamSet {
    fn bitor_assign(&mut self, rhs: StreamSet) {
        self.0 |= rhs.0;
    }
}

impl core::iter::IntoIterator for StreamSet {
    type Item = StreamId;
    type IntoIter = StreamSetIterator;
    fn into_iter(self) -> Self::IntoIter {
        StreamSetIterator { residual: self }
    }
}

pub struct StreamSetIterator {
    residual: StreamSet,
}

impl core::iter::Iterator for StreamSetIterator {
    type Item = StreamId;
    fn next(&mut self) -> Option<Self::Item> {
        let first = self.residual.first();
        if let Some(stream) = first {
            self.residual.remove(stream);
        }
        first
    }
}
