//! Packet memory

use core::mem::MaybeUninit;

use bdpp_core::{
    MAX_APP_PACKETS, MAX_DRIVER_PACKETS, MAX_PACKET_DATA_SIZE, MAX_RX_PACKETS,
    SMALL_PACKET_DATA_SIZE,
};
use bdpp_driver::packet::HEADER_LEN;

use crate::utils::DuplexArray;

/// Record buffer of one packet: the header followed by `N` data bytes
#[repr(C, align(4))]
pub struct PacketBuffer<const N: usize>(DuplexArray<u8, HEADER_LEN, N>);

impl<const N: usize> PacketBuffer<N> {
    pub fn new() -> Self {
        Self(DuplexArray::repeat(0))
    }

    pub(crate) fn record_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl<const N: usize> Default for PacketBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SmallPacketBuffer = PacketBuffer<SMALL_PACKET_DATA_SIZE>;
pub type LargePacketBuffer = PacketBuffer<MAX_PACKET_DATA_SIZE>;

/// Memory backing every packet of an engine
///
/// `D`, `A` and `R` are the numbers of driver-owned, app-owned and receive buffers.
/// The engine borrows the storage for its whole lifetime, so the storage is typically placed
/// in a `StaticCell`. Large storage should be initialized in place with
/// [`Storage::init_zeroed`]:
///
/// ```
/// use bdpp::storage::Storage;
/// use static_cell::StaticCell;
///
/// static STORAGE: StaticCell<Storage> = StaticCell::new();
/// let storage: &'static mut Storage = Storage::init_zeroed(STORAGE.uninit());
/// ```
#[repr(C)]
pub struct Storage<
    const D: usize = MAX_DRIVER_PACKETS,
    const A: usize = MAX_APP_PACKETS,
    const R: usize = MAX_RX_PACKETS,
> {
    pub(crate) driver: [SmallPacketBuffer; D],
    pub(crate) app: [LargePacketBuffer; A],
    pub(crate) rx: [LargePacketBuffer; R],
}

impl<const D: usize, const A: usize, const R: usize> Storage<D, A, R> {
    pub fn new() -> Self {
        Self {
            driver: core::array::from_fn(|_| PacketBuffer::new()),
            app: core::array::from_fn(|_| PacketBuffer::new()),
            rx: core::array::from_fn(|_| PacketBuffer::new()),
        }
    }

    /// Zero-initializes the storage in place.
    pub fn init_zeroed(slot: &mut MaybeUninit<Self>) -> &mut Self {
        // SAFETY: the storage holds byte arrays only, for which all zeroes is a valid value
        unsafe {
            slot.as_mut_ptr().write_bytes(0, 1);
            slot.assume_init_mut()
        }
    }
}

impl<const D: usize, const A: usize, const R: usize> Default for Storage<D, A, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::boxed::Box;

    #[test]
    fn test_record_layout() {
        let mut buffer = SmallPacketBuffer::new();
        let record = buffer.record_mut();
        assert_eq!(record.len(), HEADER_LEN + SMALL_PACKET_DATA_SIZE);
        assert_eq!(record.as_ptr() as usize % 4, 0);
    }

    #[test]
    fn test_init_zeroed() {
        let slot = Box::leak(Box::<Storage<1, 1, 2>>::new_uninit());
        let storage = Storage::init_zeroed(slot);
        assert!(storage.rx[1].record_mut().iter().all(|&b| b == 0));
        assert_eq!(storage.app[0].record_mut().len(), HEADER_LEN + MAX_PACKET_DATA_SIZE);
    }
}
