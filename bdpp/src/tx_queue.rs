use core::cell::RefCell;
use core::task::Waker;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::Deque;

use bdpp_core::{MAX_APP_PACKETS, MAX_DRIVER_PACKETS, PacketFlags};
use bdpp_driver::packet::{Packet, PacketClass};

/// Holds every transmit packet at once, so enqueue cannot run out of room
const TX_QUEUE_DEPTH: usize = MAX_DRIVER_PACKETS + MAX_APP_PACKETS;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError<'a> {
    /// Receive packets cannot be queued for transmission. The packet is handed back.
    NotTransmittable(Packet<'a>),
    /// The packet belongs to another engine. The packet is handed back.
    Foreign(Packet<'a>),
}

impl<'a> TxError<'a> {
    /// Recovers the refused packet.
    pub fn into_packet(self) -> Packet<'a> {
        match self {
            TxError::NotTransmittable(packet) | TxError::Foreign(packet) => packet,
        }
    }
}

/// FIFO of packets ready for transmission
///
/// Producers enqueue from normal context; the hardware bridge dequeues from the completion
/// context. Packets leave in queueing order, regardless of their stream.
pub struct TxQueue<'a, M: RawMutex>(Mutex<M, RefCell<Inner<'a>>>);

struct Inner<'a> {
    queue: Deque<Packet<'a>, TX_QUEUE_DEPTH>,
    non_empty_trigger: WakerRegistration,
}

impl<'a, M: RawMutex> TxQueue<'a, M> {
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(Inner {
            queue: Deque::new(),
            non_empty_trigger: WakerRegistration::new(),
        })))
    }

    /// Marks the packet ready and appends it.
    pub fn enqueue(&self, mut packet: Packet<'a>) -> Result<(), TxError<'a>> {
        if packet.class() == PacketClass::Rx {
            return Err(TxError::NotTransmittable(packet));
        }
        packet.clear_flags(PacketFlags::DONE | PacketFlags::FOR_RX);
        packet.set_flags(PacketFlags::READY);

        self.0.lock(|cell| {
            let mut inner = cell.borrow_mut();
            unwrap!(inner.queue.push_back(packet).ok());
            inner.non_empty_trigger.wake();
        });
        Ok(())
    }

    /// Pops the head packet.
    pub fn dequeue(&self) -> Option<Packet<'a>> {
        self.0.lock(|cell| cell.borrow_mut().queue.pop_front())
    }

    /// Registers a waker to be woken on the next enqueue.
    pub fn register_waker(&self, waker: &Waker) {
        self.0
            .lock(|cell| cell.borrow_mut().non_empty_trigger.register(waker))
    }

    pub fn len(&self) -> usize {
        self.0.lock(|cell| cell.borrow().queue.len())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use bdpp_core::{Ownership, StreamId};
    use bdpp_driver::packet::PoolId;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use futures_test::task::new_count_waker;
    use std::boxed::Box;

    use crate::pool::PacketPool;
    use crate::storage::Storage;

    fn make_pool() -> PacketPool<'static, CriticalSectionRawMutex> {
        let storage = Storage::init_zeroed(Box::leak(Box::<Storage<4, 1, 1>>::new_uninit()));
        PacketPool::new(
            PoolId(storage as *const Storage<4, 1, 1> as usize),
            &mut storage.driver,
            &mut storage.app,
            &mut storage.rx,
            4,
            1,
            1,
        )
    }

    #[test]
    fn test_fifo_across_streams() {
        let pool = make_pool();
        let queue = TxQueue::<CriticalSectionRawMutex>::new();

        for stream in [5u8, 1, 5, 0] {
            let mut packet = pool.acquire(Ownership::Driver).unwrap();
            packet.set_stream_id(StreamId::new(stream).unwrap());
            queue.enqueue(packet).unwrap();
        }
        assert_eq!(queue.len(), 4);

        let order: std::vec::Vec<(u8, u8)> = core::iter::from_fn(|| queue.dequeue())
            .map(|packet| {
                assert!(packet.is_flag_set(PacketFlags::READY));
                (packet.stream_id().into_u8(), packet.origin().slot)
            })
            .collect();
        assert_eq!(order, [(5, 0), (1, 1), (5, 2), (0, 3)]);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_rx_packet_refused() {
        let pool = make_pool();
        let queue = TxQueue::<CriticalSectionRawMutex>::new();

        let packet = pool.acquire_rx().unwrap();
        let packet = match queue.enqueue(packet) {
            Err(err) => err.into_packet(),
            Ok(()) => panic!("receive packet accepted"),
        };
        assert_eq!(packet.class(), PacketClass::Rx);
        assert!(packet.is_flag_clear(PacketFlags::READY));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_enqueue_wakes() {
        let pool = make_pool();
        let queue = TxQueue::<CriticalSectionRawMutex>::new();
        let (waker, count) = new_count_waker();

        queue.register_waker(&waker);
        queue.enqueue(pool.acquire(Ownership::App).unwrap()).unwrap();
        assert_eq!(count.get(), 1);
    }
}
