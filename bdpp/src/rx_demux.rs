use core::cell::RefCell;
use core::task::{Context, Poll};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;

use bdpp_core::{MAX_RX_PACKETS, StreamId, StreamSet};
use bdpp_driver::packet::Packet;

use crate::utils::{StreamArray, StreamDeque};

/// Per-stream FIFOs of received packets
///
/// The completion context pushes, consumers pop. Streams are isolated: a packet is only ever
/// visible on the stream it was pushed to.
pub struct RxDemultiplexer<'a, M: RawMutex>(Mutex<M, RefCell<Inner<'a>>>);

struct Inner<'a> {
    queues: StreamDeque<Packet<'a>, MAX_RX_PACKETS>,
    triggers: StreamArray<WakerRegistration>,
}

impl<'a, M: RawMutex> RxDemultiplexer<'a, M> {
    pub fn new() -> Self {
        Self(Mutex::new(RefCell::new(Inner {
            queues: Default::default(),
            triggers: StreamArray::from_fn(|_| WakerRegistration::new()),
        })))
    }

    /// Appends a packet to the stream queue.
    ///
    /// Each queue can hold every receive packet, so a push cannot fail.
    pub fn push(&self, stream: StreamId, packet: Packet<'a>) {
        self.0.lock(|cell| {
            let mut inner = cell.borrow_mut();
            unwrap!(inner.queues.push_back(stream, packet).ok());
            inner.triggers[stream].wake();
        })
    }

    pub fn available(&self, stream: StreamId) -> bool {
        self.0
            .lock(|cell| cell.borrow().queues.streams().contains(stream))
    }

    pub fn pop(&self, stream: StreamId) -> Option<Packet<'a>> {
        self.0.lock(|cell| cell.borrow_mut().queues.pop_front(stream))
    }

    /// Pops a packet or registers the waker for the next push to the stream.
    ///
    /// A stream keeps one waker: concurrent consumers of one stream wake each other out.
    pub fn poll_pop(&self, cx: &mut Context<'_>, stream: StreamId) -> Poll<Packet<'a>> {
        self.0.lock(|cell| {
            let mut inner = cell.borrow_mut();
            match inner.queues.pop_front(stream) {
                Some(packet) => Poll::Ready(packet),
                None => {
                    inner.triggers[stream].register(cx.waker());
                    Poll::Pending
                }
            }
        })
    }

    /// Streams holding at least one packet
    pub fn readiness(&self) -> StreamSet {
        self.0.lock(|cell| cell.borrow().queues.streams())
    }

    pub fn len(&self) -> usize {
        self.0.lock(|cell| cell.borrow().queues.len())
    }
}
