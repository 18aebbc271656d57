use bdpp_core::{MAX_STREAMS, StreamId, StreamSet};
use heapless::Deque;

mod stacked_array;

pub use stacked_array::DuplexArray;

pub struct StreamArray<T>([T; MAX_STREAMS]);

impl<T> StreamArray<T> {
    pub fn from_fn(cb: impl FnMut(usize) -> T) -> Self {
        Self(core::array::from_fn(cb))
    }
}

impl<T: Default> Default for StreamArray<T> {
    fn default() -> Self {
        Self::from_fn(|_| Default::default())
    }
}

impl<T> core::ops::Index<StreamId> for StreamArray<T> {
    type Output = T;

    fn index(&self, index: StreamId) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}

impl<T> core::ops::IndexMut<StreamId> for StreamArray<T> {
    fn index_mut(&mut self, index: StreamId) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

impl<T> core::ops::Deref for StreamArray<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Set of per-stream FIFO queues with a non-empty stream index
pub struct StreamDeque<T, const N: usize> {
    queues: StreamArray<Deque<T, N>>,
    streams: StreamSet,
}

impl<T, const N: usize> Default for StreamDeque<T, N> {
    fn default() -> Self {
        Self {
            queues: StreamArray::from_fn(|_| Deque::new()),
            streams: StreamSet::NONE,
        }
    }
}

impl<T, const N: usize> StreamDeque<T, N> {
    /// Streams with non-empty queues
    pub fn streams(&self) -> StreamSet {
        self.streams
    }

    pub fn pop_front(&mut self, stream: StreamId) -> Option<T> {
        let queue = &mut self.queues[stream];
        let value = queue.pop_front();
        if queue.is_empty() {
            self.streams.remove(stream);
        }
        value
    }

    pub fn push_back(&mut self, stream: StreamId, item: T) -> Result<(), T> {
        self.queues[stream].push_back(item)?;
        self.streams.insert(stream);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(Deque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(value: u8) -> StreamId {
        StreamId::new(value).unwrap()
    }

    #[test]
    fn test_stream_deque() {
        let mut deque = StreamDeque::<u32, 2>::default();
        deque.push_back(stream(4), 1).unwrap();
        deque.push_back(stream(4), 2).unwrap();
        deque.push_back(stream(9), 3).unwrap();
        assert_eq!(deque.push_back(stream(4), 4), Err(4));

        assert_eq!(deque.len(), 3);
        assert_eq!(
            deque.streams(),
            StreamSet::new_eq(stream(4)) | StreamSet::new_eq(stream(9))
        );

        assert_eq!(deque.pop_front(stream(4)), Some(1));
        assert_eq!(deque.pop_front(stream(4)), Some(2));
        assert_eq!(deque.pop_front(stream(4)), None);
        assert_eq!(deque.streams(), StreamSet::new_eq(stream(9)));
    }

    #[test]
    fn test_failed_push_keeps_index() {
        let mut deque = StreamDeque::<u32, 0>::default();
        assert_eq!(deque.push_back(stream(1), 1), Err(1));
        assert!(deque.streams().is_empty());
    }
}
