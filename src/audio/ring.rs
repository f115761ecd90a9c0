use std::collections::VecDeque;

/// Rolling store of the most recent mono samples.
///
/// Backed by a fixed allocation with a write cursor; appending past capacity
/// overwrites the oldest samples.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f32>,
    write_pos: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            write_pos: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append samples, evicting the oldest ones once the buffer is full.
    pub fn append(&mut self, samples: &[f32]) {
        let capacity = self.capacity();

        // Only the newest `capacity` samples can survive
        let samples = &samples[samples.len().saturating_sub(capacity)..];

        for &sample in samples {
            self.data[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % capacity;
        }
        self.len = (self.len + samples.len()).min(capacity);
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first.
    ///
    /// When fewer samples are stored than requested the front of `out` is
    /// zero-filled.
    pub fn window_into(&self, out: &mut [f32]) {
        let available = self.len.min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);

        let capacity = self.capacity();
        let start = (self.write_pos + capacity - available) % capacity;
        for (i, slot) in out[pad..].iter_mut().enumerate() {
            *slot = self.data[(start + i) % capacity];
        }
    }

    /// The most recent `size` samples, left-padded with zeros.
    pub fn window(&self, size: usize) -> Vec<f32> {
        let mut out = vec![0.0; size];
        self.window_into(&mut out);
        out
    }
}

/// Bounded FIFO history. Pushing into a full history evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, returning the evicted entry when the history was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> History<T> {
    /// A full history with every slot set to `value`.
    pub fn filled(capacity: usize, value: T) -> Self {
        let mut history = Self::new(capacity);
        for _ in 0..history.capacity {
            history.items.push_back(value.clone());
        }
        history
    }
}

impl History<f32> {
    pub fn mean(&self) -> f32 {
        if self.items.is_empty() {
            return 0.0;
        }
        self.items.iter().sum::<f32>() / self.items.len() as f32
    }
}
