//! Audio ring buffer: fixed pre-allocated circular buffer for PCM samples.
//! Sits between the device callback thread and the capture worker.

/// Fixed-size ring buffer for PCM i16 samples. Pre-allocated, never grows.
pub struct RingBuffer {
    buffer: Box<[i16]>,
    write_pos: usize,
    len: usize,
    /// Samples discarded because the reader fell behind.
    overrun: u64,
}

impl RingBuffer {
    /// Create a ring buffer sized for `duration_secs` at `sample_rate` Hz, mono,
    /// holding at least `min_samples`.
    pub fn new(sample_rate: u32, duration_secs: f32, min_samples: usize) -> Self {
        let capacity = ((sample_rate as f32 * duration_secs) as usize).max(min_samples).max(1);
        Self {
            buffer: vec![0i16; capacity].into_boxed_slice(),
            write_pos: 0,
            len: 0,
            overrun: 0,
        }
    }

    /// Write samples into the ring buffer. Overwrites oldest data if full.
    /// Called from the audio callback: non-allocating.
    #[inline]
    pub fn write(&mut self, samples: &[i16]) {
        let capacity = self.buffer.len();
        for &s in samples {
            self.buffer[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % capacity;
            if self.len < capacity {
                self.len += 1;
            } else {
                self.overrun += 1;
            }
        }
    }

    /// Read available samples into output buffer, oldest first.
    /// Returns the number of samples actually read.
    #[inline]
    pub fn read(&mut self, output: &mut [i16]) -> usize {
        let capacity = self.buffer.len();
        let to_read = output.len().min(self.len);
        let mut read_pos = self.read_pos();
        for slot in output.iter_mut().take(to_read) {
            *slot = self.buffer[read_pos];
            read_pos = (read_pos + 1) % capacity;
        }
        self.len -= to_read;
        to_read
    }

    /// Number of unread samples available.
    #[inline]
    pub fn available(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Total samples dropped since creation.
    pub fn overrun(&self) -> u64 {
        self.overrun
    }

    /// Discard unread data.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    fn read_pos(&self) -> usize {
        let capacity = self.buffer.len();
        (self.write_pos + capacity - self.len) % capacity
    }
}
