use log::*;
use std::cmp;
use std::collections::VecDeque;

/// A bounded, in-memory FIFO of bytes with a writer side and a reader side.
///
/// Writes are truncated to the remaining capacity rather than blocking,
/// which makes the remaining capacity the flow control signal that is
/// advertised to the peer as the receive window.
#[derive(Debug)]
pub struct ByteStream {
    buff: VecDeque<u8>,

    capacity: usize,

    /// Set once the writer has signalled that no more bytes will follow
    input_ended: bool,

    /// Permanently poisons the stream once set
    error: bool,

    bytes_written: u64,

    bytes_read: u64,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            buff: VecDeque::with_capacity(capacity),
            capacity,
            input_ended: false,
            error: false,
            bytes_written: 0,
            bytes_read: 0,
        }
    }

    /// Writes as many bytes from `data` as fit, returning how many were accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.error || self.input_ended {
            if !data.is_empty() {
                warn!("discarding write of {} bytes to a closed stream", data.len());
            }
            return 0;
        }

        let len = cmp::min(data.len(), self.remaining_capacity());
        self.buff.extend(&data[..len]);
        self.bytes_written += len as u64;

        len
    }

    /// Copies up to `len` bytes from the front of the buffer without consuming them.
    pub fn peek_output(&self, len: usize) -> Vec<u8> {
        let len = cmp::min(len, self.buff.len());
        self.buff.iter().take(len).copied().collect()
    }

    /// Discards up to `len` bytes from the front of the buffer.
    pub fn pop_output(&mut self, len: usize) {
        let len = cmp::min(len, self.buff.len());
        self.buff.drain(..len);
        self.bytes_read += len as u64;
    }

    pub fn read(&mut self, len: usize) -> Vec<u8> {
        let data = self.peek_output(len);
        self.pop_output(data.len());

        data
    }

    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn buffer_size(&self) -> usize {
        self.buff.len()
    }

    pub fn buffer_empty(&self) -> bool {
        self.buff.is_empty()
    }

    /// Whether the writer has ended input and the reader has consumed every byte
    pub fn eof(&self) -> bool {
        self.input_ended && self.buff.is_empty()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buff.len()
    }
}
