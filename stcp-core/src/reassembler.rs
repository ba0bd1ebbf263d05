use super::ByteStream;
use log::*;
use std::cmp;
use std::collections::BTreeMap;

/// Accepts possibly overlapping, out of order substrings of a byte stream
/// and writes them, in order and exactly once, into the output `ByteStream`.
#[derive(Debug)]
pub struct StreamReassembler {
    output: ByteStream,

    /// Substrings which cannot be written yet due to gaps in the stream,
    /// keyed by stream index. Ranges are kept disjoint and non-adjacent.
    pending: BTreeMap<u64, Vec<u8>>,

    /// The stream index of the next byte the output is waiting for
    next_index: u64,

    /// The stream index one past the final byte, once the last substring is known
    end_index: Option<u64>,
}

impl StreamReassembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            output: ByteStream::new(capacity),
            pending: BTreeMap::new(),
            next_index: 0,
            end_index: None,
        }
    }

    /// Records the substring `data` starting at stream index `index`.
    /// Bytes already written, bytes past the end of the stream and bytes
    /// beyond what the output stream could currently accept are discarded.
    pub fn push_substring(&mut self, data: &[u8], index: u64, eof: bool) {
        let data_end = index + data.len() as u64;

        if eof {
            self.end_index = Some(data_end);
            self.discard_beyond(data_end);
        }

        let window_end = self.next_index + self.output.remaining_capacity() as u64;
        let start = cmp::max(index, self.next_index);
        let end = cmp::min(
            cmp::min(data_end, window_end),
            self.end_index.unwrap_or(u64::MAX),
        );

        if start < end {
            let offset = (start - index) as usize;
            let len = (end - start) as usize;
            self.store(start, &data[offset..offset + len]);
        } else if !data.is_empty() {
            trace!(
                "discarding substring [{}, {}) outside of window [{}, {})",
                index,
                data_end,
                self.next_index,
                window_end
            );
        }

        self.assemble();
    }

    /// Drops every pending byte at or beyond the end of the stream.
    fn discard_beyond(&mut self, end_index: u64) {
        self.pending.retain(|idx, _| *idx < end_index);

        for (idx, bytes) in self.pending.iter_mut() {
            bytes.truncate((end_index - idx) as usize);
        }
    }

    /// Merges `data` into the pending ranges, coalescing with every range it
    /// overlaps or touches.
    fn store(&mut self, start: u64, data: &[u8]) {
        let end = start + data.len() as u64;

        let touching = self
            .pending
            .range(..=end)
            .filter(|(idx, bytes)| **idx + bytes.len() as u64 >= start)
            .map(|(idx, _)| *idx)
            .collect::<Vec<u64>>();

        let mut merged_start = start;
        let mut merged_end = end;

        for idx in touching.iter() {
            let len = self.pending[idx].len() as u64;
            merged_start = cmp::min(merged_start, *idx);
            merged_end = cmp::max(merged_end, idx + len);
        }

        let mut merged = vec![0u8; (merged_end - merged_start) as usize];

        for idx in touching {
            if let Some(bytes) = self.pending.remove(&idx) {
                let offset = (idx - merged_start) as usize;
                merged[offset..offset + bytes.len()].copy_from_slice(&bytes);
            }
        }

        let offset = (start - merged_start) as usize;
        merged[offset..offset + data.len()].copy_from_slice(data);

        self.pending.insert(merged_start, merged);
    }

    fn assemble(&mut self) {
        while let Some(bytes) = self.pending.remove(&self.next_index) {
            let written = self.output.write(&bytes);
            self.next_index += written as u64;

            // Stored bytes always fit, so only an errored stream refuses them
            if written < bytes.len() {
                debug!(
                    "discarding {} unassembled bytes refused by the output",
                    bytes.len() - written + self.unassembled_bytes()
                );
                self.pending.clear();
                break;
            }
        }

        if let Some(end_index) = self.end_index {
            if self.next_index >= end_index && !self.output.input_ended() {
                debug!("reassembled final byte of stream at index {}", end_index);
                self.output.end_input();
            }
        }
    }

    /// The number of bytes stored but not yet written to the output
    pub fn unassembled_bytes(&self) -> usize {
        self.pending.values().map(|bytes| bytes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.output.buffer_empty()
    }

    pub fn stream_out(&self) -> &ByteStream {
        &self.output
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }
}
