use super::{ByteStream, SequenceNumber, StreamReassembler, TcpSegment};
use log::*;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RecvError {
    #[error("received segment {0} before the connection was opened")]
    NotSynchronized(SequenceNumber),
    #[error("received segment [{0}, {1}) is outside of the current window [{2}, {3})")]
    OutOfWindow(u64, u64, u64, u64),
}

/// The receiving half of a connection: translates inbound segments into
/// stream indexes, feeds the reassembler and derives the ack number and
/// window to advertise back to the peer.
#[derive(Debug)]
pub struct TcpReceiver {
    reassembler: StreamReassembler,

    /// The peer's initial sequence number, known once its open segment arrives
    isn: Option<SequenceNumber>,

    /// The absolute sequence number the peer should send next
    next_expected: u64,
}

impl TcpReceiver {
    pub fn new(capacity: usize) -> Self {
        Self {
            reassembler: StreamReassembler::new(capacity),
            isn: None,
            next_expected: 0,
        }
    }

    pub fn segment_received(&mut self, segment: &TcpSegment) -> Result<(), RecvError> {
        let header = &segment.header;

        let isn = match self.isn {
            Some(isn) => isn,
            None if header.syn => {
                debug!("peer opened connection with isn {}", header.seqno);
                self.isn = Some(header.seqno);
                header.seqno
            }
            None => return Err(RecvError::NotSynchronized(header.seqno)),
        };

        let result = self.accept(segment, isn);
        self.next_expected = 1
            + self.stream_out().bytes_written()
            + u64::from(self.stream_out().input_ended());

        result
    }

    fn accept(&mut self, segment: &TcpSegment, isn: SequenceNumber) -> Result<(), RecvError> {
        let length = segment.length_in_sequence_space();

        if length == 0 {
            return Ok(());
        }

        let start = segment.header.seqno.unwrap(isn, self.next_expected);
        let end = start + length;
        let window_end = self.next_expected + self.window_size() as u64;

        if end <= self.next_expected || start >= window_end {
            return Err(RecvError::OutOfWindow(
                start,
                end,
                self.next_expected,
                window_end,
            ));
        }

        // The open flag occupies absolute sequence number 0, so payload bytes
        // are shifted down by one to become stream indexes
        let payload_start = start + u64::from(segment.header.syn);
        let (index, payload) = if payload_start == 0 {
            (0, segment.payload.get(1..).unwrap_or(&[]))
        } else {
            (payload_start - 1, &segment.payload[..])
        };

        self.reassembler
            .push_substring(payload, index, segment.header.fin);

        Ok(())
    }

    /// The wire ack number to advertise, absent until the peer has opened the connection
    pub fn ackno(&self) -> Option<SequenceNumber> {
        self.isn
            .map(|isn| SequenceNumber::wrap(self.next_expected, isn))
    }

    /// The number of bytes the peer may send beyond the ack number
    pub fn window_size(&self) -> usize {
        self.stream_out().remaining_capacity()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.stream_out()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.stream_out_mut()
    }
}
