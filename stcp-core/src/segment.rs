use super::SequenceNumber;
use std::fmt;

/// The header fields of a segment which the transport engine reads and writes.
/// Encoding these onto the wire is the concern of the layer beneath.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct TcpHeader {
    /// The sequence number of the first unit (open flag or payload byte) in the segment
    pub seqno: SequenceNumber,

    /// The next sequence number the sender of this segment expects to receive.
    /// Only meaningful when `ack` is set.
    pub ackno: SequenceNumber,

    /// Open control flag, consumes one unit of sequence space
    pub syn: bool,

    pub ack: bool,

    /// Close control flag, consumes one unit of sequence space
    pub fin: bool,

    /// Abort the connection
    pub rst: bool,

    /// The amount of available space in the sender's receive buffer
    pub win: u16,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct TcpSegment {
    pub header: TcpHeader,

    pub payload: Vec<u8>,
}

impl TcpSegment {
    pub fn new(seqno: SequenceNumber, payload: &[u8]) -> Self {
        Self {
            header: TcpHeader {
                seqno,
                ..TcpHeader::default()
            },
            payload: payload.to_vec(),
        }
    }

    pub fn syn(seqno: SequenceNumber) -> Self {
        Self::new(seqno, &[]).with_syn()
    }

    pub fn with_syn(mut self) -> Self {
        self.header.syn = true;

        self
    }

    pub fn with_fin(mut self) -> Self {
        self.header.fin = true;

        self
    }

    pub fn with_rst(mut self) -> Self {
        self.header.rst = true;

        self
    }

    pub fn with_ack(mut self, ackno: SequenceNumber, win: u16) -> Self {
        self.header.ack = true;
        self.header.ackno = ackno;
        self.header.win = win;

        self
    }

    /// The number of sequence numbers occupied by the segment.
    /// The open and close flags each count as one.
    pub fn length_in_sequence_space(&self) -> u64 {
        self.payload.len() as u64 + u64::from(self.header.syn) + u64::from(self.header.fin)
    }
}

impl fmt::Display for TcpSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;

        write!(f, "[seq: {}", h.seqno)?;
        if h.syn {
            write!(f, " SYN")?;
        }
        if h.fin {
            write!(f, " FIN")?;
        }
        if h.rst {
            write!(f, " RST")?;
        }
        if h.ack {
            write!(f, " ack: {} win: {}", h.ackno, h.win)?;
        }

        write!(f, " len: {}]", self.payload.len())
    }
}
