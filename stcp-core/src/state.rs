use super::{TcpReceiver, TcpSender};
use std::fmt;

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum SenderState {
    /// Nothing has been sent yet
    Closed,
    /// The open segment is in flight and unacknowledged
    SynSent,
    SynAcked,
    /// The close segment is in flight and unacknowledged
    FinSent,
    FinAcked,
    Error,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum ReceiverState {
    /// Waiting for the peer's open segment
    Listen,
    SynReceived,
    /// The peer's whole stream has been reassembled
    FinReceived,
    Error,
}

/// The classic TCP connection state, derived from the sender and receiver
/// states rather than tracked separately.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum ConnectionState {
    Listen,
    SynSent,
    SynReceived,
    Established,
    CloseWait,
    LastAck,
    FinWait1,
    FinWait2,
    Closing,
    TimeWait,
    Closed,
    Reset,
}

impl SenderState {
    pub fn of(sender: &TcpSender) -> Self {
        let stream = sender.stream_in();

        if stream.error() {
            return SenderState::Error;
        }

        if sender.next_seqno_absolute() == 0 {
            return SenderState::Closed;
        }

        if sender.next_seqno_absolute() == sender.bytes_in_flight() {
            return SenderState::SynSent;
        }

        if !sender.fin_sent() {
            return SenderState::SynAcked;
        }

        if sender.bytes_in_flight() > 0 {
            SenderState::FinSent
        } else {
            SenderState::FinAcked
        }
    }
}

impl ReceiverState {
    pub fn of(receiver: &TcpReceiver) -> Self {
        if receiver.stream_out().error() {
            ReceiverState::Error
        } else if receiver.ackno().is_none() {
            ReceiverState::Listen
        } else if receiver.stream_out().input_ended() {
            ReceiverState::FinReceived
        } else {
            ReceiverState::SynReceived
        }
    }
}

impl ConnectionState {
    /// Resolves the connection state from its parts. `linger` is whether the
    /// connection will linger after both streams finish and `active` whether
    /// it is still live.
    pub fn resolve(sender: SenderState, receiver: ReceiverState, linger: bool, active: bool) -> Self {
        use ConnectionState::*;

        match (receiver, sender) {
            (ReceiverState::Error, _) | (_, SenderState::Error) => Reset,
            (ReceiverState::Listen, SenderState::Closed) => Listen,
            (ReceiverState::Listen, _) => SynSent,
            (ReceiverState::SynReceived, SenderState::Closed)
            | (ReceiverState::SynReceived, SenderState::SynSent) => SynReceived,
            (ReceiverState::SynReceived, SenderState::SynAcked) => Established,
            (ReceiverState::SynReceived, SenderState::FinSent) => FinWait1,
            (ReceiverState::SynReceived, SenderState::FinAcked) => FinWait2,
            (ReceiverState::FinReceived, SenderState::Closed)
            | (ReceiverState::FinReceived, SenderState::SynSent)
            | (ReceiverState::FinReceived, SenderState::SynAcked) => CloseWait,
            (ReceiverState::FinReceived, SenderState::FinSent) if linger => Closing,
            (ReceiverState::FinReceived, SenderState::FinSent) => LastAck,
            (ReceiverState::FinReceived, SenderState::FinAcked) if active => TimeWait,
            (ReceiverState::FinReceived, SenderState::FinAcked) => Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Listen => "LISTEN",
            ConnectionState::SynSent => "SYN_SENT",
            ConnectionState::SynReceived => "SYN_RCVD",
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::CloseWait => "CLOSE_WAIT",
            ConnectionState::LastAck => "LAST_ACK",
            ConnectionState::FinWait1 => "FIN_WAIT_1",
            ConnectionState::FinWait2 => "FIN_WAIT_2",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::TimeWait => "TIME_WAIT",
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Reset => "RESET",
        };

        write!(f, "{}", name)
    }
}
