use super::{
    ByteStream, ConfigError, ConnectionState, ReceiverState, SenderState, TcpConfig, TcpReceiver,
    TcpSegment, TcpSender,
};
use log::*;
use std::cmp;
use std::collections::VecDeque;

/// A full-duplex reliable connection composed of a receiver for the inbound
/// stream and a sender for the outbound stream.
///
/// The connection is driven entirely by its caller: inbound segments are fed
/// through `segment_received`, the passage of time through `tick`, and the
/// segments it produces are collected with `drain_segments_out`.
#[derive(Debug)]
pub struct TcpConnection {
    config: TcpConfig,

    receiver: TcpReceiver,

    sender: TcpSender,

    /// Segments stamped with ack and window, ready to be handed to the link
    segments_out: VecDeque<TcpSegment>,

    /// Milliseconds elapsed since the connection was created
    now: u64,

    last_received_at: u64,

    reset: bool,

    /// Whether our close segment has been handed off
    fin_sent: bool,

    /// Whether to wait after both streams finish, in case the peer
    /// retransmits its close segment because our ack was lost
    linger_after_streams_finish: bool,

    state: ConnectionState,
}

impl TcpConnection {
    pub fn new(config: TcpConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let receiver = TcpReceiver::new(config.recv_capacity());
        let sender = TcpSender::new(&config);

        Ok(Self {
            config,
            receiver,
            sender,
            segments_out: VecDeque::new(),
            now: 0,
            last_received_at: 0,
            reset: false,
            fin_sent: false,
            linger_after_streams_finish: true,
            state: ConnectionState::Listen,
        })
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Actively opens the connection by sending the open segment.
    pub fn connect(&mut self) {
        info!("opening connection with isn {}", self.sender.isn());

        self.sender.fill_window();
        self.flush_sender(false);
    }

    /// Writes as much of `data` as the outbound stream can hold, returning
    /// the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let written = self.sender.stream_in_mut().write(data);

        self.sender.fill_window();
        self.flush_sender(false);

        written
    }

    /// Signals that the application has nothing more to write.
    pub fn end_input_stream(&mut self) {
        self.sender.stream_in_mut().end_input();

        self.sender.fill_window();
        self.flush_sender(false);
    }

    /// Reads up to `len` bytes the peer has sent.
    pub fn read(&mut self, len: usize) -> Vec<u8> {
        self.receiver.stream_out_mut().read(len)
    }

    pub fn segment_received(&mut self, segment: &TcpSegment) {
        if !self.is_active() {
            debug!("ignoring segment {} on inactive connection", segment);
            return;
        }

        self.last_received_at = self.now;

        if segment.header.rst {
            warn!("connection reset by peer");
            self.poison();
            self.update_state();
            return;
        }

        if let Err(err) = self.receiver.segment_received(segment) {
            debug!("dropping segment {}: {}", segment, err);
        }

        // The peer finished before we did, so our final ack needs no wait
        if self.receiver.stream_out().input_ended() && !self.fin_sent {
            self.linger_after_streams_finish = false;
        }

        if let Some(ackno) = self.receiver.ackno() {
            if segment.header.ack {
                self.sender
                    .ack_received(segment.header.ackno, segment.header.win);
                self.sender.fill_window();
            }

            // Every segment occupying sequence space is acknowledged, as is
            // a keep-alive sitting just below our ack number
            let keep_alive = segment.length_in_sequence_space() == 0
                && segment.header.seqno + 1 == ackno;

            if segment.length_in_sequence_space() > 0 || keep_alive {
                self.sender.fill_window();

                if !self.sender.has_segments_out() {
                    self.sender.send_empty_segment();
                }
            }
        }

        self.flush_sender(false);
    }

    /// Notifies the connection of the passage of time.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        if !self.is_active() {
            return;
        }

        self.now += ms_since_last_tick;
        self.sender.tick(ms_since_last_tick);

        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts() {
            warn!(
                "giving up after {} consecutive retransmissions, resetting connection",
                self.sender.consecutive_retransmissions()
            );

            if !self.sender.has_segments_out() {
                self.sender.send_empty_segment();
            }

            self.flush_sender(true);
            self.poison();
            self.update_state();
            return;
        }

        self.flush_sender(false);
    }

    /// Abandons the connection, sending a reset to the peer if it was still
    /// active. Calling this on an inactive connection does nothing.
    pub fn shutdown(&mut self) {
        if !self.is_active() {
            return;
        }

        warn!("unclean shutdown of active connection, sending reset");

        self.sender.send_empty_segment();
        self.flush_sender(true);
        self.poison();
        self.update_state();
    }

    pub fn is_active(&self) -> bool {
        if self.reset {
            return false;
        }

        let finished = self.receiver.stream_out().input_ended()
            && self.fin_sent
            && self.sender.bytes_in_flight() == 0;

        if !finished {
            return true;
        }

        self.linger_after_streams_finish
            && self.time_since_last_segment_received() < self.config.linger_timeout()
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::resolve(
            SenderState::of(&self.sender),
            ReceiverState::of(&self.receiver),
            self.linger_after_streams_finish,
            self.is_active(),
        )
    }

    pub fn drain_segments_out(&mut self) -> Vec<TcpSegment> {
        self.segments_out.drain(..).collect()
    }

    pub fn has_segments_out(&self) -> bool {
        !self.segments_out.is_empty()
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.now - self.last_received_at
    }

    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn outbound_stream(&self) -> &ByteStream {
        self.sender.stream_in()
    }

    /// Moves every segment the sender produced into the outbound queue,
    /// stamping each with our current ack number and window.
    fn flush_sender(&mut self, rst: bool) {
        let window = cmp::min(self.receiver.window_size(), u16::MAX as usize) as u16;

        while let Some(mut segment) = self.sender.pop_segment() {
            if let Some(ackno) = self.receiver.ackno() {
                segment.header.ack = true;
                segment.header.ackno = ackno;
            }

            segment.header.win = window;
            segment.header.rst |= rst;
            self.fin_sent |= segment.header.fin;

            trace!("handing off segment {}", segment);
            self.segments_out.push_back(segment);
        }

        self.update_state();
    }

    fn poison(&mut self) {
        self.reset = true;
        self.sender.stream_in_mut().set_error();
        self.receiver.stream_out_mut().set_error();
    }

    fn update_state(&mut self) {
        let state = self.state();

        if state == self.state {
            return;
        }

        debug!("connection state changed from {} to {}", self.state, state);

        match state {
            ConnectionState::Established => info!("connection established"),
            ConnectionState::Closed => info!("connection closed cleanly"),
            _ => {}
        }

        self.state = state;
    }
}
