use super::{ByteStream, RetransmissionTimers, SequenceNumber, TcpConfig, TcpSegment};
use log::*;
use std::cmp;
use std::collections::VecDeque;

/// The sending half of a connection: segments the outbound byte stream,
/// paces segments against the peer's advertised window and retransmits
/// unacknowledged segments with exponential backoff.
#[derive(Debug)]
pub struct TcpSender {
    /// Our initial sequence number, carried by the open segment
    isn: SequenceNumber,

    /// Segments produced but not yet handed off to the connection
    segments_out: VecDeque<TcpSegment>,

    stream: ByteStream,

    timers: RetransmissionTimers,

    max_payload_size: usize,

    initial_rto: u64,

    /// The current retransmission timeout, doubled on every expiry
    rto: u64,

    /// Milliseconds elapsed since the sender was created
    now: u64,

    /// The absolute sequence number of the next unit to be sent
    next_seqno: u64,

    /// The highest absolute ack number accepted from the peer
    ack_seqno: u64,

    consecutive_retransmissions: u32,

    /// The room left in the peer's window, unknown until the first ack
    window: Option<u64>,

    /// Whether the peer last advertised a window of zero
    zero_window: bool,

    syn_sent: bool,

    fin_sent: bool,
}

impl TcpSender {
    pub fn new(config: &TcpConfig) -> Self {
        let isn = config
            .fixed_isn()
            .unwrap_or_else(|| SequenceNumber(rand::random()));

        Self {
            isn,
            segments_out: VecDeque::new(),
            stream: ByteStream::new(config.send_capacity()),
            timers: RetransmissionTimers::new(config.rt_timeout()),
            max_payload_size: config.max_payload_size(),
            initial_rto: config.rt_timeout(),
            rto: config.rt_timeout(),
            now: 0,
            next_seqno: 0,
            ack_seqno: 0,
            consecutive_retransmissions: 0,
            window: None,
            zero_window: false,
            syn_sent: false,
            fin_sent: false,
        }
    }

    /// Sends as many segments as the peer's window and the outbound stream permit.
    pub fn fill_window(&mut self) {
        if !self.syn_sent {
            self.syn_sent = true;
            self.send_segment(TcpSegment::syn(self.next_seqno()));
        }

        let mut window = match self.window {
            Some(window) => window,
            None => return,
        };

        while window > 0
            && (!self.stream.buffer_empty() || (self.stream.input_ended() && !self.fin_sent))
        {
            let len = cmp::min(
                window as usize,
                cmp::min(self.stream.buffer_size(), self.max_payload_size),
            );
            let payload = self.stream.read(len);

            let mut segment = TcpSegment::new(self.next_seqno(), &payload);

            // The close flag needs its own unit of window beyond the payload
            if self.stream.eof() && window > len as u64 {
                segment.header.fin = true;
                self.fin_sent = true;
            }

            if segment.length_in_sequence_space() == 0 {
                break;
            }

            window -= segment.length_in_sequence_space();
            self.send_segment(segment);
        }

        self.window = Some(window);
    }

    fn send_segment(&mut self, segment: TcpSegment) {
        self.next_seqno += segment.length_in_sequence_space();
        self.timers.arm(self.now, self.next_seqno, segment.clone());

        trace!("queued segment {}", segment);
        self.segments_out.push_back(segment);
    }

    /// Processes an acknowledgement from the peer.
    /// Returns whether any new data was acknowledged.
    pub fn ack_received(&mut self, ackno: SequenceNumber, window_size: u16) -> bool {
        let ack_seqno = ackno.unwrap(self.isn, self.next_seqno);

        if ack_seqno > self.next_seqno {
            debug!(
                "ignoring ack {} beyond next sequence number {}",
                ack_seqno, self.next_seqno
            );
            return false;
        }

        let acknowledged = self.timers.cancel_up_to(ack_seqno);

        if acknowledged {
            self.timers.restart_all(self.now);
        } else {
            self.timers.restart_all_except_lowest(self.now);
        }

        if acknowledged || ack_seqno == self.ack_seqno {
            self.ack_seqno = ack_seqno;
            self.zero_window = window_size == 0;

            // A zero window is treated as a single unit so that a probe can
            // discover when it reopens
            let advertised = cmp::max(u64::from(window_size), 1);
            self.window = Some(advertised.saturating_sub(self.bytes_in_flight()));

            self.rto = self.initial_rto;
            self.timers.set_timeout(self.rto);
            self.consecutive_retransmissions = 0;
        }

        acknowledged
    }

    /// Notifies the sender of the passage of time.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.now += ms_since_last_tick;

        let (index, segment) = match self.timers.take_expired_lowest(self.now) {
            Some(expired) => expired,
            None => return,
        };

        debug!(
            "retransmitting segment {} after {}ms ({} segments outstanding)",
            segment,
            self.timers.timeout(),
            self.timers.len() + 1
        );
        self.segments_out.push_back(segment.clone());
        self.timers.arm(self.now, index, segment);

        // Only back off when the peer is unresponsive, not when it is
        // simply advertising a closed window
        if !self.zero_window {
            self.rto *= 2;
            self.timers.set_timeout(self.rto);
            self.consecutive_retransmissions += 1;
        }

        self.timers.restart_all(self.now);
    }

    /// Queues a segment occupying no sequence space, used to carry an ack or
    /// window update. It is never retransmitted.
    pub fn send_empty_segment(&mut self) {
        self.segments_out
            .push_back(TcpSegment::new(self.next_seqno(), &[]));
    }

    pub fn pop_segment(&mut self) -> Option<TcpSegment> {
        self.segments_out.pop_front()
    }

    pub fn has_segments_out(&self) -> bool {
        !self.segments_out.is_empty()
    }

    /// The number of sequence numbers sent but not yet acknowledged
    pub fn bytes_in_flight(&self) -> u64 {
        self.next_seqno - self.ack_seqno
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retransmissions
    }

    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> SequenceNumber {
        SequenceNumber::wrap(self.next_seqno, self.isn)
    }

    pub fn isn(&self) -> SequenceNumber {
        self.isn
    }

    pub fn rto(&self) -> u64 {
        self.rto
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISN: SequenceNumber = SequenceNumber(1000);

    fn init_sender(rt_timeout: u64) -> TcpSender {
        let config = TcpConfig::default()
            .with_fixed_isn(ISN)
            .with_rt_timeout(rt_timeout);

        TcpSender::new(&config)
    }

    fn drain(sender: &mut TcpSender) -> Vec<TcpSegment> {
        let mut segments = vec![];
        while let Some(segment) = sender.pop_segment() {
            segments.push(segment);
        }
        segments
    }

    /// Returns a sender whose SYN has been acknowledged with the given window
    fn init_established(rt_timeout: u64, window: u16) -> TcpSender {
        let mut sender = init_sender(rt_timeout);
        sender.fill_window();
        drain(&mut sender);
        sender.ack_received(ISN + 1, window);
        sender
    }

    #[test]
    fn test_first_segment_is_syn() {
        let mut sender = init_sender(1000);

        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments, vec![TcpSegment::syn(ISN)]);
        assert_eq!(sender.next_seqno_absolute(), 1);
        assert_eq!(sender.bytes_in_flight(), 1);
    }

    #[test]
    fn test_syn_is_only_sent_once() {
        let mut sender = init_sender(1000);

        sender.fill_window();
        sender.fill_window();

        assert_eq!(drain(&mut sender).len(), 1);
    }

    #[test]
    fn test_ack_of_syn_clears_flight() {
        let sender = init_established(1000, 1000);

        assert_eq!(sender.bytes_in_flight(), 0);
        assert_eq!(sender.next_seqno(), ISN + 1);
    }

    #[test]
    fn test_data_is_segmented_by_payload_size() {
        let config = TcpConfig::default()
            .with_fixed_isn(ISN)
            .with_max_payload_size(3);
        let mut sender = TcpSender::new(&config);
        sender.fill_window();
        drain(&mut sender);
        sender.ack_received(ISN + 1, 1000);

        sender.stream_in_mut().write(b"abcdefg");
        sender.fill_window();

        let payloads = drain(&mut sender)
            .into_iter()
            .map(|segment| segment.payload)
            .collect::<Vec<Vec<u8>>>();
        assert_eq!(payloads, vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]);
        assert_eq!(sender.bytes_in_flight(), 7);
    }

    #[test]
    fn test_window_limits_bytes_in_flight() {
        let mut sender = init_established(1000, 4);

        sender.stream_in_mut().write(b"abcdefgh");
        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload, b"abcd".to_vec());
        assert_eq!(sender.bytes_in_flight(), 4);

        // A partial ack does not complete the segment, so the window stays closed
        sender.ack_received(ISN + 3, 4);
        sender.fill_window();
        assert_eq!(drain(&mut sender).len(), 0);

        sender.ack_received(ISN + 5, 2);
        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].header.seqno, ISN + 5);
        assert_eq!(segments[0].payload, b"ef".to_vec());
        assert_eq!(sender.bytes_in_flight(), 2);
    }

    #[test]
    fn test_zero_payload_size_sends_nothing() {
        let config = TcpConfig::default()
            .with_fixed_isn(ISN)
            .with_max_payload_size(0);
        let mut sender = TcpSender::new(&config);
        sender.fill_window();
        drain(&mut sender);
        sender.ack_received(ISN + 1, 1000);

        sender.stream_in_mut().write(b"abc");
        sender.fill_window();

        assert_eq!(drain(&mut sender).len(), 0);
        assert_eq!(sender.bytes_in_flight(), 0);
        assert_eq!(sender.stream_in().buffer_size(), 3);
    }

    #[test]
    fn test_fin_piggybacks_when_window_allows() {
        let mut sender = init_established(1000, 10);

        sender.stream_in_mut().write(b"abc");
        sender.stream_in_mut().end_input();
        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload, b"abc".to_vec());
        assert_eq!(segments[0].header.fin, true);
        assert_eq!(sender.fin_sent(), true);
        assert_eq!(sender.bytes_in_flight(), 4);
    }

    #[test]
    fn test_fin_waits_for_window_room() {
        let mut sender = init_established(1000, 3);

        sender.stream_in_mut().write(b"abc");
        sender.stream_in_mut().end_input();
        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].header.fin, false);

        sender.ack_received(ISN + 4, 3);
        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments, vec![TcpSegment::new(ISN + 4, &[]).with_fin()]);
        assert_eq!(sender.next_seqno_absolute(), 5);
    }

    #[test]
    fn test_nothing_sent_after_fin() {
        let mut sender = init_established(1000, 10);

        sender.stream_in_mut().end_input();
        sender.fill_window();
        sender.fill_window();

        assert_eq!(drain(&mut sender).len(), 1);
    }

    #[test]
    fn test_ack_beyond_next_seqno_is_ignored() {
        let mut sender = init_sender(1000);
        sender.fill_window();
        drain(&mut sender);

        assert_eq!(sender.ack_received(ISN + 2, 1000), false);
        assert_eq!(sender.bytes_in_flight(), 1);
    }

    #[test]
    fn test_retransmission_after_timeout() {
        let mut sender = init_established(1000, 1000);

        sender.stream_in_mut().write(b"abc");
        sender.fill_window();
        let sent = drain(&mut sender);

        sender.tick(999);
        assert_eq!(drain(&mut sender).len(), 0);

        sender.tick(1);
        assert_eq!(drain(&mut sender), sent);
        assert_eq!(sender.consecutive_retransmissions(), 1);
        assert_eq!(sender.rto(), 2000);
    }

    #[test]
    fn test_exponential_backoff_and_reset() {
        let mut sender = init_established(100, 1000);

        sender.stream_in_mut().write(b"abc");
        sender.fill_window();
        drain(&mut sender);

        let mut expected_rto = 100;
        for k in 1..=5 {
            sender.tick(expected_rto - 1);
            assert_eq!(drain(&mut sender).len(), 0);

            sender.tick(1);
            assert_eq!(drain(&mut sender).len(), 1);

            expected_rto *= 2;
            assert_eq!(sender.rto(), expected_rto);
            assert_eq!(sender.consecutive_retransmissions(), k);
        }

        assert_eq!(sender.ack_received(ISN + 4, 1000), true);
        assert_eq!(sender.rto(), 100);
        assert_eq!(sender.consecutive_retransmissions(), 0);
        assert_eq!(sender.bytes_in_flight(), 0);
    }

    #[test]
    fn test_lowest_segment_is_retransmitted_first() {
        let config = TcpConfig::default()
            .with_fixed_isn(ISN)
            .with_max_payload_size(2)
            .with_rt_timeout(100);
        let mut sender = TcpSender::new(&config);
        sender.fill_window();
        drain(&mut sender);
        sender.ack_received(ISN + 1, 1000);

        sender.stream_in_mut().write(b"abcd");
        sender.fill_window();
        let sent = drain(&mut sender);
        assert_eq!(sent.len(), 2);

        sender.tick(100);

        assert_eq!(drain(&mut sender), vec![sent[0].clone()]);
    }

    #[test]
    fn test_partial_ack_keeps_oldest_timer_running() {
        let config = TcpConfig::default()
            .with_fixed_isn(ISN)
            .with_max_payload_size(2)
            .with_rt_timeout(100);
        let mut sender = TcpSender::new(&config);
        sender.fill_window();
        drain(&mut sender);
        sender.ack_received(ISN + 1, 1000);

        sender.stream_in_mut().write(b"abcd");
        sender.fill_window();
        let sent = drain(&mut sender);

        sender.tick(60);
        // acknowledges half of the first segment, which does not complete it
        assert_eq!(sender.ack_received(ISN + 2, 1000), false);
        sender.tick(40);

        assert_eq!(drain(&mut sender), vec![sent[0].clone()]);
    }

    #[test]
    fn test_zero_window_allows_single_probe() {
        let mut sender = init_established(100, 0);

        sender.stream_in_mut().write(b"abc");
        sender.fill_window();

        let segments = drain(&mut sender);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].payload, b"a".to_vec());
        assert_eq!(sender.bytes_in_flight(), 1);

        // Repeated zero window acks must not release another probe
        sender.ack_received(ISN + 1, 0);
        sender.fill_window();
        assert_eq!(drain(&mut sender).len(), 0);
        assert_eq!(sender.bytes_in_flight(), 1);
    }

    #[test]
    fn test_zero_window_probe_does_not_back_off() {
        let mut sender = init_established(100, 0);

        sender.stream_in_mut().write(b"abc");
        sender.fill_window();
        let probe = drain(&mut sender);

        sender.tick(100);
        assert_eq!(drain(&mut sender), probe);
        assert_eq!(sender.rto(), 100);
        assert_eq!(sender.consecutive_retransmissions(), 0);

        sender.tick(100);
        assert_eq!(drain(&mut sender), probe);
        assert_eq!(sender.consecutive_retransmissions(), 0);
    }

    #[test]
    fn test_send_empty_segment_occupies_no_sequence_space() {
        let mut sender = init_established(100, 1000);

        sender.send_empty_segment();

        assert_eq!(drain(&mut sender), vec![TcpSegment::new(ISN + 1, &[])]);
        assert_eq!(sender.bytes_in_flight(), 0);

        sender.tick(1000);
        assert_eq!(drain(&mut sender).len(), 0);
    }

    #[test]
    fn test_syn_retransmits_without_ack() {
        let mut sender = init_sender(100);
        sender.fill_window();
        let syn = drain(&mut sender);

        sender.tick(100);
        assert_eq!(drain(&mut sender), syn);
        assert_eq!(sender.consecutive_retransmissions(), 1);
    }
}
