use super::{TcpConfig, TcpConnection, TcpSegment};
use anyhow::Result;
use log::*;

/// The capability to deliver a segment towards the peer
pub trait SegmentSink {
    fn send_segment(&mut self, segment: TcpSegment) -> Result<()>;
}

/// Drives a connection on behalf of its owner, forwarding every segment the
/// connection produces into the sink as soon as it is produced.
pub struct ConnectionOrchestrator<S: SegmentSink> {
    con: TcpConnection,
    sink: S,
}

impl<S: SegmentSink> ConnectionOrchestrator<S> {
    pub fn new(config: TcpConfig, sink: S) -> Result<Self> {
        Ok(Self {
            con: TcpConnection::new(config)?,
            sink,
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        self.con.connect();
        self.flush()
    }

    /// Handles a segment arriving from the network
    pub fn handle_recv_segment(&mut self, segment: &TcpSegment) -> Result<()> {
        self.con.segment_received(segment);
        self.flush()
    }

    pub fn handle_tick(&mut self, ms_since_last_tick: u64) -> Result<()> {
        self.con.tick(ms_since_last_tick);
        self.flush()
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let written = self.con.write(data);
        self.flush()?;

        Ok(written)
    }

    pub fn end_input(&mut self) -> Result<()> {
        self.con.end_input_stream();
        self.flush()
    }

    pub fn read(&mut self, len: usize) -> Vec<u8> {
        self.con.read(len)
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.con.shutdown();
        self.flush()
    }

    pub fn connection(&self) -> &TcpConnection {
        &self.con
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn flush(&mut self) -> Result<()> {
        for segment in self.con.drain_segments_out() {
            if let Err(err) = self.sink.send_segment(segment) {
                error!("failed to send segment: {}", err);
                return Err(err);
            }
        }

        Ok(())
    }
}
