use super::{ConnectionOrchestrator, SegmentSink, TcpSegment};
use anyhow::{Error, Result};
use log::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// An in-memory link which queues segments for delivery, optionally dropping
/// a deterministic pseudo-random fraction of them.
#[derive(Debug)]
pub struct LossyLink {
    queue: VecDeque<TcpSegment>,
    loss_rate: f64,
    rng: StdRng,
    dropped: usize,
}

impl LossyLink {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            loss_rate: 0.0,
            rng: StdRng::seed_from_u64(0),
            dropped: 0,
        }
    }

    pub fn with_loss(loss_rate: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&loss_rate) {
            return Err(Error::msg(format!(
                "loss rate must be between 0 and 1, got {}",
                loss_rate
            )));
        }

        Ok(Self {
            queue: VecDeque::new(),
            loss_rate,
            rng: StdRng::seed_from_u64(seed),
            dropped: 0,
        })
    }

    pub fn pop(&mut self) -> Option<TcpSegment> {
        self.queue.pop_front()
    }

    pub fn drain(&mut self) -> Vec<TcpSegment> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The number of segments lost so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl Default for LossyLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentSink for LossyLink {
    fn send_segment(&mut self, segment: TcpSegment) -> Result<()> {
        if self.loss_rate > 0.0 && self.rng.gen_bool(self.loss_rate) {
            trace!("link dropped segment {}", segment);
            self.dropped += 1;
            return Ok(());
        }

        self.queue.push_back(segment);
        Ok(())
    }
}

/// Delivers every segment queued on `from`'s link to `to`.
/// Returns the number of segments delivered.
pub fn deliver(
    from: &mut ConnectionOrchestrator<LossyLink>,
    to: &mut ConnectionOrchestrator<LossyLink>,
) -> Result<usize> {
    let segments = from.sink_mut().drain();

    for segment in segments.iter() {
        to.handle_recv_segment(segment)?;
    }

    Ok(segments.len())
}
