use super::TcpSegment;

#[derive(Debug, Clone)]
struct TimerEntry {
    /// The tick time at which the timer was (re)started
    issued_at: u64,

    /// The absolute sequence number one past the end of the segment
    index: u64,

    segment: TcpSegment,
}

/// Retransmission timers for every segment in flight, sharing one timeout.
/// Entry counts are bounded by the number of unacknowledged segments so
/// every operation is a linear scan.
#[derive(Debug)]
pub(crate) struct RetransmissionTimers {
    timeout: u64,

    entries: Vec<TimerEntry>,
}

impl RetransmissionTimers {
    pub(crate) fn new(timeout: u64) -> Self {
        Self {
            timeout,
            entries: vec![],
        }
    }

    pub(crate) fn timeout(&self) -> u64 {
        self.timeout
    }

    pub(crate) fn set_timeout(&mut self, timeout: u64) {
        self.timeout = timeout;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn arm(&mut self, now: u64, index: u64, segment: TcpSegment) {
        self.entries.push(TimerEntry {
            issued_at: now,
            index,
            segment,
        });
    }

    /// Removes every timer whose index is at or before `index`.
    /// Returns whether any timer was removed.
    pub(crate) fn cancel_up_to(&mut self, index: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.index > index);

        self.entries.len() != before
    }

    /// Removes and returns the expired timer with the lowest index, if any.
    pub(crate) fn take_expired_lowest(&mut self, now: u64) -> Option<(u64, TcpSegment)> {
        let timeout = self.timeout;

        let position = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| now.saturating_sub(entry.issued_at) >= timeout)
            .min_by_key(|(_, entry)| entry.index)
            .map(|(position, _)| position)?;

        let entry = self.entries.remove(position);

        Some((entry.index, entry.segment))
    }

    pub(crate) fn restart_all(&mut self, now: u64) {
        for entry in self.entries.iter_mut() {
            entry.issued_at = now;
        }
    }

    /// Restarts every timer apart from the one with the lowest index, which
    /// keeps counting towards its retransmission.
    pub(crate) fn restart_all_except_lowest(&mut self, now: u64) {
        let lowest = match self.entries.iter().map(|entry| entry.index).min() {
            Some(lowest) => lowest,
            None => return,
        };

        for entry in self.entries.iter_mut().filter(|entry| entry.index != lowest) {
            entry.issued_at = now;
        }
    }
}
