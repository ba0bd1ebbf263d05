use super::SequenceNumber;
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 64000; // bytes
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1000; // bytes
pub const DEFAULT_RT_TIMEOUT: u64 = 1000; // ms
pub const DEFAULT_MAX_RETX_ATTEMPTS: u32 = 8;
pub const DEFAULT_LINGER_MULTIPLIER: u64 = 10;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} capacity must be greater than zero")]
    ZeroCapacity(&'static str),
    #[error("max payload size must be greater than zero")]
    ZeroPayloadSize,
    #[error("max payload size {0} does not fit in a 16-bit window")]
    PayloadExceedsWindowField(usize),
    #[error("retransmission timeout must be greater than zero")]
    ZeroTimeout,
    #[error("linger multiplier must be greater than zero")]
    ZeroLingerMultiplier,
}

#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// The capacity of the outbound byte stream written by the application
    send_capacity: usize,

    /// The capacity of the inbound byte stream, which bounds the advertised window
    recv_capacity: usize,

    /// The largest payload carried by a single segment
    max_payload_size: usize,

    /// The initial retransmission timeout in milliseconds
    rt_timeout: u64,

    /// The number of consecutive retransmissions tolerated before the connection is reset
    max_retx_attempts: u32,

    /// Use this initial sequence number instead of a random one
    fixed_isn: Option<SequenceNumber>,

    /// How many initial retransmission timeouts to linger for after a clean close
    linger_multiplier: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            send_capacity: DEFAULT_CAPACITY,
            recv_capacity: DEFAULT_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            rt_timeout: DEFAULT_RT_TIMEOUT,
            max_retx_attempts: DEFAULT_MAX_RETX_ATTEMPTS,
            fixed_isn: None,
            linger_multiplier: DEFAULT_LINGER_MULTIPLIER,
        }
    }
}

impl TcpConfig {
    pub fn send_capacity(&self) -> usize {
        self.send_capacity
    }

    pub fn with_send_capacity(mut self, value: usize) -> Self {
        self.send_capacity = value;

        self
    }

    pub fn recv_capacity(&self) -> usize {
        self.recv_capacity
    }

    pub fn with_recv_capacity(mut self, value: usize) -> Self {
        self.recv_capacity = value;

        self
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    pub fn with_max_payload_size(mut self, value: usize) -> Self {
        self.max_payload_size = value;

        self
    }

    pub fn rt_timeout(&self) -> u64 {
        self.rt_timeout
    }

    pub fn with_rt_timeout(mut self, value: u64) -> Self {
        self.rt_timeout = value;

        self
    }

    pub fn max_retx_attempts(&self) -> u32 {
        self.max_retx_attempts
    }

    pub fn with_max_retx_attempts(mut self, value: u32) -> Self {
        self.max_retx_attempts = value;

        self
    }

    pub fn fixed_isn(&self) -> Option<SequenceNumber> {
        self.fixed_isn
    }

    pub fn with_fixed_isn(mut self, value: SequenceNumber) -> Self {
        self.fixed_isn = Some(value);

        self
    }

    pub fn linger_multiplier(&self) -> u64 {
        self.linger_multiplier
    }

    pub fn with_linger_multiplier(mut self, value: u64) -> Self {
        self.linger_multiplier = value;

        self
    }

    /// The time a cleanly closed connection waits for a final retransmission from the peer
    pub fn linger_timeout(&self) -> u64 {
        self.linger_multiplier * self.rt_timeout
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("send"));
        }

        if self.recv_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("recv"));
        }

        if self.max_payload_size == 0 {
            return Err(ConfigError::ZeroPayloadSize);
        }

        if self.max_payload_size > u16::MAX as usize {
            return Err(ConfigError::PayloadExceedsWindowField(self.max_payload_size));
        }

        if self.rt_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.linger_multiplier == 0 {
            return Err(ConfigError::ZeroLingerMultiplier);
        }

        Ok(())
    }
}
