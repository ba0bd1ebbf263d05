use anyhow::{Error, Result};
use stcp_core::*;
use std::sync::Once;

static INIT: Once = Once::new();

pub const CLIENT_ISN: SequenceNumber = SequenceNumber(1000);
pub const SERVER_ISN: SequenceNumber = SequenceNumber(5000);

pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A client and server joined by a pair of in-memory links
pub struct Pair {
    pub client: ConnectionOrchestrator<LossyLink>,
    pub server: ConnectionOrchestrator<LossyLink>,
    pub elapsed: u64,
}

pub fn init_pair(config: TcpConfig) -> Pair {
    init_lossy_pair(config, 0.0, 0).unwrap()
}

pub fn init_lossy_pair(config: TcpConfig, loss_rate: f64, seed: u64) -> Result<Pair> {
    init_logger();

    let client = ConnectionOrchestrator::new(
        config.clone().with_fixed_isn(CLIENT_ISN),
        LossyLink::with_loss(loss_rate, seed)?,
    )?;
    let server = ConnectionOrchestrator::new(
        config.with_fixed_isn(SERVER_ISN),
        LossyLink::with_loss(loss_rate, seed.wrapping_add(1))?,
    )?;

    Ok(Pair {
        client,
        server,
        elapsed: 0,
    })
}

/// Returns a pair which has completed its handshake over lossless links
pub fn init_connected_pair(config: TcpConfig) -> Pair {
    let mut pair = init_pair(config);

    pair.client.connect().unwrap();
    pair.exchange().unwrap();

    assert_eq!(pair.client.connection().state(), ConnectionState::Established);
    assert_eq!(pair.server.connection().state(), ConnectionState::Established);

    pair
}

impl Pair {
    /// Delivers segments in both directions until neither side has anything more to say
    pub fn exchange(&mut self) -> Result<()> {
        loop {
            let delivered = deliver(&mut self.client, &mut self.server)?
                + deliver(&mut self.server, &mut self.client)?;

            if delivered == 0 {
                return Ok(());
            }
        }
    }

    pub fn tick(&mut self, ms: u64) -> Result<()> {
        self.client.handle_tick(ms)?;
        self.server.handle_tick(ms)?;
        self.elapsed += ms;

        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.client.connection().is_active() || self.server.connection().is_active()
    }

    /// Sends `payload` from client to server, closes both directions and
    /// runs the pair until both connections are inactive. Returns the bytes
    /// the server read.
    pub fn transfer(&mut self, payload: &[u8], tick: u64, time_limit: u64) -> Result<Vec<u8>> {
        let mut written = 0;
        let mut received = vec![];
        let mut client_closed = false;
        let mut server_closed = false;

        if self.client.connection().state() == ConnectionState::Listen {
            self.client.connect()?;
        }

        while self.is_active() {
            if written < payload.len() {
                written += self.client.write(&payload[written..])?;
            }

            if !client_closed && written == payload.len() {
                self.client.end_input()?;
                client_closed = true;
            }

            self.exchange()?;
            received.extend(self.server.read(usize::MAX));

            if !server_closed && self.server.connection().inbound_stream().eof() {
                self.server.end_input()?;
                server_closed = true;
            }

            if self.elapsed >= time_limit {
                return Err(Error::msg(format!(
                    "transfer incomplete after {}ms: client {}, server {}",
                    self.elapsed,
                    self.client.connection().state(),
                    self.server.connection().state()
                )));
            }

            self.tick(tick)?;
        }

        Ok(received)
    }
}

pub fn generate_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
