use anyhow::{Error, Result};
use env_logger;
use log::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::{env, process::exit, str::FromStr};
use stcp_core::{deliver, ConnectionOrchestrator, ConnectionState, LossyLink, TcpConfig};

const DEFAULT_PAYLOAD_SIZE: usize = 100_000; // bytes
const DEFAULT_LOSS_RATE: f64 = 0.05;
const DEFAULT_SEED: u64 = 0;
const DEFAULT_TICK: u64 = 10; // ms
const MAX_SIMULATED_TIME: u64 = 600_000; // ms

struct LoopbackConfig {
    payload_size: usize,
    loss_rate: f64,
    seed: u64,
    tick: u64,
}

impl LoopbackConfig {
    /// Parses `loopback [payload size] [loss rate] [seed] [tick ms]`
    fn new_from_env() -> Result<Self> {
        let mut args = env::args().skip(1);

        let payload_size = parse_arg(args.next(), 1, "payload size", DEFAULT_PAYLOAD_SIZE)?;
        let loss_rate = parse_arg(args.next(), 2, "loss rate", DEFAULT_LOSS_RATE)?;
        let seed = parse_arg(args.next(), 3, "seed", DEFAULT_SEED)?;
        let tick = parse_arg(args.next(), 4, "tick", DEFAULT_TICK)?;

        if tick == 0 {
            return Err(Error::msg("tick must be greater than zero"));
        }

        Ok(Self {
            payload_size,
            loss_rate,
            seed,
            tick,
        })
    }
}

fn parse_arg<T>(arg: Option<String>, position: usize, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match arg {
        Some(arg) => arg.parse::<T>().map_err(|err| {
            Error::msg(format!(
                "could not parse arg ({}) as {}: {}",
                position, name, err
            ))
        }),
        None => Ok(default),
    }
}

fn main() {
    env_logger::init();

    let result = LoopbackConfig::new_from_env().and_then(|config| run(&config));

    match result {
        Ok(()) => {}
        Err(err) => {
            error!("Error occurred: {:?}", err);
            exit(1)
        }
    }
}

fn run(config: &LoopbackConfig) -> Result<()> {
    let tcp_config = TcpConfig::default();

    let mut client = ConnectionOrchestrator::new(
        tcp_config.clone(),
        LossyLink::with_loss(config.loss_rate, config.seed)?,
    )?;
    let mut server = ConnectionOrchestrator::new(
        tcp_config,
        LossyLink::with_loss(config.loss_rate, config.seed.wrapping_add(1))?,
    )?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let payload = (0..config.payload_size)
        .map(|_| rng.gen::<u8>())
        .collect::<Vec<u8>>();

    let mut written = 0;
    let mut received = Vec::with_capacity(payload.len());
    let mut client_closed = false;
    let mut server_closed = false;
    let mut elapsed = 0;

    client.connect()?;

    while client.connection().is_active() || server.connection().is_active() {
        if written < payload.len() {
            written += client.write(&payload[written..])?;
        }

        if !client_closed && written == payload.len() {
            client.end_input()?;
            client_closed = true;
        }

        deliver(&mut client, &mut server)?;
        deliver(&mut server, &mut client)?;

        received.extend(server.read(usize::MAX));

        if !server_closed && server.connection().inbound_stream().eof() {
            server.end_input()?;
            server_closed = true;
        }

        if elapsed >= MAX_SIMULATED_TIME {
            return Err(Error::msg(format!(
                "transfer did not complete within {}ms (client {}, server {})",
                MAX_SIMULATED_TIME,
                client.connection().state(),
                server.connection().state()
            )));
        }

        client.handle_tick(config.tick)?;
        server.handle_tick(config.tick)?;
        elapsed += config.tick;
    }

    if client.connection().state() == ConnectionState::Reset
        || server.connection().state() == ConnectionState::Reset
    {
        return Err(Error::msg("connection was reset before the transfer completed"));
    }

    if received != payload {
        return Err(Error::msg(format!(
            "received {} bytes which do not match the {} bytes sent",
            received.len(),
            payload.len()
        )));
    }

    info!(
        "transferred {} bytes in {}ms ({} segments dropped)",
        payload.len(),
        elapsed,
        client.sink().dropped() + server.sink().dropped()
    );

    println!(
        "transferred {} bytes in {}ms of simulated time",
        payload.len(),
        elapsed
    );

    Ok(())
}
