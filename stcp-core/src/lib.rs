mod byte_stream;
mod config;
mod connection;
mod link;
mod orchestrator;
mod reassembler;
mod receiver;
mod segment;
mod sender;
mod seq_number;
mod state;
mod timer;

use timer::*;

pub use byte_stream::*;
pub use config::*;
pub use connection::*;
pub use link::*;
pub use orchestrator::*;
pub use reassembler::*;
pub use receiver::*;
pub use segment::*;
pub use sender::*;
pub use seq_number::*;
pub use state::*;
