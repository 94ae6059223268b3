//! Example: FINS/UDP slave simulator
//!
//! Run with: cargo run --example udp_slave [bind address]
//!
//! Serves DM/CIO/WR/HR/AR with 5000 words each. DM starts pre-filled with
//! DM[i] = i so reads from a master show recognisable data.
//!
//! Set `RUST_LOG=fins_core=debug` to see every dispatched request.

use fins_core::{CancelToken, DenseMemory, MemoryArea, Slave, UdpTransport, DEFAULT_FINS_PORT};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

const WORDS_PER_AREA: usize = 5000;

fn main() -> fins_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind: SocketAddr = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_FINS_PORT)));

    let memory = DenseMemory::with_pattern(WORDS_PER_AREA, |area, i| match area {
        MemoryArea::DM => i as u16,
        _ => 0,
    });
    let mut slave = Slave::new(memory);
    let mut transport = UdpTransport::bind(bind)?;

    println!("FINS UDP slave listening on {bind}");
    println!("Areas: DM/CIO/WR/HR/AR, {WORDS_PER_AREA} words each");
    println!("Press Ctrl+C to exit");

    slave.run(&mut transport, &CancelToken::new())
}
