//! Example: FINS/UDP master
//!
//! Run with: cargo run --example udp_master [slave address]
//!
//! Start `udp_slave` first. This example demonstrates:
//! - Observing every frame sent and received
//! - Reading and writing words
//! - Reading and writing bits
//! - Typed values (i32, f32, f64, strings) and word order

use fins_core::event::FrameEvent;
use fins_core::{Session, SessionConfig, DEFAULT_FINS_PORT};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> fins_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let slave: SocketAddr = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], DEFAULT_FINS_PORT)));

    // =========================================================================
    // Connect
    // =========================================================================

    let config = SessionConfig::new(0x01, 0x0C)
        .with_service_id(0x23)
        .with_timeout(Duration::from_secs(2));
    let session = Session::udp(slave, config)?.with_observer(|event: &FrameEvent| println!("{event}"));

    // =========================================================================
    // Words
    // =========================================================================

    println!("=== Words ===\n");

    let data = session.read_words("D0", 10)?;
    println!("D0..D9: {:?}\n", data);

    session.write_words("D100", &[1000, 1001, 1002, 1003, 1004])?;
    let data = session.read_words("D100", 5)?;
    println!("D100..D104: {:?}\n", data);

    // =========================================================================
    // Bits
    // =========================================================================

    println!("=== Bits ===\n");

    session.write_bit("D100.1", true)?;
    println!("D100.1 = {}", session.read_bit("D100.1")?);
    println!("D100 = 0x{:04X}\n", session.read_words("D100", 1)?[0]);

    // =========================================================================
    // Typed values
    // =========================================================================

    println!("=== Typed values ===\n");

    session.write_value("D200", 123456i32)?;
    println!("D200 (i32) = {}", session.read_value::<i32>("D200")?);
    println!("D200..D201 raw = {:04X?}", session.read_words("D200", 2)?);

    session.write_value("D210", 25.5f32)?;
    println!("D210 (f32) = {}", session.read_value::<f32>("D210")?);

    session.write_value("D220", -2.5e10f64)?;
    println!("D220 (f64) = {}", session.read_value::<f64>("D220")?);

    session.write_values("D230", &[-1i16, 0, 1])?;
    println!("D230..D232 (i16) = {:?}", session.read_values::<i16>("D230", 3)?);

    session.write_string_fixed("D300", "PRODUCT-001", 8)?;
    println!("D300 (string) = {:?}", session.read_string("D300", 8)?);

    Ok(())
}
