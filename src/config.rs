//! Command-line configuration for the streaming server binary.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "bonk-server")]
#[command(about = "Modal-synthesis streaming server", long_about = None)]
pub struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Physics integration sample rate, in Hz, used as the default for new sessions.
    #[arg(long, default_value_t = 1_000_000)]
    pub physics_sample_rate: u32,
}
