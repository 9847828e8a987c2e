//! Demo workload for the ECS service module.
//!
//! This binary answers every request on two ports with `Hello, world!` and
//! logs each request as a JSON record on stderr.

use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;
use ecsprobe::telemetry::{self, LogFormat};
use ecsprobe::workload;

#[derive(Debug, Parser)]
#[command(
    name = "helloworld",
    about = "Answer every HTTP request on two ports with a fixed greeting"
)]
struct Cli {
    /// First port to listen on.
    #[arg(long, env = "PORT1")]
    port1: u16,
    /// Second port to listen on.
    #[arg(long, env = "PORT2")]
    port2: u16,
    /// Address to bind both listeners to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();
    telemetry::init(LogFormat::Json).map_err(|err| err.to_string())?;
    let listeners = workload::bind(cli.host, &[cli.port1, cli.port2])
        .await
        .map_err(|err| err.to_string())?;
    workload::serve(listeners)
        .await
        .map_err(|err| err.to_string())
}
