//! # Soundroid remote
//!
//! Connects to a desktop running the soundroid daemon, shakes hands and runs
//! one command.
//!
//! ```bash
//! # WiFi
//! cargo run --example remote -- --host office,192.168.1.20,5000 volume
//! cargo run --example remote -- --host office,192.168.1.20,5000 change -5
//!
//! # Bluetooth, by paired device name (needs the `bluez` feature)
//! cargo run --example remote --features bluez -- --bluetooth --host desk,00:1A:7D:DA:71:13 mute
//! ```
//!
//! Set `SOUNDROID_LOG_MODE=debug` to see every line on the wire.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use soundroid_connector::{logging, AddressFamily, Connector, ConnectorConfig, HostAddress};

#[derive(Parser, Debug)]
#[command(name = "remote")]
#[command(about = "Control a soundroid desktop's volume")]
struct Args {
    /// Saved host line: `name,address,port` for WiFi, `name,address` for Bluetooth
    #[arg(long)]
    host: String,

    /// Reach the host over Bluetooth instead of WiFi
    #[arg(long)]
    bluetooth: bool,

    /// Use short timeouts
    #[arg(long)]
    responsive: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Check the daemon answers
    Ping,
    /// Print the current volume
    Volume,
    /// Change the volume by a signed percentage
    Change {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    Mute,
    Unmute,
    /// Print whether the output is muted
    Status,
    /// Probe the host without connecting
    Reachable,
}

fn main() -> Result<()> {
    logging::init_logging_from_env()?;
    let args = Args::parse();

    let config = if args.responsive {
        ConnectorConfig::responsive()
    } else {
        ConnectorConfig::from_env()
    };

    let family = if args.bluetooth {
        AddressFamily::Hardware
    } else {
        AddressFamily::Ipv4
    };
    let host = HostAddress::from_line(family, &args.host).context("Invalid --host")?;

    let mut connector = build_connector(args.bluetooth, config)?;
    if !connector.is_connected_to_network() {
        bail!("No {} network available", connector.kind());
    }

    if let Action::Reachable = args.command {
        let reachable = connector.is_addr_reachable(host.address())?;
        println!("{} is {}reachable", host.address(), if reachable { "" } else { "not " });
        return Ok(());
    }

    connector
        .connect_to(&host)
        .with_context(|| format!("Can't connect to {}", host.name()))?;
    if !connector.hand_shake()? {
        bail!("{} did not answer the handshake", host.name());
    }

    match args.command {
        Action::Ping => println!("{} is listening", connector.connected_host_name()),
        Action::Volume => match connector.current_volume() {
            Some(volume) => println!("{}%", volume),
            None => bail!("No volume received"),
        },
        Action::Change { delta } => report(connector.send_chg_vol(delta))?,
        Action::Mute => report(connector.send_mute_state(true))?,
        Action::Unmute => report(connector.send_mute_state(false))?,
        Action::Status => println!("muted: {}", connector.is_muted()),
        Action::Reachable => {}
    }

    connector.close_connection();
    Ok(())
}

fn report(accepted: bool) -> Result<()> {
    if !accepted {
        bail!("The daemon refused the command");
    }
    println!("OK");
    Ok(())
}

#[cfg(feature = "bluez")]
fn build_connector(bluetooth: bool, config: ConnectorConfig) -> Result<Connector> {
    if bluetooth {
        let adapter = soundroid_connector::BluezAdapter::new().context("No bluetooth adapter")?;
        return Ok(Connector::bluetooth(std::sync::Arc::new(adapter), config));
    }
    Ok(Connector::wifi(config))
}

#[cfg(not(feature = "bluez"))]
fn build_connector(bluetooth: bool, config: ConnectorConfig) -> Result<Connector> {
    if bluetooth {
        bail!("Bluetooth needs the `bluez` feature");
    }
    Ok(Connector::wifi(config))
}
