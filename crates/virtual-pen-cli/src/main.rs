//! virtual-pen CLI: use a phone as a pen for this computer.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use virtual_pen_daemon::setup::{self, UINPUT_PATH};
use virtual_pen_daemon::{Config, EmulationFactory, LogSink, Pipeline, PipelineConfig};
use virtual_pen_types::{SessionStatus, UsbDeviceId};

#[derive(Parser)]
#[command(
    name = "virtual-pen",
    about = "Turn a phone into a pressure-sensitive pen",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the phone to connect over the network.
    Listen {
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind.
        #[arg(short, long)]
        bind: Option<IpAddr>,
    },

    /// Connect to the phone over USB (Android accessory mode).
    Usb {
        /// Device as `vendor:product` in hex, see `devices`.
        device: Option<UsbDeviceId>,
    },

    /// List USB devices the phone could be.
    Devices,

    /// Check that virtual input devices can be created.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = setup::load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter())),
        )
        .init();

    match cli.command {
        Commands::Listen { port, bind } => {
            if let Some(port) = port {
                config.listener.port = port;
            }
            if let Some(bind) = bind {
                config.listener.bind = bind;
            }
            let transport = config.listener_transport();
            run_session(config.pipeline(transport)).await
        }
        Commands::Usb { device } => {
            let Some(device) = device.or(config.accessory.device) else {
                bail!("no USB device given and none configured; run `virtual-pen devices`");
            };
            let transport = config.accessory_transport(device);
            run_session(config.pipeline(transport)).await
        }
        Commands::Devices => list_devices(),
        Commands::Check => check(),
    }
}

/// Run one session until it ends or Ctrl-C stops it.
async fn run_session(config: PipelineConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(Handle::current(), emulation()?, Arc::new(LogSink));
    let session = pipeline.start(config)?;

    let status = tokio::select! {
        status = session.finished() => status,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("stopping");
            pipeline.stop(&session);
            session.finished().await
        }
    };

    if status == SessionStatus::Error {
        bail!("session ended with an error");
    }
    Ok(())
}

#[cfg(feature = "linux")]
fn emulation() -> anyhow::Result<EmulationFactory> {
    use virtual_pen_input::linux::UinputEmulation;
    use virtual_pen_input::StylusEmulation;

    Ok(Arc::new(|| -> Box<dyn StylusEmulation> {
        Box::new(UinputEmulation::new())
    }))
}

#[cfg(not(feature = "linux"))]
fn emulation() -> anyhow::Result<EmulationFactory> {
    bail!("built without uinput support")
}

#[cfg(feature = "usb")]
fn list_devices() -> anyhow::Result<()> {
    let devices = virtual_pen_protocol::accessory::list_devices()?;
    if devices.is_empty() {
        println!("No readable USB devices found. Is the phone plugged in and accessible?");
    }
    for device in devices {
        println!("{}\t{}", device.id, device.label);
    }
    Ok(())
}

#[cfg(not(feature = "usb"))]
fn list_devices() -> anyhow::Result<()> {
    bail!("built without USB support")
}

fn check() -> anyhow::Result<()> {
    match setup::check_uinput(Path::new(UINPUT_PATH)) {
        Ok(()) => {
            println!("{UINPUT_PATH} is writable");
            Ok(())
        }
        Err(e) => {
            println!("{UINPUT_PATH} is not writable: {e}");
            println!("Allow your user to create input devices, for example with a udev rule:");
            println!(
                "  KERNEL==\"uinput\", GROUP=\"input\", MODE=\"0660\", OPTIONS+=\"static_node=uinput\""
            );
            println!("and add yourself to the `input` group.");
            bail!("virtual input devices cannot be created")
        }
    }
}
