//! Thin CLI consumer of the scale driver: list ports, connect, read.
//!
//! Usage: scale_probe [PORT] [--filizola] [--monitor]
//! Defaults to the first enumerated port and the Toledo framing.

use anyhow::{bail, Context, Result};
use log::LevelFilter;

use scalelink::{list_ports, ConnectionConfig, ReadingOutcome, ScaleModel, ScaleSession};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    let ports = list_ports().context("listing serial ports")?;
    if ports.is_empty() {
        bail!("no serial ports found");
    }

    log::info!("Available serial ports:");
    for port in &ports {
        log::info!("  - {} ({})", port.port_name, port.port_type);
    }

    let args: Vec<String> = std::env::args().collect();
    let port_name = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| ports[0].port_name.clone());
    let model = if args.iter().any(|a| a == "--filizola") {
        ScaleModel::Filizola
    } else {
        ScaleModel::Toledo
    };
    let monitoring = args.iter().any(|a| a == "--monitor");

    let config = ConnectionConfig {
        port_name: port_name.clone(),
        model,
        monitoring,
        ..ConnectionConfig::default()
    };

    let session = ScaleSession::new(config);
    let mut outcomes = session.subscribe();

    session
        .connect()
        .await
        .with_context(|| format!("connecting to {}", port_name))?;

    if monitoring {
        log::info!("Monitoring {}; press Ctrl-C to stop", port_name);
        loop {
            tokio::select! {
                outcome = outcomes.recv() => match outcome {
                    Ok(ReadingOutcome::Weight(reading)) => {
                        log::info!("{:.3} kg  (raw {:?})", reading.kilograms, reading.raw_frame);
                    }
                    Ok(ReadingOutcome::Failure { kind, raw_frame, detail }) => {
                        log::warn!("{:?}: {} (raw {:?})", kind, detail, raw_frame);
                    }
                    Err(_) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    } else {
        match session.read_once().await {
            Ok(reading) => {
                log::info!("Weight: {:.3} kg (raw {:?})", reading.kilograms, reading.raw_frame);
            }
            Err(e) => log::error!("Read failed: {}", e),
        }
    }

    session.disconnect().await;
    Ok(())
}
