//! Carberus ECU binary.
//!
//! # Usage
//!
//! ```bash
//! # Run the ECU, reading advertisements from a radio bridge on stdin
//! radio-bridge | carberus run --config /etc/carberus.toml
//!
//! # Forge the payload a key fob would advertise for counter 42
//! carberus token --counter 42
//!
//! # Validate the configuration and report what would be used
//! carberus check
//! ```

use anyhow::{Context, Result, bail};
use carberus_biometric::{BiometricChannel, TemplateStore};
use carberus_core::{EcuConfig, EventCategory};
use carberus_door::DoorController;
use carberus_ecu::{Arbiter, EventLoop, spawn_scanner};
use carberus_hardware::camera::DeviceCamera;
use carberus_hardware::serial::probe_candidates;
use carberus_token::{Advertisement, ReplayGuard, TokenChannel, TokenCipher, TokenPacket};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Vehicle access-control ECU: key fob tokens and face recognition
#[derive(Parser, Debug)]
#[command(name = "carberus")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "CARBERUS_CONFIG", default_value = "carberus.toml")]
    config: PathBuf,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ECU control loop (default)
    Run(Overrides),

    /// Print the encrypted payload a key fob would advertise
    Token(TokenArgs),

    /// Load and validate the configuration, then exit
    Check(Overrides),
}

#[derive(Args, Debug, Default)]
struct Overrides {
    /// Door controller serial device, instead of autodetection
    #[arg(long)]
    serial: Option<PathBuf>,

    /// Face template store
    #[arg(long)]
    templates: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// Anti-replay counter to embed
    #[arg(long)]
    counter: u32,

    /// Key fob device id, 4 bytes in hex
    #[arg(long, default_value = "00000000")]
    device_id: String,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: &Path, overrides: &Overrides) -> Result<EcuConfig> {
    let mut config = EcuConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    if let Some(serial) = &overrides.serial {
        config.serial.candidates = vec![serial.clone()];
    }
    if let Some(templates) = &overrides.templates {
        config.biometric.template_path = templates.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn parse_device_id(hex_id: &str) -> Result<[u8; 4]> {
    let bytes = hex::decode(hex_id.trim_start_matches("0x"))
        .with_context(|| format!("device id {hex_id:?} is not hex"))?;
    match <[u8; 4]>::try_from(bytes.as_slice()) {
        Ok(id) => Ok(id),
        Err(_) => bail!("device id must be 4 bytes, got {}", bytes.len()),
    }
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!(category = EventCategory::System.as_str(), "Received SIGINT"),
                    _ = sigterm.recv() => info!(category = EventCategory::System.as_str(), "Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!(
                category = EventCategory::Error.as_str(),
                error = %e,
                "SIGTERM handler unavailable, waiting for Ctrl-C only"
            ),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(
            category = EventCategory::Error.as_str(),
            error = %e,
            "Ctrl-C handler unavailable"
        );
        std::future::pending::<()>().await;
    }
}

async fn run(config: EcuConfig) -> Result<()> {
    info!(
        category = EventCategory::System.as_str(),
        version = carberus_core::VERSION,
        "Carberus ECU starting"
    );

    // The camera is the only peripheral the ECU cannot start without.
    let camera = DeviceCamera::open(
        &config.camera.device,
        config.camera.width,
        config.camera.height,
    )
    .with_context(|| format!("failed to open camera {}", config.camera.device.display()))?;

    let biometric = match BiometricChannel::from_config(&config.biometric) {
        Ok(Some(channel)) => Some(channel),
        Ok(None) => {
            warn!(
                category = EventCategory::Biometric.as_str(),
                path = %config.biometric.template_path.display(),
                "Template store not found, face recognition disabled"
            );
            None
        }
        Err(e) => {
            warn!(
                category = EventCategory::Error.as_str(),
                error = %e,
                "Template store unusable, face recognition disabled"
            );
            None
        }
    };

    let key = config.token.key_bytes().context("invalid token key")?;
    let replay = match &config.token.replay_state_path {
        Some(path) => ReplayGuard::with_state_file(config.token.replay_scope, path)
            .with_context(|| format!("failed to load replay state from {}", path.display()))?,
        None => ReplayGuard::new(config.token.replay_scope),
    };
    let channel = TokenChannel::with_replay_guard(TokenCipher::new(&key), replay);

    let mut door = DoorController::new();
    door.connect(&config.serial.candidates, config.serial.baud_rate);

    let feed = spawn_scanner(
        tokio::io::stdin(),
        channel,
        config.token.manufacturer_id,
        config.token.queue_capacity,
    );

    let arbiter = Arbiter::new(door, config.timing.cooldown());
    let telemetry = EventLoop::new(arbiter, config.timing.tick())
        .with_token_feed(feed)
        .with_camera(camera, biometric, config.camera.capture_timeout())
        .run(shutdown_signal())
        .await;

    info!(
        category = EventCategory::System.as_str(),
        unlocks = telemetry.unlocks_granted,
        "Carberus ECU stopped"
    );
    Ok(())
}

fn forge_token(config: &EcuConfig, args: &TokenArgs) -> Result<()> {
    let key = config.token.key_bytes().context("invalid token key")?;
    let device_id = parse_device_id(&args.device_id)?;

    let packet = TokenPacket::unlock(device_id, args.counter);
    let payload = TokenCipher::new(&key).seal(&packet);
    let line = Advertisement::new()
        .with_manufacturer_data(config.token.manufacturer_id, payload.to_vec())
        .to_line();

    println!("packet:        {packet}");
    println!("payload:       {}", hex::encode(payload));
    println!("advertisement: {line}");
    Ok(())
}

fn check(config: &EcuConfig) -> Result<()> {
    match probe_candidates(&config.serial.candidates) {
        Some(path) => println!("serial:    {} @ {} baud", path.display(), config.serial.baud_rate),
        None => println!("serial:    no device found, logic-only mode"),
    }

    let template_path = &config.biometric.template_path;
    match TemplateStore::load(template_path) {
        Ok(Some(store)) => println!(
            "templates: {} ({} templates, identities {:?})",
            template_path.display(),
            store.len(),
            store.identities()
        ),
        Ok(None) => println!(
            "templates: {} missing, face recognition disabled",
            template_path.display()
        ),
        Err(e) => println!("templates: {e}, face recognition disabled"),
    }

    let camera = &config.camera;
    if !camera.device.exists() {
        bail!("camera {} does not exist", camera.device.display());
    }
    println!(
        "camera:    {} {}x{}",
        camera.device.display(),
        camera.width,
        camera.height
    );
    println!(
        "token:     manufacturer {:#06x}, replay scope {:?}",
        config.token.manufacturer_id, config.token.replay_scope
    );
    println!("config OK");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command.unwrap_or(Command::Run(Overrides::default())) {
        Command::Run(overrides) => run(load_config(&cli.config, &overrides)?).await,
        Command::Token(args) => forge_token(&load_config(&cli.config, &Overrides::default())?, &args),
        Command::Check(overrides) => check(&load_config(&cli.config, &overrides)?),
    }
}
