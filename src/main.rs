// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Sentryline - Real-Time Video Monitoring Alert Engine
//!
//! Reads per-frame detections (JSON lines) from a file or stdin, raises
//! alerts, drives the alarm and emails snapshots.
//!
//! Email settings come from the environment (a `.env` file is honoured):
//! `ALERT_SMTP_HOST`, `ALERT_SMTP_PORT`, `ALERT_SMTP_USER`,
//! `ALERT_SMTP_PASSWORD`, `ALERT_EMAIL_FROM`, `ALERT_EMAIL_TO`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sentryline::alarm::{AlarmActuator, BellTone, ToneSink};
use sentryline::notify::{LogTransport, NotificationDispatcher, NotificationTransport, SmtpConfig, SmtpNotifier, SnapshotStore};
use sentryline::{Config, Engine, EventBus, IdentityGallery, ReplaySource, VERSION};

/// Sentryline - Real-Time Video Monitoring Alert Engine
#[derive(Parser, Debug)]
#[command(name = "sentryline")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Restricted-area and posture alerting over per-frame detections")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Detection replay (JSON lines, one frame per line), `-` for stdin
    #[arg(long, default_value = "-")]
    detections: PathBuf,

    /// Directory alert snapshots are written to
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Keep every nth frame
    #[arg(long, default_value = "1")]
    stride: u64,

    /// Disable the audible alarm
    #[arg(long)]
    no_alarm: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Sentryline v{} - video monitoring alert engine", VERSION);
    info!(features = ?sentryline::enabled_features(), "Build features");

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if let Some(dir) = args.snapshot_dir.clone() {
        config.snapshot_dir = dir;
    }
    if args.no_alarm {
        config.alarm.enabled = false;
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let transport: Arc<dyn NotificationTransport> = match SmtpConfig::from_env() {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, to = %smtp.to, "Email notifications enabled");
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            warn!("ALERT_SMTP_HOST or ALERT_EMAIL_TO not set, alerts are only logged");
            Arc::new(LogTransport)
        }
    };

    let dispatcher = NotificationDispatcher::start(
        rt.handle(),
        transport,
        SnapshotStore::new(config.snapshot_dir.clone()),
        &config.notification,
    );

    let alarm = if config.alarm.enabled {
        Some(AlarmActuator::start(&config.alarm, open_tone)?)
    } else {
        info!("Alarm disabled");
        None
    };

    let gallery = match (&config.identity.gallery_path, config.identity.enabled) {
        (Some(path), true) => IdentityGallery::load(path, config.identity.match_threshold)?,
        _ => IdentityGallery::empty(config.identity.match_threshold),
    };

    let bus = Arc::new(EventBus::new(256));
    let mut engine = Engine::new(config, dispatcher)?
        .with_gallery(gallery)?
        .with_alarm(alarm)
        .with_event_bus(bus);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                stop.store(true, Ordering::Release);
            }
        });
    }

    info!("Reading detections from {:?}", args.detections);
    let source = ReplaySource::open(&args.detections, args.stride)?;

    // Cooldowns follow the recorded timeline
    let anchor = Instant::now();
    let mut first_capture: Option<DateTime<Utc>> = None;

    for item in source {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping frame record: {:#}", e);
                continue;
            }
        };

        let base = *first_capture.get_or_insert(frame.captured_at);
        let offset = (frame.captured_at - base).to_std().unwrap_or_default();
        engine.process_frame_at(&frame, anchor + offset);
    }

    let stats = rt.block_on(engine.shutdown());
    match serde_json::to_string(&stats) {
        Ok(json) => info!("Session summary: {}", json),
        Err(e) => error!("Session summary unavailable: {}", e),
    }

    info!("Sentryline shutdown complete");
    Ok(())
}

/// Alarm output: the sound card when built with `audio`, else the terminal bell
fn open_tone() -> Box<dyn ToneSink> {
    #[cfg(feature = "audio")]
    {
        match sentryline::alarm::CpalTone::open() {
            Ok(tone) => return Box::new(tone),
            Err(e) => warn!("Audio output unavailable ({}), using terminal bell", e),
        }
    }
    Box::new(BellTone)
}
