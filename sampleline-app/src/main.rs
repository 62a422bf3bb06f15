mod offline;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sampleline_core::{host::list_output_devices, SamplelineEngine, ToneSource};
use sampleline_relay::start_server;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::settings::{default_settings_path, load_settings, save_settings, AppSettings};

#[derive(Debug)]
struct Args {
    settings_path: PathBuf,
    render_wav: Option<PathBuf>,
    seconds: f32,
    no_relay: bool,
    list_devices: bool,
    write_settings: bool,
}

const USAGE: &str = "Usage: sampleline [--settings <file.json>] [--no-relay] [--list-devices] [--write-settings]
       sampleline --render-wav <out.wav> [--seconds <n>] [--settings <file.json>]";

fn parse_args() -> Result<Args, String> {
    let mut settings_path: Option<PathBuf> = None;
    let mut render_wav: Option<PathBuf> = None;
    let mut seconds: f32 = 5.0;
    let mut no_relay = false;
    let mut list_devices = false;
    let mut write_settings = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --settings".into());
                };
                settings_path = Some(PathBuf::from(v));
            }
            "--render-wav" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --render-wav".into());
                };
                render_wav = Some(PathBuf::from(v));
            }
            "--seconds" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --seconds".into());
                };
                seconds = v
                    .parse::<f32>()
                    .map_err(|_| "invalid value for --seconds".to_string())?
                    .clamp(0.01, 600.0);
            }
            "--no-relay" => no_relay = true,
            "--list-devices" => list_devices = true,
            "--write-settings" => write_settings = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    Ok(Args {
        settings_path: settings_path.unwrap_or_else(default_settings_path),
        render_wav,
        seconds,
        no_relay,
        list_devices,
        write_settings,
    })
}

fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sampleline=info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.list_devices {
        for device in list_output_devices() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    let mut settings = load_settings(&args.settings_path);
    settings.apply_env_overrides();
    if args.no_relay {
        settings.relay_enabled = false;
    }
    info!(path = %args.settings_path.display(), "settings loaded");

    if args.write_settings {
        save_settings(&args.settings_path, &settings)
            .with_context(|| format!("writing {}", args.settings_path.display()))?;
        info!(path = %args.settings_path.display(), "settings written");
        return Ok(());
    }

    if let Some(path) = args.render_wav.as_deref() {
        let source = tone_source(&settings);
        offline::render_wav(&settings, source, args.seconds, path)?;
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sampleline-rt")
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(serve(settings))
}

fn tone_source(settings: &AppSettings) -> Box<ToneSource> {
    Box::new(ToneSource::new(
        settings.tone.waveform,
        settings.tone.frequency,
        settings.tone.amplitude,
        settings.sample_rate,
    ))
}

async fn serve(settings: AppSettings) -> anyhow::Result<()> {
    let engine = Arc::new(SamplelineEngine::new(settings.to_engine_config()));
    spawn_status_logger(&engine);

    // `start` blocks until the output device is open.
    let started = {
        let engine = Arc::clone(&engine);
        let source = tone_source(&settings);
        tokio::task::spawn_blocking(move || engine.start(source)).await?
    };
    if let Err(e) = started {
        if !settings.relay_enabled {
            return Err(e).context("starting audio engine");
        }
        warn!("audio engine unavailable, serving relay only: {e}");
    }

    let relay = if settings.relay_enabled {
        Some(
            start_server(settings.to_relay_config())
                .await
                .context("starting relay")?,
        )
    } else {
        None
    };

    let monitor = (settings.diagnostics_interval_secs > 0).then(|| {
        spawn_diagnostics_logger(
            Arc::clone(&engine),
            Duration::from_secs(settings.diagnostics_interval_secs),
        )
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");

    if let Some(monitor) = monitor {
        monitor.abort();
    }
    if let Some(relay) = relay {
        relay.shutdown().await;
    }
    if engine.is_running() {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || engine.stop()).await??;
    }
    Ok(())
}

fn spawn_status_logger(engine: &SamplelineEngine) {
    let mut status_rx = engine.subscribe_status();
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(event) => info!(
                    status = ?event.status,
                    detail = event.detail.as_deref().unwrap_or(""),
                    "engine status"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "status events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_diagnostics_logger(
    engine: Arc<SamplelineEngine>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !engine.is_running() {
                continue;
            }
            let report = engine.diagnostics_report();
            info!(
                buffered = report.buffered,
                rendered = report.render.samples_rendered,
                underrun = report.render.underrun_samples,
                faults = report.render.faults,
                overrun = report.producer.overrun_samples,
                "ring diagnostics"
            );
            if let Ok(json) = serde_json::to_string(&report) {
                tracing::debug!(report = json.as_str(), "diagnostics report");
            }
        }
    })
}
