use anyhow::{anyhow, bail, Context, Result};
use crabclip::app::{open_file_store, CrabClipApp};
use crabclip::testing::SyntheticDevice;
use crabclip::CaptureDevice;
use crabclip::{BandwidthEstimator, ControllerState, CrabClipConfig, QualityTier};
use std::env;
use std::time::Duration;
use uuid::Uuid;

const USAGE: &str = "Usage: crabclip-cli <command> [args]

Commands:
  probe [--json]                          Measure bandwidth and report the tier
  list [--json]                           List saved clips
  inputs [--json]                         List the cameras of the synthetic device
  record [--seconds N] [--quality Q] [--input ID]
                                          Record a clip from the synthetic device
  delete <id>                             Delete a saved clip
  sweep                                   Apply age and count retention now
  config [--write]                        Print (or write) the active configuration";

#[tokio::main]
async fn main() -> Result<()> {
    crabclip::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config = CrabClipConfig::load_or_default();
    let command = &args[1];
    match command.as_str() {
        "probe" => cmd_probe(&config, &args).await,
        "list" => cmd_list(&config, &args).await,
        "inputs" => cmd_inputs(&args).await,
        "record" => cmd_record(&config, &args).await,
        "delete" => cmd_delete(&config, &args).await,
        "sweep" => cmd_sweep(&config).await,
        "config" => cmd_config(&config, &args),
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

async fn cmd_probe(config: &CrabClipConfig, args: &[String]) -> Result<()> {
    let estimator = BandwidthEstimator::http(&config.bandwidth)?;
    let sample = estimator
        .measure()
        .await
        .with_context(|| format!("probing {}", config.bandwidth.probe_url))?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string(&sample)?);
    } else {
        println!(
            "{:.2} Mbps over {} rounds -> {} ({})",
            sample.throughput_mbps,
            estimator.rounds(),
            sample.quality,
            sample.quality.constraints()
        );
    }
    Ok(())
}

async fn cmd_list(config: &CrabClipConfig, args: &[String]) -> Result<()> {
    let clips = open_file_store(config).load_all().await;

    if has_flag(args, "--json") {
        let entries: Vec<_> = clips
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "capturedAtMs": c.captured_at_ms,
                    "durationMs": c.duration_ms,
                    "quality": c.quality,
                    "sizeBytes": c.size_bytes(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&entries)?);
        return Ok(());
    }

    if clips.is_empty() {
        println!("No saved clips");
    }
    for clip in clips {
        let captured = chrono::DateTime::from_timestamp_millis(clip.captured_at_ms)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| clip.captured_at_ms.to_string());
        println!(
            "{}  {}  {:>5.1}s  {:>5}  {} bytes",
            clip.id,
            captured,
            clip.duration_ms as f64 / 1000.0,
            clip.quality,
            clip.size_bytes()
        );
    }
    Ok(())
}

async fn cmd_inputs(args: &[String]) -> Result<()> {
    let inputs = SyntheticDevice::new().list_inputs().await?;
    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&inputs)?);
        return Ok(());
    }
    for (index, input) in inputs.iter().enumerate() {
        let marker = if index == 0 { "*" } else { " " };
        println!("{} {:<20} {}", marker, input.id, input.label);
    }
    Ok(())
}

async fn cmd_record(config: &CrabClipConfig, args: &[String]) -> Result<()> {
    // Parse args: record [--seconds <n>] [--quality <tier>] [--input <id>]
    let mut seconds = 3.0_f64;
    let mut quality: Option<QualityTier> = None;
    let mut input: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--seconds" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--seconds needs a value"))?;
                seconds = value.parse().context("invalid --seconds")?;
                if !seconds.is_finite() || seconds <= 0.0 {
                    bail!("--seconds must be positive");
                }
            }
            "--quality" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--quality needs a value"))?;
                quality = Some(value.parse()?);
            }
            "--input" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--input needs a value"))?;
                input = Some(value.clone());
            }
            other => bail!("Unknown record option: {}", other),
        }
        i += 1;
    }

    let mut device = SyntheticDevice::new();
    if let Some(id) = &input {
        let known = device.list_inputs().await?;
        if !known.iter().any(|i| &i.id == id) {
            bail!("Unknown camera {}; run `crabclip-cli inputs`", id);
        }
    }

    let estimator = BandwidthEstimator::http(&config.bandwidth)?;
    let app = CrabClipApp::start(config, open_file_store(config), device, &estimator).await?;
    let controller = app.controller().clone();

    if let Some(tier) = quality {
        app.select_quality(tier).await?;
    }
    if let Some(id) = &input {
        app.switch_input(id.clone());
    }
    let tier = app.snapshot().selected_quality;
    let armed = tokio::time::timeout(
        Duration::from_secs(5),
        controller.wait_for(|s| {
            s.state == ControllerState::Armed
                && s.tier == tier
                && (input.is_none() || s.input == input)
        }),
    )
    .await
    .context("timed out waiting for the device")??;
    println!(
        "Recording at {} ({}) from {}",
        armed.tier,
        armed.tier.constraints(),
        armed.input.as_deref().unwrap_or("the default camera")
    );

    let before = app.snapshot().recording_count();
    app.start_recording();
    controller.wait_for(|s| s.is_recording()).await?;
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    app.stop_recording();

    let limit = Duration::from_millis(config.recording.max_duration_ms) + Duration::from_secs(5);
    tokio::time::timeout(
        limit,
        controller.wait_for(|s| !s.is_recording() && s.state != ControllerState::Finalizing),
    )
    .await
    .context("timed out waiting for the clip")??;

    let mut state = app.state().subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| s.recording_count() != before || s.error.is_some()),
    )
    .await
    .context("timed out waiting for the save")?
    .map_err(|_| anyhow!("state container closed"))?;

    let snapshot = app.snapshot();
    app.shutdown().await;

    if let Some(error) = snapshot.error() {
        bail!("Clip was not saved: {}", error);
    }
    let clip = snapshot
        .latest_recording()
        .ok_or_else(|| anyhow!("no clip recorded"))?;
    println!(
        "Saved {} ({:.1}s, {}, {} bytes)",
        clip.id,
        clip.duration_ms as f64 / 1000.0,
        clip.quality,
        clip.size_bytes()
    );
    Ok(())
}

async fn cmd_delete(config: &CrabClipConfig, args: &[String]) -> Result<()> {
    let id = args.get(2).ok_or_else(|| anyhow!("Usage: crabclip-cli delete <id>"))?;
    let id: Uuid = id.parse().with_context(|| format!("invalid clip id {}", id))?;

    if open_file_store(config).delete(id).await? {
        println!("Deleted {}", id);
    } else {
        println!("No clip with id {}", id);
    }
    Ok(())
}

async fn cmd_sweep(config: &CrabClipConfig) -> Result<()> {
    let report = open_file_store(config).sweep().await?;
    println!(
        "Removed {} clips ({} expired, {} over capacity, {} unreadable)",
        report.removed(),
        report.expired,
        report.over_capacity,
        report.corrupt
    );
    Ok(())
}

fn cmd_config(config: &CrabClipConfig, args: &[String]) -> Result<()> {
    if has_flag(args, "--write") {
        let path = CrabClipConfig::default_path();
        config.save_to_file(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
