//! Command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::adapters::{AppConfig, FfmpegEncodersAdapter, FfprobeAdapter};
use crate::cli::args::{
    BatchArgs, ConvertArgs, EncodersArgs, EstimateArgs, PresetsArgs, ProbeArgs,
};
use crate::cli::report::{reporter, ProgressReporter};
use crate::domain::model::{JobStatus, Settings};
use crate::domain::presets::{PresetCatalog, PresetCategory};
use crate::engine::{BatchCallbacks, BatchQueue, JobEvent, JobRunner};
use crate::estimator::estimate_with_preset;
use crate::ports::{detect_capabilities, probe_or_default, EncoderPort, ProbePort};
use crate::utils::format::{format_clock, format_size};
use crate::utils::path::{generate_output_path, is_video_file, validate_output_dir};

fn catalog(config: &AppConfig) -> PresetCatalog {
    PresetCatalog::default().with_user_presets(config.user_presets())
}

fn probe_adapter(config: &AppConfig) -> FfprobeAdapter {
    FfprobeAdapter::new(config.encoder.ffprobe_path.clone())
        .with_timeout(Duration::from_secs(config.encoder.probe_timeout_secs))
}

fn encoders_adapter(config: &AppConfig) -> FfmpegEncodersAdapter {
    FfmpegEncodersAdapter::new(config.encoder.ffmpeg_path.clone())
}

/// Warn when a GPU encoder is requested but fails a test encode
async fn check_hardware_encoder(encoders: &dyn EncoderPort, settings: &Settings) -> bool {
    let Some(encoder) = settings.video.encoder().filter(|_| settings.uses_hardware_encoder()) else {
        return true;
    };
    if encoders.test_encode(encoder).await {
        return true;
    }
    warn!(
        "GPU encoder {} is not usable on this machine, the conversion will likely fail. \
         Run `vidconv encoders` for details or pick a CPU preset",
        encoder
    );
    false
}

fn ensure_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            input.display()
        ));
    }
    Ok(())
}

/// Configured output directory, else the input's own directory
fn output_dir_for(config: &AppConfig, input: &Path) -> PathBuf {
    config.output.directory.clone().unwrap_or_else(|| {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Execute the convert command
pub async fn convert(args: ConvertArgs, config: &AppConfig) -> Result<()> {
    info!("Starting convert operation");
    ensure_input(&args.input)?;

    let preset = args
        .settings
        .resolve(&catalog(config))
        .context("Failed to resolve conversion settings")?;

    let output = match args.output {
        Some(output) => output,
        None => generate_output_path(
            &args.input,
            &output_dir_for(config, &args.input),
            &preset.container_ext,
            &config.output.suffix,
        ),
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        validate_output_dir(parent).context("Output directory is not usable")?;
    }

    check_hardware_encoder(&encoders_adapter(config), &preset.settings).await;

    let metadata = probe_or_default(&probe_adapter(config), &args.input).await;
    info!(
        "Input duration: {:.2}s, preset: {}",
        metadata.duration, preset.name
    );

    let reporter = reporter(args.json);
    let runner = JobRunner::new(config.encoder.ffmpeg_path.clone());
    let mut handle = runner
        .convert(&args.input, &output, &preset.settings, metadata.duration)
        .context("Failed to start conversion")?;
    reporter.on_start(&args.input, &output);

    let mut cancel_requested = false;
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(JobEvent::Progress(snapshot)) => reporter.on_progress(None, &snapshot),
                Some(JobEvent::Completed(path)) => {
                    reporter.on_complete(&path);
                    info!("Convert operation completed successfully");
                    return Ok(());
                }
                Some(JobEvent::Error(err)) if err.is_cancelled() => {
                    reporter.on_cancel();
                    return Err(anyhow::anyhow!("Conversion cancelled"));
                }
                Some(JobEvent::Error(err)) => {
                    reporter.on_error(&err.to_string());
                    return Err(anyhow::Error::new(err).context("Conversion failed"));
                }
                None => return Err(anyhow::anyhow!("Conversion ended without a result")),
            },
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                warn!("Interrupted, cancelling conversion");
                cancel_requested = true;
                handle.cancel();
            }
        }
    }
}

/// Execute the batch command
pub async fn batch(args: BatchArgs, config: &AppConfig) -> Result<()> {
    info!("Starting batch operation with {} inputs", args.inputs.len());

    let preset = args
        .settings
        .resolve(&catalog(config))
        .context("Failed to resolve conversion settings")?;

    check_hardware_encoder(&encoders_adapter(config), &preset.settings).await;

    let reporter = reporter(args.json);
    let runner = Arc::new(JobRunner::new(config.encoder.ffmpeg_path.clone()));
    let probe: Arc<dyn ProbePort> = Arc::new(probe_adapter(config));
    let queue = BatchQueue::new(runner, probe).with_callbacks(batch_callbacks(reporter.clone()));

    for input in &args.inputs {
        if !input.is_file() {
            warn!("Skipping missing input {}", input.display());
            continue;
        }
        if !is_video_file(input) {
            warn!("Skipping {}: not a recognised video file", input.display());
            continue;
        }
        let dir = output_dir_for(config, input);
        validate_output_dir(&dir)
            .with_context(|| format!("Output directory is not usable: {}", dir.display()))?;
        let output = generate_output_path(input, &dir, &preset.container_ext, &config.output.suffix);
        queue.enqueue(input, output, preset.settings.clone())?;
    }

    let Some(mut join) = queue.start().context("Failed to start batch")? else {
        return Err(anyhow::anyhow!("No convertible input files"));
    };

    let mut cancel_requested = false;
    let items = loop {
        tokio::select! {
            items = &mut join => break items.context("Batch worker failed")?,
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                warn!("Interrupted, cancelling batch");
                cancel_requested = true;
                queue.cancel();
            }
        }
    };

    if cancel_requested {
        reporter.on_cancel();
        reporter.on_batch_summary(&items);
        return Err(anyhow::anyhow!("Batch cancelled"));
    }

    let failed = items
        .iter()
        .filter(|job| job.status == JobStatus::Failed)
        .count();
    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} conversions failed",
            failed,
            items.len()
        ));
    }

    info!("Batch operation completed successfully");
    Ok(())
}

fn batch_callbacks(reporter: Arc<dyn ProgressReporter>) -> BatchCallbacks {
    let on_item = reporter.clone();
    let on_done = reporter.clone();
    BatchCallbacks::new()
        .on_item_progress(move |index, snapshot| on_item.on_progress(Some(index), snapshot))
        .on_progress(move |done, total| on_done.on_batch_progress(done, total))
        .on_complete(move |items| reporter.on_batch_summary(items))
}

/// Execute the estimate command
pub async fn estimate(args: EstimateArgs, config: &AppConfig) -> Result<()> {
    info!("Starting estimate operation");
    ensure_input(&args.input)?;

    let preset = args
        .settings
        .resolve(&catalog(config))
        .context("Failed to resolve conversion settings")?;
    let metadata = probe_or_default(&probe_adapter(config), &args.input).await;
    let estimate = estimate_with_preset(&metadata, &preset);

    if args.json {
        let json = serde_json::to_string_pretty(&estimate)
            .context("Failed to serialize estimate to JSON")?;
        println!("{}", json);
    } else {
        println!("Estimate for {} ({})", args.input.display(), preset.name);
        println!("==================");
        if metadata.has_duration() {
            println!("Input duration: {}", format_clock(metadata.duration));
        } else {
            println!("Input duration: unknown");
        }
        if metadata.size > 0 {
            println!("Input size: {}", format_size(metadata.size));
        }
        println!("Output size: {}", estimate.size_text);
        println!("Encode time: {}", estimate.duration_text);
        if let Some(info_text) = &estimate.info_text {
            println!("Change: {}", info_text);
        }
    }
    Ok(())
}

/// Execute the presets command
pub fn presets(args: PresetsArgs, config: &AppConfig) -> Result<()> {
    let catalog = catalog(config);
    let categories: Vec<PresetCategory> = match args.category {
        Some(category) => vec![category],
        None => PresetCategory::ALL.to_vec(),
    };

    if args.json {
        let selected: Vec<_> = catalog
            .iter()
            .filter(|p| categories.contains(&p.category))
            .collect();
        let json = serde_json::to_string_pretty(&selected)
            .context("Failed to serialize presets to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    for category in categories {
        let presets = catalog.by_category(category);
        if presets.is_empty() {
            continue;
        }
        println!("{}:", category);
        for preset in presets {
            let marker = if preset.hardware { " [gpu]" } else { "" };
            println!(
                "  {:<18} {:<6} {}{}",
                preset.name, preset.container_ext, preset.description, marker
            );
        }
        println!();
    }
    Ok(())
}

/// Execute the encoders command
pub async fn encoders(args: EncodersArgs, config: &AppConfig) -> Result<()> {
    let caps = detect_capabilities(&encoders_adapter(config), !args.no_test).await;

    if args.json {
        let json = serde_json::to_string_pretty(&caps)
            .context("Failed to serialize encoders to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Video encoders:");
    for encoder in &caps.video {
        println!("  {:<14} {}", encoder.name, encoder.label);
    }
    println!();
    println!("Audio encoders:");
    for encoder in &caps.audio {
        println!("  {:<14} {}", encoder.name, encoder.label);
    }
    println!();
    if caps.has_hardware() {
        println!("NVENC: available ({})", caps.hardware.join(", "));
    } else {
        println!("NVENC: not available, [gpu] presets will fail");
    }
    Ok(())
}

/// Execute the probe command
pub async fn probe(args: ProbeArgs, config: &AppConfig) -> Result<()> {
    ensure_input(&args.input)?;
    let metadata = probe_adapter(config)
        .probe(&args.input)
        .await
        .with_context(|| format!("Failed to probe {}", args.input.display()))?;

    let json = serde_json::to_string_pretty(&metadata)
        .context("Failed to serialize metadata to JSON")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_prefers_configured_directory() {
        let mut config = AppConfig::default();
        assert_eq!(
            output_dir_for(&config, Path::new("/videos/a.ts")),
            PathBuf::from("/videos")
        );
        assert_eq!(output_dir_for(&config, Path::new("a.ts")), PathBuf::from("."));

        config.output.directory = Some(PathBuf::from("/out"));
        assert_eq!(
            output_dir_for(&config, Path::new("/videos/a.ts")),
            PathBuf::from("/out")
        );
    }

    /// Lists nothing; test encodes succeed only for `usable`
    struct TestEncodes {
        usable: &'static str,
    }

    #[async_trait::async_trait]
    impl EncoderPort for TestEncodes {
        async fn list_encoders(&self) -> crate::error::ConvertResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn test_encode(&self, encoder: &str) -> bool {
            assert!(encoder.contains("nvenc"), "CPU encoder {} was test encoded", encoder);
            encoder == self.usable
        }
    }

    #[tokio::test]
    async fn test_hardware_check_only_for_gpu_encoders() {
        let catalog = PresetCatalog::default();
        let encoders = TestEncodes { usable: "h264_nvenc" };

        let cpu = &catalog.find("mp4-cpu").unwrap().settings;
        assert!(check_hardware_encoder(&encoders, cpu).await);

        let h264 = &catalog.find("mp4-gpu-fast").unwrap().settings;
        assert!(check_hardware_encoder(&encoders, h264).await);

        let hevc = &catalog.find("hevc-gpu").unwrap().settings;
        assert!(!check_hardware_encoder(&encoders, hevc).await);
    }

    #[test]
    fn test_user_presets_join_the_catalog() {
        let config = crate::adapters::TomlConfigAdapter::new()
            .parse("[presets.archive]\ndescription = \"Archive\"\n")
            .unwrap();
        let catalog = catalog(&config);
        assert!(catalog.find("archive").is_some());
        assert!(catalog.find("mp4-cpu").is_some());
    }
}
