mod capture;
mod output;

use anyhow::{Context, Result};
use capture::{CaptureSource, ImageDirectory, WebcamCapture};
use clap::Parser;
use matte_stream::config::{AdaptiveConfig, Background, PipelineConfig};
use matte_stream::matting::{
    flatten, matte_to_rgb, suggested_downsample_ratio, AdaptiveRatio, InferenceBackend,
    MattingPipeline, StubBackend,
};
use matte_stream::FramePixels;
use output::{OutputSink, PngSequence, V4L2Output};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Read frames from a directory of images instead of a webcam
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Write RGBA PNG frames to this directory instead of a loopback device
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Capture resolution width
    #[arg(long, default_value_t = 1920)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 1080)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to the RVM model (ONNX file)
    /// If not provided, an identity model passes frames through the pipeline
    #[arg(long)]
    model: Option<PathBuf>,

    /// Width frames are resized to before inference
    #[arg(long, default_value_t = 512)]
    model_width: u32,

    /// Height frames are resized to before inference
    #[arg(long, default_value_t = 512)]
    model_height: u32,

    /// Downsample ratio in [0.1, 1.0]; derived from the capture size if omitted
    #[arg(long)]
    downsample_ratio: Option<f32>,

    /// Adjust the downsample ratio to hold the target frame rate
    #[arg(long)]
    adaptive: bool,

    /// Background behind the matte: green, blue, black, white, #rrggbb or blur:<sigma>
    #[arg(long)]
    background: Option<Background>,

    /// Show matte visualization (grayscale silhouette) instead of the composite
    #[arg(long)]
    show_matte: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 4)]
    intra_threads: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("matte-stream starting");
    tracing::info!("Model input: {}x{}", args.model_width, args.model_height);
    tracing::info!("Target FPS: {}", args.fps);

    let mut capture: Box<dyn CaptureSource> = match &args.input_dir {
        Some(dir) => Box::new(ImageDirectory::open(dir).context("Failed to open input directory")?),
        None => Box::new(
            WebcamCapture::new(args.input_device, args.capture_width, args.capture_height)
                .context("Failed to initialize webcam capture")?,
        ),
    };

    let mut output: Box<dyn OutputSink> = match &args.output_dir {
        Some(dir) => Box::new(PngSequence::create(dir).context("Failed to create output directory")?),
        None => Box::new(
            V4L2Output::new(&args.output_device, args.output_width, args.output_height)
                .context("Failed to initialize v4l2loopback output")?,
        ),
    };

    let backend = load_backend(&args)?;

    let (width, height) = capture
        .resolution()
        .unwrap_or((args.capture_width, args.capture_height));
    let downsample_ratio = args
        .downsample_ratio
        .unwrap_or_else(|| suggested_downsample_ratio(width, height));

    let config = PipelineConfig {
        input_width: args.model_width,
        input_height: args.model_height,
        downsample_ratio,
    };
    let pipeline = MattingPipeline::new(backend, &config).context("Invalid pipeline configuration")?;

    let adaptive = args.adaptive.then(|| {
        tracing::info!("Adaptive downsample ratio enabled");
        AdaptiveRatio::new(AdaptiveConfig::for_fps(args.fps), pipeline.downsample_ratio())
    });

    let settings = LoopSettings {
        target_fps: args.fps,
        paced: args.input_dir.is_none(),
        show_matte: args.show_matte,
        background: args.background.clone(),
        max_frames: args.max_frames,
    };

    run_pipeline(capture.as_mut(), output.as_mut(), pipeline, adaptive, &settings)
}

fn load_backend(args: &Args) -> Result<Box<dyn InferenceBackend>> {
    let Some(model_path) = &args.model else {
        tracing::info!("No model given, running the identity model (passthrough)");
        return Ok(Box::new(StubBackend::new()));
    };

    #[cfg(feature = "ort-backend")]
    {
        let backend = matte_stream::OrtBackend::load(model_path, args.intra_threads)
            .context("Failed to load matting model")?;
        Ok(Box::new(backend))
    }

    #[cfg(not(feature = "ort-backend"))]
    {
        let _ = args.intra_threads;
        anyhow::bail!(
            "Cannot load {}: built without the `ort-backend` feature",
            model_path.display()
        )
    }
}

struct LoopSettings {
    target_fps: u32,
    /// Sleep to hold the target rate (live sources only)
    paced: bool,
    show_matte: bool,
    background: Option<Background>,
    max_frames: Option<u64>,
}

fn run_pipeline<C, O>(
    capture: &mut C,
    output: &mut O,
    mut pipeline: MattingPipeline<Box<dyn InferenceBackend>>,
    mut adaptive: Option<AdaptiveRatio>,
    settings: &LoopSettings,
) -> Result<()>
where
    C: CaptureSource + ?Sized,
    O: OutputSink + ?Sized,
{
    let frame_duration = Duration::from_secs_f32(1.0 / settings.target_fps.max(1) as f32);
    let mut frame_count = 0u64;
    let mut skipped = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;
    let mut last_output: Option<FramePixels> = None;

    tracing::info!(
        "Starting main pipeline loop (show_matte={}, background={:?})",
        settings.show_matte,
        settings.background
    );
    if settings.paced {
        tracing::info!("Press Ctrl+C to stop");
    }

    loop {
        if settings.max_frames.is_some_and(|max| frame_count >= max) {
            tracing::info!("Reached {} frames, stopping", frame_count);
            break;
        }

        let loop_start = Instant::now();

        // Capture frame
        let capture_start = Instant::now();
        let Some(frame) = capture.capture_frame().context("Failed to capture frame")? else {
            tracing::info!("Input exhausted after {} frames", frame_count);
            break;
        };
        total_capture_time += capture_start.elapsed();

        // Matting
        let segment_start = Instant::now();
        let matted = pipeline
            .process_frame(&frame)
            .and_then(|result| render(result, &frame, settings, output.keeps_alpha()));
        let segment_time = segment_start.elapsed();
        total_segment_time += segment_time;

        let output_frame = match matted {
            Ok(rendered) => {
                if let Some(ratio) = adaptive.as_mut().and_then(|a| a.observe(segment_time)) {
                    pipeline.set_downsample_ratio(ratio);
                }
                Some(&*last_output.insert(rendered))
            }
            Err(err) => {
                // Skip the frame but keep showing the previous composite
                skipped += 1;
                tracing::warn!("Skipping frame {}: {}", frame_count + 1, err);
                last_output.as_ref()
            }
        };

        // Output frame
        let output_start = Instant::now();
        output
            .write_frame(output_frame.unwrap_or(&frame))
            .context("Failed to write frame")?;
        total_output_time += output_start.elapsed();

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_segment_ms = total_segment_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let total_ms = avg_capture_ms + avg_segment_ms + avg_output_ms;
            let actual_fps = 1000.0 / total_ms;

            tracing::info!(
                "Frame {}: capture={:.1}ms, segment={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}, ratio={:.2}, skipped={}",
                frame_count,
                avg_capture_ms,
                avg_segment_ms,
                avg_output_ms,
                total_ms,
                actual_fps,
                pipeline.downsample_ratio(),
                skipped
            );
        }

        // Frame rate limiting
        if settings.paced {
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    Ok(())
}

/// Pick what goes to the sink for a successfully matted frame
fn render(
    result: &matte_stream::MattingResult,
    source: &FramePixels,
    settings: &LoopSettings,
    sink_keeps_alpha: bool,
) -> matte_stream::Result<FramePixels> {
    if settings.show_matte {
        return matte_to_rgb(&result.alpha);
    }
    match &settings.background {
        Some(background) => flatten(&result.composite, background, source),
        None if sink_keeps_alpha => Ok(result.composite.clone()),
        None => Ok(result.foreground.clone()),
    }
}
