use clap::{Parser, Subcommand, ValueEnum};
use qr_frame::tools::{
    ToolError, dataset_iter, dataset_root_from_env, encoded_frame_from_file, raw_frame_from_file,
    read_frame_json, yuv_frame_from_image,
};
use qr_frame::utils::yuv::YuvLayout;
use qr_frame::{
    FrameDescriptor, Orientation, Outcome, PixelFormat, PixelRect, Pipeline, PipelineConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "qrtool", version, about = "QR frame pipeline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Sniff the file as an encoded image
    Auto,
    /// NV21 (raw dump with --width/--height, else synthesized from an image)
    Nv21,
    /// Planar YUV 4:2:0 (raw dump with --width/--height, else synthesized from an image)
    Yuv420,
    /// JPEG file
    Jpeg,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline on a single frame file
    Detect {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
        format: FormatArg,
        #[arg(long, default_value_t = 0)]
        width: u32,
        #[arg(long, default_value_t = 0)]
        height: u32,
        #[arg(long)]
        orientation: Option<String>,
        #[arg(long)]
        force_bitmap: bool,
    },
    /// Run the pipeline on a JSON frame description
    Frame {
        #[arg(long)]
        input: PathBuf,
    },
    /// Re-encode a raw YUV dump as JPEG the way the bitmap fallback does
    ToJpeg {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum)]
        format: FormatArg,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        quality: Option<u8>,
    },
    /// Run every image in a dataset through the pipeline and report the hit rate
    ScanDir {
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value_t = FormatArg::Nv21)]
        format: FormatArg,
        #[arg(long)]
        force_bitmap: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Detect {
            input,
            format,
            width,
            height,
            orientation,
            force_bitmap,
        } => {
            let orientation = orientation
                .as_deref()
                .map(Orientation::from_name)
                .unwrap_or_default();
            runtime.block_on(detect_cmd(&input, format, width, height, orientation, force_bitmap))
        }
        Command::Frame { input } => runtime.block_on(frame_cmd(&input)),
        Command::ToJpeg {
            input,
            format,
            width,
            height,
            output,
            quality,
        } => to_jpeg_cmd(&input, format, width, height, &output, quality),
        Command::ScanDir {
            root,
            limit,
            format,
            force_bitmap,
        } => runtime.block_on(scan_dir_cmd(root, limit, format, force_bitmap)),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn pipeline(force_bitmap: bool) -> Result<Pipeline, ToolError> {
    let config = PipelineConfig::from_env();
    let config = if force_bitmap {
        config.with_force_bitmap(true)
    } else {
        config
    };
    Pipeline::with_rqrr(config).map_err(|e| ToolError::Usage(e.to_string()))
}

fn layout_for(format: FormatArg) -> Option<YuvLayout> {
    match format {
        FormatArg::Nv21 => Some(YuvLayout::Nv21),
        FormatArg::Yuv420 => Some(YuvLayout::I420),
        FormatArg::Auto | FormatArg::Jpeg => None,
    }
}

fn load_frame(
    input: &Path,
    format: FormatArg,
    width: u32,
    height: u32,
    orientation: Orientation,
) -> Result<FrameDescriptor, ToolError> {
    match (layout_for(format), width > 0 && height > 0) {
        (Some(YuvLayout::Nv21), true) => {
            raw_frame_from_file(input, PixelFormat::Nv21, width, height, orientation)
        }
        (Some(YuvLayout::I420), true) => {
            raw_frame_from_file(input, PixelFormat::Yuv420, width, height, orientation)
        }
        (Some(layout), false) => yuv_frame_from_image(input, layout, orientation),
        (None, _) => {
            let mut frame = encoded_frame_from_file(input, orientation)?;
            if format == FormatArg::Jpeg {
                frame.format = PixelFormat::Jpeg;
            }
            Ok(frame)
        }
    }
}

fn print_outcome(outcome: &Outcome) -> Result<ExitCode, ToolError> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn detect_cmd(
    input: &Path,
    format: FormatArg,
    width: u32,
    height: u32,
    orientation: Orientation,
    force_bitmap: bool,
) -> Result<ExitCode, ToolError> {
    let frame = load_frame(input, format, width, height, orientation)?;
    log::info!(
        "{}: {}x{} {} ({} bytes)",
        input.display(),
        frame.width,
        frame.height,
        frame.format,
        frame.bytes.len()
    );
    let pipeline = pipeline(force_bitmap)?;
    let start = Instant::now();
    let outcome = pipeline.detect_frame(frame).await;
    log::info!("detection took {:.2?}", start.elapsed());
    print_outcome(&outcome)
}

async fn frame_cmd(input: &Path) -> Result<ExitCode, ToolError> {
    let value = read_frame_json(input)?;
    let pipeline = pipeline(false)?;
    let outcome = pipeline.detect(Some(&value)).await;
    print_outcome(&outcome)
}

fn to_jpeg_cmd(
    input: &Path,
    format: FormatArg,
    width: u32,
    height: u32,
    output: &Path,
    quality: Option<u8>,
) -> Result<ExitCode, ToolError> {
    let layout = layout_for(format)
        .ok_or_else(|| ToolError::Usage("--format must be nv21 or yuv420".to_string()))?;
    let frame = load_frame(input, format, width, height, Orientation::Unknown)?;
    let quality = quality.unwrap_or(PipelineConfig::from_env().jpeg_quality);
    let region = PixelRect::new(0, 0, frame.width as i32, frame.height as i32);
    let jpeg = qr_frame::normalize::fallback::yuv_to_jpeg(
        &frame.bytes,
        layout,
        frame.width,
        frame.height,
        region,
        quality,
    )
    .map_err(|e| ToolError::Usage(e.to_string()))?;
    std::fs::write(output, &jpeg)?;
    println!(
        "Wrote {} ({}x{}, {} bytes, quality {})",
        output.display(),
        frame.width,
        frame.height,
        jpeg.len(),
        quality
    );
    Ok(ExitCode::SUCCESS)
}

async fn scan_dir_cmd(
    root: Option<PathBuf>,
    limit: Option<usize>,
    format: FormatArg,
    force_bitmap: bool,
) -> Result<ExitCode, ToolError> {
    let root = root.unwrap_or_else(dataset_root_from_env);
    if !root.exists() {
        return Err(ToolError::Usage(format!(
            "Dataset root not found: {}",
            root.display()
        )));
    }

    let pipeline = pipeline(force_bitmap)?;
    let mut total = 0usize;
    let mut found = 0usize;
    let mut failed = 0usize;

    for path in dataset_iter(&root, limit) {
        let frame = match load_frame(&path, format, 0, 0, Orientation::Portrait) {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("  [skip] {}: {}", path.display(), err);
                continue;
            }
        };
        total += 1;

        let start = Instant::now();
        let outcome = pipeline.detect_frame(frame).await;
        let elapsed = start.elapsed();
        let label = match &outcome {
            Outcome::Success { result: Some(result) } => {
                found += 1;
                result.value.clone().unwrap_or_else(|| "<unreadable>".to_string())
            }
            Outcome::Success { result: None } => "-".to_string(),
            Outcome::Failure { code, .. } => {
                failed += 1;
                code.to_string()
            }
        };
        println!("  {} -> {} ({:.2?})", path.display(), label, elapsed);
    }

    if total == 0 {
        println!("No images found under {}", root.display());
        return Ok(ExitCode::SUCCESS);
    }
    let rate = (found as f64 / total as f64) * 100.0;
    println!(
        "Found codes in {}/{} frames = {:.2}% ({} failures)",
        found, total, rate, failed
    );
    Ok(ExitCode::SUCCESS)
}
