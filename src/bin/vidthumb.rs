use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::mpsc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use vidthumb::{
    FfmpegLogLevel, MediaProbe, PoolOptions, ThumbnailOptions, ThumbnailPool, ThumbnailRequest,
    ThumbnailResult, Thumbnailer,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidthumb generate clips/*.mp4 --out-dir thumbs --size 320\n  vidthumb generate movie.mkv --out-dir thumbs --json\n  vidthumb probe input.mp4 --json\n  vidthumb completions zsh > _vidthumb";

#[derive(Debug, Parser)]
#[command(
    name = "vidthumb",
    version,
    about = "Generate JPEG preview thumbnails for video files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate one thumbnail per input.
    #[command(
        about = "Generate thumbnails",
        after_help = "Examples:\n  vidthumb generate a.mp4 b.mkv --out-dir thumbs\n  vidthumb generate clips/*.mp4 --out-dir thumbs --jobs 4 --timeout 10 --progress"
    )]
    Generate {
        /// Input video paths.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory receiving `<stem>.jpg` for every input (`<stem>-2.jpg` and so on when stems repeat).
        #[arg(long)]
        out_dir: PathBuf,
        /// Maximum width or height of each thumbnail, in pixels.
        #[arg(long, default_value_t = 256)]
        size: u32,
        /// JPEG quality (0-100).
        #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
        quality: u8,
        /// Worker count (defaults to the number of CPUs).
        #[arg(long)]
        jobs: Option<usize>,
        /// Per-file timeout in seconds; 0 disables it.
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Print results as machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Print the streams of a media file.
    #[command(
        about = "Print container and stream information",
        visible_alias = "info",
        after_help = "Examples:\n  vidthumb probe input.mp4\n  vidthumb probe input.mp4 --json"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn destination_for(input: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}.jpg", stem_of(input)))
}

fn stem_of(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumbnail".to_string())
}

/// One destination per input. Inputs sharing a stem get `<stem>-2.jpg`,
/// `<stem>-3.jpg`, ... in input order so no two requests write one path.
fn destinations_for(inputs: &[PathBuf], out_dir: &Path) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let mut destination = destination_for(input, out_dir);
            let mut suffix = 2;
            while !taken.insert(destination.clone()) {
                destination = out_dir.join(format!("{}-{suffix}.jpg", stem_of(input)));
                suffix += 1;
            }
            destination
        })
        .collect()
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        vidthumb::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn result_to_json(request: &ThumbnailRequest, result: &ThumbnailResult) -> serde_json::Value {
    match result {
        Ok(thumbnail) => json!({
            "source": request.source.display().to_string(),
            "destination": thumbnail.destination.display().to_string(),
            "ok": true,
            "width": thumbnail.width,
            "height": thumbnail.height,
            "timestamp_seconds": thumbnail.timestamp.as_secs_f64(),
            "bytes": thumbnail.bytes,
        }),
        Err(error) => json!({
            "source": request.source.display().to_string(),
            "destination": request.destination.display().to_string(),
            "ok": false,
            "kind": format!("{:?}", error.kind()),
            "error": error.to_string(),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn generate(
    inputs: Vec<PathBuf>,
    out_dir: PathBuf,
    size: u32,
    quality: u8,
    jobs: Option<usize>,
    timeout: u64,
    json: bool,
    progress: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
    let thumbnailer = Thumbnailer::new(ThumbnailOptions::new().with_timeout(timeout));
    let mut pool_options = PoolOptions::default();
    if let Some(jobs) = jobs {
        pool_options = pool_options.with_size(jobs);
    }
    let pool = ThumbnailPool::new(thumbnailer, pool_options)?;

    let requests: Vec<ThumbnailRequest> = inputs
        .iter()
        .zip(destinations_for(&inputs, &out_dir))
        .map(|(input, destination)| {
            ThumbnailRequest::new(input, destination)
                .with_max_dimension(size)
                .with_quality(quality)
        })
        .collect();

    let bar = if progress {
        let bar = ProgressBar::new(requests.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        Some(bar)
    } else {
        None
    };

    let (sender, receiver) = mpsc::channel();
    for (index, request) in requests.iter().enumerate() {
        let sender = sender.clone();
        let bar = bar.clone();
        let name = request
            .source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        pool.spawn(request.clone(), None, move |result| {
            if let Some(bar) = &bar {
                bar.set_message(name);
                bar.inc(1);
            }
            let _ = sender.send((index, result));
        });
    }
    drop(sender);

    let mut results: Vec<Option<ThumbnailResult>> = requests.iter().map(|_| None).collect();
    for (index, result) in receiver {
        results[index] = Some(result);
    }
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let mut all_succeeded = true;
    let mut payload = Vec::with_capacity(requests.len());
    for (request, result) in requests.iter().zip(results) {
        let result = result.ok_or("worker exited without reporting a result")?;
        all_succeeded &= result.is_ok();
        if json {
            payload.push(result_to_json(request, &result));
            continue;
        }
        match &result {
            Ok(thumbnail) => println!(
                "{} {} ({}x{})",
                "saved".green().bold(),
                thumbnail.destination.display(),
                thumbnail.width,
                thumbnail.height
            ),
            Err(error) => eprintln!(
                "{} {}: {}",
                "failed".red().bold(),
                request.source.display(),
                error.to_string().red()
            ),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(all_succeeded)
}

fn probe(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let source = MediaProbe::probe(input)?;
    if json {
        let payload = json!({
            "path": source.path.display().to_string(),
            "format": source.format,
            "duration_seconds": source.duration.as_secs_f64(),
            "video_stream_index": source.video_stream_index,
            "streams": source.streams.iter().map(|stream| json!({
                "index": stream.index,
                "kind": format!("{:?}", stream.kind),
                "codec": stream.codec,
                "width": stream.width,
                "height": stream.height,
                "pixel_format": stream.pixel_format,
                "duration_seconds": stream.duration.map(|duration| duration.as_secs_f64()),
                "attached_picture": stream.attached_picture,
                "decodable": stream.decodable,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{} {}", "format".cyan().bold(), source.format);
    println!(
        "{} {:.3}s",
        "duration".cyan().bold(),
        source.duration.as_secs_f64()
    );
    for stream in &source.streams {
        let marker = if stream.index == source.video_stream_index {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        let mut line = format!("{marker} #{} {:?} {}", stream.index, stream.kind, stream.codec);
        if stream.width > 0 {
            line.push_str(&format!(" {}x{}", stream.width, stream.height));
        }
        if let Some(pixel_format) = &stream.pixel_format {
            line.push_str(&format!(" {pixel_format}"));
        }
        if stream.attached_picture {
            line.push_str(" (cover art)");
        }
        println!("{line}");
    }
    Ok(())
}

fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Generate {
            inputs,
            out_dir,
            size,
            quality,
            jobs,
            timeout,
            json,
            progress,
        } => generate(inputs, out_dir, size, quality, jobs, timeout, json, progress),
        Commands::Probe { input, json } => probe(&input, json).map(|()| true),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidthumb", &mut std::io::stdout());
            Ok(true)
        }
    }
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("WARN"), Some(FfmpegLogLevel::Warning));
        assert_eq!(parse_log_level("quiet"), Some(FfmpegLogLevel::Quiet));
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn destinations_use_input_stem() {
        assert_eq!(
            destination_for(Path::new("/videos/holiday.final.mp4"), Path::new("thumbs")),
            PathBuf::from("thumbs/holiday.final.jpg")
        );
    }

    #[test]
    fn shared_stems_get_distinct_destinations() {
        let inputs = [
            PathBuf::from("a/clip.mp4"),
            PathBuf::from("b/clip.mkv"),
            PathBuf::from("c/clip-2.mp4"),
            PathBuf::from("d/other.webm"),
        ];
        assert_eq!(
            destinations_for(&inputs, Path::new("thumbs")),
            vec![
                PathBuf::from("thumbs/clip.jpg"),
                PathBuf::from("thumbs/clip-2.jpg"),
                PathBuf::from("thumbs/clip-2-2.jpg"),
                PathBuf::from("thumbs/other.jpg"),
            ]
        );
    }

    #[test]
    fn generate_arguments_parse() {
        let cli = Cli::try_parse_from([
            "vidthumb", "generate", "a.mp4", "b.mkv", "--out-dir", "thumbs", "--size", "320",
            "--jobs", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                inputs, size, jobs, quality, ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(size, 320);
                assert_eq!(jobs, Some(2));
                assert_eq!(quality, 80);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        let result = Cli::try_parse_from([
            "vidthumb", "generate", "a.mp4", "--out-dir", "thumbs", "--quality", "101",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
