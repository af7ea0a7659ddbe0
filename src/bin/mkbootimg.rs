use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::LevelFilter;
use mkbootimg::config::profile::{parse_hex_u32, BoardProfile};
use mkbootimg::manifest::ImageManifest;
use mkbootimg::{ImageBuilder, ImageConfig, ImageSummary, PayloadFiles};

#[derive(Parser, Debug)]
#[command(
    name = "mkbootimg",
    version,
    about = "Assemble a boot image from a kernel, ramdisk, second stage and device tree"
)]
struct Args {
    #[arg(long, value_name = "FILE")]
    kernel: PathBuf,

    #[arg(long, value_name = "FILE")]
    ramdisk: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    second: Option<PathBuf>,

    #[arg(long, value_name = "KERNEL-COMMANDLINE")]
    cmdline: Option<String>,

    #[arg(long, value_name = "BOARDNAME")]
    board: Option<String>,

    #[arg(long, value_name = "ADDRESS", value_parser = parse_hex_u32)]
    base: Option<u32>,

    #[arg(long, value_name = "PAGESIZE")]
    pagesize: Option<u32>,

    #[arg(long, value_name = "FILE")]
    dt: Option<PathBuf>,

    #[arg(long = "kernel_offset", alias = "kernel-offset", value_name = "ADDRESS", value_parser = parse_hex_u32)]
    kernel_offset: Option<u32>,

    #[arg(long = "ramdisk_offset", alias = "ramdisk-offset", value_name = "ADDRESS", value_parser = parse_hex_u32)]
    ramdisk_offset: Option<u32>,

    #[arg(long = "second_offset", alias = "second-offset", value_name = "ADDRESS", value_parser = parse_hex_u32)]
    second_offset: Option<u32>,

    #[arg(long = "tags_offset", alias = "tags-offset", value_name = "ADDRESS", value_parser = parse_hex_u32)]
    tags_offset: Option<u32>,

    #[arg(long, value_name = "VALUE", value_parser = parse_hex_u32)]
    unknown: Option<u32>,

    /// Print the image id to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    id: bool,

    #[arg(long, value_name = "FILE")]
    signature: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// TOML board profile with defaults for the values above
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Write a JSON manifest of the finished image
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn image_config(&self) -> Result<ImageConfig> {
        let mut config = ImageConfig::default();
        if let Some(path) = &self.profile {
            BoardProfile::load(path)?.apply_to(&mut config);
        }

        if let Some(page_size) = self.pagesize {
            config.page_size = page_size;
        }
        if let Some(base) = self.base {
            config.base = base;
        }
        if let Some(offset) = self.kernel_offset {
            config.kernel_offset = offset;
        }
        if let Some(offset) = self.ramdisk_offset {
            config.ramdisk_offset = offset;
        }
        if let Some(offset) = self.second_offset {
            config.second_offset = offset;
        }
        if let Some(offset) = self.tags_offset {
            config.tags_offset = offset;
        }
        if let Some(unknown) = self.unknown {
            config.unknown = unknown;
        }
        if let Some(board) = &self.board {
            config.board_name = board.clone();
        }
        if let Some(cmdline) = &self.cmdline {
            config.command_line = cmdline.clone();
        }
        config.emit_id = self.id;

        Ok(config)
    }

    fn payload_files(&self) -> PayloadFiles {
        PayloadFiles {
            kernel: Some(self.kernel.clone()),
            ramdisk: self.ramdisk.clone(),
            second: self.second.clone(),
            device_tree: self.dt.clone(),
            signature: self.signature.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let stdout = io::stdout();
    let summary = run(&args, &mut stdout.lock())?;

    if let Some(path) = &args.manifest {
        ImageManifest::for_image(&args.output, &summary)?.write(path)?;
        log::info!("wrote manifest '{}'", path.display());
    }

    Ok(())
}

/// Validate, load the payloads and write the image. The id, when requested,
/// goes to `id_out`.
fn run<S: Write + ?Sized>(args: &Args, id_out: &mut S) -> Result<ImageSummary> {
    let config = args.image_config()?;
    config.validate().context("invalid image configuration")?;

    let loaded = args.payload_files().load()?;

    let builder = ImageBuilder::new(&config, loaded.as_payloads())
        .context("invalid image configuration")?;
    let summary = builder
        .write_to_path(&args.output, id_out)
        .with_context(|| format!("building boot image '{}'", args.output.display()))?;
    log::info!(
        "wrote '{}' ({} bytes)",
        args.output.display(),
        summary.total_len
    );
    Ok(summary)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
