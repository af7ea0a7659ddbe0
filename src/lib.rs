//! Boot image assembly.
//!
//! Builds the flat boot image a bootloader loads: a fixed-size header
//! followed by the kernel, ramdisk, second-stage loader and device tree,
//! each aligned to the configured page size, with an optional signature
//! appended at the end.
//!
//! - [`config`] - Image configuration, page sizes and board profiles
//! - [`payload`] - Payload sets and the file loader
//! - [`image`] - Header encoding, content identifier and segment emission
//! - [`manifest`] - JSON description of a written image
//! - [`error`] - Configuration, input and emission errors
//!
//! # Example
//!
//! ```rust,no_run
//! use mkbootimg::{write_image, ImageConfig, PayloadFiles};
//! use std::path::Path;
//!
//! let files = PayloadFiles {
//!     kernel: Some("out/zImage".into()),
//!     ramdisk: Some("out/ramdisk.cpio.gz".into()),
//!     ..PayloadFiles::default()
//! };
//! let loaded = files.load()?;
//!
//! let config = ImageConfig {
//!     page_size: 4096,
//!     command_line: "console=ttyS0,115200".into(),
//!     ..ImageConfig::default()
//! };
//! let summary = write_image(Path::new("out/boot.img"), &config, loaded.as_payloads())?;
//! println!("wrote {} bytes", summary.total_len);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod image;
pub mod manifest;
pub mod payload;

pub use config::{ImageConfig, PageSize};
pub use error::{BuildError, ConfigError, EmissionError, InputError};
pub use image::{build, write_image, ImageBuilder, ImageSummary, Segment};
pub use payload::{LoadedPayloads, PayloadFiles, PayloadRole, Payloads};
