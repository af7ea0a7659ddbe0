//! Boot image assembly.
//!
//! An image is a header followed by the payloads, each segment zero-padded
//! to a page boundary:
//!
//! ```text
//! [ header      | pad ]
//! [ kernel      | pad ]
//! [ ramdisk     | pad ]   zero-length when absent
//! [ second      | pad ]   zero-length when absent
//! [ device tree | pad ]   only when present
//! [ signature ]           only when present, 272 bytes, unpadded
//! ```
//!
//! [`ImageBuilder`] validates the configuration, populates the header and
//! content identifier, then emits the segments in that order. When the
//! identifier is requested it is printed between the second-stage and
//! device-tree segments; tools that scrape the output depend on that
//! position.
//!
//! File targets are written all-or-nothing: if any write fails the partial
//! file is removed.

pub mod header;
pub mod id;
pub mod padding;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::{ImageConfig, PageSize};
use crate::error::{BuildError, ConfigError, EmissionError};
use crate::payload::{PayloadRole, Payloads, SIGNATURE_SIZE};
use header::{BootImageHeader, BOOT_ID_SIZE};

/// A segment of the image, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Header,
    Kernel,
    Ramdisk,
    Second,
    DeviceTree,
    Signature,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk",
            Self::Second => "second",
            Self::DeviceTree => "dt",
            Self::Signature => "signature",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The emission step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Write(Segment),
    Pad(Segment),
    PrintId,
    Flush,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Write(segment) => write!(f, "{}", segment),
            Self::Pad(segment) => write!(f, "{} padding", segment),
            Self::PrintId => f.write_str("id output"),
            Self::Flush => f.write_str("flush"),
        }
    }
}

/// Placement of one emitted segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecord {
    pub segment: Segment,
    pub offset: u64,
    pub len: u64,
    /// Zero bytes written after the segment.
    pub padding: u64,
}

impl SegmentRecord {
    pub fn padded_len(&self) -> u64 {
        self.len + self.padding
    }
}

/// Result of a successful emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub header: BootImageHeader,
    pub page_size: PageSize,
    pub segments: Vec<SegmentRecord>,
    pub total_len: u64,
}

impl ImageSummary {
    pub fn id(&self) -> &[u8; BOOT_ID_SIZE] {
        &self.header.id
    }

    pub fn segment(&self, segment: Segment) -> Option<&SegmentRecord> {
        self.segments.iter().find(|record| record.segment == segment)
    }
}

/// Validated, populated image ready to be emitted.
#[derive(Debug, Clone)]
pub struct ImageBuilder<'a> {
    payloads: Payloads<'a>,
    page_size: PageSize,
    emit_id: bool,
    header: BootImageHeader,
}

impl<'a> ImageBuilder<'a> {
    /// Validate `config` against `payloads`, populate the header and compute
    /// the content identifier. Nothing is written.
    pub fn new(config: &ImageConfig, payloads: Payloads<'a>) -> Result<Self, ConfigError> {
        let page_size = config.validate()?;
        // An empty kernel counts as absent; only the device tree
        // distinguishes empty from absent.
        if payloads.kernel.map_or(true, <[u8]>::is_empty) {
            return Err(ConfigError::MissingKernel);
        }

        let (cmdline, extra_cmdline) = config.split_command_line();
        let mut header = BootImageHeader {
            kernel_size: size_field(PayloadRole::Kernel, payloads.len_of(PayloadRole::Kernel))?,
            kernel_addr: config.kernel_addr(),
            ramdisk_size: size_field(PayloadRole::Ramdisk, payloads.len_of(PayloadRole::Ramdisk))?,
            ramdisk_addr: config.ramdisk_addr(),
            second_size: size_field(PayloadRole::Second, payloads.len_of(PayloadRole::Second))?,
            second_addr: config.second_addr(),
            tags_addr: config.tags_addr(),
            page_size: page_size.get(),
            dt_size: size_field(
                PayloadRole::DeviceTree,
                payloads.len_of(PayloadRole::DeviceTree),
            )?,
            unknown: config.unknown,
            name: config.board_name.as_bytes().to_vec(),
            cmdline: cmdline.to_vec(),
            id: [0; BOOT_ID_SIZE],
            extra_cmdline: extra_cmdline.to_vec(),
        };
        header.id = id::compute(&header, &payloads);

        Ok(Self {
            payloads,
            page_size,
            emit_id: config.emit_id,
            header,
        })
    }

    pub fn header(&self) -> &BootImageHeader {
        &self.header
    }

    pub fn id(&self) -> &[u8; BOOT_ID_SIZE] {
        &self.header.id
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Write the image to `out`, printing the identifier to `id_out` when
    /// requested by the configuration.
    pub fn emit<W, S>(&self, out: &mut W, id_out: &mut S) -> Result<ImageSummary, EmissionError>
    where
        W: Write + ?Sized,
        S: Write + ?Sized,
    {
        let mut emitter = Emitter::new(out, self.page_size);

        emitter.padded(Segment::Header, &self.header.to_bytes())?;
        emitter.padded(Segment::Kernel, self.payloads.kernel.unwrap_or_default())?;
        emitter.padded(Segment::Ramdisk, self.payloads.ramdisk.unwrap_or_default())?;
        emitter.padded(Segment::Second, self.payloads.second.unwrap_or_default())?;

        if self.emit_id {
            writeln!(id_out, "{}", id::format_id(&self.header.id))
                .and_then(|()| id_out.flush())
                .map_err(|e| EmissionError::new(Step::PrintId, e))?;
        }

        if let Some(dt) = self.payloads.device_tree {
            emitter.padded(Segment::DeviceTree, dt)?;
        }
        if let Some(signature) = self.payloads.signature {
            emitter.signature(signature)?;
        }

        let summary = emitter.finish(self.header.clone());
        log::info!(
            "assembled boot image: {} bytes, page size {}",
            summary.total_len,
            summary.page_size.get()
        );
        Ok(summary)
    }

    /// Emit the image into memory.
    pub fn to_vec<S: Write + ?Sized>(&self, id_out: &mut S) -> Result<Vec<u8>, EmissionError> {
        let mut out = Vec::new();
        self.emit(&mut out, id_out)?;
        Ok(out)
    }

    /// Create or truncate `path` and emit the image into it.
    ///
    /// On failure the file is removed.
    pub fn write_to_path<S: Write + ?Sized>(
        &self,
        path: &Path,
        id_out: &mut S,
    ) -> Result<ImageSummary, EmissionError> {
        let file = File::create(path).map_err(|e| EmissionError::new(Step::Create, e).at(path))?;
        self.write_to_target(path, BufWriter::new(file), id_out)
    }

    /// Emit into `out`, which writes to the file at `path`; the file is
    /// removed if emission or the final flush fails.
    pub(crate) fn write_to_target<W, S>(
        &self,
        path: &Path,
        mut out: W,
        id_out: &mut S,
    ) -> Result<ImageSummary, EmissionError>
    where
        W: Write,
        S: Write + ?Sized,
    {
        let result = self.emit(&mut out, id_out).and_then(|summary| {
            out.flush()
                .map_err(|e| EmissionError::new(Step::Flush, e))?;
            Ok(summary)
        });

        match result {
            Ok(summary) => Ok(summary),
            Err(err) => {
                drop(out);
                discard_output(path);
                Err(err.at(path))
            }
        }
    }
}

/// Build an image into memory. The identifier goes to stdout when
/// `config.emit_id` is set.
pub fn build(config: &ImageConfig, payloads: Payloads<'_>) -> Result<Vec<u8>, BuildError> {
    let builder = ImageBuilder::new(config, payloads)?;
    let stdout = io::stdout();
    Ok(builder.to_vec(&mut stdout.lock())?)
}

/// Build an image into the file at `path`. The identifier goes to stdout
/// when `config.emit_id` is set.
///
/// Configuration errors are reported before `path` is touched. Emission
/// errors leave no file behind.
pub fn write_image(
    path: &Path,
    config: &ImageConfig,
    payloads: Payloads<'_>,
) -> Result<ImageSummary, BuildError> {
    let builder = ImageBuilder::new(config, payloads)?;
    let stdout = io::stdout();
    Ok(builder.write_to_path(path, &mut stdout.lock())?)
}

fn size_field(role: PayloadRole, len: usize) -> Result<u32, ConfigError> {
    u32::try_from(len).map_err(|_| ConfigError::PayloadTooLarge { role, len })
}

fn discard_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!(
                "could not remove partial image '{}': {}",
                path.display(),
                e
            );
        }
    }
}

struct Emitter<'w, W: Write + ?Sized> {
    out: &'w mut W,
    page_size: PageSize,
    offset: u64,
    segments: Vec<SegmentRecord>,
}

impl<'w, W: Write + ?Sized> Emitter<'w, W> {
    fn new(out: &'w mut W, page_size: PageSize) -> Self {
        Self {
            out,
            page_size,
            offset: 0,
            segments: Vec::new(),
        }
    }

    fn padded(&mut self, segment: Segment, bytes: &[u8]) -> Result<(), EmissionError> {
        self.out
            .write_all(bytes)
            .map_err(|e| EmissionError::new(Step::Write(segment), e))?;
        let padding = padding::write_padding(&mut *self.out, self.page_size, bytes.len())
            .map_err(|e| EmissionError::new(Step::Pad(segment), e))?;
        self.record(segment, bytes.len(), padding);
        Ok(())
    }

    fn signature(&mut self, signature: &[u8]) -> Result<(), EmissionError> {
        if signature.len() < SIGNATURE_SIZE {
            return Err(EmissionError::new(
                Step::Write(Segment::Signature),
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!(
                        "short write: signature is {} bytes, expected {}",
                        signature.len(),
                        SIGNATURE_SIZE
                    ),
                ),
            ));
        }
        if signature.len() > SIGNATURE_SIZE {
            log::warn!(
                "signature is {} bytes; only the first {} are written",
                signature.len(),
                SIGNATURE_SIZE
            );
        }

        self.out
            .write_all(&signature[..SIGNATURE_SIZE])
            .map_err(|e| EmissionError::new(Step::Write(Segment::Signature), e))?;
        self.record(Segment::Signature, SIGNATURE_SIZE, 0);
        Ok(())
    }

    fn record(&mut self, segment: Segment, len: usize, padding: usize) {
        let record = SegmentRecord {
            segment,
            offset: self.offset,
            len: len as u64,
            padding: padding as u64,
        };
        log::debug!(
            "{:>9} at {:#010x}: {} bytes + {} padding",
            segment,
            record.offset,
            record.len,
            record.padding
        );
        self.offset += record.padded_len();
        self.segments.push(record);
    }

    fn finish(self, header: BootImageHeader) -> ImageSummary {
        ImageSummary {
            header,
            page_size: self.page_size,
            segments: self.segments,
            total_len: self.offset,
        }
    }
}
