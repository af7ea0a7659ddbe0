//! JSON manifest describing a written boot image.
//!
//! The manifest records where every segment landed, the content identifier,
//! and a SHA-256 of the final file so later stages can verify the image
//! without re-parsing it.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::image::id::format_id;
use crate::image::ImageSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub output: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub id: String,
    pub page_size: u32,
    pub board: String,
    pub kernel_addr: String,
    pub ramdisk_addr: String,
    pub second_addr: String,
    pub tags_addr: String,
    pub segments: Vec<SegmentEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub name: String,
    pub offset: u64,
    pub size_bytes: u64,
    pub padded_size_bytes: u64,
}

impl ImageManifest {
    /// Describe the image at `output`, hashing the file as it is on disk.
    pub fn for_image(output: &Path, summary: &ImageSummary) -> Result<Self> {
        let (sha256, size_bytes) = sha256_file(output)?;
        if size_bytes != summary.total_len {
            return Err(anyhow!(
                "image '{}' is {} bytes on disk, expected {}",
                output.display(),
                size_bytes,
                summary.total_len
            ));
        }

        let header = &summary.header;
        Ok(Self {
            output: output.display().to_string(),
            size_bytes,
            sha256,
            id: format_id(summary.id()),
            page_size: summary.page_size.get(),
            board: String::from_utf8_lossy(&header.name).into_owned(),
            kernel_addr: format!("{:#010x}", header.kernel_addr),
            ramdisk_addr: format!("{:#010x}", header.ramdisk_addr),
            second_addr: format!("{:#010x}", header.second_addr),
            tags_addr: format!("{:#010x}", header.tags_addr),
            segments: summary
                .segments
                .iter()
                .map(|record| SegmentEntry {
                    name: record.segment.as_str().to_string(),
                    offset: record.offset,
                    size_bytes: record.len,
                    padded_size_bytes: record.padded_len(),
                })
                .collect(),
        })
    }

    /// Write the manifest as pretty JSON, replacing `path` atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
            .with_context(|| format!("writing image manifest '{}'", path.display()))
    }
}

/// Serialize `value` next to `path` and rename it into place, so readers
/// never see a half-written manifest.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("serializing image manifest")?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating '{}'", dir.display()))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("manifest path '{}' has no file name", path.display()))?;
    let mut staged = file_name.to_os_string();
    staged.push(format!(".{}.partial", std::process::id()));
    let staged = dir.join(staged);

    let result = fs::write(&staged, json)
        .with_context(|| format!("writing '{}'", staged.display()))
        .and_then(|()| {
            fs::rename(&staged, path).with_context(|| {
                format!("moving '{}' into place", staged.display())
            })
        });
    if result.is_err() {
        let _ = fs::remove_file(&staged);
    }
    result
}

/// SHA-256 and length of the file at `path`.
fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let mut file =
        File::open(path).with_context(|| format!("opening image '{}'", path.display()))?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)
        .with_context(|| format!("hashing image '{}'", path.display()))?;
    Ok((hex::encode(hasher.finalize()), size))
}
