//! TOML board profiles.
//!
//! A profile carries per-board defaults so the command line only needs the
//! payload paths:
//!
//! ```toml
//! [image]
//! page_size = 4096
//! base = "0x80000000"
//! tags_offset = "0x01e00000"
//! board = "msm8974"
//! cmdline = "console=ttyHSL0,115200,n8 androidboot.hardware=qcom"
//! ```
//!
//! Values from the profile replace the built-in defaults; explicit flags on
//! the command line replace profile values.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::ImageConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileToml {
    #[serde(default)]
    image: ImageProfileToml,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageProfileToml {
    page_size: Option<u32>,
    base: Option<String>,
    kernel_offset: Option<String>,
    ramdisk_offset: Option<String>,
    second_offset: Option<String>,
    tags_offset: Option<String>,
    unknown: Option<String>,
    board: Option<String>,
    cmdline: Option<String>,
}

/// Configuration values read from a board profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardProfile {
    pub page_size: Option<u32>,
    pub base: Option<u32>,
    pub kernel_offset: Option<u32>,
    pub ramdisk_offset: Option<u32>,
    pub second_offset: Option<u32>,
    pub tags_offset: Option<u32>,
    pub unknown: Option<u32>,
    pub board: Option<String>,
    pub cmdline: Option<String>,
}

impl BoardProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading board profile '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing board profile '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let parsed: ProfileToml = toml::from_str(text)?;
        let image = parsed.image;

        Ok(Self {
            page_size: image.page_size,
            base: parse_hex_field("base", image.base.as_deref())?,
            kernel_offset: parse_hex_field("kernel_offset", image.kernel_offset.as_deref())?,
            ramdisk_offset: parse_hex_field("ramdisk_offset", image.ramdisk_offset.as_deref())?,
            second_offset: parse_hex_field("second_offset", image.second_offset.as_deref())?,
            tags_offset: parse_hex_field("tags_offset", image.tags_offset.as_deref())?,
            unknown: parse_hex_field("unknown", image.unknown.as_deref())?,
            board: image.board,
            cmdline: image.cmdline,
        })
    }

    /// Overwrite `config` fields with every value set in the profile.
    pub fn apply_to(&self, config: &mut ImageConfig) {
        if let Some(page_size) = self.page_size {
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
    }
}

/// Parse a hexadecimal `u32`, with or without a `0x` prefix.
pub fn parse_hex_u32(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        bail!("expected a hexadecimal value, got '{}'", raw);
    }
    u32::from_str_radix(digits, 16)
        .with_context(|| format!("invalid 32-bit hexadecimal value '{}'", raw))
}

fn parse_hex_field(field: &str, raw: Option<&str>) -> Result<Option<u32>> {
    raw.map(|value| parse_hex_u32(value).with_context(|| format!("field '{field}'")))
        .transpose()
}
