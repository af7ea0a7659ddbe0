//! Image configuration.
//!
//! - [`ImageConfig`] - the configuration record handed to the builder
//! - [`PageSize`] - validated page size used for segment alignment
//! - [`profile`] - TOML board profiles supplying configuration defaults

pub mod profile;

use crate::error::ConfigError;
use crate::image::header::{BOOT_ARGS_SIZE, BOOT_EXTRA_ARGS_SIZE, BOOT_NAME_SIZE};

pub const DEFAULT_PAGE_SIZE: u32 = 2048;
pub const DEFAULT_BASE: u32 = 0x1000_0000;
pub const DEFAULT_KERNEL_OFFSET: u32 = 0x0000_8000;
pub const DEFAULT_RAMDISK_OFFSET: u32 = 0x0100_0000;
pub const DEFAULT_SECOND_OFFSET: u32 = 0x00f0_0000;
pub const DEFAULT_TAGS_OFFSET: u32 = 0x0000_0100;
pub const DEFAULT_UNKNOWN: u32 = 0x0300_0000;

/// Page sizes a bootloader accepts.
pub const SUPPORTED_PAGE_SIZES: &[u32] = &[2048, 4096, 8192, 16384, 32768, 65536, 131072];

/// Longest command line the primary and extra fields can hold together.
pub const MAX_CMDLINE_LEN: usize = BOOT_ARGS_SIZE + BOOT_EXTRA_ARGS_SIZE - 2;

/// Longest command line that fits in the primary field alone.
pub const PRIMARY_CMDLINE_LEN: usize = BOOT_ARGS_SIZE - 1;

/// A page size from [`SUPPORTED_PAGE_SIZES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u32);

impl PageSize {
    pub fn new(size: u32) -> Result<Self, ConfigError> {
        if SUPPORTED_PAGE_SIZES.contains(&size) {
            Ok(Self(size))
        } else {
            Err(ConfigError::UnsupportedPageSize(size))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Zero bytes needed after an item of `len` bytes to reach a page boundary.
    pub fn padding_for(self, len: usize) -> usize {
        let mask = self.0 as usize - 1;
        match len & mask {
            0 => 0,
            rem => self.0 as usize - rem,
        }
    }
}

/// Configuration record for one image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub page_size: u32,
    pub base: u32,
    pub kernel_offset: u32,
    pub ramdisk_offset: u32,
    pub second_offset: u32,
    pub tags_offset: u32,
    pub unknown: u32,
    pub board_name: String,
    pub command_line: String,
    /// Print the content identifier to stdout during emission.
    pub emit_id: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            base: DEFAULT_BASE,
            kernel_offset: DEFAULT_KERNEL_OFFSET,
            ramdisk_offset: DEFAULT_RAMDISK_OFFSET,
            second_offset: DEFAULT_SECOND_OFFSET,
            tags_offset: DEFAULT_TAGS_OFFSET,
            unknown: DEFAULT_UNKNOWN,
            board_name: String::new(),
            command_line: String::new(),
            emit_id: false,
        }
    }
}

impl ImageConfig {
    /// Check page size, board name and command line limits.
    ///
    /// Both strings end up in NUL-terminated header fields, so an embedded
    /// NUL is rejected rather than silently cutting the field short.
    pub fn validate(&self) -> Result<PageSize, ConfigError> {
        let page_size = PageSize::new(self.page_size)?;

        reject_nul("board name", &self.board_name)?;
        reject_nul("command line", &self.command_line)?;

        let name_len = self.board_name.len();
        if name_len >= BOOT_NAME_SIZE {
            return Err(ConfigError::BoardNameTooLong {
                len: name_len,
                max: BOOT_NAME_SIZE - 1,
            });
        }

        let cmdline_len = self.command_line.len();
        if cmdline_len > MAX_CMDLINE_LEN {
            return Err(ConfigError::CommandLineTooLong {
                len: cmdline_len,
                max: MAX_CMDLINE_LEN,
            });
        }

        Ok(page_size)
    }

    pub fn kernel_addr(&self) -> u32 {
        self.base.wrapping_add(self.kernel_offset)
    }

    pub fn ramdisk_addr(&self) -> u32 {
        self.base.wrapping_add(self.ramdisk_offset)
    }

    pub fn second_addr(&self) -> u32 {
        self.base.wrapping_add(self.second_offset)
    }

    pub fn tags_addr(&self) -> u32 {
        self.base.wrapping_add(self.tags_offset)
    }

    /// Command line split into the primary and extra header fields.
    ///
    /// The extra part is empty unless the command line is at least
    /// [`PRIMARY_CMDLINE_LEN`] bytes long.
    pub fn split_command_line(&self) -> (&[u8], &[u8]) {
        let bytes = self.command_line.as_bytes();
        if bytes.len() >= PRIMARY_CMDLINE_LEN {
            bytes.split_at(PRIMARY_CMDLINE_LEN)
        } else {
            (bytes, &[])
        }
    }
}

fn reject_nul(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match value.bytes().position(|b| b == 0) {
        Some(position) => Err(ConfigError::InteriorNul { field, position }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_accepts_supported_sizes_only() {
        for &size in SUPPORTED_PAGE_SIZES {
            assert_eq!(PageSize::new(size).unwrap().get(), size);
        }
        for size in [0, 1024, 2047, 3000, 262144] {
            assert_eq!(
                PageSize::new(size),
                Err(ConfigError::UnsupportedPageSize(size))
            );
        }
    }

    #[test]
    fn padding_for_exact_multiple_is_zero() {
        let page = PageSize::new(2048).unwrap();
        assert_eq!(page.padding_for(0), 0);
        assert_eq!(page.padding_for(4096), 0);
        assert_eq!(page.padding_for(1), 2047);
        assert_eq!(page.padding_for(1632), 416);
        assert_eq!(page.padding_for(2049), 2047);
    }

    #[test]
    fn addresses_are_base_plus_offset() {
        let config = ImageConfig::default();
        assert_eq!(config.kernel_addr(), 0x1000_8000);
        assert_eq!(config.ramdisk_addr(), 0x1100_0000);
        assert_eq!(config.second_addr(), 0x10f0_0000);
        assert_eq!(config.tags_addr(), 0x1000_0100);
    }

    #[test]
    fn addresses_wrap_at_32_bits() {
        let config = ImageConfig {
            base: 0xffff_f000,
            kernel_offset: 0x2000,
            ..ImageConfig::default()
        };
        assert_eq!(config.kernel_addr(), 0x1000);
    }

    #[test]
    fn board_name_limit() {
        let mut config = ImageConfig {
            board_name: "b".repeat(BOOT_NAME_SIZE - 1),
            ..ImageConfig::default()
        };
        assert!(config.validate().is_ok());

        config.board_name.push('b');
        assert_eq!(
            config.validate(),
            Err(ConfigError::BoardNameTooLong {
                len: BOOT_NAME_SIZE,
                max: BOOT_NAME_SIZE - 1
            })
        );
    }

    #[test]
    fn command_line_limit() {
        let mut config = ImageConfig {
            command_line: "c".repeat(MAX_CMDLINE_LEN),
            ..ImageConfig::default()
        };
        assert!(config.validate().is_ok());

        config.command_line.push('c');
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CommandLineTooLong { len, .. }) if len == MAX_CMDLINE_LEN + 1
        ));
    }

    #[test]
    fn command_line_split_boundary() {
        let mut config = ImageConfig {
            command_line: "a".repeat(PRIMARY_CMDLINE_LEN),
            ..ImageConfig::default()
        };
        let (primary, extra) = config.split_command_line();
        assert_eq!(primary.len(), PRIMARY_CMDLINE_LEN);
        assert!(extra.is_empty());

        config.command_line.push('z');
        let (primary, extra) = config.split_command_line();
        assert_eq!(primary.len(), PRIMARY_CMDLINE_LEN);
        assert_eq!(extra, b"z");
    }

    #[test]
    fn embedded_nul_is_rejected() {
        let config = ImageConfig {
            board_name: "ab\0cd".into(),
            ..ImageConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InteriorNul {
                field: "board name",
                position: 2
            })
        );

        let config = ImageConfig {
            command_line: "console=ttyS0\0quiet".into(),
            ..ImageConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InteriorNul {
                field: "command line",
                position: 13
            })
        );
    }

    #[test]
    fn invalid_page_size_fails_validation() {
        let config = ImageConfig {
            page_size: 1024,
            ..ImageConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedPageSize(1024))
        );
    }
}
