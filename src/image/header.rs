//! Boot image header record.
//!
//! The header is a wire contract read by the bootloader, so it is encoded
//! field by field at fixed little-endian offsets:
//!
//! ```text
//! offset  size  field
//!      0     8  magic "ANDROID!"
//!      8     4  kernel_size
//!     12     4  kernel_addr
//!     16     4  ramdisk_size
//!     20     4  ramdisk_addr
//!     24     4  second_size
//!     28     4  second_addr
//!     32     4  tags_addr
//!     36     4  page_size
//!     40     4  dt_size
//!     44     4  unknown
//!     48    16  name
//!     64   512  cmdline
//!    576    32  id
//!    608  1024  extra_cmdline
//! ```

use anyhow::{bail, Result};

pub const BOOT_MAGIC: &[u8; BOOT_MAGIC_SIZE] = b"ANDROID!";
pub const BOOT_MAGIC_SIZE: usize = 8;
pub const BOOT_NAME_SIZE: usize = 16;
pub const BOOT_ARGS_SIZE: usize = 512;
pub const BOOT_EXTRA_ARGS_SIZE: usize = 1024;
pub const BOOT_ID_SIZE: usize = 32;

const KERNEL_SIZE_OFFSET: usize = 8;
const KERNEL_ADDR_OFFSET: usize = 12;
const RAMDISK_SIZE_OFFSET: usize = 16;
const RAMDISK_ADDR_OFFSET: usize = 20;
const SECOND_SIZE_OFFSET: usize = 24;
const SECOND_ADDR_OFFSET: usize = 28;
const TAGS_ADDR_OFFSET: usize = 32;
const PAGE_SIZE_OFFSET: usize = 36;
const DT_SIZE_OFFSET: usize = 40;
const UNKNOWN_OFFSET: usize = 44;
const NAME_OFFSET: usize = 48;
const CMDLINE_OFFSET: usize = NAME_OFFSET + BOOT_NAME_SIZE;
const ID_OFFSET: usize = CMDLINE_OFFSET + BOOT_ARGS_SIZE;
const EXTRA_CMDLINE_OFFSET: usize = ID_OFFSET + BOOT_ID_SIZE;

/// Encoded size of [`BootImageHeader`].
pub const HEADER_SIZE: usize = EXTRA_CMDLINE_OFFSET + BOOT_EXTRA_ARGS_SIZE;

/// In-memory form of the boot image header.
///
/// String fields hold raw bytes without their NUL terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImageHeader {
    pub kernel_size: u32,
    pub kernel_addr: u32,
    pub ramdisk_size: u32,
    pub ramdisk_addr: u32,
    pub second_size: u32,
    pub second_addr: u32,
    pub tags_addr: u32,
    pub page_size: u32,
    pub dt_size: u32,
    pub unknown: u32,
    pub name: Vec<u8>,
    pub cmdline: Vec<u8>,
    pub id: [u8; BOOT_ID_SIZE],
    pub extra_cmdline: Vec<u8>,
}

impl Default for BootImageHeader {
    fn default() -> Self {
        Self {
            kernel_size: 0,
            kernel_addr: 0,
            ramdisk_size: 0,
            ramdisk_addr: 0,
            second_size: 0,
            second_addr: 0,
            tags_addr: 0,
            page_size: 0,
            dt_size: 0,
            unknown: 0,
            name: Vec::new(),
            cmdline: Vec::new(),
            id: [0; BOOT_ID_SIZE],
            extra_cmdline: Vec::new(),
        }
    }
}

impl BootImageHeader {
    /// Encode the header into its fixed-size wire form.
    ///
    /// String fields are truncated so at least one NUL terminator remains.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..BOOT_MAGIC_SIZE].copy_from_slice(BOOT_MAGIC);

        put_u32(&mut out, KERNEL_SIZE_OFFSET, self.kernel_size);
        put_u32(&mut out, KERNEL_ADDR_OFFSET, self.kernel_addr);
        put_u32(&mut out, RAMDISK_SIZE_OFFSET, self.ramdisk_size);
        put_u32(&mut out, RAMDISK_ADDR_OFFSET, self.ramdisk_addr);
        put_u32(&mut out, SECOND_SIZE_OFFSET, self.second_size);
        put_u32(&mut out, SECOND_ADDR_OFFSET, self.second_addr);
        put_u32(&mut out, TAGS_ADDR_OFFSET, self.tags_addr);
        put_u32(&mut out, PAGE_SIZE_OFFSET, self.page_size);
        put_u32(&mut out, DT_SIZE_OFFSET, self.dt_size);
        put_u32(&mut out, UNKNOWN_OFFSET, self.unknown);

        put_cstr(&mut out[NAME_OFFSET..CMDLINE_OFFSET], &self.name);
        put_cstr(&mut out[CMDLINE_OFFSET..ID_OFFSET], &self.cmdline);
        out[ID_OFFSET..EXTRA_CMDLINE_OFFSET].copy_from_slice(&self.id);
        put_cstr(&mut out[EXTRA_CMDLINE_OFFSET..HEADER_SIZE], &self.extra_cmdline);

        out
    }

    /// Decode a header from the start of an image.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            bail!(
                "boot image header truncated: {} bytes, need {}",
                bytes.len(),
                HEADER_SIZE
            );
        }
        if bytes[..BOOT_MAGIC_SIZE] != BOOT_MAGIC[..] {
            bail!("bad boot image magic {:02x?}", &bytes[..BOOT_MAGIC_SIZE]);
        }

        let mut id = [0u8; BOOT_ID_SIZE];
        id.copy_from_slice(&bytes[ID_OFFSET..EXTRA_CMDLINE_OFFSET]);

        Ok(Self {
            kernel_size: get_u32(bytes, KERNEL_SIZE_OFFSET),
            kernel_addr: get_u32(bytes, KERNEL_ADDR_OFFSET),
            ramdisk_size: get_u32(bytes, RAMDISK_SIZE_OFFSET),
            ramdisk_addr: get_u32(bytes, RAMDISK_ADDR_OFFSET),
            second_size: get_u32(bytes, SECOND_SIZE_OFFSET),
            second_addr: get_u32(bytes, SECOND_ADDR_OFFSET),
            tags_addr: get_u32(bytes, TAGS_ADDR_OFFSET),
            page_size: get_u32(bytes, PAGE_SIZE_OFFSET),
            dt_size: get_u32(bytes, DT_SIZE_OFFSET),
            unknown: get_u32(bytes, UNKNOWN_OFFSET),
            name: get_cstr(&bytes[NAME_OFFSET..CMDLINE_OFFSET]),
            cmdline: get_cstr(&bytes[CMDLINE_OFFSET..ID_OFFSET]),
            id,
            extra_cmdline: get_cstr(&bytes[EXTRA_CMDLINE_OFFSET..HEADER_SIZE]),
        })
    }
}

fn put_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

// The field is already zeroed; keep the last byte as the terminator.
fn put_cstr(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len() - 1);
    field[..len].copy_from_slice(&value[..len]);
}

fn get_cstr(field: &[u8]) -> Vec<u8> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_fixed() {
        assert_eq!(HEADER_SIZE, 1632);
        assert_eq!(BootImageHeader::default().to_bytes().len(), HEADER_SIZE);
    }

    #[test]
    fn fields_land_at_wire_offsets() {
        let header = BootImageHeader {
            kernel_size: 0x1122_3344,
            kernel_addr: 0x1000_8000,
            page_size: 2048,
            dt_size: 7,
            unknown: 0x0300_0000,
            name: b"board".to_vec(),
            cmdline: b"console=ttyS0".to_vec(),
            extra_cmdline: b"quiet".to_vec(),
            ..BootImageHeader::default()
        };
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..8], b"ANDROID!");
        assert_eq!(&bytes[8..12], &[0x44u8, 0x33, 0x22, 0x11]);
        assert_eq!(&bytes[12..16], &0x1000_8000u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &2048u32.to_le_bytes());
        assert_eq!(&bytes[40..44], &7u32.to_le_bytes());
        assert_eq!(&bytes[44..48], &0x0300_0000u32.to_le_bytes());
        assert_eq!(&bytes[48..53], b"board");
        assert!(bytes[53..64].iter().all(|&b| b == 0));
        assert_eq!(&bytes[64..77], b"console=ttyS0");
        assert_eq!(&bytes[608..613], b"quiet");
    }

    #[test]
    fn full_primary_cmdline_keeps_terminator() {
        let header = BootImageHeader {
            cmdline: vec![b'a'; BOOT_ARGS_SIZE + 10],
            ..BootImageHeader::default()
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes[CMDLINE_OFFSET + BOOT_ARGS_SIZE - 2], b'a');
        assert_eq!(bytes[CMDLINE_OFFSET + BOOT_ARGS_SIZE - 1], 0);
    }

    #[test]
    fn parse_reads_back_encoded_header() {
        let mut id = [0u8; BOOT_ID_SIZE];
        id[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let header = BootImageHeader {
            kernel_size: 4096,
            ramdisk_size: 100,
            second_addr: 0x10f0_0000,
            tags_addr: 0x1000_0100,
            page_size: 4096,
            name: b"hammerhead".to_vec(),
            id,
            ..BootImageHeader::default()
        };
        assert_eq!(BootImageHeader::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn parse_rejects_bad_magic_and_truncation() {
        let mut bytes = BootImageHeader::default().to_bytes();
        assert!(BootImageHeader::parse(&bytes[..100]).is_err());
        bytes[0] = b'X';
        assert!(BootImageHeader::parse(&bytes).is_err());
    }
}
