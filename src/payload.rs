//! Payload sets handed to the image builder, and the file loader that
//! produces them.
//!
//! Payloads are opaque byte blobs. The builder only borrows them for the
//! duration of one build; [`LoadedPayloads`] owns the bytes read from disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InputError;

/// Length of the signature blob appended after the last segment.
pub const SIGNATURE_SIZE: usize = 272;

/// The role a payload plays in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadRole {
    Kernel,
    Ramdisk,
    Second,
    DeviceTree,
    Signature,
}

impl PayloadRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk",
            Self::Second => "secondstage",
            Self::DeviceTree => "device tree image",
            Self::Signature => "signature",
        }
    }
}

impl fmt::Display for PayloadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed payload buffers for one build.
///
/// `None` means the payload is absent. An absent device tree is not the same
/// as an empty one: only a present device tree takes part in the content
/// identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payloads<'a> {
    pub kernel: Option<&'a [u8]>,
    pub ramdisk: Option<&'a [u8]>,
    pub second: Option<&'a [u8]>,
    pub device_tree: Option<&'a [u8]>,
    pub signature: Option<&'a [u8]>,
}

impl<'a> Payloads<'a> {
    /// Payload set with only a kernel.
    pub fn with_kernel(kernel: &'a [u8]) -> Self {
        Self {
            kernel: Some(kernel),
            ..Self::default()
        }
    }

    pub fn get(&self, role: PayloadRole) -> Option<&'a [u8]> {
        match role {
            PayloadRole::Kernel => self.kernel,
            PayloadRole::Ramdisk => self.ramdisk,
            PayloadRole::Second => self.second,
            PayloadRole::DeviceTree => self.device_tree,
            PayloadRole::Signature => self.signature,
        }
    }

    /// Length of a payload, 0 when absent.
    pub(crate) fn len_of(&self, role: PayloadRole) -> usize {
        self.get(role).map_or(0, <[u8]>::len)
    }
}

/// Paths of the payload files to load, keyed by role.
#[derive(Debug, Clone, Default)]
pub struct PayloadFiles {
    pub kernel: Option<PathBuf>,
    pub ramdisk: Option<PathBuf>,
    pub second: Option<PathBuf>,
    pub device_tree: Option<PathBuf>,
    pub signature: Option<PathBuf>,
}

impl PayloadFiles {
    /// Read every named file in full.
    ///
    /// Stops at the first file that cannot be read. A missing kernel path is
    /// not an input error; validation reports it.
    pub fn load(&self) -> Result<LoadedPayloads, InputError> {
        Ok(LoadedPayloads {
            kernel: load_optional(PayloadRole::Kernel, self.kernel.as_deref())?,
            ramdisk: load_optional(PayloadRole::Ramdisk, self.ramdisk.as_deref())?,
            second: load_optional(PayloadRole::Second, self.second.as_deref())?,
            device_tree: load_optional(PayloadRole::DeviceTree, self.device_tree.as_deref())?,
            signature: load_optional(PayloadRole::Signature, self.signature.as_deref())?,
        })
    }
}

/// Payload bytes owned after loading from disk.
#[derive(Debug, Clone, Default)]
pub struct LoadedPayloads {
    pub kernel: Option<Vec<u8>>,
    pub ramdisk: Option<Vec<u8>>,
    pub second: Option<Vec<u8>>,
    pub device_tree: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
}

impl LoadedPayloads {
    pub fn as_payloads(&self) -> Payloads<'_> {
        Payloads {
            kernel: self.kernel.as_deref(),
            ramdisk: self.ramdisk.as_deref(),
            second: self.second.as_deref(),
            device_tree: self.device_tree.as_deref(),
            signature: self.signature.as_deref(),
        }
    }
}

fn load_optional(role: PayloadRole, path: Option<&Path>) -> Result<Option<Vec<u8>>, InputError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = fs::read(path).map_err(|source| InputError {
        role,
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("loaded {} '{}' ({} bytes)", role, path.display(), bytes.len());
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_reads_named_files_only() {
        let temp = TempDir::new().unwrap();
        let kernel = temp.path().join("zImage");
        let dt = temp.path().join("dt.img");
        fs::write(&kernel, b"kernel-bytes").unwrap();
        fs::write(&dt, b"").unwrap();

        let files = PayloadFiles {
            kernel: Some(kernel),
            device_tree: Some(dt),
            ..PayloadFiles::default()
        };
        let loaded = files.load().unwrap();
        let payloads = loaded.as_payloads();

        assert_eq!(payloads.kernel, Some(&b"kernel-bytes"[..]));
        assert_eq!(payloads.ramdisk, None);
        assert_eq!(payloads.second, None);
        // An empty device tree file is present, not absent.
        assert_eq!(payloads.device_tree, Some(&b""[..]));
        assert_eq!(payloads.signature, None);
    }

    #[test]
    fn load_reports_role_and_path_of_unreadable_file() {
        let temp = TempDir::new().unwrap();
        let kernel = temp.path().join("zImage");
        fs::write(&kernel, b"k").unwrap();
        let missing = temp.path().join("ramdisk.cpio.gz");

        let files = PayloadFiles {
            kernel: Some(kernel),
            ramdisk: Some(missing.clone()),
            ..PayloadFiles::default()
        };
        let err = files.load().unwrap_err();

        assert_eq!(err.role, PayloadRole::Ramdisk);
        assert_eq!(err.path, missing);
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().starts_with("could not load ramdisk"));
    }

    #[test]
    fn len_of_absent_payload_is_zero() {
        let payloads = Payloads::with_kernel(&[1, 2, 3]);
        assert_eq!(payloads.len_of(PayloadRole::Kernel), 3);
        assert_eq!(payloads.len_of(PayloadRole::DeviceTree), 0);
    }
}
