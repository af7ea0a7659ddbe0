//! Content identifier stored in the header `id` field.
//!
//! The identifier is a SHA-1 over the payloads and their size fields, in a
//! fixed order:
//!
//! ```text
//! kernel, kernel_size, ramdisk, ramdisk_size, second, second_size
//! [dt, dt_size]   only when a device tree is present
//! ```
//!
//! Absent ramdisk and second-stage payloads feed zero bytes but still feed
//! their size fields. An absent device tree feeds nothing at all, which keeps
//! identifiers stable for images built before device trees existed. The
//! signature is never hashed.

use sha1::{Digest, Sha1};

use super::header::{BootImageHeader, BOOT_ID_SIZE};
use crate::payload::Payloads;

/// Compute the identifier for `payloads` using the size fields of `header`.
pub fn compute(header: &BootImageHeader, payloads: &Payloads<'_>) -> [u8; BOOT_ID_SIZE] {
    let mut hasher = Sha1::new();

    hasher.update(payloads.kernel.unwrap_or_default());
    hasher.update(header.kernel_size.to_le_bytes());
    hasher.update(payloads.ramdisk.unwrap_or_default());
    hasher.update(header.ramdisk_size.to_le_bytes());
    hasher.update(payloads.second.unwrap_or_default());
    hasher.update(header.second_size.to_le_bytes());
    if let Some(dt) = payloads.device_tree {
        hasher.update(dt);
        hasher.update(header.dt_size.to_le_bytes());
    }

    fit_digest(&hasher.finalize())
}

/// Copy a digest into an id field, truncating or zero-filling as needed.
pub fn fit_digest(digest: &[u8]) -> [u8; BOOT_ID_SIZE] {
    let mut id = [0u8; BOOT_ID_SIZE];
    let len = digest.len().min(BOOT_ID_SIZE);
    id[..len].copy_from_slice(&digest[..len]);
    id
}

/// Render an id the way `--id` prints it: `0x` and lowercase hex, first byte
/// first.
pub fn format_id(id: &[u8; BOOT_ID_SIZE]) -> String {
    format!("0x{}", hex::encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_for(payloads: &Payloads<'_>) -> BootImageHeader {
        BootImageHeader {
            kernel_size: payloads.kernel.map_or(0, |p| p.len() as u32),
            ramdisk_size: payloads.ramdisk.map_or(0, |p| p.len() as u32),
            second_size: payloads.second.map_or(0, |p| p.len() as u32),
            dt_size: payloads.device_tree.map_or(0, |p| p.len() as u32),
            ..BootImageHeader::default()
        }
    }

    #[test]
    fn kernel_only_id_matches_manual_digest() {
        let kernel = vec![0x5au8; 4096];
        let payloads = Payloads::with_kernel(&kernel);
        let id = compute(&header_for(&payloads), &payloads);

        let mut expected = Sha1::new();
        expected.update(&kernel);
        expected.update(4096u32.to_le_bytes());
        expected.update(0u32.to_le_bytes());
        expected.update(0u32.to_le_bytes());
        let digest = expected.finalize();

        assert_eq!(&id[..20], &digest[..]);
        assert!(id[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn absent_device_tree_differs_from_empty_device_tree() {
        let kernel = b"kernel".to_vec();
        let absent = Payloads::with_kernel(&kernel);
        let empty = Payloads {
            device_tree: Some(&[]),
            ..absent
        };

        assert_ne!(
            compute(&header_for(&absent), &absent),
            compute(&header_for(&empty), &empty)
        );
    }

    #[test]
    fn signature_is_not_hashed() {
        let kernel = b"kernel".to_vec();
        let signature = vec![1u8; 272];
        let plain = Payloads::with_kernel(&kernel);
        let signed = Payloads {
            signature: Some(&signature),
            ..plain
        };

        assert_eq!(
            compute(&header_for(&plain), &plain),
            compute(&header_for(&signed), &signed)
        );
    }

    #[test]
    fn payload_boundaries_matter() {
        // Same concatenated bytes, different split between kernel and ramdisk.
        let a = Payloads {
            kernel: Some(b"abc"),
            ramdisk: Some(b"def"),
            ..Payloads::default()
        };
        let b = Payloads {
            kernel: Some(b"abcd"),
            ramdisk: Some(b"ef"),
            ..Payloads::default()
        };
        assert_ne!(compute(&header_for(&a), &a), compute(&header_for(&b), &b));
    }

    #[test]
    fn fit_digest_truncates_and_zero_fills() {
        let wide = [0xffu8; 64];
        assert_eq!(fit_digest(&wide), [0xff; BOOT_ID_SIZE]);

        let narrow = [0xabu8; 20];
        let id = fit_digest(&narrow);
        assert_eq!(&id[..20], &narrow[..]);
        assert_eq!(&id[20..], &[0u8; 12][..]);
    }

    #[test]
    fn format_id_is_prefixed_lowercase_hex() {
        let mut id = [0u8; BOOT_ID_SIZE];
        id[0] = 0xAB;
        id[31] = 0x01;
        let text = format_id(&id);
        assert_eq!(text.len(), 2 + 2 * BOOT_ID_SIZE);
        assert!(text.starts_with("0xab00"));
        assert!(text.ends_with("0001"));
    }
}
