//! Bundled digest primitives.

use super::Digest;
use crate::error::DigestError;
use xxhash_rust::xxh3::xxh3_64;

/// MD5 digest rendered as lowercase hex.
///
/// This is the heavy primitive by default and is expected to run behind an
/// exclusive gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Digest;

impl Digest for Md5Digest {
    fn digest(&self, data: &str) -> Result<String, DigestError> {
        Ok(format!("{:x}", md5::compute(data.as_bytes())))
    }

    fn name(&self) -> &str {
        "md5"
    }
}

/// CRC-32C checksum rendered as an unsigned decimal number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Digest;

impl Digest for Crc32Digest {
    fn digest(&self, data: &str) -> Result<String, DigestError> {
        Ok(crc32c::crc32c(data.as_bytes()).to_string())
    }

    fn name(&self) -> &str {
        "crc32c"
    }
}

/// xxh3-64 rendered as an unsigned decimal number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Digest;

impl Digest for Xxh3Digest {
    fn digest(&self, data: &str) -> Result<String, DigestError> {
        Ok(xxh3_64(data.as_bytes()).to_string())
    }

    fn name(&self) -> &str {
        "xxh3"
    }
}
