//! Trait definitions for digest primitives.

use crate::error::DigestError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A deterministic text-in, text-out hash primitive.
///
/// The pipeline only relies on this contract: the same input always yields
/// the same output. Whether an implementation may run concurrently with
/// itself is decided by the caller (see [`crate::core::gate::ResourceGate`]).
pub trait Digest: Send + Sync {
    /// Compute the digest of `data`
    fn digest(&self, data: &str) -> Result<String, DigestError>;

    /// Short name used in logs and errors
    fn name(&self) -> &str {
        "custom"
    }
}

/// A digest shared between stages and their worker threads
pub type SharedDigest = Arc<dyn Digest>;

/// Plain functions and closures are infallible digests.
impl<F> Digest for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn digest(&self, data: &str) -> Result<String, DigestError> {
        Ok(self(data))
    }
}

/// Bundled digest implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestKind {
    /// MD5, lowercase hex
    Md5,
    /// CRC-32C, unsigned decimal
    Crc32,
    /// xxh3-64, unsigned decimal
    Xxh3,
}

impl DigestKind {
    /// Get a human-readable description of the primitive
    pub fn description(&self) -> &'static str {
        match self {
            DigestKind::Md5 => "MD5 - 128-bit digest rendered as 32 hex characters",
            DigestKind::Crc32 => "CRC-32C - 32-bit checksum rendered in decimal",
            DigestKind::Xxh3 => "xxh3 - 64-bit non-cryptographic hash rendered in decimal",
        }
    }
}

impl std::fmt::Display for DigestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestKind::Md5 => write!(f, "md5"),
            DigestKind::Crc32 => write!(f, "crc32c"),
            DigestKind::Xxh3 => write!(f, "xxh3"),
        }
    }
}
