//! Pluggable byte codecs used to compress each group independently.
//!
//! Every stored group is compressed with exactly one [`Algorithm`] drawn from a
//! fixed set. The algorithm is not recorded in the stored document, so the same
//! algorithm must be named again when the group is read back.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** - via `flate2` crate (feature: `compression-gzip`)
//! - **Zlib/deflate** - via `flate2` crate (feature: `compression-zlib`)
//! - **Bzip2** - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz/lzma** - via `xz2` crate (feature: `compression-xz`)
//!
//! ## Usage
//! ```
//! use shardstash::io::compression::{compress, decompress, Algorithm};
//! # fn main() -> shardstash::Result<()> {
//! let packed = compress(b"1,east,10\n", Algorithm::Xz)?;
//! assert_eq!(decompress(&packed, Algorithm::Xz)?, b"1,east,10\n");
//! # Ok(())
//! # }
//! ```
//!
//! Codecs hold no state, so the functions here may be called concurrently
//! from any number of workers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of byte-compression algorithms a group can be stored with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Gzip,
    Bzip2,
    Xz,
    /// Raw zlib/deflate stream. Named `zip` on the command line.
    Zlib,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Gzip,
        Algorithm::Bzip2,
        Algorithm::Xz,
        Algorithm::Zlib,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Bzip2 => "bzip2",
            Algorithm::Xz => "xz",
            Algorithm::Zlib => "zip",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Algorithm::Gzip),
            "bzip2" | "bz2" => Ok(Algorithm::Bzip2),
            "xz" | "lzma" => Ok(Algorithm::Xz),
            "zip" | "zlib" | "deflate" => Ok(Algorithm::Zlib),
            other => Err(Error::Config(format!(
                "unknown compression algorithm '{other}', expected one of gzip, bzip2, xz, zip"
            ))),
        }
    }
}

/// Byte codec contract.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; a single static instance serves
/// every worker.
pub trait ByteCodec: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Magic byte signature at the start of a compressed stream, if any.
    fn magic_bytes(&self) -> Option<&[u8]>;

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;
}

/// Look up the codec for `algorithm`.
///
/// # Errors
/// Returns [`Error::CodecError`] when the codec was compiled out.
pub fn codec_for(algorithm: Algorithm) -> Result<&'static dyn ByteCodec> {
    match algorithm {
        #[cfg(feature = "compression-gzip")]
        Algorithm::Gzip => Ok(&GzipCodec),
        #[cfg(feature = "compression-bzip2")]
        Algorithm::Bzip2 => Ok(&Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Algorithm::Xz => Ok(&XzCodec),
        #[cfg(feature = "compression-zlib")]
        Algorithm::Zlib => Ok(&ZlibCodec),
        #[allow(unreachable_patterns)]
        other => Err(Error::codec(other, "codec not enabled in this build")),
    }
}

/// Compress `data` with `algorithm`.
///
/// # Errors
/// Returns [`Error::CodecError`] if the codec is unavailable or the encoder fails.
pub fn compress(data: &[u8], algorithm: Algorithm) -> Result<Vec<u8>> {
    codec_for(algorithm)?
        .compress(data)
        .map_err(|e| Error::codec(algorithm, e))
}

/// Decompress `data`, which must have been produced by `algorithm`.
///
/// # Errors
/// Returns [`Error::CodecError`] if the bytes are not a valid stream for
/// `algorithm`. When the bytes carry another codec's signature the message
/// says so.
pub fn decompress(data: &[u8], algorithm: Algorithm) -> Result<Vec<u8>> {
    codec_for(algorithm)?.decompress(data).map_err(|e| {
        match detect_algorithm(data).filter(|found| *found != algorithm) {
            Some(found) => Error::codec(algorithm, format!("{e} (payload looks like {found})")),
            None => Error::codec(algorithm, e),
        }
    })
}

/// Guess the algorithm from a payload's leading magic bytes.
///
/// Zlib has no fixed signature, so it is only recognised by its usual
/// `0x78` header byte and is checked last.
#[must_use]
pub fn detect_algorithm(data: &[u8]) -> Option<Algorithm> {
    Algorithm::ALL.into_iter().find(|alg| {
        codec_for(*alg)
            .ok()
            .and_then(|c| c.magic_bytes())
            .is_some_and(|magic| data.starts_with(magic))
    })
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl ByteCodec for GzipCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Gzip
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
        enc.write_all(data)?;
        enc.finish()
    }

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use flate2::read::GzDecoder;
        use std::io::Read;
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(feature = "compression-zlib")]
struct ZlibCodec;

#[cfg(feature = "compression-zlib")]
impl ByteCodec for ZlibCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zlib
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x78])
    }

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
        enc.write_all(data)?;
        enc.finish()
    }

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl ByteCodec for Bzip2Codec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Bzip2
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x42, 0x5a, 0x68])
    }

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use bzip2::write::BzEncoder;
        use bzip2::Compression;
        use std::io::Write;
        let mut enc = BzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
        enc.write_all(data)?;
        enc.finish()
    }

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use bzip2::read::BzDecoder;
        use std::io::Read;
        let mut out = Vec::new();
        BzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl ByteCodec for XzCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Xz
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use std::io::Write;
        use xz2::write::XzEncoder;
        let mut enc = XzEncoder::new(Vec::with_capacity(data.len() / 2), 6);
        enc.write_all(data)?;
        enc.finish()
    }

    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        use std::io::Read;
        use xz2::read::XzDecoder;
        let mut out = Vec::new();
        XzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}
