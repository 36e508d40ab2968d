//! Identity types for files stored in packages.

use std::str::FromStr;

use derive_more::{Display, From, Into};

use crate::error::{Error, Result};

/// Lowest hash that addresses a file, package `0000` entry `0`.
const FILE_HASH_BASE: u32 = 0x8080_0000;

/// Highest hash that can still be decoded into a package id.
const FILE_HASH_MAX: u32 = 0x81FF_FFFF;

/// Number of low bits holding the entry index.
const ENTRY_INDEX_BITS: u32 = 13;

const ENTRY_INDEX_MASK: u32 = (1 << ENTRY_INDEX_BITS) - 1;

/// A 32-bit reference to one file inside one package.
///
/// The hash is `0x80800000 + (package_id << 13) + entry_index`, so a single
/// package can hold at most `0x2000` entries.
///
/// ```
/// use tiger_pkg::FileHash;
///
/// let hash = FileHash::new(0x11d, 0x1a86);
/// assert_eq!(hash.hash32(), 0x80A3BA86);
/// assert_eq!(hash.package_id(), 0x11d);
/// assert_eq!(hash.entry_index(), 0x1a86);
/// ```
#[derive(Debug, Display, From, Into, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0:08X}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FileHash(u32);

impl FileHash {
    /// Marker value used by the game for "no file".
    pub const INVALID: FileHash = FileHash(u32::MAX);

    /// Build the hash of entry `entry_index` in package `package_id`.
    pub const fn new(package_id: u16, entry_index: u16) -> Self {
        FileHash(
            FILE_HASH_BASE
                .wrapping_add((package_id as u32) << ENTRY_INDEX_BITS)
                .wrapping_add(entry_index as u32 & ENTRY_INDEX_MASK),
        )
    }

    /// The raw 32-bit value
    pub const fn hash32(&self) -> u32 {
        self.0
    }

    /// Id of the package that stores this file
    pub const fn package_id(&self) -> u16 {
        (self.0.wrapping_sub(FILE_HASH_BASE) >> ENTRY_INDEX_BITS) as u16
    }

    /// Index of the file in its package's file entry table
    pub const fn entry_index(&self) -> u16 {
        (self.0 & ENTRY_INDEX_MASK) as u16
    }

    /// Whether this value can address a file at all.
    ///
    /// This does not check that the package exists or that the index is in
    /// range, only that the value lies in the file hash space.
    pub const fn is_valid(&self) -> bool {
        self.0 >= FILE_HASH_BASE && self.0 <= FILE_HASH_MAX
    }
}

impl FromStr for FileHash {
    type Err = Error;

    /// Parses an upper or lower case hex string, with or without `0x`.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u32::from_str_radix(digits, 16)
            .map(FileHash)
            .map_err(|e| Error::InvalidFileHash {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl From<TigerHash> for FileHash {
    fn from(value: TigerHash) -> Self {
        FileHash(value.0)
    }
}

/// An opaque 32-bit hash as stored in file entries.
///
/// The reference of a file entry usually points at the file describing the
/// entry's type. Convert it into a [`FileHash`] to fetch that file.
#[derive(Debug, Display, From, Into, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0:08X}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TigerHash(u32);

impl TigerHash {
    /// The raw 32-bit value
    pub const fn hash32(&self) -> u32 {
        self.0
    }
}
