//! Base types describing the structure of a package, independent of game version.

use std::path::PathBuf;

use crate::hash::{FileHash, TigerHash};

/// Location of a table inside a package file
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Absolute offset of the first record
    pub offset: u32,

    /// Number of records in the table
    pub count: u32,
}

/// Package header
///
/// Read from the first `0x100` bytes of every package file. All offsets point
/// into the same physical file the header was read from.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    /// The id shared by all patch files of this package
    pub package_id: u16,

    /// When this patch file was built, in seconds since the unix epoch
    pub timestamp: u32,

    /// The patch number of this physical file
    pub patch_id: u16,

    /// Table of [`FileEntry`] records
    pub file_entries: TableDescriptor,

    /// Table of [`BlockEntry`] records
    pub block_entries: TableDescriptor,

    /// Activity table, not interpreted by this library
    pub activities: TableDescriptor,

    /// 64-bit hash table, not interpreted by this library
    pub hash64_table: TableDescriptor,
}

/// One logical file stored in a package
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Opaque hash consumers use to resolve the file's type
    pub reference: TigerHash,

    /// Primary type id
    pub file_type: u8,

    /// Secondary type id
    pub file_subtype: u8,

    /// Index of the first block holding the file's data
    pub starting_block_index: u32,

    /// Offset of the file's data inside the first block
    pub starting_block_offset: u32,

    /// Size of the file in bytes
    pub size: u32,
}

impl FileEntry {
    /// Number of consecutive blocks the file's data touches.
    ///
    /// An empty file touches no block.
    pub fn block_count(&self, block_size: usize) -> usize {
        if self.size == 0 {
            return 0;
        }
        (self.starting_block_offset as usize + self.size as usize - 1) / block_size + 1
    }
}

/// Flag byte of a [`BlockEntry`]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BlockFlags(pub u16);

impl BlockFlags {
    /// Block data is compressed
    pub const COMPRESSED: u16 = 0x1;

    /// Block data is encrypted
    pub const ENCRYPTED: u16 = 0x2;

    /// Block data is encrypted with the alternate key
    pub const ALTERNATE_KEY: u16 = 0x4;

    /// Whether the block must be decompressed
    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    /// Whether the block must be decrypted
    pub fn is_encrypted(&self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }

    /// Whether the alternate AES key is used
    pub fn uses_alternate_key(&self) -> bool {
        self.0 & Self::ALTERNATE_KEY != 0
    }
}

/// One fixed size storage block of a package
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Offset of the raw block inside its patch file
    pub offset: u32,

    /// Size of the raw (possibly compressed) block
    pub size: u32,

    /// Which `_<patch>.pkg` file holds the raw bytes
    pub patch_id: u16,

    /// Compression and encryption flags
    pub flags: BlockFlags,

    /// SHA-1 digest of the raw block, not verified by this library
    pub sha1: [u8; 20],

    /// AES-GCM authentication tag
    pub gcm_tag: [u8; 16],
}

/// Metadata about a file in a package
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileMetadata {
    /// Hash addressing the file
    pub hash: FileHash,

    /// Reference hash of the file
    pub reference: TigerHash,

    /// Size of the file in bytes
    pub size: u32,

    /// Primary type id
    pub file_type: u8,

    /// Secondary type id
    pub file_subtype: u8,
}

impl FileMetadata {
    pub(crate) fn new(hash: FileHash, entry: &FileEntry) -> Self {
        Self {
            hash,
            reference: entry.reference,
            size: entry.size,
            file_type: entry.file_type,
            file_subtype: entry.file_subtype,
        }
    }
}

/// Metadata about a package file
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PackageMetadata {
    /// Path the package was opened from
    pub path: PathBuf,

    /// File name of the package
    pub name: String,

    /// Package id
    pub id: u16,

    /// Patch number of the opened file
    pub patch_id: u16,

    /// Build timestamp of the opened file
    pub timestamp: u32,

    /// Number of file entries
    pub file_count: u32,
}
