//! Layout of Destiny 2 packages as shipped with The Witch Queen (build 6307).

use std::io::{Cursor, SeekFrom};

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};
use crate::hash::TigerHash;
use crate::strategy::PackageLayout;
use crate::types::{BlockEntry, BlockFlags, FileEntry, PackageHeader, TableDescriptor};

const HEADER_SIZE: usize = 0x100;
const FILE_ENTRY_SIZE: usize = 0x10;
const BLOCK_ENTRY_SIZE: usize = 0x30;
const BLOCK_SIZE: usize = 0x40000;

const AES_KEY_0: [u8; 16] = [
    0xD6, 0x2A, 0xB2, 0xC1, 0x0C, 0xC0, 0x1B, 0xC5, 0x35, 0xDB, 0x7B, 0x86, 0x55, 0xC7, 0xDC, 0x3B,
];

const AES_KEY_1: [u8; 16] = [
    0x3A, 0x4A, 0x5D, 0x36, 0x73, 0xA6, 0x60, 0x58, 0x7E, 0x63, 0xE6, 0x76, 0xE4, 0x08, 0x92, 0xB5,
];

const BASE_NONCE: [u8; 12] = [
    0x84, 0xEA, 0x11, 0xC0, 0xAC, 0xAB, 0xFA, 0x20, 0x33, 0x11, 0x26, 0x99,
];

/// Header fields at their fixed offsets
///
/// The fields are not stored in offset order, every field seeks to its own
/// absolute position inside the header region.
#[derive(BinRead, Debug, Copy, Clone, PartialEq)]
#[br(little)]
pub struct HeaderRecord {
    #[br(seek_before = SeekFrom::Start(0x10))]
    pub package_id: u16,

    #[br(seek_before = SeekFrom::Start(0x20))]
    pub timestamp: u32,

    #[br(seek_before = SeekFrom::Start(0x30))]
    pub patch_id: u16,

    #[br(seek_before = SeekFrom::Start(0x44))]
    pub file_entry_table_offset: u32,

    #[br(seek_before = SeekFrom::Start(0x60))]
    pub file_entry_table_count: u32,

    #[br(seek_before = SeekFrom::Start(0x68))]
    pub block_entry_table_count: u32,

    #[br(seek_before = SeekFrom::Start(0x6C))]
    pub block_entry_table_offset: u32,

    #[br(seek_before = SeekFrom::Start(0x78))]
    pub activity_table_count: u32,

    #[br(seek_before = SeekFrom::Start(0x7C))]
    pub activity_table_offset: u32,

    #[br(seek_before = SeekFrom::Start(0xB8))]
    pub hash64_table_size: u32,

    #[br(seek_before = SeekFrom::Start(0xBC))]
    pub hash64_table_offset: u32,
}

impl From<HeaderRecord> for PackageHeader {
    fn from(value: HeaderRecord) -> Self {
        PackageHeader {
            package_id: value.package_id,
            timestamp: value.timestamp,
            patch_id: value.patch_id,
            file_entries: TableDescriptor {
                offset: value.file_entry_table_offset,
                count: value.file_entry_table_count,
            },
            block_entries: TableDescriptor {
                offset: value.block_entry_table_offset,
                count: value.block_entry_table_count,
            },
            activities: TableDescriptor {
                offset: value.activity_table_offset,
                count: value.activity_table_count,
            },
            hash64_table: TableDescriptor {
                offset: value.hash64_table_offset,
                count: value.hash64_table_size,
            },
        }
    }
}

/// Bit-packed file entry
///
/// `location` holds the starting block index (14 bits), the starting block
/// offset in 16 byte units (14 bits) and the low 4 bits of the size.
/// `size` holds the remaining 26 bits of the size.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct FileEntryRecord {
    pub reference: u32,
    pub type_info: u32,
    pub location: u32,
    pub size: u32,
}

impl From<FileEntryRecord> for FileEntry {
    fn from(value: FileEntryRecord) -> Self {
        FileEntry {
            reference: TigerHash::from(value.reference),
            file_type: ((value.type_info >> 9) & 0x7F) as u8,
            file_subtype: ((value.type_info >> 6) & 0x7) as u8,
            starting_block_index: value.location & 0x3FFF,
            starting_block_offset: ((value.location >> 14) & 0x3FFF) << 4,
            size: ((value.size & 0x03FF_FFFF) << 4) | ((value.location >> 28) & 0xF),
        }
    }
}

impl From<&FileEntry> for FileEntryRecord {
    fn from(value: &FileEntry) -> Self {
        FileEntryRecord {
            reference: value.reference.hash32(),
            type_info: ((value.file_type as u32 & 0x7F) << 9)
                | ((value.file_subtype as u32 & 0x7) << 6),
            location: (value.starting_block_index & 0x3FFF)
                | (((value.starting_block_offset >> 4) & 0x3FFF) << 14)
                | ((value.size & 0xF) << 28),
            size: (value.size >> 4) & 0x03FF_FFFF,
        }
    }
}

/// Block entry as stored on disk
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct BlockEntryRecord {
    pub offset: u32,
    pub size: u32,
    pub patch_id: u16,
    pub flags: u16,
    pub sha1: [u8; 20],
    pub gcm_tag: [u8; 16],
}

impl From<BlockEntryRecord> for BlockEntry {
    fn from(value: BlockEntryRecord) -> Self {
        BlockEntry {
            offset: value.offset,
            size: value.size,
            patch_id: value.patch_id,
            flags: BlockFlags(value.flags),
            sha1: value.sha1,
            gcm_tag: value.gcm_tag,
        }
    }
}

impl From<&BlockEntry> for BlockEntryRecord {
    fn from(value: &BlockEntry) -> Self {
        BlockEntryRecord {
            offset: value.offset,
            size: value.size,
            patch_id: value.patch_id,
            flags: value.flags.0,
            sha1: value.sha1,
            gcm_tag: value.gcm_tag,
        }
    }
}

/// Destiny 2 from The Witch Queen onwards
#[derive(Debug, Copy, Clone, Default)]
pub struct WitchQueen6307;

impl WitchQueen6307 {
    fn expect_len(bytes: &[u8], expected: usize, what: &str) -> Result<()> {
        if bytes.len() < expected {
            return Err(Error::Format(format!(
                "{what} needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(())
    }
}

impl PackageLayout for WitchQueen6307 {
    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn file_entry_size(&self) -> usize {
        FILE_ENTRY_SIZE
    }

    fn block_entry_size(&self) -> usize {
        BLOCK_ENTRY_SIZE
    }

    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn platform_prefix(&self) -> &'static str {
        "w64"
    }

    fn parse_header(&self, bytes: &[u8]) -> Result<PackageHeader> {
        Self::expect_len(bytes, HEADER_SIZE, "header")?;
        let record = HeaderRecord::read(&mut Cursor::new(&bytes[..HEADER_SIZE]))?;
        Ok(record.into())
    }

    fn parse_file_entry(&self, bytes: &[u8]) -> Result<FileEntry> {
        Self::expect_len(bytes, FILE_ENTRY_SIZE, "file entry")?;
        let record = FileEntryRecord::read(&mut Cursor::new(bytes))?;
        Ok(record.into())
    }

    fn parse_block_entry(&self, bytes: &[u8]) -> Result<BlockEntry> {
        Self::expect_len(bytes, BLOCK_ENTRY_SIZE, "block entry")?;
        let record = BlockEntryRecord::read(&mut Cursor::new(bytes))?;
        Ok(record.into())
    }

    fn aes_key(&self, flags: BlockFlags) -> &'static [u8; 16] {
        if flags.uses_alternate_key() {
            &AES_KEY_1
        } else {
            &AES_KEY_0
        }
    }

    fn nonce(&self, package_id: u16) -> [u8; 12] {
        let mut nonce = BASE_NONCE;
        nonce[0] ^= (package_id >> 8) as u8;
        nonce[11] ^= package_id as u8;
        nonce
    }
}
