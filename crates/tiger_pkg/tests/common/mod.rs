//! Writes synthetic packages for tests and benchmarks.
#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use tiger_pkg::strategy::witch_queen::{BlockEntryRecord, FileEntryRecord};
use tiger_pkg::types::{BlockEntry, BlockFlags, FileEntry};
use tiger_pkg::{Decompressor, Result, Strategy, TigerHash};

pub const BLOCK_SIZE: usize = 0x40000;
const HEADER_SIZE: u64 = 0x100;
const FILE_ENTRY_SIZE: u64 = 0x10;
const BLOCK_ENTRY_SIZE: u64 = 0x30;

pub const RAIDS_ID: u16 = 0x11d;
pub const RAIDS_NAME: &str = "w64_sr_raids_011d";
pub const SMALL_INDEX: u16 = 0;
pub const HEAD_INDEX: u16 = 1;
pub const EMPTY_INDEX: u16 = 2;
pub const SPANNING_INDEX: u16 = 0x1a86;
pub const SPANNING_OFFSET: u32 = (BLOCK_SIZE - 0x400) as u32;

pub const STARTUP_ID: u16 = 0x100;
pub const STARTUP_NAME: &str = "w64_ui_startup_unp1";

/// Stand-in for Oodle, "compressed" blocks are stored reversed
#[derive(Debug, Default)]
pub struct ReverseDecompressor;

impl Decompressor for ReverseDecompressor {
    fn decompress(&self, input: &[u8], _output_capacity: usize) -> Result<Vec<u8>> {
        Ok(input.iter().rev().copied().collect())
    }
}

pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}

struct PendingBlock {
    patch_id: u16,
    flags: u16,
    plain: Vec<u8>,
}

/// Builds every patch file of one package
pub struct PackageBuilder {
    name: String,
    package_id: u16,
    timestamp: u32,
    files: Vec<FileEntry>,
    blocks: Vec<PendingBlock>,
}

impl PackageBuilder {
    pub fn new(name: &str, package_id: u16) -> Self {
        Self {
            name: name.to_string(),
            package_id,
            timestamp: 1674107738,
            files: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Add a block stored in patch file `patch_id`, returns its index
    pub fn block(&mut self, patch_id: u16, flags: u16, plain: Vec<u8>) -> u32 {
        self.blocks.push(PendingBlock {
            patch_id,
            flags,
            plain,
        });
        (self.blocks.len() - 1) as u32
    }

    /// Add a file entry, returns its index
    pub fn file(&mut self, file_type: u8, block: u32, offset: u32, size: u32) -> u16 {
        self.files.push(FileEntry {
            reference: TigerHash::from(0x8080_0000_u32 | file_type as u32),
            file_type,
            file_subtype: 0,
            starting_block_index: block,
            starting_block_offset: offset,
            size,
        });
        (self.files.len() - 1) as u16
    }

    /// Add empty file entries until the next file gets `index`
    pub fn pad_to(&mut self, index: u16) {
        while self.files.len() < index as usize {
            self.files.push(FileEntry::default());
        }
    }

    fn encode(&self, block: &PendingBlock) -> (Vec<u8>, [u8; 16]) {
        let layout = Strategy::default().layout();
        let flags = BlockFlags(block.flags);

        let mut raw: Vec<u8> = if flags.is_compressed() {
            block.plain.iter().rev().copied().collect()
        } else {
            block.plain.clone()
        };

        let mut gcm_tag = [0u8; 16];
        if flags.is_encrypted() {
            let cipher = Aes128Gcm::new_from_slice(layout.aes_key(flags)).unwrap();
            let nonce = layout.nonce(self.package_id);
            let tag = cipher
                .encrypt_in_place_detached(Nonce::from_slice(&nonce), &[], &mut raw)
                .unwrap();
            gcm_tag.copy_from_slice(&tag);
        }

        (raw, gcm_tag)
    }

    /// Write `<name>_<patch>.pkg` for every patch referenced by a block.
    ///
    /// Returns the written paths by ascending patch id.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let latest = self.blocks.iter().map(|b| b.patch_id).max().unwrap_or(0);

        let file_table = HEADER_SIZE;
        let block_table = file_table + self.files.len() as u64 * FILE_ENTRY_SIZE;
        let data_start = block_table + self.blocks.len() as u64 * BLOCK_ENTRY_SIZE;

        let mut cursors = vec![data_start; latest as usize + 1];
        let mut encoded = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (raw, gcm_tag) = self.encode(block);
            let offset = &mut cursors[block.patch_id as usize];
            let entry = BlockEntry {
                offset: *offset as u32,
                size: raw.len() as u32,
                patch_id: block.patch_id,
                flags: BlockFlags(block.flags),
                sha1: [0; 20],
                gcm_tag,
            };
            *offset += raw.len() as u64;
            encoded.push((entry, raw));
        }

        let mut paths = Vec::new();
        for patch_id in 0..=latest {
            let mut out = Cursor::new(vec![0u8; HEADER_SIZE as usize]);

            out.seek(SeekFrom::Start(0x10))?;
            out.write_u16::<LittleEndian>(self.package_id)?;
            out.seek(SeekFrom::Start(0x20))?;
            out.write_u32::<LittleEndian>(self.timestamp + patch_id as u32)?;
            out.seek(SeekFrom::Start(0x30))?;
            out.write_u16::<LittleEndian>(patch_id)?;
            out.seek(SeekFrom::Start(0x44))?;
            out.write_u32::<LittleEndian>(file_table as u32)?;
            out.seek(SeekFrom::Start(0x60))?;
            out.write_u32::<LittleEndian>(self.files.len() as u32)?;
            out.seek(SeekFrom::Start(0x68))?;
            out.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
            out.write_u32::<LittleEndian>(block_table as u32)?;

            out.seek(SeekFrom::Start(file_table))?;
            for file in &self.files {
                FileEntryRecord::from(file).write_le(&mut out)?;
            }
            for (entry, _) in &encoded {
                BlockEntryRecord::from(entry).write_le(&mut out)?;
            }
            for (entry, raw) in encoded.iter().filter(|(e, _)| e.patch_id == patch_id) {
                out.seek(SeekFrom::Start(entry.offset as u64))?;
                out.write_all(raw)?;
            }

            let path = dir.join(format!("{}_{patch_id}.pkg", self.name));
            fs::write(&path, out.into_inner())?;
            paths.push(path);
        }

        Ok(paths)
    }
}

/// The raids package: two 192 byte files in a plain block, one of them at
/// the very start of the block, and a 2304 byte file spread over two
/// encrypted blocks in two patch files.
pub struct Raids {
    pub paths: Vec<PathBuf>,
    pub small: Vec<u8>,
    pub head: Vec<u8>,
    pub spanning: Vec<u8>,
}

impl Raids {
    pub fn latest(&self) -> &Path {
        self.paths.last().unwrap()
    }
}

pub fn write_raids(dir: &Path) -> Result<Raids> {
    let small_block = pattern(1, 0x1000);
    let first = pattern(2, BLOCK_SIZE);
    let second = pattern(3, 0x1000);

    let mut builder = PackageBuilder::new(RAIDS_NAME, RAIDS_ID);
    let plain = builder.block(0, 0, small_block.clone());
    let spanning = builder.block(0, BlockFlags::ENCRYPTED, first.clone());
    builder.block(
        1,
        BlockFlags::ENCRYPTED | BlockFlags::ALTERNATE_KEY,
        second.clone(),
    );

    builder.file(9, plain, 0x1a0, 192);
    builder.file(9, plain, 0, 192);
    builder.pad_to(SPANNING_INDEX);
    builder.file(26, spanning, SPANNING_OFFSET, 2304);

    let tail = 2304 - (BLOCK_SIZE - SPANNING_OFFSET as usize);
    let mut expected = first[SPANNING_OFFSET as usize..].to_vec();
    expected.extend_from_slice(&second[..tail]);

    Ok(Raids {
        paths: builder.write(dir)?,
        small: small_block[0x1a0..0x1a0 + 192].to_vec(),
        head: small_block[..192].to_vec(),
        spanning: expected,
    })
}

/// The startup package: one patch file, one compressed and encrypted block
/// holding a 512 byte file.
pub struct Startup {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

pub fn write_startup(dir: &Path) -> Result<Startup> {
    let block = pattern(7, 0x800);

    let mut builder = PackageBuilder::new(STARTUP_NAME, STARTUP_ID);
    let index = builder.block(
        0,
        BlockFlags::COMPRESSED | BlockFlags::ENCRYPTED,
        block.clone(),
    );
    builder.file(8, index, 0x40, 512);

    let mut paths = builder.write(dir)?;
    Ok(Startup {
        path: paths.remove(0),
        data: block[0x40..0x40 + 512].to_vec(),
    })
}
