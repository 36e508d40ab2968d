//! This library handles reading files from the **PKG** archives used by the *Tiger* engine (*Destiny 2*).
//!
//! # PKG Archive Format Documentation
//!
//! Game content is split over a few thousand package files. Every logical file is addressed by a 32-bit
//! [`FileHash`] which encodes both the package holding it and its index inside that package. File data is
//! stored in fixed size blocks that may be encrypted and compressed, and a file's blocks may be spread over
//! several *patch* files of the same package.
//!
//! Package files are named `<platform>_<name>_<patch>.pkg`, e.g. `w64_sr_raids_011d_7.pkg`. All patch files
//! of a package share the package id. The file with the highest patch number carries the newest tables.
//!
//! The layout described here is the one used by *Destiny 2* since *The Witch Queen* (build 6307), see
//! [`Strategy::Destiny2WitchQueen6307`].
//!
//! ## File Structure
//!
//! A package file starts with a `0x100` byte header region, followed by the file entry table, the block
//! entry table and the raw block data. The tables are located through offsets in the header, so their
//! order is not fixed.
//!
//! ### Header
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0010         | Package Id             | 2 bytes: Id shared by all patch files of this package      |
//! | 0x0020         | Timestamp              | 4 bytes: Build time, seconds since the unix epoch          |
//! | 0x0030         | Patch Id               | 2 bytes: Patch number of this physical file                |
//! | 0x0044         | File Entry Offset      | 4 bytes: Absolute offset of the file entry table           |
//! | 0x0060         | File Entry Count       | 4 bytes: Number of file entries                            |
//! | 0x0068         | Block Entry Count      | 4 bytes: Number of block entries                           |
//! | 0x006C         | Block Entry Offset     | 4 bytes: Absolute offset of the block entry table          |
//! | 0x0078         | Activity Count         | 4 bytes: Number of activity records, not interpreted       |
//! | 0x007C         | Activity Offset        | 4 bytes: Offset of the activity table, not interpreted     |
//! | 0x00B8         | Hash64 Table Size      | 4 bytes: Size of the 64-bit hash table, not interpreted    |
//! | 0x00BC         | Hash64 Table Offset    | 4 bytes: Offset of the 64-bit hash table, not interpreted  |
//!
//! ### File Entry
//!
//! Every file entry is 16 bytes. Most fields are bit-packed:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Reference              | 4 bytes: Opaque hash, usually the file's type reference |
//! | 0x0004         | Type Info              | 4 bytes: Bits 9..16 type, bits 6..9 subtype             |
//! | 0x0008         | Location               | 4 bytes: See below                                      |
//! | 0x000C         | Size                   | 4 bytes: Bits 0..26 hold the size shifted right by 4    |
//!
//! - **Location**: bits `0..14` hold the starting block index, bits `14..28` the starting offset inside that
//!   block in 16 byte units, bits `28..32` the low 4 bits of the file size.
//! - **Size**: `((size & 0x3FFFFFF) << 4) | (location >> 28)`
//!
//! ### Block Entry
//!
//! Every block entry is 48 bytes:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Offset                 | 4 bytes: Offset of the raw block in its patch file      |
//! | 0x0004         | Size                   | 4 bytes: Size of the raw block                          |
//! | 0x0008         | Patch Id               | 2 bytes: Patch file holding the raw block               |
//! | 0x000A         | Flags                  | 2 bytes: See below                                      |
//! | 0x000C         | SHA-1                  | 20 bytes: Digest of the raw block, not verified         |
//! | 0x0020         | GCM Tag                | 16 bytes: AES-GCM authentication tag                    |
//!
//! - **Flags**:
//!   - `0x1`: Compressed (Oodle)
//!   - `0x2`: Encrypted (AES-128-GCM)
//!   - `0x4`: Encrypted with the alternate key
//!
//! ### Blocks
//!
//! A decoded block is at most `0x40000` bytes. Encrypted blocks are decrypted first, using one of two fixed
//! keys and a nonce derived from the package id, then decompressed. A file occupies the blocks
//! `starting_block_index..starting_block_index + n` where
//! `n = (starting_block_offset + size - 1) / 0x40000 + 1`. Its data starts at `starting_block_offset` in the
//! first block and runs contiguously across the following ones.
//!
//! ## File Hashes
//!
//! `hash = 0x80800000 + (package_id << 13) + entry_index`, giving at most `0x2000` entries per package. Hashes
//! outside `0x80800000..=0x81FFFFFF` do not address a file.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.pkg`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression**: Oodle, enabled through the `oodle` feature, see [`codec`]
//!

pub mod codec;
pub mod error;
pub mod extract;
pub mod hash;
pub mod package;
pub mod paths;
pub mod registry;
pub mod strategy;
pub mod types;

pub use codec::{BlockCodec, Decompressor, NoDecompressor};
pub use error::{Error, Result};
pub use extract::{extract_files, extract_with, ExtractionReport};
pub use hash::{FileHash, TigerHash};
pub use package::Package;
pub use paths::PackagePathResolver;
pub use registry::{LoadReport, PackageRegistry, RegistryOptions};
pub use strategy::Strategy;
pub use types::{FileMetadata, PackageMetadata};
