//! Game version specific package layouts.
//!
//! Every supported game release gets one [`PackageLayout`] implementation,
//! selected through the [`Strategy`] enum.

pub mod witch_queen;

use std::fmt::Debug;

use crate::error::Result;
use crate::types::{BlockEntry, BlockFlags, FileEntry, PackageHeader};

/// Binary layout and crypto constants of one game version
pub trait PackageLayout: Debug + Send + Sync {
    /// Size of the header region at the start of every package file
    fn header_size(&self) -> usize;

    /// Size of one file entry record
    fn file_entry_size(&self) -> usize;

    /// Size of one block entry record
    fn block_entry_size(&self) -> usize;

    /// Size of a decoded block
    fn block_size(&self) -> usize;

    /// Platform prefix every package file name starts with
    fn platform_prefix(&self) -> &'static str;

    /// Parse the header from the first [`PackageLayout::header_size`] bytes
    fn parse_header(&self, bytes: &[u8]) -> Result<PackageHeader>;

    /// Parse one file entry record
    fn parse_file_entry(&self, bytes: &[u8]) -> Result<FileEntry>;

    /// Parse one block entry record
    fn parse_block_entry(&self, bytes: &[u8]) -> Result<BlockEntry>;

    /// AES-128 key for a block with the given flags
    fn aes_key(&self, flags: BlockFlags) -> &'static [u8; 16];

    /// AES-GCM nonce for blocks of the given package
    fn nonce(&self, package_id: u16) -> [u8; 12];
}

/// Selects the package layout of a game release
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Strategy {
    /// Destiny 2, The Witch Queen, build 6307
    #[default]
    #[cfg_attr(feature = "clap", value(name = "destiny2-witchqueen-6307"))]
    Destiny2WitchQueen6307,
}

impl Strategy {
    /// Layout used by this release
    pub fn layout(&self) -> &'static dyn PackageLayout {
        match self {
            Strategy::Destiny2WitchQueen6307 => &witch_queen::WitchQueen6307,
        }
    }
}
