//! Types for reading packages
//!

use std::{
    collections::BTreeSet,
    fmt::{self, Debug},
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::{
    codec::{default_decompressor, BlockCodec, Decompressor},
    error::{Error, Result},
    hash::FileHash,
    paths::package_base_name,
    strategy::{PackageLayout, Strategy},
    types::{BlockEntry, FileEntry, FileMetadata, PackageHeader, PackageMetadata, TableDescriptor},
};

/// Highest number of file entries a [`FileHash`] can address
const MAX_FILE_ENTRIES: u32 = 0x2000;

/// Highest patch id that maps onto a `_<digit>.pkg` file name
const MAX_PATCH_ID: u16 = 9;

/// Where a block sits in the run of blocks making up one file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BlockPosition {
    /// The file fits in a single block
    Only,
    /// First block of several, copied from the file's starting offset
    First,
    /// Neither first nor last, copied whole
    Interior,
    /// Last block of several, copied up to the end of the file
    Last,
}

impl BlockPosition {
    fn of(index: usize, block_count: usize) -> Self {
        if block_count == 1 {
            BlockPosition::Only
        } else if index == 0 {
            BlockPosition::First
        } else if index == block_count - 1 {
            BlockPosition::Last
        } else {
            BlockPosition::Interior
        }
    }
}

/// Assemble the data of `entry` from its decoded blocks.
///
/// `blocks` must yield the file's blocks in order. It is consumed lazily, so
/// the first failing block stops the assembly.
pub(crate) fn stitch<I>(entry: &FileEntry, block_size: usize, blocks: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
{
    let size = entry.size as usize;
    let start = entry.starting_block_offset as usize;
    let block_count = entry.block_count(block_size);

    if block_count > 0 && start >= block_size {
        return Err(Error::Format(format!(
            "file starts at {start:#x}, past the end of its first block"
        )));
    }

    let mut output = vec![0u8; size];
    let mut copied = 0usize;

    for (index, block) in blocks.into_iter().enumerate() {
        if index >= block_count {
            return Err(Error::Format(format!(
                "file spans {block_count} blocks but more were provided"
            )));
        }
        let block = block?;

        let (source, len) = match BlockPosition::of(index, block_count) {
            BlockPosition::Only => (start, size),
            BlockPosition::First => (start, block_size - start),
            BlockPosition::Interior => (0, block_size),
            BlockPosition::Last => (0, size - copied),
        };

        let chunk = block.get(source..source + len).ok_or_else(|| {
            Error::Format(format!(
                "block {index} of a file holds {} bytes, {} are needed",
                block.len(),
                source + len
            ))
        })?;
        output[copied..copied + len].copy_from_slice(chunk);
        copied += len;
    }

    if copied != size {
        return Err(Error::Format(format!(
            "file of {size} bytes was assembled from {copied} bytes"
        )));
    }

    Ok(output)
}

/// Split a package file name into its base and patch number.
///
/// `w64_sr_raids_011d_7.pkg` splits into `("w64_sr_raids_011d", 7)`. Only
/// single digit patch numbers are recognised.
pub fn split_patch_suffix(file_name: &str) -> Option<(&str, u16)> {
    let stem = file_name.strip_suffix(".pkg")?;
    let (base, patch) = stem.rsplit_once('_')?;
    match patch.as_bytes() {
        [digit] if digit.is_ascii_digit() => Some((base, (digit - b'0') as u16)),
        _ => None,
    }
}

/// Check that `path` names an existing package file of the given layout.
///
/// Returns the patch number encoded in the file name.
pub fn validate_package_path(path: &Path, layout: &dyn PackageLayout) -> Result<u16> {
    let invalid = |reason| Error::InvalidPackagePath {
        path: path.to_path_buf(),
        reason,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("file name is missing or not valid UTF-8"))?;

    if path.extension().and_then(|e| e.to_str()) != Some("pkg") {
        return Err(invalid("expected a .pkg extension"));
    }

    if !name.starts_with(layout.platform_prefix()) {
        return Err(invalid("unexpected platform prefix"));
    }

    let (_, patch_id) =
        split_patch_suffix(name).ok_or_else(|| invalid("missing _<patch> suffix"))?;

    if !path.is_file() {
        return Err(Error::PackagePathNotFound(path.to_path_buf()));
    }

    Ok(patch_id)
}

/// A package opened from disk
///
/// Opening a package reads its header and both entry tables. Block data is
/// read on demand from whichever patch file a block names, and each patch
/// file is opened at most once while its handle stays cached.
///
/// ```no_run
/// use tiger_pkg::{FileHash, Package, Strategy};
///
/// fn dump_first_file(path: &str) -> tiger_pkg::error::Result<()> {
///     let package = Package::open(path, Strategy::default())?;
///     let hash = FileHash::new(package.package_id(), 0);
///
///     let metadata = package.file_metadata(hash)?;
///     let data = package.file_bytes(hash)?;
///     assert_eq!(data.len(), metadata.size as usize);
///
///     Ok(())
/// }
/// ```
pub struct Package {
    path: PathBuf,
    strategy: Strategy,
    header: PackageHeader,
    file_entries: Vec<FileEntry>,
    block_entries: Vec<BlockEntry>,
    codec: BlockCodec,
    handles: DashMap<u16, Arc<Mutex<File>>>,
}

impl Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("package_id", &format_args!("{:04x}", self.header.package_id))
            .field("patch_id", &self.header.patch_id)
            .field("files", &self.file_entries.len())
            .field("blocks", &self.block_entries.len())
            .finish()
    }
}

impl Package {
    /// Open a package with the default decompressor
    pub fn open(path: impl AsRef<Path>, strategy: Strategy) -> Result<Package> {
        Self::open_with(path, strategy, default_decompressor())
    }

    /// Open a package, decompressing blocks with `decompressor`
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open_with(
        path: impl AsRef<Path>,
        strategy: Strategy,
        decompressor: Arc<dyn Decompressor>,
    ) -> Result<Package> {
        let path = path.as_ref();
        let layout = strategy.layout();
        let name_patch_id = validate_package_path(path, layout)?;

        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let header = Self::read_header_from(&mut file, layout)?;

        if header.patch_id != name_patch_id {
            return Err(Error::Format(format!(
                "file name names patch {name_patch_id} but the header holds patch {}",
                header.patch_id
            )));
        }

        if header.file_entries.count > MAX_FILE_ENTRIES {
            return Err(Error::Format(format!(
                "{} file entries cannot be addressed by file hashes",
                header.file_entries.count
            )));
        }

        let file_entries = Self::read_table(
            &mut file,
            file_len,
            header.file_entries,
            layout.file_entry_size(),
            "file entry",
            |bytes| layout.parse_file_entry(bytes),
        )?;
        let block_entries = Self::read_table(
            &mut file,
            file_len,
            header.block_entries,
            layout.block_entry_size(),
            "block entry",
            |bytes| layout.parse_block_entry(bytes),
        )?;

        info!(
            "opened package {:04x} patch {} with {} files in {} blocks",
            header.package_id,
            header.patch_id,
            file_entries.len(),
            block_entries.len()
        );

        let handles = DashMap::new();
        handles.insert(header.patch_id, Arc::new(Mutex::new(file)));

        Ok(Package {
            path: path.to_path_buf(),
            strategy,
            codec: BlockCodec::new(header.package_id, strategy, decompressor),
            header,
            file_entries,
            block_entries,
            handles,
        })
    }

    /// Read only the header of the package file at `path`
    pub fn read_header(path: impl AsRef<Path>, strategy: Strategy) -> Result<PackageHeader> {
        let path = path.as_ref();
        let layout = strategy.layout();
        validate_package_path(path, layout)?;
        Self::read_header_from(&mut File::open(path)?, layout)
    }

    fn read_header_from(file: &mut File, layout: &dyn PackageLayout) -> Result<PackageHeader> {
        let mut bytes = vec![0u8; layout.header_size()];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::Format("file is smaller than a package header".into())
            }
            _ => Error::from(e),
        })?;
        layout.parse_header(&bytes)
    }

    fn read_table<T>(
        file: &mut File,
        file_len: u64,
        table: TableDescriptor,
        record_size: usize,
        name: &str,
        parse: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<Vec<T>> {
        let table_len = table.count as u64 * record_size as u64;
        if table.offset as u64 + table_len > file_len {
            return Err(Error::Format(format!(
                "{name} table of {} records at {:#x} runs past the end of the file ({file_len} bytes)",
                table.count, table.offset
            )));
        }

        file.seek(SeekFrom::Start(table.offset as u64))?;
        let mut bytes = vec![0u8; table_len as usize];
        file.read_exact(&mut bytes)?;

        bytes.chunks_exact(record_size).map(parse).collect()
    }

    /// Path the package was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strategy the package was parsed with
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The parsed header
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Id shared by all patch files of this package
    pub fn package_id(&self) -> u16 {
        self.header.package_id
    }

    /// Number of file entries
    pub fn len(&self) -> usize {
        self.file_entries.len()
    }

    /// Whether this package contains no file entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of a decoded block
    pub fn block_size(&self) -> usize {
        self.strategy.layout().block_size()
    }

    /// Summary of the opened package file
    pub fn package_metadata(&self) -> PackageMetadata {
        PackageMetadata {
            path: self.path.clone(),
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            id: self.header.package_id,
            patch_id: self.header.patch_id,
            timestamp: self.header.timestamp,
            file_count: self.header.file_entries.count,
        }
    }

    /// Look up the entry a hash addresses
    pub fn file_entry(&self, hash: FileHash) -> Result<&FileEntry> {
        if hash.package_id() != self.header.package_id {
            return Err(Error::InvalidPackageId {
                expected: self.header.package_id,
                actual: hash.package_id(),
            });
        }
        self.file_entry_by_index(hash.entry_index())
    }

    fn file_entry_by_index(&self, index: u16) -> Result<&FileEntry> {
        self.file_entries
            .get(index as usize)
            .ok_or(Error::FileIndexOutOfRange {
                index,
                count: self.file_entries.len(),
            })
    }

    /// Metadata of the file a hash addresses
    pub fn file_metadata(&self, hash: FileHash) -> Result<FileMetadata> {
        self.file_entry(hash)
            .map(|entry| FileMetadata::new(hash, entry))
    }

    /// Metadata of the file at `index` in the file entry table
    pub fn file_metadata_by_index(&self, index: u16) -> Result<FileMetadata> {
        self.file_entry_by_index(index)
            .map(|entry| FileMetadata::new(FileHash::new(self.header.package_id, index), entry))
    }

    /// Metadata of every file in the package, in table order
    pub fn all_file_metadata(&self) -> Vec<FileMetadata> {
        self.file_entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                FileMetadata::new(FileHash::new(self.header.package_id, index as u16), entry)
            })
            .collect()
    }

    /// The run of block entries holding `entry`'s data
    pub fn blocks_of(&self, entry: &FileEntry) -> Result<&[BlockEntry]> {
        let start = entry.starting_block_index as usize;
        let end = start + entry.block_count(self.block_size());
        self.block_entries.get(start..end).ok_or_else(|| {
            Error::Format(format!(
                "file spans blocks {start}..{end} but the package has {} blocks",
                self.block_entries.len()
            ))
        })
    }

    /// Read and decode the file a hash addresses
    #[instrument(skip_all, fields(hash = %hash), err)]
    pub fn file_bytes(&self, hash: FileHash) -> Result<Vec<u8>> {
        let entry = self.file_entry(hash)?;
        let blocks = self.blocks_of(entry)?;
        debug!(
            size = entry.size,
            blocks = blocks.len(),
            "reading file starting in block {} at {:#x}",
            entry.starting_block_index,
            entry.starting_block_offset
        );

        stitch(
            entry,
            self.block_size(),
            blocks.iter().map(|block| {
                self.read_block(block)
                    .and_then(|raw| self.codec.decode(raw, block))
            }),
        )
    }

    /// Patch ids referenced by the blocks of any file in this package
    pub fn required_patches(&self) -> Result<BTreeSet<u16>> {
        let mut patches = BTreeSet::new();
        for entry in &self.file_entries {
            patches.extend(self.blocks_of(entry)?.iter().map(|block| block.patch_id));
        }
        Ok(patches)
    }

    /// Path of the physical file holding patch `patch_id` of this package
    pub fn patch_path(&self, patch_id: u16) -> Result<PathBuf> {
        if patch_id > MAX_PATCH_ID {
            return Err(Error::UnsupportedPatchId(patch_id));
        }

        let base = package_base_name(&self.path).ok_or_else(|| Error::InvalidPackagePath {
            path: self.path.clone(),
            reason: "missing _<patch> suffix",
        })?;

        Ok(self.path.with_file_name(format!("{base}_{patch_id}.pkg")))
    }

    /// Drop every cached patch file handle.
    ///
    /// Handles are reopened the next time a block needs them.
    pub fn close_handles(&self) {
        self.handles.clear();
    }

    fn patch_handle(&self, patch_id: u16) -> Result<Arc<Mutex<File>>> {
        if let Some(handle) = self.handles.get(&patch_id) {
            return Ok(handle.clone());
        }

        let handle = self.handles.entry(patch_id).or_try_insert_with(|| {
            let path = self.patch_path(patch_id)?;
            debug!("opening patch file {}", path.display());
            match File::open(&path) {
                Ok(file) => Ok(Arc::new(Mutex::new(file))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(Error::PackagePathNotFound(path))
                }
                Err(e) => Err(Error::from(e)),
            }
        })?;

        Ok(handle.clone())
    }

    fn read_block(&self, block: &BlockEntry) -> Result<Vec<u8>> {
        let handle = self.patch_handle(block.patch_id)?;
        let mut file = handle.lock();

        let file_len = file.metadata()?.len();
        if block.offset as u64 + block.size as u64 > file_len {
            return Err(Error::Format(format!(
                "block of {} bytes at {:#x} runs past the end of patch {} ({file_len} bytes)",
                block.size, block.offset, block.patch_id
            )));
        }

        let mut raw = vec![0u8; block.size as usize];
        file.seek(SeekFrom::Start(block.offset as u64))?;
        file.read_exact(&mut raw)?;

        Ok(raw)
    }
}
