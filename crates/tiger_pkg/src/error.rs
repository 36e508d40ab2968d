//! Error types that can be emitted from this library

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    #[diagnostic(code(tiger_pkg::format))]
    BinRWError(#[from] binrw::Error),

    /// the packages directory or another host supplied setting is unusable
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(tiger_pkg::configuration))]
    Configuration(String),

    /// path does not follow the `<prefix>_<name>_<patch>.pkg` naming convention
    #[error("invalid package path {}: {reason}", .path.display())]
    #[diagnostic(code(tiger_pkg::configuration))]
    InvalidPackagePath {
        /// The rejected path
        path: PathBuf,
        /// Which part of the convention was broken
        reason: &'static str,
    },

    /// text could not be parsed as a file hash
    #[error("{value} is not a file hash: {reason}")]
    #[diagnostic(code(tiger_pkg::parse), help("file hashes are 8 hex digits, like 80A3BA86"))]
    InvalidFileHash {
        /// The rejected text
        value: String,
        /// Why parsing failed
        reason: String,
    },

    /// package file does not exist on disk
    #[error("package file does not exist: {}", .0.display())]
    #[diagnostic(code(tiger_pkg::not_found))]
    PackagePathNotFound(PathBuf),

    /// no package with this id was found while scanning the packages directory
    #[error("no package with id {0:04x} was found")]
    #[diagnostic(code(tiger_pkg::not_found))]
    PackageNotFound(u16),

    /// file hash addresses a different package than the one asked
    #[error("the provided file hash has an invalid package id: {actual:04x} (package is {expected:04x})")]
    #[diagnostic(code(tiger_pkg::not_found))]
    InvalidPackageId {
        /// Id of the package that was asked
        expected: u16,
        /// Id encoded in the hash
        actual: u16,
    },

    /// file index is past the end of the file entry table
    #[error("the provided file hash has an out-of-range file index: {index} >= {count}")]
    #[diagnostic(code(tiger_pkg::not_found))]
    FileIndexOutOfRange {
        /// Requested index
        index: u16,
        /// Number of file entries in the package
        count: usize,
    },

    /// header or tables do not fit the expected layout
    #[error("malformed package: {0}")]
    #[diagnostic(code(tiger_pkg::format))]
    Format(String),

    /// patch files are only addressed by a single digit
    #[error("patch id {0} cannot be mapped to a package file")]
    #[diagnostic(code(tiger_pkg::format))]
    UnsupportedPatchId(u16),

    /// AES-GCM tag did not verify for a block
    #[error("block at {offset:#x} in patch {patch_id} of package {package_id:04x} failed authentication")]
    #[diagnostic(
        code(tiger_pkg::authentication),
        help("the block is corrupted or was decrypted with the wrong key")
    )]
    Authentication {
        /// Package the block belongs to
        package_id: u16,
        /// Patch file holding the block
        patch_id: u16,
        /// Offset of the block in its patch file
        offset: u32,
    },

    /// block decompressor reported a failure
    #[error("decompression failed: {0}")]
    #[diagnostic(code(tiger_pkg::codec))]
    Codec(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
