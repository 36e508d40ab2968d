//! Block decryption and decompression handling.

use std::fmt::Debug;
use std::sync::Arc;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce, Tag};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::strategy::{PackageLayout, Strategy};
use crate::types::BlockEntry;

/// Decompressor for compressed blocks
///
/// Implementations receive the raw block and the size a decoded block may
/// reach, and return the decoded bytes.
pub trait Decompressor: Debug + Send + Sync {
    /// Decompress `input` into at most `output_capacity` bytes
    fn decompress(&self, input: &[u8], output_capacity: usize) -> Result<Vec<u8>>;
}

/// Decompressor used when no codec is available
///
/// Every compressed block fails with [`Error::Codec`].
#[derive(Debug, Default, Copy, Clone)]
pub struct NoDecompressor;

impl Decompressor for NoDecompressor {
    fn decompress(&self, input: &[u8], _output_capacity: usize) -> Result<Vec<u8>> {
        Err(Error::Codec(format!(
            "block of {} bytes is compressed but no decompressor is available",
            input.len()
        )))
    }
}

#[cfg(feature = "oodle")]
pub use oodle::OodleDecompressor;

#[cfg(feature = "oodle")]
mod oodle {
    use std::ffi::c_void;
    use std::ptr;

    use super::Decompressor;
    use crate::error::{Error, Result};

    /// `OodleLZ_Decode_ThreadPhase` value for single threaded decoding
    const THREAD_PHASE_UNTHREADED: i32 = 3;

    #[link(name = "oo2core_9_win64")]
    extern "C" {
        fn OodleLZ_Decompress(
            comp_buf: *const u8,
            comp_buf_size: isize,
            raw_buf: *mut u8,
            raw_len: isize,
            fuzz_safe: i32,
            check_crc: i32,
            verbosity: i32,
            dec_buf_base: *mut u8,
            dec_buf_size: isize,
            fp_callback: *mut c_void,
            callback_user_data: *mut c_void,
            decoder_memory: *mut c_void,
            decoder_memory_size: isize,
            thread_phase: i32,
        ) -> isize;
    }

    /// Decompressor backed by the native Oodle library
    #[derive(Debug, Default, Copy, Clone)]
    pub struct OodleDecompressor;

    impl Decompressor for OodleDecompressor {
        fn decompress(&self, input: &[u8], output_capacity: usize) -> Result<Vec<u8>> {
            let mut output = vec![0u8; output_capacity];

            // SAFETY: both buffers are owned here and outlive the call, the
            // lengths passed are their exact lengths and no callback or
            // decoder memory is handed over.
            let written = unsafe {
                OodleLZ_Decompress(
                    input.as_ptr(),
                    input.len() as isize,
                    output.as_mut_ptr(),
                    output.len() as isize,
                    0,
                    0,
                    0,
                    ptr::null_mut(),
                    0,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    0,
                    THREAD_PHASE_UNTHREADED,
                )
            };

            if written <= 0 {
                return Err(Error::Codec(format!(
                    "oodle rejected a block of {} bytes",
                    input.len()
                )));
            }

            output.truncate(written as usize);
            Ok(output)
        }
    }
}

/// Decompressor picked when the caller does not provide one
pub fn default_decompressor() -> Arc<dyn Decompressor> {
    #[cfg(feature = "oodle")]
    {
        Arc::new(OodleDecompressor)
    }
    #[cfg(not(feature = "oodle"))]
    {
        Arc::new(NoDecompressor)
    }
}

/// Turns raw blocks of one package into plain block data
#[derive(Debug, Clone)]
pub struct BlockCodec {
    package_id: u16,
    layout: &'static dyn PackageLayout,
    decompressor: Arc<dyn Decompressor>,
}

impl BlockCodec {
    /// Create a codec for blocks of package `package_id`
    pub fn new(package_id: u16, strategy: Strategy, decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            package_id,
            layout: strategy.layout(),
            decompressor,
        }
    }

    /// Nonce used for every encrypted block of this package
    pub fn nonce(&self) -> [u8; 12] {
        self.layout.nonce(self.package_id)
    }

    /// Decrypt a raw block with its stored GCM tag.
    ///
    /// A tag that does not verify is an [`Error::Authentication`], no
    /// plaintext is returned in that case.
    pub fn decrypt(&self, buffer: &[u8], block: &BlockEntry) -> Result<Vec<u8>> {
        let key = self.layout.aes_key(block.flags);
        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|e| Error::Codec(format!("invalid AES key: {e}")))?;
        let nonce = self.nonce();

        let mut plain = buffer.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&nonce),
                &[],
                &mut plain,
                Tag::from_slice(&block.gcm_tag),
            )
            .map_err(|_| Error::Authentication {
                package_id: self.package_id,
                patch_id: block.patch_id,
                offset: block.offset,
            })?;

        Ok(plain)
    }

    /// Decompress a block into at most one block size of data
    pub fn decompress(&self, buffer: &[u8], block: &BlockEntry) -> Result<Vec<u8>> {
        let capacity = self.layout.block_size();
        let output = self.decompressor.decompress(buffer, capacity)?;
        if output.is_empty() || output.len() > capacity {
            return Err(Error::Codec(format!(
                "block at {:#x} in patch {} decompressed to {} bytes",
                block.offset,
                block.patch_id,
                output.len()
            )));
        }
        Ok(output)
    }

    /// Decrypt then decompress a raw block as its flags require
    #[instrument(skip(self, buffer, block), fields(patch = block.patch_id, offset = block.offset), err)]
    pub fn decode(&self, buffer: Vec<u8>, block: &BlockEntry) -> Result<Vec<u8>> {
        debug!(flags = block.flags.0, size = buffer.len(), "decoding block");

        let decrypted = if block.flags.is_encrypted() {
            self.decrypt(&buffer, block)?
        } else {
            buffer
        };

        if block.flags.is_compressed() {
            self.decompress(&decrypted, block)
        } else {
            Ok(decrypted)
        }
    }
}
