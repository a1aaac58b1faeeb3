//! Content hashing for duplicate detection.
//!
//! BLAKE3 by default; SHA-256 when the ledger has to match other tools.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::{ContentHash, HashAlgorithm};

const BLOCK_SIZE: usize = 64 * 1024;

/// Compute the digest of a file's contents.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> io::Result<ContentHash> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(BLOCK_SIZE, file);

    match algorithm {
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            feed(reader, |chunk| {
                hasher.update(chunk);
            })?;
            Ok(ContentHash(*hasher.finalize().as_bytes()))
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            feed(reader, |chunk| hasher.update(chunk))?;
            Ok(ContentHash(hasher.finalize().into()))
        }
    }
}

fn feed<R: Read>(mut reader: R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buffer = vec![0u8; BLOCK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            return Ok(());
        }
        update(&buffer[..bytes_read]);
    }
}

// ============================================================================
// TESTS
// ============================================================================
