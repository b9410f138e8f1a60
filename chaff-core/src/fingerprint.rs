use anyhow::{bail, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Built-in keyed-hash key, 32 bytes as hex. Every scan and reconcile uses
/// one process-wide key; manifests written under different keys never compare
/// equal, so interoperating runs must agree on this value.
pub const DEFAULT_KEY_HEX: &str =
    "08ed80781e731f756ad4deefa19d3691787654241f0cda6013b2b82c7c391555";

const READ_BUF: usize = 1 << 20;

/// Digest of one file's contents under the process key.
pub type Digest = blake3::Hash;

#[derive(Clone, Copy)]
pub struct HashKey([u8; 32]);

impl HashKey {
    /// Parse a 64-hex-char key. Rejects anything that is not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 64 {
            bail!("key must be 64 hex chars, got {}", s.len());
        }
        let mut key = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]);
            let lo = hex_val(chunk[1]);
            match (hi, lo) {
                (Some(h), Some(l)) => key[i] = (h << 4) | l,
                _ => bail!("key contains non-hex byte at offset {}", i * 2),
            }
        }
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for HashKey {
    fn default() -> Self {
        Self::from_hex(DEFAULT_KEY_HEX).expect("built-in key is valid hex")
    }
}

impl std::fmt::Debug for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "HashKey(..)")
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Failure to fingerprint a single file. Kept as a typed error so a failed
/// hash can never collapse into a valid-looking digest.
#[derive(Debug, thiserror::Error)]
#[error("fingerprint {path}: {source}")]
pub struct FingerprintError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Stream `path` through the keyed hash. Files of any size are read through
/// a fixed buffer, never fully into memory.
pub fn fingerprint_file(key: &HashKey, path: &Path) -> Result<Digest, FingerprintError> {
    let err = |source| FingerprintError { path: path.to_path_buf(), source };
    let mut file = File::open(path).map_err(err)?;
    let mut hasher = blake3::Hasher::new_keyed(key.as_bytes());
    let mut buf = vec![0u8; READ_BUF];
    loop {
        let n = file.read(&mut buf).map_err(err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
