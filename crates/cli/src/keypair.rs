//! Signing keypair loading.

use anyhow::{Context, Result, anyhow, bail};
use solana_sdk::signature::Keypair;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Length of an ed25519 keypair: secret key followed by public key.
const KEYPAIR_LENGTH: usize = 64;

/// Parses a JSON array of 64 bytes into a keypair.
pub fn keypair_from_json(json: &str) -> Result<Keypair> {
    let bytes: Vec<u8> =
        serde_json::from_str(json.trim()).context("secret key is not a JSON array of bytes")?;
    if bytes.len() != KEYPAIR_LENGTH {
        bail!(
            "expected {KEYPAIR_LENGTH} secret key bytes, found {}",
            bytes.len()
        );
    }
    Keypair::try_from(bytes.as_slice()).map_err(|e| anyhow!("invalid secret key: {e}"))
}

/// Loads the signing keypair.
///
/// `private_key` (the `PRIVATE_KEY` variable) wins when it parses; otherwise
/// `keypair_file` is read.
///
/// # Errors
/// Fails when neither source yields a keypair.
pub fn load_keypair(private_key: Option<&str>, keypair_file: Option<&Path>) -> Result<Keypair> {
    if let Some(json) = private_key.filter(|value| !value.trim().is_empty()) {
        match keypair_from_json(json) {
            Ok(keypair) => return Ok(keypair),
            Err(e) => warn!(error = %e, "PRIVATE_KEY is not a usable keypair"),
        }
    }
    if let Some(path) = keypair_file {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading keypair file {}", path.display()))?;
        return keypair_from_json(&json)
            .with_context(|| format!("parsing keypair file {}", path.display()));
    }
    bail!("no valid private key found: set PRIVATE_KEY or pass --keypair")
}
