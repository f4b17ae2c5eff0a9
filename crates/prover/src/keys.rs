use std::{fs, io::Write, path::Path};

use anyhow::Context;
use secp256k1::{rand::rngs::OsRng, SecretKey};
use tracing::*;

/// Loads the agent's signing key from `path`, generating and saving a fresh
/// one if the file does not exist.
pub fn load_or_create_key(path: &Path) -> anyhow::Result<SecretKey> {
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read keystore {}", path.display()))?;
        let bytes = hex::decode(raw.trim()).context("keystore is not hex")?;
        let sk = SecretKey::from_slice(&bytes).context("keystore holds an invalid key")?;
        debug!(?path, "loaded prover key");
        return Ok(sk);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let sk = SecretKey::new(&mut OsRng);
    write_private(path, hex::encode(sk.secret_bytes()).as_bytes())
        .with_context(|| format!("write keystore {}", path.display()))?;
    info!(?path, "generated new prover key");

    Ok(sk)
}

/// Creates `path` readable by the owner only and writes `contents` to it.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }

    let mut file = opts.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
