//! Small JSON records kept next to the binary (tokens, schedule state).

use eyre::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Reads the raw contents of a record, or `None` if there is no record yet.
pub(crate) async fn read(path: &Path) -> eyre::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

pub(crate) fn parse<T: DeserializeOwned>(bytes: &[u8]) -> eyre::Result<T> {
    serde_json::from_slice(bytes).context("parse JSON record")
}

/// Replaces the record at `path` with `value`.
///
/// The new contents are written to a sibling file first and then renamed over the old record,
/// so a crash mid-write leaves the previous record intact.
pub(crate) async fn write<T: Serialize>(path: &Path, value: &T) -> eyre::Result<()> {
    let json = serde_json::to_vec_pretty(value).context("serialize record")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    tokio::fs::write(&staging, &json)
        .await
        .with_context(|| format!("write {}", Path::new(&staging).display()))?;
    tokio::fs::rename(&staging, path)
        .await
        .with_context(|| format!("move new record into {}", path.display()))?;
    Ok(())
}
