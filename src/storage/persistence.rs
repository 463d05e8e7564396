use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::{
    storage::{SNAPSHOT_HEADER_SIZE, header::SnapshotHeader, snapshot::TableSnapshot},
    types::error::DatabaseError,
    utils::hash::{calculate_checksum, verify_checksum},
};

pub fn encode_snapshot(snapshot: &TableSnapshot) -> Result<Vec<u8>, DatabaseError> {
    let payload = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?;
    let header = SnapshotHeader::new(payload.len() as u64, calculate_checksum(&payload));

    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<TableSnapshot, DatabaseError> {
    let header = SnapshotHeader::from_bytes(bytes)?;
    let payload = &bytes[SNAPSHOT_HEADER_SIZE..];
    if payload.len() as u64 != header.payload_length {
        return Err(DatabaseError::CorruptedSnapshot {
            reason: format!(
                "payload is {} bytes, header says {}",
                payload.len(),
                header.payload_length
            ),
        });
    }
    if !verify_checksum(payload, header.payload_checksum) {
        return Err(DatabaseError::CorruptedSnapshot {
            reason: "payload checksum mismatch".to_string(),
        });
    }

    let (snapshot, _) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
    Ok(snapshot)
}

/// Write the snapshot next to `path` and rename it into place, so a crash
/// never leaves a half-written file under the final name.
pub fn save_snapshot<P: AsRef<Path>>(path: P, snapshot: &TableSnapshot) -> Result<(), DatabaseError> {
    let path = path.as_ref();
    let bytes = encode_snapshot(snapshot)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| DatabaseError::Io(err.error))?;

    tracing::info!(
        table = %snapshot.name,
        path = %path.display(),
        bytes = bytes.len(),
        "saved table snapshot"
    );
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<TableSnapshot, DatabaseError> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    let snapshot = decode_snapshot(&bytes)?;
    tracing::info!(
        table = %snapshot.name,
        path = %path.display(),
        "loaded table snapshot"
    );
    Ok(snapshot)
}
