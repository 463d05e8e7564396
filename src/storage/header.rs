use crate::{
    storage::{SNAPSHOT_FORMAT_VERSION, SNAPSHOT_HEADER_SIZE, SNAPSHOT_MAGIC},
    types::{PAGE_SIZE, error::DatabaseError},
};

/*
 * Snapshot File Header (64 bytes, big-endian)
 * ┌────────────────────────────────────────────────────────────┐
 * │ magic(16) | format_version(2) | page_size(2) |             │
 * │ payload_length(8) | payload_checksum(4) | reserved(32)     │
 * └────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    pub magic: [u8; 16],
    pub format_version: u16,
    pub page_size: u16,
    pub payload_length: u64,
    pub payload_checksum: u32,
}

impl SnapshotHeader {
    pub fn new(payload_length: u64, payload_checksum: u32) -> Self {
        Self {
            magic: *SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            page_size: PAGE_SIZE as u16,
            payload_length,
            payload_checksum,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(SNAPSHOT_HEADER_SIZE);

        buffer.extend_from_slice(&self.magic);
        buffer.extend_from_slice(&self.format_version.to_be_bytes());
        buffer.extend_from_slice(&self.page_size.to_be_bytes());
        buffer.extend_from_slice(&self.payload_length.to_be_bytes());
        buffer.extend_from_slice(&self.payload_checksum.to_be_bytes());

        buffer.resize(SNAPSHOT_HEADER_SIZE, 0);
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() < SNAPSHOT_HEADER_SIZE {
            return Err(DatabaseError::InvalidHeader {
                reason: "Header too short".to_string(),
            });
        }

        let mut offset = 0;

        let mut magic = [0u8; 16];
        magic.copy_from_slice(&bytes[offset..offset + 16]);
        if &magic != SNAPSHOT_MAGIC {
            return Err(DatabaseError::InvalidHeader {
                reason: "Invalid snapshot magic number".to_string(),
            });
        }
        offset += 16;

        let format_version = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        if format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(DatabaseError::InvalidHeader {
                reason: format!("Unsupported format version: {}", format_version),
            });
        }
        offset += 2;

        let page_size = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        if page_size as usize != PAGE_SIZE {
            return Err(DatabaseError::InvalidHeader {
                reason: format!("Unsupported page size: {}", page_size),
            });
        }
        offset += 2;

        let mut length = [0u8; 8];
        length.copy_from_slice(&bytes[offset..offset + 8]);
        let payload_length = u64::from_be_bytes(length);
        offset += 8;

        let payload_checksum = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);

        Ok(Self {
            magic,
            format_version,
            page_size,
            payload_length,
            payload_checksum,
        })
    }
}
