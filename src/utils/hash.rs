use crc32fast::Hasher;

/// CRC32 over a snapshot payload.
pub fn calculate_checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

pub fn verify_checksum(payload: &[u8], expected_checksum: u32) -> bool {
    calculate_checksum(payload) == expected_checksum
}
