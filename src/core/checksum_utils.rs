/*
 * Provides SHA-256 helpers. The hex digest of a workspace root path is used to
 * give every workspace its own state file without leaking the path into the
 * file name.
 */
use sha2::{Digest, Sha256};

/*
 * Calculates the SHA-256 digest of `text` and returns it hex-encoded
 * (64 lowercase characters).
 */
pub fn calculate_sha256_for_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hex_checksum = format!("{:x}", hasher.finalize());
    log::trace!("ChecksumUtils: Calculated checksum {hex_checksum} for text of {} bytes", text.len());
    hex_checksum
}
