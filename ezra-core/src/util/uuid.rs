//! Random identifiers.

use rand::RngCore;

/// `2 * half` lowercase hex characters from `half` random bytes.
pub fn uuid(half: usize) -> String {
    let mut bytes = vec![0u8; half];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Random (version 4) UUID, e.g. `7544eee6-4ac1-4883-a1a6-0759de6e6873`.
pub fn uuid4() -> String {
    ::uuid::Uuid::new_v4().hyphenated().to_string()
}
