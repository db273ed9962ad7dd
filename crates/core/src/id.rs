//! Opaque string identifiers.

use uuid::Uuid;

/// Create a new identifier, optionally prefixed as `<prefix>_<id>`.
///
/// The id part is a UUIDv7 in simple (32 hex digit) form: a 48-bit
/// millisecond timestamp followed by 74 random bits. Two ids minted in the
/// same millisecond collide with probability 2^-74, which is ample for a
/// single process.
pub fn generate_id(prefix: Option<&str>) -> String {
    let id = Uuid::now_v7().simple().to_string();
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}_{id}"),
        _ => id,
    }
}
