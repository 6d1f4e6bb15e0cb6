//! Mapping between cache keys and relative filesystem paths.
//!
//! Keys are sharded into fixed-width directory segments so that large
//! caches do not pile every entry into a single directory. The mapping is
//! reversible for keys that contain no path separator, which is the
//! contract callers uphold by using hex digests as keys.

use std::path::MAIN_SEPARATOR;

/// Default number of characters per shard directory.
pub const DEFAULT_CACHE_DIR_LEN: i32 = 2;

/// Converts a key to a relative path, inserting the platform separator
/// every `n` characters. The final segment is never empty, so no trailing
/// separator is produced. A non-positive `n` disables sharding.
///
/// Operates on Unicode scalar values rather than bytes so the same key
/// maps to the same tree on every platform.
pub fn key_to_path(key: &str, n: i32) -> String {
    if n <= 0 {
        return key.to_string();
    }
    let n = n as usize;
    let mut path = String::with_capacity(key.len() + key.len() / n);
    for (i, ch) in key.chars().enumerate() {
        // A separator only ever lands in front of a character, so the
        // final segment cannot be empty.
        if i > 0 && i % n == 0 {
            path.push(MAIN_SEPARATOR);
        }
        path.push(ch);
    }
    path
}

/// Inverse of [`key_to_path`]: strips every path separator.
///
/// Lossy for keys that themselves contain the separator; callers are
/// expected to provide separator-free keys.
pub fn path_to_key(path: &str) -> String {
    path.chars().filter(|&ch| ch != MAIN_SEPARATOR).collect()
}
