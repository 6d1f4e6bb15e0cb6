use crate::error::{Error, Result};
use crate::path::DEFAULT_CACHE_DIR_LEN;

/// No limit on the number of keys.
pub const NO_LIMIT_KEYS: u64 = 0;
/// No limit on the total number of bytes.
pub const NO_LIMIT_TOTAL_BYTES: u64 = 0;

const DEFAULT_ADJUST_PERCENTAGE: u64 = 80;

/// Construction-time tuning for [`DiskCache`](super::DiskCache).
///
/// ```
/// use httpstash::CacheOptions;
///
/// let options = CacheOptions::new()
///     .max_keys(10_000)
///     .max_total_bytes(512 * 1024 * 1024)
///     .auto_adjust();
/// # let _ = options;
/// ```
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub(super) max_keys: u64,
    pub(super) max_total_bytes: u64,
    pub(super) disable_auto_cleanup: bool,
    pub(super) disable_warm_up: bool,
    pub(super) auto_adjust: bool,
    pub(super) adjust_percentage: u64,
    pub(super) touch_on_hit: bool,
    pub(super) cache_dir_len: i32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_keys: NO_LIMIT_KEYS,
            max_total_bytes: NO_LIMIT_TOTAL_BYTES,
            disable_auto_cleanup: false,
            disable_warm_up: false,
            auto_adjust: false,
            adjust_percentage: DEFAULT_ADJUST_PERCENTAGE,
            touch_on_hit: false,
            cache_dir_len: DEFAULT_CACHE_DIR_LEN,
        }
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of entries; overflow evicts the least-recently-
    /// inserted entry. [`NO_LIMIT_KEYS`] disables the cap.
    pub fn max_keys(mut self, n: u64) -> Self {
        self.max_keys = n;
        self
    }

    /// Caps the sum of entry sizes on disk. [`NO_LIMIT_TOTAL_BYTES`]
    /// disables the cap.
    pub fn max_total_bytes(mut self, n: u64) -> Self {
        self.max_total_bytes = n;
        self
    }

    /// Does not start the periodic TTL sweep at construction.
    pub fn disable_auto_cleanup(mut self) -> Self {
        self.disable_auto_cleanup = true;
        self
    }

    /// Does not scan the cache root at construction.
    pub fn disable_warm_up(mut self) -> Self {
        self.disable_warm_up = true;
        self
    }

    /// On byte overflow, evicts oldest entries in the background until
    /// total bytes drop below 80% of the byte cap. Requires
    /// [`max_total_bytes`](Self::max_total_bytes).
    pub fn auto_adjust(mut self) -> Self {
        self.auto_adjust = true;
        self
    }

    /// Like [`auto_adjust`](Self::auto_adjust) with an explicit target
    /// percentage of the byte cap.
    pub fn auto_adjust_with_percentage(mut self, percentage: u64) -> Self {
        self.auto_adjust = true;
        self.adjust_percentage = percentage;
        self
    }

    /// Loads refresh the entry's TTL.
    pub fn touch_on_hit(mut self) -> Self {
        self.touch_on_hit = true;
        self
    }

    /// Number of key characters per shard directory; non-positive values
    /// disable sharding.
    pub fn cache_dir_len(mut self, n: i32) -> Self {
        self.cache_dir_len = n;
        self
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.auto_adjust && self.max_total_bytes == NO_LIMIT_TOTAL_BYTES {
            return Err(Error::Config(
                "max_total_bytes must be set to enable auto-adjust".into(),
            ));
        }
        if self.adjust_percentage > 100 {
            return Err(Error::Config(
                "adjust percentage must be less than or equal to 100".into(),
            ));
        }
        Ok(())
    }

    pub(super) fn adjust_target(&self) -> u64 {
        self.max_total_bytes * self.adjust_percentage / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_adjust_requires_byte_limit() {
        let err = CacheOptions::new().auto_adjust().validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        CacheOptions::new()
            .max_total_bytes(1024)
            .auto_adjust()
            .validate()
            .unwrap();
    }

    #[test]
    fn adjust_percentage_is_bounded() {
        let err = CacheOptions::new()
            .max_total_bytes(1024)
            .auto_adjust_with_percentage(101)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn adjust_target_defaults_to_80_percent() {
        let options = CacheOptions::new().max_total_bytes(1000).auto_adjust();
        assert_eq!(options.adjust_target(), 800);
        let options = CacheOptions::new()
            .max_total_bytes(1000)
            .auto_adjust_with_percentage(50);
        assert_eq!(options.adjust_target(), 500);
    }
}
