use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error surface of the cache.
///
/// `NotFound` and `Expired` are expected lookup outcomes rather than
/// failures; callers typically treat them as a cache miss and fall through
/// to the upstream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key is not present in the index.
    #[error("cache entry not found")]
    NotFound,

    /// The key is still indexed but its TTL has elapsed.
    #[error("cache entry expired")]
    Expired,

    /// Admitting the write would reach the configured byte limit.
    #[error("cache full ({current} bytes >= {limit} bytes)")]
    Full { current: u64, limit: u64 },

    /// No request was supplied when deriving a cache key seed.
    #[error("no request")]
    NoRequest,

    /// The request is missing the parts a cache key seed is built from.
    #[error("invalid request")]
    InvalidRequest,

    /// The byte stream is not a well-formed HTTP/1.1 message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The cache root failed the write-access probe at construction.
    #[error("cache root {} is not writable", path.display())]
    RootNotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The option set handed to the constructor is inconsistent.
    #[error("invalid cache configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
