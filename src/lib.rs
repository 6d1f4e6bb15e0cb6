//! Disk-backed HTTP request/response cache.
//!
//! `httpstash` is the storage layer of a caching reverse proxy: given a
//! cache key and a captured request/response pair, it persists the pair
//! as two HTTP/1.1 wire-format files in a sharded directory tree, tracks
//! it in an in-memory index with TTL and capacity limits, and returns it
//! on later lookups, under concurrent access.
//!
//! The cache does not decide cacheability; callers derive a key (see
//! [`seed`] and [`entry_key`]) and choose what to store.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use httpstash::{CacheOptions, DiskCache};
//!
//! # async fn example() -> httpstash::Result<()> {
//! let cache = DiskCache::new(
//!     "/var/cache/httpstash",
//!     Some(Duration::from_secs(300)),
//!     CacheOptions::new().max_total_bytes(512 * 1024 * 1024).auto_adjust(),
//! )
//! .await?;
//!
//! let req = Request::builder()
//!     .uri("http://example.com/")
//!     .header("host", "example.com")
//!     .body(Bytes::new())
//!     .unwrap();
//! let res = Response::builder().body(Bytes::from("hello")).unwrap();
//!
//! let key = httpstash::entry_key(&httpstash::seed(Some(&req), &[])?);
//! cache.store(&key, &req, &res).await?;
//! let (_req, _res) = cache.load(&key).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod error;
pub mod path;
pub mod seed;

pub use cache::{CacheOptions, DiskCache, Metrics, NO_LIMIT_KEYS, NO_LIMIT_TOTAL_BYTES};
pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use error::{Error, Result};
pub use path::{DEFAULT_CACHE_DIR_LEN, key_to_path, path_to_key};
pub use seed::{
    CACHE_HIT, CACHE_MISS, CACHE_RESULT_HEADER, entry_key, seed, set_cache_result_header,
};
