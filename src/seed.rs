//! Cache key material and the cache-result response header.

use http::header::{HeaderName, HeaderValue, HOST};
use http::{Request, Response};

use crate::error::{Error, Result};

/// Response header reporting whether the cache served the response.
pub const CACHE_RESULT_HEADER: &str = "x-cache";
pub const CACHE_HIT: &str = "HIT";
pub const CACHE_MISS: &str = "MISS";

const SEED_SEP: char = '|';

/// Returns seed material for a cache key:
/// `method|host|path|rawquery[|header:value]*`, lowercased.
///
/// `host` is taken from the Host header, falling back to the URI
/// authority when the header is absent (RFC 9110 §7.2: the Host header is
/// the request's authority of record). `vary` names headers whose values
/// participate in the key, in order; headers missing from the request are
/// skipped.
///
/// The seed is NOT path-safe. Hash it (see [`entry_key`]) before using it
/// as a cache key.
pub fn seed<T>(req: Option<&Request<T>>, vary: &[&str]) -> Result<String> {
    let req = req.ok_or(Error::NoRequest)?;
    let host = match req.headers().get(HOST).and_then(|value| value.to_str().ok()) {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => req
            .uri()
            .host()
            .map(str::to_string)
            .ok_or(Error::InvalidRequest)?,
    };

    let mut seed = format!(
        "{}{SEED_SEP}{}{SEED_SEP}{}{SEED_SEP}{}",
        req.method(),
        host,
        req.uri().path(),
        req.uri().query().unwrap_or("")
    );
    for name in vary {
        if let Some(value) = req.headers().get(*name).and_then(|value| value.to_str().ok())
            && !value.is_empty()
        {
            seed.push(SEED_SEP);
            seed.push_str(name);
            seed.push(':');
            seed.push_str(value);
        }
    }
    Ok(seed.to_lowercase())
}

/// Derives a path-safe cache key from seed material: the blake3 digest in
/// lowercase hex.
pub fn entry_key(seed: &str) -> String {
    blake3::hash(seed.as_bytes()).to_hex().to_string()
}

/// Sets the `x-cache` header to `HIT` or `MISS`.
pub fn set_cache_result_header<T>(res: &mut Response<T>, hit: bool) {
    let value = if hit { CACHE_HIT } else { CACHE_MISS };
    res.headers_mut().insert(
        HeaderName::from_static(CACHE_RESULT_HEADER),
        HeaderValue::from_static(value),
    );
}
