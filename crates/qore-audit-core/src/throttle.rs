// SPDX-License-Identifier: Apache-2.0

//! Notification throttling.
//!
//! A field combination notifies once; later occurrences are suppressed until
//! the set is cleared. Sets hold truncated digests, so two unrelated
//! combinations may share a key.

use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Length of the digest suffix kept as throttle key
pub const DIGEST_LEN: usize = 12;

/// Order-independent digest of a field combination
pub fn fields_digest<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let owned: Vec<S> = fields.into_iter().collect();
    let mut sorted: Vec<&str> = owned.iter().map(|field| field.as_ref()).collect();
    sorted.sort_unstable();

    let hash = Sha256::digest(sorted.join(",").as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(hash);
    encoded[encoded.len() - DIGEST_LEN..].to_string()
}

/// Set of digests that have already produced a notification
#[derive(Debug, Default)]
pub struct ThrottleSet {
    seen: Mutex<HashSet<String>>,
}

impl ThrottleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `digest` and returns true if it was not present.
    ///
    /// Check and insert happen under one lock, so concurrent callers with
    /// the same digest see exactly one `true`.
    pub fn first_sighting(&self, digest: String) -> bool {
        self.seen.lock().insert(digest)
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.seen.lock().contains(digest)
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
