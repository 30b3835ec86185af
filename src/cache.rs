//! Time-based revalidation for content-source queries.
//!
//! An entry younger than the caller's TTL is served as-is; an older one is
//! refetched. Failed fetches are never stored, and the number of stored
//! answers is bounded.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use tracing::debug;

use crate::content_source::{ContentSource, Lookup, QueryOptions, Revalidate};
use crate::error::ContentError;
use crate::models::Post;

pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

#[derive(Clone)]
struct Stamped<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct StoredTtl;

impl<V> Expiry<String, Stamped<V>> for StoredTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stamped<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct RevalidatingCache<V> {
    entries: Cache<String, Stamped<V>>,
}

impl<V> RevalidatingCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(StoredTtl)
                .build(),
        }
    }

    /// Concurrent misses on one key share a single fetch.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: String,
        ttl: Duration,
        fetch: F,
    ) -> Result<V, ContentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ContentError>>,
    {
        if let Some(hit) = self.entries.get(&key).await {
            debug!(%key, "cache hit");
            return Ok(hit.value);
        }

        debug!(%key, "cache miss");
        let stamped = self
            .entries
            .try_get_with(key, async move {
                fetch().await.map(|value| Stamped { value, ttl })
            })
            .await
            .map_err(unshare)?;
        Ok(stamped.value)
    }
}

/// Waiters on a shared fetch all receive the same error.
fn unshare(err: Arc<ContentError>) -> ContentError {
    Arc::try_unwrap(err).unwrap_or_else(ContentError::Shared)
}

/// Wraps a content source and honours each query's [`Revalidate`] hint.
///
/// Slug listings and draft queries always go to the inner source.
pub struct CachingSource<S> {
    inner: S,
    posts: RevalidatingCache<Lookup<Post>>,
    more_posts: RevalidatingCache<Vec<Post>>,
}

impl<S> CachingSource<S> {
    /// `capacity` bounds each query shape separately.
    pub fn new(inner: S, capacity: u64) -> Self {
        Self {
            inner,
            posts: RevalidatingCache::new(capacity),
            more_posts: RevalidatingCache::new(capacity),
        }
    }
}

fn cache_ttl(options: QueryOptions) -> Option<Duration> {
    match options.revalidate {
        Revalidate::After(ttl) if !options.draft => Some(ttl),
        _ => None,
    }
}

#[async_trait]
impl<S: ContentSource> ContentSource for CachingSource<S> {
    async fn post_slugs(&self) -> Result<Vec<String>, ContentError> {
        self.inner.post_slugs().await
    }

    async fn post_by_slug(
        &self,
        slug: &str,
        options: QueryOptions,
    ) -> Result<Lookup<Post>, ContentError> {
        match cache_ttl(options) {
            Some(ttl) => {
                self.posts
                    .get_or_fetch(format!("post:{slug}"), ttl, || {
                        self.inner.post_by_slug(slug, options)
                    })
                    .await
            }
            None => self.inner.post_by_slug(slug, options).await,
        }
    }

    async fn more_posts(
        &self,
        exclude_slug: &str,
        limit: usize,
        options: QueryOptions,
    ) -> Result<Vec<Post>, ContentError> {
        match cache_ttl(options) {
            Some(ttl) => {
                self.more_posts
                    .get_or_fetch(format!("more:{exclude_slug}:{limit}"), ttl, || {
                        self.inner.more_posts(exclude_slug, limit, options)
                    })
                    .await
            }
            None => self.inner.more_posts(exclude_slug, limit, options).await,
        }
    }
}
