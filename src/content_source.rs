use std::time::Duration;

use async_trait::async_trait;

use crate::error::ContentError;
use crate::models::Post;

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}

/// How long a query result may be reused before it has to be fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    NoStore,
    After(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Whether unpublished content is visible.
    pub draft: bool,
    pub revalidate: Revalidate,
}

impl QueryOptions {
    pub fn new(draft: bool, revalidate: Revalidate) -> Self {
        Self { draft, revalidate }
    }
}

/// Read-only access to the system of record for posts.
///
/// Ordering of `more_posts` is up to the source.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Slugs of every post in the blog collection. Never served from a cache.
    async fn post_slugs(&self) -> Result<Vec<String>, ContentError>;

    async fn post_by_slug(
        &self,
        slug: &str,
        options: QueryOptions,
    ) -> Result<Lookup<Post>, ContentError>;

    async fn more_posts(
        &self,
        exclude_slug: &str,
        limit: usize,
        options: QueryOptions,
    ) -> Result<Vec<Post>, ContentError>;
}

#[cfg(test)]
mod tests {
    use super::Lookup;

    #[test]
    fn lookup_from_option() {
        assert_eq!(Lookup::from(Some(3)), Lookup::Found(3));
        assert_eq!(Lookup::<i32>::from(None), Lookup::NotFound);
    }

    #[test]
    fn lookup_map_keeps_not_found() {
        let missing: Lookup<&str> = Lookup::NotFound;
        assert_eq!(missing.map(str::len), Lookup::NotFound);
        assert_eq!(Lookup::Found("abc").map(str::len).found(), Some(3));
    }
}
