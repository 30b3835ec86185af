use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::content_source::{ContentSource, Lookup, QueryOptions, Revalidate};
use crate::error::ContentError;
use crate::models::{PageMetadata, PostPage};

pub const DEFAULT_REVALIDATE: Duration = Duration::from_secs(60);
pub const DEFAULT_MORE_POSTS_LIMIT: usize = 2;

/// Produces everything the post route needs: the slugs to prerender, head
/// metadata and the page itself.
#[derive(Clone)]
pub struct PostPageRenderer {
    source: Arc<dyn ContentSource>,
    revalidate: Duration,
    more_posts_limit: usize,
}

impl PostPageRenderer {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            revalidate: DEFAULT_REVALIDATE,
            more_posts_limit: DEFAULT_MORE_POSTS_LIMIT,
        }
    }

    pub fn with_revalidate(mut self, revalidate: Duration) -> Self {
        self.revalidate = revalidate;
        self
    }

    pub fn with_more_posts_limit(mut self, limit: usize) -> Self {
        self.more_posts_limit = limit;
        self
    }

    fn options(&self, draft: bool) -> QueryOptions {
        QueryOptions::new(draft, Revalidate::After(self.revalidate))
    }

    /// Every post slug, fetched uncached. Duplicates are dropped, first one wins.
    pub async fn list_known_slugs(&self) -> Result<Vec<String>, ContentError> {
        let slugs = self.source.post_slugs().await?;
        let mut seen = HashSet::with_capacity(slugs.len());
        Ok(slugs
            .into_iter()
            .filter(|slug| seen.insert(slug.clone()))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn resolve_metadata(
        &self,
        slug: &str,
        draft: bool,
    ) -> Result<Lookup<PageMetadata>, ContentError> {
        if slug.is_empty() {
            return Ok(Lookup::NotFound);
        }
        let post = self.source.post_by_slug(slug, self.options(draft)).await?;
        debug!(found = post.is_found(), "resolved metadata");
        Ok(post.map(|post| PageMetadata::for_post(&post)))
    }

    #[instrument(skip(self))]
    pub async fn render_page(
        &self,
        slug: &str,
        draft: bool,
    ) -> Result<Lookup<PostPage>, ContentError> {
        if slug.is_empty() {
            return Ok(Lookup::NotFound);
        }
        let options = self.options(draft);
        let post = match self.source.post_by_slug(slug, options).await? {
            Lookup::Found(post) => post,
            Lookup::NotFound => {
                debug!("no post for slug");
                return Ok(Lookup::NotFound);
            }
        };

        let mut more_posts = self
            .source
            .more_posts(slug, self.more_posts_limit, options)
            .await?;
        more_posts.retain(|other| other.slug != slug);
        more_posts.truncate(self.more_posts_limit);

        Ok(Lookup::Found(PostPage { post, more_posts }))
    }
}
