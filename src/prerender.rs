//! Build-time static generation of every known post page.

use std::path::Path;

use anyhow::{Context, Result};
use futures::{stream, StreamExt, TryStreamExt};
use tokio::fs;
use tracing::{info, warn};

use crate::content_source::Lookup;
use crate::models::is_path_segment;
use crate::renderer::PostPageRenderer;
use crate::routes::render_post_document;

/// Write `<out_dir>/posts/<slug>/index.html` for every known slug and
/// return how many pages were written. Failing to list slugs or to render
/// any page aborts the run.
pub async fn prerender(
    renderer: &PostPageRenderer,
    layout: &str,
    out_dir: &Path,
    concurrency: usize,
) -> Result<usize> {
    let slugs = renderer
        .list_known_slugs()
        .await
        .context("failed to list post slugs")?;
    info!(count = slugs.len(), out_dir = %out_dir.display(), "prerendering posts");

    stream::iter(slugs)
        .map(|slug| prerender_one(renderer, layout, out_dir, slug))
        .buffer_unordered(concurrency.max(1))
        .try_fold(0, |written, wrote| async move {
            Ok::<_, anyhow::Error>(written + usize::from(wrote))
        })
        .await
}

async fn prerender_one(
    renderer: &PostPageRenderer,
    layout: &str,
    out_dir: &Path,
    slug: String,
) -> Result<bool> {
    if !is_path_segment(&slug) {
        warn!(%slug, "skipping slug that is not a single path segment");
        return Ok(false);
    }

    let html = match render_post_document(renderer, layout, &slug, false, false)
        .await
        .with_context(|| format!("failed to render post {slug}"))?
    {
        Lookup::Found(html) => html,
        Lookup::NotFound => {
            warn!(%slug, "post disappeared before it could be rendered");
            return Ok(false);
        }
    };

    let dir = out_dir.join("posts").join(&slug);
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let file = dir.join("index.html");
    fs::write(&file, html)
        .await
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::content_loader::LocalContent;
    use crate::content_source::{ContentSource, QueryOptions};
    use crate::error::ContentError;
    use crate::models::Post;

    const LAYOUT: &str = "<html><head><title>{{ title }}</title></head><body>{{ content }}</body></html>";

    fn post(slug: &str, title: &str) -> Post {
        Post {
            slug: slug.into(),
            title: title.into(),
            excerpt: String::new(),
            date: None,
            author: None,
            cover_image: None,
            body: String::new(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("headless-blog-{name}-{}", std::process::id()))
    }

    /// Lists a slug it cannot deliver, plus one that would escape the output dir.
    struct StaleListing(LocalContent);

    #[async_trait]
    impl ContentSource for StaleListing {
        async fn post_slugs(&self) -> Result<Vec<String>, ContentError> {
            let mut slugs = self.0.post_slugs().await?;
            slugs.push("deleted-meanwhile".into());
            slugs.push("../escape".into());
            Ok(slugs)
        }

        async fn post_by_slug(
            &self,
            slug: &str,
            options: QueryOptions,
        ) -> Result<Lookup<Post>, ContentError> {
            self.0.post_by_slug(slug, options).await
        }

        async fn more_posts(
            &self,
            exclude_slug: &str,
            limit: usize,
            options: QueryOptions,
        ) -> Result<Vec<Post>, ContentError> {
            self.0.more_posts(exclude_slug, limit, options).await
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ContentSource for Unreachable {
        async fn post_slugs(&self) -> Result<Vec<String>, ContentError> {
            Err(ContentError::Query(vec!["connection refused".into()]))
        }

        async fn post_by_slug(
            &self,
            _slug: &str,
            _options: QueryOptions,
        ) -> Result<Lookup<Post>, ContentError> {
            Ok(Lookup::NotFound)
        }

        async fn more_posts(
            &self,
            _exclude_slug: &str,
            _limit: usize,
            _options: QueryOptions,
        ) -> Result<Vec<Post>, ContentError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn writes_one_page_per_known_slug() {
        let out_dir = scratch_dir("prerender");
        let source = StaleListing(LocalContent::from_posts(vec![
            post("hello-world", "Hello World"),
            post("second-post", "Second Post"),
        ]));
        let renderer = PostPageRenderer::new(Arc::new(source));

        let written = prerender(&renderer, LAYOUT, &out_dir, 2).await.unwrap();
        assert_eq!(written, 2);

        let page = std::fs::read_to_string(out_dir.join("posts/hello-world/index.html")).unwrap();
        assert!(page.contains("<title>Post / Hello World</title>"));
        assert!(page.contains("Second Post"));
        assert!(out_dir.join("posts/second-post/index.html").exists());
        assert!(!out_dir.join("posts/deleted-meanwhile").exists());

        std::fs::remove_dir_all(&out_dir).unwrap();
    }

    #[tokio::test]
    async fn unreachable_source_fails_the_build() {
        let out_dir = scratch_dir("prerender-down");
        let renderer = PostPageRenderer::new(Arc::new(Unreachable));
        let err = prerender(&renderer, LAYOUT, &out_dir, 4).await.unwrap_err();
        assert!(err.to_string().contains("failed to list post slugs"));
        assert!(!out_dir.exists());
    }
}
