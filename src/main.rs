mod cache;
mod cms;
mod config;
mod content_loader;
mod content_source;
mod draft;
mod error;
mod hot_reload;
mod markdown;
mod models;
mod prerender;
mod renderer;
mod routes;
mod state;
mod view;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::{
    net::TcpListener,
    sync::{broadcast, RwLock},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::CachingSource;
use crate::cms::CmsClient;
use crate::config::{Cli, Command, Settings, Source, DEFAULT_PORT};
use crate::content_loader::{load_templates, LocalContent};
use crate::content_source::ContentSource;
use crate::hot_reload::start_content_watcher;
use crate::renderer::PostPageRenderer;
use crate::state::{AppState, RouterState};

async fn build_source(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn ContentSource>, Option<Arc<LocalContent>>)> {
    match &settings.source {
        Source::Local => {
            let local = Arc::new(
                LocalContent::open(&settings.content_dir)
                    .await
                    .context("failed to load local posts")?,
            );
            let source: Arc<dyn ContentSource> = local.clone();
            Ok((source, Some(local)))
        }
        Source::Cms { endpoint, token } => {
            info!(%endpoint, "using cms content source");
            let cms = CmsClient::new(endpoint.clone(), token.clone());
            let source: Arc<dyn ContentSource> =
                Arc::new(CachingSource::new(cms, settings.cache_capacity));
            Ok((source, None))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::resolve(&cli)?;
    let (source, local_content) = build_source(&settings).await?;
    let renderer = PostPageRenderer::new(source)
        .with_revalidate(settings.revalidate)
        .with_more_posts_limit(settings.more_posts_limit);
    let templates = load_templates(&settings.content_dir)
        .await
        .context("failed to load templates")?;

    let command = cli.command.clone().unwrap_or(Command::Serve {
        port: std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT),
    });

    match command {
        Command::Prerender {
            out_dir,
            concurrency,
        } => {
            let written =
                prerender::prerender(&renderer, &templates.layout, &out_dir, concurrency).await?;
            info!(written, out_dir = %out_dir.display(), "prerender finished");
        }
        Command::Serve { port } => {
            let is_development = std::env::var("RUST_ENV")
                .map(|v| v == "development")
                .unwrap_or(false);
            info!(is_development, "starting server");

            let state = Arc::new(AppState {
                templates: RwLock::new(templates),
                renderer,
                local_content,
                content_dir: settings.content_dir.clone(),
                draft_secret: settings.draft_secret.clone(),
                is_development,
            });

            let (tx, _rx) = broadcast::channel(1);
            if is_development {
                start_content_watcher(tx.clone(), state.clone());
            }

            let app = routes::router(RouterState {
                app_state: state,
                broadcaster: tx,
            });

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            info!(%addr, "listening");
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
