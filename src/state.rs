use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::content_loader::LocalContent;
use crate::renderer::PostPageRenderer;

pub type RefreshBroadcaster = broadcast::Sender<()>;

/// HTML shells loaded from the content directory.
#[derive(Debug, Clone)]
pub struct Templates {
    /// `{{ title }}`, `{{ description }}` and `{{ content }}` placeholders.
    pub layout: String,
    pub not_found: String, // supports {{slug}} placeholder
    pub error: String,
}

pub struct AppState {
    pub templates: RwLock<Templates>,
    pub renderer: PostPageRenderer,
    /// Set when posts come from the content directory, so hot reload can refresh them.
    pub local_content: Option<Arc<LocalContent>>,
    pub content_dir: PathBuf,
    pub draft_secret: Option<String>,
    pub is_development: bool,
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
