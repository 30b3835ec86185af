use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use notify_debouncer_full::{
    new_debouncer,
    notify::{Error as NotifyError, RecursiveMode, Watcher},
    DebouncedEvent,
};
use tracing::{debug, error, info};

use crate::content_loader::load_templates;
use crate::state::{AppState, RefreshBroadcaster};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(tx): State<RefreshBroadcaster>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| wait_for_reload(socket, tx))
}

async fn wait_for_reload(mut socket: WebSocket, tx: RefreshBroadcaster) {
    let mut rx = tx.subscribe();
    if rx.recv().await.is_ok()
        && socket
            .send(Message::Text("reload".to_string().into()))
            .await
            .is_err()
    {
        debug!("client left before the reload message");
    }
}

/// Editor scratch files (Emacs `.#name`, `name~` backups).
fn is_scratch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(".#") || name.ends_with('~'))
}

fn is_relevant(event: &DebouncedEvent) -> bool {
    (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
        && !event.event.paths.iter().any(|p| is_scratch_file(p))
}

/// Reload templates and, for the local source, the posts.
/// Failures keep the previous content.
pub async fn reload_content(app_state: &AppState) {
    match load_templates(&app_state.content_dir).await {
        Ok(templates) => *app_state.templates.write().await = templates,
        Err(e) => error!("failed to reload templates: {}", e),
    }
    if let Some(local) = &app_state.local_content {
        match local.reload().await {
            Ok(count) => info!(count, "local posts reloaded"),
            Err(e) => error!("failed to reload posts: {}", e),
        }
    }
}

pub fn start_content_watcher(tx: RefreshBroadcaster, app_state: Arc<AppState>) {
    info!(dir = %app_state.content_dir.display(), "watching content for hot reload");
    tokio::spawn(async move {
        let (watcher_tx, mut watcher_rx) = tokio::sync::mpsc::channel(1);

        let debouncer = new_debouncer(
            Duration::from_millis(200),
            None,
            move |res: Result<Vec<DebouncedEvent>, Vec<NotifyError>>| match res {
                Ok(events) => {
                    let changed: Vec<_> = events
                        .iter()
                        .filter(|e| is_relevant(e))
                        .flat_map(|e| &e.event.paths)
                        .collect();
                    if changed.is_empty() {
                        return;
                    }
                    debug!(?changed, "content changed");
                    if let Err(e) = watcher_tx.blocking_send(()) {
                        error!("failed to forward watcher event: {}", e);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("watcher error: {}", e);
                    }
                }
            },
        );
        let mut debouncer = match debouncer {
            Ok(debouncer) => debouncer,
            Err(e) => {
                error!("hot reload disabled, cannot create debouncer: {}", e);
                return;
            }
        };
        if let Err(e) = debouncer
            .watcher()
            .watch(&app_state.content_dir, RecursiveMode::Recursive)
        {
            error!("hot reload disabled, cannot watch content: {}", e);
            return;
        }

        while watcher_rx.recv().await.is_some() {
            reload_content(&app_state).await;
            if let Err(e) = tx.send(()) {
                debug!("no browser to notify: {}", e);
            }
        }
    });
}
