//! Tauri front-end: window, webview proxy and page commands
//!
//! Pages are loaded through the `demanda` URI scheme. Each request is
//! forwarded by the host's [`BackendClient`], so the identity header is on
//! the wire before the first page byte arrives. Page scripts only see the
//! commands registered here, each of which maps onto one [`Bridge`]
//! capability.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tauri::http::{Request, Response, StatusCode};
use tauri::webview::PageLoadEvent;
use tauri::{
    AppHandle, Emitter, Manager, RunEvent, State, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder, WindowEvent,
};
use tokio::sync::broadcast;

use crate::backend::BackendClient;
use crate::bridge::{self, Bridge, Link};
use crate::config::ShellConfig;
use crate::host::{HostController, HostHandle};
use crate::identity::OsAccount;
use crate::navigation::{NavigationRequest, NavigationTarget, Navigator};
use crate::proxy::{self, ProxyRoute};
use crate::save::{FileFilter, FileSaveRelay, SaveDialog, SaveOutcome, SaveRequest};

const MAIN_WINDOW: &str = "main";

/// Privileged state the shell needs after setup. Never handed to the page.
struct ShellState {
    config: ShellConfig,
    route: ProxyRoute,
    client: Arc<BackendClient>,
    host: HostHandle,
}

/// Navigates the main webview through the proxy scheme
struct WebviewNavigator {
    window: WebviewWindow,
    route: ProxyRoute,
}

impl Navigator for WebviewNavigator {
    fn navigate(&self, request: &NavigationRequest) -> Result<(), String> {
        // Webview loads cannot carry extra headers. The scheme handler adds
        // the same header from the same injector when it forwards the load.
        let url = self
            .route
            .shell_url(&request.url)
            .ok_or_else(|| format!("{} is outside the backend", request.url))?;
        self.window.navigate(url).map_err(|e| e.to_string())
    }
}

/// Native save dialog
struct NativeSaveDialog;

#[async_trait]
impl SaveDialog for NativeSaveDialog {
    async fn pick_save_path(&self, default_path: &Path, filter: &FileFilter) -> Option<PathBuf> {
        let mut dialog = rfd::AsyncFileDialog::new()
            .add_filter(filter.name.as_str(), filter.extensions.as_slice());
        if let Some(dir) = default_path.parent() {
            dialog = dialog.set_directory(dir);
        }
        if let Some(name) = default_path.file_name().and_then(|n| n.to_str()) {
            dialog = dialog.set_file_name(name);
        }

        dialog
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .register_asynchronous_uri_scheme_protocol(proxy::SCHEME, |ctx, request, responder| {
            let app = ctx.app_handle().clone();
            tauri::async_runtime::spawn(async move {
                let response = match app.try_state::<ShellState>() {
                    Some(state) => {
                        let client = state.client.clone();
                        let route = state.route.clone();
                        forward(&client, &route, request).await
                    }
                    None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Shell not ready"),
                };
                responder.respond(response);
            });
        })
        .invoke_handler(tauri::generate_handler![
            get_user,
            set_user,
            navigate,
            create_demand,
            list_demands,
            fetch_profile,
            save_file,
        ])
        .setup(|app| {
            setup(app.handle())?;
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(handle_run_event);
}

/// Resolve identity, start the host controller and open the main window.
///
/// Fails (and aborts startup) when the OS account cannot be resolved.
fn setup(app: &AppHandle) -> anyhow::Result<()> {
    let config = ShellConfig::from_env()?;
    log::info!("Backend: {}", config.backend.base_url);

    let Link {
        bridge,
        dispatcher,
        requests,
        replies,
        host_requests,
    } = bridge::link();

    let host = HostController::new(
        OsAccount,
        config.backend.clone(),
        FileSaveRelay::new(NativeSaveDialog),
        replies,
    )
    .map_err(|e| {
        log::error!("Cannot start without an OS identity: {}", e);
        e
    })?;
    log::info!("OS account detected: {}", host.identity());

    let route = ProxyRoute::new(&config.backend)?;
    let client = host.backend();

    tauri::async_runtime::spawn(dispatcher.run());
    tauri::async_runtime::spawn(host.run(requests));

    relay_events(app.clone(), "file-saved", bridge.on_file_saved());
    relay_events(app.clone(), "save-cancelled", bridge.on_save_cancelled());
    relay_events(app.clone(), "save-error", bridge.on_save_error());

    app.manage(bridge);
    app.manage(ShellState {
        config,
        route,
        client,
        host: HostHandle::new(host_requests),
    });

    open_window(app)
}

/// Create the main window on the create-demand page. Each window is a new
/// page session.
fn open_window(app: &AppHandle) -> anyhow::Result<()> {
    let state = app.state::<ShellState>();
    app.state::<Bridge>().begin_session();

    let start = NavigationTarget::Create.url(&state.config.backend);
    let url = state
        .route
        .shell_url(&start)
        .ok_or_else(|| anyhow::anyhow!("Cannot map {} to the shell scheme", start))?;

    let loads = state.host.clone();
    let window = WebviewWindowBuilder::new(app, MAIN_WINDOW, WebviewUrl::CustomProtocol(url))
        .title(state.config.window.title.as_str())
        .inner_size(state.config.window.width, state.config.window.height)
        .theme(Some(tauri::Theme::Dark))
        .initialization_script(&bridge::page_script())
        .on_page_load(move |_window, payload| {
            if matches!(payload.event(), PageLoadEvent::Finished) {
                log::debug!("Page loaded: {}", payload.url());
                loads.page_loaded();
            }
        })
        .build()?;

    let closes = state.host.clone();
    window.on_window_event(move |event| {
        if matches!(event, WindowEvent::Destroyed) {
            closes.window_closed();
        }
    });

    state.host.window_opened(Box::new(WebviewNavigator {
        window,
        route: state.route.clone(),
    }));
    Ok(())
}

#[cfg_attr(not(target_os = "macos"), allow(unused_variables))]
fn handle_run_event(app: &AppHandle, event: RunEvent) {
    match event {
        // macOS keeps the app alive with no windows; the dock icon reopens it
        #[cfg(target_os = "macos")]
        RunEvent::ExitRequested { api, code: None, .. } => api.prevent_exit(),
        #[cfg(target_os = "macos")]
        RunEvent::Reopen { has_visible_windows: false, .. } => {
            if app.get_webview_window(MAIN_WINDOW).is_none() {
                log::info!("Reopening main window");
                if let Err(e) = open_window(app) {
                    log::error!("Failed to reopen window: {}", e);
                }
            }
        }
        RunEvent::Exit => log::info!("Shell exiting"),
        _ => {}
    }
}

/// Forward one webview request to the backend
async fn forward(
    client: &BackendClient,
    route: &ProxyRoute,
    request: Request<Vec<u8>>,
) -> Response<Vec<u8>> {
    let (parts, body) = request.into_parts();
    let uri = parts.uri.to_string();

    let Some(outgoing) = route.forward_request(parts.method, &uri, parts.headers, body) else {
        return error_response(StatusCode::BAD_REQUEST, &format!("Cannot map {}", uri));
    };

    match client.forward(outgoing).await {
        Ok(answer) => {
            let answer = route.rewrite_response(answer);
            let mut response = Response::new(answer.body);
            *response.status_mut() = answer.status;
            *response.headers_mut() = answer.headers;
            response
        }
        Err(e) => {
            log::error!("Proxy error for {}: {}", uri, e);
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Vec<u8>> {
    let mut response = Response::new(message.as_bytes().to_vec());
    *response.status_mut() = status;
    response
}

/// Re-emit a bridge subscription as a Tauri event
fn relay_events<T>(app: AppHandle, event: &'static str, mut rx: broadcast::Receiver<T>)
where
    T: Clone + Serialize + Send + 'static,
{
    tauri::async_runtime::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(payload) => {
                    if let Err(e) = app.emit(event, payload) {
                        log::error!("Failed to emit {}: {}", event, e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("{} subscriber lagged, {} event(s) skipped", event, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

// ---------- Page commands ----------

#[tauri::command]
fn get_user(bridge: State<'_, Bridge>) -> Option<String> {
    bridge.get_user()
}

#[tauri::command]
async fn set_user(bridge: State<'_, Bridge>) -> Result<String, String> {
    bridge.set_user().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn navigate(bridge: State<'_, Bridge>, target: String) -> Result<(), String> {
    let target: NavigationTarget = target.parse().map_err(|e| format!("{}", e))?;
    let result = match target {
        NavigationTarget::Profile => bridge.go_to_profile().await,
        NavigationTarget::Create => bridge.go_to_create().await,
        NavigationTarget::List => bridge.go_to_list().await,
    };
    result.map_err(|e| e.to_string())
}

#[tauri::command]
async fn create_demand(bridge: State<'_, Bridge>, payload: Value) -> Result<Value, String> {
    bridge.create_demand(payload).await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn list_demands(bridge: State<'_, Bridge>) -> Result<Value, String> {
    bridge.list_demands().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn fetch_profile(bridge: State<'_, Bridge>) -> Result<Value, String> {
    bridge.fetch_profile().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn save_file(bridge: State<'_, Bridge>, request: SaveRequest) -> Result<SaveOutcome, String> {
    bridge.save_file(request).await.map_err(|e| e.to_string())
}
