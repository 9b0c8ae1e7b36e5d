//! Dashboard: a submit form plus a gallery of finished sessions.

pub mod page;

use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    catalog::ArtifactCatalog,
    core::orchestrator::{CancelToken, Orchestrator},
    error::Result,
    io::progress::ProgressReporter,
    types::Job,
};

use self::page::{download_name, render, Flash, FlashLevel, PageState};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub catalog: Arc<dyn ArtifactCatalog>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, catalog: Arc<dyn ArtifactCatalog>) -> Self {
        Self {
            orchestrator,
            catalog,
        }
    }
}

/// Gallery toggles. Browsers omit unchecked boxes, so an explicit `view`
/// marker tells "unchecked" apart from "first visit".
#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    view: Option<String>,
    show_mix: Option<String>,
    show_stems: Option<String>,
}

impl ViewParams {
    fn apply(&self, state: &mut PageState) {
        if self.view.is_some() {
            state.show_mix = is_on(self.show_mix.as_deref());
            state.show_stems = is_on(self.show_stems.as_deref());
        }
    }
}

fn is_on(v: Option<&str>) -> bool {
    matches!(v, Some("on" | "true" | "1"))
}

#[derive(Debug, Deserialize)]
pub struct ProcessForm {
    #[serde(default)]
    url: String,
    #[serde(default)]
    name: String,
    view: Option<String>,
    show_mix: Option<String>,
    show_stems: Option<String>,
}

impl ProcessForm {
    fn view_params(&self) -> ViewParams {
        ViewParams {
            view: self.view.clone(),
            show_mix: self.show_mix.clone(),
            show_stems: self.show_stems.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/sessions/:session/:file", get(artifact_inline))
        .route("/sessions/:session/:file/download", get(artifact_download))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("stemdeck dashboard listening on http://{bind}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn page_with_sessions(app: &AppState, mut page: PageState) -> Html<String> {
    match app.catalog.list() {
        Ok(sessions) => page.sessions = sessions,
        Err(e) => {
            error!(error = %e, "catalog scan failed");
            page.flash = Some(Flash::new(
                FlashLevel::Error,
                format!("Could not read sessions: {e}"),
            ));
        }
    }
    Html(render(&page))
}

/// GET /
async fn index(State(app): State<AppState>, Query(params): Query<ViewParams>) -> Html<String> {
    let mut page = PageState::default();
    params.apply(&mut page);
    page_with_sessions(&app, page)
}

/// POST /process
async fn process(State(app): State<AppState>, Form(form): Form<ProcessForm>) -> Html<String> {
    let mut page = PageState {
        url: form.url.clone(),
        name: form.name.clone(),
        ..PageState::default()
    };
    form.view_params().apply(&mut page);

    if form.url.trim().is_empty() {
        page.flash = Some(Flash::new(FlashLevel::Warning, "The URL field is required."));
        return page_with_sessions(&app, page);
    }
    if form.name.trim().is_empty() {
        page.flash = Some(Flash::new(FlashLevel::Warning, "Give the song a name."));
        return page_with_sessions(&app, page);
    }

    let job = Job::new(form.url, form.name);
    let orchestrator = app.orchestrator.clone();
    let report = tokio::task::spawn_blocking(move || {
        orchestrator.run(&job, &CancelToken::new(), &ProgressReporter::silent())
    })
    .await;

    let flash = match report {
        Ok(report) if report.is_done() => {
            page.url.clear();
            page.name.clear();
            let level = if report.warnings.is_empty() {
                FlashLevel::Success
            } else {
                FlashLevel::Warning
            };
            Flash::new(level, report.message())
        }
        Ok(report) => Flash::new(FlashLevel::Error, report.message()),
        Err(e) => {
            error!(error = %e, "pipeline worker crashed");
            Flash::new(FlashLevel::Error, "Internal error while processing.")
        }
    };
    page.flash = Some(flash);
    page_with_sessions(&app, page)
}

/// GET /sessions/:session/:file
async fn artifact_inline(
    State(app): State<AppState>,
    Path((session, file)): Path<(String, String)>,
) -> Response {
    serve_artifact(&app, &session, &file, false).await
}

/// GET /sessions/:session/:file/download
async fn artifact_download(
    State(app): State<AppState>,
    Path((session, file)): Path<(String, String)>,
) -> Response {
    serve_artifact(&app, &session, &file, true).await
}

async fn serve_artifact(app: &AppState, session: &str, file: &str, attachment: bool) -> Response {
    let entry = match app.catalog.get(session) {
        Ok(Some(entry)) => entry,
        Ok(None) => return (StatusCode::NOT_FOUND, "unknown session").into_response(),
        Err(e) => {
            error!(error = %e, session, "session lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    // only fixed artifact names resolve, so `file` cannot escape the session
    let Some(art) = entry.artifact(file) else {
        return (StatusCode::NOT_FOUND, "unknown artifact").into_response();
    };

    let bytes = match tokio::fs::read(&art.path).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, path = %art.path.display(), "artifact read failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(art.format.mime()),
    );
    if attachment {
        let disposition = format!("attachment; filename=\"{}\"", download_name(&entry.name, art));
        match HeaderValue::from_str(&disposition) {
            Ok(v) => {
                headers.insert(header::CONTENT_DISPOSITION, v);
            }
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
    (StatusCode::OK, headers, bytes).into_response()
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "stemdeck".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
