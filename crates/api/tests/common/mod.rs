//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use framegrab_core::clock::SystemClock;
use framegrab_core::entitlement::EntitlementResolver;
use framegrab_core::registry::LedgerRegistry;
use framegrab_pipeline::client::ClientFrameSampler;
use framegrab_pipeline::config::{PipelineConfig, SamplerConfig, ToolPaths};
use framegrab_pipeline::error::ToolError;
use framegrab_pipeline::media::FfmpegMediaOpener;
use framegrab_pipeline::orchestrator::CaptureOrchestrator;
use framegrab_pipeline::remote::RemoteExtractionPipeline;
use framegrab_pipeline::tools::{Fetcher, SampleRequest, Sampler};
use http_body_util::BodyExt;
use tower::ServiceExt;

use framegrab_api::config::ServerConfig;
use framegrab_api::router::build_app_router;
use framegrab_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout, and in-memory ledgers.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        tool_timeout_secs: 5,
        ..ServerConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Fake tools
// ---------------------------------------------------------------------------

/// What the fake tools do for every request.
#[derive(Debug, Clone, Copy)]
pub enum Tools {
    /// Fetch succeeds and the sampler writes this many frames.
    Frames(usize),
    /// The fetcher exits non-zero.
    FetchFails,
}

#[derive(Default)]
pub struct ToolLog {
    pub locators: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<SampleRequest>>,
}

impl ToolLog {
    pub fn locators(&self) -> Vec<String> {
        self.locators.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<SampleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct FakeFetcher {
    tools: Tools,
    log: Arc<ToolLog>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn name(&self) -> &str {
        "fake-fetcher"
    }

    async fn fetch(&self, locator: &str, output: &Path, _timeout: Duration) -> Result<(), ToolError> {
        self.log.locators.lock().unwrap().push(locator.to_string());
        match self.tools {
            Tools::Frames(_) => {
                tokio::fs::write(output, b"video").await?;
                Ok(())
            }
            Tools::FetchFails => Err(ToolError::ExecutionFailed {
                tool: "fake-fetcher".into(),
                exit_code: Some(1),
                stderr: "ERROR: Video unavailable".into(),
            }),
        }
    }
}

struct FakeSampler {
    tools: Tools,
    log: Arc<ToolLog>,
}

#[async_trait]
impl Sampler for FakeSampler {
    fn name(&self) -> &str {
        "fake-sampler"
    }

    async fn sample(
        &self,
        _input: &Path,
        request: &SampleRequest,
        _timeout: Duration,
    ) -> Result<(), ToolError> {
        self.log.requests.lock().unwrap().push(request.clone());
        let count = match self.tools {
            Tools::Frames(n) => n,
            Tools::FetchFails => 0,
        };
        let dir = request
            .output_pattern
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        for i in 1..=count {
            tokio::fs::write(dir.join(format!("frame-{i:05}.png")), [0x89, b'P', b'N', b'G', i as u8])
                .await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

/// Build the application router over fake tools with the default test config.
pub fn build_test_app(tools: Tools) -> (Router, Arc<ToolLog>) {
    build_test_app_with(test_config(), tools)
}

/// Build the full application router, including all middleware layers,
/// with `config` and fake fetch/sample tools.
///
/// Uses the same [`build_app_router`] as `main.rs`, so integration tests
/// exercise the production middleware stack.
pub fn build_test_app_with(config: ServerConfig, tools: Tools) -> (Router, Arc<ToolLog>) {
    let log = Arc::new(ToolLog::default());
    let resolver: Arc<dyn EntitlementResolver> = Arc::new(config.credential_resolver());

    let remote = RemoteExtractionPipeline::new(
        Arc::new(FakeFetcher {
            tools,
            log: Arc::clone(&log),
        }),
        Arc::new(FakeSampler {
            tools,
            log: Arc::clone(&log),
        }),
        Arc::clone(&resolver),
        PipelineConfig {
            tool_timeout: config.tool_timeout(),
            kill_grace: Duration::ZERO,
            scratch_root: config.scratch_root.clone(),
        },
    );
    let orchestrator = CaptureOrchestrator::new(
        remote,
        ClientFrameSampler::new(SamplerConfig {
            inter_sample_delay: Duration::ZERO,
        }),
        Arc::new(FfmpegMediaOpener::new(
            ToolPaths::default(),
            config.tool_timeout(),
        )),
        config.admission_mode,
    );
    let ledgers = LedgerRegistry::new(
        config.license_state_dir.clone(),
        resolver,
        Arc::new(SystemClock),
    );

    let state = AppState {
        config: Arc::new(config),
        orchestrator: Arc::new(orchestrator),
        ledgers: Arc::new(ledgers),
    };
    (build_app_router(state), log)
}

/// A scratch root that tests can inspect for leftovers.
pub fn scratch_config(root: &Path) -> ServerConfig {
    ServerConfig {
        scratch_root: Some(PathBuf::from(root)),
        ..test_config()
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_as(app: Router, uri: &str, client_id: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("x-client-id", client_id)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, None, body.to_string()).await
}

pub async fn post_json_as(
    app: Router,
    uri: &str,
    client_id: &str,
    body: serde_json::Value,
) -> Response<Body> {
    post_raw(app, uri, Some(client_id), body.to_string()).await
}

pub async fn post_raw(
    app: Router,
    uri: &str,
    client_id: Option<&str>,
    body: String,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = client_id {
        builder = builder.header("x-client-id", id);
    }
    let request = builder.body(Body::from(body)).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
