use std::sync::Arc;

use framegrab_core::clock::SystemClock;
use framegrab_core::entitlement::EntitlementResolver;
use framegrab_core::registry::LedgerRegistry;
use framegrab_pipeline::client::ClientFrameSampler;
use framegrab_pipeline::config::SamplerConfig;
use framegrab_pipeline::ffmpeg::FfmpegSampler;
use framegrab_pipeline::media::FfmpegMediaOpener;
use framegrab_pipeline::orchestrator::CaptureOrchestrator;
use framegrab_pipeline::remote::RemoteExtractionPipeline;
use framegrab_pipeline::ytdlp::YtDlpFetcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Capture policy over the remote pipeline and client sampler.
    pub orchestrator: Arc<CaptureOrchestrator>,
    /// One quota ledger per client context.
    pub ledgers: Arc<LedgerRegistry>,
}

impl AppState {
    /// Wire the production collaborators (`yt-dlp`, `ffmpeg`, `ffprobe`).
    pub fn from_config(config: ServerConfig) -> Self {
        let resolver: Arc<dyn EntitlementResolver> = Arc::new(config.credential_resolver());

        let remote = RemoteExtractionPipeline::new(
            Arc::new(YtDlpFetcher::new(config.tools.ytdlp.clone())),
            Arc::new(FfmpegSampler::new(config.tools.ffmpeg.clone())),
            Arc::clone(&resolver),
            config.pipeline_config(),
        );
        let orchestrator = CaptureOrchestrator::new(
            remote,
            ClientFrameSampler::new(SamplerConfig::default()),
            Arc::new(FfmpegMediaOpener::new(
                config.tools.clone(),
                config.tool_timeout(),
            )),
            config.admission_mode,
        );
        let ledgers = LedgerRegistry::new(
            config.license_state_dir.clone(),
            resolver,
            Arc::new(SystemClock),
        );

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            ledgers: Arc::new(ledgers),
        }
    }
}
