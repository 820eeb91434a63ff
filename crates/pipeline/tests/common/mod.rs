//! Shared fakes for pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use framegrab_core::entitlement::{EntitlementLimits, PrefixCredentialResolver, TierLimits};
use framegrab_core::source::CaptureSource;
use framegrab_pipeline::client::{ClientFrameSampler, MediaHandle};
use framegrab_pipeline::config::{PipelineConfig, SamplerConfig};
use framegrab_pipeline::error::{MediaError, ToolError};
use framegrab_pipeline::media::MediaOpener;
use framegrab_pipeline::orchestrator::{AdmissionMode, CaptureOrchestrator};
use framegrab_pipeline::remote::RemoteExtractionPipeline;
use framegrab_pipeline::tools::{Fetcher, SampleRequest, Sampler};
use image::RgbaImage;

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum FetchBehavior {
    Succeed,
    ExitCode(i32),
    /// Returns a timeout error after the tool budget, like a killed tool.
    TimesOut,
    /// Never returns; only the pipeline's own deadline stops it.
    Hangs,
    EmptyFile,
    NoFile,
}

pub struct FakeFetcher {
    behavior: FetchBehavior,
    pub calls: AtomicUsize,
    pub output_dir: Mutex<Option<PathBuf>>,
}

impl FakeFetcher {
    pub fn new(behavior: FetchBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            output_dir: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The scratch area the last fetch wrote into.
    pub fn scratch_dir(&self) -> PathBuf {
        self.output_dir
            .lock()
            .unwrap()
            .clone()
            .expect("fetch was called")
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn name(&self) -> &str {
        "fake-fetcher"
    }

    async fn fetch(&self, _locator: &str, output: &Path, timeout: Duration) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.output_dir.lock().unwrap() = output.parent().map(Path::to_path_buf);

        match self.behavior {
            FetchBehavior::Succeed => {
                tokio::fs::write(output, b"not really an mp4").await?;
                Ok(())
            }
            FetchBehavior::ExitCode(code) => Err(ToolError::ExecutionFailed {
                tool: "fake-fetcher".into(),
                exit_code: Some(code),
                stderr: "ERROR: Unsupported URL".into(),
            }),
            FetchBehavior::TimesOut => {
                tokio::time::sleep(timeout).await;
                Err(ToolError::Timeout {
                    tool: "fake-fetcher".into(),
                    elapsed_ms: timeout.as_millis() as u64,
                })
            }
            FetchBehavior::Hangs => {
                std::future::pending::<()>().await;
                Ok(())
            }
            FetchBehavior::EmptyFile => {
                tokio::fs::write(output, b"").await?;
                Ok(())
            }
            FetchBehavior::NoFile => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum SampleBehavior {
    /// Write this many numbered frames.
    Frames(usize),
    ExitCode(i32),
    Hangs,
}

pub struct FakeSampler {
    behavior: SampleBehavior,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<SampleRequest>>,
}

impl FakeSampler {
    pub fn new(behavior: SampleBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Contents written to the `n`-th (1-based) fake frame.
pub fn frame_bytes(n: usize) -> Vec<u8> {
    format!("png-{n}").into_bytes()
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match self.behavior {
            SampleBehavior::Frames(count) => {
                let count = request.max_frames.map_or(count, |max| count.min(max));
                let dir = request.output_pattern.parent().expect("pattern has a dir");
                // Written in reverse so directory order is not chronological.
                for n in (1..=count).rev() {
                    tokio::fs::write(dir.join(format!("frame-{n:05}.png")), frame_bytes(n)).await?;
                }
                tokio::fs::write(dir.join("ffmpeg2pass.log"), b"noise").await?;
                Ok(())
            }
            SampleBehavior::ExitCode(code) => Err(ToolError::ExecutionFailed {
                tool: "fake-sampler".into(),
                exit_code: Some(code),
                stderr: "Invalid data found when processing input".into(),
            }),
            SampleBehavior::Hangs => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// In-memory media: every timestamp rasterizes unless listed in `blank_at`.
pub struct FakeMedia {
    pub dimensions: (u32, u32),
    pub duration: Option<f64>,
    pub blank_at: Vec<f64>,
    pub seeks: Arc<Mutex<Vec<f64>>>,
    position: f64,
}

impl FakeMedia {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            dimensions: (16, 9),
            duration,
            blank_at: Vec::new(),
            seeks: Arc::new(Mutex::new(Vec::new())),
            position: 0.0,
        }
    }
}

#[async_trait]
impl MediaHandle for FakeMedia {
    fn native_dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    async fn seek(&mut self, timestamp: f64) -> Result<(), MediaError> {
        tokio::task::yield_now().await;
        self.seeks.lock().unwrap().push(timestamp);
        self.position = timestamp;
        Ok(())
    }

    async fn rasterize(&mut self) -> Result<RgbaImage, MediaError> {
        if self.blank_at.contains(&self.position) {
            return Err(MediaError::NoFrame {
                timestamp: self.position,
            });
        }
        Ok(RgbaImage::new(self.dimensions.0, self.dimensions.1))
    }
}

/// Hands out queued [`FakeMedia`] values and counts opens.
#[derive(Default)]
pub struct FakeOpener {
    queue: Mutex<VecDeque<FakeMedia>>,
    pub opens: AtomicUsize,
}

impl FakeOpener {
    pub fn with(media: FakeMedia) -> Arc<Self> {
        let opener = Self::default();
        opener.queue.lock().unwrap().push_back(media);
        Arc::new(opener)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaOpener for FakeOpener {
    async fn open(&self, source: &CaptureSource) -> Result<Box<dyn MediaHandle>, MediaError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(media) => Ok(Box::new(media)),
            None => Err(MediaError::Open(format!("cannot open {}", source.kind()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn resolver_with_ceiling(ceiling: usize) -> Arc<PrefixCredentialResolver> {
    let defaults = EntitlementLimits::default();
    let limits = EntitlementLimits {
        free: TierLimits {
            frame_ceiling: ceiling,
            ..defaults.free
        },
        premium: TierLimits {
            frame_ceiling: ceiling,
            ..defaults.premium
        },
    };
    Arc::new(PrefixCredentialResolver::new("PREMIUM-", 21, limits))
}

pub fn test_config(scratch_root: &Path) -> PipelineConfig {
    PipelineConfig {
        tool_timeout: Duration::from_millis(200),
        kill_grace: Duration::ZERO,
        scratch_root: Some(scratch_root.to_path_buf()),
    }
}

pub fn pipeline(
    fetcher: Arc<FakeFetcher>,
    sampler: Arc<FakeSampler>,
    scratch_root: &Path,
) -> RemoteExtractionPipeline {
    RemoteExtractionPipeline::new(
        fetcher,
        sampler,
        resolver_with_ceiling(100),
        test_config(scratch_root),
    )
}

pub fn orchestrator(
    remote: RemoteExtractionPipeline,
    opener: Arc<FakeOpener>,
    mode: AdmissionMode,
) -> CaptureOrchestrator {
    CaptureOrchestrator::new(
        remote,
        ClientFrameSampler::new(SamplerConfig {
            inter_sample_delay: Duration::ZERO,
        }),
        opener,
        mode,
    )
}

/// Whether `dir` has no entries left.
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false)
}
