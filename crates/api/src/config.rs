use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use framegrab_core::entitlement::{
    EntitlementLimits, PrefixCredentialResolver, TierLimits, DEFAULT_FRAME_CEILING,
    DEFAULT_FREE_MONTHLY_IMAGES, DEFAULT_PREMIUM_MIN_LEN, DEFAULT_PREMIUM_PREFIX, UNLIMITED,
};
use framegrab_pipeline::config::{PipelineConfig, ToolPaths, DEFAULT_KILL_GRACE};
use framegrab_pipeline::orchestrator::AdmissionMode;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must cover two tool timeouts.
    pub request_timeout_secs: u64,
    /// Wall-clock budget per external process, in seconds.
    pub tool_timeout_secs: u64,
    pub free_frame_ceiling: usize,
    pub premium_frame_ceiling: usize,
    pub free_monthly_images: i64,
    pub premium_credential_prefix: String,
    pub premium_credential_min_len: usize,
    /// Where ledger state is persisted; `None` keeps it in memory.
    pub license_state_dir: Option<PathBuf>,
    /// Parent directory for scratch areas; `None` uses the system temp dir.
    pub scratch_root: Option<PathBuf>,
    pub tools: ToolPaths,
    pub admission_mode: AdmissionMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 660,
            tool_timeout_secs: 300,
            free_frame_ceiling: DEFAULT_FRAME_CEILING,
            premium_frame_ceiling: DEFAULT_FRAME_CEILING,
            free_monthly_images: DEFAULT_FREE_MONTHLY_IMAGES,
            premium_credential_prefix: DEFAULT_PREMIUM_PREFIX.into(),
            premium_credential_min_len: DEFAULT_PREMIUM_MIN_LEN,
            license_state_dir: None,
            scratch_root: None,
            tools: ToolPaths::default(),
            admission_mode: AdmissionMode::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `660`                   |
    /// | `TOOL_TIMEOUT_SECS`          | `300`                   |
    /// | `FREE_FRAME_CEILING`         | `100`                   |
    /// | `PREMIUM_FRAME_CEILING`      | `100`                   |
    /// | `FREE_MONTHLY_IMAGES`        | `100`                   |
    /// | `PREMIUM_CREDENTIAL_PREFIX`  | `PREMIUM-`              |
    /// | `PREMIUM_CREDENTIAL_MIN_LEN` | `21`                    |
    /// | `LICENSE_STATE_DIR`          | unset (in memory)       |
    /// | `SCRATCH_ROOT`               | system temp dir         |
    /// | `YTDLP_BIN`                  | `yt-dlp`                |
    /// | `FFMPEG_BIN`                 | `ffmpeg`                |
    /// | `FFPROBE_BIN`                | `ffprobe`               |
    /// | `ADMISSION_MODE`             | `check_then_record`     |
    ///
    /// Panics on unparseable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        let admission_mode = match std::env::var("ADMISSION_MODE").as_deref() {
            Err(_) | Ok("check_then_record") => AdmissionMode::CheckThenRecord,
            Ok("reserve") => AdmissionMode::Reserve,
            Ok(other) => {
                panic!("ADMISSION_MODE must be 'check_then_record' or 'reserve', got '{other}'")
            }
        };

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT", defaults.port),
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            tool_timeout_secs: parse_env("TOOL_TIMEOUT_SECS", defaults.tool_timeout_secs),
            free_frame_ceiling: parse_env("FREE_FRAME_CEILING", defaults.free_frame_ceiling),
            premium_frame_ceiling: parse_env(
                "PREMIUM_FRAME_CEILING",
                defaults.premium_frame_ceiling,
            ),
            free_monthly_images: parse_env("FREE_MONTHLY_IMAGES", defaults.free_monthly_images),
            premium_credential_prefix: std::env::var("PREMIUM_CREDENTIAL_PREFIX")
                .unwrap_or(defaults.premium_credential_prefix),
            premium_credential_min_len: parse_env(
                "PREMIUM_CREDENTIAL_MIN_LEN",
                defaults.premium_credential_min_len,
            ),
            license_state_dir: std::env::var_os("LICENSE_STATE_DIR").map(PathBuf::from),
            scratch_root: std::env::var_os("SCRATCH_ROOT").map(PathBuf::from),
            tools: ToolPaths {
                ytdlp: std::env::var_os("YTDLP_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.tools.ytdlp),
                ffmpeg: std::env::var_os("FFMPEG_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.tools.ffmpeg),
                ffprobe: std::env::var_os("FFPROBE_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.tools.ffprobe),
            },
            admission_mode,
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn entitlement_limits(&self) -> EntitlementLimits {
        EntitlementLimits {
            free: TierLimits {
                monthly_images: self.free_monthly_images,
                frame_ceiling: self.free_frame_ceiling,
            },
            premium: TierLimits {
                monthly_images: UNLIMITED,
                frame_ceiling: self.premium_frame_ceiling,
            },
        }
    }

    pub fn credential_resolver(&self) -> PrefixCredentialResolver {
        PrefixCredentialResolver::new(
            self.premium_credential_prefix.clone(),
            self.premium_credential_min_len,
            self.entitlement_limits(),
        )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tool_timeout: self.tool_timeout(),
            kill_grace: DEFAULT_KILL_GRACE,
            scratch_root: self.scratch_root.clone(),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
