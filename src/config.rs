//! Runtime settings shared by the request client, the input collector and the exporters.

use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
pub const DEFAULT_MAX_UPLOAD_MIB: u64 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: Cow<'static, str>,
    /// Upload ceiling in bytes; `None` disables the client-side size check.
    pub max_upload_bytes: Option<u64>,
    /// `None` means the analysis call waits indefinitely.
    pub timeout: Option<Duration>,
    pub download_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: Cow::Borrowed(DEFAULT_API_BASE),
            max_upload_bytes: Some(DEFAULT_MAX_UPLOAD_MIB * MIB),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            download_dir: None,
        }
    }
}

impl Settings {
    pub fn new(
        api_base: Option<&str>,
        max_upload_mib: u64,
        no_size_limit: bool,
        timeout_secs: u64,
    ) -> Self {
        let api_base = api_base
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Cow::Owned(s.trim_end_matches('/').to_string()))
            .unwrap_or(Cow::Borrowed(DEFAULT_API_BASE));
        let max_upload_bytes = if no_size_limit || max_upload_mib == 0 {
            None
        } else {
            Some(max_upload_mib.saturating_mul(MIB))
        };
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        Self {
            api_base,
            max_upload_bytes,
            timeout,
            download_dir: None,
        }
    }

    pub fn with_download_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.download_dir = dir;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
