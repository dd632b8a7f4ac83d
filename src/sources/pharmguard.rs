use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::config::Settings;
use crate::entities::analysis::{AnalysisResponse, BackendError};
use crate::error::PharmGuardError;
use crate::input::AnalysisRequest;

const PHARMGUARD_API: &str = "pharmguard";
const ANALYSIS_PATH: &str = "api/analysis";
const VCF_MIME: &str = "application/octet-stream";
const UNKNOWN_DETAILS: &str = "Unknown error";

/// Client for the pharmacogenomic analysis backend.
///
/// Each call to [`AnalysisClient::analyze`] issues exactly one multipart POST.
pub struct AnalysisClient {
    client: reqwest::Client,
    settings: Settings,
}

impl AnalysisClient {
    pub fn new(settings: &Settings) -> Result<Self, PharmGuardError> {
        Ok(Self {
            client: crate::sources::http_client(settings)?,
            settings: settings.clone(),
        })
    }

    pub fn base(&self) -> &str {
        self.settings.api_base.as_ref()
    }

    async fn form(request: &AnalysisRequest) -> Result<Form, PharmGuardError> {
        let file = request.variant_file();
        let part = Part::bytes(file.read().await?)
            .file_name(file.file_name.clone())
            .mime_str(VCF_MIME)?;
        Ok(Form::new()
            .part("vcf_file", part)
            .text("drugs", request.drugs().joined()))
    }

    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, PharmGuardError> {
        let url = self.settings.endpoint(ANALYSIS_PATH);
        info!(
            url = %url,
            file = %request.variant_file().file_name,
            bytes = request.variant_file().size(),
            drugs = %request.drugs().joined(),
            "Submitting analysis"
        );

        let resp = self
            .client
            .post(&url)
            .multipart(Self::form(request).await?)
            .send()
            .await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, PHARMGUARD_API).await?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "Analysis response received");

        if !status.is_success() {
            return Err(backend_error(status, &bytes));
        }

        crate::sources::ensure_json_content_type(PHARMGUARD_API, content_type.as_ref(), &bytes)?;
        let raw: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|source| PharmGuardError::ApiJson {
                api: PHARMGUARD_API.to_string(),
                source,
            })?;
        AnalysisResponse::from_value(raw).map_err(|source| PharmGuardError::ApiJson {
            api: PHARMGUARD_API.to_string(),
            source,
        })
    }
}

fn backend_error(status: reqwest::StatusCode, bytes: &[u8]) -> PharmGuardError {
    match serde_json::from_slice::<BackendError>(bytes) {
        Ok(BackendError {
            error: Some(message),
            details,
        }) => PharmGuardError::Backend {
            status: status.as_u16(),
            message,
            details: details.unwrap_or_else(|| UNKNOWN_DETAILS.to_string()),
        },
        _ => PharmGuardError::Api {
            api: PHARMGUARD_API.to_string(),
            message: format!("HTTP {status}: {}", crate::sources::body_excerpt(bytes)),
        },
    }
}
