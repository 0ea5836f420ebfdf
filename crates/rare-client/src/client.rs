//! Rare event detection HTTP client implementation

use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{RareClientError, Result};
use crate::image::ImageFile;
use crate::references::ReferenceSet;
use crate::types::*;

/// Default request timeout; image generation can take a while on CPU
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the rare event detection REST API
///
/// Each method is a single request/response round trip. Nothing is retried
/// or cached.
#[derive(Debug, Clone)]
pub struct RareClient {
    client: Client,
    base_url: Url,
}

impl RareClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the backend (e.g., "http://localhost:8000")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let mut base_url = Url::parse(base_url)?;
        // Endpoints are joined relative to the base, so keep any path prefix
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // Service Status
    // =========================================================================

    /// Check backend health and which device the models run on
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.endpoint("health")?;
        debug!("Checking health at {}", url);

        self.send(self.client.get(url)).await
    }

    /// Fetch the service banner and endpoint listing
    #[instrument(skip(self))]
    pub async fn api_info(&self) -> Result<ApiInfo> {
        let url = self.endpoint("")?;
        self.send(self.client.get(url)).await
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Upload the reference set.
    ///
    /// The set is validated locally first; an incomplete set fails with
    /// [`RareClientError::InvalidInput`] and no request is made.
    #[instrument(skip(self, references), fields(images = references.image_count()))]
    pub async fn upload_references(&self, references: &ReferenceSet) -> Result<UploadResponse> {
        let form = references.to_form()?;
        let url = self.endpoint("upload_references")?;
        debug!("Uploading references to {}", url);

        self.send(self.client.post(url).multipart(form)).await
    }

    /// Classify an image against the uploaded references
    #[instrument(skip(self, image), fields(file = %image.file_name, size = image.len()))]
    pub async fn classify(&self, image: &ImageFile) -> Result<ClassifyResponse> {
        let form = Self::image_form(image)?;
        let url = self.endpoint("classify")?;
        debug!("Classifying image at {}", url);

        self.send(self.client.post(url).multipart(form)).await
    }

    /// Ask the backend to caption an image
    #[instrument(skip(self, image), fields(file = %image.file_name, size = image.len()))]
    pub async fn describe(&self, image: &ImageFile) -> Result<DescribeResponse> {
        let form = Self::image_form(image)?;
        let url = self.endpoint("describe")?;
        debug!("Describing image at {}", url);

        self.send(self.client.post(url).multipart(form)).await
    }

    /// Generate a synthetic image from a caption.
    ///
    /// The caption is trimmed; a blank caption is rejected without a request.
    #[instrument(skip(self))]
    pub async fn generate(&self, caption: &str) -> Result<GenerateResponse> {
        let caption = caption.trim();
        if caption.is_empty() {
            return Err(RareClientError::invalid_input(
                "Please enter a caption for image generation",
            ));
        }

        let form = Form::new().text("caption", caption.to_string());
        let url = self.endpoint("generate")?;
        debug!("Generating image at {}", url);

        self.send(self.client.post(url).multipart(form)).await
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn image_form(image: &ImageFile) -> Result<Form> {
        if image.is_empty() {
            return Err(RareClientError::invalid_input(
                "Please upload an image first",
            ));
        }
        Ok(Form::new().part("file", image.to_part()?))
    }

    /// Send a request and decode the JSON body
    async fn send<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(RareClientError::from_transport)?;
        self.handle_response(response).await
    }

    /// Handle response and deserialize JSON
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| RareClientError::ParseError(e.to_string()))
        } else {
            Err(self.extract_error_from_status(response, status).await)
        }
    }

    async fn extract_error_from_status(
        &self,
        response: reqwest::Response,
        status: StatusCode,
    ) -> RareClientError {
        let detail = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|err| err.detail_message());

        match (status, detail) {
            (_, Some(detail)) => RareClientError::server_error(status.as_u16(), detail),
            // A bare timeout status usually comes from a proxy in front of the backend
            (StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT, None) => {
                RareClientError::Timeout
            }
            (_, None) => RareClientError::server_error(status.as_u16(), format!("HTTP {}", status)),
        }
    }
}
