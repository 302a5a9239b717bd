use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

use shared::{EncodedImage, TaskHandle};

use super::{normalize, task_status_url, upload_file_name, AnalysisClient, RemoteTask, Submission};
use crate::config::PipelineConfig;
use crate::error::{ClientError, ClientResult, ConfigError, ConfigResult};

/// [`AnalysisClient`] speaking HTTP to the detection service.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    detect_url: Url,
    tasks_url: Url,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &Url, timeout: Duration) -> ConfigResult<Self> {
        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|source| ConfigError::InvalidBaseUrl {
                    url: base_url.to_string(),
                    source,
                })
        };
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            client,
            detect_url: join("flower/detect")?,
            tasks_url: join("flower/tasks/")?,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> ConfigResult<Self> {
        Self::new(
            &config.base_url()?,
            Duration::from_secs(config.api.request_timeout_secs),
        )
    }

    async fn read_body(response: Response) -> ClientResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ClientError::Network(err.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ClientError::from_status(status.as_u16(), &body))
        }
    }
}

impl AnalysisClient for HttpAnalysisClient {
    async fn submit(&self, image: EncodedImage, token: &str) -> ClientResult<Submission> {
        let file_name = upload_file_name(&image.mime);
        let part = Part::bytes(image.bytes)
            .file_name(file_name)
            .mime_str(&image.mime)
            .map_err(|err| ClientError::Network(err.to_string()))?;
        let form = Form::new().part("image", part);

        log::debug!("POST {} ({}x{})", self.detect_url, image.width, image.height);
        let response = self
            .client
            .post(self.detect_url.clone())
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|err| ClientError::Network(err.to_string()))?;

        let body = Self::read_body(response).await?;
        normalize::parse_submission(&body)
    }

    async fn fetch_status(&self, handle: &TaskHandle, token: &str) -> ClientResult<RemoteTask> {
        let url = task_status_url(&self.tasks_url, handle)?;

        log::debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ClientError::Network(err.to_string()))?;

        let body = Self::read_body(response).await?;
        normalize::parse_task_status(&body)
    }
}
