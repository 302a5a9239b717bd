use gloo_file::Blob;
use gloo_net::http::{Request, Response};
use pipeline::client::{normalize, task_status_url, upload_file_name};
use pipeline::config::PipelineConfig;
use pipeline::error::{ClientError, ClientResult, ConfigError, ConfigResult};
use pipeline::{AnalysisClient, RemoteTask, Submission};
use shared::{EncodedImage, TaskHandle};
use url::Url;
use web_sys::FormData;

/// [`AnalysisClient`] on top of the browser's `fetch`.
#[derive(Debug, Clone)]
pub struct GlooAnalysisClient {
    detect_url: Url,
    tasks_url: Url,
}

impl GlooAnalysisClient {
    pub fn from_config(config: &PipelineConfig) -> ConfigResult<Self> {
        let base_url = config.base_url()?;
        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|source| ConfigError::InvalidBaseUrl {
                    url: base_url.to_string(),
                    source,
                })
        };
        Ok(Self {
            detect_url: join("flower/detect")?,
            tasks_url: join("flower/tasks/")?,
        })
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn network(err: gloo_net::Error) -> ClientError {
    ClientError::Network(err.to_string())
}

async fn read_body(response: Response) -> ClientResult<String> {
    let status = response.status();
    let body = response.text().await.map_err(network)?;
    if response.ok() {
        Ok(body)
    } else {
        Err(ClientError::from_status(status, &body))
    }
}

fn upload_form(image: &EncodedImage) -> ClientResult<FormData> {
    let form = FormData::new()
        .map_err(|err| ClientError::Network(format!("could not build form data: {err:?}")))?;
    let blob = Blob::new_with_options(image.bytes.as_slice(), Some(image.mime.as_str()));
    form.append_with_blob_and_filename("image", blob.as_ref(), upload_file_name(&image.mime))
        .map_err(|err| ClientError::Network(format!("could not attach image: {err:?}")))?;
    Ok(form)
}

impl AnalysisClient for GlooAnalysisClient {
    async fn submit(&self, image: EncodedImage, token: &str) -> ClientResult<Submission> {
        let form = upload_form(&image)?;
        log::debug!("POST {} ({}x{})", self.detect_url, image.width, image.height);
        let response = Request::post(self.detect_url.as_str())
            .header("Authorization", &bearer(token))
            .body(form)
            .map_err(network)?
            .send()
            .await
            .map_err(network)?;

        let body = read_body(response).await?;
        normalize::parse_submission(&body)
    }

    async fn fetch_status(&self, handle: &TaskHandle, token: &str) -> ClientResult<RemoteTask> {
        let url = task_status_url(&self.tasks_url, handle)?;

        log::debug!("GET {url}");
        let response = Request::get(url.as_str())
            .header("Authorization", &bearer(token))
            .send()
            .await
            .map_err(network)?;

        let body = read_body(response).await?;
        normalize::parse_task_status(&body)
    }
}
