// HTTP client for the orchestrator's REST surface.

use std::time::Duration;

use gaia_common::types::{JobView, WikiAccepted, WikiRequest};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use url::Url;

use crate::config::CliConfig;

const API_SECRET_HEADER: &str = "X-Api-Secret";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid server URL `{url}`: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("server at {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("server returned {status} {code}: {message}")]
    Api { status: u16, code: String, message: String },
    #[error("unexpected response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("job {job_id} did not finish within {waited:?}")]
    WaitTimedOut { job_id: String, waited: Duration },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_transport(url: &Url, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else if err.is_connect() {
            Self::Unreachable { url: url.to_string(), source: err }
        } else {
            Self::Decode(err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct GaiaClient {
    http: reqwest::Client,
    base_url: Url,
    api_secret: Option<String>,
}

impl GaiaClient {
    pub fn new(config: &CliConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.server_url)
            .map_err(|source| ClientError::BadUrl { url: config.server_url.clone(), source })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ClientError::Decode)?;
        Ok(Self { http, base_url, api_secret: config.api_secret.clone() })
    }

    /// `POST /api/v1/wiki`.
    pub async fn submit(&self, request: &WikiRequest) -> Result<WikiAccepted, ClientError> {
        let url = self.endpoint("api/v1/wiki")?;
        self.send(&url, self.http.post(url.clone()).json(request)).await
    }

    /// `GET /api/v1/wiki/{job_id}`.
    pub async fn job(&self, job_id: &str) -> Result<JobView, ClientError> {
        let mut url = self.endpoint("api/v1/wiki/")?;
        url.path_segments_mut()
            .map_err(|()| ClientError::BadUrl {
                url: self.base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .push(job_id);
        self.send(&url, self.http.get(url.clone())).await
    }

    /// `GET /api/v1/wiki`, most recent first.
    pub async fn jobs(&self) -> Result<Vec<JobView>, ClientError> {
        let url = self.endpoint("api/v1/wiki")?;
        self.send(&url, self.http.get(url.clone())).await
    }

    /// Poll a job until it reaches a terminal status.
    pub async fn wait_for(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<JobView, ClientError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let view = self.job(job_id).await?;
            if view.status.is_terminal() {
                return Ok(view);
            }
            if tokio::time::Instant::now() + poll_interval > deadline {
                let job_id = job_id.to_string();
                return Err(ClientError::WaitTimedOut { job_id, waited: timeout });
            }
            debug!(job_id, status = view.status.as_str(), "job still running");
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|source| ClientError::BadUrl { url: self.base_url.to_string(), source })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let request = match &self.api_secret {
            Some(secret) => request.header(API_SECRET_HEADER, secret),
            None => request,
        };
        debug!(url = %url, "sending request");
        let response =
            request.send().await.map_err(|err| ClientError::from_transport(url, err))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(ClientError::Decode);
    }

    let text = response.text().await.unwrap_or_default();
    Err(api_error(status, &text))
}

fn api_error(status: StatusCode, text: &str) -> ClientError {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(envelope) => ClientError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: "HTTP_ERROR".to_string(),
            message: text.trim().chars().take(200).collect(),
        },
    }
}
