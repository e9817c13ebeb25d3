//! HTTP client for the gateway.
//!
//! Every call decodes the `{ "data": ... }` envelope into the operation's
//! result union and turns the populated member into either a value or a
//! classified [`ClientError`]. Only transport faults are retried.

use std::time::Duration;

use flowgate_core::status::RunStatus;
use flowgate_core::types::{RunId, Tags};
use flowgate_core::version::{check_compatible, PACKAGE_VERSION};
use flowgate_schema::{
    LaunchRunResult, PipelineRun, PipelineRunOrError, ReloadRepositoryLocationResult,
    ReloadRepositoryLocationStatus, TerminateRunResult, SCHEMA_VERSION,
};
use reqwest::{Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backoff::next_delay;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::subscription::RunLogStream;

/// Versions reported by the gateway's health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerInfo {
    pub status: String,
    pub version: String,
    pub schema_version: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Error body of a request the gateway could not interpret.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// A run to launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobSubmission {
    selector: Selector,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_config: Option<Value>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct Selector {
    pipeline_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solid_selection: Option<Vec<String>>,
}

impl JobSubmission {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            selector: Selector {
                pipeline_name: pipeline_name.into(),
                ..Selector::default()
            },
            ..Self::default()
        }
    }

    pub fn location(mut self, location_name: impl Into<String>) -> Self {
        self.selector.location_name = Some(location_name.into());
        self
    }

    pub fn solids(mut self, clauses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.selector.solid_selection = Some(clauses.into_iter().map(Into::into).collect());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn run_config(mut self, run_config: Value) -> Self {
        self.run_config = Some(run_config);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a location reload. `Skipped` and `Error` are not failures
/// of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadRepositoryLocationInfo {
    pub status: ReloadRepositoryLocationStatus,
    pub message: Option<String>,
}

/// Outcome of a terminate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// Cancellation was requested; the run is now `status`.
    Requested { status: RunStatus },
    /// The run had already finished or was being canceled.
    NotTerminable { status: RunStatus, message: String },
}

/// Client for one gateway. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: ClientConfig,
    server: ServerInfo,
}

impl GatewayClient {
    /// Connect to the gateway and check that its versions are compatible
    /// with this client before anything else is called.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::from)?;

        let health = endpoint(&config.base_url, &["health"])?;
        let server: ServerInfo = send_with_retries(&http, &config, Method::GET, &health, None).await?;

        check_compatible(PACKAGE_VERSION, &server.version)?;
        check_compatible(SCHEMA_VERSION, &server.schema_version)?;

        tracing::debug!(
            url = %config.base_url,
            server_version = %server.version,
            schema_version = %server.schema_version,
            "Connected to gateway"
        );
        Ok(Self { http, config, server })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Launch a run and return its id. The call returns once the run is
    /// queued; use [`poll_run`](Self::poll_run) to wait for it.
    pub async fn submit_job(&self, job: &JobSubmission) -> ClientResult<RunId> {
        let body = serde_json::to_value(job).map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;
        let result: LaunchRunResult = self.call(Method::POST, &["runs"], Some(&body)).await?;

        let typename = result.typename();
        match result {
            LaunchRunResult::LaunchRunSuccess(success) => {
                tracing::info!(run_id = %success.run.run_id, pipeline = %success.run.pipeline_name, "Run submitted");
                Ok(success.run.run_id)
            }
            LaunchRunResult::InvalidOutputError(e) => Err(ClientError::InvalidOutput(e.into())),
            LaunchRunResult::PipelineConfigValidationInvalid(e) => {
                let details: Vec<&str> = e.errors.iter().map(config_error_message).collect();
                Err(ClientError::invalid_input(
                    typename,
                    format!(
                        "Run config for pipeline '{}' in mode '{}' is invalid: {}",
                        e.pipeline_name,
                        e.mode,
                        details.join("; ")
                    ),
                ))
            }
            LaunchRunResult::PipelineNotFoundError(e) => Err(ClientError::invalid_input(typename, e.message)),
            LaunchRunResult::RepositoryLocationNotFound(e) => Err(ClientError::invalid_input(typename, e.message)),
            LaunchRunResult::ModeNotFoundError(e) => Err(ClientError::invalid_input(typename, e.message)),
            LaunchRunResult::PresetNotFoundError(e) => Err(ClientError::invalid_input(typename, e.message)),
            LaunchRunResult::InvalidSubsetError(e) => Err(ClientError::invalid_input(typename, e.message)),
            LaunchRunResult::InvalidRequestError(e) => Err(ClientError::invalid_input(typename, e.message)),
        }
    }

    /// The run as the gateway currently reports it.
    pub async fn get_run(&self, run_id: RunId) -> ClientResult<PipelineRun> {
        let run_id = run_id.to_string();
        let result: PipelineRunOrError = self.call(Method::GET, &["runs", &run_id], None).await?;
        let typename = result.typename();
        match result {
            PipelineRunOrError::PipelineRun(run) => Ok(run),
            PipelineRunOrError::PipelineRunNotFoundError(e) => Err(ClientError::not_found(typename, e.message)),
            PipelineRunOrError::InvalidRequestError(e) => Err(ClientError::invalid_input(typename, e.message)),
        }
    }

    pub async fn get_run_status(&self, run_id: RunId) -> ClientResult<RunStatus> {
        Ok(self.get_run(run_id).await?.status)
    }

    /// Wait until the run reaches a terminal status and return it.
    ///
    /// Polls with exponential backoff. The whole wait, including requests
    /// in flight and their transport retries, is bounded by `timeout`;
    /// exceeding it fails with [`ClientError::Timeout`] and leaves the run
    /// untouched.
    pub async fn poll_run(&self, run_id: RunId, timeout: Duration) -> ClientResult<RunStatus> {
        let started = tokio::time::Instant::now();
        let mut last_status = None;

        let outcome = tokio::time::timeout(timeout, self.poll_until_terminal(run_id, &mut last_status)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(run_id = %run_id, ?last_status, "Polling timed out");
                Err(ClientError::Timeout {
                    run_id,
                    last_status,
                    waited: started.elapsed(),
                })
            }
        }
    }

    async fn poll_until_terminal(&self, run_id: RunId, last_status: &mut Option<RunStatus>) -> ClientResult<RunStatus> {
        let mut delay = self.config.poll.initial_interval;
        loop {
            let status = self.get_run_status(run_id).await?;
            if status.is_terminal() {
                tracing::debug!(run_id = %run_id, %status, "Run reached terminal status");
                return Ok(status);
            }
            *last_status = Some(status);
            tokio::time::sleep(delay).await;
            delay = next_delay(delay, &self.config.poll);
        }
    }

    pub async fn terminate_run(&self, run_id: RunId) -> ClientResult<TerminateOutcome> {
        let run_id = run_id.to_string();
        let result: TerminateRunResult = self
            .call(Method::POST, &["runs", &run_id, "terminate"], None)
            .await?;
        let typename = result.typename();
        match result {
            TerminateRunResult::TerminateRunSuccess(success) => Ok(TerminateOutcome::Requested {
                status: success.run.status,
            }),
            TerminateRunResult::TerminateRunFailure(failure) => Ok(TerminateOutcome::NotTerminable {
                status: failure.run.status,
                message: failure.message,
            }),
            TerminateRunResult::PipelineRunNotFoundError(e) => Err(ClientError::not_found(typename, e.message)),
            TerminateRunResult::InvalidRequestError(e) => Err(ClientError::invalid_input(typename, e.message)),
        }
    }

    /// Reload a repository location. A reload that changes nothing comes
    /// back as `Skipped`, a failed load as `Error`; neither is an `Err`.
    pub async fn reload_repository_location(
        &self,
        location_name: &str,
    ) -> ClientResult<ReloadRepositoryLocationInfo> {
        let result: ReloadRepositoryLocationResult = self
            .call(Method::POST, &["locations", location_name, "reload"], None)
            .await?;
        let typename = result.typename();
        match result {
            ReloadRepositoryLocationResult::RepositoryLocationReload(reload) => {
                Ok(ReloadRepositoryLocationInfo {
                    status: reload.status,
                    message: reload.message,
                })
            }
            ReloadRepositoryLocationResult::RepositoryLocationNotFound(e) => {
                Err(ClientError::not_found(typename, e.message))
            }
            ReloadRepositoryLocationResult::InvalidRequestError(e) => {
                Err(ClientError::invalid_input(typename, e.message))
            }
        }
    }

    /// Open a stream of the run's log: its history, then live batches
    /// until the run is terminal.
    pub async fn subscribe_run_logs(&self, run_id: RunId) -> ClientResult<RunLogStream> {
        let run_id = run_id.to_string();
        let url = endpoint(&self.config.ws_url(), &["api", "v1", "runs", &run_id, "logs"])?;
        RunLogStream::connect(url.as_str()).await
    }

    /// Call `/api/v1/{segments...}` and unwrap the `data` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> ClientResult<T> {
        let mut path = vec!["api", "v1"];
        path.extend_from_slice(segments);
        let url = endpoint(&self.config.base_url, &path)?;
        let envelope: Envelope<T> = send_with_retries(&self.http, &self.config, method, &url, body).await?;
        Ok(envelope.data)
    }
}

/// `base_url` extended with `segments`, each percent-encoded as a single
/// path segment.
fn endpoint(base_url: &str, segments: &[&str]) -> ClientResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ClientError::Config(format!("invalid gateway URL '{base_url}': {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::Config(format!("gateway URL '{base_url}' cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn config_error_message(error: &flowgate_schema::PipelineConfigValidationError) -> &str {
    use flowgate_schema::PipelineConfigValidationError as E;
    match error {
        E::FieldNotDefinedConfigError(e) => &e.message,
        E::FieldsNotDefinedConfigError(e) => &e.message,
        E::MissingFieldConfigError(e) => &e.message,
        E::MissingFieldsConfigError(e) => &e.message,
        E::RuntimeMismatchConfigError(e) => &e.message,
        E::SelectorTypeConfigError(e) => &e.message,
    }
}

/// Send one request, retrying transport faults with backoff.
async fn send_with_retries<T: DeserializeOwned>(
    http: &reqwest::Client,
    config: &ClientConfig,
    method: Method,
    url: &Url,
    body: Option<&Value>,
) -> ClientResult<T> {
    let mut delays = config.retry.delays();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut request = http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = match request.send().await {
            Ok(response) => decode(response).await,
            Err(e) => Err(ClientError::from(e)),
        };

        match result {
            Err(e) if e.is_transient() && attempt <= config.max_transport_retries => {
                let delay = delays.next().unwrap_or(config.retry.max_interval);
                tracing::warn!(
                    %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Gateway call failed, retrying",
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        let bytes = response.bytes().await?;
        return serde_json::from_slice(&bytes).map_err(|e| ClientError::UnexpectedResponse(e.to_string()));
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());

    if status.is_client_error() && !matches!(status.as_u16(), 408 | 429) {
        // Requests the gateway cannot interpret come back as `{error, code}`.
        return Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ClientError::invalid_input(
                "InvalidRequestError",
                format!("{}: {}", body.code, body.error),
            ),
            Err(_) => ClientError::UnexpectedResponse(format!("{status}: {text}")),
        });
    }

    Err(ClientError::Transport {
        message: format!("{status}: {text}"),
        status: Some(status.as_u16()),
    })
}
