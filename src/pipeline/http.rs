//! Pipeline adapter backed by a local HTTP generation service.
//!
//! The service exposes `GET /health` and `POST /generate`. Generation is a
//! single blocking request; the service writes the video to the requested
//! path and answers with `{status, output_path, error}`.
//!
//! The request runs on its own thread so a forceful stop can abandon it
//! without waiting for the service to answer.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PipelineAdapter, PipelineError, VideoRequest};

/// Default timeout for one generation request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// How often an in-flight request checks its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    num_inference_steps: u32,
    guidance_scale: f32,
    num_frames: u32,
    seed: u64,
    width: u32,
    height: u32,
    fps: u32,
    output_path: &'a str,
}

impl<'a> GenerateBody<'a> {
    fn new(request: &'a VideoRequest, output_path: &'a str) -> Self {
        Self {
            prompt: &request.prompt,
            num_inference_steps: request.inference_steps,
            guidance_scale: request.guidance_scale,
            num_frames: request.num_frames,
            seed: request.seed,
            width: request.width,
            height: request.height,
            fps: request.fps,
            output_path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    status: String,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the generation service.
#[derive(Debug)]
pub struct HttpPipeline {
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::blocking::Client>,
}

impl HttpPipeline {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            client: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }
}

impl PipelineAdapter for HttpPipeline {
    fn name(&self) -> &str {
        "http"
    }

    fn load(&mut self) -> Result<(), PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PipelineError::Load(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(self.health_url())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .map_err(|e| {
                PipelineError::Load(format!("Service at {} unreachable: {}", self.base_url, e))
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::Load(format!(
                "HTTP {} from {}",
                response.status(),
                self.health_url()
            )));
        }

        info!(url = %self.base_url, "generation service ready");
        self.client = Some(client);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.client.is_some()
    }

    fn generate(
        &mut self,
        request: &VideoRequest,
        on_progress: &mut dyn FnMut(u32, u32),
    ) -> Result<PathBuf, PipelineError> {
        let client = self.client.clone().ok_or(PipelineError::NotLoaded)?;
        if request.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let output_path = request.output_path.to_string_lossy();
        debug!(seed = request.seed, path = %output_path, "posting generation request");

        let body = serde_json::to_value(GenerateBody::new(request, &output_path))
            .map_err(|e| PipelineError::Generation(format!("Unencodable request: {}", e)))?;
        let url = self.generate_url();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("pipeline-http".to_string())
            .spawn(move || {
                tx.send(post_generate(&client, &url, &body)).ok();
            })?;

        let reply = loop {
            if request.cancel.is_cancelled() {
                debug!(seed = request.seed, "abandoning generation request");
                return Err(PipelineError::Cancelled);
            }
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(reply) => break reply?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PipelineError::Generation(
                        "request thread exited without a reply".to_string(),
                    ))
                }
            }
        };

        if request.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        if reply.status != "success" {
            return Err(PipelineError::Generation(
                reply
                    .error
                    .unwrap_or_else(|| format!("service reported status {:?}", reply.status)),
            ));
        }

        // The service renders in one call, so progress arrives as a single final tick.
        on_progress(request.inference_steps, request.inference_steps);

        let path = reply
            .output_path
            .map(PathBuf::from)
            .unwrap_or_else(|| request.output_path.clone());
        if !path.exists() {
            return Err(PipelineError::Generation(format!(
                "Service reported success but {} does not exist",
                path.display()
            )));
        }
        Ok(path)
    }

    fn unload(&mut self) {
        if self.client.take().is_some() {
            debug!(url = %self.base_url, "released generation service client");
        }
    }
}

/// Sends one `/generate` call and decodes the reply.
fn post_generate(
    client: &reqwest::blocking::Client,
    url: &str,
    body: &serde_json::Value,
) -> Result<GenerateReply, PipelineError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .map_err(|e| PipelineError::Generation(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(PipelineError::Generation(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    response
        .json()
        .map_err(|e| PipelineError::Generation(format!("Malformed reply: {}", e)))
}
