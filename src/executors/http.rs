//! HTTP request executor

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, Span};

use crate::executor::{to_result, Executor, ExecutorResult, StepError};
use crate::models::{Aliases, Step};
use crate::utils::timer::{humanize, Timer};

pub const NAME: &str = "http";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpStep {
    #[serde(default = "default_method")]
    method: String,
    url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    ignore_verify_ssl: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Default, Serialize)]
struct HttpResult {
    statuscode: u16,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bodyjson: Option<serde_json::Value>,
    headers: BTreeMap<String, String>,
    err: Option<String>,
    timeseconds: f64,
    timehuman: String,
}

/// Issues one HTTP request per attempt
pub struct HttpExecutor;

#[async_trait]
impl Executor for HttpExecutor {
    async fn run(&self, log: &Span, _aliases: &Aliases, step: &Step) -> Result<ExecutorResult> {
        let request: HttpStep = step.decode()?;
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| StepError::Decode(format!("invalid method '{}'", request.method)))?;

        let client = Client::builder()
            .danger_accept_invalid_certs(request.ignore_verify_ssl)
            .build()
            .context("Failed to create HTTP client")?;

        debug!(parent: log, "http: {} {}", method, request.url);
        let timer = Timer::start("http");
        let mut result = HttpResult::default();

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        match builder.send().await {
            Ok(response) => {
                result.statuscode = response.status().as_u16();
                result.headers = response
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).to_string()))
                    .collect();
                match response.text().await {
                    Ok(body) => {
                        result.bodyjson = serde_json::from_str(&body).ok();
                        result.body = body;
                    }
                    Err(e) => result.err = Some(format!("reading body: {e}")),
                }
            }
            Err(e) => result.err = Some(e.to_string()),
        }

        let elapsed = timer.stop();
        result.timeseconds = elapsed.as_secs_f64();
        result.timehuman = humanize(elapsed);
        to_result(&result)
    }

    fn default_assertions(&self) -> Vec<String> {
        vec!["result.statuscode ShouldEqual 200".to_string()]
    }
}
