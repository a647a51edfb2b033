//! Text-completion backends.
//!
//! Every backend takes a prompt and returns free text that is expected to
//! contain a JSON object. Two HTTP providers are supported, plus a local
//! command that receives the prompt on stdin so any CLI model wrapper can be
//! plugged in.
use crate::config::ProviderKind;
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const OPENAI_SYSTEM_PROMPT: &str =
    "You are a data extraction assistant. Extract restaurant information and return only valid JSON.";
const OPENAI_TEMPERATURE: f64 = 0.3;

/// Failure of a single completion call, including parsing its text.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion backend misconfigured: {0}")]
    Config(String),
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion API returned HTTP {0}")]
    Status(u16),
    #[error("completion command failed: {0}")]
    Command(String),
    #[error("completion response has unexpected shape: {0}")]
    Envelope(String),
    #[error("completion response is empty")]
    EmptyResponse,
    #[error("no JSON object in completion response: {preview}")]
    NoJsonObject { preview: String },
}

/// Anything that turns a prompt into free-form text.
pub trait CompletionService {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Fully resolved settings for one backend. Built at the CLI boundary so no
/// backend reads the environment itself.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub lm_command: Option<String>,
    pub request_timeout: Duration,
}

/// Construct the backend described by `config`.
pub fn build_service(config: &ProviderConfig) -> Result<Box<dyn CompletionService>, CompletionError> {
    match config.kind {
        ProviderKind::Gemini => Ok(Box::new(GeminiClient::new(config)?)),
        ProviderKind::Openai => Ok(Box::new(OpenAiClient::new(config)?)),
        ProviderKind::Command => Ok(Box::new(CommandClient::new(config)?)),
    }
}

fn require_api_key(config: &ProviderConfig, var: &str) -> Result<String, CompletionError> {
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Config(format!("{var} is not set")))
}

fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn map_http_error(err: ureq::Error) -> CompletionError {
    match err {
        ureq::Error::StatusCode(code) => CompletionError::Status(code),
        other => CompletionError::Transport(other.to_string()),
    }
}

fn post_json(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(&str, String)],
    body: &Value,
) -> Result<Value, CompletionError> {
    let start = Instant::now();
    let mut request = agent.post(url).header("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }
    let mut response = request.send_json(body).map_err(map_http_error)?;
    let payload: Value = response
        .body_mut()
        .read_json()
        .map_err(|err| CompletionError::Envelope(err.to_string()))?;
    tracing::debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        url,
        "completion http round trip"
    );
    Ok(payload)
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, CompletionError> {
        Ok(Self {
            agent: http_agent(config.request_timeout),
            api_key: require_api_key(config, "GEMINI_API_KEY")?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
        })
    }
}

impl CompletionService for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let payload = post_json(
            &self.agent,
            &url,
            &[("x-goog-api-key", self.api_key.clone())],
            &body,
        )?;
        gemini_text(&payload)
    }
}

fn gemini_text(payload: &Value) -> Result<String, CompletionError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| CompletionError::Envelope("missing candidates[0].content.parts".into()))?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    Ok(text.trim().to_string())
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, CompletionError> {
        Ok(Self {
            agent: http_agent(config.request_timeout),
            api_key: require_api_key(config, "OPENAI_API_KEY")?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        })
    }
}

impl CompletionService for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": OPENAI_SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": OPENAI_TEMPERATURE
        });
        let payload = post_json(
            &self.agent,
            &url,
            &[("Authorization", format!("Bearer {}", self.api_key))],
            &body,
        )?;
        openai_text(&payload)
    }
}

fn openai_text(payload: &Value) -> Result<String, CompletionError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| CompletionError::Envelope("missing choices[0].message.content".into()))
}

/// Runs a user-configured command with the prompt on stdin and returns its
/// stdout.
pub struct CommandClient {
    argv: Vec<String>,
}

impl CommandClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, CompletionError> {
        let command = config
            .lm_command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .ok_or_else(|| CompletionError::Config("MATJIP_LM_COMMAND is not set".into()))?;
        Self::from_command_line(command)
    }

    pub fn from_command_line(command: &str) -> Result<Self, CompletionError> {
        let argv = shell_words::split(command)
            .map_err(|err| CompletionError::Config(format!("parse LM command {command:?}: {err}")))?;
        let Some(program) = argv.first() else {
            return Err(CompletionError::Config("LM command is empty".into()));
        };
        which::which(program)
            .map_err(|err| CompletionError::Config(format!("LM command {program:?}: {err}")))?;
        Ok(Self { argv })
    }
}

impl CompletionService for CommandClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        run_with_stdin(&self.argv, prompt).map_err(CompletionError::Command)
    }
}

/// Spawn `argv`, write `input` to its stdin and collect stdout as UTF-8.
pub(crate) fn run_with_stdin(argv: &[String], input: &str) -> Result<String, String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| "command is empty".to_string())?;
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| format!("spawn {program}: {err}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|err| format!("write stdin of {program}: {err}"))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|err| format!("wait for {program}: {err}"))?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        input_bytes = input.len(),
        output_bytes = output.stdout.len(),
        "command invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    String::from_utf8(output.stdout).map_err(|err| format!("decode stdout of {program}: {err}"))
}
