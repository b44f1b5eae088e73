//! Gateway to external LLM providers.
//!
//! Every provider receives the same (system prompt, user prompt) pair.
//! [`build_request`] translates it into the provider's request shape and
//! [`extract_text`] pulls the generated text out of the response; the
//! gateway itself only moves bytes and never falls back.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use vulweb_core::config::LlmSettings;

use crate::error::GatewayError;

const ERNIE_TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";

/// Characters of a failed response body kept in the error message.
const BODY_PREVIEW_CHARS: usize = 200;

// =============================================================================
// Provider
// =============================================================================

/// Supported provider protocols.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    /// Alibaba DashScope.
    Qwen,
    /// Baidu Wenxin; needs a token exchange before each completion.
    Ernie,
    Zhipu,
    /// Any OpenAI-compatible endpoint.
    OpenAi,
}

impl Provider {
    /// Parse a provider id, ignoring case and surrounding whitespace.
    pub fn parse(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "qwen" => Some(Provider::Qwen),
            "ernie" => Some(Provider::Ernie),
            "zhipu" => Some(Provider::Zhipu),
            "openai" => Some(Provider::OpenAi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Qwen => "qwen",
            Provider::Ernie => "ernie",
            Provider::Zhipu => "zhipu",
            Provider::OpenAi => "openai",
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::Qwen => {
                "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation"
            }
            Provider::Ernie => {
                "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions"
            }
            Provider::Zhipu => "https://open.bigmodel.cn/api/paas/v4/chat/completions",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::Qwen => "qwen-turbo",
            Provider::Ernie => "ernie-bot",
            Provider::Zhipu => "glm-4",
            Provider::OpenAi => "gpt-3.5-turbo",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Request / response translation
// =============================================================================

/// A provider-shaped completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub url: String,
    /// Query parameters appended to `url`.
    pub query: Vec<(&'static str, String)>,
    pub bearer: Option<String>,
    pub body: Value,
}

/// Translate a prompt pair into `provider`'s request shape.
///
/// `access_token` is the result of the ERNIE token exchange and is ignored
/// by the other providers.
pub fn build_request(
    provider: Provider,
    config: &LlmSettings,
    system_prompt: &str,
    user_prompt: &str,
    access_token: Option<&str>,
) -> Result<ProviderRequest, GatewayError> {
    let endpoint = non_blank(&config.endpoint).unwrap_or(provider.default_endpoint());
    let model = non_blank(&config.model).unwrap_or(provider.default_model());
    let messages = json!([
        {"role": "system", "content": system_prompt},
        {"role": "user", "content": user_prompt},
    ]);

    let request = match provider {
        Provider::Qwen => ProviderRequest {
            url: endpoint.to_string(),
            query: vec![],
            bearer: Some(require(&config.api_key, "api_key")?.to_string()),
            body: json!({
                "model": model,
                "input": {"messages": messages},
                "parameters": {"result_format": "message"},
            }),
        },
        Provider::Ernie => {
            let token = access_token.ok_or_else(|| {
                GatewayError::Config("ERNIE request built without an access token".to_string())
            })?;
            ProviderRequest {
                url: endpoint.to_string(),
                query: vec![("access_token", token.to_string())],
                bearer: None,
                // No system role on this API; the prompts are concatenated.
                body: json!({
                    "messages": [
                        {"role": "user", "content": format!("{}\n\n{}", system_prompt, user_prompt)},
                    ],
                }),
            }
        }
        Provider::Zhipu => ProviderRequest {
            url: endpoint.to_string(),
            query: vec![],
            bearer: Some(require(&config.api_key, "api_key")?.to_string()),
            body: json!({"model": model, "messages": messages}),
        },
        Provider::OpenAi => {
            let base = endpoint.trim_end_matches('/');
            let url = if base.ends_with("/chat/completions") {
                base.to_string()
            } else {
                format!("{}/chat/completions", base)
            };
            ProviderRequest {
                url,
                query: vec![],
                bearer: Some(require(&config.api_key, "api_key")?.to_string()),
                body: json!({"model": model, "messages": messages}),
            }
        }
    };
    Ok(request)
}

/// Pull the generated text out of `provider`'s response body.
pub fn extract_text(provider: Provider, body: &Value) -> Result<String, GatewayError> {
    let pointer = match provider {
        Provider::Qwen => "/output/choices/0/message/content",
        Provider::Ernie => "/result",
        Provider::Zhipu | Provider::OpenAi => "/choices/0/message/content",
    };
    if let Some(text) = body.pointer(pointer).and_then(Value::as_str) {
        return Ok(text.to_string());
    }

    // Some providers report failures inside a 200 response.
    let reason = ["/error_msg", "/message", "/error/message"]
        .iter()
        .find_map(|p| body.pointer(p).and_then(Value::as_str))
        .unwrap_or("missing generated text");
    Err(GatewayError::Provider(format!(
        "unexpected {} response: {}",
        provider, reason
    )))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn require<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, GatewayError> {
    non_blank(value).ok_or_else(|| GatewayError::Config(format!("missing {}", field)))
}

// =============================================================================
// LlmGateway
// =============================================================================

/// Sends completion requests over one shared HTTP client.
#[derive(Debug, Clone)]
pub struct LlmGateway {
    client: Client,
    ernie_token_url: String,
}

impl LlmGateway {
    pub fn new() -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| GatewayError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            ernie_token_url: ERNIE_TOKEN_URL.to_string(),
        })
    }

    /// Override the ERNIE OAuth endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.ernie_token_url = url.into();
        self
    }

    /// Run one completion. Every call is bounded by `config.timeout_secs`.
    pub async fn complete(
        &self,
        config: &LlmSettings,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GatewayError> {
        let provider = Provider::parse(&config.provider).ok_or_else(|| {
            GatewayError::Config(format!("unsupported LLM provider: {}", config.provider))
        })?;
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let access_token = match provider {
            Provider::Ernie => Some(self.ernie_access_token(config, timeout).await?),
            _ => None,
        };
        let request = build_request(
            provider,
            config,
            system_prompt,
            user_prompt,
            access_token.as_deref(),
        )?;

        info!(
            provider = %provider,
            endpoint = %request.url,
            prompt_len = user_prompt.len(),
            "Sending LLM request"
        );

        let mut builder = self
            .client
            .post(&request.url)
            .timeout(timeout)
            .query(&request.query)
            .json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let body = send_json(builder, &request.url).await?;
        let text = extract_text(provider, &body)?;
        debug!(provider = %provider, chars = text.chars().count(), "LLM response received");
        Ok(text)
    }

    async fn ernie_access_token(
        &self,
        config: &LlmSettings,
        timeout: Duration,
    ) -> Result<String, GatewayError> {
        let api_key = require(&config.api_key, "api_key")?;
        let secret_key = require(&config.secret_key, "secret_key")?;

        let builder = self.client.get(&self.ernie_token_url).timeout(timeout).query(&[
            ("grant_type", "client_credentials"),
            ("client_id", api_key),
            ("client_secret", secret_key),
        ]);
        let body = send_json(builder, &self.ernie_token_url).await?;

        match body.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => {
                let reason = body
                    .get("error_description")
                    .and_then(Value::as_str)
                    .unwrap_or("no access_token in response");
                Err(GatewayError::Provider(format!("ERNIE token exchange failed: {}", reason)))
            }
        }
    }
}

/// Send `builder` and parse the body as JSON.
///
/// Non-2xx statuses and HTML pages (gateways and proxies serve these with
/// any status) are provider errors carrying a short body preview.
async fn send_json(builder: reqwest::RequestBuilder, endpoint: &str) -> Result<Value, GatewayError> {
    let response = builder.send().await.map_err(|e| {
        let err = GatewayError::from(e);
        warn!(endpoint = %endpoint, error = %err, "LLM request failed");
        err
    })?;

    let status = response.status();
    let body = response.text().await?;
    let preview: String = body.trim().chars().take(BODY_PREVIEW_CHARS).collect();

    if !status.is_success() {
        return Err(GatewayError::Provider(format!(
            "HTTP {} from {}: {}",
            status, endpoint, preview
        )));
    }
    if body.trim_start().starts_with('<') {
        return Err(GatewayError::Provider(format!(
            "{} returned HTML instead of JSON (HTTP {}): {}",
            endpoint, status, preview
        )));
    }
    serde_json::from_str(&body).map_err(|e| {
        GatewayError::Provider(format!("invalid JSON from {}: {}: {}", endpoint, e, preview))
    })
}

// =============================================================================
// Test server
// =============================================================================

/// Minimal HTTP/1.1 server answering each connection with the next canned
/// response, recording the raw requests it received.
#[cfg(test)]
pub(crate) mod stub {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub struct StubServer {
        pub base_url: String,
        pub requests: Arc<Mutex<Vec<String>>>,
    }

    pub async fn serve(responses: Vec<(u16, &'static str, String)>) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            for (status, content_type, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let raw = read_request(&mut socket).await;
                recorded.lock().unwrap().push(raw);
                let reply = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    content_type,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        StubServer { base_url, requests }
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
