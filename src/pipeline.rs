//! Request pipeline for a single bridge.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, info};
use reqwest::Method;
use serde_json::{Value, json};

use crate::cache::ResponseCache;
use crate::config::BridgeConfig;
use crate::envelope;
use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::payload::LightState;
use crate::resource::ResourceType;
use crate::retry::{self, RetryPolicy};
use crate::runtime::Mutex;

type Result<T> = std::result::Result<T, Error>;

/// One logical request, shared by every retry attempt.
struct Exchange<'a> {
    method: Method,
    url: String,
    label: String,
    body: Option<&'a Value>,
}

/// Turns logical resource calls into retried, cached HTTP exchanges with one bridge.
///
/// A pipeline starts **unregistered** unless it is given a token. Every
/// [`send`](RequestPipeline::send) needs a token; [`register`](RequestPipeline::register)
/// obtains one from the bridge.
///
/// GET requests are answered from the [`ResponseCache`] when possible. Writes
/// bypass the cache and, once the bridge accepts them, invalidate the cached
/// reads of the resource type they touched.
///
/// # Example
///
/// ```
/// use hue_bridge_rs::{BridgeConfig, CacheBackendKind, RequestPipeline};
///
/// let config = BridgeConfig::default().with_cache_backend(CacheBackendKind::Memory);
/// let pipeline = RequestPipeline::new("192.168.1.20", None, &config).unwrap();
/// assert!(!pipeline.is_registered());
/// assert_eq!(pipeline.base_url(), "https://192.168.1.20");
/// ```
pub struct RequestPipeline {
    address: String,
    base_url: String,
    token: RwLock<Option<String>>,
    client: reqwest::Client,
    retry: RetryPolicy,
    cache: Option<Arc<ResponseCache>>,
    history: Arc<Mutex<MessageHistory>>,
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("address", &self.address)
            .field("registered", &self.is_registered())
            .field("retry", &self.retry)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    pub const MAX_APP_NAME_LEN: usize = 20;
    pub const MAX_DEVICE_NAME_LEN: usize = 19;

    /// Build a pipeline with its own cache, as selected by `config`.
    ///
    /// `address` is a host (`192.168.1.20`, served over HTTPS) or a base URL
    /// with an explicit scheme.
    pub fn new(address: &str, token: Option<&str>, config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let cache = if config.cache_enabled {
            Some(Arc::new(ResponseCache::from_kind(&config.cache_backend)?))
        } else {
            None
        };
        Self::with_cache(address, token, config, cache)
    }

    /// Build a pipeline on an existing cache, e.g. one shared by a pool.
    ///
    /// `config.cache_enabled == false` disables caching even when a cache is given.
    pub fn with_cache(
        address: &str,
        token: Option<&str>,
        config: &BridgeConfig,
        cache: Option<Arc<ResponseCache>>,
    ) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        Ok(RequestPipeline {
            address: address.to_string(),
            base_url: base_url(address),
            token: RwLock::new(token.filter(|t| !t.is_empty()).map(String::from)),
            client,
            retry: RetryPolicy::from_config(config),
            cache: cache.filter(|_| config.cache_enabled),
            history: Arc::new(Mutex::new(MessageHistory::new())),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.token().is_some()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub async fn history(&self) -> MessageHistory {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Register an application with the bridge and keep the issued token.
    ///
    /// The bridge only accepts registration shortly after its link button was
    /// pressed; otherwise this fails with [`Error::LinkButtonPending`] and
    /// the caller should prompt for the button and call `register` again.
    /// That failure is not retried. The previous token stays in place until a
    /// new one has been issued.
    pub async fn register(&self, app_name: &str, device_name: &str) -> Result<String> {
        let device_type = device_type(app_name, device_name)?;
        let body = json!({ "devicetype": device_type });
        let exchange = Exchange {
            method: Method::POST,
            url: format!("{}/api", self.base_url),
            label: "POST api".to_string(),
            body: Some(&body),
        };

        let reply = self.fetch(&exchange).await?;
        let username = envelope::success_field(&reply, "username")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::protocol(0, "/", "registration reply carried no username"))?
            .to_string();

        match self.token.write() {
            Ok(mut token) => *token = Some(username.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(username.clone()),
        }
        info!("registered {} with bridge {}", device_type, self.address);
        Ok(username)
    }

    /// Execute one logical request against `path` (relative to `/api/{token}/`).
    ///
    /// GETs are read through the cache. Other methods go straight to the
    /// bridge and invalidate the cached reads they could have made stale.
    /// Transport failures and busy replies are retried; authentication and
    /// bridge-reported errors are returned on first occurrence.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let Some(token) = self.token() else {
            return Err(Error::authentication(
                &self.address,
                "no auth token; register first",
            ));
        };

        let path = path.trim_start_matches('/');
        let resource_type = ResourceType::from_path(path);
        let exchange = Exchange {
            url: format!("{}/api/{}/{}", self.base_url, token, path),
            label: format!("{} {}", method, path),
            method,
            body,
        };

        if exchange.method != Method::GET {
            let value = self.fetch(&exchange).await?;
            self.invalidate_after_write(&resource_type);
            return Ok(value);
        }

        let Some(cache) = &self.cache else {
            return self.fetch(&exchange).await;
        };

        let key = self.cache_key(&exchange.method, path, body);
        let produced = AtomicBool::new(false);
        let (exchange, produced_ref) = (&exchange, &produced);
        let value = cache
            .get_or_insert_with(&resource_type, &key, move || {
                produced_ref.store(true, Ordering::Relaxed);
                self.fetch(exchange)
            })
            .await?;

        if !produced.load(Ordering::Relaxed) {
            self.history
                .lock()
                .await
                .record(MessageType::CacheHit, &exchange.label, &value);
        }
        Ok(value)
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, path, None).await
    }

    /// Apply a state change to one light.
    pub async fn set_light_state(&self, light_id: &str, state: &LightState) -> Result<Value> {
        self.put_state(&format!("lights/{}/state", light_id), state)
            .await
    }

    /// Apply a state change to every light of a group.
    pub async fn set_group_state(&self, group_id: &str, state: &LightState) -> Result<Value> {
        self.put_state(&format!("groups/{}/action", group_id), state)
            .await
    }

    /// One uncached, unretried config read, used as a liveness check.
    ///
    /// Unregistered pipelines read the bridge's public `/api/config`.
    pub async fn probe(&self) -> Result<Value> {
        let url = match self.token() {
            Some(token) => format!("{}/api/{}/config", self.base_url, token),
            None => format!("{}/api/config", self.base_url),
        };
        let exchange = Exchange {
            method: Method::GET,
            url,
            label: "GET config".to_string(),
            body: None,
        };
        let reply = self.wire_call(&exchange).await?;
        envelope::check(&self.address, reply)
    }

    /// Returns diagnostics including registration, cache and history state.
    pub async fn diagnostics(&self) -> Value {
        let summary = self.history.lock().await.summary();
        let delays_ms: Vec<u64> = self
            .retry
            .delays()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        let cache = self.cache.as_ref().map(|c| c.stats());

        json!({
            "address": self.address,
            "base_url": self.base_url,
            "registered": self.is_registered(),
            "retry": {
                "max_retries": self.retry.max_retries(),
                "delays_ms": delays_ms,
            },
            "cache": cache,
            "history": summary,
        })
    }

    async fn put_state(&self, path: &str, state: &LightState) -> Result<Value> {
        if !state.is_valid() {
            return Err(Error::NoAttribute);
        }
        let body = serde_json::to_value(state).map_err(Error::JsonDump)?;
        self.put(path, &body).await
    }

    /// Retried wire call followed by an envelope check.
    async fn fetch(&self, exchange: &Exchange<'_>) -> Result<Value> {
        let reply = self
            .retry
            .execute(&exchange.label, move || self.wire_call(exchange))
            .await?;
        envelope::check(&self.address, reply)
    }

    async fn wire_call(&self, exchange: &Exchange<'_>) -> Result<Value> {
        let request = exchange.body.cloned().unwrap_or(Value::Null);
        self.history
            .lock()
            .await
            .record(MessageType::Request, &exchange.label, &request);

        let result = self.wire_call_inner(exchange).await;

        let mut history = self.history.lock().await;
        match &result {
            Ok(reply) => history.record(MessageType::Response, &exchange.label, reply),
            Err(e) => history.record_error(&e.to_string()),
        }
        result
    }

    async fn wire_call_inner(&self, exchange: &Exchange<'_>) -> Result<Value> {
        debug!("{} -> {}", exchange.label, self.address);

        let mut request = self
            .client
            .request(exchange.method.clone(), &exchange.url);
        if let Some(body) = exchange.body {
            request = request.json(body);
        }

        // Drop URLs from transport errors; they carry the auth token.
        let response = request
            .send()
            .await
            .map_err(|e| Error::transport("send", e.without_url()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::transport("receive", e.without_url()))?;

        debug!("{} <- {} status {}", exchange.label, self.address, status);
        if !(200..300).contains(&status) {
            return Err(status_error(&self.address, status, text));
        }
        serde_json::from_str(&text).map_err(Error::JsonLoad)
    }

    fn cache_key(&self, method: &Method, path: &str, body: Option<&Value>) -> String {
        match body {
            Some(body) => format!("{} {} {} {}", self.address, method, path, body),
            None => format!("{} {} {}", self.address, method, path),
        }
    }

    fn invalidate_after_write(&self, resource_type: &ResourceType) {
        let Some(cache) = &self.cache else {
            return;
        };
        cache.invalidate(resource_type);
        // Group actions change the state of member lights.
        if *resource_type == ResourceType::Groups {
            cache.invalidate(&ResourceType::Lights);
        }
    }
}

fn base_url(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    }
}

fn device_type(app_name: &str, device_name: &str) -> Result<String> {
    let device_type = format!("{}#{}", app_name, device_name);
    let app_len = app_name.chars().count();
    let device_len = device_name.chars().count();
    if app_len == 0
        || device_len == 0
        || app_len > RequestPipeline::MAX_APP_NAME_LEN
        || device_len > RequestPipeline::MAX_DEVICE_NAME_LEN
        || app_name.contains('#')
    {
        return Err(Error::InvalidDeviceType(device_type));
    }
    Ok(device_type)
}

fn status_error(address: &str, status: u16, body: String) -> Error {
    match status {
        401 | 403 => Error::authentication(address, &format!("http status {}", status)),
        s if retry::is_busy_status(s) => Error::ServerBusy { status, body },
        _ => Error::HttpStatus { status, body },
    }
}
