//! 远端 MRA v2 事件 API 的拉取接口与 HTTP 实现。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use mra_core::{Credential, Event, EventTypes, ProxySettings, StreamCursor};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::FetchError;

const TOKEN_PATH: &str = "/oauth2/token";
const EVENTS_PATH: &str = "/mra/stream/v2/events";
const TOKEN_REFRESH_MARGIN: TimeDelta = TimeDelta::seconds(60);

/// 一页有序事件以及远端返回的最新位置。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPage {
    pub events: Vec<Event>,
    /// 该页最后一条事件之后的位置；远端未给出时为 `None`。
    pub position: Option<u64>,
}

/// Supervisor 拉取事件的唯一入口。
///
/// # 契约 (What)
/// - 按 `cursor` 指定的续传坐标与 `event_types` 过滤返回下一页；
/// - 失败以 [`FetchError`] 返回，调用方依据其分类决定退避或停止；
/// - 实现方不得在内部无限重试，退避节奏由 Supervisor 统一掌控。
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    async fn fetch_page(
        &self,
        cursor: &StreamCursor,
        event_types: &EventTypes,
    ) -> Result<EventPage, FetchError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// 毫秒时间戳。
    #[serde(default)]
    expires_at: Option<i64>,
}

/// 事件逐条解码：单条非对象元素只丢弃该条，不拖垮整页。
#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    events: Vec<serde_json::Value>,
    #[serde(default)]
    position: Option<u64>,
}

impl PageResponse {
    fn into_page(self, endpoint: &str) -> EventPage {
        let total = self.events.len();
        let events: Vec<Event> = self
            .events
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| {
                let kind = json_kind(&value);
                let event = Event::from_value(value);
                if event.is_none() {
                    tracing::warn!(
                        endpoint = %endpoint,
                        index,
                        found = kind,
                        "dropping malformed event from page"
                    );
                }
                event
            })
            .collect();
        if events.len() < total {
            tracing::debug!(
                endpoint = %endpoint,
                kept = events.len(),
                dropped = total - events.len(),
                "page contained malformed events"
            );
        }
        EventPage {
            events,
            position: self.position,
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug)]
struct AccessToken {
    value: String,
    refresh_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn from_response(response: TokenResponse) -> Self {
        let refresh_at = response
            .expires_at
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(|expiry| expiry - TOKEN_REFRESH_MARGIN);
        Self {
            value: response.access_token,
            refresh_at,
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_at.is_none_or(|refresh_at| now < refresh_at)
    }
}

/// 基于 `reqwest` 的 MRA v2 客户端。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// - 先以 API key 换取访问令牌并缓存，到期前 60 秒主动刷新；
/// - 事件端点返回 401 时作废缓存令牌并重试一次，仍为 401 则视为永久失败；
/// - HTTP 状态码分类：429 与 5xx 可重试，其余 4xx 永久失败；连接、超时与响应体错误可重试。
///
/// ## 注意事项 (Trade-offs)
/// - 令牌缓存位于 `tokio::sync::Mutex` 内，刷新期间并发请求会等待同一次刷新；
///   Supervisor 本身串行拉取，锁竞争可以忽略。
pub struct MraApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Credential,
    token: Mutex<Option<AccessToken>>,
}

impl MraApiClient {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(
        api_domain: &str,
        api_key: Credential,
        proxy: Option<&ProxySettings>,
    ) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("mrav2-syslog-connector/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }
        let http = builder.build().map_err(|err| FetchError::Configuration {
            detail: format!("http client: {err}"),
        })?;
        Ok(Self {
            http,
            base_url: base_url(api_domain),
            api_key,
            token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn access_token(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }
        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        self.token.lock().await.take();
    }

    async fn request_token(&self) -> Result<AccessToken, FetchError> {
        let endpoint = format!("{}{TOKEN_PATH}", self.base_url);
        tracing::debug!(endpoint = %endpoint, "requesting access token");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(self.api_key.expose())
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|err| network_error(&endpoint, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&endpoint, status));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| decode_error(&endpoint, err))?;
        Ok(AccessToken::from_response(body))
    }

    async fn get_page(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> Result<reqwest::Response, FetchError> {
        let token = self.access_token().await?;
        self.http
            .get(endpoint)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|err| network_error(endpoint, err))
    }
}

#[async_trait]
impl EventSource for MraApiClient {
    async fn fetch_page(
        &self,
        cursor: &StreamCursor,
        event_types: &EventTypes,
    ) -> Result<EventPage, FetchError> {
        let endpoint = format!("{}{EVENTS_PATH}", self.base_url);
        let query = page_query(cursor, event_types);

        let mut response = self.get_page(&endpoint, &query).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!(endpoint = %endpoint, "access token rejected, refreshing once");
            self.invalidate_token().await;
            response = self.get_page(&endpoint, &query).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&endpoint, status));
        }
        let page: PageResponse = response
            .json()
            .await
            .map_err(|err| decode_error(&endpoint, err))?;
        Ok(page.into_page(&endpoint))
    }
}

fn build_proxy(settings: &ProxySettings) -> Result<reqwest::Proxy, FetchError> {
    let mut proxy =
        reqwest::Proxy::all(settings.address.as_str()).map_err(|err| FetchError::Configuration {
            detail: format!("proxy `{}`: {err}", settings.address),
        })?;
    if let Some(username) = settings.username.as_deref() {
        proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or_default());
    }
    Ok(proxy)
}

/// 允许配置裸域名或带协议的完整地址。
fn base_url(api_domain: &str) -> String {
    let trimmed = api_domain.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

fn page_query(cursor: &StreamCursor, event_types: &EventTypes) -> Vec<(&'static str, String)> {
    let mut query = vec![("types", event_types.to_query())];
    match cursor {
        StreamCursor::Position(position) => query.push(("last_event_id", position.to_string())),
        StreamCursor::StartTime(start) => query.push((
            "start_time",
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
        )),
    }
    query
}

fn classify_status(endpoint: &str, status: StatusCode) -> FetchError {
    let endpoint = endpoint.to_owned();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized {
            endpoint,
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { endpoint },
        _ => FetchError::Status {
            endpoint,
            status: status.as_u16(),
        },
    }
}

fn network_error(endpoint: &str, error: reqwest::Error) -> FetchError {
    FetchError::Network {
        endpoint: endpoint.to_owned(),
        detail: error.to_string(),
    }
}

fn decode_error(endpoint: &str, error: reqwest::Error) -> FetchError {
    FetchError::Decode {
        endpoint: endpoint.to_owned(),
        detail: error.to_string(),
    }
}
