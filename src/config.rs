//! Defines configurable parameters for the connection manager.
//! 定义了连接管理器的可配置参数。

use crate::error::{Error, Result};
use std::{fmt, str::FromStr, time::Duration};
use tokio_tungstenite::tungstenite::http::Uri;

/// A structure containing all configurable parameters for a manager.
///
/// 包含管理器所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// The remote endpoint the manager connects to.
    /// 管理器连接的远程端点。
    pub endpoint: Endpoint,

    /// Connection-related parameters.
    /// 连接相关参数。
    pub connection: ConnectionConfig,
}

impl Config {
    /// Returns a default configuration targeting the given endpoint.
    ///
    /// 返回指向给定端点的默认配置。
    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connection: ConnectionConfig::default(),
        }
    }
}

/// The URL scheme of an endpoint.
/// 端点的URL方案。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain WebSocket.
    Ws,
    /// WebSocket over TLS.
    Wss,
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Scheme::Ws => 80,
            Scheme::Wss => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Ws => f.write_str("ws"),
            Scheme::Wss => f.write_str("wss"),
        }
    }
}

/// The address of the remote endpoint.
///
/// 远程端点的地址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path including the leading `/` and any query string.
    /// 路径，包括开头的 `/` 以及查询字符串。
    pub path: String,
}

impl Endpoint {
    /// Creates an endpoint, normalizing the path to start with `/`.
    ///
    /// 创建一个端点，并将路径规范化为以 `/` 开头。
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            scheme,
            host: host.into(),
            port,
            path,
        }
    }

    /// Builds the URL passed to the transport.
    ///
    /// 构建传递给传输层的URL。
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(Scheme::Ws, "127.0.0.1", 8080, "/echo")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let uri: Uri = s
            .parse()
            .map_err(|e| Error::InvalidEndpoint(format!("{s}: {e}")))?;

        let scheme = match uri.scheme_str() {
            Some("ws") => Scheme::Ws,
            Some("wss") => Scheme::Wss,
            Some(other) => {
                return Err(Error::InvalidEndpoint(format!(
                    "{s}: unsupported scheme `{other}`"
                )));
            }
            None => return Err(Error::InvalidEndpoint(format!("{s}: missing scheme"))),
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidEndpoint(format!("{s}: missing host")))?;
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

        Ok(Self::new(scheme, host, port, path))
    }
}

/// Connection-related parameters.
///
/// 连接相关参数。
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound on a single connection attempt. `None` waits for the
    /// transport to resolve on its own.
    ///
    /// 单次连接尝试的时间上限。`None` 表示等待传输层自行结束。
    pub connect_timeout: Option<Duration>,
    /// Capacity of the lifecycle event broadcast channel. Subscribers that
    /// fall further behind than this lose the oldest events.
    ///
    /// 生命周期事件广播通道的容量。落后超过此值的订阅者会丢失最旧的事件。
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            event_capacity: 64,
        }
    }
}
