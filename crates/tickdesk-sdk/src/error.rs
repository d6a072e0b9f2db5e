use std::fmt;

#[derive(Debug)]
pub enum TickdeskSDKError {
    /// 网络层错误（连接失败、DNS 失败等）
    Transport(String),
    /// 请求超时（保存操作默认 5 秒取消）
    Timeout(String),
    /// HTTP 非 2xx 响应
    Http(u16, String),
    /// 认证失败（token 无效/过期，强制重新登录）
    Auth(String),
    /// 服务端显式返回 success:false
    ServerRejected(String),
    /// 本地校验失败（必填字段缺失等，不会发起请求）
    InvalidInput(String),
    KvStore(String),
    Serialization(String),
    IO(String),
    Config(String),
    NotInitialized(String),
    Other(String),
}

impl fmt::Display for TickdeskSDKError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickdeskSDKError::Transport(e) => write!(f, "Transport error: {}", e),
            TickdeskSDKError::Timeout(e) => write!(f, "Timeout: {}", e),
            TickdeskSDKError::Http(status, e) => write!(f, "HTTP error [{}]: {}", status, e),
            TickdeskSDKError::Auth(e) => write!(f, "Authentication error: {}", e),
            TickdeskSDKError::ServerRejected(e) => write!(f, "Server rejected: {}", e),
            TickdeskSDKError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            TickdeskSDKError::KvStore(e) => write!(f, "KV store error: {}", e),
            TickdeskSDKError::Serialization(e) => write!(f, "Serialization error: {}", e),
            TickdeskSDKError::IO(e) => write!(f, "IO error: {}", e),
            TickdeskSDKError::Config(e) => write!(f, "Config error: {}", e),
            TickdeskSDKError::NotInitialized(e) => write!(f, "Not initialized: {}", e),
            TickdeskSDKError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl std::error::Error for TickdeskSDKError {}

impl From<serde_json::Error> for TickdeskSDKError {
    fn from(error: serde_json::Error) -> Self {
        TickdeskSDKError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for TickdeskSDKError {
    fn from(error: std::io::Error) -> Self {
        TickdeskSDKError::IO(error.to_string())
    }
}

impl TickdeskSDKError {
    /// 判断是否是认证类错误（需要重新登录）
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, TickdeskSDKError::Auth(_)) || matches!(self, TickdeskSDKError::Http(401, _))
    }

    /// 判断是否是网络类错误（可降级到本地缓存）
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            TickdeskSDKError::Transport(_) | TickdeskSDKError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TickdeskSDKError>;
