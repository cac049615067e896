use serde::{Deserialize, Serialize};
use std::fmt;

/// 存储层失败码 (信封中的机器可读 code)
///
/// 远端通用存储对所有操作都返回统一信封 `{ code, message }`，
/// 这里把非 OK 的 code 收敛成一个封闭枚举。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreCode {
    /// 记录不存在
    NotFound,
    /// 唯一键冲突
    Conflict,
    /// 查询条件或请求体被拒绝
    QueryError,
    /// 鉴权失败
    AuthError,
    /// 网络、超时、服务不可用
    Unavailable,
    /// 数据存在但无法解析
    Corrupted,
}

impl StoreCode {
    /// 是否是暂时性故障
    pub fn is_transient(self) -> bool {
        matches!(self, StoreCode::Unavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreCode::NotFound => "NOT_FOUND",
            StoreCode::Conflict => "CONFLICT",
            StoreCode::QueryError => "QUERY_ERROR",
            StoreCode::AuthError => "AUTH_ERROR",
            StoreCode::Unavailable => "UNAVAILABLE",
            StoreCode::Corrupted => "CORRUPTED",
        }
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
