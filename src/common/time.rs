use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};

/// 全局统一的时间工具
pub struct TimeUtils;

impl TimeUtils {
    /// [标准] 获取当前 Unix 时间戳 (秒, 双精度)
    /// 全系统统一使用这个方法获取“现在”，方便未来 Mock 或做时钟偏移
    pub fn now_f64() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }

    /// 当前时间的 RFC3339 字符串 (毫秒精度, `Z` 结尾)
    ///
    /// 用于写进释义载荷的 `created_at`，与上游 JSON 的格式保持一致。
    pub fn now_rfc3339() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// 判断时间戳距今是否已超过 `threshold_ms`
    pub fn is_older_than(ts: f64, threshold_ms: u64, now: f64) -> bool {
        now - ts >= threshold_ms as f64 / 1000.0
    }
}
