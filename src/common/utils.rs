use nanoid::nanoid;
use rand::Rng;
use std::time::Duration;

// ==========================================
// 1. ID 生成工具 (Identity Utilities)
// ==========================================

const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
    'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// 生成任务 ID (NanoID)
///
/// - 字符集: A-Za-z0-9 (不含 - 和 _，双击即可选中)
/// - 长度: 12，个人词库规模下碰撞概率可以忽略
#[inline]
pub fn new_task_id() -> String {
    nanoid!(12, &ALPHABET)
}

// ==========================================
// 2. 算法工具 (Algorithmic Utilities)
// ==========================================

/// 计算指数退避时间 (Exponential Backoff with Jitter)
///
/// - attempt: 当前重试次数 (1, 2, 3...)
/// - base_delay: 基础延迟秒数 (例如 0.2s)
/// - max_delay: 最大延迟秒数
pub fn calculate_backoff(attempt: u32, base_delay: f64, max_delay: f64) -> Duration {
    let mut rng = rand::rng();

    // 1. 指数部分: base * 2^(attempt-1)
    let exponent = 2u32.saturating_pow(attempt.saturating_sub(1));
    let backoff = (base_delay * exponent as f64).min(max_delay);

    // 2. Full Jitter: [0, backoff]
    let jittered = if backoff > 0.0 {
        rng.random_range(0.0..=backoff)
    } else {
        0.0
    };

    // 3. 至少 10ms
    Duration::from_secs_f64(jittered.max(0.01))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_short_and_distinct() {
        let a = new_task_id();
        let b = new_task_id();
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn backoff_is_capped() {
        for attempt in 1..20 {
            let d = calculate_backoff(attempt, 0.2, 2.0);
            assert!(d <= Duration::from_secs_f64(2.0));
            assert!(d >= Duration::from_millis(10));
        }
    }
}
