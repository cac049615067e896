use rand::Rng;
use std::collections::{BTreeSet, HashMap, HashSet};

/// 计算候选集
///
/// 从全部单词里去掉排除词；剩下的数量不少于 `max(min_candidates, min_ratio × 总数)`
/// 时使用剩下的，否则放弃排除、退回全部单词。
/// 结果按字典序排列并去重，保证同一输入得到同一顺序。
pub fn candidate_set<'a>(
    all: &'a [String],
    exclude: &[String],
    min_candidates: usize,
    min_ratio: f64,
) -> Vec<&'a str> {
    let all: BTreeSet<&str> = all.iter().map(String::as_str).collect();
    let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();

    let remaining: Vec<&str> = all
        .iter()
        .copied()
        .filter(|w| !excluded.contains(w))
        .collect();

    let threshold = (min_candidates as f64).max(min_ratio * all.len() as f64);
    if remaining.len() as f64 >= threshold {
        remaining
    } else {
        all.into_iter().collect()
    }
}

/// 负数、NaN、无穷大一律按 0 处理
fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// 按权重抽取一个候选
///
/// 在 `[0, total)` 上均匀取一个点，按候选顺序累加权重，
/// 第一个累加值超过该点的候选被选中。总权重为 0 时退化为均匀抽取。
pub fn pick_weighted<'a, R>(
    candidates: &[&'a str],
    weights: &HashMap<String, f64>,
    default_weight: f64,
    rng: &mut R,
) -> Option<&'a str>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }

    let resolved: Vec<f64> = candidates
        .iter()
        .map(|w| effective_weight(weights.get(*w).copied().unwrap_or(default_weight)))
        .collect();
    let total: f64 = resolved.iter().sum();

    if !(total.is_finite() && total > 0.0) {
        return Some(candidates[rng.random_range(0..candidates.len())]);
    }

    let draw = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (word, weight) in candidates.iter().zip(&resolved) {
        cumulative += weight;
        if cumulative > draw {
            return Some(*word);
        }
    }

    // 浮点累加误差：落到最后一个有权重的候选上
    candidates
        .iter()
        .zip(&resolved)
        .rev()
        .find(|(_, w)| **w > 0.0)
        .map(|(word, _)| *word)
}
