use tokio::time::Instant;

/// 等待决策
///
/// 策略层交给巡检循环 (Pacemaker) 的下一步动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDecision {
    /// 立即开始下一轮巡检
    Immediate,

    /// 让出一次执行权后再巡检 (`yield_now`)
    Yield,

    /// 睡到指定时间点，期间忽略 `kick`
    WaitUntil(Instant),

    /// 睡到指定时间点，但 `kick` 可以提前唤醒
    WaitForNotification(Instant),

    /// 只等 `kick` 或关闭信号
    WaitIndefinitely,
}

/// 等待策略上下文
#[derive(Debug, Clone)]
pub struct WaitContext {
    /// 连续空转次数
    ///
    /// 0 表示上一轮巡检找到了需要恢复的任务；
    /// 每多一轮什么也没找到就加 1。
    pub idle_count: u32,

    /// 单调时钟的当前时间，用于计算截止时间
    pub now_instant: Instant,
}

impl WaitContext {
    pub fn new(idle_count: u32, now_instant: Instant) -> Self {
        Self {
            idle_count,
            now_instant,
        }
    }
}

/// 等待策略接口
pub trait WaitStrategy: Send + Sync + 'static {
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision;
}

/// 组合策略链
///
/// 逐个询问链上的策略，并把它们的决策合并成最保守的那一个。
#[derive(Default)]
pub struct WaitStrategyChain {
    strategies: Vec<Box<dyn WaitStrategy>>,
}

impl WaitStrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: WaitStrategy>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// 合并两个决策
    ///
    /// 优先级 (由高到低): WaitIndefinitely > 带截止时间 (取较晚者，
    /// 任一方为 WaitUntil 则结果为 WaitUntil) > Yield > Immediate
    fn merge(a: WaitDecision, b: WaitDecision) -> WaitDecision {
        use WaitDecision::*;

        if matches!(a, WaitIndefinitely) || matches!(b, WaitIndefinitely) {
            return WaitIndefinitely;
        }

        let deadline = |d: WaitDecision| match d {
            WaitUntil(t) | WaitForNotification(t) => Some(t),
            _ => None,
        };

        match (deadline(a), deadline(b)) {
            (Some(ta), Some(tb)) => {
                let latest = ta.max(tb);
                if matches!(a, WaitUntil(_)) || matches!(b, WaitUntil(_)) {
                    WaitUntil(latest)
                } else {
                    WaitForNotification(latest)
                }
            }
            (Some(_), None) => a,
            (None, Some(_)) => b,
            (None, None) if matches!(a, Yield) || matches!(b, Yield) => Yield,
            (None, None) => Immediate,
        }
    }
}

impl WaitStrategy for WaitStrategyChain {
    fn make_decision(&self, ctx: &WaitContext) -> WaitDecision {
        self.strategies
            .iter()
            .map(|s| s.make_decision(ctx))
            .fold(WaitDecision::Immediate, Self::merge)
    }
}
