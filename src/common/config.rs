use serde::{Deserialize, Serialize};

// ==========================================
// 1. 编排器配置 (OrchestratorConfig)
// ==========================================

/// 导入任务编排配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 同时进行的释义查询上限
    ///
    /// - 说明: 许可在后台任务内部申请，`create` 调用方永远不会因此阻塞。
    /// - 默认值: 64
    pub max_concurrency: usize,

    /// 回写失败后的重试次数
    ///
    /// - 说明: 查询结果写回存储失败时，带抖动指数退避重试，耗尽后丢弃并记录日志。
    /// - 默认值: 2
    pub writeback_retries: u32,

    /// 生成 brief 时取前几条释义
    /// - 默认值: 3
    pub brief_definitions: usize,

    /// brief 连接符
    /// - 默认值: "；"
    pub brief_separator: String,

    /// 任务列表最多返回条数
    /// - 默认值: 500
    pub list_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 64,
            writeback_retries: 2,
            brief_definitions: 3,
            brief_separator: "；".to_string(),
            list_limit: 500,
        }
    }
}

// ==========================================
// 2. 抽词配置 (SamplerConfig)
// ==========================================

/// 加权抽词配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// 没有显式权重时的默认权重
    /// - 默认值: 100
    pub default_weight: f64,

    /// 排除最近单词后，候选集至少要剩下的数量
    /// - 默认值: 5
    pub min_candidates: usize,

    /// 排除最近单词后，候选集至少要占全集的比例
    ///
    /// - 说明: 候选数 < max(min_candidates, ratio * 全集) 时放弃排除，退回全集。
    /// - 默认值: 0.3
    pub min_candidate_ratio: f64,

    /// 单次拉取单词/权重的条数上限
    /// - 默认值: 1000
    pub page_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            default_weight: 100.0,
            min_candidates: 5,
            min_candidate_ratio: 0.3,
            page_size: 1000,
        }
    }
}

// ==========================================
// 3. 巡检配置 (SweepConfig)
// ==========================================

/// 卡住任务的巡检配置
///
/// 回写失败 (存储宕机) 会让任务永远停在 querying，巡检负责重新派发它们。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// 是否启用巡检
    pub enabled: bool,

    /// 巡检基础间隔 (毫秒)
    /// - 默认值: 30,000
    pub interval_ms: u64,

    /// 连续空巡检时的最大间隔 (毫秒)
    /// - 默认值: 300,000
    pub max_interval_ms: u64,

    /// querying 超过多久未更新视为卡住 (毫秒)
    ///
    /// - 默认值: 300,000 (5 分钟)
    /// - 建议: 明显大于 Enricher 请求超时，避免重复派发正常的查询。
    pub stale_after_ms: u64,

    /// 单次巡检最多处理的任务数
    /// - 默认值: 50
    pub batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            max_interval_ms: 300_000,
            stale_after_ms: 300_000,
            batch_size: 50,
        }
    }
}

// ==========================================
// 4. 释义服务配置 (EnricherConfig)
// ==========================================

/// 百炼 (DashScope) 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnricherConfig {
    /// API 根地址
    pub endpoint: String,
    /// 百炼应用 ID
    pub app_id: String,
    /// API Key (Bearer)
    #[serde(skip_serializing)]
    pub api_key: String,
    /// 单次请求超时 (毫秒)
    /// - 默认值: 60,000
    pub timeout_ms: u64,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://dashscope.aliyuncs.com/api/v1".to_string(),
            app_id: String::new(),
            api_key: String::new(),
            timeout_ms: 60_000,
        }
    }
}

impl EnricherConfig {
    /// 从环境变量读取
    ///
    /// - `BAILIAN_APP_ID` / `BAILIAN_API_KEY`: 必填，缺失时 Enricher 会以 NotConfigured 失败
    /// - `BAILIAN_ENDPOINT`: 可选
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("BAILIAN_APP_ID") {
            cfg.app_id = v;
        }
        if let Ok(v) = std::env::var("BAILIAN_API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = std::env::var("BAILIAN_ENDPOINT") {
            cfg.endpoint = v;
        }
        cfg
    }

    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.api_key.is_empty()
    }
}

// ==========================================
// 5. 总配置入口 (PipelineConfig)
// ==========================================

/// 流水线总配置
///
/// 使用分层结构组织配置项。支持 `serde` 序列化，可直接从 YAML/JSON 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub sampler: SamplerConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub enricher: EnricherConfig,

    /// 命名空间 (用于 Redis Key 前缀)
    /// 默认: "dictking"
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "dictking".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            sampler: SamplerConfig::default(),
            sweep: SweepConfig::default(),
            enricher: EnricherConfig::default(),
            namespace: default_namespace(),
        }
    }
}

impl PipelineConfig {
    /// 快速创建一个开发环境配置
    pub fn new_dev() -> Self {
        let mut cfg = Self::default();
        // 开发环境下巡检快一点，方便调试
        cfg.sweep.interval_ms = 1_000;
        cfg.sweep.max_interval_ms = 5_000;
        cfg.sweep.stale_after_ms = 10_000;
        cfg.orchestrator.writeback_retries = 1;
        cfg
    }
}
