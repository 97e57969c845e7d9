//! 错误类型
//!
//! 配置错误与关节查找失败会中止整个片段的转换；
//! 几何退化（零长度或平行向量）不是错误，由 `math::vector` 的回退处理吸收。

use thiserror::Error;

use crate::motion::Channel;

/// 重定向错误
#[derive(Debug, Error)]
pub enum RetargetError {
    /// 文件读写失败
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// BVH 文本解析失败
    #[error("BVH 解析错误 (第 {line} 行): {message}")]
    BvhParse { line: usize, message: String },

    /// 配置错误（映射缺失、列表长度不一致等）
    #[error("配置错误: {0}")]
    Config(String),

    /// 关节树中找不到指定名称的关节
    #[error("找不到关节: {0}")]
    JointNotFound(String),

    /// 关节缺少正向运动学所需的通道
    #[error("关节 '{joint}' 缺少通道 {channel:?}")]
    MissingChannel { joint: String, channel: Channel },

    /// 帧索引越界
    #[error("帧索引 {frame} 越界 (共 {frame_count} 帧)")]
    FrameOutOfRange { frame: usize, frame_count: usize },

    /// JSON 读写失败
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 任务在两帧之间被外部取消
    #[error("转换在第 {frame} 帧被取消")]
    Cancelled { frame: usize },
}

impl RetargetError {
    /// 构造 BVH 解析错误
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::BvhParse {
            line,
            message: message.into(),
        }
    }

    /// 是否为配置类错误（批处理中用于区分日志级别）
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::JointNotFound(_))
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, RetargetError>;
