//! DeepMimic humanoid 默认布局
//!
//! 正对模型：X 轴指向观察者，Y 轴向上，Z 轴指向模型左侧。
//! 顺序决定关键帧中字段的排列，不可随意调整。

use once_cell::sync::Lazy;

/// 目标关节条目
#[derive(Clone, Debug, PartialEq)]
pub struct TargetJointSpec {
    /// 目标关节名
    pub name: &'static str,
    /// 维度（1 = 时间/铰链, 3 = 根平移, 4 = 四元数）
    pub dimensions: u8,
    /// 参考 "零旋转" 方向（源骨架局部空间）
    pub zero_rot_vector: [f64; 3],
}

const fn spec(name: &'static str, dimensions: u8, zero_rot_vector: [f64; 3]) -> TargetJointSpec {
    TargetJointSpec {
        name,
        dimensions,
        zero_rot_vector,
    }
}

const DOWN: [f64; 3] = [0.0, -1.0, 0.0];
const UP: [f64; 3] = [0.0, 1.0, 0.0];
const FORWARD: [f64; 3] = [1.0, 0.0, 0.0];

/// 时间字段名
pub const TIME_FIELD: &str = "seconds";

/// 根方向参考关节（左）
pub const ROOT_ROT_LEFT: &str = "root rot left";

/// 根方向参考关节（上）
pub const ROOT_ROT_UP: &str = "root rot up";

/// 默认布局
pub static DEEP_MIMIC_HUMANOID: Lazy<Vec<TargetJointSpec>> = Lazy::new(|| {
    vec![
        spec(TIME_FIELD, 1, [0.0; 3]),
        spec("hip", 3, [0.0; 3]),
        spec("hip", 4, [0.0; 3]),
        spec("chest", 4, UP),
        spec("neck", 4, UP),
        spec("right hip", 4, DOWN),
        spec("right knee", 1, DOWN),
        spec("right ankle", 4, FORWARD),
        spec("right shoulder", 4, DOWN),
        spec("right elbow", 1, DOWN),
        spec("left hip", 4, DOWN),
        spec("left knee", 1, DOWN),
        spec("left ankle", 4, FORWARD),
        spec("left shoulder", 4, DOWN),
        spec("left elbow", 1, DOWN),
    ]
});

/// 默认末端类球关节（没有可用于消除扭转的后续骨链）
pub static DEFAULT_TERMINAL_JOINTS: Lazy<Vec<String>> =
    Lazy::new(|| vec!["chest".to_string(), "neck".to_string()]);

/// 默认脚踝类球关节
pub static DEFAULT_FOOT_JOINTS: Lazy<Vec<String>> =
    Lazy::new(|| vec!["right ankle".to_string(), "left ankle".to_string()]);

/// 默认布局一帧的浮点数个数
pub fn default_keyframe_width() -> usize {
    DEEP_MIMIC_HUMANOID
        .iter()
        .map(|s| s.dimensions as usize)
        .sum()
}
