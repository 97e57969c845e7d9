//! 重定向配置
//!
//! 所有参数扁平化，从 JSON 设置文件读取；缺省字段使用 `Default` 中的值。

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::motion::ChannelNames;
use crate::retarget::LoopMode;
use crate::Result;

/// 重定向配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetargetConfig {
    // ========== 根节点 ==========
    /// 根平移的统一缩放，默认 1.0
    pub scale: f64,
    /// 锁定根平移（输出固定哨兵值，用于调试），默认 false
    pub pos_locked: bool,

    // ========== 输出 ==========
    /// 循环模式，原样写入输出文件，默认 none
    #[serde(rename = "loop")]
    pub loop_mode: LoopMode,

    // ========== 通道记号 ==========
    /// X/Y/Z 位置通道在 BVH 文件中的写法
    pub position_channel_names: [String; 3],
    /// X/Y/Z 旋转通道在 BVH 文件中的写法
    pub rotation_channel_names: [String; 3],

    // ========== 关节映射 ==========
    /// 目标关节名 → 源关节名（还需包含 "root rot left" 与 "root rot up"）
    pub joint_assignments: BTreeMap<String, String>,

    // ========== 布局覆盖（缺省为 DeepMimic humanoid）==========
    /// 目标关节顺序（含 "seconds" 与两次根关节）
    pub joints: Option<Vec<String>>,
    /// 与 `joints` 一一对应的维度
    pub dimensions: Option<Vec<u8>>,
    /// 参考 "零旋转" 方向（源骨架局部空间）
    pub zero_rot_vectors: BTreeMap<String, Vec<f64>>,
    /// 末端类球关节（以参考方向代替孙节点标架）
    pub terminal_joints: Option<Vec<String>>,
    /// 脚踝类球关节（主轴为 z）
    pub foot_joints: Option<Vec<String>>,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        let joint_assignments = [
            ("hip", "Hips"),
            ("root rot left", "LeftUpLeg"),
            ("root rot up", "Spine"),
            ("chest", "Spine1"),
            ("neck", "Neck"),
            ("right hip", "RightUpLeg"),
            ("right knee", "RightLeg"),
            ("right ankle", "RightFoot"),
            ("right shoulder", "RightArm"),
            ("right elbow", "RightForeArm"),
            ("left hip", "LeftUpLeg"),
            ("left knee", "LeftLeg"),
            ("left ankle", "LeftFoot"),
            ("left shoulder", "LeftArm"),
            ("left elbow", "LeftForeArm"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let channels = ChannelNames::default();

        Self {
            // 源单位与目标单位一致时为 1.0
            scale: 1.0,
            pos_locked: false,
            loop_mode: LoopMode::None,
            position_channel_names: channels.position,
            rotation_channel_names: channels.rotation,
            joint_assignments,
            joints: None,
            dimensions: None,
            zero_rot_vectors: BTreeMap::new(),
            terminal_joints: None,
            foot_joints: None,
        }
    }
}

impl RetargetConfig {
    /// 从 JSON 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("[Retarget] 已加载设置: {}", path.as_ref().display());
        Ok(config)
    }

    /// 从 JSON 字符串加载
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// BVH 通道记号表
    pub fn channel_names(&self) -> ChannelNames {
        ChannelNames {
            position: self.position_channel_names.clone(),
            rotation: self.rotation_channel_names.clone(),
        }
    }

    /// 目标关节绑定的源关节名
    pub fn source_name(&self, target: &str) -> Option<&str> {
        self.joint_assignments.get(target).map(String::as_str)
    }
}
