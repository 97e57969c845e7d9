//! 关节映射
//!
//! 每个目标关节在加载配置时就确定求解方式（JointKind），
//! 逐帧求解时只按枚举分派，不再按名称比较。

use glam::DVec3;

use crate::math::AxisConvention;
use crate::{Result, RetargetError};

use super::config::RetargetConfig;
use super::layout::{
    TargetJointSpec, DEEP_MIMIC_HUMANOID, DEFAULT_FOOT_JOINTS, DEFAULT_TERMINAL_JOINTS, ROOT_ROT_LEFT,
    ROOT_ROT_UP,
};

// ============================================================================
// 关节类型
// ============================================================================

/// 目标关节的求解方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointKind {
    /// 单自由度铰链：父段与子段方向的夹角
    Hinge,
    /// 球关节：子段与孙段方向构成局部标架
    BallGeneral,
    /// 末端球关节：以根方向旋转后的参考方向为比较目标
    BallTerminal,
    /// 脚踝：主轴为 z，参考方向作为副轴
    BallFoot,
}

impl JointKind {
    /// 输出的浮点数个数
    #[inline]
    pub fn width(self) -> usize {
        match self {
            JointKind::Hinge => 1,
            _ => 4,
        }
    }
}

/// 单个目标关节的映射
#[derive(Clone, Debug, PartialEq)]
pub struct JointMapping {
    /// 目标关节名
    pub target_name: String,
    /// 绑定的源关节名
    pub source_name: String,
    /// 维度（1 或 4）
    pub dimensions: u8,
    /// 参考 "零旋转" 方向
    pub zero_rot_vector: DVec3,
    /// 求解方式
    pub kind: JointKind,
}

// ============================================================================
// 布局
// ============================================================================

/// 校验后的目标骨架布局
#[derive(Clone, Debug, PartialEq)]
pub struct RigLayout {
    /// 根关节（提供根平移，其方向由两个参考关节推导）
    pub root: JointMapping,
    /// 其余关节（输出顺序）
    pub joints: Vec<JointMapping>,
    /// 根方向参考关节（左）的源关节名
    pub root_left: String,
    /// 根方向参考关节（上）的源关节名
    pub root_up: String,
    /// 根平移缩放
    pub scale: f64,
    /// 是否锁定根平移
    pub pos_locked: bool,
    /// 源 → 目标坐标系约定
    pub axis: AxisConvention,
}

impl RigLayout {
    /// 锁定根平移时输出的哨兵值
    pub const LOCKED_TRANSLATION: [f64; 3] = [2.0, 2.0, 2.0];

    /// 从配置构建并校验布局
    pub fn from_config(config: &RetargetConfig) -> Result<Self> {
        let specs = resolve_specs(config)?;

        if specs.len() < 3 {
            return Err(config_error(format!("布局至少需要 3 项，实际 {}", specs.len())));
        }
        if specs[0].1 != 1 {
            return Err(config_error(format!("第 1 项 '{}' 必须是时间（维度 1）", specs[0].0)));
        }
        if specs[1].1 != 3 {
            return Err(config_error(format!("第 2 项 '{}' 必须是根平移（维度 3）", specs[1].0)));
        }
        if specs[2].1 != 4 || specs[2].0 != specs[1].0 {
            return Err(config_error(format!(
                "第 3 项必须是根关节 '{}' 的旋转（维度 4）",
                specs[1].0
            )));
        }
        if !config.scale.is_finite() {
            return Err(config_error(format!("scale 无效: {}", config.scale)));
        }

        let terminal = config
            .terminal_joints
            .as_deref()
            .unwrap_or(DEFAULT_TERMINAL_JOINTS.as_slice());
        let feet = config
            .foot_joints
            .as_deref()
            .unwrap_or(DEFAULT_FOOT_JOINTS.as_slice());

        let mut root = build_mapping(config, &specs[2], terminal, feet)?;
        root.kind = JointKind::BallGeneral;

        let joints = specs[3..]
            .iter()
            .map(|spec| build_mapping(config, spec, terminal, feet))
            .collect::<Result<Vec<_>>>()?;

        let root_left = assigned(config, ROOT_ROT_LEFT)?.to_string();
        let root_up = assigned(config, ROOT_ROT_UP)?.to_string();

        log::debug!(
            "[Retarget] 布局: 根 '{}' -> '{}', {} 个关节",
            root.target_name,
            root.source_name,
            joints.len()
        );

        Ok(Self {
            root,
            joints,
            root_left,
            root_up,
            scale: config.scale,
            pos_locked: config.pos_locked,
            axis: AxisConvention::BVH_TO_DEEP_MIMIC,
        })
    }

    /// 一帧关键帧的浮点数个数
    pub fn keyframe_width(&self) -> usize {
        1 + 3 + 4 + self.joints.iter().map(|j| j.kind.width()).sum::<usize>()
    }
}

/// (目标名, 维度, 参考方向)
type Spec = (String, u8, DVec3);

/// 合并默认布局与配置覆盖
fn resolve_specs(config: &RetargetConfig) -> Result<Vec<Spec>> {
    let defaults: &[TargetJointSpec] = &DEEP_MIMIC_HUMANOID;

    let (names, dims): (Vec<String>, Vec<u8>) = match (&config.joints, &config.dimensions) {
        (None, None) => defaults
            .iter()
            .map(|s| (s.name.to_string(), s.dimensions))
            .unzip(),
        (Some(names), Some(dims)) => {
            if names.len() != dims.len() {
                return Err(config_error(format!(
                    "joints ({}) 与 dimensions ({}) 长度不一致",
                    names.len(),
                    dims.len()
                )));
            }
            (names.clone(), dims.clone())
        }
        (Some(_), None) => return Err(config_error("给出了 joints 但缺少 dimensions")),
        (None, Some(_)) => return Err(config_error("给出了 dimensions 但缺少 joints")),
    };

    names
        .into_iter()
        .zip(dims)
        .enumerate()
        .map(|(i, (name, dim))| {
            if i > 2 && dim != 1 && dim != 4 {
                return Err(config_error(format!("关节 '{}' 的维度 {} 无效（只能是 1 或 4）", name, dim)));
            }
            let zero = zero_rot_vector(config, &name, defaults)?;
            Ok((name, dim, zero))
        })
        .collect()
}

/// 参考方向：配置优先，其次默认布局，最后为零向量
fn zero_rot_vector(config: &RetargetConfig, name: &str, defaults: &[TargetJointSpec]) -> Result<DVec3> {
    if let Some(v) = config.zero_rot_vectors.get(name) {
        return match v.as_slice() {
            &[x, y, z] => Ok(DVec3::new(x, y, z)),
            _ => Err(config_error(format!("关节 '{}' 的参考方向应有 3 个分量，实际 {}", name, v.len()))),
        };
    }
    Ok(defaults
        .iter()
        .find(|s| s.name == name)
        .map(|s| DVec3::from_array(s.zero_rot_vector))
        .unwrap_or(DVec3::ZERO))
}

fn build_mapping(config: &RetargetConfig, spec: &Spec, terminal: &[String], feet: &[String]) -> Result<JointMapping> {
    let (name, dimensions, zero_rot_vector) = spec;
    let kind = match dimensions {
        1 => JointKind::Hinge,
        _ if terminal.iter().any(|t| t == name) => JointKind::BallTerminal,
        _ if feet.iter().any(|f| f == name) => JointKind::BallFoot,
        _ => JointKind::BallGeneral,
    };

    Ok(JointMapping {
        target_name: name.clone(),
        source_name: assigned(config, name)?.to_string(),
        dimensions: *dimensions,
        zero_rot_vector: *zero_rot_vector,
        kind,
    })
}

fn assigned<'a>(config: &'a RetargetConfig, target: &str) -> Result<&'a str> {
    config
        .source_name(target)
        .ok_or_else(|| config_error(format!("jointAssignments 缺少 '{}'", target)))
}

fn config_error(message: impl Into<String>) -> RetargetError {
    RetargetError::Config(message.into())
}
