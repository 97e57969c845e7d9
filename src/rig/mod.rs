//! 目标骨架 - 配置、默认布局与关节映射

mod config;
mod layout;
mod mapping;

pub use config::RetargetConfig;
pub use layout::{
    default_keyframe_width, TargetJointSpec, DEEP_MIMIC_HUMANOID, DEFAULT_FOOT_JOINTS, DEFAULT_TERMINAL_JOINTS,
    ROOT_ROT_LEFT, ROOT_ROT_UP, TIME_FIELD,
};
pub use mapping::{JointKind, JointMapping, RigLayout};
