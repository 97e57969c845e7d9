//! 动作捕捉重定向 - 将 BVH 动作转换为 DeepMimic humanoid 关键帧
//!
//! 模块划分：
//! - motion: 动作数据源（BVH 解析）
//! - skeleton: 关节树与正向运动学
//! - rig: 目标骨架配置与关节映射
//! - retarget: 逐帧求解与输出
//! - batch: 目录批量转换

pub mod batch;
pub mod error;
pub mod math;
pub mod motion;
pub mod retarget;
pub mod rig;
pub mod skeleton;

pub use batch::{convert_directory, BatchOptions, BatchReport, BvhConverter};
pub use error::{Result, RetargetError};
pub use motion::{BvhFile, Channel, ChannelNames, JointDecl, MotionSource};
pub use retarget::{CancelToken, EngineState, Keyframe, LoopMode, MimicClip, RetargetingEngine};
pub use rig::{JointKind, RetargetConfig, RigLayout};
pub use skeleton::{JointNode, JointTree};
