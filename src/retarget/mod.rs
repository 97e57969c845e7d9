//! 重定向 - 逐帧把源骨架姿态转换为目标关键帧

mod engine;
mod keyframe;

pub use engine::{BoundRig, CancelToken, EngineState, RetargetingEngine};
pub use keyframe::{Keyframe, LoopMode, MimicClip};
