//! 重定向引擎
//!
//! 流程：建树 → 绑定布局 → 逐帧 [正向运动学 → 根方向 → 各关节旋转 → 组装关键帧]
//!
//! 状态：Idle → Built → Running(i / N) → Done。任一帧失败则整个任务失败，不输出部分结果。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{DMat3, DQuat, DVec3};
use rayon::prelude::*;

use crate::math::{angle_between, normalize, normalized_cross, quat_from_frame, quat_from_matrix, quaternion_between};
use crate::motion::MotionSource;
use crate::rig::{JointKind, JointMapping, RigLayout};
use crate::skeleton::JointTree;
use crate::{Result, RetargetError};

use super::keyframe::{Keyframe, LoopMode, MimicClip};

// ============================================================================
// 取消
// ============================================================================

/// 取消标记（可跨线程共享，在两帧之间检查）
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// 是否已请求取消
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    fn check(&self, frame: usize) -> Result<()> {
        if self.is_cancelled() {
            Err(RetargetError::Cancelled { frame })
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// 绑定
// ============================================================================

/// 绑定到具体骨架的关节
#[derive(Clone, Debug)]
struct BoundJoint {
    /// 源关节节点索引
    node: usize,
    /// 求解方式（可能因拓扑不足而降级）
    kind: JointKind,
    /// 参考 "零旋转" 方向
    zero_rot_vector: DVec3,
}

/// 绑定到具体骨架后的布局
///
/// 所有名称在绑定时解析为节点索引，逐帧求解不再做字符串查找。
#[derive(Clone, Debug)]
pub struct BoundRig {
    layout: RigLayout,
    root: usize,
    root_left: usize,
    root_up: usize,
    joints: Vec<BoundJoint>,
}

impl BoundRig {
    /// 解析布局中的全部源关节名
    pub fn bind(layout: &RigLayout, tree: &JointTree) -> Result<Self> {
        let joints = layout
            .joints
            .iter()
            .map(|mapping| bind_joint(mapping, tree))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            layout: layout.clone(),
            root: tree.find(&layout.root.source_name)?,
            root_left: tree.find(&layout.root_left)?,
            root_up: tree.find(&layout.root_up)?,
            joints,
        })
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> &RigLayout {
        &self.layout
    }

    /// 计算单帧关键帧
    ///
    /// 会先对 `tree` 执行该帧的正向运动学；`tree` 必须由同一数据源构建。
    pub fn compute_frame<S>(&self, tree: &mut JointTree, source: &S, frame: usize) -> Result<Keyframe>
    where
        S: MotionSource + ?Sized,
    {
        tree.update(frame, source)?;

        let axis = self.layout.axis;
        let root_orientation = self.root_orientation(tree);
        let root_rotation_inv = tree.root_rotation().transpose();

        let mut values = Vec::with_capacity(self.layout.keyframe_width());

        // 时长
        values.push(source.frame_time());

        // 根平移
        if self.layout.pos_locked {
            values.extend(RigLayout::LOCKED_TRANSLATION);
        } else {
            let position = tree.world_position(self.root) * self.layout.scale;
            values.extend(axis.remap_position(position).to_array());
        }

        // 根旋转
        push_quat(&mut values, axis.remap_rotation(root_orientation));

        // 其余关节
        for joint in &self.joints {
            match joint.kind {
                JointKind::Hinge => {
                    values.push(hinge_angle(tree, joint.node));
                }
                JointKind::BallGeneral => {
                    let q = ball_general(tree, joint.node, root_rotation_inv);
                    push_quat(&mut values, axis.remap_rotation(q));
                }
                JointKind::BallTerminal => {
                    let q = ball_terminal(tree, joint.node, root_orientation * joint.zero_rot_vector);
                    push_quat(&mut values, axis.remap_rotation(q));
                }
                JointKind::BallFoot => {
                    let q = ball_foot(
                        tree,
                        joint.node,
                        root_orientation * joint.zero_rot_vector,
                        root_rotation_inv,
                    );
                    push_quat(&mut values, axis.remap_rotation(q));
                }
            }
        }

        Ok(Keyframe::new(values))
    }

    /// 根方向：由 "左" 与 "上" 两个参考方向构造正交标架
    ///
    /// z = left × up，x = up × z，矩阵列为 (x, up, z)。
    pub fn root_orientation(&self, tree: &JointTree) -> DQuat {
        let left = normalize(tree.position_relative_to_parent(self.root_left));
        let up = normalize(tree.position_relative_to_parent(self.root_up));
        let z = normalized_cross(left, up);
        let x = normalized_cross(up, z);
        quat_from_frame(x, up, z)
    }
}

/// 解析单个关节，球关节缺少孙节点时降级为末端球关节
fn bind_joint(mapping: &JointMapping, tree: &JointTree) -> Result<BoundJoint> {
    let node = tree.find(&mapping.source_name)?;

    let kind = match mapping.kind {
        JointKind::BallGeneral => {
            let has_grandchild = tree
                .first_child(node)
                .and_then(|child| tree.first_child(child))
                .is_some();
            if has_grandchild {
                JointKind::BallGeneral
            } else {
                log::debug!(
                    "[Retarget] '{}' ({}) 没有孙节点，改用参考方向求解",
                    mapping.target_name,
                    mapping.source_name
                );
                JointKind::BallTerminal
            }
        }
        kind => kind,
    };

    Ok(BoundJoint {
        node,
        kind,
        zero_rot_vector: mapping.zero_rot_vector,
    })
}

// ============================================================================
// 各类关节求解
// ============================================================================

/// 铰链角：父段方向与子段方向的夹角（只保留屈伸幅度）
fn hinge_angle(tree: &JointTree, node: usize) -> f64 {
    angle_between(
        tree.position_relative_to_parent(node),
        tree.position_relative_to_first_child(node),
    )
}

/// 一般球关节：y' = -子段方向，副轴取子节点到孙节点的方向
fn ball_general(tree: &JointTree, node: usize, root_rotation_inv: DMat3) -> DQuat {
    let child_dir = normalize(tree.position_relative_to_first_child(node));
    let secondary = tree
        .first_child(node)
        .map(|child| normalize(tree.position_relative_to_first_child(child)))
        .unwrap_or(DVec3::ZERO);

    let y = -child_dir;
    let x = normalized_cross(y, secondary);
    let z = normalized_cross(x, y);

    // 根的总旋转已烘焙进世界位置，去掉后得到相对骨架基准姿态的旋转
    quat_from_matrix(&(root_rotation_inv * DMat3::from_cols(x, y, z)))
}

/// 末端球关节：参考方向（已随根旋转）到子段方向的最短弧
fn ball_terminal(tree: &JointTree, node: usize, reference: DVec3) -> DQuat {
    quaternion_between(reference, tree.position_relative_to_first_child(node))
}

/// 脚踝：z' = -子段方向，参考方向作为副轴
fn ball_foot(tree: &JointTree, node: usize, reference: DVec3, root_rotation_inv: DMat3) -> DQuat {
    let child_dir = normalize(tree.position_relative_to_first_child(node));
    let secondary = normalize(reference);

    let z = -child_dir;
    let y = normalized_cross(z, secondary);
    let x = normalized_cross(y, z);

    quat_from_matrix(&(root_rotation_inv * DMat3::from_cols(x, y, z)))
}

#[inline]
fn push_quat(values: &mut Vec<f64>, q: DQuat) {
    values.extend([q.w, q.x, q.y, q.z]);
}

// ============================================================================
// 引擎
// ============================================================================

/// 引擎状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// 尚未开始
    Idle,
    /// 关节树已构建、布局已绑定
    Built,
    /// 正在处理第 `frame` 帧（共 `total` 帧）
    Running { frame: usize, total: usize },
    /// 全部帧已完成
    Done,
}

/// 重定向引擎
#[derive(Debug)]
pub struct RetargetingEngine {
    layout: RigLayout,
    loop_mode: LoopMode,
    cancel: CancelToken,
    state: EngineState,
}

impl RetargetingEngine {
    /// 创建新的引擎
    pub fn new(layout: RigLayout, loop_mode: LoopMode) -> Self {
        Self {
            layout,
            loop_mode,
            cancel: CancelToken::new(),
            state: EngineState::Idle,
        }
    }

    /// 使用外部取消标记
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 取消标记（克隆后可交给其他线程）
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 当前状态
    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> &RigLayout {
        &self.layout
    }

    /// 建树并绑定布局
    fn prepare<S>(&mut self, source: &S) -> Result<(JointTree, BoundRig)>
    where
        S: MotionSource + ?Sized,
    {
        self.state = EngineState::Idle;
        let tree = JointTree::build(source)?;
        let rig = BoundRig::bind(&self.layout, &tree)?;
        self.set_state(EngineState::Built);
        Ok((tree, rig))
    }

    fn set_state(&mut self, state: EngineState) {
        log::debug!("[Retarget] 状态 {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn finish(&mut self, frames: Vec<Keyframe>) -> MimicClip {
        self.set_state(EngineState::Done);
        log::info!("[Retarget] 转换完成: {} 帧", frames.len());
        MimicClip::new(self.loop_mode, frames)
    }

    /// 顺序转换（单棵关节树逐帧复用）
    pub fn run<S>(&mut self, source: &S) -> Result<MimicClip>
    where
        S: MotionSource + ?Sized,
    {
        let (mut tree, rig) = self.prepare(source)?;
        let total = source.frame_count();
        log::info!("[Retarget] 开始转换: {} 帧, {} 个关节", total, tree.len());

        let mut frames = Vec::with_capacity(total);
        for frame in 0..total {
            self.state = EngineState::Running { frame, total };
            let result = self
                .cancel
                .check(frame)
                .and_then(|_| rig.compute_frame(&mut tree, source, frame));
            match result {
                Ok(keyframe) => frames.push(keyframe),
                Err(e) => {
                    self.state = EngineState::Idle;
                    return Err(e);
                }
            }
        }

        Ok(self.finish(frames))
    }

    /// 并行转换
    ///
    /// 每个工作线程持有自己的关节树克隆，结果按帧索引收集，与顺序转换逐位一致。
    /// 帧完成顺序不确定，运行期间状态固定为 `Running { frame: 0, total }`。
    pub fn run_parallel<S>(&mut self, source: &S) -> Result<MimicClip>
    where
        S: MotionSource + Sync + ?Sized,
    {
        let (tree, rig) = self.prepare(source)?;
        let total = source.frame_count();
        log::info!("[Retarget] 开始并行转换: {} 帧, {} 个关节", total, tree.len());

        self.state = EngineState::Running { frame: 0, total };
        let cancel = self.cancel.clone();

        let result: Result<Vec<Keyframe>> = (0..total)
            .into_par_iter()
            .map_init(
                || tree.clone(),
                |tree, frame| {
                    cancel.check(frame)?;
                    rig.compute_frame(tree, source, frame)
                },
            )
            .collect();

        match result {
            Ok(frames) => Ok(self.finish(frames)),
            Err(e) => {
                self.state = EngineState::Idle;
                Err(e)
            }
        }
    }
}
