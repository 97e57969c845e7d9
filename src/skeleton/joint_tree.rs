//! 关节树 - 以索引连接父子关系的节点数组
//!
//! 建树一次，之后拓扑不变；每帧 `update` 从根到叶重算所有节点的动态数据，
//! 子节点永远看到的是本帧的父节点变换。

use std::collections::HashMap;

use glam::{DMat3, DMat4, DVec3};

use crate::motion::MotionSource;
use crate::{Result, RetargetError};

use super::JointNode;

/// 关节树
///
/// 同一时刻只能有一个写者（`update` 需要 `&mut self`）；
/// 并行处理时每个工作线程持有自己的克隆。
#[derive(Clone, Debug)]
pub struct JointTree {
    nodes: Vec<JointNode>,
    name_to_index: HashMap<String, usize>,
    /// 最近一次 update 的帧
    current_frame: Option<usize>,
}

impl JointTree {
    /// 从数据源的扁平化层次建树
    pub fn build<S>(source: &S) -> Result<Self>
    where
        S: MotionSource + ?Sized,
    {
        let decls = source.joints();
        if decls.is_empty() {
            return Err(RetargetError::Config("骨架没有任何关节".to_string()));
        }

        let mut nodes: Vec<JointNode> = decls
            .iter()
            .enumerate()
            .map(|(i, decl)| JointNode::from_decl(i, decl))
            .collect();

        // 建立子节点列表：父节点必须先于子节点声明，保证先序遍历与数组顺序一致
        for i in 0..nodes.len() {
            match (i, nodes[i].parent) {
                (0, None) => {}
                (0, Some(_)) => {
                    return Err(RetargetError::Config(format!(
                        "第一个关节 '{}' 必须是根",
                        nodes[0].name
                    )));
                }
                (_, None) => {
                    return Err(RetargetError::Config(format!(
                        "关节 '{}' 没有父关节，只支持单根骨架",
                        nodes[i].name
                    )));
                }
                (_, Some(p)) if p >= i => {
                    return Err(RetargetError::Config(format!(
                        "关节 '{}' 的父关节索引 {} 无效",
                        nodes[i].name, p
                    )));
                }
                (_, Some(p)) => nodes[p].children.push(i),
            }
        }

        // 名称重复时第一个（深度优先先遇到的）优先
        let mut name_to_index = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            name_to_index.entry(node.name.clone()).or_insert(node.index);
        }

        if !nodes[0].channel_flags.has_position() {
            log::warn!("[Retarget] 根关节 '{}' 缺少完整的位置通道，缺失的轴只使用 OFFSET", nodes[0].name);
        }
        for node in nodes.iter().filter(|n| !n.channel_flags.has_rotation()) {
            log::debug!("[Retarget] 关节 '{}' 缺少完整的旋转通道", node.name);
        }

        log::debug!("[Retarget] 关节树构建完成: {} 个关节, 根 '{}'", nodes.len(), nodes[0].name);

        Ok(Self {
            nodes,
            name_to_index,
            current_frame: None,
        })
    }

    // ========================================
    // 查询
    // ========================================

    /// 节点数
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 是否为空（建树保证至少一个节点）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 根节点
    #[inline]
    pub fn root(&self) -> &JointNode {
        &self.nodes[0]
    }

    /// 按索引取节点
    #[inline]
    pub fn node(&self, index: usize) -> Option<&JointNode> {
        self.nodes.get(index)
    }

    /// 所有节点（先序）
    #[inline]
    pub fn nodes(&self) -> &[JointNode] {
        &self.nodes
    }

    /// 最近一次 update 的帧
    #[inline]
    pub fn current_frame(&self) -> Option<usize> {
        self.current_frame
    }

    /// 按名称查找节点索引
    pub fn find(&self, name: &str) -> Result<usize> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| RetargetError::JointNotFound(name.to_string()))
    }

    /// 按名称查找节点
    pub fn search(&self, name: &str) -> Result<&JointNode> {
        self.find(name).map(|idx| &self.nodes[idx])
    }

    /// 第一个子节点
    #[inline]
    pub fn first_child(&self, index: usize) -> Option<usize> {
        self.nodes.get(index)?.children.first().copied()
    }

    // ========================================
    // 正向运动学
    // ========================================

    /// 更新指定帧的所有节点
    pub fn update<S>(&mut self, frame: usize, source: &S) -> Result<()>
    where
        S: MotionSource + ?Sized,
    {
        let frame_count = source.frame_count();
        if frame >= frame_count {
            return Err(RetargetError::FrameOutOfRange { frame, frame_count });
        }

        self.update_recursive(0, frame, source, DMat4::IDENTITY)?;
        self.current_frame = Some(frame);
        Ok(())
    }

    /// 递归更新：先算自身，再按声明顺序深度优先更新子节点
    fn update_recursive<S>(
        &mut self,
        idx: usize,
        frame: usize,
        source: &S,
        parent_world: DMat4,
    ) -> Result<()>
    where
        S: MotionSource + ?Sized,
    {
        let node = &mut self.nodes[idx];
        node.compute_local_transform(frame, source)?;
        node.compute_world_transform(parent_world);
        let world = node.world_transform;

        for k in 0..self.nodes[idx].children.len() {
            let child = self.nodes[idx].children[k];
            self.update_recursive(child, frame, source, world)?;
        }
        Ok(())
    }

    // ========================================
    // 帧内查询（仅在 update 之后有效）
    // ========================================

    /// 世界位置
    #[inline]
    pub fn world_position(&self, index: usize) -> DVec3 {
        self.nodes[index].world_position
    }

    /// 相对父节点的位置（根节点相对世界原点）
    pub fn position_relative_to_parent(&self, index: usize) -> DVec3 {
        let node = &self.nodes[index];
        match node.parent {
            Some(p) => node.world_position - self.nodes[p].world_position,
            None => node.world_position,
        }
    }

    /// 第一个子节点相对自身的位置
    ///
    /// 没有子节点时使用 End Site；两者都没有时返回零向量（退化情况，由下游回退处理）。
    pub fn position_relative_to_first_child(&self, index: usize) -> DVec3 {
        let node = &self.nodes[index];
        if let Some(&child) = node.children.first() {
            self.position_relative_to_parent(child)
        } else if let Some(end) = node.end_effector_position() {
            end - node.world_position
        } else {
            DVec3::ZERO
        }
    }

    /// 根节点的总旋转矩阵（已烘焙进所有世界位置）
    #[inline]
    pub fn root_rotation(&self) -> DMat3 {
        self.nodes[0].rotation
    }
}
