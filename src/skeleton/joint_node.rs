//! 关节节点
//!
//! JointNode 是关节树的单个节点。静态数据在建树时确定，
//! 动态数据在每帧 `update` 时整体重算，不跨帧累积。

use glam::{DMat3, DMat4, DVec3};

use crate::motion::{Channel, ChannelFlags, JointDecl, MotionSource};
use crate::{Result, RetargetError};

/// 关节节点
///
/// 变换计算：world_transform = parent.world_transform * local_transform
#[derive(Clone, Debug)]
pub struct JointNode {
    // ========================================
    // 静态数据（建树后不变）
    // ========================================
    /// 关节名称
    pub name: String,

    /// 在树中的索引（与数据源的关节下标一致）
    pub(crate) index: usize,

    /// 父关节索引
    pub(crate) parent: Option<usize>,

    /// 子关节索引（声明顺序）
    pub(crate) children: Vec<usize>,

    /// 相对父关节的静态偏移
    pub offset: DVec3,

    /// 通道列表（文件顺序）
    pub channels: Vec<Channel>,

    /// 通道集合
    pub channel_flags: ChannelFlags,

    /// End Site 偏移
    pub(crate) end_site: Option<DVec3>,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================
    /// 动画平移（没有位置通道时恒为零）
    pub translation: DVec3,

    /// 旋转矩阵
    pub rotation: DMat3,

    /// 本地变换 (local_to_parent)
    pub local_transform: DMat4,

    /// 累积变换 (local_to_world)
    pub world_transform: DMat4,

    /// 世界位置
    pub world_position: DVec3,
}

impl JointNode {
    /// 从关节声明创建
    pub fn from_decl(index: usize, decl: &JointDecl) -> Self {
        Self {
            name: decl.name.clone(),
            index,
            parent: decl.parent,
            children: Vec::new(),
            offset: decl.offset,
            channels: decl.channels.clone(),
            channel_flags: ChannelFlags::from_channels(&decl.channels),
            end_site: decl.end_site,
            translation: DVec3::ZERO,
            rotation: DMat3::IDENTITY,
            local_transform: DMat4::IDENTITY,
            world_transform: DMat4::IDENTITY,
            world_position: DVec3::ZERO,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    /// 节点索引
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// 父节点索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        self.parent
    }

    /// 子节点索引
    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// 是否为根
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// 是否带 End Site
    #[inline]
    pub fn has_end_effector(&self) -> bool {
        self.end_site.is_some()
    }

    /// End Site 偏移
    #[inline]
    pub fn end_effector_offset(&self) -> Option<DVec3> {
        self.end_site
    }

    /// End Site 的世界位置
    #[inline]
    pub fn end_effector_position(&self) -> Option<DVec3> {
        self.end_site
            .map(|offset| self.world_transform.transform_point3(offset))
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 计算本地变换 (local_to_parent)
    ///
    /// 1. 平移 = 位置通道值（无位置通道时为零）
    /// 2. 旋转 = 按通道声明顺序依次右乘各轴的基本旋转
    /// 3. 本地变换 = [rotation | offset + translation]
    pub fn compute_local_transform<S>(&mut self, frame: usize, source: &S) -> Result<()>
    where
        S: MotionSource + ?Sized,
    {
        let mut translation = DVec3::ZERO;
        let mut rotation = DMat3::IDENTITY;

        for &channel in &self.channels {
            let value = source
                .channel_value(frame, self.index, channel)
                .ok_or_else(|| RetargetError::MissingChannel {
                    joint: self.name.clone(),
                    channel,
                })?;

            if channel.is_position() {
                translation[channel.axis()] = value;
            } else {
                rotation *= elementary_rotation(channel, value.to_radians());
            }
        }

        self.translation = translation;
        self.rotation = rotation;
        self.local_transform = compose_affine(rotation, self.offset + translation);
        Ok(())
    }

    /// 用父节点累积变换更新累积变换与世界位置
    #[inline]
    pub fn compute_world_transform(&mut self, parent_world: DMat4) {
        self.world_transform = parent_world * self.local_transform;
        self.world_position = self.world_transform.transform_point3(DVec3::ZERO);
    }
}

/// 单轴基本旋转矩阵
#[inline]
fn elementary_rotation(channel: Channel, radians: f64) -> DMat3 {
    match channel.axis() {
        0 => DMat3::from_rotation_x(radians),
        1 => DMat3::from_rotation_y(radians),
        _ => DMat3::from_rotation_z(radians),
    }
}

/// 旋转矩阵 + 平移 → 4x4 仿射矩阵
#[inline]
fn compose_affine(rotation: DMat3, translation: DVec3) -> DMat4 {
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}
