//! 动作数据源
//!
//! 核心设计思想：
//! - MotionSource: 重定向引擎只通过这个 trait 读取骨架层次与逐帧通道值
//! - BvhFile: Biovision Hierarchy 文本格式的实现

mod bvh_loader;

pub use bvh_loader::BvhFile;

use bitflags::bitflags;
use glam::DVec3;

// ============================================================================
// 通道
// ============================================================================

/// 通道标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Xposition,
    Yposition,
    Zposition,
    Xrotation,
    Yrotation,
    Zrotation,
}

impl Channel {
    pub const POSITIONS: [Channel; 3] = [Channel::Xposition, Channel::Yposition, Channel::Zposition];
    pub const ROTATIONS: [Channel; 3] = [Channel::Xrotation, Channel::Yrotation, Channel::Zrotation];

    /// 是否为位置通道
    #[inline]
    pub fn is_position(self) -> bool {
        matches!(self, Channel::Xposition | Channel::Yposition | Channel::Zposition)
    }

    /// 是否为旋转通道
    #[inline]
    pub fn is_rotation(self) -> bool {
        !self.is_position()
    }

    /// 通道作用的轴（0 = X, 1 = Y, 2 = Z）
    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Channel::Xposition | Channel::Xrotation => 0,
            Channel::Yposition | Channel::Yrotation => 1,
            Channel::Zposition | Channel::Zrotation => 2,
        }
    }

    fn flag(self) -> ChannelFlags {
        match self {
            Channel::Xposition => ChannelFlags::X_POSITION,
            Channel::Yposition => ChannelFlags::Y_POSITION,
            Channel::Zposition => ChannelFlags::Z_POSITION,
            Channel::Xrotation => ChannelFlags::X_ROTATION,
            Channel::Yrotation => ChannelFlags::Y_ROTATION,
            Channel::Zrotation => ChannelFlags::Z_ROTATION,
        }
    }
}

bitflags! {
    /// 关节实际拥有的通道集合
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ChannelFlags: u8 {
        const X_POSITION = 1 << 0;
        const Y_POSITION = 1 << 1;
        const Z_POSITION = 1 << 2;
        const X_ROTATION = 1 << 3;
        const Y_ROTATION = 1 << 4;
        const Z_ROTATION = 1 << 5;

        const POSITION = Self::X_POSITION.bits() | Self::Y_POSITION.bits() | Self::Z_POSITION.bits();
        const ROTATION = Self::X_ROTATION.bits() | Self::Y_ROTATION.bits() | Self::Z_ROTATION.bits();
    }
}

impl ChannelFlags {
    /// 从通道列表汇总
    pub fn from_channels(channels: &[Channel]) -> Self {
        channels.iter().fold(Self::empty(), |acc, c| acc | c.flag())
    }

    /// 三个位置通道是否齐全
    #[inline]
    pub fn has_position(self) -> bool {
        self.contains(Self::POSITION)
    }

    /// 三个旋转通道是否齐全
    #[inline]
    pub fn has_rotation(self) -> bool {
        self.contains(Self::ROTATION)
    }
}

/// 通道名称表（文件中的通道记号 → 通道）
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelNames {
    /// X/Y/Z 位置通道记号
    pub position: [String; 3],
    /// X/Y/Z 旋转通道记号
    pub rotation: [String; 3],
}

impl ChannelNames {
    /// 按记号查找通道
    pub fn lookup(&self, token: &str) -> Option<Channel> {
        if let Some(i) = self.position.iter().position(|n| n == token) {
            return Some(Channel::POSITIONS[i]);
        }
        self.rotation
            .iter()
            .position(|n| n == token)
            .map(|i| Channel::ROTATIONS[i])
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            position: ["Xposition".into(), "Yposition".into(), "Zposition".into()],
            rotation: ["Xrotation".into(), "Yrotation".into(), "Zrotation".into()],
        }
    }
}

// ============================================================================
// 骨架层次
// ============================================================================

/// 扁平化的关节声明（按文件中的先序声明顺序排列）
#[derive(Clone, Debug, PartialEq)]
pub struct JointDecl {
    /// 关节名称
    pub name: String,
    /// 父关节在声明列表中的索引
    pub parent: Option<usize>,
    /// 相对父关节的静态偏移
    pub offset: DVec3,
    /// 通道列表（顺序即文件顺序）
    pub channels: Vec<Channel>,
    /// End Site 偏移
    pub end_site: Option<DVec3>,
}

/// 动作数据源
///
/// 帧索引从 0 开始；`joint` 参数是 `joints()` 中的下标。
pub trait MotionSource {
    /// 扁平化骨架层次
    fn joints(&self) -> &[JointDecl];

    /// 读取某帧某关节某通道的值（关节没有该通道或越界时返回 None）
    fn channel_value(&self, frame: usize, joint: usize, channel: Channel) -> Option<f64>;

    /// 每帧时长（秒）
    fn frame_time(&self) -> f64;

    /// 帧数
    fn frame_count(&self) -> usize;

    /// 按名称查找关节下标
    fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints().iter().position(|j| j.name == name)
    }

    /// 按名称读取通道值
    fn channel_value_by_name(&self, frame: usize, name: &str, channel: Channel) -> Option<f64> {
        self.joint_index(name)
            .and_then(|idx| self.channel_value(frame, idx, channel))
    }

    /// 关节静态偏移
    fn joint_offset(&self, name: &str) -> Option<DVec3> {
        self.joint_index(name).map(|idx| self.joints()[idx].offset)
    }

    /// 关节通道列表
    fn joint_channels(&self, name: &str) -> Option<&[Channel]> {
        self.joint_index(name)
            .map(|idx| self.joints()[idx].channels.as_slice())
    }

    /// 直接子关节名称（声明顺序）
    fn children_of(&self, name: &str) -> Vec<&str> {
        match self.joint_index(name) {
            Some(idx) => self
                .joints()
                .iter()
                .filter(|j| j.parent == Some(idx))
                .map(|j| j.name.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// End Site 偏移
    fn end_site(&self, name: &str) -> Option<DVec3> {
        self.joint_index(name)
            .and_then(|idx| self.joints()[idx].end_site)
    }
}
