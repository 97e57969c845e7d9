//! 骨骼系统
//!
//! 核心设计思想：
//! - JointNode: 单个关节节点，保存静态层次数据与每帧的变换状态
//! - JointTree: 以索引连接父子关系的节点数组，负责逐帧正向运动学

mod joint_node;
mod joint_tree;

pub use joint_node::JointNode;
pub use joint_tree::JointTree;
