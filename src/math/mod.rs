//! 数学工具 - 向量运算与坐标系约定

mod axis;
mod vector;

pub use axis::AxisConvention;
pub use vector::{angle_between, normalize, normalized_cross, quat_from_frame, quat_from_matrix, quaternion_between};
