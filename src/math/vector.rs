//! 向量运算 - 归一化、叉积标架、最短弧四元数
//!
//! 退化输入（零向量、平行向量）不报错，统一走确定性的回退分支。

use glam::{DMat3, DQuat, DVec3};

/// 归一化
///
/// 范数为 0 或恰好为 1 时原样返回（精确比较），否则除以范数。
#[inline]
pub fn normalize(v: DVec3) -> DVec3 {
    let norm = v.length();
    if norm == 0.0 || norm == 1.0 {
        v
    } else {
        v / norm
    }
}

/// 归一化后的叉积
#[inline]
pub fn normalized_cross(a: DVec3, b: DVec3) -> DVec3 {
    normalize(a.cross(b))
}

/// 两个方向之间的夹角（弧度）
///
/// 点积先截断到 [-1, 1]，避免浮点误差导致 `acos` 返回 NaN。
#[inline]
pub fn angle_between(v1: DVec3, v2: DVec3) -> f64 {
    normalize(v1).dot(normalize(v2)).clamp(-1.0, 1.0).acos()
}

/// 将 `v1` 旋转到 `v2` 的最短弧单位四元数
///
/// 已知限制：`v1 × v2` 为零（同向或反向）时回退到轴 (1,0,0)、角度 0，
/// 即反向输入也返回单位旋转而不是 180° 旋转。
pub fn quaternion_between(v1: DVec3, v2: DVec3) -> DQuat {
    let v1 = normalize(v1);
    let v2 = normalize(v2);

    let perp = v1.cross(v2);
    let perp_norm = perp.length();

    let (axis, angle) = if perp_norm > 0.0 {
        (perp / perp_norm, v1.dot(v2).clamp(-1.0, 1.0).acos())
    } else {
        (DVec3::X, 0.0)
    };

    DQuat::from_axis_angle(axis, angle)
}

/// 由三个列向量组成旋转矩阵并转换为四元数
#[inline]
pub fn quat_from_frame(x: DVec3, y: DVec3, z: DVec3) -> DQuat {
    quat_from_matrix(&DMat3::from_cols(x, y, z))
}

/// 旋转矩阵 → 单位四元数
///
/// 已知限制：副轴与主轴平行时标架退化（某些列为零），矩阵不再正交，
/// 结果只保证是单位四元数，不代表有意义的旋转；完全无法恢复时返回单位旋转。
pub fn quat_from_matrix(m: &DMat3) -> DQuat {
    let q = DQuat::from_mat3(m);
    let len = q.length();
    if len > 0.0 && len.is_finite() {
        q / len
    } else {
        DQuat::IDENTITY
    }
}
