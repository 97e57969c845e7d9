//! 坐标系约定转换
//!
//! BVH 源骨架与 DeepMimic 目标骨架的轴向不同。两者的转换是一个带符号的轴置换：
//! `target[i] = sign[i] * source[perm[i]]`。位置与四元数的转换都从同一个置换推导，
//! 不再各写一份公式。

use glam::{DMat3, DQuat, DVec3};

/// 带符号的轴置换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisConvention {
    /// 目标轴 i 取自源轴 `perm[i]`
    perm: [usize; 3],
    /// 目标轴 i 的符号
    sign: [f64; 3],
}

impl AxisConvention {
    /// BVH → DeepMimic：`(x, y, z) -> (z, y, -x)`
    pub const BVH_TO_DEEP_MIMIC: Self = Self {
        perm: [2, 1, 0],
        sign: [1.0, 1.0, -1.0],
    };

    /// 恒等约定
    pub const IDENTITY: Self = Self {
        perm: [0, 1, 2],
        sign: [1.0, 1.0, 1.0],
    };

    /// 创建新的轴置换
    ///
    /// `perm` 必须是 {0,1,2} 的排列，`sign` 只取 ±1。
    pub fn new(perm: [usize; 3], sign: [f64; 3]) -> Option<Self> {
        let mut seen = [false; 3];
        for &p in &perm {
            if p > 2 || seen[p] {
                return None;
            }
            seen[p] = true;
        }
        if sign.iter().any(|s| s.abs() != 1.0) {
            return None;
        }
        Some(Self { perm, sign })
    }

    /// 对应的 3x3 变换矩阵
    pub fn matrix(&self) -> DMat3 {
        let mut rows = [DVec3::ZERO; 3];
        for i in 0..3 {
            rows[i][self.perm[i]] = self.sign[i];
        }
        DMat3::from_cols(rows[0], rows[1], rows[2]).transpose()
    }

    /// 行列式（+1 为纯旋转，-1 含镜像）
    pub fn determinant(&self) -> f64 {
        self.matrix().determinant()
    }

    /// 转换位置向量
    #[inline]
    pub fn remap_position(&self, p: DVec3) -> DVec3 {
        DVec3::new(
            self.sign[0] * p[self.perm[0]],
            self.sign[1] * p[self.perm[1]],
            self.sign[2] * p[self.perm[2]],
        )
    }

    /// 转换四元数
    ///
    /// 虚部是轴向量，镜像变换下要额外乘以行列式；实部不变。
    #[inline]
    pub fn remap_rotation(&self, q: DQuat) -> DQuat {
        let v = self.remap_position(DVec3::new(q.x, q.y, q.z)) * self.determinant();
        DQuat::from_xyzw(v.x, v.y, v.z, q.w)
    }
}

impl Default for AxisConvention {
    fn default() -> Self {
        Self::BVH_TO_DEEP_MIMIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_position_formula() {
        let p = AxisConvention::BVH_TO_DEEP_MIMIC.remap_position(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(p, DVec3::new(3.0, 2.0, -1.0));
    }

    #[test]
    fn test_remap_rotation_formula() {
        // (w, x, y, z) -> (w, z, y, -x)
        let q = DQuat::from_xyzw(0.2, 0.3, 0.4, 0.1);
        let r = AxisConvention::BVH_TO_DEEP_MIMIC.remap_rotation(q);
        assert_eq!(r.w, 0.1);
        assert_eq!(r.x, 0.4);
        assert_eq!(r.y, 0.3);
        assert_eq!(r.z, -0.2);
    }

    #[test]
    fn test_remap_rotation_twice_is_not_identity() {
        let conv = AxisConvention::BVH_TO_DEEP_MIMIC;
        let q = DQuat::from_xyzw(0.2, 0.3, 0.4, 0.1);
        let twice = conv.remap_rotation(conv.remap_rotation(q));
        // (w, x, y, z) -> (w, -x, y, -z)
        assert_eq!(twice, DQuat::from_xyzw(-0.2, 0.3, -0.4, 0.1));
    }

    #[test]
    fn test_rotation_remap_matches_matrix_conjugation() {
        let conv = AxisConvention::BVH_TO_DEEP_MIMIC;
        let q = DQuat::from_euler(glam::EulerRot::XYZ, 0.3, -0.7, 1.1);
        let v = DVec3::new(0.5, -1.5, 2.0);
        let expected = conv.remap_position(q * v);
        let actual = conv.remap_rotation(q) * conv.remap_position(v);
        assert!((expected - actual).abs().max_element() < 1e-12);
    }

    #[test]
    fn test_bvh_to_deep_mimic_is_proper_rotation() {
        assert!((AxisConvention::BVH_TO_DEEP_MIMIC.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_invalid_permutation() {
        assert!(AxisConvention::new([0, 0, 1], [1.0, 1.0, 1.0]).is_none());
        assert!(AxisConvention::new([0, 1, 2], [1.0, 2.0, 1.0]).is_none());
        assert_eq!(
            AxisConvention::new([0, 1, 2], [1.0, 1.0, 1.0]),
            Some(AxisConvention::IDENTITY)
        );
    }
}
