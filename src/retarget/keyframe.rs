//! 关键帧与输出片段
//!
//! 输出格式：`{"Loop": "none", "Frames": [[时长, 根平移.., 根旋转.., 各关节..], ...]}`

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// 循环模式（原样透传，不参与计算）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    None,
    Wrap,
}

/// 单帧输出
///
/// 字段顺序：时长、根平移（3）、根旋转（w,x,y,z）、其余关节（1 或 4）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyframe(Vec<f64>);

impl Keyframe {
    pub(crate) fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// 全部字段
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// 帧时长
    #[inline]
    pub fn duration(&self) -> f64 {
        self.0.first().copied().unwrap_or(0.0)
    }

    /// 根平移
    #[inline]
    pub fn root_translation(&self) -> Option<[f64; 3]> {
        self.0.get(1..4)?.try_into().ok()
    }

    /// 根旋转 (w, x, y, z)
    #[inline]
    pub fn root_rotation(&self) -> Option<[f64; 4]> {
        self.0.get(4..8)?.try_into().ok()
    }

    /// 字段个数
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 输出片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimicClip {
    #[serde(rename = "Loop")]
    pub loop_mode: LoopMode,
    #[serde(rename = "Frames")]
    pub frames: Vec<Keyframe>,
}

impl MimicClip {
    pub fn new(loop_mode: LoopMode, frames: Vec<Keyframe>) -> Self {
        Self { loop_mode, frames }
    }

    /// 写入任意 Writer（4 空格缩进）
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
        self.serialize(&mut serializer)?;
        Ok(())
    }

    /// 序列化为字符串
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_json(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// 写入文件
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_format() {
        let clip = MimicClip::new(
            LoopMode::Wrap,
            vec![Keyframe::new(vec![0.5, 1.0]), Keyframe::new(vec![0.5, 2.0])],
        );
        let json = clip.to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Loop"], "wrap");
        assert_eq!(value["Frames"][1][1], 2.0);
        assert!(json.contains("\n    \"Loop\""));
    }

    #[test]
    fn test_keyframe_accessors() {
        let kf = Keyframe::new(vec![0.1, 1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0, 0.7]);
        assert_eq!(kf.duration(), 0.1);
        assert_eq!(kf.root_translation(), Some([1.0, 2.0, 3.0]));
        assert_eq!(kf.root_rotation(), Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(kf.len(), 9);
        assert_eq!(Keyframe::new(vec![0.1]).root_rotation(), None);
    }
}
