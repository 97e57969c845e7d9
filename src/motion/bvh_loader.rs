//! BVH 文件加载器
//!
//! 解析 Biovision Hierarchy 文本：HIERARCHY 段得到扁平化的关节层次，
//! MOTION 段得到逐帧通道值（按行存储）。

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use glam::DVec3;

use crate::{Result, RetargetError};

use super::{Channel, ChannelNames, JointDecl, MotionSource};

/// BVH 文件数据
#[derive(Debug, Clone)]
pub struct BvhFile {
    /// 关节层次（先序）
    joints: Vec<JointDecl>,
    /// 每个关节第一个通道在一行数据中的列号
    channel_columns: Vec<usize>,
    /// 每行的通道总数
    channel_count: usize,
    /// 每帧时长（秒）
    frame_time: f64,
    /// 帧数
    frame_count: usize,
    /// 全部通道值（frame * channel_count + column）
    values: Vec<f64>,
}

impl BvhFile {
    /// 从文件路径加载 BVH
    pub fn load<P: AsRef<Path>>(path: P, names: &ChannelNames) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::load_from_reader(&mut reader, names)
    }

    /// 从 Reader 加载 BVH
    pub fn load_from_reader<R: Read>(reader: &mut R, names: &ChannelNames) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::load_from_str(&text, names)
    }

    /// 从字符串加载 BVH
    pub fn load_from_str(text: &str, names: &ChannelNames) -> Result<Self> {
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .collect();

        let motion_at = lines
            .iter()
            .position(|(_, l)| l.trim() == "MOTION")
            .ok_or_else(|| RetargetError::parse(lines.len(), "缺少 MOTION 段"))?;

        // 层次段
        let mut tokens = Tokens::new(&lines[..motion_at]);
        let joints = parse_hierarchy(&mut tokens, names)?;

        let mut channel_columns = Vec::with_capacity(joints.len());
        let mut channel_count = 0;
        for joint in &joints {
            channel_columns.push(channel_count);
            channel_count += joint.channels.len();
        }

        log::debug!("[BVH] 层次解析完成: {} 个关节, {} 个通道", joints.len(), channel_count);

        // 动作段
        let mut rows = lines[motion_at + 1..]
            .iter()
            .filter(|(_, l)| !l.trim().is_empty());

        let (frames_line, frame_count) = match rows.next() {
            Some(&(line, l)) => {
                let count = parse_header(line, l, &["Frames:"])?
                    .parse::<usize>()
                    .map_err(|e| RetargetError::parse(line, format!("帧数无效: {}", e)))?;
                (line, count)
            }
            None => return Err(RetargetError::parse(lines.len(), "缺少 Frames:")),
        };

        let expected = frame_count
            .checked_mul(channel_count)
            .ok_or_else(|| RetargetError::parse(frames_line, format!("帧数 {} 过大", frame_count)))?;

        let frame_time = match rows.next() {
            Some(&(line, l)) => parse_header(line, l, &["Frame", "Time:"])?
                .parse::<f64>()
                .map_err(|e| RetargetError::parse(line, format!("帧时长无效: {}", e)))?,
            None => return Err(RetargetError::parse(lines.len(), "缺少 Frame Time:")),
        };

        // 声明的帧数不可信，预留容量不超过剩余文本能容纳的行数
        let remaining_rows = lines.len().saturating_sub(frames_line);
        let mut values = Vec::with_capacity(expected.min(remaining_rows.saturating_mul(channel_count)));
        let mut parsed_rows = 0;
        for &(line, l) in rows {
            if parsed_rows == frame_count {
                log::warn!("[BVH] 第 {} 行之后的数据超出声明帧数 {}，已忽略", line, frame_count);
                break;
            }
            let before = values.len();
            for token in l.split_whitespace() {
                let v = token
                    .parse::<f64>()
                    .map_err(|e| RetargetError::parse(line, format!("通道值 '{}' 无效: {}", token, e)))?;
                values.push(v);
            }
            let found = values.len() - before;
            if found != channel_count {
                return Err(RetargetError::parse(
                    line,
                    format!("每帧应有 {} 个通道值，实际 {}", channel_count, found),
                ));
            }
            parsed_rows += 1;
        }

        if parsed_rows < frame_count {
            return Err(RetargetError::parse(
                lines.len(),
                format!("声明 {} 帧，实际只有 {} 帧", frame_count, parsed_rows),
            ));
        }

        log::debug!("[BVH] 动作解析完成: {} 帧, 帧时长 {}", frame_count, frame_time);

        Ok(Self {
            joints,
            channel_columns,
            channel_count,
            frame_time,
            frame_count,
            values,
        })
    }

    /// 根关节名称
    pub fn root_name(&self) -> &str {
        // 解析保证至少有一个 ROOT
        self.joints.first().map(|j| j.name.as_str()).unwrap_or("")
    }

    /// 每行通道总数
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }
}

impl MotionSource for BvhFile {
    fn joints(&self) -> &[JointDecl] {
        &self.joints
    }

    fn channel_value(&self, frame: usize, joint: usize, channel: Channel) -> Option<f64> {
        if frame >= self.frame_count {
            return None;
        }
        let decl = self.joints.get(joint)?;
        let slot = decl.channels.iter().position(|&c| c == channel)?;
        let column = self.channel_columns[joint] + slot;
        self.values.get(frame * self.channel_count + column).copied()
    }

    fn frame_time(&self) -> f64 {
        self.frame_time
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }
}

// ============================================================================
// 层次段解析
// ============================================================================

/// 带行号的记号流
struct Tokens<'a> {
    tokens: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(lines: &[(usize, &'a str)]) -> Self {
        let tokens = lines
            .iter()
            .flat_map(|&(line, l)| l.split_whitespace().map(move |t| (line, t)))
            .collect();
        Self { tokens, pos: 0 }
    }

    /// 当前行号（流结束时为最后一行）
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|&(line, _)| line)
            .unwrap_or(0)
    }

    fn next(&mut self) -> Result<&'a str> {
        match self.tokens.get(self.pos) {
            Some(&(_, t)) => {
                self.pos += 1;
                Ok(t)
            }
            None => Err(RetargetError::parse(self.line(), "层次段意外结束")),
        }
    }

    fn expect(&mut self, keyword: &str) -> Result<()> {
        let line = self.line();
        let token = self.next()?;
        if token == keyword {
            Ok(())
        } else {
            Err(RetargetError::parse(line, format!("期望 '{}'，实际为 '{}'", keyword, token)))
        }
    }

    fn next_f64(&mut self) -> Result<f64> {
        let line = self.line();
        let token = self.next()?;
        token
            .parse()
            .map_err(|e| RetargetError::parse(line, format!("数值 '{}' 无效: {}", token, e)))
    }

    fn next_vec3(&mut self) -> Result<DVec3> {
        Ok(DVec3::new(self.next_f64()?, self.next_f64()?, self.next_f64()?))
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

fn parse_hierarchy(tokens: &mut Tokens<'_>, names: &ChannelNames) -> Result<Vec<JointDecl>> {
    tokens.expect("HIERARCHY")?;
    tokens.expect("ROOT")?;

    let mut joints = Vec::new();
    parse_joint(tokens, names, None, &mut joints)?;

    if !tokens.is_empty() {
        let line = tokens.line();
        return Err(RetargetError::parse(line, "只支持单个 ROOT"));
    }
    Ok(joints)
}

/// 递归解析 ROOT/JOINT 块（名称记号之后开始）
fn parse_joint(
    tokens: &mut Tokens<'_>,
    names: &ChannelNames,
    parent: Option<usize>,
    joints: &mut Vec<JointDecl>,
) -> Result<()> {
    let name = tokens.next()?.to_string();
    if joints.iter().any(|j| j.name == name) {
        log::warn!("[BVH] 关节名称重复: '{}'，查找时以第一个为准", name);
    }
    tokens.expect("{")?;

    let index = joints.len();
    joints.push(JointDecl {
        name,
        parent,
        offset: DVec3::ZERO,
        channels: Vec::new(),
        end_site: None,
    });

    loop {
        let line = tokens.line();
        match tokens.next()? {
            "OFFSET" => joints[index].offset = tokens.next_vec3()?,
            "CHANNELS" => {
                let count_token = tokens.next()?;
                let count: usize = count_token
                    .parse()
                    .map_err(|e| RetargetError::parse(line, format!("通道数 '{}' 无效: {}", count_token, e)))?;
                let mut channels = Vec::with_capacity(count);
                for _ in 0..count {
                    let token = tokens.next()?;
                    let channel = names
                        .lookup(token)
                        .ok_or_else(|| RetargetError::parse(line, format!("未知通道 '{}'", token)))?;
                    channels.push(channel);
                }
                joints[index].channels = channels;
            }
            "JOINT" => parse_joint(tokens, names, Some(index), joints)?,
            "End" => {
                tokens.expect("Site")?;
                tokens.expect("{")?;
                tokens.expect("OFFSET")?;
                let offset = tokens.next_vec3()?;
                tokens.expect("}")?;
                if joints[index].end_site.is_none() {
                    joints[index].end_site = Some(offset);
                }
            }
            "}" => return Ok(()),
            other => {
                return Err(RetargetError::parse(line, format!("意外的记号 '{}'", other)));
            }
        }
    }
}

/// 解析 `Frames: N` / `Frame Time: t` 头部，返回数值记号
fn parse_header<'a>(line: usize, text: &'a str, keywords: &[&str]) -> Result<&'a str> {
    let mut parts = text.split_whitespace();
    for keyword in keywords {
        match parts.next() {
            Some(t) if t == *keyword => {}
            _ => {
                return Err(RetargetError::parse(line, format!("期望 '{}'", keywords.join(" "))));
            }
        }
    }
    parts
        .next()
        .ok_or_else(|| RetargetError::parse(line, format!("'{}' 缺少数值", keywords.join(" "))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
HIERARCHY
ROOT Hips
{
\tOFFSET 0.0 0.0 0.0
\tCHANNELS 6 Xposition Yposition Zposition Zrotation Yrotation Xrotation
\tJOINT Chest
\t{
\t\tOFFSET 0.0 10.0 0.0
\t\tCHANNELS 3 Zrotation Xrotation Yrotation
\t\tEnd Site
\t\t{
\t\t\tOFFSET 0.0 5.0 0.0
\t\t}
\t}
\tJOINT Leg
\t{
\t\tOFFSET 2.0 -1.0 0.0
\t\tCHANNELS 3 Zrotation Xrotation Yrotation
\t}
}
MOTION
Frames: 2
Frame Time: 0.0333333
1.0 2.0 3.0 10.0 20.0 30.0 0.0 0.0 0.0 1.0 2.0 3.0
4.0 5.0 6.0 40.0 50.0 60.0 7.0 8.0 9.0 0.0 0.0 0.0
";

    #[test]
    fn test_parse_hierarchy() {
        let bvh = BvhFile::load_from_str(SAMPLE, &ChannelNames::default()).unwrap();
        assert_eq!(bvh.root_name(), "Hips");
        assert_eq!(bvh.joints().len(), 3);
        assert_eq!(bvh.channel_count(), 12);

        let chest = &bvh.joints()[1];
        assert_eq!(chest.parent, Some(0));
        assert_eq!(chest.offset, DVec3::new(0.0, 10.0, 0.0));
        assert_eq!(chest.end_site, Some(DVec3::new(0.0, 5.0, 0.0)));
        assert_eq!(
            chest.channels,
            vec![Channel::Zrotation, Channel::Xrotation, Channel::Yrotation]
        );
        assert_eq!(bvh.children_of("Hips"), vec!["Chest", "Leg"]);
        assert_eq!(bvh.end_site("Leg"), None);
    }

    #[test]
    fn test_parse_motion() {
        let bvh = BvhFile::load_from_str(SAMPLE, &ChannelNames::default()).unwrap();
        assert_eq!(bvh.frame_count(), 2);
        assert!((bvh.frame_time() - 0.0333333).abs() < 1e-12);

        assert_eq!(bvh.channel_value(0, 0, Channel::Xposition), Some(1.0));
        assert_eq!(bvh.channel_value(1, 0, Channel::Xrotation), Some(60.0));
        assert_eq!(bvh.channel_value_by_name(1, "Chest", Channel::Xrotation), Some(8.0));
        assert_eq!(bvh.channel_value_by_name(0, "Leg", Channel::Yrotation), Some(3.0));
        assert_eq!(bvh.channel_value(0, 1, Channel::Xposition), None);
        assert_eq!(bvh.channel_value(2, 0, Channel::Xposition), None);
    }

    #[test]
    fn test_wrong_row_length_is_error() {
        let text = SAMPLE.replace("4.0 5.0 6.0 40.0", "4.0 5.0 40.0");
        match BvhFile::load_from_str(&text, &ChannelNames::default()) {
            Err(RetargetError::BvhParse { line, .. }) => assert_eq!(line, 25),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_frames_is_error() {
        let text = SAMPLE.replace("Frames: 2", "Frames: 3");
        assert!(BvhFile::load_from_str(&text, &ChannelNames::default()).is_err());
    }

    #[test]
    fn test_huge_frame_count_is_error() {
        let text = SAMPLE.replace("Frames: 2", "Frames: 100000000000000000");
        assert!(matches!(
            BvhFile::load_from_str(&text, &ChannelNames::default()),
            Err(RetargetError::BvhParse { .. })
        ));

        // 帧数 × 通道数溢出
        let text = SAMPLE.replace("Frames: 2", &format!("Frames: {}", usize::MAX));
        assert!(matches!(
            BvhFile::load_from_str(&text, &ChannelNames::default()),
            Err(RetargetError::BvhParse { line: 22, .. })
        ));
    }

    #[test]
    fn test_unknown_channel_is_error() {
        let text = SAMPLE.replace("CHANNELS 3 Zrotation Xrotation Yrotation\n\t\tEnd", "CHANNELS 3 Zrot Xrotation Yrotation\n\t\tEnd");
        assert!(matches!(
            BvhFile::load_from_str(&text, &ChannelNames::default()),
            Err(RetargetError::BvhParse { line: 9, .. })
        ));
    }

    #[test]
    fn test_custom_channel_names() {
        let names = ChannelNames {
            position: ["Xposition".into(), "Yposition".into(), "Zposition".into()],
            rotation: ["Xrot".into(), "Yrot".into(), "Zrot".into()],
        };
        let text = SAMPLE
            .replace("Zrotation", "Zrot")
            .replace("Xrotation", "Xrot")
            .replace("Yrotation", "Yrot");
        let bvh = BvhFile::load_from_str(&text, &names).unwrap();
        assert_eq!(bvh.joints()[2].channels[0], Channel::Zrotation);
    }
}
