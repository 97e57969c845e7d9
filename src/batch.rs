//! 批量转换
//!
//! 单个文件失败只记录、不中断；配置错误在处理任何文件之前就返回。

use std::fs;
use std::path::{Path, PathBuf};

use crate::motion::{BvhFile, ChannelNames, MotionSource};
use crate::retarget::{CancelToken, LoopMode, MimicClip, RetargetingEngine};
use crate::rig::{RetargetConfig, RigLayout};
use crate::Result;

// ============================================================================
// 单文件转换
// ============================================================================

/// BVH → DeepMimic 转换器
///
/// 配置在构造时校验一次，之后可重复用于多个文件。
#[derive(Debug, Clone)]
pub struct BvhConverter {
    config: RetargetConfig,
    layout: RigLayout,
    channel_names: ChannelNames,
    parallel: bool,
    cancel: CancelToken,
}

impl BvhConverter {
    /// 从配置创建（校验布局与映射）
    pub fn new(config: RetargetConfig) -> Result<Self> {
        let layout = RigLayout::from_config(&config)?;
        let channel_names = config.channel_names();
        Ok(Self {
            config,
            layout,
            channel_names,
            parallel: false,
            cancel: CancelToken::new(),
        })
    }

    /// 从 JSON 设置文件创建
    pub fn from_settings_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(RetargetConfig::load(path)?)
    }

    /// 是否按帧并行求解
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 覆盖输出的循环模式
    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.config.loop_mode = loop_mode;
        self
    }

    /// 共享取消标记
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[inline]
    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    #[inline]
    pub fn layout(&self) -> &RigLayout {
        &self.layout
    }

    /// 转换任意数据源
    pub fn convert_source<S>(&self, source: &S) -> Result<MimicClip>
    where
        S: MotionSource + Sync + ?Sized,
    {
        let mut engine = RetargetingEngine::new(self.layout.clone(), self.config.loop_mode)
            .with_cancel_token(self.cancel.clone());
        if self.parallel {
            engine.run_parallel(source)
        } else {
            engine.run(source)
        }
    }

    /// 读取并转换一个 BVH 文件
    pub fn convert_file<P: AsRef<Path>>(&self, path: P) -> Result<MimicClip> {
        let bvh = BvhFile::load(path.as_ref(), &self.channel_names)?;
        self.convert_source(&bvh)
    }

    /// 转换并写出，返回帧数
    pub fn write_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<usize> {
        let clip = self.convert_file(input)?;
        clip.write_to(output)?;
        Ok(clip.frames.len())
    }
}

// ============================================================================
// 目录转换
// ============================================================================

/// 目录转换选项
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// 重定向配置
    pub config: RetargetConfig,
    /// 覆盖配置中的循环模式
    pub loop_mode: Option<LoopMode>,
    /// 开始前清空输出目录中的文件
    pub clean: bool,
    /// 按帧并行求解
    pub parallel: bool,
}

/// 目录转换结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// 成功写出的文件
    pub converted: Vec<PathBuf>,
    /// 失败的输入文件及原因
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    /// 全部成功
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// 处理过的文件数
    #[inline]
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }
}

/// 输出文件路径：`<output_dir>/<输入文件名>.txt`
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let mut name = input.file_name().unwrap_or_default().to_os_string();
    name.push(".txt");
    output_dir.join(name)
}

/// 转换输入目录下的全部文件（按文件名排序）
pub fn convert_directory<P, Q>(input_dir: P, output_dir: Q, options: &BatchOptions) -> Result<BatchReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let mut converter = BvhConverter::new(options.config.clone())?.with_parallel(options.parallel);
    if let Some(loop_mode) = options.loop_mode {
        converter = converter.with_loop_mode(loop_mode);
    }

    fs::create_dir_all(output_dir)?;
    if options.clean {
        let removed = clean_directory(output_dir)?;
        log::info!("[Batch] 已清空输出目录: {} 个文件", removed);
    }

    let inputs = list_files(input_dir)?;
    log::info!("[Batch] {} -> {}: {} 个文件", input_dir.display(), output_dir.display(), inputs.len());

    let mut report = BatchReport::default();
    for input in inputs {
        let output = output_path_for(&input, output_dir);
        match converter.write_file(&input, &output) {
            Ok(frames) => {
                log::info!("[Batch] {} ({} 帧)", output.display(), frames);
                report.converted.push(output);
            }
            Err(e) => {
                if e.is_configuration() {
                    log::error!("[Batch] {} 映射失败: {}", input.display(), e);
                } else {
                    log::warn!("[Batch] {} 转换失败: {}", input.display(), e);
                }
                report.failed.push((input, e.to_string()));
            }
        }
    }

    log::info!(
        "[Batch] 完成: 成功 {}, 失败 {}",
        report.converted.len(),
        report.failed.len()
    );
    Ok(report)
}

/// 目录下的普通文件，按名称排序
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// 删除目录下的普通文件，返回删除数量
fn clean_directory(dir: &Path) -> Result<usize> {
    let files = list_files(dir)?;
    for file in &files {
        fs::remove_file(file)?;
    }
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetargetError;

    const TINY: &str = "\
HIERARCHY
ROOT Hips
{
  OFFSET 0 0 0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Left
  {
    OFFSET 1 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 1 0 0
    }
  }
  JOINT Up
  {
    OFFSET 0 1 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0 1 0
    }
  }
}
MOTION
Frames: 2
Frame Time: 0.0333333
0 0 0 0 0 0 0 0 0 0 0 0
1 2 3 0 0 0 0 0 0 0 0 0
";

    fn root_only_config() -> RetargetConfig {
        let mut config = RetargetConfig::default();
        config.joints = Some(vec!["seconds".into(), "hip".into(), "hip".into()]);
        config.dimensions = Some(vec![1, 3, 4]);
        config.joint_assignments.insert("root rot left".into(), "Left".into());
        config.joint_assignments.insert("root rot up".into(), "Up".into());
        config
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mocap_retarget_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_output_path() {
        let out = output_path_for(Path::new("/data/walk.bvh"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/walk.bvh.txt"));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let mut config = RetargetConfig::default();
        config.joint_assignments.remove("hip");
        assert!(matches!(BvhConverter::new(config), Err(RetargetError::Config(_))));
    }

    #[test]
    fn test_convert_directory_isolates_failures() {
        let root = scratch_dir("isolate");
        let input = root.join("in");
        let output = root.join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a_good.bvh"), TINY).unwrap();
        fs::write(input.join("b_bad.bvh"), "HIERARCHY\nROOT").unwrap();
        fs::write(input.join("c_good.bvh"), TINY).unwrap();

        let options = BatchOptions {
            config: root_only_config(),
            loop_mode: Some(LoopMode::Wrap),
            ..Default::default()
        };
        let report = convert_directory(&input, &output, &options).unwrap();

        assert_eq!(report.total(), 3);
        assert!(!report.is_success());
        assert_eq!(report.converted, vec![output.join("a_good.bvh.txt"), output.join("c_good.bvh.txt")]);
        assert_eq!(report.failed[0].0, input.join("b_bad.bvh"));

        let text = fs::read_to_string(output.join("a_good.bvh.txt")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["Loop"], "wrap");
        assert_eq!(value["Frames"].as_array().unwrap().len(), 2);
        assert_eq!(value["Frames"][1][1], 3.0);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_clean_removes_stale_outputs() {
        let root = scratch_dir("clean");
        let input = root.join("in");
        let output = root.join("out");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.txt"), "old").unwrap();

        let options = BatchOptions {
            config: root_only_config(),
            clean: true,
            ..Default::default()
        };
        let report = convert_directory(&input, &output, &options).unwrap();

        assert_eq!(report.total(), 0);
        assert!(!output.join("stale.txt").exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_parallel_converter_matches_sequential() {
        let bvh = BvhFile::load_from_str(TINY, &ChannelNames::default()).unwrap();
        let converter = BvhConverter::new(root_only_config()).unwrap();
        let sequential = converter.convert_source(&bvh).unwrap();
        let parallel = converter.with_parallel(true).convert_source(&bvh).unwrap();
        assert_eq!(sequential, parallel);
    }
}
