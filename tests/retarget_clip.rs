//! 端到端：BVH 文件 + 设置文件 → DeepMimic 片段

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use mocap_retarget::rig::default_keyframe_width;
use mocap_retarget::{
    BvhConverter, BvhFile, JointKind, LoopMode, MimicClip, MotionSource, RetargetConfig, RetargetError,
    RetargetingEngine, RigLayout,
};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn settings() -> RetargetConfig {
    RetargetConfig::load(data("settings.json")).unwrap()
}

fn walk(config: &RetargetConfig) -> BvhFile {
    BvhFile::load(data("walk_sample.bvh"), &config.channel_names()).unwrap()
}

#[test]
fn test_clip_shape() {
    let config = settings();
    let bvh = walk(&config);
    let clip = BvhConverter::new(config).unwrap().convert_source(&bvh).unwrap();

    assert_eq!(clip.loop_mode, LoopMode::Wrap);
    assert_eq!(clip.frames.len(), bvh.frame_count());
    assert_eq!(clip.frames.len(), 5);
    for kf in &clip.frames {
        assert_eq!(kf.len(), default_keyframe_width());
        assert!((kf.duration() - 0.0333333).abs() < 1e-12);
        assert!(kf.values().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_root_translation_scaled() {
    let config = settings();
    let bvh = walk(&config);
    let clip = BvhConverter::new(config).unwrap().convert_source(&bvh).unwrap();

    // 第 0 帧：offset (0,90,0) + 通道 (0,90,0)，缩放 0.01，再 (x,y,z) → (z,y,-x)
    let t = clip.frames[0].root_translation().unwrap();
    assert!(t[0].abs() < 1e-9);
    assert!((t[1] - 1.8).abs() < 1e-9);
    assert!(t[2].abs() < 1e-9);

    // 第 3 帧：Z 通道 12 → 目标 x = 0.12
    let t = clip.frames[3].root_translation().unwrap();
    assert!((t[0] - 0.12).abs() < 1e-9);
}

#[test]
fn test_fields_are_unit_quaternions_or_hinge_angles() {
    let config = settings();
    let layout = RigLayout::from_config(&config).unwrap();
    let bvh = walk(&config);
    let clip = RetargetingEngine::new(layout.clone(), LoopMode::None).run(&bvh).unwrap();

    for kf in &clip.frames {
        let values = kf.values();
        let root = kf.root_rotation().unwrap();
        assert!((root.iter().map(|v| v * v).sum::<f64>() - 1.0).abs() < 1e-9);

        let mut at = 8;
        for joint in &layout.joints {
            match joint.kind {
                JointKind::Hinge => {
                    assert!((0.0..=PI).contains(&values[at]), "{}: {}", joint.target_name, values[at]);
                    at += 1;
                }
                _ => {
                    let norm: f64 = values[at..at + 4].iter().map(|v| v * v).sum();
                    assert!((norm - 1.0).abs() < 1e-9, "{}: {}", joint.target_name, norm);
                    at += 4;
                }
            }
        }
        assert_eq!(at, values.len());
    }
}

#[test]
fn test_deterministic_and_parallel_identical() {
    let config = settings();
    let bvh = walk(&config);
    let converter = BvhConverter::new(config).unwrap();

    let first = converter.convert_source(&bvh).unwrap();
    let second = converter.convert_source(&bvh).unwrap();
    let parallel = converter.with_parallel(true).convert_source(&bvh).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, parallel);
}

#[test]
fn test_locked_position_sentinel() {
    let mut config = settings();
    config.pos_locked = true;
    let bvh = walk(&config);
    let clip = BvhConverter::new(config).unwrap().convert_source(&bvh).unwrap();
    for kf in &clip.frames {
        assert_eq!(kf.root_translation(), Some([2.0, 2.0, 2.0]));
    }
}

#[test]
fn test_unknown_source_joint() {
    let mut config = settings();
    config.joint_assignments.insert("neck".into(), "Neck_01".into());
    let bvh = walk(&config);
    let result = BvhConverter::new(config).unwrap().convert_source(&bvh);
    assert!(matches!(result, Err(RetargetError::JointNotFound(name)) if name == "Neck_01"));
}

#[test]
fn test_written_file_reloads() {
    let converter = BvhConverter::new(settings()).unwrap();
    let out = std::env::temp_dir().join(format!("mocap_retarget_walk_{}.txt", std::process::id()));

    let frames = converter.write_file(data("walk_sample.bvh"), &out).unwrap();
    assert_eq!(frames, 5);

    let text = std::fs::read_to_string(&out).unwrap();
    let reloaded: MimicClip = serde_json::from_str(&text).unwrap();
    assert_eq!(reloaded.frames.len(), 5);
    assert_eq!(reloaded.loop_mode, LoopMode::Wrap);

    let _ = std::fs::remove_file(&out);
}
