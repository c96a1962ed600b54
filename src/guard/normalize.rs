use std::collections::BTreeMap;

use crate::pose::{DepthReference, Joint, Keypoint, NamedPoseFrame};

use super::variant::Variant;

/// 奥行きペアとして数える端点の信頼度
pub const DEPTH_CONFIDENCE_FLOOR: f32 = 0.4;
/// 有効なペアが無いときの奥行きスケール
pub const DEFAULT_DEPTH_SCALE: f32 = 200.0;

/// 原点 = 指定ペアの中点（信頼度は見ない）
///
/// 片方しか無ければその点、両方無ければ (0, 0)。
pub fn anchor_point(frame: &NamedPoseFrame, pair: (Joint, Joint)) -> (f32, f32) {
    match (frame.get(pair.0), frame.get(pair.1)) {
        (Some(a), Some(b)) => {
            let mid = a.midpoint(b);
            (mid.x, mid.y)
        }
        (Some(p), None) | (None, Some(p)) => (p.x, p.y),
        (None, None) => {
            log::debug!("anchor pair {}/{} absent, using origin", pair.0, pair.1);
            (0.0, 0.0)
        }
    }
}

/// 肩・腰・肘ペア間距離の平均。常に有限かつ正の値を返す
pub fn depth_scale(reference: &DepthReference) -> f32 {
    let valid: Vec<f32> = reference
        .pairs()
        .iter()
        .filter(|pair| {
            pair[0].is_valid(DEPTH_CONFIDENCE_FLOOR) && pair[1].is_valid(DEPTH_CONFIDENCE_FLOOR)
        })
        .map(|pair| pair[0].distance_to(&pair[1]))
        // 長さゼロ・非有限のペアは除数にできない
        .filter(|d| d.is_finite() && *d > f32::EPSILON)
        .collect();

    if valid.is_empty() {
        return DEFAULT_DEPTH_SCALE;
    }
    let mean = valid.iter().sum::<f32>() / valid.len() as f32;
    if mean.is_finite() && mean > f32::EPSILON {
        mean
    } else {
        DEFAULT_DEPTH_SCALE
    }
}

/// 原点・スケール・利き手に依存しない関節フレーム
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPoseFrame {
    joints: BTreeMap<Joint, Keypoint>,
    depth_scale: f32,
}

impl NormalizedPoseFrame {
    pub fn get(&self, joint: Joint) -> Option<&Keypoint> {
        self.joints.get(&joint)
    }

    pub fn joints(&self) -> impl Iterator<Item = (Joint, &Keypoint)> {
        self.joints.iter().map(|(j, kp)| (*j, kp))
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 正規化に使った除数
    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    /// X反転 + 肘・手首・腰（・肩）の左右入れ替え。2回適用で元に戻る
    pub fn mirrored(&self) -> Self {
        let joints = self
            .joints
            .iter()
            .map(|(joint, kp)| {
                let target = joint.mirror_partner().unwrap_or(*joint);
                (target, Keypoint::new(-kp.x, kp.y, kp.confidence))
            })
            .collect();
        Self {
            joints,
            depth_scale: self.depth_scale,
        }
    }
}

/// 正規化エンジン
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    anchor_pair: (Joint, Joint),
}

impl Normalizer {
    pub fn new(anchor_pair: (Joint, Joint)) -> Self {
        Self { anchor_pair }
    }

    pub fn for_variant(variant: Variant) -> Self {
        Self::new(variant.anchor_pair())
    }

    pub fn normalize(&self, frame: &NamedPoseFrame, mirror_stance: bool) -> NormalizedPoseFrame {
        let (ax, ay) = anchor_point(frame, self.anchor_pair);
        let scale = depth_scale(frame.depth_reference());

        let joints = frame
            .joints()
            .map(|(joint, kp)| {
                let x = (kp.x - ax) / scale;
                let y = (kp.y - ay) / scale;
                (joint, Keypoint::new(x, y, kp.confidence))
            })
            .collect();

        let normalized = NormalizedPoseFrame {
            joints,
            depth_scale: scale,
        };
        if mirror_stance {
            normalized.mirrored()
        } else {
            normalized
        }
    }
}
