//! 検出器の固定インデックス出力 → 名前付き関節フレーム

use std::collections::BTreeMap;

use super::keypoint::{Keypoint, KeypointIndex, Pose};
use crate::guard::Variant;

/// 耳→顎 のY方向オフセット（検出器座標）
pub const JAW_OFFSET_Y: f32 = 35.0;
/// 耳の中点 → 頭頂 のY方向オフセット（上向き）
pub const HEAD_OFFSET_Y: f32 = 50.0;
/// 頭中心を作るのに必要な耳の信頼度
pub const EAR_CONFIDENCE_FLOOR: f32 = 0.4;

/// 意味のある関節キー
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Joint {
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftShoulder,
    RightShoulder,
    LeftEar,
    RightEar,
    LeftJaw,
    RightJaw,
    HeadCenter,
}

impl Joint {
    /// 特徴量キーに使う名前
    pub fn name(&self) -> &'static str {
        match self {
            Joint::LeftElbow => "leftElbow",
            Joint::RightElbow => "rightElbow",
            Joint::LeftWrist => "leftWrist",
            Joint::RightWrist => "rightWrist",
            Joint::LeftHip => "leftHip",
            Joint::RightHip => "rightHip",
            Joint::LeftShoulder => "leftShoulder",
            Joint::RightShoulder => "rightShoulder",
            Joint::LeftEar => "leftEar",
            Joint::RightEar => "rightEar",
            Joint::LeftJaw => "leftJaw",
            Joint::RightJaw => "rightJaw",
            Joint::HeadCenter => "headCenter",
        }
    }

    /// ミラー時に入れ替える相手。耳・顎・頭中心は入れ替えない
    pub fn mirror_partner(&self) -> Option<Joint> {
        match self {
            Joint::LeftElbow => Some(Joint::RightElbow),
            Joint::RightElbow => Some(Joint::LeftElbow),
            Joint::LeftWrist => Some(Joint::RightWrist),
            Joint::RightWrist => Some(Joint::LeftWrist),
            Joint::LeftHip => Some(Joint::RightHip),
            Joint::RightHip => Some(Joint::LeftHip),
            Joint::LeftShoulder => Some(Joint::RightShoulder),
            Joint::RightShoulder => Some(Joint::LeftShoulder),
            _ => None,
        }
    }

    /// 検出器の生キーポイントから直接取れる関節のインデックス
    fn landmark_index(&self) -> Option<KeypointIndex> {
        match self {
            Joint::LeftElbow => Some(KeypointIndex::LeftElbow),
            Joint::RightElbow => Some(KeypointIndex::RightElbow),
            Joint::LeftWrist => Some(KeypointIndex::LeftWrist),
            Joint::RightWrist => Some(KeypointIndex::RightWrist),
            Joint::LeftHip => Some(KeypointIndex::LeftHip),
            Joint::RightHip => Some(KeypointIndex::RightHip),
            Joint::LeftShoulder => Some(KeypointIndex::LeftShoulder),
            Joint::RightShoulder => Some(KeypointIndex::RightShoulder),
            Joint::LeftEar => Some(KeypointIndex::LeftEar),
            Joint::RightEar => Some(KeypointIndex::RightEar),
            Joint::LeftJaw | Joint::RightJaw | Joint::HeadCenter => None,
        }
    }
}

impl std::fmt::Display for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 奥行きスケール推定用の生ペア（肩・腰・肘）
///
/// 構成によっては肩が特徴量に含まれないので、フレームとは別に保持する。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthReference {
    pub shoulders: [Keypoint; 2],
    pub hips: [Keypoint; 2],
    pub elbows: [Keypoint; 2],
}

impl DepthReference {
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            shoulders: [
                *pose.get(KeypointIndex::LeftShoulder),
                *pose.get(KeypointIndex::RightShoulder),
            ],
            hips: [
                *pose.get(KeypointIndex::LeftHip),
                *pose.get(KeypointIndex::RightHip),
            ],
            elbows: [
                *pose.get(KeypointIndex::LeftElbow),
                *pose.get(KeypointIndex::RightElbow),
            ],
        }
    }

    /// 肩・腰・肘の順
    pub fn pairs(&self) -> [&[Keypoint; 2]; 3] {
        [&self.shoulders, &self.hips, &self.elbows]
    }

    fn slot_mut(&mut self, joint: Joint) -> Option<&mut Keypoint> {
        match joint {
            Joint::LeftShoulder => Some(&mut self.shoulders[0]),
            Joint::RightShoulder => Some(&mut self.shoulders[1]),
            Joint::LeftHip => Some(&mut self.hips[0]),
            Joint::RightHip => Some(&mut self.hips[1]),
            Joint::LeftElbow => Some(&mut self.elbows[0]),
            Joint::RightElbow => Some(&mut self.elbows[1]),
            _ => None,
        }
    }

    fn translated(&self, dx: f32, dy: f32) -> Self {
        let shift = |pair: &[Keypoint; 2]| [pair[0].translated(dx, dy), pair[1].translated(dx, dy)];
        Self {
            shoulders: shift(&self.shoulders),
            hips: shift(&self.hips),
            elbows: shift(&self.elbows),
        }
    }
}

/// 1tick分の名前付き関節フレーム。キーが無い = 計算不能
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedPoseFrame {
    joints: BTreeMap<Joint, Keypoint>,
    depth_reference: DepthReference,
}

impl NamedPoseFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// 関節を追加。肩・腰・肘なら奥行き参照も更新する
    pub fn insert(&mut self, joint: Joint, keypoint: Keypoint) {
        if let Some(slot) = self.depth_reference.slot_mut(joint) {
            *slot = keypoint;
        }
        self.joints.insert(joint, keypoint);
    }

    pub fn with(mut self, joint: Joint, keypoint: Keypoint) -> Self {
        self.insert(joint, keypoint);
        self
    }

    pub fn with_depth_reference(mut self, depth_reference: DepthReference) -> Self {
        self.depth_reference = depth_reference;
        self
    }

    pub fn get(&self, joint: Joint) -> Option<&Keypoint> {
        self.joints.get(&joint)
    }

    pub fn joints(&self) -> impl Iterator<Item = (Joint, &Keypoint)> {
        self.joints.iter().map(|(j, kp)| (*j, kp))
    }

    pub fn depth_reference(&self) -> &DepthReference {
        &self.depth_reference
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 全点（奥行き参照含む）を平行移動したフレーム
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            joints: self
                .joints
                .iter()
                .map(|(j, kp)| (*j, kp.translated(dx, dy)))
                .collect(),
            depth_reference: self.depth_reference.translated(dx, dy),
        }
    }
}

/// 検出器出力を構成ごとの NamedPoseFrame に変換する
#[derive(Debug, Clone, Copy)]
pub struct SchemaAdapter {
    variant: Variant,
}

impl SchemaAdapter {
    pub fn new(variant: Variant) -> Self {
        Self { variant }
    }

    /// 長さ不足・空（姿勢なし）なら None
    pub fn adapt(&self, landmarks: &[Keypoint]) -> Option<NamedPoseFrame> {
        let Some(pose) = Pose::from_slice(landmarks) else {
            if !landmarks.is_empty() {
                log::debug!(
                    "expected {} landmarks, got {}; treating as no pose",
                    KeypointIndex::COUNT,
                    landmarks.len()
                );
            }
            return None;
        };
        Some(self.adapt_pose(&pose))
    }

    pub fn adapt_pose(&self, pose: &Pose) -> NamedPoseFrame {
        let left_ear = *pose.get(KeypointIndex::LeftEar);
        let right_ear = *pose.get(KeypointIndex::RightEar);

        let mut frame = NamedPoseFrame::new().with_depth_reference(DepthReference::from_pose(pose));
        for &joint in self.variant.joints() {
            let keypoint = match joint {
                Joint::LeftJaw => Some(jaw_point(&left_ear)),
                Joint::RightJaw => Some(jaw_point(&right_ear)),
                Joint::HeadCenter => head_center(&left_ear, &right_ear),
                other => other.landmark_index().map(|idx| *pose.get(idx)),
            };
            if let Some(kp) = keypoint {
                frame.joints.insert(joint, kp);
            }
        }
        frame
    }
}

fn jaw_point(ear: &Keypoint) -> Keypoint {
    Keypoint::new(ear.x, ear.y + JAW_OFFSET_Y, ear.confidence)
}

/// 両耳が信頼できるときだけ頭中心を作る。信頼度は 1.0 固定
///
/// x は両耳の中点、y は高い方の耳（画像座標で小さい y）から上へずらす。
fn head_center(left_ear: &Keypoint, right_ear: &Keypoint) -> Option<Keypoint> {
    if !left_ear.is_valid(EAR_CONFIDENCE_FLOOR) || !right_ear.is_valid(EAR_CONFIDENCE_FLOOR) {
        return None;
    }
    let x = (left_ear.x + right_ear.x) / 2.0;
    let y = left_ear.y.min(right_ear.y) - HEAD_OFFSET_Y;
    Some(Keypoint::new(x, y, 1.0))
}
