use serde::{Deserialize, Serialize};

use super::label::GuardLabel;
use crate::feedback::CodePolicy;
use crate::pose::Joint;

/// デプロイ構成
///
/// - `HipCenter`: 腰中点を原点にしたガード判定（主構成）
/// - `ShoulderCenter`: 肩中点を原点にしたパンチフォーム判定（縮小ランドマーク）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    HipCenter,
    ShoulderCenter,
}

const HIP_CENTER_JOINTS: &[Joint] = &[
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftEar,
    Joint::RightEar,
    Joint::LeftJaw,
    Joint::RightJaw,
    Joint::HeadCenter,
];

const SHOULDER_CENTER_JOINTS: &[Joint] = &[
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftHip,
    Joint::RightHip,
];

/// 優先度順。位置+1 がアクチュエータ用コード
const HIP_CENTER_LABELS: &[GuardLabel] = &[
    GuardLabel::LeftElbow,
    GuardLabel::RightElbow,
    GuardLabel::LeftWrist,
    GuardLabel::RightWrist,
    GuardLabel::LeftHip,
    GuardLabel::RightHip,
    GuardLabel::Head,
];

const SHOULDER_CENTER_LABELS: &[GuardLabel] = &[
    GuardLabel::LeftElbow,
    GuardLabel::RightElbow,
    GuardLabel::LeftWrist,
    GuardLabel::RightWrist,
];

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::HipCenter => "hip_center",
            Variant::ShoulderCenter => "shoulder_center",
        }
    }

    /// 正規化の原点にする左右ペア
    pub fn anchor_pair(&self) -> (Joint, Joint) {
        match self {
            Variant::HipCenter => (Joint::LeftHip, Joint::RightHip),
            Variant::ShoulderCenter => (Joint::LeftShoulder, Joint::RightShoulder),
        }
    }

    /// NamedPoseFrame に載せる関節
    pub fn joints(&self) -> &'static [Joint] {
        match self {
            Variant::HipCenter => HIP_CENTER_JOINTS,
            Variant::ShoulderCenter => SHOULDER_CENTER_JOINTS,
        }
    }

    /// 判定ラベル（優先度順）
    pub fn labels(&self) -> &'static [GuardLabel] {
        match self {
            Variant::HipCenter => HIP_CENTER_LABELS,
            Variant::ShoulderCenter => SHOULDER_CENTER_LABELS,
        }
    }

    pub fn default_code_policy(&self) -> CodePolicy {
        match self {
            Variant::HipCenter => CodePolicy::FirstBelowThreshold,
            Variant::ShoulderCenter => CodePolicy::Disabled,
        }
    }

    pub fn warning(&self, label: GuardLabel) -> &'static str {
        match self {
            Variant::HipCenter => match label {
                GuardLabel::LeftElbow => "Left elbow out of guard position!",
                GuardLabel::RightElbow => "Right elbow out of guard position!",
                GuardLabel::LeftWrist => "Left wrist in incorrect position!",
                GuardLabel::RightWrist => "Right wrist in incorrect position!",
                GuardLabel::LeftHip => "Left hip out of stance!",
                GuardLabel::RightHip => "Right hip out of stance!",
                GuardLabel::Head => "Keep your head protected!",
            },
            Variant::ShoulderCenter => match label {
                GuardLabel::LeftElbow => "Left elbow too far from punch position!",
                GuardLabel::RightElbow => "Right elbow too far from punch position!",
                GuardLabel::LeftWrist => "Left wrist in incorrect position!",
                GuardLabel::RightWrist => "Right wrist in incorrect position!",
                GuardLabel::LeftHip => "Left hip out of stance!",
                GuardLabel::RightHip => "Right hip out of stance!",
                GuardLabel::Head => "Keep your head protected!",
            },
        }
    }

    pub fn all_clear(&self) -> &'static str {
        match self {
            Variant::HipCenter => "Guard is correct!",
            Variant::ShoulderCenter => "Punch form is correct!",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
