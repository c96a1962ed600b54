use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::normalize::NormalizedPoseFrame;

/// 分類器入力。`<joint>_x` / `<joint>_y` → 値
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<String, f32>);

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f32) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.0.get(key).copied()
    }

    /// キー順（ソート済み）
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f32)> for FeatureVector {
    fn from_iter<T: IntoIterator<Item = (String, f32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 存在する関節ごとに `_x` と `_y` を出す
pub fn flatten(frame: &NormalizedPoseFrame) -> FeatureVector {
    let mut features = FeatureVector::new();
    for (joint, kp) in frame.joints() {
        features.insert(format!("{}_x", joint.name()), kp.x);
        features.insert(format!("{}_y", joint.name()), kp.y);
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{Normalizer, Variant};
    use crate::pose::{Joint, Keypoint, NamedPoseFrame};

    #[test]
    fn test_single_joint_yields_two_keys() {
        let frame = NamedPoseFrame::new().with(Joint::LeftHip, Keypoint::new(1.0, 2.0, 0.9));
        let normalized = Normalizer::for_variant(Variant::HipCenter).normalize(&frame, false);

        let features = flatten(&normalized);
        let keys: Vec<&str> = features.keys().collect();
        assert_eq!(keys, vec!["leftHip_x", "leftHip_y"]);
    }

    #[test]
    fn test_keys_match_present_joints() {
        let frame = NamedPoseFrame::new()
            .with(Joint::LeftHip, Keypoint::new(100.0, 500.0, 0.9))
            .with(Joint::RightHip, Keypoint::new(300.0, 500.0, 0.9))
            .with(Joint::HeadCenter, Keypoint::new(200.0, 150.0, 1.0));
        let normalized = Normalizer::for_variant(Variant::HipCenter).normalize(&frame, false);

        let features = flatten(&normalized);
        assert_eq!(features.len(), 6);
        assert!(features.get("headCenter_y").is_some());
        assert!(features.get("leftElbow_x").is_none());
        assert_eq!(features.get("leftHip_x"), Some(normalized.get(Joint::LeftHip).unwrap().x));
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let frame = NamedPoseFrame::new()
            .with(Joint::RightWrist, Keypoint::new(3.0, 4.0, 0.9))
            .with(Joint::LeftWrist, Keypoint::new(1.0, 2.0, 0.9));
        let normalized = Normalizer::for_variant(Variant::HipCenter).normalize(&frame, true);
        assert_eq!(flatten(&normalized), flatten(&normalized.clone()));
    }

    #[test]
    fn test_feature_vector_json_is_flat_object() {
        let mut features = FeatureVector::new();
        features.insert("leftHip_x", -0.5);
        let json = serde_json::to_string(&features).unwrap();
        assert_eq!(json, r#"{"leftHip_x":-0.5}"#);
    }
}
