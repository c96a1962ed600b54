use serde::{Deserialize, Serialize};

/// 判定対象の部位ラベル（分類器の出力ユニットと1対1）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardLabel {
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    Head,
}

impl GuardLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardLabel::LeftElbow => "leftElbow",
            GuardLabel::RightElbow => "rightElbow",
            GuardLabel::LeftWrist => "leftWrist",
            GuardLabel::RightWrist => "rightWrist",
            GuardLabel::LeftHip => "leftHip",
            GuardLabel::RightHip => "rightHip",
            GuardLabel::Head => "head",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "leftElbow" => Some(GuardLabel::LeftElbow),
            "rightElbow" => Some(GuardLabel::RightElbow),
            "leftWrist" => Some(GuardLabel::LeftWrist),
            "rightWrist" => Some(GuardLabel::RightWrist),
            "leftHip" => Some(GuardLabel::LeftHip),
            "rightHip" => Some(GuardLabel::RightHip),
            "head" => Some(GuardLabel::Head),
            _ => None,
        }
    }
}

impl std::fmt::Display for GuardLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_names_round_trip_through_parse() {
        for label in [
            GuardLabel::LeftElbow,
            GuardLabel::RightWrist,
            GuardLabel::Head,
        ] {
            assert_eq!(GuardLabel::parse(label.as_str()), Some(label));
        }
        assert_eq!(GuardLabel::parse("leftKnee"), None);
    }

    #[test]
    fn test_label_serde_uses_camel_case() {
        let json = serde_json::to_string(&GuardLabel::LeftElbow).unwrap();
        assert_eq!(json, "\"leftElbow\"");
        let label: GuardLabel = serde_json::from_str("\"rightHip\"").unwrap();
        assert_eq!(label, GuardLabel::RightHip);
    }
}
