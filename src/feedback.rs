use serde::{Deserialize, Serialize};

use crate::classifier::Prediction;
use crate::guard::{GuardLabel, Variant};

/// これ未満の信頼度は「崩れている」とみなす
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// アクチュエータ用コードの出し方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePolicy {
    /// 優先度順で最初に閾値を下回ったラベルの位置 (1..N)
    FirstBelowThreshold,
    /// コードを出さない（メッセージは同じ）
    Disabled,
}

/// 1tick分のフィードバック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub lines: Vec<String>,
    pub code: Option<u8>,
    /// 閾値を下回ったラベル（優先度順）
    pub flagged: Vec<GuardLabel>,
}

impl Feedback {
    pub fn is_all_clear(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn message(&self) -> String {
        self.lines.join("\n")
    }
}

/// 判定エンジン
#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    variant: Variant,
    policy: CodePolicy,
}

impl DecisionEngine {
    pub fn new(variant: Variant, policy: CodePolicy) -> Self {
        Self { variant, policy }
    }

    pub fn for_variant(variant: Variant) -> Self {
        Self::new(variant, variant.default_code_policy())
    }

    pub fn policy(&self) -> CodePolicy {
        self.policy
    }

    /// 閾値未満のラベルは全て警告文を追加、コードは最初の1件だけ
    ///
    /// Prediction に無いラベルは判定しない。
    pub fn decide(&self, prediction: &Prediction) -> Feedback {
        let mut lines = Vec::new();
        let mut flagged = Vec::new();
        let mut code = None;

        for (position, &label) in self.variant.labels().iter().enumerate() {
            let Some(score) = prediction.get(label) else {
                continue;
            };
            if score >= CONFIDENCE_THRESHOLD {
                continue;
            }
            lines.push(self.variant.warning(label).to_string());
            flagged.push(label);
            if code.is_none() && self.policy == CodePolicy::FirstBelowThreshold {
                code = Some((position + 1) as u8);
            }
        }

        if lines.is_empty() {
            lines.push(self.variant.all_clear().to_string());
        }

        Feedback {
            lines,
            code,
            flagged,
        }
    }
}
