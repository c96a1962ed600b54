use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::guard::{FeatureVector, GuardLabel};

/// 教師データ1件: `{"input": {..}, "output": {"leftElbow": 1, ..}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub input: FeatureVector,
    pub output: BTreeMap<GuardLabel, f32>,
}

impl LabeledSample {
    pub fn new(input: FeatureVector, output: BTreeMap<GuardLabel, f32>) -> Self {
        Self { input, output }
    }

    /// コーパスに追記できる整形済みJSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn parse_samples(json: &str) -> Result<Vec<LabeledSample>> {
    serde_json::from_str(json).context("Failed to parse training samples")
}

pub fn load_samples<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledSample>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read training data: {}", path.display()))?;
    parse_samples(&content)
}

/// ラベル値が 0/1 であること、対象ラベルが揃っていることを確認
pub fn validate_labels(output: &BTreeMap<GuardLabel, f32>, labels: &[GuardLabel]) -> Result<()> {
    for label in labels {
        match output.get(label) {
            Some(v) if *v == 0.0 || *v == 1.0 => {}
            Some(v) => bail!("label {} must be 0 or 1, got {}", label, v),
            None => bail!("label {} missing", label),
        }
    }
    if let Some(extra) = output.keys().find(|l| !labels.contains(*l)) {
        bail!("label {} is not tracked by this variant", extra);
    }
    Ok(())
}

/// 学習セット全体を検証し、共通の特徴量キー（ソート済み）を返す
///
/// 1件でも不正なら学習全体を失敗させる。
pub fn validate_corpus(samples: &[LabeledSample], labels: &[GuardLabel]) -> Result<Vec<String>> {
    let Some(first) = samples.first() else {
        bail!("training set is empty");
    };
    let reference: BTreeSet<&str> = first.input.keys().collect();
    if reference.is_empty() {
        bail!("sample 0 has no input features");
    }

    for (i, sample) in samples.iter().enumerate() {
        let keys: BTreeSet<&str> = sample.input.keys().collect();
        if keys != reference {
            let missing: Vec<&str> = reference.difference(&keys).copied().collect();
            let unexpected: Vec<&str> = keys.difference(&reference).copied().collect();
            bail!(
                "sample {} feature keys differ from sample 0 (missing: {:?}, unexpected: {:?})",
                i,
                missing,
                unexpected
            );
        }
        if let Some((key, value)) = sample.input.iter().find(|(_, v)| !v.is_finite()) {
            bail!("sample {} feature {} is not finite ({})", i, key, value);
        }
        validate_labels(&sample.output, labels).with_context(|| format!("sample {}", i))?;
    }

    Ok(reference.into_iter().map(str::to_string).collect())
}
