use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;

use crate::classifier::{
    load_samples, validate_labels, GuardModel, LabeledSample, Prediction, TrainingOptions,
    TrainingReport,
};
use crate::config::{GuardConfig, TrainingConfig};
use crate::feedback::{CodePolicy, DecisionEngine, Feedback};
use crate::guard::{flatten, FeatureVector, GuardLabel, Normalizer, Variant};
use crate::pose::{Keypoint, SchemaAdapter};

/// 1tick分の入力
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// 検出器の出力。空なら姿勢なし
    pub keypoints: &'a [Keypoint],
    /// None なら設定の既定値
    pub mirror_stance: Option<bool>,
}

/// 1tick分の出力
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub features: FeatureVector,
    pub prediction: Prediction,
    pub feedback: Feedback,
}

/// tick間で持ち越す唯一の状態（サンプル書き出し用の直近特徴量）
#[derive(Debug, Clone, Default)]
pub struct TickState {
    last_features: Option<FeatureVector>,
}

impl TickState {
    pub fn last_features(&self) -> Option<&FeatureVector> {
        self.last_features.as_ref()
    }
}

/// 教師データを読み込んで学習する（推論ループ開始前に1回だけ）
pub fn train_model(variant: Variant, config: &TrainingConfig) -> Result<(GuardModel, TrainingReport)> {
    let samples = load_samples(&config.data_path)?;
    let options = TrainingOptions::from_config(config);
    let (model, report) = GuardModel::train(&samples, variant.labels(), &options)
        .with_context(|| format!("Training failed on {}", config.data_path))?;

    if report.converged(&options) {
        log::info!(
            "Training complete: error {:.5} after {} iterations",
            report.error,
            report.iterations
        );
    } else {
        log::warn!(
            "Training stopped at iteration cap {} (error {:.5})",
            report.iterations,
            report.error
        );
    }
    Ok((model, report))
}

/// Adapter → Normalizer → Flattener → Classifier → DecisionEngine
///
/// 学習済みモデルは読み取り専用。tick の状態は呼び出し側が `TickState` で持つ。
#[derive(Debug, Clone)]
pub struct GuardPipeline {
    variant: Variant,
    adapter: SchemaAdapter,
    normalizer: Normalizer,
    engine: DecisionEngine,
    model: GuardModel,
    default_mirror_stance: bool,
}

impl GuardPipeline {
    pub fn new(
        variant: Variant,
        model: GuardModel,
        policy: CodePolicy,
        default_mirror_stance: bool,
    ) -> Result<Self> {
        if model.labels() != variant.labels() {
            bail!(
                "model labels {:?} do not match variant {}",
                model.labels(),
                variant
            );
        }
        Ok(Self {
            variant,
            adapter: SchemaAdapter::new(variant),
            normalizer: Normalizer::for_variant(variant),
            engine: DecisionEngine::new(variant, policy),
            model,
            default_mirror_stance,
        })
    }

    pub fn from_config(config: &GuardConfig, model: GuardModel) -> Result<Self> {
        Self::new(
            config.variant,
            model,
            config.code_policy(),
            config.mirror_stance,
        )
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn model(&self) -> &GuardModel {
        &self.model
    }

    /// 1tick処理する。姿勢なしなら Ok(None)、前回の特徴量は捨てる
    pub fn tick(&self, state: &mut TickState, input: &TickInput<'_>) -> Result<Option<TickOutput>> {
        state.last_features = None;

        if let Some(i) = input
            .keypoints
            .iter()
            .position(|kp| !(kp.x.is_finite() && kp.y.is_finite() && kp.confidence.is_finite()))
        {
            bail!("landmark {} is not finite", i);
        }

        let Some(frame) = self.adapter.adapt(input.keypoints) else {
            return Ok(None);
        };

        let mirror = input.mirror_stance.unwrap_or(self.default_mirror_stance);
        let normalized = self.normalizer.normalize(&frame, mirror);
        let features = flatten(&normalized);
        let prediction = self.model.predict(&features);
        let feedback = self.engine.decide(&prediction);

        log::debug!(
            "tick: depth_scale={:.1} mirror={} flagged={:?} code={:?}",
            normalized.depth_scale(),
            mirror,
            feedback.flagged,
            feedback.code
        );

        state.last_features = Some(features.clone());
        Ok(Some(TickOutput {
            features,
            prediction,
            feedback,
        }))
    }

    /// 直近tickの特徴量 + 指定ラベルで教師サンプルを作る
    pub fn capture_sample(
        &self,
        state: &TickState,
        labels: &BTreeMap<GuardLabel, f32>,
    ) -> Result<LabeledSample> {
        let Some(features) = state.last_features() else {
            bail!("No keypoints detected yet");
        };
        validate_labels(labels, self.variant.labels())?;
        Ok(LabeledSample::new(features.clone(), labels.clone()))
    }
}
