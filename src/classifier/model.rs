use anyhow::{bail, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::network::{Network, Trainer};
use super::sample::{validate_corpus, LabeledSample};
use crate::config::TrainingConfig;
use crate::guard::{FeatureVector, GuardLabel};

/// 学習パラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// 反復回数の上限
    pub iterations: usize,
    /// 平均誤差がこれを下回ったら終了
    pub error_threshold: f32,
    pub learning_rate: f32,
    pub momentum: f32,
    /// None なら max(3, 入力数/2) の1層
    pub hidden_layers: Option<Vec<usize>>,
    pub seed: u64,
    /// 進捗ログの間隔（0 で出さない）
    pub log_period: usize,
}

impl TrainingOptions {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            iterations: config.iterations,
            error_threshold: config.error_threshold,
            learning_rate: config.learning_rate,
            momentum: config.momentum,
            hidden_layers: config.hidden_layers.clone(),
            seed: config.seed,
            log_period: config.log_period,
        }
    }

    fn layer_sizes(&self, inputs: usize, outputs: usize) -> Vec<usize> {
        let hidden = match &self.hidden_layers {
            Some(sizes) => sizes.clone(),
            None => vec![(inputs / 2).max(3)],
        };
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(inputs);
        sizes.extend(hidden);
        sizes.push(outputs);
        sizes
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

/// 学習結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    pub iterations: usize,
    pub error: f32,
}

impl TrainingReport {
    pub fn converged(&self, options: &TrainingOptions) -> bool {
        self.error < options.error_threshold
    }
}

/// 部位ごとの正しさ信頼度 (0.0〜1.0)。ラベル優先度順
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    scores: Vec<(GuardLabel, f32)>,
}

impl Prediction {
    pub fn new(scores: Vec<(GuardLabel, f32)>) -> Self {
        Self { scores }
    }

    pub fn get(&self, label: GuardLabel) -> Option<f32> {
        self.scores.iter().find(|(l, _)| *l == label).map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GuardLabel, f32)> + '_ {
        self.scores.iter().copied()
    }
}

/// 学習済みガード分類器
///
/// 推論中は不変。再学習は `train` をやり直すしかない。
#[derive(Debug, Clone, PartialEq)]
pub struct GuardModel {
    feature_keys: Vec<String>,
    labels: Vec<GuardLabel>,
    network: Network,
}

impl GuardModel {
    /// 全サンプルで学習する。不正なサンプルが1件でもあればエラー
    ///
    /// 上限回数までに収束しなくても失敗ではない。
    pub fn train(
        samples: &[LabeledSample],
        labels: &[GuardLabel],
        options: &TrainingOptions,
    ) -> Result<(Self, TrainingReport)> {
        if labels.is_empty() {
            bail!("no labels to train");
        }
        if options.hidden_layers.as_ref().is_some_and(|h| h.contains(&0)) {
            bail!("hidden layer size must be positive");
        }
        let feature_keys = validate_corpus(samples, labels)?;

        let encoded: Vec<(Array1<f32>, Array1<f32>)> = samples
            .iter()
            .map(|s| {
                let input = encode(&feature_keys, &s.input);
                let target = labels.iter().map(|l| s.output[l]).collect::<Array1<f32>>();
                (input, target)
            })
            .collect();

        let sizes = options.layer_sizes(feature_keys.len(), labels.len());
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut trainer = Trainer::new(
            Network::random(&sizes, &mut rng),
            options.learning_rate,
            options.momentum,
        );

        log::info!(
            "Training guard model: {} samples, layers {:?}",
            samples.len(),
            sizes
        );

        let mut error = f32::INFINITY;
        let mut iterations = 0;
        while iterations < options.iterations && error > options.error_threshold {
            iterations += 1;
            let sum: f32 = encoded
                .iter()
                .map(|(input, target)| trainer.train_sample(input.view(), target.view()))
                .sum();
            error = sum / encoded.len() as f32;

            if options.log_period > 0 && iterations % options.log_period == 0 {
                log::info!("iterations: {}, training error: {}", iterations, error);
            }
        }

        let report = TrainingReport { iterations, error };
        let model = Self {
            feature_keys,
            labels: labels.to_vec(),
            network: trainer.into_network(),
        };
        Ok((model, report))
    }

    /// 推論。未学習のキーは無視、欠けたキーは 0 入力
    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let input = encode(&self.feature_keys, features);
        let output = self.network.run(input.view());
        let scores = self
            .labels
            .iter()
            .zip(output.iter())
            .map(|(label, score)| (*label, *score))
            .collect();
        Prediction::new(scores)
    }

    pub fn feature_keys(&self) -> &[String] {
        &self.feature_keys
    }

    pub fn labels(&self) -> &[GuardLabel] {
        &self.labels
    }
}

fn encode(keys: &[String], features: &FeatureVector) -> Array1<f32> {
    keys.iter()
        .map(|k| features.get(k).unwrap_or(0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const LABELS: &[GuardLabel] = &[GuardLabel::LeftElbow, GuardLabel::RightElbow];

    fn sample(lx: f32, rx: f32, left_ok: f32, right_ok: f32) -> LabeledSample {
        let mut input = FeatureVector::new();
        input.insert("leftElbow_x", lx);
        input.insert("rightElbow_x", rx);
        let output = BTreeMap::from([
            (GuardLabel::LeftElbow, left_ok),
            (GuardLabel::RightElbow, right_ok),
        ]);
        LabeledSample::new(input, output)
    }

    /// 肘が体の内側 (|x| 小) なら正しい
    fn corpus() -> Vec<LabeledSample> {
        vec![
            sample(-0.2, 0.2, 1.0, 1.0),
            sample(-1.0, 0.2, 0.0, 1.0),
            sample(-0.2, 1.0, 1.0, 0.0),
            sample(-1.0, 1.0, 0.0, 0.0),
        ]
    }

    fn features(lx: f32, rx: f32) -> FeatureVector {
        sample(lx, rx, 0.0, 0.0).input
    }

    #[test]
    fn test_train_learns_separable_corpus() {
        let options = TrainingOptions::default();
        let (model, report) = GuardModel::train(&corpus(), LABELS, &options).unwrap();

        assert!(report.iterations >= 1 && report.iterations <= options.iterations);
        assert_eq!(model.feature_keys(), &["leftElbow_x", "rightElbow_x"]);

        let good = model.predict(&features(-0.2, 0.2));
        assert!(good.get(GuardLabel::LeftElbow).unwrap() > 0.5);
        assert!(good.get(GuardLabel::RightElbow).unwrap() > 0.5);

        let bad = model.predict(&features(-1.0, 1.0));
        assert!(bad.get(GuardLabel::LeftElbow).unwrap() < 0.5);
        assert!(bad.get(GuardLabel::RightElbow).unwrap() < 0.5);
    }

    #[test]
    fn test_training_stops_at_iteration_cap() {
        let options = TrainingOptions {
            iterations: 3,
            ..TrainingOptions::default()
        };
        let (_, report) = GuardModel::train(&corpus(), LABELS, &options).unwrap();
        assert_eq!(report.iterations, 3);
        assert!(!report.converged(&options));
    }

    #[test]
    fn test_training_is_deterministic_per_seed() {
        let options = TrainingOptions {
            iterations: 50,
            ..TrainingOptions::default()
        };
        let (a, _) = GuardModel::train(&corpus(), LABELS, &options).unwrap();
        let (b, _) = GuardModel::train(&corpus(), LABELS, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_is_pure() {
        let options = TrainingOptions {
            iterations: 20,
            ..TrainingOptions::default()
        };
        let (model, _) = GuardModel::train(&corpus(), LABELS, &options).unwrap();
        let before = model.clone();

        let input = features(-0.5, 0.5);
        let first = model.predict(&input);
        let second = model.predict(&input);
        assert_eq!(first, second);
        assert_eq!(model, before);
    }

    #[test]
    fn test_predict_scores_in_unit_interval_with_partial_input() {
        let options = TrainingOptions {
            iterations: 20,
            ..TrainingOptions::default()
        };
        let (model, _) = GuardModel::train(&corpus(), LABELS, &options).unwrap();

        let mut partial = FeatureVector::new();
        partial.insert("leftElbow_x", -0.3);
        partial.insert("unknown_x", 99.0);
        let prediction = model.predict(&partial);

        let labels: Vec<GuardLabel> = prediction.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, LABELS);
        assert!(prediction.iter().all(|(_, s)| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_train_rejects_malformed_corpus() {
        let mut samples = corpus();
        samples[2].input.insert("headCenter_x", 0.1);
        assert!(GuardModel::train(&samples, LABELS, &TrainingOptions::default()).is_err());
        assert!(GuardModel::train(&[], LABELS, &TrainingOptions::default()).is_err());
    }

    #[test]
    fn test_layer_sizes() {
        let options = TrainingOptions::default();
        assert_eq!(options.layer_sizes(22, 7), vec![22, 11, 7]);
        assert_eq!(options.layer_sizes(2, 2), vec![2, 3, 2]);

        let custom = TrainingOptions {
            hidden_layers: Some(vec![8, 4]),
            ..TrainingOptions::default()
        };
        assert_eq!(custom.layer_sizes(5, 1), vec![5, 8, 4, 1]);
    }
}
