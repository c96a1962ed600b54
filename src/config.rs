use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::feedback::CodePolicy;
use crate::guard::Variant;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub actuator: ActuatorConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GuardConfig {
    /// hip_center / shoulder_center
    #[serde(default)]
    pub variant: Variant,
    /// 利き手反転（フレームで指定が無いときの既定値）
    #[serde(default)]
    pub mirror_stance: bool,
    /// 未指定なら構成ごとの既定
    #[serde(default)]
    pub code_policy: Option<CodePolicy>,
}

impl GuardConfig {
    pub fn code_policy(&self) -> CodePolicy {
        self.code_policy
            .unwrap_or_else(|| self.variant.default_code_policy())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    /// 教師データ (JSON配列)
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f32,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_momentum")]
    pub momentum: f32,
    /// 隠れ層サイズ。未指定なら入力数から決める
    #[serde(default)]
    pub hidden_layers: Option<Vec<usize>>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_log_period")]
    pub log_period: usize,
}

fn default_data_path() -> String { "trainingdata.json".to_string() }
fn default_iterations() -> usize { 1000 }
fn default_error_threshold() -> f32 { 0.005 }
fn default_learning_rate() -> f32 { 0.3 }
fn default_momentum() -> f32 { 0.1 }
fn default_seed() -> u64 { 42 }
fn default_log_period() -> usize { 100 }

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            iterations: default_iterations(),
            error_threshold: default_error_threshold(),
            learning_rate: default_learning_rate(),
            momentum: default_momentum(),
            hidden_layers: None,
            seed: default_seed(),
            log_period: default_log_period(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ActuatorConfig {
    /// 1バイト書き込み先（シリアルデバイス等）。未指定なら送らない
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    Tcp,
    Replay,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub mode: SourceMode,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_replay_path")]
    pub replay_path: String,
}

fn default_listen_addr() -> String { "0.0.0.0:9100".to_string() }
fn default_replay_path() -> String { "landmarks.jsonl".to_string() }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::default(),
            listen_addr: default_listen_addr(),
            replay_path: default_replay_path(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid config")?;
        Ok(config)
    }

    /// 読めなければ既定値（警告のみ）
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}
