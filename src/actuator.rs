//! One-byte feedback codes for an external actuator.
//!
//! The sink is opened for every write and released right after, so nothing
//! is held open between ticks.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::config::ActuatorConfig;

#[allow(async_fn_in_trait)]
pub trait ActuatorSink {
    /// Write exactly one byte.
    async fn write_code(&mut self, code: u8) -> Result<()>;
}

/// Device node or file, e.g. `/dev/ttyUSB0`.
#[derive(Debug, Clone)]
pub struct DeviceSink {
    path: PathBuf,
}

impl DeviceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ActuatorSink for DeviceSink {
    async fn write_code(&mut self, code: u8) -> Result<()> {
        if code == 0 {
            bail!("actuator code must be 1..=255");
        }
        let mut writer = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open actuator {}", self.path.display()))?;
        writer.write_all(&[code]).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Selected from `[actuator]`; `Disabled` drops every code.
#[derive(Debug, Clone)]
pub enum Actuator {
    Device(DeviceSink),
    Disabled,
}

impl Actuator {
    pub fn from_config(config: &ActuatorConfig) -> Self {
        match &config.device {
            Some(path) => Actuator::Device(DeviceSink::new(path)),
            None => Actuator::Disabled,
        }
    }
}

impl ActuatorSink for Actuator {
    async fn write_code(&mut self, code: u8) -> Result<()> {
        match self {
            Actuator::Device(sink) => sink.write_code(code).await,
            Actuator::Disabled => Ok(()),
        }
    }
}
