use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::net::TcpListener;

use guard_coach::actuator::Actuator;
use guard_coach::coach::run_session;
use guard_coach::config::{Config, SourceMode};
use guard_coach::pipeline::{train_model, GuardPipeline};
use guard_coach::source::{ReplayChannel, TcpChannel};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load_or_default(CONFIG_PATH);

    log::info!("Guard Coach ({})", env!("GUARD_BUILD_VERSION"));
    log::info!("Variant: {}", config.guard.variant);
    log::info!("Mirror stance: {}", if config.guard.mirror_stance { "ON" } else { "OFF" });
    log::info!("Code policy: {:?}", config.guard.code_policy());
    log::info!("Training data: {}", config.training.data_path);

    // 学習が終わるまで推論ループは始めない
    let (model, _) = train_model(config.guard.variant, &config.training)?;
    let pipeline = GuardPipeline::from_config(&config.guard, model)?;

    let mut actuator = Actuator::from_config(&config.actuator);
    match &config.actuator.device {
        Some(device) => log::info!("Actuator: {}", device),
        None => log::info!("Actuator: disabled"),
    }

    match config.source.mode {
        SourceMode::Replay => {
            let file = File::open(&config.source.replay_path)
                .await
                .with_context(|| format!("Failed to open replay: {}", config.source.replay_path))?;
            log::info!("Replaying {}", config.source.replay_path);
            let mut channel = ReplayChannel::new(BufReader::new(file), tokio::io::stdout());
            run_session(&pipeline, &mut channel, &mut actuator).await?;
        }
        SourceMode::Tcp => {
            let listener = TcpListener::bind(&config.source.listen_addr)
                .await
                .with_context(|| format!("Failed to bind {}", config.source.listen_addr))?;
            log::info!("Listening on {}", config.source.listen_addr);

            // 1接続ずつ順番に処理する
            loop {
                let (tcp_stream, addr) = listener.accept().await?;
                tcp_stream.set_nodelay(true)?;
                log::info!("Feed connected: {}", addr);

                let mut channel = TcpChannel::new(tcp_stream);
                if let Err(e) = run_session(&pipeline, &mut channel, &mut actuator).await {
                    log::warn!("Feed {} dropped: {:#}", addr, e);
                }
                log::info!("Feed disconnected, waiting for next connection...");
            }
        }
    }

    Ok(())
}
