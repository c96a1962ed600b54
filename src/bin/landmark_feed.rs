//! Landmark feed: plays a recorded JSONL session into a running guard coach
//! over TCP and prints every reply as a JSON line.
//!
//! Usage: `landmark_feed <session.jsonl> [addr]`

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use guard_coach::protocol::{self, ClientMessage, ServerMessage};

const DEFAULT_ADDR: &str = "127.0.0.1:9100";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let (path, addr) = parse_args(&args)?;

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path))?;
    let mut lines = BufReader::new(file).lines();

    let tcp = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    tcp.set_nodelay(true)?;
    let mut stream = protocol::message_stream(tcp);
    log::info!("Connected to {}", addr);

    match protocol::recv_message::<ServerMessage, _>(&mut stream).await? {
        Some(ready @ ServerMessage::Ready { .. }) => print_reply(&ready)?,
        Some(other) => bail!("expected Ready, got {:?}", other),
        None => bail!("coach closed the connection"),
    }

    let mut sent = 0usize;
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let msg: ClientMessage = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Skipping line {}: {}", line_no, e);
                continue;
            }
        };

        protocol::send_message(&mut stream, &msg).await?;
        sent += 1;
        match protocol::recv_message::<ServerMessage, _>(&mut stream).await? {
            Some(reply) => print_reply(&reply)?,
            None => bail!("coach closed the connection after {} messages", sent),
        }
    }

    log::info!("Sent {} messages", sent);
    Ok(())
}

/// `[prog, session.jsonl, addr?]` → (path, addr)
fn parse_args(args: &[String]) -> Result<(&str, &str)> {
    let Some(path) = args.get(1) else {
        bail!("usage: {} <session.jsonl> [addr]", env!("CARGO_BIN_NAME"));
    };
    let addr = args.get(2).map(String::as_str).unwrap_or(DEFAULT_ADDR);
    Ok((path.as_str(), addr))
}

fn print_reply(reply: &ServerMessage) -> Result<()> {
    println!("{}", serde_json::to_string(reply)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = vec!["landmark_feed".to_string(), "s.jsonl".to_string()];
        assert_eq!(parse_args(&args).unwrap(), ("s.jsonl", DEFAULT_ADDR));

        let args = vec![
            "landmark_feed".to_string(),
            "s.jsonl".to_string(),
            "10.0.0.2:9100".to_string(),
        ];
        assert_eq!(parse_args(&args).unwrap(), ("s.jsonl", "10.0.0.2:9100"));
    }

    #[test]
    fn test_parse_args_without_path() {
        assert!(parse_args(&[]).is_err());
        let err = parse_args(&["landmark_feed".to_string()]).unwrap_err();
        assert!(err.to_string().contains("usage"));
    }
}
