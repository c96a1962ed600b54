//! 1セッション分の推論ループ
//!
//! フレームを1つずつ受けて tick し、フィードバックを返す。tick 単位のエラーは
//! ログに残して `Error` で返すだけで、ループは止めない。

use anyhow::Result;
use std::collections::BTreeMap;

use crate::actuator::ActuatorSink;
use crate::guard::GuardLabel;
use crate::pipeline::{GuardPipeline, TickInput, TickState};
use crate::pose::Keypoint;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::source::{FrameChannel, Inbound};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: usize,
    pub no_pose: usize,
    pub failed: usize,
    pub codes_sent: usize,
    pub actuator_failures: usize,
    pub samples: usize,
}

/// チャネルが閉じるまで回す。返るのはチャネル自体の I/O エラーのみ
pub async fn run_session<C, A>(
    pipeline: &GuardPipeline,
    channel: &mut C,
    actuator: &mut A,
) -> Result<SessionStats>
where
    C: FrameChannel,
    A: ActuatorSink,
{
    let mut stats = SessionStats::default();
    let mut state = TickState::default();

    channel
        .send(&ServerMessage::Ready {
            variant: pipeline.variant(),
            labels: pipeline.model().labels().to_vec(),
        })
        .await?;

    while let Some(inbound) = channel.recv().await? {
        let reply = match inbound {
            Inbound::Malformed(e) => {
                stats.failed += 1;
                log::warn!("Dropped frame: {:#}", e);
                error_reply(&e)
            }
            Inbound::Message(ClientMessage::Landmarks {
                timestamp_us,
                keypoints,
                mirror_stance,
            }) => {
                stats.ticks += 1;
                handle_landmarks(
                    pipeline,
                    &mut state,
                    actuator,
                    &mut stats,
                    timestamp_us,
                    &keypoints,
                    mirror_stance,
                )
                .await
            }
            Inbound::Message(ClientMessage::CaptureSample { labels }) => {
                handle_capture(pipeline, &state, &mut stats, &labels)
            }
        };
        channel.send(&reply).await?;
    }

    log::info!(
        "Session closed: {} ticks, {} without pose, {} failed, {} codes, {} samples",
        stats.ticks,
        stats.no_pose,
        stats.failed,
        stats.codes_sent,
        stats.samples
    );
    Ok(stats)
}

async fn handle_landmarks<A: ActuatorSink>(
    pipeline: &GuardPipeline,
    state: &mut TickState,
    actuator: &mut A,
    stats: &mut SessionStats,
    timestamp_us: u64,
    keypoints: &[Keypoint],
    mirror_stance: Option<bool>,
) -> ServerMessage {
    let input = TickInput {
        keypoints,
        mirror_stance,
    };
    let output = match pipeline.tick(state, &input) {
        Ok(Some(output)) => output,
        Ok(None) => {
            stats.no_pose += 1;
            return ServerMessage::NoPose { timestamp_us };
        }
        Err(e) => {
            stats.failed += 1;
            log::warn!("tick {} failed: {:#}", timestamp_us, e);
            return error_reply(&e);
        }
    };

    if let Some(code) = output.feedback.code {
        // 送れなくてもフィードバック自体は返す
        match actuator.write_code(code).await {
            Ok(()) => stats.codes_sent += 1,
            Err(e) => {
                stats.actuator_failures += 1;
                log::warn!("Actuator write failed (code {}): {:#}", code, e);
            }
        }
    }

    ServerMessage::Feedback {
        timestamp_us,
        lines: output.feedback.lines,
        code: output.feedback.code,
    }
}

fn handle_capture(
    pipeline: &GuardPipeline,
    state: &TickState,
    stats: &mut SessionStats,
    labels: &BTreeMap<GuardLabel, f32>,
) -> ServerMessage {
    let sample = pipeline
        .capture_sample(state, labels)
        .and_then(|sample| sample.to_json_pretty());
    match sample {
        Ok(json) => {
            stats.samples += 1;
            ServerMessage::Sample { json }
        }
        Err(e) => {
            log::warn!("Sample capture failed: {:#}", e);
            error_reply(&e)
        }
    }
}

fn error_reply(e: &anyhow::Error) -> ServerMessage {
    ServerMessage::Error {
        message: format!("{:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{GuardModel, LabeledSample, TrainingOptions};
    use crate::feedback::CodePolicy;
    use crate::guard::{flatten, Normalizer, Variant};
    use crate::pose::{KeypointIndex, SchemaAdapter};
    use std::collections::VecDeque;

    /// メモリ上のチャネル
    #[derive(Default)]
    struct ScriptedChannel {
        inbound: VecDeque<Inbound>,
        sent: Vec<ServerMessage>,
    }

    impl FrameChannel for ScriptedChannel {
        async fn recv(&mut self) -> Result<Option<Inbound>> {
            Ok(self.inbound.pop_front())
        }

        async fn send(&mut self, msg: &ServerMessage) -> Result<()> {
            self.sent.push(msg.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        codes: Vec<u8>,
        fail: bool,
    }

    impl ActuatorSink for RecordingSink {
        async fn write_code(&mut self, code: u8) -> Result<()> {
            if self.fail {
                anyhow::bail!("device unplugged");
            }
            self.codes.push(code);
            Ok(())
        }
    }

    fn landmarks(elbow_spread: f32) -> Vec<Keypoint> {
        let mut k = vec![Keypoint::new(0.0, 0.0, 0.1); KeypointIndex::COUNT];
        k[KeypointIndex::LeftHip as usize] = Keypoint::new(100.0, 500.0, 0.9);
        k[KeypointIndex::RightHip as usize] = Keypoint::new(300.0, 500.0, 0.9);
        k[KeypointIndex::LeftElbow as usize] = Keypoint::new(200.0 - elbow_spread, 400.0, 0.9);
        k[KeypointIndex::RightElbow as usize] = Keypoint::new(200.0 + elbow_spread, 400.0, 0.9);
        k
    }

    fn pipeline() -> GuardPipeline {
        let adapter = SchemaAdapter::new(Variant::HipCenter);
        let normalizer = Normalizer::for_variant(Variant::HipCenter);
        let sample = |spread: f32, value: f32| {
            let frame = adapter.adapt(&landmarks(spread)).unwrap();
            let labels = Variant::HipCenter.labels().iter().map(|l| (*l, value)).collect();
            LabeledSample::new(flatten(&normalizer.normalize(&frame, false)), labels)
        };
        let samples = vec![sample(60.0, 1.0), sample(200.0, 0.0)];
        let (model, _) =
            GuardModel::train(&samples, Variant::HipCenter.labels(), &TrainingOptions::default())
                .unwrap();
        GuardPipeline::new(Variant::HipCenter, model, CodePolicy::FirstBelowThreshold, false)
            .unwrap()
    }

    fn frame(timestamp_us: u64, keypoints: Vec<Keypoint>) -> Inbound {
        Inbound::Message(ClientMessage::Landmarks {
            timestamp_us,
            keypoints,
            mirror_stance: None,
        })
    }

    #[tokio::test]
    async fn test_session_keeps_going_after_bad_ticks() {
        let mut bad = landmarks(60.0);
        bad[0].y = f32::INFINITY;

        let mut channel = ScriptedChannel::default();
        channel.inbound.extend([
            frame(1, landmarks(200.0)),
            Inbound::Malformed(anyhow::anyhow!("garbage")),
            frame(2, bad),
            frame(3, Vec::new()),
            frame(4, landmarks(60.0)),
        ]);
        let mut sink = RecordingSink::default();

        let stats = run_session(&pipeline(), &mut channel, &mut sink).await.unwrap();

        assert!(matches!(channel.sent[0], ServerMessage::Ready { .. }));
        assert!(matches!(
            channel.sent[1],
            ServerMessage::Feedback { timestamp_us: 1, code: Some(1), .. }
        ));
        assert!(matches!(channel.sent[2], ServerMessage::Error { .. }));
        assert!(matches!(channel.sent[3], ServerMessage::Error { .. }));
        assert_eq!(channel.sent[4], ServerMessage::NoPose { timestamp_us: 3 });
        match &channel.sent[5] {
            ServerMessage::Feedback { lines, code, .. } => {
                assert_eq!(lines, &vec!["Guard is correct!".to_string()]);
                assert_eq!(*code, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(sink.codes, vec![1]);
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.no_pose, 1);
        assert_eq!(stats.codes_sent, 1);
    }

    #[tokio::test]
    async fn test_actuator_failure_still_sends_feedback() {
        let mut channel = ScriptedChannel::default();
        channel.inbound.push_back(frame(7, landmarks(200.0)));
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let stats = run_session(&pipeline(), &mut channel, &mut sink).await.unwrap();

        assert!(matches!(
            channel.sent[1],
            ServerMessage::Feedback { timestamp_us: 7, code: Some(1), .. }
        ));
        assert_eq!(stats.actuator_failures, 1);
        assert_eq!(stats.codes_sent, 0);
    }

    #[tokio::test]
    async fn test_capture_sample_after_no_pose_is_error() {
        let labels: BTreeMap<GuardLabel, f32> =
            Variant::HipCenter.labels().iter().map(|l| (*l, 1.0)).collect();

        let mut channel = ScriptedChannel::default();
        channel.inbound.extend([
            frame(1, landmarks(60.0)),
            Inbound::Message(ClientMessage::CaptureSample { labels: labels.clone() }),
            frame(2, Vec::new()),
            Inbound::Message(ClientMessage::CaptureSample { labels }),
        ]);

        let stats = run_session(&pipeline(), &mut channel, &mut RecordingSink::default())
            .await
            .unwrap();

        match &channel.sent[2] {
            ServerMessage::Sample { json } => assert!(json.contains("\"leftElbow_x\"")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(channel.sent[4], ServerMessage::Error { .. }));
        assert_eq!(stats.samples, 1);
    }
}
