//! Per-call orchestrator tying every other component together: trial
//! gating, VAD windowing, turn-taking, transcription, response
//! generation, and playback, all threaded through one owned `Session`
//! built from an explicit `SessionParams` rather than module-level
//! globals.

use crate::audio_buffer::AudioBuffer;
use crate::codec;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::error::SessionError;
use crate::llm::LlmClient;
use crate::pacer::OutboundPacer;
use crate::resampler;
use crate::response_generator::ResponseGenerator;
use crate::stt::SpeechToText;
use crate::transcript_store;
use crate::transport::{Inbound, TransportReceiver, TransportSender};
use crate::tts::TextToSpeech;
use crate::turn_detector::{TurnDetector, TurnState};
use crate::vad_window::VadWindower;
use persona_protocol::{ClientEnvelope, LINE_SAMPLE_RATE, MODEL_SAMPLE_RATE, Scenario, Speaker, Transcript};
use persona_vad::VoiceActivityDetector;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{info, warn};

/// The min-speech threshold the reference implementation hardcodes
/// separately from `silence_threshold_ms`, which *is* configurable.
const MIN_SPEECH_MS: i64 = 300;
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const SILENCE_WATCHDOG: Duration = Duration::from_secs(15);
const MAX_SILENCE_PROMPTS: u32 = 3;
const GOODBYE_TAIL: Duration = Duration::from_secs(2);

const TRIAL_ARTIFACT_WORDS: &[&str] = &["trial", "twilio", "upgrade", "account"];
const GOODBYE_WORDS: &[&str] = &["goodbye", "bye", "thank you, goodbye", "have a good"];

/// Everything one call needs, built up front so the session itself is
/// never reaching for global or thread-local state.
pub struct SessionParams {
    pub scenario: Option<Scenario>,
    pub config: Config,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    pub llm: Arc<dyn LlmClient>,
    pub vad: Box<dyn VoiceActivityDetector>,
    pub transcripts_dir: PathBuf,
}

pub struct MediaSession;

impl MediaSession {
    /// Run one call to completion. Returns the finished transcript
    /// (possibly with zero turns, e.g. a call that hung up immediately).
    pub async fn run(
        params: SessionParams,
        receiver: Box<dyn TransportReceiver>,
        sender: Box<dyn TransportSender>,
    ) -> Result<Transcript, SessionError> {
        let Some(scenario) = params.scenario else {
            return Err(SessionError::NoScenario);
        };

        let mut session = Session::new(
            scenario,
            params.config,
            params.stt,
            params.tts,
            params.llm,
            params.vad,
            receiver,
            params.transcripts_dir,
        );
        let transcript = session.drive(sender).await;

        if transcript.turn_count > 0 {
            let timestamp = format_timestamp(now_epoch());
            match transcript_store::save_transcript(&transcript, &session.transcripts_dir, &timestamp) {
                Ok(path) => info!("transcript saved: {}", path.display()),
                Err(e) => warn!("failed to persist transcript: {e}"),
            }
        } else {
            warn!("call ended with no conversation turns");
        }

        Ok(transcript)
    }
}

fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn format_timestamp(epoch_seconds: f64) -> String {
    let secs = epoch_seconds as i64;
    let datetime = chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default();
    datetime.format("%Y%m%d_%H%M%S").to_string()
}

struct Session {
    config: Config,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    response_gen: ResponseGenerator,
    conversation: Conversation,
    turn_detector: TurnDetector,
    audio_buffer: AudioBuffer,
    vad_windower: VadWindower,
    receiver: Box<dyn TransportReceiver>,
    transcripts_dir: PathBuf,

    stream_start: Option<Instant>,
    trial_ended: bool,
    opening_delivered: bool,
    agent_silence_start: Option<Instant>,
    silence_prompt_count: u32,
}

impl Session {
    fn new(
        scenario: Scenario,
        config: Config,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        llm: Arc<dyn LlmClient>,
        vad: Box<dyn VoiceActivityDetector>,
        receiver: Box<dyn TransportReceiver>,
        transcripts_dir: PathBuf,
    ) -> Self {
        let turn_detector = TurnDetector::new(config.silence_threshold_ms, MIN_SPEECH_MS);
        let conversation = Conversation::new(scenario.id.clone(), now_epoch());
        let response_gen = ResponseGenerator::new(scenario, llm);
        Self {
            config,
            stt,
            tts,
            response_gen,
            conversation,
            turn_detector,
            audio_buffer: AudioBuffer::new(30, MODEL_SAMPLE_RATE),
            vad_windower: VadWindower::new(vad),
            receiver,
            transcripts_dir,
            stream_start: None,
            trial_ended: false,
            opening_delivered: false,
            agent_silence_start: None,
            silence_prompt_count: 0,
        }
    }

    /// Run the ingest event loop to completion and return the finished
    /// transcript. `sender` is consumed once the stream starts, handed to
    /// the pacer task; if the call ends before `start` ever arrives there
    /// is nothing to pace and `sender` is simply dropped.
    async fn drive(&mut self, sender: Box<dyn TransportSender>) -> Transcript {
        let call_start = Instant::now();
        let mut sender = Some(sender);
        let mut pacer: Option<OutboundPacer> = None;

        loop {
            if call_start.elapsed() > Duration::from_secs(self.config.max_call_duration_s) {
                info!("max call duration reached, hanging up");
                break;
            }

            let envelope = match tokio::time::timeout(READ_TIMEOUT, self.receiver.recv()).await {
                Ok(Inbound::Envelope(e)) => e,
                Ok(Inbound::Closed) => break,
                Err(_) => {
                    info!("no data for 30s, closing");
                    break;
                }
            };

            match envelope {
                ClientEnvelope::Connected => info!("stream connected"),
                ClientEnvelope::Start { start } => {
                    info!("stream started: {}", start.stream_sid);
                    self.stream_start = Some(Instant::now());
                    if let Some(sender) = sender.take() {
                        pacer = Some(OutboundPacer::spawn(start.stream_sid, sender));
                    }
                }
                ClientEnvelope::Media { media } => {
                    let Some(pacer) = pacer.as_ref() else {
                        continue; // media before start: nothing to pace yet
                    };
                    if self.handle_media(&media.payload, pacer).await {
                        break; // goodbye reached
                    }
                }
                ClientEnvelope::Stop => {
                    info!("stream stopped");
                    break;
                }
            }
        }

        if let Some(pacer) = pacer {
            pacer.shutdown().await;
        }
        self.turn_detector.mark_finished();
        self.conversation.snapshot(now_epoch())
    }

    /// Handle one inbound media frame. Returns `true` if the call should
    /// end (patient said goodbye).
    async fn handle_media(&mut self, payload_b64: &str, pacer: &OutboundPacer) -> bool {
        use base64::Engine;
        let Ok(mulaw_bytes) = base64::engine::general_purpose::STANDARD.decode(payload_b64) else {
            warn!("dropping media frame with invalid base64 payload");
            return false;
        };

        let stream_start = self.stream_start.expect("media only arrives after start");
        let elapsed = stream_start.elapsed();

        if elapsed < Duration::from_secs(self.config.trial_message_duration_s) {
            return false;
        }
        if !self.trial_ended {
            self.trial_ended = true;
            self.turn_detector.mark_trial_ended();
            self.vad_windower.reset();
            info!("trial message period ended, listening");
        }

        let pcm_8k: Vec<i16> = mulaw_bytes.iter().map(|&b| codec::decode(b)).collect();
        let pcm_16k = resampler::resample(&pcm_8k, LINE_SAMPLE_RATE, MODEL_SAMPLE_RATE);

        self.audio_buffer.add(pcm_16k.clone());

        let t_ms = elapsed.as_millis() as i64;
        let results = self.vad_windower.feed(&pcm_16k);
        for is_speech in results {
            if is_speech {
                self.agent_silence_start = None;
            }

            let prev_state = self.turn_detector.state();
            let new_state = self.turn_detector.on_vad_result(is_speech, t_ms);

            if new_state == TurnState::Processing && prev_state != TurnState::Processing {
                if self.process_utterance(pacer).await {
                    return true;
                }
            }
        }

        self.check_silence_watchdog(pacer).await
    }

    /// Flush the buffer, transcribe, and -- unless the result is empty or
    /// a trial artifact -- generate and speak the next patient turn.
    /// Returns `true` if the call should end.
    async fn process_utterance(&mut self, pacer: &OutboundPacer) -> bool {
        let audio = self.audio_buffer.flush();
        if audio.is_empty() {
            self.turn_detector.mark_listening();
            return false;
        }

        let (agent_text, confidence) = match self.stt.transcribe(&audio).await {
            Ok(result) => result,
            Err(e) => {
                warn!("stt failed: {e}");
                self.turn_detector.mark_listening();
                return false;
            }
        };

        if agent_text.trim().is_empty() {
            self.turn_detector.mark_listening();
            return false;
        }

        let lower = agent_text.to_lowercase();
        if TRIAL_ARTIFACT_WORDS.iter().any(|w| lower.contains(w)) {
            info!("discarding trial message artifact: {}", agent_text);
            self.turn_detector.mark_listening();
            return false;
        }

        info!("agent said: {} (conf={:.2})", agent_text, confidence);
        self.conversation.add_turn(Speaker::Agent, agent_text, now_epoch());

        let patient_text = if !self.opening_delivered {
            self.opening_delivered = true;
            self.response_gen.opening_line().await
        } else {
            self.response_gen.respond(self.conversation.recent(20)).await
        };

        info!("patient says: {}", patient_text);
        self.conversation.add_turn(Speaker::Patient, patient_text.clone(), now_epoch());

        self.speak(&patient_text, pacer).await;

        let lower = patient_text.to_lowercase();
        if GOODBYE_WORDS.iter().any(|w| lower.contains(w)) {
            info!("patient said goodbye, ending call");
            tokio::time::sleep(GOODBYE_TAIL).await;
            return true;
        }

        // `speak` already reset the VAD window on the way out.
        self.agent_silence_start = Some(Instant::now());
        false
    }

    /// Synthesize `text` and enqueue its frames one at a time, draining
    /// any inbound audio concurrently so barge-in can actually be
    /// detected mid-utterance rather than only between utterances.
    async fn speak(&mut self, text: &str, pacer: &OutboundPacer) {
        self.turn_detector.mark_speaking();

        let frames = match self.tts.synthesize(text).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!("tts failed: {e}");
                Vec::new()
            }
        };

        let mut interrupted = false;
        for frame in frames {
            while let Some(Inbound::Envelope(ClientEnvelope::Media { media })) = self.receiver.try_recv() {
                self.observe_during_speech(&media.payload);
            }

            if self.turn_detector.state() != TurnState::Speaking {
                interrupted = true;
                break;
            }

            if !pacer.enqueue(frame).await {
                break;
            }
        }

        if interrupted {
            info!("interrupted by agent, stopping speech");
            pacer.enqueue_clear().await;
        }

        self.turn_detector.mark_listening();
        self.vad_windower.reset();
    }

    /// Feed one drained-during-playback frame into the VAD/turn-detector
    /// pipeline without triggering STT or response generation -- that is
    /// left for the main loop once it resumes, by which point the turn
    /// detector's state already reflects whatever happened here.
    fn observe_during_speech(&mut self, payload_b64: &str) {
        use base64::Engine;
        let Ok(mulaw_bytes) = base64::engine::general_purpose::STANDARD.decode(payload_b64) else {
            return;
        };
        let Some(stream_start) = self.stream_start else {
            return;
        };
        let t_ms = stream_start.elapsed().as_millis() as i64;

        let pcm_8k: Vec<i16> = mulaw_bytes.iter().map(|&b| codec::decode(b)).collect();
        let pcm_16k = resampler::resample(&pcm_8k, LINE_SAMPLE_RATE, MODEL_SAMPLE_RATE);
        self.audio_buffer.add(pcm_16k.clone());

        for is_speech in self.vad_windower.feed(&pcm_16k) {
            self.turn_detector.on_vad_result(is_speech, t_ms);
        }
    }

    /// If the agent has been silent while we're listening, escalate
    /// through up to three prompts, the last of which ends the call.
    /// Returns `true` if the call should end.
    async fn check_silence_watchdog(&mut self, pacer: &OutboundPacer) -> bool {
        if self.turn_detector.state() != TurnState::Listening {
            return false;
        }

        let Some(silence_start) = self.agent_silence_start else {
            self.agent_silence_start = Some(Instant::now());
            return false;
        };

        if silence_start.elapsed() <= SILENCE_WATCHDOG {
            return false;
        }

        self.silence_prompt_count += 1;
        let finishing = self.silence_prompt_count >= MAX_SILENCE_PROMPTS;
        let prompt = if finishing {
            "I think we got disconnected. Thank you, goodbye."
        } else {
            "Hello? Are you still there?"
        };

        info!("agent silent too long, prompting: {}", prompt);
        self.conversation.add_turn(Speaker::Patient, prompt.to_string(), now_epoch());
        self.speak(prompt, pacer).await;
        self.agent_silence_start = Some(Instant::now());

        finishing
    }
}
