//! Scripted collaborators for driving whole turns.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;

use guarddesk_backend::{
    ActionExecutor, ActionOutcome, NewServiceRequest, OfferingsSource, ServiceRequestDesk,
};
use guarddesk_core::config::VoiceConfig;
use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{
    CustomerInfo, Offering, ProposedAction, ServiceRequestRef, Variant,
};
use guarddesk_media::capture::{CaptureError, InputFrame, InputStream, Microphone};
use guarddesk_media::graph::VirtualGraphFactory;
use guarddesk_media::pcm::pcm_to_wav;
use guarddesk_media::{AudioClip, SpeechAudio, SpeechSynthesizer, Transcriber};
use guarddesk_providers::{DialogueBridge, DialogueReply, DialogueRequest, parse_reply};
use guarddesk_voice::{Collaborators, VoiceSession};

pub const SAMPLE_RATE: u32 = 16_000;

// --- microphone ---

pub struct FakeMicrophone {
    deny: Mutex<bool>,
    frame_bytes: Mutex<Vec<usize>>,
    /// Keeps devices open so the recorder only stops when asked.
    open_devices: Mutex<Vec<mpsc::UnboundedSender<InputFrame>>>,
    pub opened: AtomicUsize,
}

impl FakeMicrophone {
    pub fn new() -> Self {
        Self {
            deny: Mutex::new(false),
            frame_bytes: Mutex::new(vec![1200, 1200]),
            open_devices: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn deny(&self) {
        *self.deny.lock().unwrap() = true;
    }

    /// Sizes of the encoded frames delivered on the next open.
    pub fn set_frames(&self, sizes: &[usize]) {
        *self.frame_bytes.lock().unwrap() = sizes.to_vec();
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Whether any opened device is still held by a recorder.
    pub fn device_live(&self) -> bool {
        self.open_devices
            .lock()
            .unwrap()
            .iter()
            .any(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn open(&self) -> Result<InputStream, CaptureError> {
        if *self.deny.lock().unwrap() {
            return Err(CaptureError::PermissionDenied);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        for &size in self.frame_bytes.lock().unwrap().iter() {
            let _ = tx.send(InputFrame {
                encoded: vec![7u8; size],
                samples: vec![0.25; 256],
            });
        }
        self.open_devices.lock().unwrap().push(tx);
        Ok(InputStream {
            mime_type: "audio/webm;codecs=opus".into(),
            frames: rx,
        })
    }
}

// --- transcription ---

pub struct ScriptedTranscriber {
    result: Mutex<Result<String, BridgeError>>,
    pub clips: Mutex<Vec<AudioClip>>,
}

impl ScriptedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            result: Mutex::new(Ok(text.into())),
            clips: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, result: Result<String, BridgeError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.clips.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, BridgeError> {
        self.clips.lock().unwrap().push(clip.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.result.lock().unwrap().clone()
    }
}

// --- dialogue ---

pub struct ScriptedDialogue {
    variant: Variant,
    replies: Mutex<VecDeque<Result<DialogueReply, BridgeError>>>,
    delay: Mutex<Duration>,
    pub requests: Mutex<Vec<DialogueRequest>>,
}

impl ScriptedDialogue {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            replies: Mutex::new(VecDeque::new()),
            delay: Mutex::new(Duration::from_millis(100)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply given as the model's raw JSON.
    pub fn push_json(&self, json: &str) {
        let reply = parse_reply(json, self.variant).expect("scripted reply must parse");
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_err(&self, err: BridgeError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> DialogueRequest {
        self.requests.lock().unwrap().last().cloned().expect("no dialogue request")
    }
}

#[async_trait]
impl DialogueBridge for ScriptedDialogue {
    fn variant(&self) -> Variant {
        self.variant
    }

    async fn reply(&self, request: &DialogueRequest) -> Result<DialogueReply, BridgeError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DialogueReply::informational("Okay.")))
    }
}

// --- synthesis ---

#[derive(Clone)]
pub enum SpeechScript {
    /// A WAV clip of this many milliseconds.
    Clip(u64),
    /// PCM chunks delivered `gap` apart. `hang` keeps the stream open afterwards.
    Stream {
        chunks: Vec<Vec<u8>>,
        gap: Duration,
        hang: bool,
    },
    Fail,
}

pub struct FakeSynthesizer {
    script: Mutex<SpeechScript>,
    pub texts: Mutex<Vec<String>>,
    /// Chunks actually pulled from the stream so far.
    pub pulled: Arc<AtomicUsize>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(SpeechScript::Clip(400)),
            texts: Mutex::new(Vec::new()),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, script: SpeechScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

pub fn wav_clip(millis: u64) -> AudioClip {
    let samples = vec![1000i16; (SAMPLE_RATE as u64 * millis / 1000) as usize];
    AudioClip::new(pcm_to_wav(&samples, SAMPLE_RATE, 1, 16), "audio/wav")
}

pub fn pcm_bytes(samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| ((i as i16).wrapping_mul(31)).to_le_bytes())
        .collect()
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, BridgeError> {
        self.texts.lock().unwrap().push(text.into());
        let script = self.script.lock().unwrap().clone();
        match script {
            SpeechScript::Clip(millis) => Ok(SpeechAudio::Clip(wav_clip(millis))),
            SpeechScript::Fail => Err(BridgeError::Status {
                status: 500,
                body: "synthesis unavailable".into(),
            }),
            SpeechScript::Stream { chunks, gap, hang } => {
                let pulled = self.pulled.clone();
                let delivered = futures::stream::iter(chunks).then(move |chunk| {
                    let pulled = pulled.clone();
                    async move {
                        tokio::time::sleep(gap).await;
                        pulled.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, BridgeError>(Bytes::from(chunk))
                    }
                });
                let chunks = if hang {
                    delivered.chain(futures::stream::pending()).boxed()
                } else {
                    delivered.boxed()
                };
                Ok(SpeechAudio::Stream {
                    sample_rate: SAMPLE_RATE,
                    chunks,
                })
            }
        }
    }
}

// --- backend ---

pub struct FakeOfferings {
    pub offerings: Vec<Offering>,
    pub calls: AtomicUsize,
}

impl FakeOfferings {
    pub fn standard() -> Self {
        Self {
            offerings: vec![
                offering("basic", "Basic Guard", 4500.0),
                offering("armed", "Armed Guard", 7000.0),
            ],
            calls: AtomicUsize::new(0),
        }
    }
}

fn offering(id: &str, name: &str, price: f64) -> Offering {
    Offering {
        id: id.into(),
        name: name.into(),
        description: None,
        price,
        billing_unit: "shift".into(),
        shift_hours: Some(12),
        features: vec![],
    }
}

#[async_trait]
impl OfferingsSource for FakeOfferings {
    async fn active_offerings(&self) -> Result<Vec<Offering>, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.offerings.clone())
    }
}

#[derive(Default)]
pub struct RecordingDesk {
    pub created: Mutex<Vec<NewServiceRequest>>,
    pub notified: Mutex<Vec<ServiceRequestRef>>,
    pub fail_create: Mutex<bool>,
    pub fail_notify: Mutex<bool>,
    /// Extra time `create` takes on top of the usual 30ms.
    pub create_delay: Mutex<Duration>,
}

#[async_trait]
impl ServiceRequestDesk for RecordingDesk {
    async fn create(&self, request: &NewServiceRequest) -> Result<ServiceRequestRef, BridgeError> {
        let delay = *self.create_delay.lock().unwrap();
        tokio::time::sleep(Duration::from_millis(30) + delay).await;
        if *self.fail_create.lock().unwrap() {
            return Err(BridgeError::Status {
                status: 503,
                body: "database unavailable".into(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(ServiceRequestRef {
            id: format!("sr-{}", created.len()),
            request_number: format!("SR-2026-{:04}", created.len()),
        })
    }

    async fn notify(
        &self,
        reference: &ServiceRequestRef,
        _customer: &CustomerInfo,
    ) -> Result<(), BridgeError> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        if *self.fail_notify.lock().unwrap() {
            return Err(BridgeError::transport("smtp timeout"));
        }
        self.notified.lock().unwrap().push(reference.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<ProposedAction>>,
    pub reject_with: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, action: &ProposedAction) -> Result<ActionOutcome, BridgeError> {
        self.calls.lock().unwrap().push(action.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        match self.reject_with.lock().unwrap().clone() {
            Some(error) => Err(BridgeError::Rejected(error)),
            None => Ok(ActionOutcome {
                message: Some("Done".into()),
            }),
        }
    }
}

// --- harness ---

pub struct Harness {
    pub microphone: Arc<FakeMicrophone>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub dialogue: Arc<ScriptedDialogue>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub graphs: Arc<VirtualGraphFactory>,
    pub offerings: Arc<FakeOfferings>,
    pub desk: Arc<RecordingDesk>,
    pub executor: Arc<RecordingExecutor>,
}

impl Harness {
    pub fn new(variant: Variant) -> Self {
        Self {
            microphone: Arc::new(FakeMicrophone::new()),
            transcriber: Arc::new(ScriptedTranscriber::new("hello")),
            dialogue: Arc::new(ScriptedDialogue::new(variant)),
            synthesizer: Arc::new(FakeSynthesizer::new()),
            graphs: Arc::new(VirtualGraphFactory::new(SAMPLE_RATE)),
            offerings: Arc::new(FakeOfferings::standard()),
            desk: Arc::new(RecordingDesk::default()),
            executor: Arc::new(RecordingExecutor::default()),
        }
    }

    pub fn session(&self) -> VoiceSession {
        self.session_with(VoiceConfig::default())
    }

    pub fn session_with(&self, config: VoiceConfig) -> VoiceSession {
        let collab = Collaborators::new(
            self.microphone.clone(),
            self.transcriber.clone(),
            self.dialogue.clone(),
            self.synthesizer.clone(),
            self.graphs.clone(),
        )
        .with_offerings(self.offerings.clone())
        .with_desk(self.desk.clone())
        .with_executor(self.executor.clone());
        VoiceSession::new(config, collab)
    }
}
