//! Voice session controller.
//!
//! One [`VoiceSession`] drives one conversation through
//! `idle -> listening -> thinking -> speaking -> idle`. Capture, transcription,
//! dialogue and playback never overlap: a new turn can only start from idle,
//! and every turn runs in a single spawned task.
//!
//! Each turn is tagged with a generation number. [`VoiceSession::cancel`]
//! bumps the generation, so a turn that is still unwinding can no longer
//! touch session state; it also fires the turn's cancellation token, which
//! drops any in-flight request or audio stream.
//!
//! Filing a service request runs beside the turn rather than inside it, so a
//! slow backend never holds the session in speaking. Cancel aborts it too.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use guarddesk_backend::{
    ActionExecutor, ActionOutcome, NewServiceRequest, OfferingsSource, ServiceRequestDesk,
};
use guarddesk_core::config::VoiceConfig;
use guarddesk_core::error::{BridgeError, VoiceError};
use guarddesk_core::types::{ChatMessage, Offering, ProposedAction, SessionState, Variant};
use guarddesk_media::graph::estimate_clip_duration;
use guarddesk_media::stt::normalize_transcript;
use guarddesk_media::{
    AnalyserSlot, AudioGraph, CaptureError, GraphFactory, LevelMeter, Microphone, PlaybackError,
    Recorder, SharedGraph, SourceSet, SpeechAudio, SpeechSynthesizer, StreamPlayer, Transcriber,
};
use guarddesk_providers::{DialogueBridge, DialogueReply, DialogueRequest, ReplyKind};

use crate::orb::{OrbAnimation, OrbFrame, OrbSampler};
use crate::snapshot::{SessionSnapshot, merge_details};
use crate::subtitles::WordTimeline;

/// External services a session talks to.
pub struct Collaborators {
    pub microphone: Arc<dyn Microphone>,
    pub transcriber: Arc<dyn Transcriber>,
    pub dialogue: Arc<dyn DialogueBridge>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub graphs: Arc<dyn GraphFactory>,
    pub offerings: Option<Arc<dyn OfferingsSource>>,
    pub desk: Option<Arc<dyn ServiceRequestDesk>>,
    pub executor: Option<Arc<dyn ActionExecutor>>,
}

impl Collaborators {
    pub fn new(
        microphone: Arc<dyn Microphone>,
        transcriber: Arc<dyn Transcriber>,
        dialogue: Arc<dyn DialogueBridge>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        graphs: Arc<dyn GraphFactory>,
    ) -> Self {
        Self {
            microphone,
            transcriber,
            dialogue,
            synthesizer,
            graphs,
            offerings: None,
            desk: None,
            executor: None,
        }
    }

    pub fn with_offerings(mut self, offerings: Arc<dyn OfferingsSource>) -> Self {
        self.offerings = Some(offerings);
        self
    }

    pub fn with_desk(mut self, desk: Arc<dyn ServiceRequestDesk>) -> Self {
        self.desk = Some(desk);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }
}

struct Inner {
    view: SessionSnapshot,
    history: Vec<ChatMessage>,
    generation: u64,
    cancel: CancellationToken,
    recorder: Option<Recorder>,
    capture_timer: Option<JoinHandle<()>>,
    turn: Option<JoinHandle<()>>,
    side_effects: Vec<JoinHandle<()>>,
    disposed: bool,
}

impl Inner {
    fn ensure_ready(&self) -> Result<(), VoiceError> {
        if self.disposed {
            return Err(VoiceError::Disposed);
        }
        if !self.view.state.is_idle() {
            return Err(VoiceError::Busy);
        }
        Ok(())
    }

    fn begin_turn(&mut self) -> u64 {
        self.generation += 1;
        self.cancel = CancellationToken::new();
        self.view.error = None;
        self.view.info_requested = false;
        self.generation
    }

    fn set_state(&mut self, state: SessionState) {
        if self.view.state != state {
            info!(from = ?self.view.state, to = ?state, "Session state changed");
            self.view.state = state;
        }
    }

    /// Invalidate the current turn and release everything it holds.
    fn teardown(&mut self) {
        self.generation += 1;
        self.cancel.cancel();
        if let Some(recorder) = self.recorder.take() {
            recorder.abort();
        }
        if let Some(timer) = self.capture_timer.take() {
            timer.abort();
        }
        if let Some(turn) = self.turn.take() {
            turn.abort();
        }
        for task in self.side_effects.drain(..) {
            task.abort();
        }
    }
}

struct Shared {
    variant: Variant,
    config: VoiceConfig,
    collab: Collaborators,
    graph: SharedGraph,
    analyser: Arc<AnalyserSlot>,
    sources: Arc<SourceSet>,
    inner: Mutex<Inner>,
    updates: watch::Sender<SessionSnapshot>,
}

/// Handle to a voice session. Clones share the same session.
#[derive(Clone)]
pub struct VoiceSession {
    shared: Arc<Shared>,
}

impl VoiceSession {
    pub fn new(config: VoiceConfig, collab: Collaborators) -> Self {
        let variant = collab.dialogue.variant();
        let graph = SharedGraph::new(collab.graphs.clone());
        let (updates, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                variant,
                config,
                collab,
                graph,
                analyser: Arc::new(AnalyserSlot::new()),
                sources: Arc::new(SourceSet::new()),
                inner: Mutex::new(Inner {
                    view: SessionSnapshot::default(),
                    history: Vec::new(),
                    generation: 0,
                    cancel: CancellationToken::new(),
                    recorder: None,
                    capture_timer: None,
                    turn: None,
                    side_effects: Vec::new(),
                    disposed: false,
                }),
                updates,
            }),
        }
    }

    pub fn variant(&self) -> Variant {
        self.shared.variant
    }

    /// Receive a snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.updates.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock().view.state
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recorder.is_some()
    }

    /// Slot holding the analyser of whichever phase currently owns audio.
    pub fn analyser(&self) -> Arc<AnalyserSlot> {
        self.shared.analyser.clone()
    }

    /// Drive the orb from this session at the configured frame rate.
    pub fn orb_animation(&self) -> (OrbAnimation, watch::Receiver<OrbFrame>) {
        let sampler = OrbSampler::new(self.analyser());
        OrbAnimation::start(sampler, self.subscribe(), self.shared.config.orb_fps)
    }

    /// Word timing for the reply being spoken, once its length is known.
    pub fn subtitle_timeline(&self) -> Option<WordTimeline> {
        let inner = self.lock();
        let text = inner.view.speaking_text.as_deref()?;
        let duration = inner.view.speech_duration?;
        Some(WordTimeline::new(text, duration))
    }

    /// Resolve once the session is back in idle.
    pub async fn wait_until_idle(&self) {
        let mut updates = self.subscribe();
        let _ = updates.wait_for(|s| s.state.is_idle()).await;
    }

    pub fn clear_error(&self) {
        let mut inner = self.lock();
        if inner.view.error.take().is_some() {
            self.publish(&inner);
        }
    }

    /// Open the microphone and start recording.
    ///
    /// Only allowed from idle. Failing to open the microphone is reported
    /// through the snapshot error, not the return value.
    pub async fn start_listening(&self) -> Result<(), VoiceError> {
        let (generation, token) = {
            let mut inner = self.lock();
            inner.ensure_ready()?;
            let generation = inner.begin_turn();
            inner.set_state(SessionState::Listening);
            self.publish(&inner);
            (generation, inner.cancel.clone())
        };

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            opened = self.shared.collab.microphone.open() => opened,
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Could not open microphone");
                let error = match e {
                    CaptureError::PermissionDenied => VoiceError::PermissionDenied,
                    CaptureError::Device(_) => VoiceError::NoAudio,
                };
                self.finish(generation, Some(error));
                return Ok(());
            }
        };

        if let Err(e) = self.shared.graph.get() {
            warn!(error = %e, "Audio graph unavailable");
        }

        let mut inner = self.lock();
        if inner.generation != generation {
            // Cancelled while the microphone was opening; dropping the stream releases it.
            return Ok(());
        }
        let meter = self.shared.analyser.bind_new();
        inner.recorder = Some(Recorder::start(stream, Some(meter)));

        let limit = self.shared.config.max_capture();
        let session = self.clone();
        inner.capture_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            debug!(limit_secs = limit.as_secs(), "Capture limit reached");
            session.stop_listening_for(generation);
        }));
        debug!(generation, "Recording started");
        Ok(())
    }

    /// Stop recording and hand the clip to the rest of the turn.
    ///
    /// Does nothing when no recording is active.
    pub fn stop_listening(&self) {
        let generation = self.lock().generation;
        self.stop_listening_for(generation);
    }

    fn stop_listening_for(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        let Some(recorder) = inner.recorder.take() else {
            return;
        };
        if let Some(timer) = inner.capture_timer.take() {
            timer.abort();
        }
        debug!(
            elapsed_ms = recorder.elapsed().as_millis() as u64,
            "Stopping capture"
        );

        let session = self.clone();
        let token = inner.cancel.clone();
        inner.turn = Some(tokio::spawn(async move {
            session.voice_turn(generation, token, recorder).await;
        }));
    }

    /// Run a turn from typed text, skipping capture and transcription.
    pub fn submit_text(&self, text: &str) -> Result<(), VoiceError> {
        let mut inner = self.lock();
        inner.ensure_ready()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.start_text_turn(&mut inner, text.to_string());
        Ok(())
    }

    /// Confirm the pending action by submitting the affirmative phrase as a turn.
    pub fn confirm_pending_action(&self) -> Result<(), VoiceError> {
        let mut inner = self.lock();
        inner.ensure_ready()?;
        if inner.view.pending_action.is_none() {
            return Err(VoiceError::NoPendingAction);
        }
        let phrase = self.shared.config.confirm_phrase.clone();
        self.start_text_turn(&mut inner, phrase);
        Ok(())
    }

    /// Drop the pending action and tell the assistant so.
    pub fn cancel_pending_action(&self) -> Result<(), VoiceError> {
        let mut inner = self.lock();
        inner.ensure_ready()?;
        if inner.view.pending_action.take().is_none() {
            return Err(VoiceError::NoPendingAction);
        }
        info!("Pending action cancelled");
        let phrase = self.shared.config.cancel_phrase.clone();
        self.start_text_turn(&mut inner, phrase);
        Ok(())
    }

    fn start_text_turn(&self, inner: &mut Inner, text: String) {
        let generation = inner.begin_turn();
        inner.set_state(SessionState::Thinking);
        inner.view.transcript = Some(text.clone());
        self.publish(inner);

        let session = self.clone();
        let token = inner.cancel.clone();
        inner.turn = Some(tokio::spawn(async move {
            session.dialogue_turn(generation, token, text).await;
        }));
    }

    /// Abort whatever is in progress and return to idle.
    ///
    /// Stops the recorder, every scheduled audio source and any in-flight
    /// request. Safe to call at any time, any number of times.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.teardown();
        let stopped = self.shared.sources.stop_all();
        self.shared.analyser.detach();
        inner.set_state(SessionState::Idle);
        inner.view.speaking_text = None;
        inner.view.speech_duration = None;
        self.publish(&inner);
        debug!(stopped_sources = stopped, "Session cancelled");
    }

    /// Cancel and release the audio graph. The session rejects all further turns.
    pub fn dispose(&self) {
        self.cancel();
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.view.pending_action = None;
        self.shared.graph.close();
        self.publish(&inner);
        info!("Session disposed");
    }

    // --- turn pipeline ---

    async fn voice_turn(&self, generation: u64, token: CancellationToken, recorder: Recorder) {
        let clip = recorder.stop().await;
        if !clip.is_usable(self.shared.config.min_clip_bytes) {
            info!(bytes = clip.len(), "Clip too small to transcribe");
            self.finish(generation, Some(VoiceError::NoAudio));
            return;
        }
        if !self.update(generation, |inner| {
            self.shared.analyser.detach();
            inner.set_state(SessionState::Thinking);
        }) {
            return;
        }

        let transcribed = match self
            .bounded(&token, self.shared.collab.transcriber.transcribe(&clip))
            .await
        {
            Some(result) => result.and_then(|text| normalize_transcript(&text)),
            None => return,
        };
        let text = match transcribed {
            Ok(text) => text,
            Err(BridgeError::Empty) => {
                self.finish(generation, Some(VoiceError::NotUnderstood));
                return;
            }
            Err(e) => {
                warn!(error = %e, "Transcription failed");
                self.finish(generation, Some(VoiceError::TranscriptionFailed));
                return;
            }
        };
        debug!(chars = text.len(), "Transcribed");

        if !self.update(generation, |inner| inner.view.transcript = Some(text.clone())) {
            return;
        }
        self.dialogue_turn(generation, token, text).await;
    }

    async fn dialogue_turn(&self, generation: u64, token: CancellationToken, text: String) {
        let offerings = self.fetch_offerings(&token).await;
        let request = DialogueRequest {
            message: text.clone(),
            history: self.history(),
            context: offerings.clone(),
        };

        let reply = match self
            .bounded(&token, self.shared.collab.dialogue.reply(&request))
            .await
        {
            Some(Ok(reply)) => reply,
            Some(Err(e)) => {
                warn!(error = %e, "Dialogue request failed");
                self.finish(generation, Some(VoiceError::DialogueFailed));
                return;
            }
            None => return,
        };
        info!(kind = reply.kind.name(), "Reply received");

        let Some(ReplyEffects { execute, record }) =
            self.apply_reply(generation, &text, &reply, offerings)
        else {
            return;
        };

        if let Some(action) = execute {
            let Some(result) = self.bounded(&token, self.execute(&action)).await else {
                return;
            };
            match result {
                Ok(outcome) => info!(
                    action_type = action.action_type.as_str(),
                    entity = %action.entity,
                    message = outcome.message.as_deref().unwrap_or_default(),
                    "Action executed"
                ),
                Err(e) => {
                    warn!(error = %e, entity = %action.entity, "Action failed");
                    let error = VoiceError::ActionFailed(e.detail());
                    if !self.update(generation, |inner| inner.view.error = Some(error)) {
                        return;
                    }
                }
            }
        }

        if let Some(request) = record {
            self.spawn_filing(generation, &token, request);
        }
        self.speak(generation, &token, &reply.message).await;
        self.finish(generation, None);
    }

    /// Record the reply in session state. Returns the side effects it asks for,
    /// or `None` if the turn was cancelled.
    fn apply_reply(
        &self,
        generation: u64,
        text: &str,
        reply: &DialogueReply,
        offerings: Option<Vec<Offering>>,
    ) -> Option<ReplyEffects> {
        let mut effects = ReplyEffects::default();
        let applied = self.update(generation, |inner| {
            inner.history.push(ChatMessage::user(text));
            inner.history.push(ChatMessage::assistant(reply.message.clone()));
            inner.view.history_len = inner.history.len();
            inner.view.reply = Some(reply.clone());
            if let Some(details) = reply.service_details.clone() {
                let current = inner.view.service_details.take();
                inner.view.service_details = Some(merge_details(current, details));
            }
            if let Some(estimate) = reply.price_estimate.clone() {
                inner.view.price_estimate = Some(estimate);
            }

            match &reply.kind {
                ReplyKind::Informational => {}
                ReplyKind::PackagesShown => inner.view.packages = offerings.unwrap_or_default(),
                ReplyKind::InfoRequested => inner.view.info_requested = true,
                ReplyKind::ConfirmationRequested { action } => {
                    info!(action_type = action.action_type.as_str(), entity = %action.entity, "Action awaiting confirmation");
                    inner.view.pending_action = Some(action.clone());
                }
                ReplyKind::ActionConfirmed { action } => {
                    if inner.view.pending_action.take().is_some() {
                        effects.execute = Some(action.clone());
                    } else {
                        warn!(entity = %action.entity, "Confirmed action with nothing pending, ignoring");
                    }
                }
                ReplyKind::RecordCreated { customer } => {
                    effects.record = Some(NewServiceRequest {
                        customer: customer.clone(),
                        service_details: inner.view.service_details.clone().unwrap_or_default(),
                        price_estimate: inner.view.price_estimate.clone(),
                    });
                }
            }
        });
        applied.then_some(effects)
    }

    async fn fetch_offerings(&self, token: &CancellationToken) -> Option<Vec<Offering>> {
        if self.shared.variant != Variant::Receptionist {
            return None;
        }
        let source = self.shared.collab.offerings.as_ref()?;
        match self.bounded(token, source.active_offerings()).await? {
            Ok(offerings) => {
                debug!(count = offerings.len(), "Loaded offerings");
                Some(offerings)
            }
            Err(e) => {
                warn!(error = %e, "Could not load offerings");
                None
            }
        }
    }

    async fn execute(&self, action: &ProposedAction) -> Result<ActionOutcome, BridgeError> {
        match &self.shared.collab.executor {
            Some(executor) => executor.execute(action).await,
            None => Err(BridgeError::NotConfigured("no action executor".into())),
        }
    }

    /// Start filing `request` in its own task, tracked so that cancel can abort it.
    fn spawn_filing(&self, generation: u64, token: &CancellationToken, request: NewServiceRequest) {
        let session = self.clone();
        let token = token.clone();
        let task = tokio::spawn(async move { session.file_request(&token, request).await });

        let mut inner = self.lock();
        if inner.generation != generation {
            task.abort();
            return;
        }
        inner.side_effects.retain(|t| !t.is_finished());
        inner.side_effects.push(task);
    }

    /// Create the service request, then send its confirmation. Failures are
    /// only logged; the spoken reply goes ahead regardless.
    ///
    /// The reference is published even if a later turn has started, unless
    /// the filing turn was cancelled.
    async fn file_request(&self, token: &CancellationToken, request: NewServiceRequest) {
        let Some(desk) = self.shared.collab.desk.clone() else {
            warn!("No service desk configured, request not filed");
            return;
        };

        let reference = match self.bounded(token, desk.create(&request)).await {
            Some(Ok(reference)) => reference,
            Some(Err(e)) => {
                warn!(error = %e, customer = %request.customer.name, "Service request creation failed");
                return;
            }
            None => return,
        };
        info!(request_number = %reference.request_number, "Service request filed");
        {
            let mut inner = self.lock();
            if token.is_cancelled() {
                return;
            }
            inner.view.request_ref = Some(reference.clone());
            self.publish(&inner);
        }

        if let Some(Err(e)) = self
            .bounded(token, desk.notify(&reference, &request.customer))
            .await
        {
            warn!(error = %e, request_number = %reference.request_number, "Confirmation email failed");
        }
    }

    async fn speak(&self, generation: u64, token: &CancellationToken, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if !self.update(generation, |inner| {
            inner.set_state(SessionState::Speaking);
            inner.view.speaking_text = Some(text.to_string());
        }) {
            return;
        }

        let audio = match self
            .bounded(token, self.shared.collab.synthesizer.synthesize(text))
            .await
        {
            Some(Ok(audio)) => audio,
            Some(Err(e)) => {
                warn!(error = %e, "Speech synthesis failed");
                return;
            }
            None => return,
        };
        let graph = match self.shared.graph.get() {
            Ok(graph) => graph,
            Err(e) => {
                warn!(error = %e, "Audio graph unavailable");
                return;
            }
        };

        let meter = self.shared.analyser.bind_new();
        let played = match audio {
            SpeechAudio::Clip(clip) => {
                let duration = estimate_clip_duration(&clip);
                self.update(generation, |inner| inner.view.speech_duration = Some(duration));
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    played = graph.play_clip(&clip, Some(meter)) => played,
                }
            }
            SpeechAudio::Stream {
                sample_rate,
                chunks,
            } => {
                let Some(played) = self
                    .play_stream(generation, token, graph, sample_rate, chunks, meter)
                    .await
                else {
                    return;
                };
                played
            }
        };
        if let Err(e) = played {
            warn!(error = %e, "Playback failed");
        }
        self.update(generation, |_| self.shared.analyser.detach());
    }

    /// Schedule streamed PCM as it arrives, then wait for it to play out.
    /// Returns `None` when cancelled.
    async fn play_stream(
        &self,
        generation: u64,
        token: &CancellationToken,
        graph: Arc<dyn AudioGraph>,
        sample_rate: u32,
        mut chunks: BoxStream<'static, Result<Bytes, BridgeError>>,
        meter: Arc<LevelMeter>,
    ) -> Option<Result<(), PlaybackError>> {
        let mut player = StreamPlayer::new(graph, sample_rate, self.shared.sources.clone(), Some(meter));
        let mut result = Ok(());
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                next = chunks.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if let Err(e) = player.push(&chunk) {
                        result = Err(e);
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Speech stream interrupted");
                    break;
                }
                None => break,
            }
        }
        drop(chunks);

        let scheduled = player.scheduled();
        debug!(scheduled_ms = scheduled.as_millis() as u64, "Speech stream complete");
        self.update(generation, |inner| inner.view.speech_duration = Some(scheduled));
        tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            _ = player.finish() => {}
        }
        Some(result)
    }

    // --- helpers ---

    /// Race `call` against cancellation and the configured request timeout.
    /// `None` means the turn was cancelled.
    async fn bounded<T>(
        &self,
        token: &CancellationToken,
        call: impl Future<Output = Result<T, BridgeError>>,
    ) -> Option<Result<T, BridgeError>> {
        let limit = self.shared.config.request_timeout();
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = with_timeout(limit, call) => Some(result),
        }
    }

    /// End the turn in idle, optionally with a user-facing error.
    fn finish(&self, generation: u64, error: Option<VoiceError>) {
        self.update(generation, |inner| {
            if let Some(error) = error {
                info!(error = %error, "Turn failed");
                inner.view.error = Some(error);
            }
            self.shared.analyser.detach();
            inner.set_state(SessionState::Idle);
            inner.view.speaking_text = None;
            inner.view.speech_duration = None;
            inner.turn = None;
        });
    }

    /// Apply `change` if `generation` is still the current turn, and publish.
    fn update(&self, generation: u64, change: impl FnOnce(&mut Inner)) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        change(&mut *inner);
        self.publish(&inner);
        true
    }

    fn publish(&self, inner: &Inner) {
        self.shared.updates.send_replace(inner.view.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct ReplyEffects {
    execute: Option<ProposedAction>,
    record: Option<NewServiceRequest>,
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, BridgeError>>,
) -> Result<T, BridgeError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(BridgeError::Timeout)),
        None => call.await,
    }
}
