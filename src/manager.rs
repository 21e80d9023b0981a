//! Call manager: sole authority over the call state and session aggregate.
//!
//! Every mutation — UI commands, inbound signaling, media callbacks, timer
//! flushes — funnels through the session mutex. Async continuations re-check
//! the active `(call id, recipient)` pair before applying their results, so
//! work scheduled for a call that has since ended is discarded, not applied.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::Mutex;

use crate::batcher::{IceBatcher, dedup_candidates};
use crate::error::CallError;
use crate::events::{AudioDeviceUpdate, CallEvents};
use crate::media::{MediaSession, MediaSessionFactory, VideoRenderer};
use crate::observer::{MediaObserver, ObserverRegistry};
use crate::queues::PendingIceQueues;
use crate::session::{ActiveSession, CallSession};
use crate::signaling::{SignalingMessage, SignalingTransport};
use crate::state::CallState;
use crate::types::{
    AudioDevice, CallId, CameraState, IceCandidate, PendingOffer, Recipient, SessionDescription,
};

/// Label of the in-band data channel used for auxiliary signaling.
const DATA_CHANNEL_NAME: &str = "signaling";

/// Payload exchanged over the data channel to announce video enablement.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VideoEnabledMessage {
    video: bool,
}

/// Coordinates the call session: validates state transitions, drives the
/// media session, batches outbound ICE, and publishes state events.
pub struct CallManager {
    transport: Arc<dyn SignalingTransport>,
    factory: StdMutex<Option<Arc<dyn MediaSessionFactory>>>,
    renderer: StdMutex<Option<Arc<dyn VideoRenderer>>>,
    session: Mutex<CallSession>,
    queues: PendingIceQueues,
    batcher: IceBatcher,
    events: CallEvents,
    observers: ObserverRegistry,
    // Guards against concurrent renegotiation attempts after network loss.
    is_reestablishing: AtomicBool,
}

impl CallManager {
    pub fn new(transport: Arc<dyn SignalingTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            factory: StdMutex::new(None),
            renderer: StdMutex::new(None),
            session: Mutex::new(CallSession::default()),
            queues: PendingIceQueues::default(),
            batcher: IceBatcher::new(),
            events: CallEvents::new(),
            observers: ObserverRegistry::default(),
            is_reestablishing: AtomicBool::new(false),
        })
    }

    /// Provide the media session factory and the renderer surface. Required
    /// before any call can be started or accepted. The renderer's lifetime
    /// is one call: teardown consumes and releases it, so a fresh renderer
    /// must be attached before each new call.
    pub fn attach_media(
        &self,
        factory: Arc<dyn MediaSessionFactory>,
        renderer: Arc<dyn VideoRenderer>,
    ) {
        *self.factory.lock().unwrap() = Some(factory);
        *self.renderer.lock().unwrap() = Some(renderer);
    }

    pub fn events(&self) -> &CallEvents {
        &self.events
    }

    pub fn register_observer(&self, observer: Arc<dyn MediaObserver>) {
        self.observers.register(observer);
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn MediaObserver>) {
        self.observers.unregister(observer);
    }

    pub async fn current_state(&self) -> CallState {
        self.session.lock().await.state
    }

    pub async fn active_session(&self) -> Option<ActiveSession> {
        self.session.lock().await.active.clone()
    }

    pub async fn is_idle(&self) -> bool {
        self.session.lock().await.state.is_idle()
    }

    pub async fn is_pre_offer(&self) -> bool {
        self.session.lock().await.state.is_pre_offer()
    }

    /// Last known state of the local camera.
    pub async fn camera_state(&self) -> CameraState {
        self.session.lock().await.local_camera
    }

    /// Whether an offer for `call_id` should be answered with busy: some
    /// other call attempt already owns the session.
    pub async fn is_busy(&self, call_id: &CallId) -> bool {
        let session = self.session.lock().await;
        !session.state.is_idle() && !session.matches_call_id(call_id)
    }

    // ---- outgoing calls ----

    /// Start an outgoing call: create the media session, produce the local
    /// offer and send pre-offer then offer, in that order. Transitions to
    /// `Dialing` on success; precondition failures leave the state untouched.
    pub async fn start_outgoing(self: &Arc<Self>, recipient: Recipient) -> Result<CallId, CallError> {
        {
            let session = self.session.lock().await;
            if !session.state.is_idle() {
                warn!(
                    "refusing outgoing call to {} while {}",
                    recipient, session.state
                );
                return Err(CallError::CallInProgress);
            }
        }
        let factory = self
            .factory
            .lock()
            .unwrap()
            .clone()
            .ok_or(CallError::MissingPrecondition("media session factory"))?;
        let renderer = self
            .renderer
            .lock()
            .unwrap()
            .clone()
            .ok_or(CallError::MissingPrecondition("video renderer"))?;

        let call_id = CallId::generate();
        let media = factory.create(renderer, self.forwarder()).await?;
        media.register_data_channel(DATA_CHANNEL_NAME).await?;
        let offer = media.create_offer(false).await?;
        media.set_local_description(offer.clone()).await?;

        {
            let mut session = self.session.lock().await;
            // The session may have been claimed while the offer was being
            // produced; discard our setup rather than clobber it.
            if !session.state.is_idle() {
                drop(session);
                media.dispose().await;
                return Err(CallError::CallInProgress);
            }
            session.active = Some(ActiveSession::new(call_id.clone(), recipient.clone()));
            session.local_camera = media.camera_state();
            session.media = Some(media);
            session.transition(CallState::Dialing)?;
            self.events
                .recipient
                .send_replace(Some(recipient.clone()));
            self.events.call_state.send_replace(CallState::Dialing);
        }

        info!("dialing {} (call {})", recipient, call_id);
        self.transport
            .send(&recipient, SignalingMessage::PreOffer { call_id: call_id.clone() })
            .await?;
        self.transport
            .send(
                &recipient,
                SignalingMessage::Offer {
                    call_id: call_id.clone(),
                    sdp: offer.sdp,
                },
            )
            .await?;
        Ok(call_id)
    }

    /// The remote side started ringing.
    pub async fn on_remote_ringing(&self) {
        let mut session = self.session.lock().await;
        if session.state == CallState::Dialing {
            session.state = CallState::RemoteRinging;
            self.events.call_state.send_replace(CallState::RemoteRinging);
        } else {
            debug!("remote ringing ignored while {}", session.state);
        }
    }

    // ---- incoming calls ----

    /// A pre-offer arrived. The last pre-offer wins: an already-pending one
    /// is overwritten, not rejected — busy handling is the caller's job.
    pub async fn on_pre_offer(
        &self,
        call_id: CallId,
        recipient: Recipient,
    ) -> Result<(), CallError> {
        let mut session = self.session.lock().await;
        match session.state {
            CallState::Idle => session.transition(CallState::PreOffer)?,
            CallState::PreOffer => {
                debug!("received a new pre-offer while already expecting one");
            }
            other => {
                warn!("pre-offer for call {} ignored while {}", call_id, other);
                return Err(CallError::CallInProgress);
            }
        }
        session.active = Some(ActiveSession::new(call_id, recipient.clone()));
        self.events.recipient.send_replace(Some(recipient));
        self.events.call_state.send_replace(CallState::PreOffer);
        Ok(())
    }

    /// The full offer for an incoming call arrived; store it and start
    /// ringing locally.
    pub async fn on_incoming_ring(
        &self,
        offer: &str,
        call_id: CallId,
        recipient: Recipient,
        received_at: DateTime<Utc>,
    ) {
        let mut session = self.session.lock().await;
        if !matches!(session.state, CallState::Idle | CallState::PreOffer) {
            debug!("incoming ring for call {} ignored while {}", call_id, session.state);
            return;
        }
        // An offer without a preceding pre-offer implies one.
        if session.state.is_idle() {
            session.state = CallState::PreOffer;
        }
        session.active = Some(ActiveSession::new(call_id, recipient.clone()));
        session.pending_offer = Some(PendingOffer {
            sdp: offer.to_owned(),
            received_at,
        });
        session.state = CallState::LocalRinging;
        self.events.recipient.send_replace(Some(recipient));
        self.events.call_state.send_replace(CallState::LocalRinging);
    }

    /// A renegotiation offer arrived mid-call. Answers it with an
    /// ICE-restart answer; the call state is not changed.
    pub async fn on_new_offer(
        &self,
        offer: &str,
        call_id: &CallId,
        recipient: &Recipient,
    ) -> Result<(), CallError> {
        let (media, active) = {
            let session = self.session.lock().await;
            let Some(active) = session.active.clone() else {
                return Err(CallError::MissingPrecondition("matching call id"));
            };
            if active.call_id != *call_id {
                return Err(CallError::MissingPrecondition("matching call id"));
            }
            if active.recipient != *recipient {
                return Err(CallError::MissingPrecondition("matching recipient"));
            }
            let media = session
                .media
                .clone()
                .ok_or(CallError::MissingPrecondition("media session"))?;
            (media, active)
        };

        media
            .set_remote_description(SessionDescription::offer(offer))
            .await?;
        let answer = media.create_answer(true).await?;
        media.set_local_description(answer.clone()).await?;
        {
            let session = self.session.lock().await;
            if session.active.as_ref() != Some(&active) {
                debug!(
                    "call {} ended while its renegotiation answer was being produced",
                    active.call_id
                );
                return Ok(());
            }
        }
        self.transport
            .send(
                &active.recipient,
                SignalingMessage::Answer {
                    call_id: active.call_id,
                    sdp: answer.sdp,
                },
            )
            .await
    }

    /// Accept the pending incoming call: build the media session, apply the
    /// stored offer, send the answer, and drain early remote candidates.
    /// Fails fast, naming the absent requirement, without touching state.
    pub async fn accept_incoming(self: &Arc<Self>) -> Result<(), CallError> {
        let (expected, offer_sdp, factory, renderer) = {
            let mut session = self.session.lock().await;
            let active = session
                .active
                .clone()
                .ok_or(CallError::MissingPrecondition("active session"))?;
            let offer = session
                .pending_offer
                .as_ref()
                .map(|p| p.sdp.clone())
                .ok_or(CallError::MissingPrecondition("pending offer"))?;
            let factory = self
                .factory
                .lock()
                .unwrap()
                .clone()
                .ok_or(CallError::MissingPrecondition("media session factory"))?;
            let renderer = self
                .renderer
                .lock()
                .unwrap()
                .clone()
                .ok_or(CallError::MissingPrecondition("video renderer"))?;
            session.transition(CallState::Answering)?;
            self.events.call_state.send_replace(CallState::Answering);
            (active, offer, factory, renderer)
        };

        let media = factory.create(renderer, self.forwarder()).await?;
        media.register_data_channel(DATA_CHANNEL_NAME).await?;
        media
            .set_remote_description(SessionDescription::offer(offer_sdp))
            .await?;
        let answer = media.create_answer(false).await?;
        media.set_local_description(answer.clone()).await?;

        {
            let mut session = self.session.lock().await;
            if session.active.as_ref() != Some(&expected) {
                drop(session);
                warn!("call {} ended while being accepted", expected.call_id);
                media.dispose().await;
                return Ok(());
            }
            session.local_camera = media.camera_state();
            session.media = Some(media.clone());
        }

        for candidate in self.queues.drain_incoming() {
            if let Err(e) = media.add_ice_candidate(candidate).await {
                warn!("failed to apply queued candidate: {e}");
            }
        }

        self.transport
            .send(
                &expected.recipient,
                SignalingMessage::Answer {
                    call_id: expected.call_id.clone(),
                    sdp: answer.sdp,
                },
            )
            .await?;

        let mut session = self.session.lock().await;
        if session.active.as_ref() == Some(&expected) {
            session.pending_offer = None;
        }
        Ok(())
    }

    // ---- inbound signaling ----

    /// The remote answer to our offer. Stale or mismatched answers are
    /// expected races and are logged, never surfaced as errors.
    pub async fn handle_answer(
        self: &Arc<Self>,
        recipient: &Recipient,
        call_id: &CallId,
        answer_sdp: &str,
    ) -> Result<(), CallError> {
        let (media, expected) = {
            let session = self.session.lock().await;
            let in_answerable_state =
                matches!(session.state, CallState::Dialing | CallState::Connected);
            let Some(expected) = session.active.clone().filter(|a| {
                in_answerable_state && a.call_id == *call_id && a.recipient == *recipient
            }) else {
                warn!("got answer for a recipient and call id we are not dialing");
                return Ok(());
            };
            match session.media.clone() {
                Some(media) => (media, expected),
                None => {
                    drop(session);
                    error!("live call {} has no media session; ending call", call_id);
                    self.terminate().await;
                    return Err(CallError::Internal("media session missing"));
                }
            }
        };

        media
            .set_remote_description(SessionDescription::answer(answer_sdp))
            .await?;

        {
            let session = self.session.lock().await;
            if session.active.as_ref() != Some(&expected) {
                debug!("call {} ended while answer was being applied", call_id);
                return Ok(());
            }
        }
        for candidate in self.queues.drain_incoming() {
            if let Err(e) = media.add_ice_candidate(candidate).await {
                warn!("failed to apply queued candidate: {e}");
            }
        }
        self.schedule_outgoing_flush(expected);
        Ok(())
    }

    /// Remote candidates: applied in order if the media session is ready,
    /// queued otherwise. Mismatched call ids are ignored.
    pub async fn handle_remote_ice_candidates(
        &self,
        candidates: Vec<IceCandidate>,
        call_id: &CallId,
    ) {
        let media = {
            let session = self.session.lock().await;
            if !session.matches_call_id(call_id) {
                warn!("got remote ice candidates for a call that isn't active");
                return;
            }
            match &session.media {
                Some(media) if media.ready_for_ice() => media.clone(),
                _ => {
                    self.queues.push_incoming(candidates);
                    return;
                }
            }
        };
        for candidate in candidates {
            if let Err(e) = media.add_ice_candidate(candidate).await {
                warn!("failed to apply remote candidate: {e}");
            }
        }
    }

    // ---- media session callbacks ----

    /// A locally discovered candidate: enqueue it and, once the session is
    /// ready, restart the batch window scoped to the current call identity.
    pub async fn on_local_ice_candidate(self: &Arc<Self>, candidate: IceCandidate) {
        for observer in self.observers.snapshot() {
            observer.on_ice_candidate(candidate.clone()).await;
        }
        let expected = {
            let session = self.session.lock().await;
            let Some(active) = session.active.clone() else {
                return;
            };
            self.queues.push_outgoing(candidate);
            if !session.media.as_ref().is_some_and(|m| m.ready_for_ice()) {
                return;
            }
            active
        };
        self.schedule_outgoing_flush(expected);
    }

    /// Data channel payloads carry the peer's video enablement.
    pub async fn on_data_channel_message(&self, payload: Vec<u8>) {
        for observer in self.observers.snapshot() {
            observer.on_data_channel_message(payload.clone()).await;
        }
        match serde_json::from_slice::<VideoEnabledMessage>(&payload) {
            Ok(message) => {
                self.events.remote_video_enabled.send_replace(message.video);
            }
            Err(e) => error!("failed to deserialize data channel message: {e}"),
        }
    }

    pub async fn on_stream_added(&self) {
        for observer in self.observers.snapshot() {
            observer.on_stream_added().await;
        }
    }

    /// Media connection state changed.
    pub async fn on_media_connection_change(&self, connected: bool) {
        for observer in self.observers.snapshot() {
            observer.on_connection_change(connected).await;
        }
        if connected {
            self.on_connection_established().await;
        } else {
            debug!("media connection lost");
        }
    }

    /// The media session reports the connection is up.
    pub async fn on_connection_established(&self) {
        let mut session = self.session.lock().await;
        if session.state.is_pending_connection() {
            session.state = CallState::Connected;
            self.events.call_state.send_replace(CallState::Connected);
        } else {
            debug!("connection established ignored while {}", session.state);
        }
    }

    /// Enable audio and announce the local video state once connected.
    pub async fn start_communication(&self) {
        let media = {
            let session = self.session.lock().await;
            if !session.state.is_connected() {
                warn!("start_communication requested while {}", session.state);
                return;
            }
            match session.media.clone() {
                Some(media) => media,
                None => return,
            }
        };
        media.set_audio_enabled(true).await;
        self.events.audio_enabled.send_replace(true);
        let video_enabled = *self.events.video_enabled.borrow();
        self.announce_video_state(&media, video_enabled).await;
    }

    // ---- UI commands ----

    /// Mute or unmute the microphone. Not applicable outside a connected or
    /// pending call; the request is then logged and dropped.
    pub async fn set_audio_muted(&self, muted: bool) {
        let media = {
            let session = self.session.lock().await;
            if !session.state.is_connected() && !session.state.is_pending_connection() {
                warn!("audio mute change requested while {}", session.state);
                return;
            }
            session.media.clone()
        };
        if let Some(media) = media {
            media.set_audio_enabled(!muted).await;
        }
        self.events.audio_enabled.send_replace(!muted);
    }

    /// Enable or disable the camera, notifying the peer over the data
    /// channel.
    pub async fn set_video_muted(&self, muted: bool) {
        let media = {
            let session = self.session.lock().await;
            if !session.state.is_connected() && !session.state.is_pending_connection() {
                warn!("video mute change requested while {}", session.state);
                return;
            }
            session.media.clone()
        };
        self.events.video_enabled.send_replace(!muted);
        if let Some(media) = media {
            media.set_video_enabled(!muted).await;
            self.announce_video_state(&media, !muted).await;
        }
    }

    /// Switch between front and back camera. No-op while the camera is off.
    pub async fn flip_camera(&self) {
        let (media, expected) = {
            let session = self.session.lock().await;
            if !session.local_camera.enabled {
                return;
            }
            match (session.media.clone(), session.active.clone()) {
                (Some(media), Some(active)) => (media, active),
                _ => return,
            }
        };
        let new_state = media.flip_camera().await;
        let mut session = self.session.lock().await;
        if session.active.as_ref() == Some(&expected) {
            session.local_camera = new_state;
        }
    }

    /// Publish an audio routing change from the platform audio layer.
    pub fn on_audio_device_changed(
        &self,
        selected: AudioDevice,
        available: HashSet<AudioDevice>,
    ) {
        self.events
            .audio_device
            .send_replace(AudioDeviceUpdate { selected, available });
    }

    // ---- ending calls ----

    /// Reject the pending incoming call: notify the peer, then tear down.
    pub async fn handle_deny_call(&self) -> Result<(), CallError> {
        self.end_with_notification().await
    }

    /// Hang up the call locally: notify the peer, then tear down.
    pub async fn handle_local_hangup(&self) -> Result<(), CallError> {
        self.end_with_notification().await
    }

    /// The peer hung up; tear down without sending end-call back.
    pub async fn handle_remote_hangup(&self) {
        self.terminate().await;
    }

    /// The network connection was lost for good; tear down silently.
    pub async fn handle_connection_lost(&self) {
        self.terminate().await;
    }

    /// Answer a second caller with end-call while the session stays with the
    /// current call.
    pub async fn handle_busy_call(
        &self,
        call_id: CallId,
        recipient: &Recipient,
    ) -> Result<(), CallError> {
        self.transport
            .send(recipient, SignalingMessage::EndCall { call_id })
            .await
    }

    async fn end_with_notification(&self) -> Result<(), CallError> {
        let active = self.session.lock().await.active.clone();
        let Some(active) = active else {
            // Already idle; ending twice is a harmless no-op.
            return Ok(());
        };
        let sent = self
            .transport
            .send(
                &active.recipient,
                SignalingMessage::EndCall {
                    call_id: active.call_id.clone(),
                },
            )
            .await;
        self.terminate().await;
        sent
    }

    /// Common teardown for every end path. Idempotent; always releases the
    /// renderer and media session even when entered from an error path.
    async fn terminate(&self) {
        self.batcher.cancel();
        let media = self.session.lock().await.reset();
        self.is_reestablishing.store(false, Ordering::SeqCst);
        if let Some(media) = media {
            media.dispose().await;
        }
        if let Some(renderer) = self.renderer.lock().unwrap().take() {
            renderer.release();
        }
        self.queues.clear();
        self.events.call_state.send_replace(CallState::Idle);
        self.events.audio_enabled.send_replace(false);
        self.events.video_enabled.send_replace(false);
        self.events.remote_video_enabled.send_replace(false);
        self.events.recipient.send_replace(None);
        debug!("call ended; session reset to idle");
    }

    // ---- renegotiation ----

    /// Produce and send a single ICE-restart offer after network loss. A
    /// second attempt while one is in flight is dropped; the guard clears on
    /// completion whether or not the send succeeded.
    pub async fn reestablish(&self) -> Result<(), CallError> {
        let (media, active) = {
            let session = self.session.lock().await;
            match (session.media.clone(), session.active.clone()) {
                (Some(media), Some(active)) => (media, active),
                _ => return Ok(()),
            }
        };
        if self.is_reestablishing.swap(true, Ordering::SeqCst) {
            debug!("reestablish already in progress for call {}", active.call_id);
            return Ok(());
        }
        let _guard = scopeguard::guard((), |_| {
            self.is_reestablishing.store(false, Ordering::SeqCst);
        });

        let offer = media.create_offer(true).await?;
        media.set_local_description(offer.clone()).await?;
        {
            let session = self.session.lock().await;
            if session.active.as_ref() != Some(&active) {
                debug!(
                    "call {} ended while the restart offer was being produced",
                    active.call_id
                );
                return Ok(());
            }
        }
        let result = self
            .transport
            .send(
                &active.recipient,
                SignalingMessage::Offer {
                    call_id: active.call_id.clone(),
                    sdp: offer.sdp,
                },
            )
            .await;
        if let Err(e) = &result {
            warn!("reestablish offer for call {} failed: {e}", active.call_id);
        }
        result
    }

    // ---- outgoing ICE batching ----

    fn schedule_outgoing_flush(self: &Arc<Self>, expected: ActiveSession) {
        let manager = Arc::clone(self);
        self.batcher.schedule(async move {
            manager.flush_outgoing_ice(expected).await;
        });
    }

    /// Drain and send the outgoing candidate batch, unless the session
    /// identity changed since the batch was scheduled.
    async fn flush_outgoing_ice(&self, expected: ActiveSession) {
        {
            let session = self.session.lock().await;
            if session.active.as_ref() != Some(&expected) {
                debug!("dropping stale ice batch for call {}", expected.call_id);
                return;
            }
        }
        let batch = dedup_candidates(self.queues.drain_outgoing());
        if batch.is_empty() {
            return;
        }
        let message = SignalingMessage::ice_candidates(expected.call_id.clone(), &batch);
        if let Err(e) = self.transport.send(&expected.recipient, message).await {
            warn!(
                "failed to send {} batched candidates for call {}: {e}",
                batch.len(),
                expected.call_id
            );
        }
    }

    async fn announce_video_state(&self, media: &Arc<dyn MediaSession>, enabled: bool) {
        let payload = match serde_json::to_vec(&VideoEnabledMessage { video: enabled }) {
            Ok(payload) => payload,
            Err(e) => {
                error!("failed to serialize video state message: {e}");
                return;
            }
        };
        if let Err(e) = media.send_data(&payload).await {
            warn!("failed to announce video state to peer: {e}");
        }
    }

    fn forwarder(self: &Arc<Self>) -> Arc<dyn MediaObserver> {
        Arc::new(MediaEventForwarder {
            manager: Arc::downgrade(self),
        })
    }
}

/// Bridges media engine callbacks into the manager without keeping it alive.
struct MediaEventForwarder {
    manager: Weak<CallManager>,
}

#[async_trait::async_trait]
impl MediaObserver for MediaEventForwarder {
    async fn on_ice_candidate(&self, candidate: IceCandidate) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_local_ice_candidate(candidate).await;
        }
    }

    async fn on_stream_added(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_stream_added().await;
        }
    }

    async fn on_data_channel_message(&self, payload: Vec<u8>) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_data_channel_message(payload).await;
        }
    }

    async fn on_connection_change(&self, connected: bool) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_media_connection_change(connected).await;
        }
    }
}
