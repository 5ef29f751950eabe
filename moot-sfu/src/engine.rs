use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

use moot_core::ParticipantId;

use crate::IceConfig;

/// The forwarding fabric shared by all SFU-engaged rooms.
///
/// One readers-writer lock guards both maps. Nothing awaits while it is held:
/// callers snapshot what they need and release before any peer-connection
/// call. RTP forwarders never acquire it at all; each published track is one
/// shared local track whose bindings fan packets out to every attached
/// connection.
pub struct SfuEngine {
    ice: IceConfig,
    inner: RwLock<EngineInner>,
}

#[derive(Default)]
struct EngineInner {
    peer_connections: HashMap<ParticipantId, Arc<RTCPeerConnection>>,
    /// sender id -> track id -> local mirror fed from the remote track
    published_tracks: HashMap<ParticipantId, HashMap<String, Arc<TrackLocalStaticRTP>>>,
}

impl SfuEngine {
    #[must_use]
    pub fn new(ice: IceConfig) -> Self {
        Self {
            ice,
            inner: RwLock::new(EngineInner::default()),
        }
    }

    /// Create a peer connection for the participant and wire up its handlers.
    ///
    /// Tracks already published by other members are attached immediately so a
    /// late joiner receives them on its next negotiation. Adding an existing
    /// member is a no-op.
    pub async fn add(self: &Arc<Self>, participant_id: ParticipantId) -> Result<()> {
        if self.is_member(&participant_id).await {
            debug!(participant_id = %participant_id, "already an sfu member");
            return Ok(());
        }

        let pc = self.new_peer_connection().await?;

        {
            let id = participant_id.clone();
            pc.on_ice_connection_state_change(Box::new(move |state| {
                info!(participant_id = %id, %state, "ice connection state changed");
                Box::pin(async {})
            }));
        }

        {
            let engine = Arc::clone(self);
            let id = participant_id.clone();
            pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                info!(participant_id = %id, %state, "peer connection state changed");
                if state == RTCPeerConnectionState::Failed {
                    let engine = Arc::clone(&engine);
                    let id = id.clone();
                    tokio::spawn(async move {
                        engine.remove(&id).await;
                    });
                }
                Box::pin(async {})
            }));
        }

        {
            let engine = Arc::clone(self);
            let id = participant_id.clone();
            pc.on_track(Box::new(move |track, _receiver, _transceiver| {
                let engine = Arc::clone(&engine);
                let id = id.clone();
                Box::pin(async move {
                    engine.ingest_track(id, track).await;
                })
            }));
        }

        let backlog: Vec<Arc<TrackLocalStaticRTP>> = {
            let mut inner = self.inner.write().await;
            inner
                .peer_connections
                .insert(participant_id.clone(), Arc::clone(&pc));
            inner
                .published_tracks
                .entry(participant_id.clone())
                .or_default();
            inner
                .published_tracks
                .iter()
                .filter(|(sender_id, _)| **sender_id != participant_id)
                .flat_map(|(_, tracks)| tracks.values().cloned())
                .collect()
        };

        info!(participant_id = %participant_id, "added sfu member");

        // Tracks published before this member joined still need to reach them.
        for track in backlog {
            if let Err(e) = pc
                .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
            {
                warn!(
                    participant_id = %participant_id,
                    track_id = %track.id(),
                    error = %e,
                    "failed to attach existing track"
                );
            }
        }

        Ok(())
    }

    /// Close and forget the participant's peer connection and published
    /// tracks. Forwarders tied to its remote tracks observe the read failure
    /// and terminate. Removing an absent member is a no-op.
    pub async fn remove(&self, participant_id: &ParticipantId) {
        let pc = {
            let mut inner = self.inner.write().await;
            inner.published_tracks.remove(participant_id);
            inner.peer_connections.remove(participant_id)
        };

        if let Some(pc) = pc {
            if let Err(e) = pc.close().await {
                warn!(participant_id = %participant_id, error = %e, "error closing peer connection");
            }
            info!(participant_id = %participant_id, "removed sfu member");
        }
    }

    /// Mirror a newly arrived remote track, attach the mirror to every other
    /// member's connection and start the RTP forwarder.
    async fn ingest_track(&self, sender_id: ParticipantId, remote: Arc<TrackRemote>) {
        let track_id = remote.id();
        let local = Arc::new(TrackLocalStaticRTP::new(
            remote.codec().capability.clone(),
            track_id.clone(),
            remote.stream_id(),
        ));

        let recipients: Vec<(ParticipantId, Arc<RTCPeerConnection>)> = {
            let mut inner = self.inner.write().await;
            // The sender may have left between the callback firing and now.
            let Some(tracks) = inner.published_tracks.get_mut(&sender_id) else {
                debug!(participant_id = %sender_id, track_id = %track_id, "track arrived for departed member");
                return;
            };
            tracks.insert(track_id.clone(), Arc::clone(&local));
            inner
                .peer_connections
                .iter()
                .filter(|(id, _)| **id != sender_id)
                .map(|(id, pc)| (id.clone(), Arc::clone(pc)))
                .collect()
        };

        info!(
            participant_id = %sender_id,
            track_id = %track_id,
            codec = %remote.codec().capability.mime_type,
            "ingesting published track"
        );

        for (other_id, pc) in recipients {
            match pc
                .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
                .await
            {
                Ok(_) => debug!(participant_id = %other_id, track_id = %track_id, "track attached"),
                // One refusing recipient must not cost the others the track.
                Err(e) => warn!(
                    participant_id = %other_id,
                    track_id = %track_id,
                    error = %e,
                    "failed to attach track"
                ),
            }
        }

        tokio::spawn(async move {
            loop {
                match remote.read_rtp().await {
                    Ok((packet, _)) => {
                        if let Err(e) = local.write_rtp(&packet).await {
                            // ErrClosedPipe just means nothing is bound yet.
                            if webrtc::Error::ErrClosedPipe != e {
                                debug!(track_id = %local.id(), error = %e, "rtp write failed");
                            }
                        }
                    }
                    Err(e) => {
                        debug!(track_id = %local.id(), error = %e, "rtp reader stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Apply a participant's SDP offer to its peer connection and return the
    /// generated answer.
    pub async fn handle_offer(&self, participant_id: &ParticipantId, sdp: String) -> Result<String> {
        let pc = self
            .connection(participant_id)
            .await
            .ok_or_else(|| anyhow!("no peer connection for participant {participant_id}"))?;

        let offer = RTCSessionDescription::offer(sdp)?;
        pc.set_remote_description(offer).await?;
        let answer = pc.create_answer(None).await?;
        let answer_sdp = answer.sdp.clone();
        pc.set_local_description(answer).await?;
        Ok(answer_sdp)
    }

    /// Apply a participant's SDP answer. Unknown participants are ignored.
    pub async fn handle_answer(&self, participant_id: &ParticipantId, sdp: String) -> Result<()> {
        let Some(pc) = self.connection(participant_id).await else {
            return Ok(());
        };
        let answer = RTCSessionDescription::answer(sdp)?;
        pc.set_remote_description(answer).await?;
        Ok(())
    }

    /// Add a trickled ICE candidate to the participant's peer connection.
    /// Unknown participants are ignored.
    pub async fn handle_ice_candidate(
        &self,
        participant_id: &ParticipantId,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    ) -> Result<()> {
        let Some(pc) = self.connection(participant_id).await else {
            return Ok(());
        };
        pc.add_ice_candidate(RTCIceCandidateInit {
            candidate,
            sdp_mid,
            sdp_mline_index,
            ..Default::default()
        })
        .await?;
        Ok(())
    }

    pub async fn is_member(&self, participant_id: &ParticipantId) -> bool {
        self.inner
            .read()
            .await
            .peer_connections
            .contains_key(participant_id)
    }

    pub async fn member_count(&self) -> usize {
        self.inner.read().await.peer_connections.len()
    }

    /// Number of tracks currently published by the participant.
    pub async fn published_track_count(&self, participant_id: &ParticipantId) -> usize {
        self.inner
            .read()
            .await
            .published_tracks
            .get(participant_id)
            .map_or(0, HashMap::len)
    }

    async fn connection(&self, participant_id: &ParticipantId) -> Option<Arc<RTCPeerConnection>> {
        self.inner
            .read()
            .await
            .peer_connections
            .get(participant_id)
            .cloned()
    }

    async fn new_peer_connection(&self) -> Result<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.ice.urls.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        Ok(Arc::new(api.new_peer_connection(config).await?))
    }
}
