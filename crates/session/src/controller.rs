//! Session controller
//!
//! Owns every live monitoring session, keyed by driver. A session pairs
//! an `Active` journey row with a running [`FrameLoop`] and a supervisor
//! task that records the loop's events.
//!
//! Lifecycle of one session:
//! 1. `start_session` reserves the driver's slot, starts the loop and waits
//!    until the camera and classifier are acquired. Only then is the journey
//!    row inserted, so a failed start leaves nothing behind.
//! 2. The supervisor drains the event channel into the [`JourneyRecorder`].
//! 3. `end_session` cancels the loop, joins the supervisor (bounded) and
//!    finalizes the row. If the loop dies on its own (camera gone, classifier
//!    error), the supervisor finalizes instead.

use crate::notice::{EndReason, SessionNotice};
use crate::recorder::JourneyRecorder;
use crate::recovery::complete_orphaned_journeys;
use crate::report::{generate_report, JourneyReport};
use crate::{SessionConfig, SessionError};
use alerting::Alerter;
use camera_capture::CameraSource;
use chrono::Utc;
use dms::{ClassifierLoader, DetectionEvent, DmsConfig, FrameLoop, LoopExit};
use std::collections::HashMap;
use std::sync::Arc;
use storage::{Driver, DriverId, JourneyId, JourneyStatus, JourneyStore};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

enum Slot {
    /// `start_session` in progress
    Starting,
    Active(Arc<LiveSession>),
    /// Finalized after the loop failed; reported once by `end_session`
    Ended(JourneyId),
}

#[derive(Default)]
struct SessionState {
    supervisor: Option<JoinHandle<()>>,
    finalized: bool,
}

struct LiveSession {
    driver_id: DriverId,
    journey_id: JourneyId,
    cancel: CancellationToken,
    recorder: JourneyRecorder,
    /// Serializes `end_session` calls for this session
    ending: Mutex<()>,
    state: Mutex<SessionState>,
}

struct Shared {
    store: Arc<dyn JourneyStore>,
    sessions: Mutex<HashMap<DriverId, Slot>>,
    notices: broadcast::Sender<SessionNotice>,
}

impl Shared {
    /// Close the recorder and mark the journey `Completed`.
    ///
    /// Returns false if the session was already finalized. On error the
    /// session stays registered so the caller can retry.
    async fn finalize(
        &self,
        session: &LiveSession,
        reason: EndReason,
    ) -> Result<bool, SessionError> {
        let mut state = session.state.lock().await;
        if state.finalized {
            return Ok(false);
        }

        let count = session.recorder.close_and_flush().await.map_err(|e| {
            error!(
                journey_id = session.journey_id,
                "Failed to write final drowsiness count: {}", e
            );
            SessionError::PersistenceFailure(e)
        })?;
        self.store
            .finalize_journey(session.journey_id, Utc::now(), JourneyStatus::Completed)
            .await
            .map_err(|e| {
                error!(journey_id = session.journey_id, "Failed to finalize journey: {}", e);
                SessionError::PersistenceFailure(e)
            })?;
        state.finalized = true;
        drop(state);

        {
            let mut sessions = self.sessions.lock().await;
            let ours = matches!(
                sessions.get(&session.driver_id),
                Some(Slot::Active(live)) if live.journey_id == session.journey_id
            );
            if ours {
                match reason {
                    EndReason::Requested => {
                        sessions.remove(&session.driver_id);
                    }
                    EndReason::StreamEnded => {
                        sessions.insert(session.driver_id, Slot::Ended(session.journey_id));
                    }
                }
            }
        }

        info!(
            driver_id = session.driver_id,
            journey_id = session.journey_id,
            count,
            ?reason,
            "Journey completed"
        );
        let _ = self.notices.send(SessionNotice::Ended {
            driver_id: session.driver_id,
            journey_id: session.journey_id,
            drowsiness_count: count,
            reason,
        });
        Ok(true)
    }
}

/// Starts, tracks and ends monitoring sessions
pub struct SessionController {
    shared: Arc<Shared>,
    camera: Arc<dyn CameraSource>,
    classifier: Arc<dyn ClassifierLoader>,
    alerter: Option<Arc<dyn Alerter>>,
    detection: DmsConfig,
    config: SessionConfig,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn JourneyStore>,
        camera: Arc<dyn CameraSource>,
        classifier: Arc<dyn ClassifierLoader>,
        detection: DmsConfig,
        config: SessionConfig,
    ) -> Self {
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                store,
                sessions: Mutex::new(HashMap::new()),
                notices,
            }),
            camera,
            classifier,
            alerter: None,
            detection,
            config,
        }
    }

    /// Sound this alarm on drowsy frames
    pub fn with_alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.shared.notices.subscribe()
    }

    /// Start monitoring a new journey for `driver`
    pub async fn start_session(&self, driver: &Driver) -> Result<JourneyId, SessionError> {
        let driver_id = driver.id;
        {
            let mut sessions = self.shared.sessions.lock().await;
            match sessions.get(&driver_id) {
                Some(Slot::Starting) | Some(Slot::Active(_)) => {
                    return Err(SessionError::AlreadyActive)
                }
                Some(Slot::Ended(_)) | None => {
                    sessions.insert(driver_id, Slot::Starting);
                }
            }
        }

        match self.launch(driver_id).await {
            Ok(journey_id) => Ok(journey_id),
            Err(e) => {
                self.shared.sessions.lock().await.remove(&driver_id);
                Err(e)
            }
        }
    }

    async fn launch(&self, driver_id: DriverId) -> Result<JourneyId, SessionError> {
        if let Some(existing) = self.shared.store.get_active_journey(driver_id).await? {
            warn!(driver_id, journey_id = existing, "Driver already has an active journey");
            return Err(SessionError::AlreadyActive);
        }

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let mut frame_loop = FrameLoop::new(
            Arc::clone(&self.camera),
            Arc::clone(&self.classifier),
            self.detection.clone(),
        );
        if let Some(alerter) = &self.alerter {
            frame_loop = frame_loop.with_alerter(Arc::clone(alerter));
        }
        let handle = frame_loop.spawn(cancel.clone(), events_tx);

        match handle.ready.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join.await;
                return Err(SessionError::ResourceUnavailable(e.to_string()));
            }
            Err(_) => {
                let reason = match handle.join.await {
                    Err(e) => format!("detection worker failed: {}", e),
                    Ok(_) => "detection worker exited during startup".to_string(),
                };
                return Err(SessionError::ResourceUnavailable(reason));
            }
        }

        let journey_id = match self.shared.store.insert_journey(driver_id, Utc::now()).await {
            Ok(id) => id,
            Err(e) => {
                error!(driver_id, "Failed to create journey: {}", e);
                cancel.cancel();
                let _ = handle.join.await;
                return Err(SessionError::PersistenceFailure(e));
            }
        };

        let session = Arc::new(LiveSession {
            driver_id,
            journey_id,
            cancel,
            recorder: JourneyRecorder::new(
                driver_id,
                journey_id,
                Arc::clone(&self.shared.store),
                self.shared.notices.clone(),
            ),
            ending: Mutex::new(()),
            state: Mutex::new(SessionState::default()),
        });

        // The supervisor may finalize only once the slot is registered.
        let (armed_tx, armed_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.shared),
            Arc::clone(&session),
            events_rx,
            handle.join,
            armed_rx,
        ));
        session.state.lock().await.supervisor = Some(supervisor);
        self.shared
            .sessions
            .lock()
            .await
            .insert(driver_id, Slot::Active(session));
        let _ = armed_tx.send(());

        info!(driver_id, journey_id, "Journey started");
        let _ = self.shared.notices.send(SessionNotice::Started {
            driver_id,
            journey_id,
        });
        Ok(journey_id)
    }

    /// Stop monitoring and complete the driver's journey
    pub async fn end_session(&self, driver_id: DriverId) -> Result<(), SessionError> {
        let session = {
            let mut sessions = self.shared.sessions.lock().await;
            match sessions.get(&driver_id) {
                Some(Slot::Active(session)) => Arc::clone(session),
                Some(Slot::Ended(_)) => {
                    sessions.remove(&driver_id);
                    return Err(SessionError::StreamEnded);
                }
                Some(Slot::Starting) | None => return Err(SessionError::NoActiveSession),
            }
        };

        let _ending = session.ending.lock().await;
        if session.state.lock().await.finalized {
            return Err(SessionError::NoActiveSession);
        }

        session.cancel.cancel();
        let supervisor = session.state.lock().await.supervisor.take();
        if let Some(supervisor) = supervisor {
            match timeout(self.config.join_timeout(), supervisor).await {
                Ok(Ok(())) => debug!(journey_id = session.journey_id, "Detection worker joined"),
                Ok(Err(e)) => warn!(journey_id = session.journey_id, "Session supervisor failed: {}", e),
                Err(_) => warn!(
                    journey_id = session.journey_id,
                    "Detection worker did not stop within {:?}; finalizing anyway",
                    self.config.join_timeout()
                ),
            }
        }

        if !self.shared.finalize(&session, EndReason::Requested).await? {
            // The loop failed while we were stopping it and the supervisor
            // got there first. The caller asked to end, so that is success.
            let mut sessions = self.shared.sessions.lock().await;
            if matches!(sessions.get(&driver_id), Some(Slot::Ended(id)) if *id == session.journey_id)
            {
                sessions.remove(&driver_id);
            }
        }
        Ok(())
    }

    pub async fn is_active(&self, driver_id: DriverId) -> bool {
        matches!(
            self.shared.sessions.lock().await.get(&driver_id),
            Some(Slot::Starting) | Some(Slot::Active(_))
        )
    }

    /// Journey id and live drowsiness count of the driver's session
    pub async fn active_journey(&self, driver_id: DriverId) -> Option<(JourneyId, u32)> {
        match self.shared.sessions.lock().await.get(&driver_id) {
            Some(Slot::Active(session)) => Some((session.journey_id, session.recorder.count())),
            _ => None,
        }
    }

    pub async fn generate_report(&self, driver: &Driver) -> Result<JourneyReport, SessionError> {
        Ok(generate_report(self.shared.store.as_ref(), driver).await?)
    }

    /// Complete `Active` journeys that have no live session, e.g. after a
    /// crash. Returns the ids of the journeys completed.
    pub async fn recover_orphaned_journeys(&self) -> Result<Vec<JourneyId>, SessionError> {
        let busy: Vec<DriverId> = {
            let sessions = self.shared.sessions.lock().await;
            sessions
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Starting | Slot::Active(_)))
                .map(|(driver_id, _)| *driver_id)
                .collect()
        };
        Ok(complete_orphaned_journeys(self.shared.store.as_ref(), &busy).await?)
    }

    /// End every live session. Returns how many were ended.
    pub async fn shutdown(&self) -> usize {
        let drivers: Vec<DriverId> = {
            let sessions = self.shared.sessions.lock().await;
            sessions
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
                .map(|(driver_id, _)| *driver_id)
                .collect()
        };

        let mut ended = 0;
        for driver_id in drivers {
            match self.end_session(driver_id).await {
                Ok(()) => ended += 1,
                Err(e) => warn!(driver_id, "Failed to end session on shutdown: {}", e),
            }
        }
        info!(ended, "Session controller shut down");
        ended
    }
}

async fn supervise(
    shared: Arc<Shared>,
    session: Arc<LiveSession>,
    mut events: mpsc::Receiver<DetectionEvent>,
    worker: JoinHandle<LoopExit>,
    armed: oneshot::Receiver<()>,
) {
    session.recorder.drain(&mut events).await;

    let failure = match worker.await {
        Ok(exit) => exit.error.map(|e| e.to_string()),
        Err(e) => Some(format!("detection worker failed: {}", e)),
    };
    let Some(failure) = failure else {
        debug!(journey_id = session.journey_id, "Detection loop stopped on request");
        return;
    };

    warn!(
        driver_id = session.driver_id,
        journey_id = session.journey_id,
        "Monitoring stopped: {}", failure
    );
    let _ = armed.await;
    if let Err(e) = shared.finalize(&session, EndReason::StreamEnded).await {
        error!(
            journey_id = session.journey_id,
            "Could not complete journey after stream end, end it manually to retry: {}", e
        );
    }
}
