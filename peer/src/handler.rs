//! Peer Handler (§4.7). Grounded directly on `services.py`'s
//! `_process_command`/`_handle_poll_command`: duplicate suppression by id,
//! poll-vs-capture dispatch, filename derivation, and jitter computation.

use std::sync::Arc;

use chrono::Local;
use helmet_protocol::{jitter_us, Command, CommandKind, Response, ResponseStatus};

use crate::clock::Clock;
use crate::drivers::CaptureDriver;
use crate::session::SessionGrouper;
use crate::session_log::SessionLog;

pub struct PeerHandler {
    client_id: String,
    cam_ordinal: u32,
    camera: Arc<dyn CaptureDriver>,
    clock: Arc<dyn Clock>,
    grouper: SessionGrouper,
    session_log: SessionLog,
    last_command_id: Option<u64>,
    attempts_in_session: u32,
}

impl PeerHandler {
    pub fn new(
        client_id: String,
        cam_ordinal: u32,
        camera: Arc<dyn CaptureDriver>,
        clock: Arc<dyn Clock>,
        grouper: SessionGrouper,
    ) -> Self {
        Self {
            client_id,
            cam_ordinal,
            camera,
            clock,
            grouper,
            session_log: SessionLog::new(),
            last_command_id: None,
            attempts_in_session: 0,
        }
    }

    /// Returns `None` when the command is a duplicate of the last one seen
    /// (§4.7's "if id == last_seen_id, ignore" — no response is sent at all).
    pub async fn handle(&mut self, cmd: &Command) -> Option<Response> {
        match cmd.kind {
            CommandKind::Poll => Some(self.handle_poll(cmd)),
            CommandKind::Capture => self.handle_capture(cmd).await,
        }
    }

    fn handle_poll(&self, cmd: &Command) -> Response {
        let started_ns = self.clock.now_wall_ns();
        Response {
            id: cmd.id,
            client: self.client_id.clone(),
            status: ResponseStatus::Online,
            started_ns,
            finished_ns: self.clock.now_wall_ns(),
            file: String::new(),
            jitter_us: 0,
            session_dir: self.grouper.current_session_name(),
            photos_in_session: Some(self.grouper.photos_in_session()),
            error: String::new(),
        }
    }

    async fn handle_capture(&mut self, cmd: &Command) -> Option<Response> {
        if self.last_command_id == Some(cmd.id) {
            tracing::warn!("duplicate command id {}, ignoring", cmd.id);
            return None;
        }
        self.last_command_id = Some(cmd.id);

        let started_ns = self.clock.now_wall_ns();
        let previous_session = self.grouper.current_session_name();
        let session = self.grouper.resolve(self.clock.as_ref(), |p| p.exists());
        let session_dir = session.dir.clone();
        if self.grouper.current_session_name() != previous_session {
            self.attempts_in_session = 0;
        }

        let timestamp = Local::now().format("%H%M%S");
        let filename = format!("cam{}_{timestamp}_{:06}.jpg", self.cam_ordinal, cmd.id);

        let capture_result = self.camera.capture(&session_dir, &filename).await;
        let finished_ns = self.clock.now_wall_ns();
        let jitter = jitter_us(started_ns, cmd.t_issue_ns);
        self.attempts_in_session += 1;
        let attempt_index = self.attempts_in_session;
        let camera_label = format!("cam{}", self.cam_ordinal);
        let log_timestamp = chrono::Local::now().to_rfc3339();

        let response = match capture_result {
            Ok(_) => {
                self.grouper.record_capture(self.clock.now_mono_ms());
                if let Err(e) = self
                    .session_log
                    .record_photo(&session_dir, &camera_label, attempt_index, &filename, &log_timestamp)
                    .await
                {
                    tracing::warn!("failed to update session log for command {}: {e}", cmd.id);
                }
                Response {
                    id: cmd.id,
                    client: self.client_id.clone(),
                    status: ResponseStatus::Ok,
                    started_ns,
                    finished_ns,
                    file: filename,
                    jitter_us: jitter,
                    session_dir: Some(
                        self.grouper.current_session_name().unwrap_or_default(),
                    ),
                    photos_in_session: Some(self.grouper.photos_in_session()),
                    error: String::new(),
                }
            }
            Err(e) => {
                tracing::error!("capture failed for command {}: {e}", cmd.id);
                if let Err(log_err) = self
                    .session_log
                    .record_failure(&session_dir, &camera_label, attempt_index, &e.to_string(), &log_timestamp)
                    .await
                {
                    tracing::warn!("failed to update session log for command {}: {log_err}", cmd.id);
                }
                Response {
                    id: cmd.id,
                    client: self.client_id.clone(),
                    status: ResponseStatus::Error,
                    started_ns,
                    finished_ns,
                    file: String::new(),
                    jitter_us: jitter,
                    session_dir: None,
                    photos_in_session: None,
                    error: e.to_string(),
                }
            }
        };

        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::drivers::NullCamera;
    use helmet_protocol::MasterImu;

    fn command(id: u64) -> Command {
        Command {
            id,
            kind: CommandKind::Capture,
            t_issue_ns: 0,
            exposure_us: Some(1000),
            timeout_ms: 1500,
            notes: "test".into(),
            master_imu: Some(MasterImu::unavailable("no sensor")),
        }
    }

    fn test_handler() -> PeerHandler {
        let grouper = SessionGrouper::new(std::path::PathBuf::from("/tmp/helmet-peer-test"), 1, 1_800_000);
        PeerHandler::new(
            "cam1".into(),
            1,
            Arc::new(NullCamera),
            Arc::new(FakeClock::new("20260101")),
            grouper,
        )
    }

    #[tokio::test]
    async fn duplicate_command_id_is_ignored() {
        let mut handler = test_handler();
        let cmd = command(7);
        assert!(handler.handle(&cmd).await.is_some());
        assert!(handler.handle(&cmd).await.is_none());
    }

    #[tokio::test]
    async fn successful_capture_increments_photos_in_session() {
        let mut handler = test_handler();
        let resp = handler.handle(&command(1)).await.unwrap();
        assert_eq!(resp.status, ResponseStatus::Ok);
        assert_eq!(resp.photos_in_session, Some(1));
    }

    #[tokio::test]
    async fn poll_command_reports_current_session() {
        let mut handler = test_handler();
        handler.handle(&command(1)).await;

        let poll = Command {
            id: 2,
            kind: CommandKind::Poll,
            t_issue_ns: 0,
            exposure_us: None,
            timeout_ms: 1500,
            notes: "poll".into(),
            master_imu: None,
        };
        let resp = handler.handle(&poll).await.unwrap();
        assert!(matches!(resp.status, ResponseStatus::Online));
        assert_eq!(resp.photos_in_session, Some(1));
    }
}
