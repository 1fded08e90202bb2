//! Proctoring engine
//!
//! Orchestrates one exam deployment:
//! - registration (enrollment + persistence)
//! - start-of-exam verification, which opens the session
//! - live frame analysis: pose, lighting, phone streak, identity streak
//! - cooldown-gated evidence capture

use std::sync::Arc;

use face_analysis::{AnalysisResult, FaceGeometryProvider, PoseAnalyzer, PoseCheck, Violation};
use frame::VideoFrame;
use identity::{
    Enroller, EnrollmentRequest, IdentityConfig, IdentityError, IdentityKey, IdentityMatcher,
    UserDirectory,
};
use phone_detection::PhoneDetector;
use serde::Serialize;
use storage::{
    trust_score, EnrollmentRepository, EvidenceStore, ImageSink, JpegFileSink, UserSummary,
    ViolationEvent,
};
use tracing::{debug, info, warn};

use crate::{
    Clock, MonitorConfig, MonitorError, SessionTable, SessionTrackState, Settings, SystemClock,
};

/// Start-of-exam verification result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StartVerification {
    pub is_match: bool,
    pub score: f32,
    pub threshold: f32,
}

/// Everything the host needs to answer one live frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    /// `None` when re-verification was skipped
    pub identity_match: Option<bool>,
    pub identity_score: Option<f32>,
    pub identity_mismatch_streak: u32,
    pub identity_live_threshold: f32,
    pub brightness: f32,
    /// Raw per-frame detector decision
    pub phone_detected: bool,
    pub phone_visible_streak: u32,
    pub phone_detector_enabled: bool,
    pub evidence_captured: bool,
}

/// End-of-exam summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamSummary {
    pub username: String,
    pub violations: usize,
    pub trust_score: u32,
}

/// Builder for [`ProctorEngine`]
pub struct EngineBuilder {
    settings: Settings,
    provider: Arc<dyn FaceGeometryProvider>,
    phone: Option<PhoneDetector>,
    sink: Option<Box<dyn ImageSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    /// Use this phone detector instead of building one from settings
    pub fn phone_detector(mut self, detector: PhoneDetector) -> Self {
        self.phone = Some(detector);
        self
    }

    /// Use this evidence sink instead of JPEG files
    pub fn image_sink(mut self, sink: Box<dyn ImageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Load persisted state and assemble the engine
    pub fn build(self) -> ProctorEngine {
        let Settings {
            pose,
            identity,
            phone,
            monitor,
            storage,
            ..
        } = self.settings;

        let repository = EnrollmentRepository::new(storage.enrolled_users_file.clone());
        let users = UserDirectory::from_users(repository.load());
        let evidence = EvidenceStore::open(
            &storage,
            monitor.max_events_per_user,
            self.sink.unwrap_or_else(|| Box::new(JpegFileSink)),
        );
        let phone = self.phone.unwrap_or_else(|| PhoneDetector::from_config(&phone));

        info!(
            users = users.len(),
            phone_model = phone.model_enabled(),
            start_threshold = identity.start_threshold,
            live_threshold = identity.live_threshold,
            "Proctor engine ready"
        );

        ProctorEngine {
            matcher: IdentityMatcher::new(self.provider.clone(), pose.crop_padding),
            enroller: Enroller::new(self.provider.clone(), &pose),
            analyzer: PoseAnalyzer::new(pose, self.provider),
            phone,
            identity,
            monitor,
            users,
            repository,
            evidence,
            sessions: SessionTable::new(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        }
    }
}

/// Frame-analysis and violation-tracking engine
pub struct ProctorEngine {
    analyzer: PoseAnalyzer,
    matcher: IdentityMatcher,
    enroller: Enroller,
    phone: PhoneDetector,
    identity: IdentityConfig,
    monitor: MonitorConfig,
    users: UserDirectory,
    repository: EnrollmentRepository,
    evidence: EvidenceStore,
    sessions: SessionTable,
    clock: Arc<dyn Clock>,
}

impl ProctorEngine {
    pub fn builder(settings: Settings, provider: Arc<dyn FaceGeometryProvider>) -> EngineBuilder {
        EngineBuilder {
            settings,
            provider,
            phone: None,
            sink: None,
            clock: None,
        }
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn identity_config(&self) -> &IdentityConfig {
        &self.identity
    }

    pub fn monitor_config(&self) -> &MonitorConfig {
        &self.monitor
    }

    pub fn phone_detector_enabled(&self) -> bool {
        self.phone.model_enabled()
    }

    /// Enroll (or re-enroll) a candidate and persist the directory.
    ///
    /// Any open session is dropped first. If the directory cannot be saved the
    /// previous enrollment is restored and the storage error is returned.
    pub fn register(
        &self,
        request: &EnrollmentRequest,
        frames: &[VideoFrame],
    ) -> Result<IdentityKey, MonitorError> {
        let user = self.enroller.enroll(request, frames)?;
        let key = user.key.clone();

        self.sessions.discard(&key)?;
        let previous = self.users.insert(user);
        if let Err(e) = self.repository.save(&self.users) {
            self.users.restore(&key, previous);
            warn!(key = %key, "Enrollment not persisted, previous record kept: {}", e);
            return Err(e.into());
        }

        info!(key = %key, samples = frames.len(), "Candidate registered");
        Ok(key)
    }

    /// Registration capture guidance
    pub fn pose_check(&self, frame: &VideoFrame) -> Result<PoseCheck, MonitorError> {
        Ok(self.analyzer.registration_check(frame)?)
    }

    /// Strict one-time identity gate; opens the session on match, discards it otherwise
    pub fn verify_start(
        &self,
        username: &str,
        frame: &VideoFrame,
    ) -> Result<StartVerification, MonitorError> {
        let key = normalize_key(username)?;
        let outcome = self
            .matcher
            .verify(&self.users, &key, frame, self.identity.start_threshold)?;

        if outcome.is_match {
            self.sessions.start(&key)?;
            info!(key = %key, score = outcome.best_score, "Start-of-exam verification passed");
        } else {
            self.sessions.discard(&key)?;
            warn!(key = %key, score = outcome.best_score, "Start-of-exam verification failed");
        }

        Ok(StartVerification {
            is_match: outcome.is_match,
            score: outcome.best_score,
            threshold: outcome.threshold,
        })
    }

    /// Analyze one live frame for a verified candidate
    pub fn analyze_frame(
        &self,
        username: &str,
        frame: &VideoFrame,
    ) -> Result<FrameReport, MonitorError> {
        let key = normalize_key(username)?;
        let row = self
            .sessions
            .row(&key)?
            .ok_or_else(|| MonitorError::NotVerified(key.to_string()))?;
        let user = self
            .users
            .get(&key)
            .ok_or_else(|| IdentityError::NotRegistered(key.to_string()))?;

        // frames for the same candidate are processed one at a time
        let mut state = row.lock().map_err(|_| MonitorError::StatePoisoned)?;

        let mut analysis = self.analyzer.analyze(frame)?;

        let brightness = frame.mean_brightness();
        if brightness < self.monitor.low_light_threshold {
            analysis.push(Violation::LowLighting);
        }

        let phone_detected = self.phone.detect(frame);
        if state.record_phone(phone_detected, self.monitor.phone_streak_threshold) {
            info!(key = %key, streak = state.phone_streak, "Phone visible");
            analysis.push(Violation::PhoneVisible);
        }

        let mut identity_match = None;
        let mut identity_score = None;
        if analysis.face_count == 1 {
            if analysis.has(Violation::LookingSideways) {
                state.reset_mismatch();
            } else if analysis.has(Violation::LowLighting) {
                debug!(key = %key, brightness, "Low light, identity check skipped");
            } else {
                let outcome =
                    self.matcher
                        .verify(&self.users, &key, frame, self.identity.live_threshold)?;
                state.record_identity(outcome.is_match);
                identity_match = Some(outcome.is_match);
                identity_score = Some(outcome.best_score);
            }

            if state.mismatch_breached(self.monitor.mismatch_streak_threshold) {
                info!(key = %key, streak = state.mismatch_streak, "Identity mismatch");
                analysis.push(Violation::IdentityMismatch);
            }
        }

        let evidence_captured = analysis.has_violations()
            && self.capture_evidence(&key, &user.username, &analysis.violations, frame, &mut state);

        debug!(
            key = %key,
            faces = analysis.face_count,
            violations = analysis.violations.len(),
            evidence_captured,
            "Frame analyzed"
        );

        Ok(FrameReport {
            identity_match,
            identity_score,
            identity_mismatch_streak: state.mismatch_streak,
            identity_live_threshold: self.identity.live_threshold,
            brightness,
            phone_detected,
            phone_visible_streak: state.phone_streak,
            phone_detector_enabled: self.phone.model_enabled(),
            evidence_captured,
            analysis,
        })
    }

    /// Current tracking state of a session, if one is open
    pub fn session_state(&self, username: &str) -> Result<Option<SessionTrackState>, MonitorError> {
        self.sessions.snapshot(&normalize_key(username)?)
    }

    /// Close a session (logout)
    pub fn end_session(&self, username: &str) -> Result<bool, MonitorError> {
        self.sessions.discard(&normalize_key(username)?)
    }

    /// Admin dashboard rows
    pub fn user_summaries(&self) -> Result<Vec<UserSummary>, MonitorError> {
        Ok(self.evidence.user_summaries(&self.users)?)
    }

    /// Admin detail view, newest first
    pub fn user_events(&self, username: &str) -> Result<Vec<ViolationEvent>, MonitorError> {
        let key = normalize_key(username)?;
        if !self.users.contains(&key) {
            return Err(IdentityError::NotRegistered(key.to_string()).into());
        }
        Ok(self.evidence.events_newest_first(&key)?)
    }

    /// Trust score for the violation count reported at the end of the exam
    pub fn exam_summary(
        &self,
        username: &str,
        violations: usize,
    ) -> Result<ExamSummary, MonitorError> {
        let key = normalize_key(username)?;
        let user = self
            .users
            .get(&key)
            .ok_or_else(|| IdentityError::NotRegistered(key.to_string()))?;
        Ok(ExamSummary {
            username: user.username.clone(),
            violations,
            trust_score: trust_score(violations),
        })
    }

    /// Write one evidence event if the cooldown allows; storage failures are logged only
    fn capture_evidence(
        &self,
        key: &IdentityKey,
        username: &str,
        violations: &[Violation],
        frame: &VideoFrame,
        state: &mut SessionTrackState,
    ) -> bool {
        let now = self.clock.now();
        if !state.capture_due(now, self.monitor.evidence_cooldown()) {
            debug!(key = %key, "Evidence capture in cooldown");
            return false;
        }

        match self.evidence.append(key, username, violations, frame) {
            Ok(event) => {
                state.mark_captured(now);
                info!(key = %key, image = %event.image_path, "Evidence captured");
                true
            }
            Err(e) => {
                warn!(key = %key, "Evidence capture failed: {}", e);
                false
            }
        }
    }
}

fn normalize_key(username: &str) -> Result<IdentityKey, MonitorError> {
    IdentityKey::normalize(username)
        .ok_or(MonitorError::Identity(IdentityError::InvalidProfile("Username is required")))
}
