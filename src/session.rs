//! Editing session: wires calibration, the sync engine and history.
//!
//! One [`EditorSession`] drives one editor. Every change goes through
//! [`EditorSession::dispatch`], which runs the transition, lets the history
//! watcher see the result and schedules draft persistence. Frame detection
//! is applied only while the context it was started for is still current.

use web_time::Instant;

use crate::cache::DurableCache;
use crate::calibration::{
    CanvasSize, CenterOverride, ChartGeometry, FrameCalibrationService, ImageFetcher,
    calibration_to_fit,
};
use crate::config::EditorConfig;
use crate::error::{CalibrationError, SyncError};
use crate::model::{CalibrationRegion, CalibrationSource, ContextKey, DocumentModel};
use crate::state::{Action, EditorState};
use crate::store::DocumentStore;
use crate::sync::{ConflictChoice, ContextOutcome, ContextToken, SyncEngine, SyncStatus};
use crate::undo::HistoryManager;

/// Frame image and layout of a framed context.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    /// Image identity (URL or path)
    pub image_id: String,
    /// Chart geometry in chart-local coordinates
    pub chart: ChartGeometry,
    /// Canvas the frame image is drawn on
    pub canvas: CanvasSize,
}

/// A frame detection started for a context entry.
#[derive(Debug, Clone)]
pub struct DetectionRequest<C, F> {
    token: ContextToken,
    image_id: String,
    service: FrameCalibrationService<C, F>,
}

impl<C: DurableCache, F: ImageFetcher> DetectionRequest<C, F> {
    pub fn token(&self) -> &ContextToken {
        &self.token
    }

    /// Run the (cached) detection.
    pub async fn run(self) -> DetectionResult {
        let result = self.service.detect(&self.image_id).await;
        DetectionResult {
            token: self.token,
            result,
        }
    }
}

/// Outcome of [`DetectionRequest::run`].
#[derive(Debug)]
pub struct DetectionResult {
    pub token: ContextToken,
    pub result: Result<CalibrationRegion, CalibrationError>,
}

/// Editing session over a cache `C`, a store `S` and an image fetcher `F`.
#[derive(Debug)]
pub struct EditorSession<C, S, F> {
    engine: SyncEngine<C, S>,
    history: HistoryManager,
    calibration: FrameCalibrationService<C, F>,
    frame: Option<FrameContext>,
}

impl<C, S, F> EditorSession<C, S, F>
where
    C: DurableCache + Clone,
    S: DocumentStore + Clone,
    F: ImageFetcher + Clone,
{
    /// Create a session sharing `cache` between drafts and calibrations.
    pub fn new(cache: C, store: S, fetcher: F, config: &EditorConfig) -> Self {
        Self {
            engine: SyncEngine::with_debounce(cache.clone(), store, config.sync.draft_debounce()),
            history: HistoryManager::with_config(config.sync.history_config()),
            calibration: FrameCalibrationService::with_params(cache, fetcher, config.detection),
            frame: None,
        }
    }

    pub fn engine(&self) -> &SyncEngine<C, S> {
        &self.engine
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn calibration(&self) -> &FrameCalibrationService<C, F> {
        &self.calibration
    }

    pub fn frame(&self) -> Option<&FrameContext> {
        self.frame.as_ref()
    }

    pub fn state(&self) -> Option<&EditorState> {
        self.engine.state()
    }

    pub fn document(&self) -> Option<&DocumentModel> {
        self.engine.document()
    }

    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.engine.set_credential(credential);
    }

    /// Open a context. History starts empty with the loaded baseline.
    pub async fn open(&mut self, key: ContextKey, frame: Option<FrameContext>) -> ContextOutcome {
        self.history.reset();
        self.frame = frame;
        let outcome = self.engine.open_context(key).await;
        if outcome != ContextOutcome::Stale {
            self.rebase_history();
        }
        outcome
    }

    /// Answer the draft restore/discard prompt.
    ///
    /// The resulting document becomes the new history baseline. Detection
    /// is held back while the prompt is open; call
    /// [`detect_frame`](Self::detect_frame) afterwards to run it.
    pub async fn resolve_conflict(
        &mut self,
        choice: ConflictChoice,
        now: Instant,
    ) -> Result<(), SyncError> {
        self.engine.resolve_conflict(choice, now).await?;
        self.history.reset();
        self.rebase_history();
        Ok(())
    }

    fn rebase_history(&mut self) {
        if let Some(state) = self.engine.state() {
            self.history.rebase(&state.snapshot());
        }
    }

    /// Apply a user transition.
    pub fn dispatch(&mut self, action: Action, now: Instant) -> bool {
        let from_history = action.is_history();
        if !self.engine.dispatch(action, now) {
            return false;
        }
        if let Some(state) = self.engine.state() {
            let snapshot = state.snapshot();
            if from_history {
                self.history.rebase(&snapshot);
            } else {
                self.history.observe(&snapshot, now);
            }
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Step back one history entry. Returns false if there was none.
    pub fn undo(&mut self, now: Instant) -> bool {
        let Some(current) = self.engine.state().map(EditorState::snapshot) else {
            return false;
        };
        match self.history.undo(&current) {
            Some(previous) => self.dispatch(Action::ApplyHistory(previous), now),
            None => false,
        }
    }

    /// Step forward one history entry. Returns false if there was none.
    pub fn redo(&mut self, now: Instant) -> bool {
        let Some(current) = self.engine.state().map(EditorState::snapshot) else {
            return false;
        };
        match self.history.redo(&current) {
            Some(next) => self.dispatch(Action::ApplyHistory(next), now),
            None => false,
        }
    }

    /// Drive the debounce timers: record due history steps and write due
    /// drafts. Returns the number of drafts written.
    pub async fn tick(&mut self, now: Instant) -> usize {
        self.history.poll(now);
        self.engine.flush_due(now).await
    }

    /// Write pending drafts immediately.
    pub async fn flush(&mut self) -> usize {
        self.history.flush();
        self.engine.flush_all().await
    }

    pub async fn save(&mut self, now: Instant) -> Result<u64, SyncError> {
        self.engine.save(now).await
    }

    // ------------------------------------------------------------------
    // Calibration
    // ------------------------------------------------------------------

    /// Prepare automatic detection, if the current context needs one.
    ///
    /// Nothing is requested without a frame, while a draft decision is
    /// pending, or once a region exists or was cleared by the user.
    pub fn begin_detection(&self) -> Option<DetectionRequest<C, F>> {
        let frame = self.frame.as_ref()?;
        let state = self.engine.state()?;
        if !self.engine.is_applied()
            || self.engine.conflict().is_some()
            || !state.calibration.needs_detection()
        {
            return None;
        }
        Some(DetectionRequest {
            token: self.engine.token()?,
            image_id: frame.image_id.clone(),
            service: self.calibration.clone(),
        })
    }

    /// Apply a finished automatic detection.
    ///
    /// Returns the applied region, `Ok(None)` if the result was stale or no
    /// longer wanted.
    pub fn finish_detection(
        &mut self,
        detection: DetectionResult,
        now: Instant,
    ) -> Result<Option<CalibrationRegion>, CalibrationError> {
        let region = detection.result?;
        let wanted = self
            .engine
            .state()
            .is_some_and(|s| s.calibration.needs_detection());
        if !wanted {
            log::debug!("Detection no longer wanted for {}", detection.token.key());
            return Ok(None);
        }
        Ok(self
            .apply_region(&detection.token, region, CalibrationSource::Auto, now)
            .then_some(region))
    }

    /// Detect the frame opening for the current context, if needed.
    pub async fn detect_frame(
        &mut self,
        now: Instant,
    ) -> Result<Option<CalibrationRegion>, CalibrationError> {
        let Some(request) = self.begin_detection() else {
            return Ok(None);
        };
        let detection = request.run().await;
        self.finish_detection(detection, now)
    }

    /// Detect with an explicit center and thresholds (interactive snap).
    /// The region is pinned as a user edit.
    pub async fn snap_frame(
        &mut self,
        center: Option<CenterOverride>,
        white_cutoff: f32,
        offwhite_boost: f32,
        now: Instant,
    ) -> Result<Option<CalibrationRegion>, CalibrationError> {
        let (Some(frame), Some(token)) = (self.frame.clone(), self.engine.token()) else {
            return Ok(None);
        };
        let service = self.calibration.clone();
        let region = service
            .detect_with_override_center(&frame.image_id, center, white_cutoff, offwhite_boost)
            .await?;
        Ok(self
            .apply_region(&token, region, CalibrationSource::User, now)
            .then_some(region))
    }

    /// Drop the cached detection and detect again. The region is pinned as
    /// a user edit.
    pub async fn resnap_frame(
        &mut self,
        now: Instant,
    ) -> Result<Option<CalibrationRegion>, CalibrationError> {
        let (Some(frame), Some(token)) = (self.frame.clone(), self.engine.token()) else {
            return Ok(None);
        };
        let service = self.calibration.clone();
        service.invalidate(&frame.image_id).await;
        let region = service.detect(&frame.image_id).await?;
        Ok(self
            .apply_region(&token, region, CalibrationSource::User, now)
            .then_some(region))
    }

    /// Remove the region; automatic detection will not bring it back.
    pub fn clear_calibration(&mut self, now: Instant) -> bool {
        self.engine.dispatch(Action::ClearCalibration, now)
    }

    /// Store `region` and, unless the user positioned the chart by hand,
    /// fit the chart to it.
    fn apply_region(
        &mut self,
        token: &ContextToken,
        region: CalibrationRegion,
        source: CalibrationSource,
        now: Instant,
    ) -> bool {
        if !self.engine.is_current(token) {
            log::debug!("Discarding stale detection for {}", token.key());
            return false;
        }
        self.engine
            .dispatch(Action::SetCalibration { region, source }, now);

        let Some(state) = self.engine.state() else {
            return true;
        };
        if state.user_adjusted {
            log::debug!("Fit adjusted by hand, skipping auto-fit");
            return true;
        }
        let Some(frame) = self.frame.as_ref() else {
            return true;
        };
        match calibration_to_fit(&frame.chart, &region, frame.canvas, state.doc.fit.rotation_deg) {
            Some(fit) => {
                log::info!(
                    "📐 Auto-fit: offset ({:.1}, {:.1}), scale {:.3}",
                    fit.dx,
                    fit.dy,
                    fit.scale
                );
                self.engine.dispatch(Action::AutoFitApplied(fit), now);
                // Derived, not authored: no undo step.
                self.rebase_history();
            }
            None => log::warn!("Calibration region cannot be mapped to a fit"),
        }
        true
    }
}
