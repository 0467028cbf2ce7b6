//! Round session state machine
//!
//! Owns the bubble-phase `GameState` and everything the host page needs
//! around it: the review hand-off, manual code entry after a game over,
//! hints, generated distractors and the one-time progress write.
//!
//! ```text
//! Playing ──lives out──▶ GameOver ──▶ Manual ──submit──▶ Reviewing
//!    │                      │                                │
//!    └─all tokens matched─▶ Reviewing ──pass──▶ LevelComplete │
//!                            │  fail/error: back to origin ◀──┘
//! ```
//!
//! The session never performs I/O itself. It exposes the pending request
//! and the host resolves it, so a single animation loop can drive it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{FIELD_HEIGHT, FIELD_WIDTH};
use crate::error::{ServiceError, SessionError};
use crate::progress::ProgressStore;
use crate::services::{
    CodeReviewer, DistractorProvider, DistractorRequest, HintProvider, HintRequest, HintResponse,
    ReviewRequest, ReviewResponse, Verdict,
};
use crate::settings::Tuning;
use crate::sim::{DistractorSource, GameState, TerminalEvent, TickInput, TokenCache, tick};

fn default_xp() -> u32 {
    50
}

/// A playground level as served by the course backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Problem statement shown to the player (and sent with hint requests)
    #[serde(default)]
    pub problem: String,
    pub language: String,
    /// Reference solution ("expected output") to tokenize
    pub solution: String,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default = "default_xp")]
    pub xp: u32,
}

impl LevelSpec {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Where the round currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    /// Bubble phase running (or finished and awaiting a resubmit)
    Playing,
    /// Waiting for the review verdict
    Reviewing,
    /// Review passed
    LevelComplete,
    /// Lives exhausted
    GameOver,
    /// Free-text code entry, bypassing the bubbles
    Manual,
}

/// Which screen a review was submitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewOrigin {
    Bubbles,
    Manual,
}

impl ReviewOrigin {
    fn phase(self) -> SessionPhase {
        match self {
            ReviewOrigin::Bubbles => SessionPhase::Playing,
            ReviewOrigin::Manual => SessionPhase::Manual,
        }
    }
}

/// Events reported to the host page
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    GameOver,
    /// The host should send this request to the review endpoint
    ReviewRequested(ReviewRequest),
    LevelComplete {
        xp: u32,
        /// False when the level was already recorded for this user
        first_time: bool,
    },
    ReviewFailed {
        feedback: String,
    },
    ReviewError {
        message: String,
    },
}

/// One play session of one level
pub struct Session {
    pub user: String,
    pub level: LevelSpec,
    pub state: GameState,
    phase: SessionPhase,
    tokens: TokenCache,
    origin: ReviewOrigin,
    /// In-flight review and the ticket it was issued under
    pending: Option<(u64, ReviewRequest)>,
    review_seq: u64,
    feedback: Option<String>,
    error: Option<String>,
    hint: Option<String>,
    solution_revealed: bool,
    completion_recorded: bool,
}

impl Session {
    /// Start a round with the static distractor list
    pub fn new(user: impl Into<String>, level: LevelSpec, tuning: Tuning, seed: u64) -> Self {
        let mut tokens = TokenCache::new();
        let token_list = tokens.get(&level.solution).to_vec();
        let state = GameState::new(
            seed,
            token_list,
            &level.starter_code,
            tuning,
            DistractorSource::Static,
        );
        log::info!(
            "Session started: level {} ({} tokens)",
            level.id,
            state.tokens.len()
        );
        Self {
            user: user.into(),
            level,
            state,
            phase: SessionPhase::Playing,
            tokens,
            origin: ReviewOrigin::Bubbles,
            pending: None,
            review_seq: 0,
            feedback: None,
            error: None,
            hint: None,
            solution_revealed: false,
            completion_recorded: false,
        }
    }

    /// Use a specific distractor source
    pub fn with_distractors(mut self, source: DistractorSource) -> Self {
        self.state.distractors = source;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn code(&self) -> &str {
        self.state.buffer.as_str()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn pending_review(&self) -> Option<&ReviewRequest> {
        self.pending.as_ref().map(|(_, request)| request)
    }

    /// Ticket of the in-flight review; hosts pass it back to `resolve_review`
    pub fn review_ticket(&self) -> Option<u64> {
        self.pending.as_ref().map(|(ticket, _)| *ticket)
    }

    pub fn solution_revealed(&self) -> bool {
        self.solution_revealed
    }

    /// Advance one frame
    pub fn tick(&mut self, input: &TickInput, dt: f32) -> Option<SessionEvent> {
        match self.phase {
            SessionPhase::Playing => match tick(&mut self.state, input, dt)? {
                TerminalEvent::GameOver => {
                    self.set_phase(SessionPhase::GameOver);
                    Some(SessionEvent::GameOver)
                }
                TerminalEvent::BubblePhaseComplete => {
                    let request = self.begin_review(ReviewOrigin::Bubbles);
                    Some(SessionEvent::ReviewRequested(request))
                }
            },
            // Only particles move once the bubble phase has ended
            SessionPhase::LevelComplete | SessionPhase::GameOver => {
                tick(&mut self.state, &TickInput::default(), dt);
                None
            }
            SessionPhase::Reviewing | SessionPhase::Manual => None,
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            log::info!("Session phase: {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn begin_review(&mut self, origin: ReviewOrigin) -> ReviewRequest {
        let request = ReviewRequest {
            code: self.state.buffer.as_str().to_string(),
            solution: self.level.solution.clone(),
            language: self.level.language.clone(),
        };
        self.origin = origin;
        self.review_seq += 1;
        self.pending = Some((self.review_seq, request.clone()));
        self.feedback = None;
        self.error = None;
        self.set_phase(SessionPhase::Reviewing);
        request
    }

    /// Whether the bubble phase has finished and its code may be resubmitted
    fn bubbles_done(&self) -> bool {
        self.phase == SessionPhase::Playing
            && self.state.finished == Some(TerminalEvent::BubblePhaseComplete)
    }

    /// Apply the review endpoint's answer to the review issued as `ticket`
    pub fn resolve_review(
        &mut self,
        ticket: u64,
        result: Result<ReviewResponse, ServiceError>,
        progress: &mut dyn ProgressStore,
        timestamp: f64,
    ) -> Result<SessionEvent, SessionError> {
        if self.phase != SessionPhase::Reviewing {
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "resolve a review",
            });
        }
        match self.review_ticket() {
            Some(current) if current == ticket => self.pending = None,
            Some(_) => return Err(SessionError::StaleReview { ticket }),
            None => return Err(SessionError::NoPendingReview),
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Review failed: {}", e);
                let message = e.to_string();
                self.error = Some(message.clone());
                self.set_phase(self.origin.phase());
                return Ok(SessionEvent::ReviewError { message });
            }
        };

        self.feedback = Some(response.feedback.clone());
        match response.verdict(&self.state.tuning) {
            Verdict::Pass => {
                self.set_phase(SessionPhase::LevelComplete);
                self.state.finished = Some(TerminalEvent::BubblePhaseComplete);
                self.state.burst(
                    Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0),
                    2,
                    96,
                    280.0,
                );
                let first_time = self.record_completion(progress, timestamp);
                Ok(SessionEvent::LevelComplete {
                    xp: self.level.xp,
                    first_time,
                })
            }
            Verdict::Fail => {
                self.set_phase(self.origin.phase());
                Ok(SessionEvent::ReviewFailed {
                    feedback: response.feedback,
                })
            }
        }
    }

    fn record_completion(&mut self, progress: &mut dyn ProgressStore, timestamp: f64) -> bool {
        if self.completion_recorded {
            return false;
        }
        match progress.mark_level_complete(&self.user, &self.level.id, self.level.xp, timestamp) {
            Ok(first_time) => {
                self.completion_recorded = true;
                first_time
            }
            Err(e) => {
                log::warn!("Could not record completion of {}: {}", self.level.id, e);
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Send the pending request to `reviewer` and apply the answer
    pub fn review_with(
        &mut self,
        reviewer: &dyn CodeReviewer,
        progress: &mut dyn ProgressStore,
        timestamp: f64,
    ) -> Result<SessionEvent, SessionError> {
        let (ticket, request) = self.pending.clone().ok_or(SessionError::NoPendingReview)?;
        let result = reviewer.review(&request);
        self.resolve_review(ticket, result, progress, timestamp)
    }

    /// Replace the code before resubmitting
    pub fn edit_code(&mut self, code: impl Into<String>) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Manual && !self.bubbles_done() {
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "edit code",
            });
        }
        self.state.buffer.set(code);
        Ok(())
    }

    /// Resubmit the current code after a failed review
    pub fn retry_review(&mut self) -> Result<ReviewRequest, SessionError> {
        let origin = match self.phase {
            SessionPhase::Manual => ReviewOrigin::Manual,
            _ if self.bubbles_done() => ReviewOrigin::Bubbles,
            phase => {
                return Err(SessionError::InvalidTransition {
                    phase,
                    action: "resubmit for review",
                });
            }
        };
        Ok(self.begin_review(origin))
    }

    /// Leave the game-over screen for the free-text editor
    pub fn switch_to_manual(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::GameOver {
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "switch to manual entry",
            });
        }
        self.state.bubbles.clear();
        self.state.bullets.clear();
        self.set_phase(SessionPhase::Manual);
        Ok(())
    }

    /// Submit hand-written code from the manual editor
    pub fn submit_manual(&mut self, code: impl Into<String>) -> Result<ReviewRequest, SessionError> {
        if self.phase != SessionPhase::Manual {
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "submit manual code",
            });
        }
        self.state.buffer.set(code);
        Ok(self.begin_review(ReviewOrigin::Manual))
    }

    /// Show the reference solution after a game over
    pub fn reveal_solution(&mut self) -> Result<&str, SessionError> {
        match self.phase {
            SessionPhase::GameOver | SessionPhase::Manual => {
                self.solution_revealed = true;
                Ok(self.level.solution.as_str())
            }
            phase => Err(SessionError::InvalidTransition {
                phase,
                action: "reveal the solution",
            }),
        }
    }

    /// Start the round over: full lives, starter code, no entities
    pub fn restart(&mut self) {
        let tokens = self.tokens.get(&self.level.solution).to_vec();
        self.state.tokens = tokens;
        self.state.restart(&self.level.starter_code);
        self.pending = None;
        self.feedback = None;
        self.error = None;
        self.hint = None;
        self.origin = ReviewOrigin::Bubbles;
        self.set_phase(SessionPhase::Playing);
    }

    /// Request for the hint endpoint
    pub fn hint_request(&self) -> HintRequest {
        HintRequest {
            problem: self.level.problem.clone(),
            code: self.state.buffer.as_str().to_string(),
        }
    }

    pub fn apply_hint(&mut self, result: Result<HintResponse, ServiceError>) {
        match result {
            Ok(response) => self.hint = Some(response.hint),
            Err(e) => {
                log::warn!("Hint failed: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    /// Ask `provider` for a hint on the current code
    pub fn hint_with(&mut self, provider: &dyn HintProvider) {
        let result = provider.hint(&self.hint_request());
        self.apply_hint(result);
    }

    /// Request for the distractor endpoint
    pub fn distractor_request(&self) -> DistractorRequest {
        DistractorRequest {
            language: self.level.language.clone(),
            correct_snippets: self.state.tokens.clone(),
            count: self.state.tuning.distractor_count,
        }
    }

    /// Fetch distractors from `provider` and switch to them
    pub fn distractors_with(&mut self, provider: &dyn DistractorProvider) {
        let result = provider.distractors(&self.distractor_request());
        self.apply_distractors(result);
    }

    /// Switch to generated distractors; errors keep the fallback list
    pub fn apply_distractors(&mut self, result: Result<Vec<String>, ServiceError>) {
        match result {
            Ok(list) => {
                let source = DistractorSource::from_supplied(list);
                if let DistractorSource::Supplied(list) = &source {
                    log::info!("Using {} generated distractors", list.len());
                }
                self.state.distractors = source;
            }
            Err(e) => {
                log::warn!("Distractor generation failed, using fallback list: {}", e);
                self.state.distractors = DistractorSource::Static;
            }
        }
    }
}
