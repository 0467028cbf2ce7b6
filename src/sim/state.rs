//! Game state and core simulation types
//!
//! Everything the bubble phase mutates lives here. The state is owned by a
//! single session and only ever touched from `tick` or input handlers.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;

use super::buffer::CodeBuffer;
use super::spawn::DistractorSource;
use crate::consts::*;
use crate::settings::Tuning;
use crate::{lane_x, player_y};

/// Bubble lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BubbleState {
    /// Falling, can be hit
    Active,
    /// Shot while carrying the expected token
    HitCorrect,
    /// Shot while carrying a distractor
    HitWrong,
}

/// A falling token bubble
#[derive(Debug, Clone, Serialize)]
pub struct Bubble {
    pub id: u32,
    pub text: String,
    pub lane: usize,
    pub y: f32,
    pub is_target: bool,
    pub state: BubbleState,
    /// Seconds left before a hit bubble is removed
    pub linger: f32,
}

impl Bubble {
    pub fn new(id: u32, text: String, lane: usize, is_target: bool) -> Self {
        Self {
            id,
            text,
            lane,
            y: -BUBBLE_RADIUS,
            is_target,
            state: BubbleState::Active,
            linger: 0.0,
        }
    }

    /// Centre of the bubble in field coordinates
    pub fn pos(&self) -> Vec2 {
        Vec2::new(lane_x(self.lane), self.y)
    }

    pub fn is_active(&self) -> bool {
        self.state == BubbleState::Active
    }

    /// Mark the bubble as hit and start its pop animation
    pub fn pop(&mut self, correct: bool, linger: f32) {
        self.state = if correct {
            BubbleState::HitCorrect
        } else {
            BubbleState::HitWrong
        };
        self.linger = linger;
    }
}

/// A player bullet travelling upward
#[derive(Debug, Clone, Serialize)]
pub struct Bullet {
    pub id: u32,
    pub pos: Vec2,
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// 0 = spark from a correct hit, 1 = wrong hit, 2 = celebration confetti
    pub color: u32,
    pub life: f32, // 0-1, decreases over time
    pub size: f32,
}

/// Maximum particles
pub const MAX_PARTICLES: usize = 256;

/// Terminal events reported upward by `tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminalEvent {
    /// Lives exhausted
    GameOver,
    /// Every token matched and no target left in flight
    BubblePhaseComplete,
}

/// Bubble phase state (deterministic for a given seed and input sequence)
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    #[serde(skip)]
    pub rng: Pcg32,
    #[serde(skip)]
    pub tuning: Tuning,
    #[serde(skip)]
    pub distractors: DistractorSource,
    /// Tokens of the reference solution, in order
    pub tokens: Vec<String>,
    /// Number of tokens matched so far
    pub matched: usize,
    /// Player lives
    pub lives: u8,
    /// Code assembled so far
    pub buffer: CodeBuffer,
    /// Player avatar horizontal position
    pub player_x: f32,
    /// Active bubbles (sorted by id)
    pub bubbles: Vec<Bubble>,
    /// Active bullets (sorted by id)
    pub bullets: Vec<Bullet>,
    /// Visual particles (not gameplay-affecting)
    #[serde(skip)]
    pub particles: Vec<Particle>,
    /// Simulated time in milliseconds
    pub time_ms: f64,
    /// Simulated time of the last spawn wave
    pub last_spawn_ms: Option<f64>,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Terminal event already reported this round
    pub finished: Option<TerminalEvent>,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// Create a fresh round for the given tokens
    pub fn new(
        seed: u64,
        tokens: Vec<String>,
        starter_code: &str,
        tuning: Tuning,
        distractors: DistractorSource,
    ) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            lives: tuning.start_lives,
            tuning,
            distractors,
            tokens,
            matched: 0,
            buffer: CodeBuffer::new(starter_code),
            player_x: FIELD_WIDTH / 2.0,
            bubbles: Vec::new(),
            bullets: Vec::new(),
            particles: Vec::new(),
            time_ms: 0.0,
            last_spawn_ms: None,
            time_ticks: 0,
            finished: None,
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Reset for another attempt at the same tokens.
    ///
    /// The RNG keeps advancing so a retry does not replay the same lanes.
    pub fn restart(&mut self, starter_code: &str) {
        self.lives = self.tuning.start_lives;
        self.matched = 0;
        self.buffer = CodeBuffer::new(starter_code);
        self.player_x = FIELD_WIDTH / 2.0;
        self.bubbles.clear();
        self.bullets.clear();
        self.particles.clear();
        self.last_spawn_ms = None;
        self.finished = None;
    }

    /// Number of target bubbles still falling
    pub fn active_targets(&self) -> usize {
        self.bubbles
            .iter()
            .filter(|b| b.is_target && b.is_active())
            .count()
    }

    /// Next token the player has to hit
    pub fn next_token(&self) -> Option<&str> {
        self.tokens.get(self.matched).map(String::as_str)
    }

    /// Whether every token has been matched
    pub fn all_matched(&self) -> bool {
        self.matched >= self.tokens.len()
    }

    /// Lose one life (never below zero)
    pub fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
    }

    /// Fire a bullet from the player's current position
    pub fn fire(&mut self) {
        let id = self.next_entity_id();
        self.bullets.push(Bullet {
            id,
            pos: Vec2::new(self.player_x, player_y()),
        });
    }

    /// Spray particles at a point
    pub fn burst(&mut self, at: Vec2, color: u32, count: usize, speed: f32) {
        use rand::Rng;
        for _ in 0..count {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            let angle: f32 = self.rng.random_range(0.0..std::f32::consts::TAU);
            let mag: f32 = self.rng.random_range(0.3..1.0) * speed;
            self.particles.push(Particle {
                pos: at,
                vel: Vec2::new(angle.cos(), angle.sin()) * mag,
                color,
                life: 1.0,
                size: self.rng.random_range(2.0..5.0),
            });
        }
    }

    /// Ensure entities are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.bubbles.sort_by_key(|b| b.id);
        self.bullets.sort_by_key(|b| b.id);
    }

    /// JSON snapshot for the DOM layer
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tokens: &[&str]) -> GameState {
        GameState::new(
            7,
            tokens.iter().map(|t| t.to_string()).collect(),
            "",
            Tuning::default(),
            DistractorSource::Static,
        )
    }

    #[test]
    fn test_new_state() {
        let s = state(&["a", "b"]);
        assert_eq!(s.lives, START_LIVES);
        assert_eq!(s.next_token(), Some("a"));
        assert!(!s.all_matched());
        assert_eq!(s.active_targets(), 0);
    }

    #[test]
    fn test_lose_life_saturates() {
        let mut s = state(&["a"]);
        for _ in 0..5 {
            s.lose_life();
        }
        assert_eq!(s.lives, 0);
    }

    #[test]
    fn test_fire_spawns_bullet_at_player() {
        let mut s = state(&["a"]);
        s.player_x = 100.0;
        s.fire();
        assert_eq!(s.bullets.len(), 1);
        assert_eq!(s.bullets[0].pos, Vec2::new(100.0, player_y()));
    }

    #[test]
    fn test_snapshot_has_no_rng() {
        let s = state(&["a"]);
        let json = s.snapshot_json().unwrap();
        assert!(json.contains("\"lives\":3"));
        assert!(!json.contains("rng"));
    }

    #[test]
    fn test_snapshot_includes_finished_round() {
        let mut s = state(&["a"]);
        s.finished = Some(TerminalEvent::BubblePhaseComplete);
        let json = s.snapshot_json().unwrap();
        assert!(json.contains("\"finished\":\"BubblePhaseComplete\""));
    }

    #[test]
    fn test_normalize_order_sorts_by_id() {
        let mut s = state(&["a"]);
        s.bubbles.push(Bubble::new(5, "b".into(), 0, false));
        s.bubbles.push(Bubble::new(2, "a".into(), 1, true));
        s.normalize_order();
        let ids: Vec<u32> = s.bubbles.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 5]);
    }
}
