//! Player settings and game tuning
//!
//! Settings are persisted in LocalStorage; tuning is derived from the
//! difficulty preset and may be overridden from JSON.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Difficulty preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "medium" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Fall speed multiplier
    pub fn speed_factor(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.7,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.5,
        }
    }

    /// Spawn interval multiplier
    pub fn interval_factor(&self) -> f32 {
        match self {
            Difficulty::Easy => 1.25,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.0,
        }
    }
}

/// Game balance values read by the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Lives at the start of a round
    pub start_lives: u8,
    /// Minimum milliseconds between spawn waves
    pub spawn_interval_ms: u32,
    /// Bubble fall speed (pixels/s)
    pub bubble_speed: f32,
    /// Bullet speed (pixels/s)
    pub bullet_speed: f32,
    /// Hit distance between bubble and bullet centres
    pub hit_radius: f32,
    /// Seconds a popped bubble stays visible
    pub bubble_linger: f32,
    /// Number of AI distractors to request per level
    pub distractor_count: u32,
    /// Phrases in review feedback that count as a pass (legacy payloads only)
    pub pass_phrases: Vec<String>,
    /// Phrases that veto a pass even if a pass phrase is present
    pub fail_phrases: Vec<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            start_lives: START_LIVES,
            spawn_interval_ms: SPAWN_INTERVAL_MS,
            bubble_speed: BUBBLE_SPEED,
            bullet_speed: BULLET_SPEED,
            hit_radius: HIT_RADIUS,
            bubble_linger: BUBBLE_LINGER,
            distractor_count: 10,
            pass_phrases: vec![
                "correct".into(),
                "well done".into(),
                "great job".into(),
                "good job".into(),
            ],
            fail_phrases: vec![
                "incorrect".into(),
                "not correct".into(),
                "isn't correct".into(),
            ],
        }
    }
}

impl Tuning {
    /// Tuning for a difficulty preset
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let base = Self::default();
        Self {
            bubble_speed: base.bubble_speed * difficulty.speed_factor(),
            spawn_interval_ms: (base.spawn_interval_ms as f32 * difficulty.interval_factor())
                as u32,
            ..base
        }
    }

    /// Parse overrides from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tuning: Tuning = serde_json::from_str(json)?;
        Ok(tuning.clamped())
    }

    fn clamped(mut self) -> Self {
        self.start_lives = self.start_lives.clamp(1, START_LIVES);
        self.spawn_interval_ms = self.spawn_interval_ms.max(SPAWN_INTERVAL_MS);
        self.hit_radius = self.hit_radius.max(1.0);
        self.bubble_speed = self.bubble_speed.max(1.0);
        self.bullet_speed = self.bullet_speed.max(1.0);
        self
    }
}

/// Player settings/preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Difficulty preset
    pub difficulty: Difficulty,

    // === Visual Effects ===
    /// Particle effects on hits and level complete
    pub particles: bool,
    /// Reduced motion (no particles, no shake)
    pub reduced_motion: bool,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,

    // === Distractors ===
    /// Ask the distractor endpoint for generated decoys
    pub ai_distractors: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            particles: true,
            reduced_motion: false,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
            ai_distractors: true,
        }
    }
}

impl Settings {
    /// Tuning implied by these settings
    pub fn tuning(&self) -> Tuning {
        Tuning::for_difficulty(self.difficulty)
    }

    /// Effective particle effects (respects reduced_motion)
    pub fn effective_particles(&self) -> bool {
        self.particles && !self.reduced_motion
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "code_bubble_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring unreadable settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
