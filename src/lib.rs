//! Code Bubble - a code-token bubble shooter
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tokens, bubbles, bullets, collisions)
//! - `session`: Round state machine and review hand-off
//! - `services`: Contracts for the review/hint/distractor endpoints
//! - `progress`: Level completion records
//! - `settings`: Player preferences and game tuning

#[cfg(target_arch = "wasm32")]
pub mod audio;
pub mod error;
pub mod progress;
pub mod services;
pub mod session;
pub mod settings;
pub mod sim;

pub use error::{ServiceError, SessionError};
pub use progress::ProgressBook;
pub use session::{LevelSpec, Session, SessionEvent, SessionPhase};
pub use settings::{Difficulty, Settings, Tuning};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one step per display frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Play field dimensions (logical pixels, origin top-left, y grows down)
    pub const FIELD_WIDTH: f32 = 480.0;
    pub const FIELD_HEIGHT: f32 = 640.0;

    /// Number of fixed bubble lanes
    pub const LANE_COUNT: usize = 4;

    /// Player avatar sits this far above the bottom edge
    pub const PLAYER_OFFSET: f32 = 60.0;

    /// Bubble defaults
    pub const BUBBLE_RADIUS: f32 = 28.0;
    /// Fall speed (pixels/s)
    pub const BUBBLE_SPEED: f32 = 60.0;
    /// Seconds a hit bubble stays on screen for its pop animation
    pub const BUBBLE_LINGER: f32 = 0.3;

    /// Bullet speed (pixels/s)
    pub const BULLET_SPEED: f32 = 600.0;
    /// Distance between bubble and bullet centres that counts as a hit
    pub const HIT_RADIUS: f32 = 40.0;

    /// Minimum time between spawn waves (milliseconds)
    pub const SPAWN_INTERVAL_MS: u32 = 2000;

    /// Lives at the start of a round
    pub const START_LIVES: u8 = 3;
}

/// Horizontal centre of a lane
#[inline]
pub fn lane_x(lane: usize) -> f32 {
    use consts::{FIELD_WIDTH, LANE_COUNT};
    let lane_width = FIELD_WIDTH / LANE_COUNT as f32;
    lane_width * (lane.min(LANE_COUNT - 1) as f32 + 0.5)
}

/// Vertical position of the player avatar
#[inline]
pub fn player_y() -> f32 {
    consts::FIELD_HEIGHT - consts::PLAYER_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_centres() {
        assert_eq!(lane_x(0), 60.0);
        assert_eq!(lane_x(3), 420.0);
        // Out-of-range lanes clamp to the last lane
        assert_eq!(lane_x(9), lane_x(3));
    }
}
