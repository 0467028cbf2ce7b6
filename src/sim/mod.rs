//! Deterministic simulation module
//!
//! All bubble-phase logic lives here. This module must be pure and deterministic:
//! - Caller-supplied timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No DOM or platform dependencies

pub mod buffer;
pub mod collision;
pub mod spawn;
pub mod state;
pub mod tick;
pub mod token;

pub use buffer::CodeBuffer;
pub use collision::{first_hit, is_hit};
pub use spawn::{DistractorSource, FALLBACK_DISTRACTORS, maybe_spawn, pick_lanes};
pub use state::{Bubble, BubbleState, Bullet, GameState, Particle, TerminalEvent};
pub use tick::{TickInput, tick};
pub use token::{TokenCache, tokenize};
