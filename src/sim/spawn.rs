//! Spawn scheduler
//!
//! Bubbles arrive in pairs: the next unmatched token plus one distractor,
//! each in its own lane. A new pair only appears once the previous target is
//! gone and the spawn interval has elapsed.

use rand::Rng;
use rand::seq::IndexedRandom;

use super::state::{Bubble, GameState};
use crate::consts::LANE_COUNT;

/// Distractors used when no generated ones are available
pub const FALLBACK_DISTRACTORS: &[&str] = &[
    "var", "let", "const", "function", "return", "if", "else", "for", "while", "print", "def",
    "class", "import", "true", "false", "null", "None", "0", "1", "==", "!=", "+", "-", "{",
    "}", "[", "]", ";", ":", "\"\"", "''",
];

/// Where distractor strings come from
#[derive(Debug, Clone, Default)]
pub enum DistractorSource {
    /// Built-in fallback list
    #[default]
    Static,
    /// Externally supplied (AI-generated) strings
    Supplied(Vec<String>),
}

impl DistractorSource {
    /// Use supplied strings, or the fallback list when none are usable
    pub fn from_supplied(list: Vec<String>) -> Self {
        let list: Vec<String> = list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if list.is_empty() {
            DistractorSource::Static
        } else {
            DistractorSource::Supplied(list)
        }
    }

    /// Pick a distractor for `target`, avoiding the target text when possible
    pub fn pick<R: Rng>(&self, target: &str, rng: &mut R) -> String {
        match self {
            DistractorSource::Supplied(list) if !list.is_empty() => {
                pick_other(list.iter().map(String::as_str), target, rng)
            }
            _ => pick_other(FALLBACK_DISTRACTORS.iter().copied(), target, rng),
        }
    }
}

fn pick_other<'a, R: Rng>(
    pool: impl Iterator<Item = &'a str>,
    target: &str,
    rng: &mut R,
) -> String {
    let pool: Vec<&str> = pool.collect();
    let others: Vec<&str> = pool.iter().copied().filter(|s| *s != target).collect();
    let chosen = if others.is_empty() {
        pool.choose(rng)
    } else {
        others.choose(rng)
    };
    chosen.map(|s| s.to_string()).unwrap_or_default()
}

/// Two distinct lanes, uniformly chosen
pub fn pick_lanes<R: Rng>(rng: &mut R) -> (usize, usize) {
    let first = rng.random_range(0..LANE_COUNT);
    let second = (first + rng.random_range(1..LANE_COUNT)) % LANE_COUNT;
    (first, second)
}

/// Spawn the next target/distractor pair if the schedule allows it.
///
/// Returns true when a pair was spawned.
pub fn maybe_spawn(state: &mut GameState) -> bool {
    if state.active_targets() > 0 {
        return false;
    }
    if let Some(last) = state.last_spawn_ms {
        if state.time_ms - last < state.tuning.spawn_interval_ms as f64 {
            return false;
        }
    }
    let Some(target) = state.next_token().map(str::to_string) else {
        return false;
    };

    let distractor = state.distractors.pick(&target, &mut state.rng);
    let (target_lane, distractor_lane) = pick_lanes(&mut state.rng);

    let target_id = state.next_entity_id();
    let distractor_id = state.next_entity_id();
    log::debug!(
        "Spawning target {:?} in lane {} and distractor {:?} in lane {}",
        target,
        target_lane,
        distractor,
        distractor_lane
    );
    state
        .bubbles
        .push(Bubble::new(target_id, target, target_lane, true));
    state
        .bubbles
        .push(Bubble::new(distractor_id, distractor, distractor_lane, false));
    state.last_spawn_ms = Some(state.time_ms);
    true
}
