//! Fixed timestep simulation tick
//!
//! Core game loop that advances the bubble phase deterministically.

use glam::Vec2;

use super::collision::first_hit;
use super::spawn::maybe_spawn;
use super::state::{GameState, TerminalEvent};
use crate::consts::*;
use crate::lane_x;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Player avatar x (from pointer position, field coordinates)
    pub pointer_x: Option<f32>,
    /// Fire one bullet (click/tap)
    pub fire: bool,
    /// Demo mode - aim under the target bubble and shoot
    pub auto_aim: bool,
}

/// Advance the bubble phase by `dt` seconds.
///
/// Returns a terminal event the first time the round ends; the caller owns
/// what happens next.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) -> Option<TerminalEvent> {
    // Particles keep animating after the round ends (celebration burst)
    update_particles(state, dt);

    if state.finished.is_some() {
        settle(state, dt);
        return None;
    }

    let mut input = input.clone();
    if input.auto_aim {
        auto_aim(state, &mut input);
    }
    let input = &input;

    state.time_ticks += 1;
    state.time_ms += dt as f64 * 1000.0;

    if let Some(x) = input.pointer_x {
        state.player_x = x.clamp(0.0, FIELD_WIDTH);
    }
    if input.fire {
        state.fire();
    }

    // Bullets move up and leave through the top
    let bullet_step = state.tuning.bullet_speed * dt;
    for bullet in &mut state.bullets {
        bullet.pos.y -= bullet_step;
    }
    state.bullets.retain(|b| b.pos.y >= 0.0);

    // Bubbles fall; test each active one against the remaining bullets
    let fall_step = state.tuning.bubble_speed * dt;
    let hit_radius = state.tuning.hit_radius;
    let linger = state.tuning.bubble_linger;
    let mut consumed = vec![false; state.bullets.len()];
    let mut missed: Vec<u32> = Vec::new();
    let mut lives_lost = 0u8;
    let mut accepted: Vec<String> = Vec::new();
    let mut pops: Vec<(Vec2, bool)> = Vec::new();

    for bubble in &mut state.bubbles {
        if !bubble.is_active() {
            bubble.linger -= dt;
            continue;
        }

        bubble.y += fall_step;

        if bubble.y - BUBBLE_RADIUS > FIELD_HEIGHT {
            if bubble.is_target {
                log::debug!("Target {:?} missed", bubble.text);
                lives_lost += 1;
            }
            missed.push(bubble.id);
            continue;
        }

        if let Some(i) = first_hit(bubble.pos(), &state.bullets, &consumed, hit_radius) {
            consumed[i] = true;
            if bubble.is_target {
                log::debug!("Matched token {:?}", bubble.text);
                accepted.push(bubble.text.clone());
            } else {
                log::debug!("Hit distractor {:?}", bubble.text);
                lives_lost += 1;
            }
            bubble.pop(bubble.is_target, linger);
            pops.push((bubble.pos(), bubble.is_target));
        }
    }

    for token in &accepted {
        state.buffer.push_token(token);
        state.matched += 1;
    }
    for _ in 0..lives_lost {
        state.lose_life();
    }

    let mut idx = 0;
    state.bullets.retain(|_| {
        let keep = !consumed[idx];
        idx += 1;
        keep
    });
    state
        .bubbles
        .retain(|b| !missed.contains(&b.id) && (b.is_active() || b.linger > 0.0));

    for (pos, correct) in pops {
        let color = if correct { 0 } else { 1 };
        state.burst(pos, color, 12, 120.0);
    }

    // Terminal checks
    if state.lives == 0 {
        log::info!("Out of lives after matching {} tokens", state.matched);
        state.finished = Some(TerminalEvent::GameOver);
        return state.finished;
    }
    if state.all_matched() && state.active_targets() == 0 {
        if state.tokens.is_empty() {
            log::warn!("Reference solution has no tokens; bubble phase completes immediately");
        } else {
            log::info!("All {} tokens matched", state.tokens.len());
        }
        state.finished = Some(TerminalEvent::BubblePhaseComplete);
        return state.finished;
    }

    maybe_spawn(state);
    state.normalize_order();
    None
}

/// Motion after the round has ended.
///
/// Popped bubbles finish their animation, falling ones drain out of the
/// field and bullets keep flying. Nothing scores or costs a life.
fn settle(state: &mut GameState, dt: f32) {
    let bullet_step = state.tuning.bullet_speed * dt;
    for bullet in &mut state.bullets {
        bullet.pos.y -= bullet_step;
    }
    state.bullets.retain(|b| b.pos.y >= 0.0);

    let fall_step = state.tuning.bubble_speed * dt;
    for bubble in &mut state.bubbles {
        if bubble.is_active() {
            bubble.y += fall_step;
        } else {
            bubble.linger -= dt;
        }
    }
    state.bubbles.retain(|b| {
        if b.is_active() {
            b.y - BUBBLE_RADIUS <= FIELD_HEIGHT
        } else {
            b.linger > 0.0
        }
    });
}

/// Steer toward the lowest active target and fire when lined up
fn auto_aim(state: &GameState, input: &mut TickInput) {
    let Some(target) = state
        .bubbles
        .iter()
        .filter(|b| b.is_target && b.is_active())
        .max_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    else {
        return;
    };
    let x = lane_x(target.lane);
    input.pointer_x = Some(x);
    // Hold fire while an older distractor sits below the target in its lane
    let blocked = state
        .bubbles
        .iter()
        .any(|b| !b.is_target && b.is_active() && b.lane == target.lane && b.y > target.y);
    input.fire = state.bullets.is_empty() && !blocked && target.y > 0.0;
}

fn update_particles(state: &mut GameState, dt: f32) {
    for particle in state.particles.iter_mut() {
        particle.pos += particle.vel * dt;
        particle.vel.y += 240.0 * dt; // gravity
        particle.vel *= 0.98;
        particle.life -= dt * 1.5;
        particle.size *= 0.995;
    }
    state.particles.retain(|p| p.life > 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player_y;
    use crate::settings::Tuning;
    use crate::sim::spawn::DistractorSource;
    use crate::sim::state::{Bubble, BubbleState, Bullet};
    use crate::sim::token::tokenize;
    use proptest::prelude::*;

    fn state_for(solution: &str) -> GameState {
        GameState::new(
            12345,
            tokenize(solution),
            "",
            Tuning::default(),
            DistractorSource::Static,
        )
    }

    /// Run ticks on a virtual clock until a terminal event or the tick limit
    fn run_until_event(
        state: &mut GameState,
        input: &TickInput,
        limit: u32,
    ) -> Option<TerminalEvent> {
        for _ in 0..limit {
            if let Some(ev) = tick(state, input, SIM_DT) {
                return Some(ev);
            }
        }
        None
    }

    #[test]
    fn test_first_tick_spawns_pair() {
        let mut state = state_for("x = 1");
        assert_eq!(tick(&mut state, &TickInput::default(), SIM_DT), None);
        assert_eq!(state.bubbles.len(), 2);
        assert_eq!(state.active_targets(), 1);
        let target = state.bubbles.iter().find(|b| b.is_target).unwrap();
        assert_eq!(target.text, "x");
    }

    #[test]
    fn test_print_hi_round() {
        let mut state = state_for("print('hi')");
        assert_eq!(state.tokens, vec!["print", "(", "'hi'", ")"]);

        let input = TickInput {
            auto_aim: true,
            ..Default::default()
        };
        let ev = run_until_event(&mut state, &input, 60 * 120);
        assert_eq!(ev, Some(TerminalEvent::BubblePhaseComplete));
        assert_eq!(state.buffer.as_str(), "print ( 'hi' )");
        assert_eq!(state.matched, 4);
        assert_eq!(state.lives, START_LIVES);

        // Round is over: no further spawns
        let bubbles_before = state.bubbles.iter().map(|b| b.id).max();
        for _ in 0..600 {
            assert_eq!(tick(&mut state, &TickInput::default(), SIM_DT), None);
        }
        assert!(state.bubbles.iter().map(|b| b.id).max() <= bubbles_before);
        assert_eq!(state.active_targets(), 0);
    }

    #[test]
    fn test_field_drains_after_round_ends() {
        let mut state = state_for("print('hi')");
        let input = TickInput {
            auto_aim: true,
            ..Default::default()
        };
        let ev = run_until_event(&mut state, &input, 60 * 120);
        assert_eq!(ev, Some(TerminalEvent::BubblePhaseComplete));
        // The last target was popped on the final tick and is still animating
        assert!(
            state
                .bubbles
                .iter()
                .any(|b| b.state == BubbleState::HitCorrect)
        );

        let lives = state.lives;
        let matched = state.matched;
        let ticks = state.time_ticks;
        // Long enough for a bubble at the top edge to fall out of the field
        for _ in 0..60 * 15 {
            assert_eq!(tick(&mut state, &TickInput::default(), SIM_DT), None);
        }
        assert!(state.bubbles.is_empty(), "left over: {:?}", state.bubbles);
        assert!(state.bullets.is_empty());
        assert_eq!(state.lives, lives);
        assert_eq!(state.matched, matched);
        assert_eq!(state.time_ticks, ticks);
        assert_eq!(state.finished, Some(TerminalEvent::BubblePhaseComplete));
    }

    #[test]
    fn test_three_misses_game_over_on_third() {
        let mut state = state_for("a b c d");
        let idle = TickInput::default();
        let mut misses = 0;
        let mut last_lives = state.lives;

        for _ in 0..60 * 120 {
            let ev = tick(&mut state, &idle, SIM_DT);
            if state.lives < last_lives {
                misses += 1;
                last_lives = state.lives;
                if misses < 3 {
                    assert_eq!(ev, None, "game over before the third miss");
                }
            }
            if let Some(ev) = ev {
                assert_eq!(ev, TerminalEvent::GameOver);
                assert_eq!(misses, 3);
                assert_eq!(state.lives, 0);
                // Missed targets never advance the token index
                assert_eq!(state.matched, 0);
                return;
            }
        }
        panic!("round never ended");
    }

    #[test]
    fn test_distractor_hit_costs_life_only() {
        let mut state = state_for("a b");
        state.buffer.set("start");
        let id = state.next_entity_id();
        let mut bubble = Bubble::new(id, "zzz".into(), 1, false);
        bubble.y = 300.0;
        state.bubbles.push(bubble);
        // Keep the scheduler from adding the target this tick
        state.last_spawn_ms = Some(0.0);
        let bid = state.next_entity_id();
        state.bullets.push(Bullet {
            id: bid,
            pos: Vec2::new(lane_x(1), 305.0 + state.tuning.bullet_speed * SIM_DT),
        });

        assert_eq!(tick(&mut state, &TickInput::default(), SIM_DT), None);
        assert_eq!(state.lives, START_LIVES - 1);
        assert_eq!(state.matched, 0);
        assert_eq!(state.buffer.as_str(), "start");
        assert!(state.bullets.is_empty());
        assert_eq!(state.bubbles[0].state, BubbleState::HitWrong);
    }

    #[test]
    fn test_hit_bubble_removed_after_linger() {
        let mut state = state_for("a b");
        tick(&mut state, &TickInput::default(), SIM_DT);
        let target = state.bubbles.iter_mut().find(|b| b.is_target).unwrap();
        target.pop(true, 0.05);
        let id = target.id;
        for _ in 0..4 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(state.bubbles.iter().all(|b| b.id != id));
    }

    #[test]
    fn test_bullets_leave_through_top() {
        let mut state = state_for("a");
        let fire = TickInput {
            pointer_x: Some(10.0),
            fire: true,
            ..Default::default()
        };
        tick(&mut state, &fire, SIM_DT);
        assert_eq!(state.bullets.len(), 1);
        // Lane 0 sits at x = 60, out of reach of a bullet at x = 10
        let secs = player_y() / state.tuning.bullet_speed;
        let ticks = (secs / SIM_DT).ceil() as u32 + 2;
        for _ in 0..ticks {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_pointer_clamped_to_field() {
        let mut state = state_for("a");
        let input = TickInput {
            pointer_x: Some(-50.0),
            ..Default::default()
        };
        tick(&mut state, &input, SIM_DT);
        assert_eq!(state.player_x, 0.0);
    }

    #[test]
    fn test_empty_solution_completes_immediately() {
        let mut state = state_for("   ");
        assert_eq!(
            tick(&mut state, &TickInput::default(), SIM_DT),
            Some(TerminalEvent::BubblePhaseComplete)
        );
        assert!(state.bubbles.is_empty());
        // Reported once
        assert_eq!(tick(&mut state, &TickInput::default(), SIM_DT), None);
    }

    #[test]
    fn test_restart_resets_round() {
        let mut state = state_for("print('hi')");
        let input = TickInput {
            auto_aim: true,
            ..Default::default()
        };
        for _ in 0..400 {
            tick(&mut state, &input, SIM_DT);
        }
        state.lose_life();
        state.restart("# start\n");
        assert_eq!(state.lives, START_LIVES);
        assert_eq!(state.matched, 0);
        assert_eq!(state.buffer.as_str(), "# start\n");
        assert!(state.bubbles.is_empty());
        assert!(state.bullets.is_empty());
        assert_eq!(state.finished, None);
    }

    #[test]
    fn test_determinism() {
        let mut s1 = state_for("for i in range(3): print(i)");
        let mut s2 = state_for("for i in range(3): print(i)");
        let input = TickInput {
            auto_aim: true,
            ..Default::default()
        };
        for _ in 0..1200 {
            tick(&mut s1, &input, SIM_DT);
            tick(&mut s2, &input, SIM_DT);
        }
        assert_eq!(s1.matched, s2.matched);
        assert_eq!(s1.buffer, s2.buffer);
        let lanes1: Vec<_> = s1.bubbles.iter().map(|b| (b.id, b.lane)).collect();
        let lanes2: Vec<_> = s2.bubbles.iter().map(|b| (b.id, b.lane)).collect();
        assert_eq!(lanes1, lanes2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_round_invariants(
            seed in any::<u64>(),
            inputs in proptest::collection::vec((0.0f32..FIELD_WIDTH, any::<bool>()), 1..600),
        ) {
            let mut state = GameState::new(
                seed,
                tokenize("if x > 1: y = 'big'"),
                "",
                Tuning::default(),
                DistractorSource::Static,
            );
            let mut lives = state.lives;
            let mut matched_tokens: Vec<String> = Vec::new();

            for (x, fire) in inputs {
                let before = state.matched;
                let input = TickInput { pointer_x: Some(x), fire, auto_aim: false };
                tick(&mut state, &input, SIM_DT);

                prop_assert!(state.active_targets() <= 1);
                prop_assert!(state.lives <= lives);
                lives = state.lives;
                for i in before..state.matched {
                    matched_tokens.push(state.tokens[i].clone());
                }
            }

            // Buffer is exactly the matched prefix, in order
            let mut expected = crate::sim::buffer::CodeBuffer::new("");
            for t in &matched_tokens {
                expected.push_token(t);
            }
            prop_assert_eq!(&state.buffer, &expected);
            prop_assert_eq!(&matched_tokens[..], &state.tokens[..state.matched]);
        }
    }
}
