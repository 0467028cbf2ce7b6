//! Audio system using Web Audio API
//!
//! Procedurally generated sound effects - no external files needed!

use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

use crate::settings::Settings;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Bullet fired
    Fire,
    /// Target bubble popped, token accepted
    TokenMatched,
    /// Distractor popped
    WrongHit,
    /// Target fell out of the field
    TargetMissed,
    /// Review passed
    LevelComplete,
    /// Review came back negative
    ReviewFailed,
    /// Lives exhausted
    GameOver,
}

/// Audio manager for the game
pub struct AudioManager {
    ctx: Option<AudioContext>,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioManager {
    pub fn new() -> Self {
        // Try to create audio context (may fail if not in secure context)
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        Self {
            ctx,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }

    /// Pick up volume and mute from player settings
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.master_volume = settings.master_volume.clamp(0.0, 1.0);
        self.sfx_volume = settings.sfx_volume.clamp(0.0, 1.0);
        self.muted = settings.muted;
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Play a sound effect
    pub fn play(&self, effect: SoundEffect) {
        let vol = self.effective_volume();
        if vol <= 0.0 {
            return;
        }

        let Some(ctx) = &self.ctx else { return };

        // Resume context if suspended (browsers require user gesture)
        if ctx.state() == web_sys::AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        match effect {
            SoundEffect::Fire => {
                self.sweep(ctx, vol * 0.2, OscillatorType::Square, 900.0, 1400.0, 0.06)
            }
            SoundEffect::TokenMatched => {
                self.arpeggio(ctx, vol * 0.25, OscillatorType::Sine, &[660.0, 880.0], 0.06, 0.15)
            }
            SoundEffect::WrongHit => {
                self.sweep(ctx, vol * 0.35, OscillatorType::Sawtooth, 220.0, 90.0, 0.25)
            }
            SoundEffect::TargetMissed => {
                self.sweep(ctx, vol * 0.3, OscillatorType::Sine, 300.0, 60.0, 0.4)
            }
            SoundEffect::LevelComplete => self.arpeggio(
                ctx,
                vol * 0.25,
                OscillatorType::Triangle,
                &[500.0, 600.0, 700.0, 800.0, 1000.0],
                0.08,
                0.3,
            ),
            SoundEffect::ReviewFailed => {
                self.arpeggio(ctx, vol * 0.25, OscillatorType::Triangle, &[440.0, 330.0], 0.15, 0.25)
            }
            SoundEffect::GameOver => self.arpeggio(
                ctx,
                vol * 0.3,
                OscillatorType::Sine,
                &[400.0, 350.0, 300.0, 200.0],
                0.2,
                0.4,
            ),
        }
    }

    // === Sound generators ===

    /// Create an oscillator with gain envelope
    fn create_osc(
        &self,
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    /// Single tone gliding from `from` to `to` Hz over `secs`
    fn sweep(
        &self,
        ctx: &AudioContext,
        level: f32,
        osc_type: OscillatorType,
        from: f32,
        to: f32,
        secs: f64,
    ) {
        let Some((osc, gain)) = self.create_osc(ctx, from, osc_type) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(level, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + secs)
            .ok();
        osc.frequency().set_value_at_time(from, t).ok();
        osc.frequency()
            .exponential_ramp_to_value_at_time(to, t + secs)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + secs + 0.05).ok();
    }

    /// Notes played one after another, `step` seconds apart
    fn arpeggio(
        &self,
        ctx: &AudioContext,
        level: f32,
        osc_type: OscillatorType,
        notes: &[f32],
        step: f64,
        decay: f64,
    ) {
        for (i, freq) in notes.iter().enumerate() {
            let delay = i as f64 * step;
            if let Some((osc, gain)) = self.create_osc(ctx, *freq, osc_type) {
                let t = ctx.current_time() + delay;
                gain.gain().set_value_at_time(level, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + decay)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + decay + 0.05).ok();
            }
        }
    }
}
