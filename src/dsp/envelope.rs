/*
Grain Envelope
==============

Every grain voice and playhead in the granular looper wears a tiny envelope
so that it starts and stops without clicking. It is a cut-down ADSR: no
decay, and the sustain stage does not wait for a gate but for its owner to
say "you are about to run out of audio".

Vocabulary
----------

  level       The envelope's current output value (0.0 to 1.0). Multiplies
              the grain's audio.

  stage       Idle, Attack, Sustain or Release. A state machine governs
              transitions.

  attack      Fixed number of samples to ramp 0 → 1 (about 2ms).

  release     Fixed number of samples to ramp from the current level to 0.


The Shape
---------

  Level
    1.0 ┐    ┌──────────────────┐
        │   ╱                    ╲
        │  ╱                      ╲
    0.0 └─╱────────────────────────╲──→ Time
        Attack     Sustain      Release

Both ramps are LINEAR. They are only a couple of milliseconds long, so the
shape is inaudible; what matters is that the level reaches exactly 0 at both
ends.


The State Machine
-----------------

    ┌──────┐  trigger   ┌────────┐  level=1   ┌─────────┐
    │ Idle │ ─────────→ │ Attack │ ─────────→ │ Sustain │
    └──────┘            └────────┘            └─────────┘
        ↑                    │ release             │ release
        │                    ↓                     ↓
        │   level=0     ┌─────────┐ ←──────────────┘
        └────────────── │ Release │
                        └─────────┘

The Sustain stage never ends by itself. The grain that owns the envelope
compares its remaining progress to the release length and calls `release`
early enough for the ramp to finish before the grain does.

Release always starts from the CURRENT level, so a grain cut short during
its attack fades from wherever it got to.
*/

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy)]
pub struct GrainEnvelope {
    attack_samples: u32,
    release_samples: u32,

    stage: EnvelopeStage,
    level: f32,

    // Samples spent in the current ramp
    elapsed: u32,
    // Snapshotted when release begins
    release_start_level: f32,
}

impl GrainEnvelope {
    pub fn new(attack_samples: u32, release_samples: u32) -> Self {
        Self {
            attack_samples: attack_samples.max(1),
            release_samples: release_samples.max(1),
            stage: EnvelopeStage::Idle,
            level: 0.0,
            elapsed: 0,
            release_start_level: 0.0,
        }
    }

    /// Ramp lengths given in seconds.
    pub fn from_seconds(sample_rate: f32, attack: f32, release: f32) -> Self {
        Self::new(
            (attack * sample_rate).round().max(1.0) as u32,
            (release * sample_rate).round().max(1.0) as u32,
        )
    }

    /// Start the attack from zero.
    pub fn trigger(&mut self) {
        self.level = 0.0;
        self.elapsed = 0;
        self.stage = EnvelopeStage::Attack;
    }

    /// Begin the release from the current level.
    pub fn release(&mut self) {
        if matches!(self.stage, EnvelopeStage::Idle | EnvelopeStage::Release) {
            return;
        }
        self.release_start_level = self.level;
        self.elapsed = 0;
        self.stage = EnvelopeStage::Release;
    }

    /// Advance one sample and return the level.
    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                self.elapsed = self.elapsed.saturating_add(1);
                self.level = self.elapsed as f32 / self.attack_samples as f32;
                if self.elapsed >= self.attack_samples {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.level = 1.0;
            }
            EnvelopeStage::Release => {
                self.elapsed = self.elapsed.saturating_add(1);
                let progress = self.elapsed as f32 / self.release_samples as f32;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);

                if self.elapsed >= self.release_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    #[inline]
    pub fn release_samples(&self) -> u32 {
        self.release_samples
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self.stage, EnvelopeStage::Idle)
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_start_level = 0.0;
        self.elapsed = 0;
    }
}
