//! Stochastic bend/break decisions for macro mode.

/*
Macro Rolls
===========

In macro mode the `bend` and `break` knobs do not set anything directly.
They set how much chaos is allowed, and at every repeat boundary the engine
rolls dice to decide what actually happens during the next repeat.

Each knob is split into five zones:

    amount   0 ──── .17 ──── .33 ──── .5 ──── .67 ──── 1
    zone     │   1   │   2    │   3    │   4   │   5    │

A zone is armed once the amount is above its threshold. Every armed zone
draws on its own, so at full amount all five can fire on the same roll;
higher zones add to lower ones, they never replace them.

  zone   bend                       break
  ----   -------------------------  ------------------------
  1      play backwards             repeat this section again
  2      jump an octave up or down  jump to a random section
  3      tape stop                  silence
  4      glide to a random speed    stutter in halves
  5      extreme speed (4× or ¼×)   stutter in quarters

The chance of an armed zone firing grows with the amount, from zero at its
threshold to its weight at full scale.
*/

use crate::dsp::Random;

pub const ZONE_THRESHOLDS: [f32; 5] = [0.0, 0.17, 0.33, 0.5, 0.67];
const ZONE_WEIGHTS: [f32; 5] = [0.6, 0.5, 0.4, 0.35, 0.3];

const MIN_SPEED: f64 = 0.125;
const MAX_SPEED: f64 = 4.0;

/// What the next repeat does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roll {
    /// +1 forward, −1 backward.
    pub direction: f64,
    /// Speed magnitude to play (or glide to).
    pub speed: f64,
    pub glide: bool,
    pub tape_stop: bool,
    pub extra_repeat: bool,
    pub jump: Option<usize>,
    pub silence: bool,
    /// Sub-divisions of the repeat that loop: 1, 2 or 4.
    pub stutter: u32,
}

impl Default for Roll {
    fn default() -> Self {
        Self {
            direction: 1.0,
            speed: 1.0,
            glide: false,
            tape_stop: false,
            extra_repeat: false,
            jump: None,
            silence: false,
            stutter: 1,
        }
    }
}

/// Which zones fire for `amount`.
fn fire(amount: f32, rng: &mut Random) -> [bool; 5] {
    let mut fired = [false; 5];
    for (zone, threshold) in ZONE_THRESHOLDS.iter().enumerate() {
        if amount > *threshold {
            let depth = (amount - threshold) / (1.0 - threshold);
            fired[zone] = rng.chance(ZONE_WEIGHTS[zone] * depth);
        }
    }
    fired
}

pub fn roll(bend: f32, brk: f32, repeats: usize, rng: &mut Random) -> Roll {
    let mut roll = Roll::default();

    let [reverse, octave, tape_stop, glide, extreme] = fire(bend, rng);
    if reverse {
        roll.direction = -1.0;
    }
    if octave {
        roll.speed *= rng.either(2.0, 0.5);
    }
    if tape_stop {
        roll.tape_stop = true;
    }
    if glide {
        roll.glide = true;
        roll.speed *= rng.range(0.5, 1.5) as f64;
    }
    if extreme {
        roll.speed *= rng.either(4.0, 0.25);
    }
    roll.speed = roll.speed.clamp(MIN_SPEED, MAX_SPEED);

    let [extra, jump, silence, half, quarter] = fire(brk, rng);
    roll.extra_repeat = extra;
    if jump {
        roll.jump = Some(rng.index(repeats));
    }
    roll.silence = silence;
    if half {
        roll.stutter = 2;
    }
    if quarter {
        roll.stutter = 4;
    }

    roll
}
