// src/tuning.rs
//
// This file is the CONTROL PANEL.
// The intent: if you want to change how the wall looks or behaves, you
// change it here. Everything in `GridTuning` is fixed for the lifetime of
// one grid; a new grid (startup, resize, reseed) re-reads the panel.

use rand::{rngs::StdRng, SeedableRng};

#[derive(Clone, Copy, Debug)]
pub struct GridTuning {
    /// Viewport pixels per cell edge. The grid is `viewport / cell_size_px`
    /// in each dimension, never smaller than 1x1.
    pub cell_size_px: u32,

    /// Milliseconds between generations. The simulation tick is sub-sampled
    /// from the frame rate: a generation runs only once this much time has
    /// accumulated, while fading and pixel sync run every frame.
    pub tick_interval_ms: f32,

    /// Display fade rate constant in 1/seconds. After `1 / transition_rate`
    /// seconds a cell's on-screen value has covered ~99% of the distance to
    /// its logical 0/1 state, independent of frame rate.
    pub transition_rate: f32,

    /// Probability that a cell starts alive when a grid is (re)seeded.
    pub initial_alive_probability: f32,

    /// Corner rounding fraction for the drawn cells: 0 is a square,
    /// 1 is a disc. Consumed only by the fragment shader.
    pub corner_rounding: f32,

    /// Color of a fully-alive cell (sRGB bytes).
    pub alive_color: [u8; 3],

    /// Color of a fully-dead cell (sRGB bytes).
    pub dead_color: [u8; 3],

    /// Fixed RNG seed for a reproducible world. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for GridTuning {
    fn default() -> Self {
        Self {
            cell_size_px: 14,
            tick_interval_ms: 140.0,
            transition_rate: 6.0,
            initial_alive_probability: 0.12,
            corner_rounding: 0.35,
            alive_color: [235, 235, 225],
            dead_color: [16, 16, 20],
            rng_seed: None,
        }
    }
}

impl GridTuning {
    pub fn make_rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
