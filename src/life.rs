// src/life.rs
//
// The simulation core: one `LifeGrid` owns every buffer the wall needs.
// Nothing in here touches the window, the GPU, or wall-clock time; the host
// loop feeds in elapsed seconds and pointer coordinates and reads the pixel
// buffer back out.

use rand::Rng;
use rayon::prelude::*;

use crate::tuning::GridTuning;

/// Toroidal Game of Life grid plus its display-side companions.
///
/// Three per-cell buffers, all indexed `col + row * cols`:
/// - `cur` / `next`: the logical 0/1 generations. Exactly one is current at
///   any time; roles swap after each step.
/// - `display`: the on-screen value in [0, 1], eased toward `cur` every frame.
/// - `pixels`: tight RGBA bytes (`cols * rows * 4`) regenerated from
///   `display` every frame and consumed by the render bridge.
pub struct LifeGrid {
    cols: usize,
    rows: usize,
    n: usize,
    tuning: GridTuning,

    cur: Vec<u8>,
    next: Vec<u8>,
    display: Vec<f32>,

    pixels: Vec<u8>,
    dirty: bool,

    tick_accum_ms: f32,
}

/// Live-neighbor count with wraparound edges, read from an explicit buffer
/// so `step` can run against `cur` while writing `next`.
fn live_neighbors(cells: &[u8], cols: usize, rows: usize, col: usize, row: usize) -> u8 {
    let left = (col + cols - 1) % cols;
    let right = (col + 1) % cols;
    let up = (row + rows - 1) % rows;
    let down = (row + 1) % rows;

    cells[up * cols + left]
        + cells[up * cols + col]
        + cells[up * cols + right]
        + cells[row * cols + left]
        + cells[row * cols + right]
        + cells[down * cols + left]
        + cells[down * cols + col]
        + cells[down * cols + right]
}

impl LifeGrid {
    /// Builds a grid sized `viewport / cell_size` (min 1x1) and seeds it
    /// randomly. A viewport or cell-size change means a new grid; there is
    /// no in-place resize.
    pub fn new<R: Rng + ?Sized>(
        viewport_w: u32,
        viewport_h: u32,
        tuning: GridTuning,
        rng: &mut R,
    ) -> Self {
        let cell = tuning.cell_size_px.max(1);
        let cols = (viewport_w / cell).max(1) as usize;
        let rows = (viewport_h / cell).max(1) as usize;
        let n = cols * rows;

        let mut grid = Self {
            cols,
            rows,
            n,
            tuning,
            cur: vec![0; n],
            next: vec![0; n],
            display: vec![0.0; n],
            pixels: vec![0; n * 4],
            dirty: false,
            tick_accum_ms: 0.0,
        };
        grid.randomize(rng);
        grid
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get(&self, col: usize, row: usize) -> bool {
        col < self.cols && row < self.rows && self.cur[row * self.cols + col] != 0
    }

    pub fn set(&mut self, col: usize, row: usize, alive: bool) {
        if col < self.cols && row < self.rows {
            self.cur[row * self.cols + col] = alive as u8;
        }
    }

    pub fn population(&self) -> usize {
        self.cur.iter().filter(|&&c| c != 0).count()
    }

    /// Tight RGBA bytes, one texel per cell, row-major from the top row.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns whether the pixel buffer changed since the last call and
    /// lowers the flag. The render bridge re-uploads only when this is true.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Reseeds every cell by an independent Bernoulli draw at the configured
    /// probability. Display values snap to the new 0/1 states so a fresh
    /// grid does not fade in from leftovers.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let p = self.tuning.initial_alive_probability.clamp(0.0, 1.0);
        for i in 0..self.n {
            let alive = (rng.random::<f32>() < p) as u8;
            self.cur[i] = alive;
            self.display[i] = alive as f32;
        }
        self.next.fill(0);
        self.tick_accum_ms = 0.0;
    }

    /// Advances one generation under B3/S23 with toroidal edges.
    ///
    /// Every next value is computed from the pre-step buffer; the swap at
    /// the end makes the new generation visible all at once.
    pub fn step(&mut self) {
        let cols = self.cols;
        let rows = self.rows;
        let cur = &self.cur;

        self.next
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row, nrow)| {
                for col in 0..cols {
                    let alive = cur[row * cols + col] != 0;
                    let n = live_neighbors(cur, cols, rows, col, row);
                    nrow[col] = match (alive, n) {
                        (true, 2) | (_, 3) => 1,
                        _ => 0,
                    };
                }
            });

        std::mem::swap(&mut self.cur, &mut self.next);
    }

    /// Forces the cell under a pointer position alive in the *current*
    /// generation, so the next frame's fade pass already sees it.
    ///
    /// Coordinates are window pixels with the origin at the top left (the
    /// same convention as the texture rows); anything that lands outside
    /// the grid is ignored.
    pub fn set_cell_alive(&mut self, px: f32, py: f32) {
        let cell = self.tuning.cell_size_px.max(1) as f32;
        let col = (px / cell).floor();
        let row = (py / cell).floor();
        if col < 0.0 || row < 0.0 || col >= self.cols as f32 || row >= self.rows as f32 {
            return;
        }
        self.cur[row as usize * self.cols + col as usize] = 1;
    }

    /// Eases every display value toward its logical 0/1 state.
    ///
    /// `k = 1 - 0.01^(dt * rate)`: after `1 / rate` seconds the remaining
    /// distance has shrunk to 1%, no matter how the elapsed time was split
    /// across frames. A convex blend, so values stay inside [0, 1].
    pub fn advance(&mut self, dt_seconds: f32) {
        let k = 1.0 - 0.01_f32.powf(dt_seconds * self.tuning.transition_rate);
        for (d, &c) in self.display.iter_mut().zip(self.cur.iter()) {
            *d += (c as f32 - *d) * k;
        }
    }

    /// Rewrites the RGBA buffer from the display values and raises the
    /// dirty flag. The buffer is reused across frames; it is only ever
    /// reallocated by building a new grid.
    pub fn sync_pixels(&mut self) {
        let cols = self.cols;
        let display = &self.display;

        self.pixels
            .par_chunks_mut(cols * 4)
            .enumerate()
            .for_each(|(row, out)| {
                let base = row * cols;
                for col in 0..cols {
                    let v = (display[base + col] * 255.0) as u8;
                    let o = col * 4;
                    out[o] = v;
                    out[o + 1] = v;
                    out[o + 2] = v;
                    out[o + 3] = 255;
                }
            });

        self.dirty = true;
    }

    /// One frame of simulation work, in the fixed order: conditionally step
    /// (when a full tick interval has accumulated), then fade, then sync
    /// pixels. Returns whether a generation ran.
    ///
    /// At most one interval of debt is retained, so a long stall yields one
    /// prompt tick rather than a burst.
    pub fn update(&mut self, dt_seconds: f32) -> bool {
        self.tick_accum_ms += dt_seconds * 1000.0;
        let mut stepped = false;
        if self.tick_accum_ms >= self.tuning.tick_interval_ms {
            self.step();
            stepped = true;
            self.tick_accum_ms -= self.tuning.tick_interval_ms;
            self.tick_accum_ms = self.tick_accum_ms.min(self.tuning.tick_interval_ms);
        }
        self.advance(dt_seconds);
        self.sync_pixels();
        stepped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn empty_grid(cols: u32, rows: u32) -> LifeGrid {
        let tuning = GridTuning {
            cell_size_px: 1,
            initial_alive_probability: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        LifeGrid::new(cols, rows, tuning, &mut rng)
    }

    #[test]
    fn dimensions_never_collapse_below_one() {
        let tuning = GridTuning {
            cell_size_px: 14,
            initial_alive_probability: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let grid = LifeGrid::new(3, 5, tuning, &mut rng);
        assert_eq!(grid.cols(), 1);
        assert_eq!(grid.rows(), 1);
    }

    #[test]
    fn wraparound_counts_opposite_corners() {
        let grid = {
            let mut g = empty_grid(5, 4);
            g.set(0, 0, true);
            g
        };
        // (0,0) wraps into the neighborhoods of all four corners.
        assert_eq!(live_neighbors(&grid.cur, 5, 4, 4, 3), 1);
        assert_eq!(live_neighbors(&grid.cur, 5, 4, 4, 0), 1);
        assert_eq!(live_neighbors(&grid.cur, 5, 4, 0, 3), 1);
        assert_eq!(live_neighbors(&grid.cur, 5, 4, 1, 1), 1);
        // A cell two columns away sees nothing.
        assert_eq!(live_neighbors(&grid.cur, 5, 4, 2, 0), 0);
    }

    #[test]
    fn birth_at_exactly_three() {
        let mut g = empty_grid(7, 7);
        g.set(2, 2, true);
        g.set(3, 2, true);
        g.set(4, 2, true);
        assert!(!g.get(3, 3));
        g.step();
        assert!(g.get(3, 3), "dead cell with 3 neighbors must be born");
    }

    #[test]
    fn survival_at_two_and_three() {
        // Block: every member has exactly 3 live neighbors and survives.
        let mut g = empty_grid(7, 7);
        g.set(2, 2, true);
        g.set(3, 2, true);
        g.set(2, 3, true);
        g.set(3, 3, true);
        g.step();
        assert!(g.get(2, 2) && g.get(3, 2) && g.get(2, 3) && g.get(3, 3));

        // Blinker end cells have 1 neighbor and die; the center has 2 and lives.
        let mut g = empty_grid(7, 7);
        g.set(2, 3, true);
        g.set(3, 3, true);
        g.set(4, 3, true);
        g.step();
        assert!(g.get(3, 3), "cell with 2 live neighbors must survive");
        assert!(!g.get(2, 3) && !g.get(4, 3), "cells with 1 neighbor must die");
    }

    #[test]
    fn overcrowding_kills() {
        // Plus sign: the center is alive with 4 live neighbors.
        let mut g = empty_grid(7, 7);
        g.set(3, 3, true);
        g.set(2, 3, true);
        g.set(4, 3, true);
        g.set(3, 2, true);
        g.set(3, 4, true);
        g.step();
        assert!(!g.get(3, 3), "cell with 4 live neighbors must die");
    }

    #[test]
    fn step_reads_only_the_previous_generation() {
        // Horizontal blinker becomes exactly a vertical blinker. If the step
        // wrote in place, newly-born cells would contaminate neighbor counts
        // and the result would differ.
        let mut g = empty_grid(5, 5);
        g.set(1, 2, true);
        g.set(2, 2, true);
        g.set(3, 2, true);
        g.step();
        for row in 0..5 {
            for col in 0..5 {
                let expect = col == 2 && (1..=3).contains(&row);
                assert_eq!(g.get(col, row), expect, "cell ({col}, {row})");
            }
        }
    }

    #[test]
    fn full_row_on_torus_regression() {
        // 5x5 with row 2 fully alive. Row cells keep exactly 2 side
        // neighbors (wraparound), rows 1 and 3 see 3 below/above and are
        // born, rows 0 and 4 stay empty.
        let mut g = empty_grid(5, 5);
        for col in 0..5 {
            g.set(col, 2, true);
        }
        g.step();
        for row in 0..5 {
            for col in 0..5 {
                let expect = (1..=3).contains(&row);
                assert_eq!(g.get(col, row), expect, "cell ({col}, {row})");
            }
        }
    }

    #[test]
    fn fade_converges_without_overshoot() {
        let mut g = empty_grid(1, 1);
        g.set_cell_alive(0.0, 0.0);
        assert_eq!(g.display[0], 0.0);

        let mut prev = 0.0;
        for _ in 0..1000 {
            g.advance(0.016);
            assert!(g.display[0] >= prev, "fade must be monotone");
            assert!(g.display[0] <= 1.0, "fade must not overshoot");
            prev = g.display[0];
        }
        assert!(g.display[0] > 0.999);
    }

    #[test]
    fn fade_is_framerate_independent() {
        let mut once = empty_grid(1, 1);
        let mut twice = empty_grid(1, 1);
        once.set(0, 0, true);
        twice.set(0, 0, true);

        once.advance(0.1);
        twice.advance(0.05);
        twice.advance(0.05);

        assert!(
            (once.display[0] - twice.display[0]).abs() < 1e-4,
            "same elapsed time must land on the same value: {} vs {}",
            once.display[0],
            twice.display[0]
        );
    }

    #[test]
    fn pixel_bytes_match_display_values() {
        let tuning = GridTuning {
            cell_size_px: 1,
            initial_alive_probability: 0.4,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let mut g = LifeGrid::new(16, 16, tuning, &mut rng);
        g.advance(0.03);
        g.sync_pixels();

        for i in 0..g.n {
            let expect = (g.display[i] * 255.0) as u8;
            assert_eq!(g.pixels[i * 4], expect);
            assert_eq!(g.pixels[i * 4 + 1], expect);
            assert_eq!(g.pixels[i * 4 + 2], expect);
            assert_eq!(g.pixels[i * 4 + 3], 255);
        }
        assert!(g.take_dirty());
        assert!(!g.take_dirty());
    }

    #[test]
    fn pointer_injection_lands_in_the_right_cell() {
        let tuning = GridTuning {
            cell_size_px: 10,
            initial_alive_probability: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut g = LifeGrid::new(100, 100, tuning, &mut rng);

        g.set_cell_alive(25.0, 37.0);
        assert!(g.get(2, 3));
        assert_eq!(g.population(), 1);
    }

    #[test]
    fn pointer_injection_out_of_bounds_is_a_no_op() {
        let mut g = empty_grid(8, 8);
        let before = g.cur.clone();
        g.set_cell_alive(-5.0, 3.0);
        g.set_cell_alive(3.0, -0.1);
        g.set_cell_alive(8.0, 0.0);
        g.set_cell_alive(1e9, 1e9);
        assert_eq!(g.cur, before);
    }

    #[test]
    fn tick_is_subsampled_from_the_frame_rate() {
        let tuning = GridTuning {
            cell_size_px: 1,
            tick_interval_ms: 100.0,
            initial_alive_probability: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut g = LifeGrid::new(4, 4, tuning, &mut rng);

        assert!(!g.update(0.05), "no generation before the interval elapses");
        assert!(g.update(0.06), "generation once the interval has accumulated");
        assert!(!g.update(0.05), "debt was paid down; accumulation restarts");
    }

    #[test]
    fn randomize_resets_display_and_hits_the_density() {
        let tuning = GridTuning {
            cell_size_px: 1,
            initial_alive_probability: 0.5,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1234);
        let mut g = LifeGrid::new(40, 40, tuning, &mut rng);
        g.advance(0.2);
        g.randomize(&mut rng);

        for i in 0..g.n {
            assert_eq!(g.display[i], g.cur[i] as f32);
        }
        let pop = g.population();
        assert!(pop > 600 && pop < 1000, "population {pop} far from 50% of 1600");
    }
}
