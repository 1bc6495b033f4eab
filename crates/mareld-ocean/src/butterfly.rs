//! Butterfly precompute table and reference transform.
//!
//! The GPU inverse FFT is a radix-2 decimation-in-frequency transform:
//! per axis, `log2(size)` butterfly passes followed by one bit-reversal
//! permute shared by both axes. Each butterfly pass evaluates, for every
//! output row `y`:
//!
//! ```text
//! h = size >> (step + 1)
//! out[y] = twiddle * (in[index] + sign * in[index + h])
//! ```
//!
//! with `(twiddle, index, sign)` read from the precompute table at
//! `(step, y)`. The table is deterministic, so it is generated on the CPU
//! at band creation instead of being shipped as an asset.
//!
//! [`reference`] implements the identical pass schedule on the CPU. It
//! exists so the table contents and the pass ordering are testable: a
//! desynchronized ping-pong flag or a wrong table entry corrupts GPU
//! output silently, but fails the round-trip tests here loudly.

use crate::LOG_SIZE;

/// One table entry: inverse twiddle factor, first input row, and the sign
/// applied to the second input row (`index + h`).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ButterflyEntry {
    pub twiddle_re: f32,
    pub twiddle_im: f32,
    pub index: f32,
    pub sign: f32,
}

/// Generate the butterfly table for the standard 512 grid.
///
/// Layout is row-major for a `LOG_SIZE` x `RESOLUTION` RGBA32F texture:
/// entry `(step, y)` lives at `y * LOG_SIZE + step`.
pub fn precompute_table() -> Vec<ButterflyEntry> {
    precompute_table_sized(crate::RESOLUTION as usize)
}

/// Generate the butterfly table for an arbitrary power-of-two size.
pub fn precompute_table_sized(size: usize) -> Vec<ButterflyEntry> {
    assert!(size.is_power_of_two() && size >= 2);
    let log_size = size.trailing_zeros() as usize;

    let mut table = Vec::with_capacity(size * log_size);
    for y in 0..size {
        for step in 0..log_size {
            table.push(entry(size, step, y));
        }
    }
    table
}

fn entry(size: usize, step: usize, y: usize) -> ButterflyEntry {
    let h = size >> (step + 1);
    let m = h * 2;
    let j = y % m;

    if j < h {
        ButterflyEntry {
            twiddle_re: 1.0,
            twiddle_im: 0.0,
            index: y as f32,
            sign: 1.0,
        }
    } else {
        // Inverse transform: positive-exponent twiddle.
        let theta = 2.0 * std::f64::consts::PI * (j - h) as f64 / m as f64;
        ButterflyEntry {
            twiddle_re: theta.cos() as f32,
            twiddle_im: theta.sin() as f32,
            index: (y - h) as f32,
            sign: -1.0,
        }
    }
}

/// Number of entries in the standard table.
pub fn table_len() -> usize {
    crate::RESOLUTION as usize * LOG_SIZE as usize
}

/// Ping-pong read-target tracker for the butterfly passes.
///
/// The flag flips before every dispatch; a desync between the flag and
/// the step counter silently swaps which buffer holds live data. The
/// band recorder owns one of these per field and the tests pin down the
/// parity behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    reads_field: bool,
}

impl PingPong {
    /// Start of a field's pass sequence: the field texture holds the
    /// time-update output, so the first pass (after the flip) reads it.
    pub fn start() -> Self {
        Self { reads_field: false }
    }

    /// Flip before a dispatch; returns the flag value for this pass.
    pub fn flip(&mut self) -> bool {
        self.reads_field = !self.reads_field;
        self.reads_field
    }

    /// Whether the next pass would read the field texture.
    pub fn reads_field(&self) -> bool {
        self.reads_field
    }
}

/// CPU model of the GPU pass schedule.
pub mod reference {
    use super::ButterflyEntry;

    /// Complex value; f64 so the model contributes no error of its own.
    pub type Complex = (f64, f64);

    fn cmul(a: Complex, b: Complex) -> Complex {
        (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
    }

    fn cadd(a: Complex, b: Complex) -> Complex {
        (a.0 + b.0, a.1 + b.1)
    }

    fn cscale(s: f64, a: Complex) -> Complex {
        (s * a.0, s * a.1)
    }

    /// One butterfly pass over a 1D line, exactly as the shader computes it.
    pub fn butterfly_pass(
        table: &[ButterflyEntry],
        size: usize,
        step: usize,
        input: &[Complex],
    ) -> Vec<Complex> {
        let log_size = size.trailing_zeros() as usize;
        let h = size >> (step + 1);

        (0..size)
            .map(|y| {
                let e = table[y * log_size + step];
                let a = input[e.index as usize];
                let b = input[e.index as usize + h];
                let tw = (e.twiddle_re as f64, e.twiddle_im as f64);
                cmul(tw, cadd(a, cscale(e.sign as f64, b)))
            })
            .collect()
    }

    /// Bit reversal of `value` over `bits` bits.
    pub fn bit_reverse(value: usize, bits: u32) -> usize {
        value.reverse_bits() >> (usize::BITS - bits)
    }

    /// Unnormalized 1D inverse FFT: all butterfly passes, then the
    /// bit-reversal reorder.
    pub fn ifft_1d(table: &[ButterflyEntry], input: &[Complex]) -> Vec<Complex> {
        let size = input.len();
        let log_size = size.trailing_zeros();

        let mut data = input.to_vec();
        for step in 0..log_size as usize {
            data = butterfly_pass(table, size, step, &data);
        }

        (0..size)
            .map(|i| data[bit_reverse(i, log_size)])
            .collect()
    }

    /// Unnormalized 2D inverse FFT over a row-major grid, mirroring the
    /// GPU ordering: all horizontal passes, then all vertical passes,
    /// then one permute pass bit-reversing both coordinates.
    pub fn ifft_2d(table: &[ButterflyEntry], size: usize, grid: &[Complex]) -> Vec<Complex> {
        let log_size = size.trailing_zeros() as usize;
        let mut data = grid.to_vec();

        // Horizontal: each row independently, one step at a time across
        // the whole grid (matches one dispatch per step).
        for step in 0..log_size {
            let mut next = vec![(0.0, 0.0); size * size];
            for y in 0..size {
                let row: Vec<Complex> = (0..size).map(|x| data[y * size + x]).collect();
                let out = butterfly_pass(table, size, step, &row);
                for x in 0..size {
                    next[y * size + x] = out[x];
                }
            }
            data = next;
        }

        // Vertical passes.
        for step in 0..log_size {
            let mut next = vec![(0.0, 0.0); size * size];
            for x in 0..size {
                let col: Vec<Complex> = (0..size).map(|y| data[y * size + x]).collect();
                let out = butterfly_pass(table, size, step, &col);
                for y in 0..size {
                    next[y * size + x] = out[y];
                }
            }
            data = next;
        }

        // Permute: both axes at once.
        let bits = size.trailing_zeros();
        let mut out = vec![(0.0, 0.0); size * size];
        for y in 0..size {
            for x in 0..size {
                out[y * size + x] = data[bit_reverse(y, bits) * size + bit_reverse(x, bits)];
            }
        }
        out
    }

    /// Naive forward DFT, 1D. Test oracle only.
    pub fn dft_1d(input: &[Complex]) -> Vec<Complex> {
        let size = input.len();
        (0..size)
            .map(|k| {
                let mut acc = (0.0, 0.0);
                for (n, &value) in input.iter().enumerate() {
                    let theta = -2.0 * std::f64::consts::PI * (k * n) as f64 / size as f64;
                    acc = cadd(acc, cmul((theta.cos(), theta.sin()), value));
                }
                acc
            })
            .collect()
    }

    /// Naive forward DFT over a row-major 2D grid. Test oracle only.
    pub fn dft_2d(size: usize, grid: &[Complex]) -> Vec<Complex> {
        // Rows then columns; the DFT is separable.
        let mut data = vec![(0.0, 0.0); size * size];
        for y in 0..size {
            let row: Vec<Complex> = (0..size).map(|x| grid[y * size + x]).collect();
            let out = dft_1d(&row);
            for x in 0..size {
                data[y * size + x] = out[x];
            }
        }
        let mut out = vec![(0.0, 0.0); size * size];
        for x in 0..size {
            let col: Vec<Complex> = (0..size).map(|y| data[y * size + x]).collect();
            let col_out = dft_1d(&col);
            for y in 0..size {
                out[y * size + x] = col_out[y];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::reference::*;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn table_has_one_entry_per_step_and_row() {
        let table = precompute_table();
        assert_eq!(table.len(), table_len());
        assert_eq!(table.len(), 512 * 9);
    }

    #[test]
    fn first_step_pairs_grid_halves() {
        // step 0: h = size/2; even half adds, odd half subtracts with a
        // unit twiddle on row h (j - h = 0).
        let table = precompute_table_sized(8);
        let log = 3;

        let e0 = table[0]; // y = 0, step 0
        assert_eq!(e0, ButterflyEntry {
            twiddle_re: 1.0,
            twiddle_im: 0.0,
            index: 0.0,
            sign: 1.0,
        });

        let e4 = table[4 * log];
        assert_relative_eq!(e4.twiddle_re, 1.0);
        assert_relative_eq!(e4.twiddle_im, 0.0);
        assert_eq!(e4.index, 0.0);
        assert_eq!(e4.sign, -1.0);

        // y = 5: j - h = 1, twiddle = exp(+2*pi*i/8)
        let e5 = table[5 * log];
        let theta = 2.0 * std::f64::consts::PI / 8.0;
        assert_relative_eq!(e5.twiddle_re, theta.cos() as f32, epsilon = 1e-6);
        assert_relative_eq!(e5.twiddle_im, theta.sin() as f32, epsilon = 1e-6);
        assert_eq!(e5.index, 1.0);
    }

    #[test]
    fn ifft_1d_inverts_the_dft() {
        let size = 8;
        let table = precompute_table_sized(size);
        let signal: Vec<Complex> = (0..size)
            .map(|n| ((n as f64 * 0.37).sin(), (n as f64 * 0.91).cos()))
            .collect();

        let spectrum = dft_1d(&signal);
        let restored = ifft_1d(&table, &spectrum);

        // Unnormalized inverse: ifft(dft(x)) = size * x.
        for (r, s) in restored.iter().zip(signal.iter()) {
            assert_relative_eq!(r.0, size as f64 * s.0, epsilon = 1e-9);
            assert_relative_eq!(r.1, size as f64 * s.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn ifft_2d_round_trip() {
        let size = 64;
        let table = precompute_table_sized(size);
        let grid: Vec<Complex> = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                (
                    ((x * 3 + y) as f64 * 0.173).sin(),
                    ((x + 5 * y) as f64 * 0.081).cos(),
                )
            })
            .collect();

        let spectrum = dft_2d(size, &grid);
        let restored = ifft_2d(&table, size, &spectrum);

        let scale = (size * size) as f64;
        for (r, g) in restored.iter().zip(grid.iter()) {
            assert_relative_eq!(r.0, scale * g.0, epsilon = 1e-6);
            assert_relative_eq!(r.1, scale * g.1, epsilon = 1e-6);
        }
    }

    #[test]
    fn single_bin_produces_the_analytic_sinusoid() {
        // A unit amplitude in frequency bin (1, 0) must inverse-transform
        // to exp(2*pi*i*x/size), constant down each column.
        let size = 512usize;
        let table = precompute_table_sized(size);

        let mut spectrum = vec![(0.0, 0.0); size * size];
        spectrum[1] = (1.0, 0.0); // (x = 1, y = 0)

        let spatial = ifft_2d(&table, size, &spectrum);

        for y in (0..size).step_by(97) {
            for x in 0..size {
                let theta = 2.0 * std::f64::consts::PI * x as f64 / size as f64;
                let got = spatial[y * size + x];
                assert_relative_eq!(got.0, theta.cos(), epsilon = 1e-3);
                assert_relative_eq!(got.1, theta.sin(), epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn ping_pong_parity_restores_after_full_sequence() {
        // 9 horizontal + 9 vertical flips; even count, so the pointer
        // returns to its starting parity whatever that parity was.
        for start_reads_field in [false, true] {
            let mut pp = PingPong { reads_field: start_reads_field };
            for _ in 0..(2 * LOG_SIZE) {
                pp.flip();
            }
            assert_eq!(pp.reads_field(), start_reads_field);
        }
    }

    #[test]
    fn ping_pong_alternates_with_step() {
        let mut pp = PingPong::start();
        let flags: Vec<bool> = (0..6).map(|_| pp.flip()).collect();
        assert_eq!(flags, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn bit_reverse_is_an_involution() {
        for bits in [3u32, 6, 9] {
            for v in 0..(1usize << bits) {
                assert_eq!(bit_reverse(bit_reverse(v, bits), bits), v);
            }
        }
        assert_eq!(bit_reverse(1, 9), 256);
        assert_eq!(bit_reverse(3, 9), 384);
    }
}
