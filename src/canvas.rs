//! The `canvas` module paints function patterns and codeword bits onto the
//! module grid, applies the mask, and scores mask candidates.

use crate::ec;
use crate::types::{Color, EcLevel, Mask, ModuleType, Version};

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

/// Returns the centers of the alignment patterns of the given version, in
/// ascending order. The same positions are used on both axes. Version 1
/// has no alignment patterns.
pub fn alignment_pattern_positions(version: Version) -> Vec<i32> {
    let v = i32::from(version.value());
    if v == 1 {
        return vec![];
    }
    let num_align = v / 7 + 2;
    let step = if v == 32 {
        // The only version whose spacing does not follow the rounding rule.
        26
    } else {
        (v * 4 + num_align * 2 + 1) / (num_align * 2 - 2) * 2
    };
    let size = v * 4 + 17;
    let mut result = vec![6];
    for i in 1..num_align {
        result.push(size - 7 - (num_align - 1 - i) * step);
    }
    result
}

/// The 15-bit format sequence for the given level and mask: a BCH(15,5)
/// code over generator 0x537, XOR-masked with 0x5412.
pub(crate) fn format_bit_sequence(ec_level: EcLevel, mask: Mask) -> u32 {
    let data = ec_level.format_bits() << 3 | u32::from(mask.value());
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    let bits = (data << 10 | rem) ^ 0x5412;
    debug_assert_eq!(bits >> 15, 0);
    bits
}

/// The 18-bit version sequence for versions 7 and up: the version number
/// followed by its BCH remainder over generator 0x1F25.
pub(crate) fn version_bit_sequence(version: Version) -> u32 {
    let v = u32::from(version.value());
    let mut rem = v;
    for _ in 0..12 {
        rem = (rem << 1) ^ ((rem >> 11) * 0x1F25);
    }
    let bits = v << 12 | rem;
    debug_assert_eq!(bits >> 18, 0);
    bits
}

fn bit(value: u32, index: i32) -> Color {
    if (value >> index) & 1 != 0 {
        Color::Dark
    } else {
        Color::Light
    }
}

/// The mutable module grid a symbol is built on.
///
/// The type grid doubles as the function-module shadow: every cell whose
/// type is not [`ModuleType::Data`] is exempt from data placement and
/// masking.
#[derive(Debug, Clone)]
pub struct Canvas {
    version: Version,
    ec_level: EcLevel,
    size: i32,
    modules: Vec<Color>,
    types: Vec<ModuleType>,
}

impl Canvas {
    /// Constructs a blank canvas: all modules light, all typed as data.
    pub fn new(version: Version, ec_level: EcLevel) -> Self {
        let size = version.size();
        Self {
            version,
            ec_level,
            size: size as i32,
            modules: vec![Color::Light; size * size],
            types: vec![ModuleType::Data; size * size],
        }
    }

    fn index(&self, x: i32, y: i32) -> usize {
        debug_assert!(0 <= x && x < self.size && 0 <= y && y < self.size);
        (y * self.size + x) as usize
    }

    fn get(&self, x: i32, y: i32) -> Color {
        self.modules[self.index(x, y)]
    }

    fn is_dark(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == Color::Dark
    }

    fn is_function(&self, x: i32, y: i32) -> bool {
        self.types[self.index(x, y)].is_function()
    }

    /// Sets the color of a data module; the type stays `Data`.
    fn put(&mut self, x: i32, y: i32, color: Color) {
        let index = self.index(x, y);
        self.modules[index] = color;
    }

    /// Sets the color of a module and records the function pattern it
    /// belongs to. A later drawing overwrites both.
    fn put_function(&mut self, x: i32, y: i32, color: Color, kind: ModuleType) {
        let index = self.index(x, y);
        self.modules[index] = color;
        self.types[index] = kind;
    }

    /*---- Function patterns ----*/

    /// Draws every function pattern: timing, finders with separators,
    /// alignment patterns, format bits (with a dummy mask, overwritten
    /// once the mask is chosen) and version information.
    pub fn draw_all_functional_patterns(&mut self) {
        self.draw_timing_patterns();
        self.draw_finder_pattern(3, 3);
        self.draw_finder_pattern(self.size - 4, 3);
        self.draw_finder_pattern(3, self.size - 4);
        self.draw_alignment_patterns();
        self.draw_format_bits(Mask(0));
        self.draw_version_info();
    }

    fn draw_timing_patterns(&mut self) {
        for i in 0..self.size {
            let color = if i % 2 == 0 { Color::Dark } else { Color::Light };
            self.put_function(i, 6, color, ModuleType::HorizontalTiming);
            self.put_function(6, i, color, ModuleType::VerticalTiming);
        }
    }

    /// Draws a finder pattern plus its separator ring, centered at
    /// (x, y). The region is 9×9 but clipped at the grid edges.
    fn draw_finder_pattern(&mut self, x: i32, y: i32) {
        for dy in -4..=4 {
            for dx in -4..=4 {
                let xx = x + dx;
                let yy = y + dy;
                if 0 <= xx && xx < self.size && 0 <= yy && yy < self.size {
                    let distance = dx.abs().max(dy.abs()); // Chebyshev norm
                    let color = if distance == 2 || distance == 4 {
                        Color::Light
                    } else {
                        Color::Dark
                    };
                    self.put_function(xx, yy, color, ModuleType::FinderPattern);
                }
            }
        }
    }

    fn draw_alignment_patterns(&mut self) {
        let positions = alignment_pattern_positions(self.version);
        let count = positions.len();
        for (i, &y) in positions.iter().enumerate() {
            for (j, &x) in positions.iter().enumerate() {
                // The three corners coincide with finder patterns.
                if i == 0 && j == 0
                    || i == 0 && j == count - 1
                    || i == count - 1 && j == 0
                {
                    continue;
                }
                self.draw_alignment_pattern(x, y);
            }
        }
    }

    /// Draws a 5×5 alignment pattern centered at (x, y).
    fn draw_alignment_pattern(&mut self, x: i32, y: i32) {
        for dy in -2i32..=2 {
            for dx in -2i32..=2 {
                let color = if dx.abs().max(dy.abs()) == 1 {
                    Color::Light
                } else {
                    Color::Dark
                };
                self.put_function(x + dx, y + dy, color, ModuleType::AlignmentPattern);
            }
        }
    }

    /// Draws both copies of the format bits for the given mask, plus the
    /// fixed dark module. Placement follows ISO/IEC 18004:2006 §8.9.
    fn draw_format_bits(&mut self, mask: Mask) {
        let bits = format_bit_sequence(self.ec_level, mask);
        let size = self.size;
        let kind = ModuleType::Format;

        // First copy, bent around the top-left finder.
        for i in 0..6 {
            self.put_function(8, i, bit(bits, i), kind);
        }
        self.put_function(8, 7, bit(bits, 6), kind);
        self.put_function(8, 8, bit(bits, 7), kind);
        self.put_function(7, 8, bit(bits, 8), kind);
        for i in 9..15 {
            self.put_function(14 - i, 8, bit(bits, i), kind);
        }

        // Second copy, split between the two remaining finders.
        for i in 0..8 {
            self.put_function(size - 1 - i, 8, bit(bits, i), kind);
        }
        for i in 8..15 {
            self.put_function(8, size - 15 + i, bit(bits, i), kind);
        }
        self.put_function(8, size - 8, Color::Dark, kind);
    }

    /// Draws both copies of the version information (versions 7 and up):
    /// two 6×3 blocks next to the top-right and bottom-left finders.
    fn draw_version_info(&mut self) {
        if self.version.value() < 7 {
            return;
        }
        let bits = version_bit_sequence(self.version);
        for i in 0..18 {
            let color = bit(bits, i);
            let a = self.size - 11 + i % 3;
            let b = i / 3;
            self.put_function(a, b, color, ModuleType::Version);
            self.put_function(b, a, color, ModuleType::Version);
        }
    }

    /*---- Codeword placement and masking ----*/

    /// Writes the interleaved data and error correction codewords into the
    /// non-function modules, zig-zagging column pairs from the right.
    /// Up to 7 remainder cells stay light.
    pub fn draw_data(&mut self, data: &[u8], ec_data: &[u8]) {
        debug_assert_eq!(
            data.len() + ec_data.len(),
            ec::raw_modules(self.version) / 8
        );
        let mut bits = data
            .iter()
            .chain(ec_data.iter())
            .flat_map(|byte| (0..8).rev().map(move |i| (*byte >> i) & 1 != 0));

        let mut right = self.size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5; // Column 6 is the vertical timing pattern.
            }
            for vert in 0..self.size {
                for j in 0..2 {
                    let x = right - j;
                    let upward = (right + 1) & 2 == 0;
                    let y = if upward { self.size - 1 - vert } else { vert };
                    if !self.is_function(x, y) {
                        if let Some(dark) = bits.next() {
                            let color = if dark { Color::Dark } else { Color::Light };
                            self.put(x, y, color);
                        }
                    }
                }
            }
            right -= 2;
        }
        debug_assert!(bits.next().is_none());
    }

    /// XORs the mask pattern into the data modules. Applying the same mask
    /// twice restores the previous state, which the automatic selection
    /// relies on.
    fn apply_mask(&mut self, mask: Mask) {
        for y in 0..self.size {
            for x in 0..self.size {
                if mask_predicate(mask, x, y) && !self.is_function(x, y) {
                    let index = self.index(x, y);
                    self.modules[index] = !self.modules[index];
                }
            }
        }
    }

    /// Applies the requested mask, or scores all eight and applies the one
    /// with the lowest penalty (ties go to the lowest number). Either way
    /// the format bits are redrawn to match, and the applied mask is
    /// returned.
    pub fn apply_best_mask(&mut self, requested: Option<Mask>) -> Mask {
        let mask = match requested {
            Some(mask) => mask,
            None => self.choose_mask(),
        };
        self.draw_format_bits(mask);
        self.apply_mask(mask);
        mask
    }

    fn choose_mask(&mut self) -> Mask {
        let mut best = Mask(0);
        let mut min_penalty = i32::MAX;
        for value in 0..8 {
            let mask = Mask(value);
            self.draw_format_bits(mask);
            self.apply_mask(mask);
            let penalty = self.penalty_score();
            if penalty < min_penalty {
                best = mask;
                min_penalty = penalty;
            }
            self.apply_mask(mask); // XOR undoes the trial.
        }
        best
    }

    /// The penalty score of the current modules, used to compare mask
    /// candidates. Rows and columns are treated symmetrically.
    pub(crate) fn penalty_score(&self) -> i32 {
        let size = self.size;
        let mut result: i32 = 0;

        // Runs of same-colored modules in rows, and finder-like patterns.
        for y in 0..size {
            let mut run_color = false;
            let mut run_len: i32 = 0;
            let mut history = FinderPenalty::new(size);
            for x in 0..size {
                if self.is_dark(x, y) == run_color {
                    run_len += 1;
                    if run_len == 5 {
                        result += PENALTY_N1;
                    } else if run_len > 5 {
                        result += 1;
                    }
                } else {
                    history.add_run(run_len);
                    if !run_color {
                        result += history.count_patterns() * PENALTY_N3;
                    }
                    run_color = self.is_dark(x, y);
                    run_len = 1;
                }
            }
            result += history.terminate_and_count(run_color, run_len) * PENALTY_N3;
        }

        // The same for columns.
        for x in 0..size {
            let mut run_color = false;
            let mut run_len: i32 = 0;
            let mut history = FinderPenalty::new(size);
            for y in 0..size {
                if self.is_dark(x, y) == run_color {
                    run_len += 1;
                    if run_len == 5 {
                        result += PENALTY_N1;
                    } else if run_len > 5 {
                        result += 1;
                    }
                } else {
                    history.add_run(run_len);
                    if !run_color {
                        result += history.count_patterns() * PENALTY_N3;
                    }
                    run_color = self.is_dark(x, y);
                    run_len = 1;
                }
            }
            result += history.terminate_and_count(run_color, run_len) * PENALTY_N3;
        }

        // 2×2 blocks of identical color; overlapping windows all count.
        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color = self.is_dark(x, y);
                if color == self.is_dark(x + 1, y)
                    && color == self.is_dark(x, y + 1)
                    && color == self.is_dark(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }

        // Dark/light balance. The size is odd, so the ratio is never
        // exactly 1/2 and k stays non-negative.
        let dark: i32 = self.modules.iter().map(|c| c.select(1, 0)).sum();
        let total = size * size;
        let k = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        debug_assert!((0..=9).contains(&k));
        result + k * PENALTY_N4
    }

    /// Consumes the canvas into its color and type grids.
    pub fn into_grids(self) -> (Vec<Color>, Vec<ModuleType>) {
        (self.modules, self.types)
    }
}

fn mask_predicate(mask: Mask, x: i32, y: i32) -> bool {
    match mask.value() {
        0 => (x + y) % 2 == 0,
        1 => y % 2 == 0,
        2 => x % 3 == 0,
        3 => (x + y) % 3 == 0,
        4 => (x / 3 + y / 2) % 2 == 0,
        5 => x * y % 2 + x * y % 3 == 0,
        6 => (x * y % 2 + x * y % 3) % 2 == 0,
        7 => ((x + y) % 2 + x * y % 3) % 2 == 0,
        _ => unreachable!(),
    }
}

/// Sliding window over the last seven run lengths of a line, used to spot
/// the 1:1:3:1:1 finder-like pattern with its light flanks. A synthetic
/// light run as long as the symbol is accounted at both ends of the line.
struct FinderPenalty {
    size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: i32) -> Self {
        Self {
            size,
            run_history: [0; 7],
        }
    }

    /// Pushes a finished run to the front of the history.
    fn add_run(&mut self, mut length: i32) {
        if self.run_history[0] == 0 {
            length += self.size; // Light border before the first run.
        }
        let history = &mut self.run_history;
        for i in (0..history.len() - 1).rev() {
            history[i + 1] = history[i];
        }
        history[0] = length;
    }

    /// Counts finder-like patterns ending at the current position. Must be
    /// called immediately after a light run was added; returns 0, 1 or 2.
    fn count_patterns(&self) -> i32 {
        let history = &self.run_history;
        let n = history[1];
        debug_assert!(n <= self.size * 3);
        let core = n > 0
            && history[2] == n
            && history[3] == n * 3
            && history[4] == n
            && history[5] == n;
        i32::from(core && history[0] >= n * 4 && history[6] >= n)
            + i32::from(core && history[6] >= n * 4 && history[0] >= n)
    }

    /// Flushes the final run and counts patterns touching the end of the
    /// line.
    fn terminate_and_count(mut self, current_color: bool, mut current_len: i32) -> i32 {
        if current_color {
            self.add_run(current_len);
            current_len = 0;
        }
        current_len += self.size; // Light border after the last run.
        self.add_run(current_len);
        self.count_patterns()
    }
}

#[cfg(test)]
mod position_tests {
    use super::alignment_pattern_positions;
    use crate::types::Version;

    fn positions(v: u8) -> Vec<i32> {
        alignment_pattern_positions(Version::new(v).unwrap())
    }

    #[test]
    fn test_against_iso_annex_e() {
        assert_eq!(positions(1), Vec::<i32>::new());
        assert_eq!(positions(2), vec![6, 18]);
        assert_eq!(positions(7), vec![6, 22, 38]);
        assert_eq!(positions(16), vec![6, 26, 50, 74]);
        assert_eq!(positions(32), vec![6, 34, 60, 86, 112, 138]);
        assert_eq!(positions(40), vec![6, 30, 58, 86, 114, 142, 170]);
    }

    #[test]
    fn test_positions_fit_grid() {
        for v in 2..=40 {
            let version = Version::new(v).unwrap();
            let list = positions(v);
            assert_eq!(list.len(), usize::from(v / 7 + 2));
            assert_eq!(list[0], 6);
            assert_eq!(*list.last().unwrap(), version.size() as i32 - 7);
            assert!(list.windows(2).all(|w| w[0] < w[1]));
        }
    }
}


#[cfg(test)]
mod canvas_tests {
    use super::Canvas;
    use crate::ec;
    use crate::types::{Color, EcLevel, Mask, ModuleType, Version};

    fn functional_canvas(v: u8) -> Canvas {
        let mut canvas = Canvas::new(Version::new(v).unwrap(), EcLevel::M);
        canvas.draw_all_functional_patterns();
        canvas
    }

    fn drawn_canvas(v: u8, ec_level: EcLevel) -> Canvas {
        let version = Version::new(v).unwrap();
        let mut canvas = Canvas::new(version, ec_level);
        canvas.draw_all_functional_patterns();
        let data: Vec<u8> = (0..ec::data_codewords(version, ec_level))
            .map(|i| (i * 89 + 41) as u8)
            .collect();
        let (data_stream, ecc_stream) = ec::construct_codewords(&data, version, ec_level).unwrap();
        canvas.draw_data(&data_stream, &ecc_stream);
        canvas
    }

    #[test]
    fn test_data_module_count_matches_capacity() {
        // The number of cells left untyped after all function patterns
        // must equal the raw module count derived arithmetically.
        for v in [1_u8, 2, 6, 7, 14, 21, 32, 40] {
            let version = Version::new(v).unwrap();
            let canvas = functional_canvas(v);
            let data_cells = canvas
                .types
                .iter()
                .filter(|t| **t == ModuleType::Data)
                .count();
            assert_eq!(data_cells, ec::raw_modules(version), "version {v}");
        }
    }

    #[test]
    fn test_finder_and_separator_geometry() {
        let canvas = functional_canvas(1);
        // Corner and center of the top-left finder are dark.
        assert_eq!(canvas.get(0, 0), Color::Dark);
        assert_eq!(canvas.get(3, 3), Color::Dark);
        // The inner light ring and the separator.
        assert_eq!(canvas.get(1, 1), Color::Light);
        assert_eq!(canvas.get(7, 7), Color::Light);
        assert_eq!(canvas.types[canvas.index(7, 7)], ModuleType::FinderPattern);
        // All three corners carry a finder; 8×8 cells each survive clipping.
        let finder_cells = canvas
            .types
            .iter()
            .filter(|t| **t == ModuleType::FinderPattern)
            .count();
        assert_eq!(finder_cells, 3 * 64);
    }

    #[test]
    fn test_timing_patterns() {
        let canvas = functional_canvas(1);
        for i in 8..13 {
            let expected = if i % 2 == 0 { Color::Dark } else { Color::Light };
            assert_eq!(canvas.get(i, 6), expected);
            assert_eq!(canvas.get(6, i), expected);
            assert_eq!(canvas.types[canvas.index(i, 6)], ModuleType::HorizontalTiming);
            assert_eq!(canvas.types[canvas.index(6, i)], ModuleType::VerticalTiming);
        }
    }

    #[test]
    fn test_alignment_pattern_overlaps_timing() {
        // Version 7 places alignment patterns centered on the timing
        // lines; those cells are retagged and the colors coincide.
        let canvas = functional_canvas(7);
        assert_eq!(canvas.types[canvas.index(22, 6)], ModuleType::AlignmentPattern);
        assert_eq!(canvas.get(22, 6), Color::Dark);
        assert_eq!(canvas.get(21, 6), Color::Light);
    }

    #[test]
    fn test_version_info_cells() {
        let canvas = functional_canvas(7);
        let version_cells = canvas
            .types
            .iter()
            .filter(|t| **t == ModuleType::Version)
            .count();
        assert_eq!(version_cells, 36);
        assert!(functional_canvas(6)
            .types
            .iter()
            .all(|t| *t != ModuleType::Version));
    }

    #[test]
    fn test_dark_module() {
        let canvas = functional_canvas(2);
        let size = canvas.size;
        assert_eq!(canvas.get(8, size - 8), Color::Dark);
        assert_eq!(canvas.types[canvas.index(8, size - 8)], ModuleType::Format);
    }

    #[test]
    fn test_format_cell_count() {
        let canvas = functional_canvas(1);
        let format_cells = canvas
            .types
            .iter()
            .filter(|t| **t == ModuleType::Format)
            .count();
        // Two 15-bit copies plus the dark module.
        assert_eq!(format_cells, 31);
    }

    #[test]
    fn test_mask_involution() {
        let mut canvas = drawn_canvas(3, EcLevel::Q);
        for value in 0..8 {
            let before = canvas.modules.clone();
            canvas.apply_mask(Mask(value));
            assert_ne!(canvas.modules, before);
            canvas.apply_mask(Mask(value));
            assert_eq!(canvas.modules, before);
        }
    }

    #[test]
    fn test_mask_preserves_function_modules() {
        let mut canvas = drawn_canvas(2, EcLevel::L);
        let before = canvas.clone();
        canvas.apply_mask(Mask(0));
        for y in 0..canvas.size {
            for x in 0..canvas.size {
                if canvas.is_function(x, y) {
                    assert_eq!(canvas.get(x, y), before.get(x, y));
                }
            }
        }
    }

    #[test]
    fn test_auto_mask_minimizes_penalty() {
        let canvas = drawn_canvas(2, EcLevel::M);

        // Score every mask the way the selection loop does.
        let mut scores = [0_i32; 8];
        for value in 0..8 {
            let mut trial = canvas.clone();
            trial.draw_format_bits(Mask(value));
            trial.apply_mask(Mask(value));
            scores[value as usize] = trial.penalty_score();
        }
        // First index with the minimal score, matching the tie-break.
        let mut best = 0_u8;
        for value in 1..8_u8 {
            if scores[usize::from(value)] < scores[usize::from(best)] {
                best = value;
            }
        }

        let mut auto = canvas.clone();
        let chosen = auto.apply_best_mask(None);
        assert_eq!(chosen, Mask(best));
        assert_eq!(auto.penalty_score(), scores[best as usize]);
    }

    #[test]
    fn test_masking_does_not_retag() {
        let mut canvas = drawn_canvas(2, EcLevel::M);
        let types_before = canvas.types.clone();
        canvas.apply_best_mask(None);
        assert_eq!(canvas.types, types_before);
    }
}
