//! Builds SVG path data from a finished QR code.

use hashbrown::HashMap;

use crate::types::{Color, ModuleType};
use crate::QrCode;

/// Collects the dark modules of the symbol into one SVG path string per
/// module type, scanning in row-major order. Types without a dark module
/// have no entry.
///
/// Keeping the paths separate lets the SVG writer give function patterns
/// their own fill color.
pub(crate) fn dark_module_paths(code: &QrCode) -> HashMap<ModuleType, String> {
    let mut paths: HashMap<ModuleType, String> = HashMap::new();
    let size = code.size();
    let colors = code.to_colors();
    for y in 0..size {
        for x in 0..size {
            if colors[y * size + x] == Color::Dark {
                let kind = code
                    .module_type(x, y)
                    .expect("coordinates are in bounds by construction");
                paths
                    .entry(kind)
                    .or_default()
                    .push_str(&format!("M{x},{y}h1v1h-1z"));
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::dark_module_paths;
    use crate::types::{EcLevel, Mask, ModuleType, Version};
    use crate::{ec, QrCode};

    fn sample_code() -> QrCode {
        let data = vec![0x55; ec::data_codewords(Version::MIN, EcLevel::L)];
        QrCode::with_codewords(Version::MIN, EcLevel::L, &data, Some(Mask::new(3).unwrap()))
            .unwrap()
    }

    #[test]
    fn test_one_cell_per_dark_module() {
        let code = sample_code();
        let paths = dark_module_paths(&code);
        let cells: usize = paths.values().map(|d| d.matches('M').count()).sum();
        let dark: usize = (0..code.size())
            .flat_map(|y| (0..code.size()).map(move |x| (x, y)))
            .filter(|&(x, y)| code.module(x, y).unwrap())
            .count();
        assert_eq!(cells, dark);
    }

    #[test]
    fn test_finder_path_starts_at_origin() {
        let code = sample_code();
        let paths = dark_module_paths(&code);
        let finder = &paths[&ModuleType::FinderPattern];
        assert!(finder.starts_with("M0,0h1v1h-1z"));
        // Version 1 has no alignment patterns or version info.
        assert!(!paths.contains_key(&ModuleType::AlignmentPattern));
        assert!(!paths.contains_key(&ModuleType::Version));
        assert!(paths.contains_key(&ModuleType::Data));
    }
}
