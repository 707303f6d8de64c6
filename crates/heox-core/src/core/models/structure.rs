use super::species::is_vacancy;
use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("Number of symbols ({symbols}) does not match number of positions ({positions})")]
    LengthMismatch { symbols: usize, positions: usize },
    #[error("Supercell repetitions must be positive, got {0:?}")]
    InvalidSupercell([usize; 3]),
}

/// Auxiliary per-frame metadata carried alongside a structure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StructureInfo {
    pub temperature: Option<f64>,
    pub step: Option<u64>,
    pub global_step: Option<u64>,
    pub energy: Option<f64>,
}

/// A periodic arrangement of labelled lattice sites.
///
/// This is the representation exchanged with the collaborators around the
/// simulation engine: the lattice builder produces it, the potential energy
/// evaluator consumes it, and the trajectory writer serializes it. The rows of
/// `cell` are the three lattice vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    symbols: Vec<String>,
    positions: Vec<Point3<f64>>,
    pub cell: Matrix3<f64>,
    pub pbc: [bool; 3],
    pub info: StructureInfo,
}

impl Structure {
    /// Creates a structure from per-site labels and Cartesian positions.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::LengthMismatch`] if the two sequences differ in length.
    pub fn new(
        symbols: Vec<String>,
        positions: Vec<Point3<f64>>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Result<Self, StructureError> {
        if symbols.len() != positions.len() {
            return Err(StructureError::LengthMismatch {
                symbols: symbols.len(),
                positions: positions.len(),
            });
        }
        Ok(Self {
            symbols,
            positions,
            cell,
            pbc,
            info: StructureInfo::default(),
        })
    }

    /// Assembles a structure from parts whose lengths are known to agree.
    pub(crate) fn from_trusted_parts(
        symbols: Vec<String>,
        positions: Vec<Point3<f64>>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Self {
        debug_assert_eq!(symbols.len(), positions.len());
        Self {
            symbols,
            positions,
            cell,
            pbc,
            info: StructureInfo::default(),
        }
    }

    pub fn with_info(mut self, info: StructureInfo) -> Self {
        self.info = info;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<String>,
        Vec<Point3<f64>>,
        Matrix3<f64>,
        [bool; 3],
        StructureInfo,
    ) {
        (self.symbols, self.positions, self.cell, self.pbc, self.info)
    }

    /// Returns a copy with every vacancy placeholder site removed.
    pub fn without_vacancies(&self) -> Structure {
        let (symbols, positions) = self
            .symbols
            .iter()
            .zip(&self.positions)
            .filter(|(s, _)| !is_vacancy(s))
            .map(|(s, p)| (s.clone(), *p))
            .unzip();
        Structure {
            symbols,
            positions,
            cell: self.cell,
            pbc: self.pbc,
            info: self.info,
        }
    }

    /// Tiles the structure `reps[i]` times along each lattice vector.
    pub fn repeat(&self, reps: [usize; 3]) -> Result<Structure, StructureError> {
        if reps.iter().any(|&r| r == 0) {
            return Err(StructureError::InvalidSupercell(reps));
        }
        let a = self.cell.row(0).transpose();
        let b = self.cell.row(1).transpose();
        let c = self.cell.row(2).transpose();

        let total = self.len() * reps.iter().product::<usize>();
        let mut symbols = Vec::with_capacity(total);
        let mut positions = Vec::with_capacity(total);
        for i in 0..reps[0] {
            for j in 0..reps[1] {
                for k in 0..reps[2] {
                    let shift = a * i as f64 + b * j as f64 + c * k as f64;
                    for (symbol, pos) in self.symbols.iter().zip(&self.positions) {
                        symbols.push(symbol.clone());
                        positions.push(pos + shift);
                    }
                }
            }
        }

        let mut cell = self.cell;
        for (axis, &r) in reps.iter().enumerate() {
            let scaled = cell.row(axis) * r as f64;
            cell.set_row(axis, &scaled);
        }

        Ok(Structure {
            symbols,
            positions,
            cell,
            pbc: self.pbc,
            info: self.info,
        })
    }

    /// Reorders sites so that labels are grouped alphabetically, keeping the
    /// relative order of sites that share a label.
    pub fn sort_by_symbol(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&i, &j| self.symbols[i].cmp(&self.symbols[j]));
        self.symbols = order.iter().map(|&i| self.symbols[i].clone()).collect();
        self.positions = order.iter().map(|&i| self.positions[i]).collect();
    }

    /// Shortest displacement from site `i` to site `j` under the minimum-image
    /// convention along periodic axes.
    pub fn minimum_image(&self, i: usize, j: usize) -> Vector3<f64> {
        let delta = self.positions[j] - self.positions[i];
        self.wrap_displacement(delta)
    }

    pub fn wrap_displacement(&self, delta: Vector3<f64>) -> Vector3<f64> {
        let basis = self.cell.transpose();
        let Some(inverse) = basis.try_inverse() else {
            return delta;
        };
        let mut frac = inverse * delta;
        for axis in 0..3 {
            if self.pbc[axis] {
                frac[axis] -= frac[axis].round();
            }
        }
        basis * frac
    }

    pub fn volume(&self) -> f64 {
        self.cell.determinant().abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Matrix3<f64> {
        Matrix3::from_diagonal_element(a)
    }

    fn two_site_structure() -> Structure {
        Structure::new(
            vec!["Mg".into(), "O".into()],
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            cubic(2.0),
            [true; 3],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_mismatched_lengths() {
        let result = Structure::new(vec!["Mg".into()], vec![], cubic(1.0), [true; 3]);
        assert_eq!(
            result.unwrap_err(),
            StructureError::LengthMismatch {
                symbols: 1,
                positions: 0
            }
        );
    }

    #[test]
    fn without_vacancies_strips_placeholder_sites() {
        let s = Structure::new(
            vec!["Mg".into(), "X".into(), "O".into()],
            vec![Point3::origin(); 3],
            cubic(1.0),
            [true; 3],
        )
        .unwrap();
        let stripped = s.without_vacancies();
        assert_eq!(stripped.symbols(), &["Mg".to_string(), "O".to_string()]);
        assert_eq!(stripped.len(), 2);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn repeat_multiplies_sites_and_scales_cell() {
        let s = two_site_structure();
        let big = s.repeat([2, 1, 3]).unwrap();
        assert_eq!(big.len(), 12);
        assert_eq!(big.cell[(0, 0)], 4.0);
        assert_eq!(big.cell[(1, 1)], 2.0);
        assert_eq!(big.cell[(2, 2)], 6.0);
        assert!((big.volume() - 48.0).abs() < 1e-12);
    }

    #[test]
    fn repeat_rejects_zero_repetitions() {
        let s = two_site_structure();
        assert!(matches!(
            s.repeat([1, 0, 1]),
            Err(StructureError::InvalidSupercell(_))
        ));
    }

    #[test]
    fn sort_by_symbol_groups_labels_stably() {
        let mut s = Structure::new(
            vec!["O".into(), "Mg".into(), "O".into(), "Mg".into()],
            (0..4).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect(),
            cubic(10.0),
            [true; 3],
        )
        .unwrap();
        s.sort_by_symbol();
        assert_eq!(s.symbols(), &["Mg", "Mg", "O", "O"].map(String::from)[..]);
        assert_eq!(s.positions()[0].x, 1.0);
        assert_eq!(s.positions()[1].x, 3.0);
        assert_eq!(s.positions()[2].x, 0.0);
    }

    #[test]
    fn minimum_image_wraps_across_periodic_boundary() {
        let s = Structure::new(
            vec!["A".into(), "B".into()],
            vec![Point3::new(0.1, 0.0, 0.0), Point3::new(1.9, 0.0, 0.0)],
            cubic(2.0),
            [true; 3],
        )
        .unwrap();
        let d = s.minimum_image(0, 1);
        assert!((d.x + 0.2).abs() < 1e-12);
    }

    #[test]
    fn minimum_image_respects_non_periodic_axes() {
        let s = Structure::new(
            vec!["A".into(), "B".into()],
            vec![Point3::new(0.1, 0.0, 0.0), Point3::new(1.9, 0.0, 0.0)],
            cubic(2.0),
            [false; 3],
        )
        .unwrap();
        let d = s.minimum_image(0, 1);
        assert!((d.x - 1.8).abs() < 1e-12);
    }
}
