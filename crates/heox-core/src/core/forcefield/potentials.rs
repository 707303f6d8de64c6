const OVERLAP_DISTANCE: f64 = 1e-6;
const OVERLAP_ENERGY: f64 = 1e10;

#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < OVERLAP_DISTANCE {
        return OVERLAP_ENERGY;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

/// Radial derivative dE/dr of [`lennard_jones_12_6`].
#[inline]
pub fn lennard_jones_12_6_derivative(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < OVERLAP_DISTANCE {
        return 0.0;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    12.0 * well_depth * (rho6 - rho12) / dist
}

#[inline]
pub fn buckingham_exp_6(dist: f64, r_min: f64, well_depth: f64, gamma: f64) -> f64 {
    if dist < OVERLAP_DISTANCE {
        return OVERLAP_ENERGY;
    }
    let rho = dist / r_min;
    if rho < 0.1 {
        return OVERLAP_ENERGY;
    }

    let factor = gamma / (gamma - 6.0);
    well_depth * (6.0 / (gamma - 6.0) * (gamma * (1.0 - rho)).exp() - factor * rho.powi(-6))
}

/// Radial derivative dE/dr of [`buckingham_exp_6`].
#[inline]
pub fn buckingham_exp_6_derivative(dist: f64, r_min: f64, well_depth: f64, gamma: f64) -> f64 {
    if dist < OVERLAP_DISTANCE {
        return 0.0;
    }
    let rho = dist / r_min;
    if rho < 0.1 {
        return -OVERLAP_ENERGY;
    }

    let factor = 6.0 * gamma / (gamma - 6.0);
    well_depth * factor * (rho.powi(-7) - (gamma * (1.0 - rho)).exp()) / r_min
}
