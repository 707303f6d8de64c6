use rand::{Rng, RngCore};

/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV_PER_K: f64 = 8.617333262e-5;

/// Metropolis acceptance probability `min(1, exp(-(ΔE - μ) / (kB T)))`.
///
/// `chemical_potential` is zero for canonical moves. The temperature must be
/// positive; a zero temperature is a caller error.
#[inline]
pub fn acceptance_probability(delta_energy: f64, chemical_potential: f64, temperature: f64) -> f64 {
    debug_assert!(
        temperature > 0.0,
        "Metropolis criterion requires a positive temperature"
    );
    (-(delta_energy - chemical_potential) / (BOLTZMANN_EV_PER_K * temperature))
        .exp()
        .min(1.0)
}

/// Draws a uniform number in `[0, 1)` and accepts when it falls below the
/// acceptance probability.
#[inline]
pub fn accept(
    delta_energy: f64,
    chemical_potential: f64,
    temperature: f64,
    rng: &mut dyn RngCore,
) -> bool {
    let p = acceptance_probability(delta_energy, chemical_potential, temperature);
    rng.r#gen::<f64>() < p
}
