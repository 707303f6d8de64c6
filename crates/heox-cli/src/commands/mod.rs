pub mod build;
pub mod run;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
