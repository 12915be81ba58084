use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use crate::analyzers::Classification;
use crate::types::AnalysisDepth;

/// Decides which ranked files the preprocessing phase visits.
#[derive(Debug)]
pub enum FileSampler {
    /// Every file is processed.
    All,
    /// Non-essential files are kept with a fixed probability.
    Random { rng: StdRng, keep_probability: f64 },
}

impl FileSampler {
    /// `quick` samples; `standard` and `deep` keep everything.
    ///
    /// Without a seed the generator is seeded from entropy.
    pub fn for_depth(depth: AnalysisDepth, seed: Option<u64>, keep_probability: f64) -> Self {
        if !depth.samples_files() {
            return FileSampler::All;
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        FileSampler::Random {
            rng,
            keep_probability: keep_probability.clamp(0.0, 1.0),
        }
    }

    pub fn keep(&mut self, essential: bool) -> bool {
        match self {
            FileSampler::All => true,
            FileSampler::Random { .. } if essential => true,
            FileSampler::Random { rng, keep_probability } => rng.gen_bool(*keep_probability),
        }
    }
}

/// Entry points, config files and the primary README are never sampled away.
pub fn essential_files(classification: &Classification) -> HashSet<String> {
    classification
        .entry_points
        .iter()
        .chain(&classification.config_files)
        .chain(classification.readme_path.iter())
        .cloned()
        .collect()
}
