// src/algorithms/sampler.rs

use crate::core::{Dataset, Instance, PerturbationKind, PerturbationSet, Result, TrustError};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// How synthetic neighbours of an instance are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerturbationMode {
    /// `instance + noise_scale * N(0, 1)` per feature. Values are not
    /// clipped to the observation space.
    Additive { noise_scale: f64 },
    /// `mask ⊙ instance` with binary masks. With `cardinality = Some(k)`
    /// every mask has exactly `k` ones, otherwise each entry is a fair coin.
    Mask { cardinality: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct PerturbationSampler {
    rng: StdRng,
}

impl PerturbationSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        PerturbationSampler { rng }
    }

    pub fn sample(
        &mut self,
        instance: &Instance,
        count: usize,
        mode: PerturbationMode,
    ) -> Result<PerturbationSet> {
        if count == 0 {
            return Err(TrustError::InvalidArgument(
                "Number of perturbation samples must be positive.".to_string(),
            ));
        }
        match mode {
            PerturbationMode::Additive { noise_scale } => {
                Ok(self.additive(instance, count, noise_scale))
            }
            PerturbationMode::Mask { cardinality } => self.masked(instance, count, cardinality),
        }
    }

    fn additive(&mut self, instance: &Instance, count: usize, noise_scale: f64) -> PerturbationSet {
        let d = instance.len();
        let rng = &mut self.rng;
        let samples = Dataset::from_shape_fn((count, d), |(_, j)| {
            let noise: f64 = rng.sample(StandardNormal);
            instance[j] + noise * noise_scale
        });
        log::debug!(
            "drew {} additive perturbations over {} features (noise scale {})",
            count,
            d,
            noise_scale
        );
        PerturbationSet {
            kind: PerturbationKind::Additive,
            samples,
            masks: None,
        }
    }

    fn masked(
        &mut self,
        instance: &Instance,
        count: usize,
        cardinality: Option<usize>,
    ) -> Result<PerturbationSet> {
        let d = instance.len();
        let mut masks = Dataset::zeros((count, d));

        match cardinality {
            Some(k) => {
                if k > d {
                    return Err(TrustError::InvalidArgument(format!(
                        "Mask cardinality {} exceeds the number of features {}.",
                        k, d
                    )));
                }
                for mut row in masks.rows_mut() {
                    for idx in index::sample(&mut self.rng, d, k).iter() {
                        row[idx] = 1.0;
                    }
                }
            }
            None => {
                for value in masks.iter_mut() {
                    if self.rng.gen_bool(0.5) {
                        *value = 1.0;
                    }
                }
            }
        }

        let samples = &masks * instance;
        log::debug!(
            "drew {} binary masks over {} features (cardinality {:?})",
            count,
            d,
            cardinality
        );
        Ok(PerturbationSet {
            kind: PerturbationKind::Multiplicative,
            samples,
            masks: Some(masks),
        })
    }
}
