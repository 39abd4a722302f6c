//! Lens-model records handed to the renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Keyword arguments of one profile, e.g. `Rs`, `alpha_Rs`, `center_x`.
pub type ProfileKwargs = BTreeMap<String, f64>;

/// Profile tag of a truncated NFW lens.
pub const TNFW: &str = "TNFW";
/// Profile tag of a Sersic light profile.
pub const SERSIC: &str = "SERSIC";

/// Consumer of drawn lens and light profiles.
///
/// Each call appends parallel lists: the `i`-th model tag goes with the
/// `i`-th kwargs map (and redshift, for lenses).
pub trait LensModelSink {
    fn add_lenses(&mut self, models: Vec<String>, kwargs: Vec<ProfileKwargs>, redshifts: Vec<f64>);

    fn add_lens_light(&mut self, models: Vec<String>, kwargs: Vec<ProfileKwargs>);
}

/// In-memory accumulator of everything appended by a draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LensingInputs {
    pub lens_models: Vec<String>,
    pub lens_kwargs: Vec<ProfileKwargs>,
    pub lens_redshifts: Vec<f64>,
    pub light_models: Vec<String>,
    pub light_kwargs: Vec<ProfileKwargs>,
}

impl LensingInputs {
    #[must_use]
    pub const fn n_lenses(&self) -> usize {
        self.lens_models.len()
    }

    #[must_use]
    pub const fn n_lights(&self) -> usize {
        self.light_models.len()
    }
}

impl LensModelSink for LensingInputs {
    fn add_lenses(&mut self, models: Vec<String>, kwargs: Vec<ProfileKwargs>, redshifts: Vec<f64>) {
        self.lens_models.extend(models);
        self.lens_kwargs.extend(kwargs);
        self.lens_redshifts.extend(redshifts);
    }

    fn add_lens_light(&mut self, models: Vec<String>, kwargs: Vec<ProfileKwargs>) {
        self.light_models.extend(models);
        self.light_kwargs.extend(kwargs);
    }
}
