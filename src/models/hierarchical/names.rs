//! Parameter names used by the lens-modeling training pipeline.

pub const THETA_E: &str = "main_deflector_parameters_theta_E";
pub const GAMMA: &str = "main_deflector_parameters_gamma";
pub const GAMMA1: &str = "main_deflector_parameters_gamma1";
pub const GAMMA2: &str = "main_deflector_parameters_gamma2";
pub const E1: &str = "main_deflector_parameters_e1";
pub const E2: &str = "main_deflector_parameters_e2";
pub const CENTER_X: &str = "main_deflector_parameters_center_x";
pub const CENTER_Y: &str = "main_deflector_parameters_center_y";
pub const SIGMA_SUB: &str = "subhalo_parameters_sigma_sub";
pub const SHMF_PLAW_INDEX: &str = "subhalo_parameters_shmf_plaw_index";
pub const DELTA_LOS: &str = "los_parameters_delta_los";

/// `(long, short)` name pairs.
const NAME_PAIRS: [(&str, &str); 11] = [
    (THETA_E, "theta_E"),
    (SIGMA_SUB, "sigma_sub"),
    (SHMF_PLAW_INDEX, "shmf_plaw_index"),
    (DELTA_LOS, "delta_los"),
    (CENTER_X, "center_x"),
    (CENTER_Y, "center_y"),
    (GAMMA, "gamma"),
    (GAMMA1, "gamma1"),
    (GAMMA2, "gamma2"),
    (E1, "e1"),
    (E2, "e2"),
];

/// Eight main-deflector parameters followed by the subhalo normalization.
pub const MARCH_2022_PARAMETERS: [&str; 9] = [
    THETA_E, GAMMA1, GAMMA2, GAMMA, E1, E2, CENTER_X, CENTER_Y, SIGMA_SUB,
];

pub const DEFAULT_PARAMETERS: [&str; 3] = [THETA_E, SIGMA_SUB, GAMMA];

#[must_use]
pub fn short_name(long: &str) -> Option<&'static str> {
    NAME_PAIRS
        .iter()
        .find(|(l, _)| *l == long)
        .map(|(_, s)| *s)
}

#[must_use]
pub fn long_name(short: &str) -> Option<&'static str> {
    NAME_PAIRS
        .iter()
        .find(|(_, s)| *s == short)
        .map(|(l, _)| *l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for long in MARCH_2022_PARAMETERS {
            let short = short_name(long).expect("known parameter");
            assert_eq!(long_name(short), Some(long));
        }
        assert_eq!(short_name("unknown"), None);
    }
}
