mod common;

use common::FlatLambdaCdm;
use lensing_population::substructure::nfw::r_200_from_m;
use lensing_population::substructure::{kpc_per_arcsecond, output::TNFW};
use lensing_population::{
    GalaxyHaloConnection, HostDeflector, SourceParameters, SubhaloParameters, SubhalosDg19,
    SubstructureError,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn host() -> HostDeflector {
    HostDeflector {
        m200: 1e13,
        z_lens: 0.5,
        theta_e: 1.1,
        center_x: 0.02,
        center_y: -0.03,
        e1: 0.05,
        e2: -0.02,
    }
}

fn sampler(subhalo: SubhaloParameters) -> SubhalosDg19<FlatLambdaCdm> {
    SubhalosDg19::new(
        subhalo,
        host(),
        SourceParameters {
            z_source: 2.0,
            output_ab_zeropoint: 25.127,
        },
        FlatLambdaCdm::default(),
    )
    .expect("valid configuration")
}

#[test]
fn cored_nfw_positions_fill_the_cylinder_exactly() {
    let model = sampler(SubhaloParameters::default());
    let cosmology = FlatLambdaCdm::default();
    let r_3e = 3.0 * 1.1 * kpc_per_arcsecond(0.5, &cosmology);
    let r_200 = r_200_from_m(1e13, 0.5, &cosmology);
    assert!(r_200 > 300.0 && r_200 < 450.0, "r_200 {r_200}");

    let mut rng = StdRng::seed_from_u64(1909);
    for n in [1, 37, 250] {
        let positions = model
            .sample_cored_nfw(n, &mut rng)
            .expect("unbounded sampling succeeds");
        assert_eq!(positions.len(), n);
        for [x, y, z] in positions {
            assert!(x.hypot(y) < r_3e);
            assert!(z.abs() < r_200);
        }
    }
}

#[test]
fn non_positive_sigma_sub_yields_no_subhalos() {
    let mut rng = StdRng::seed_from_u64(2);
    for sigma_sub in [0.0, -5e-3] {
        let model = sampler(SubhaloParameters {
            sigma_sub,
            ..SubhaloParameters::default()
        });
        assert!(model.draw_nfw_masses(&mut rng).expect("draw").is_empty());
        let inputs = model.draw_subhalos(&mut rng).expect("draw");
        assert_eq!(inputs.n_lenses(), 0);
        assert_eq!(inputs.n_lights(), 0);
    }
}

#[test]
fn full_draw_produces_consistent_lens_and_light_lists() {
    let model = sampler(SubhaloParameters {
        galaxies: GalaxyHaloConnection {
            m_min: 1e9,
            ..GalaxyHaloConnection::default()
        },
        ..SubhaloParameters::default()
    });
    let mut rng = StdRng::seed_from_u64(3);
    let inputs = model.draw_subhalos(&mut rng).expect("draw");

    let n = inputs.n_lenses();
    assert!(n > 10);
    assert_eq!(inputs.lens_kwargs.len(), n);
    assert_eq!(inputs.lens_redshifts.len(), n);
    assert!(inputs.lens_models.iter().all(|m| m == TNFW));
    for kwargs in &inputs.lens_kwargs {
        for key in ["alpha_Rs", "Rs", "center_x", "center_y", "r_trunc"] {
            assert!(kwargs[key].is_finite(), "{key}");
        }
        let offset = (kwargs["center_x"] - 0.02).hypot(kwargs["center_y"] + 0.03);
        assert!(offset < 3.3);
    }

    // Only subhalos above 1e9 solar masses carry light.
    assert!(inputs.n_lights() < n);
    for light in &inputs.light_kwargs {
        assert!(light["amp"].is_finite() && light["amp"] > 0.0);
        assert!(light["R_sersic"] > 0.0);
        let matches_lens = inputs.lens_kwargs.iter().any(|lens| {
            lens["center_x"] == light["center_x"] && lens["center_y"] == light["center_y"]
        });
        assert!(matches_lens);
    }
}

#[test]
fn capped_rejection_sampling_fails_instead_of_looping() {
    let model = sampler(SubhaloParameters {
        max_rejection_rounds: Some(2),
        ..SubhaloParameters::default()
    });
    let mut rng = StdRng::seed_from_u64(4);
    let err = model.sample_cored_nfw(500, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        SubstructureError::RejectionSamplingExhausted {
            requested: 500,
            rounds: 2,
            ..
        }
    ));
}
