use std::f64::consts::PI;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{stack, Array1, Array2, ArrayD, Axis, IxDyn};
use num_complex::Complex;

use greensf::auxiliary::constants::{BOHR_TO_ANGSTROM, HTR_TO_EV};
use greensf::container::memory::MemoryContainer;
use greensf::greensfunction::element::list_elements;
use greensf::greensfunction::selection::ElementSelection;
use greensf::greensfunction::{ElementLocator, GreensFunction};
use greensf::heisenberg::{calculate_heisenberg_jij, OnsiteDelta};

type C128 = Complex<f64>;

const FERMI: f64 = 0.3;
const NZ: usize = 96;
const LEVELS: [f64; 2] = [-1.5, 0.6];

fn to_disk(x: &ArrayD<C128>) -> ArrayD<f64> {
    let re = x.mapv(|z| z.re);
    let im = x.mapv(|z| z.im);
    stack(Axis(x.ndim()), &[re.view(), im.view()]).unwrap()
}

fn coefficient_to_disk(x: &ArrayD<C128>) -> ArrayD<f64> {
    let reversed = x
        .mapv(|z| z * HTR_TO_EV)
        .reversed_axes()
        .as_standard_layout()
        .to_owned();
    to_disk(&reversed)
}

fn contour() -> (Array1<C128>, Array1<C128>) {
    let (bottom, radius) = (-5.0, 2.5);
    let dtheta = PI / NZ as f64;
    let thetas = Array1::from_shape_fn(NZ, |j| (j as f64 + 0.5) * dtheta);
    let points = thetas.mapv(|t| bottom / 2.0 + radius * C128::from_polar(1.0, PI - t));
    let weights = thetas.mapv(|t| -C128::i() * radius * C128::from_polar(1.0, PI - t) * dtheta);
    (points, weights)
}

fn s_coefficient(points: &Array1<C128>, amplitude: f64) -> ArrayD<C128> {
    ArrayD::from_shape_fn(IxDyn(&[points.len(), 1, 1, 2, 2]), |idx| {
        let z = if idx[4] == 0 {
            points[idx[0]]
        } else {
            points[idx[0]].conj()
        };
        amplitude / (z - LEVELS[idx[3]])
    })
}

/// Two `s` sites with an on-site element each and two inter-site shells, assembled through the
/// public container API.
fn build_container() -> MemoryContainer {
    let mut container = MemoryContainer::new();
    container
        .set_attribute("/meta", "version", 9i64)
        .set_attribute("/general", "FermiEnergy", FERMI)
        .set_attribute("/general", "spins", 2i64)
        .set_attribute("/general", "mperp", false)
        .set_attribute("/GreensFunctionElements", "maxl", 3i64)
        .set_attribute("/GreensFunctionElements", "NumElements", 6i64);

    let (points, weights) = contour();
    container
        .add_dataset(
            "/EnergyContours/contour-1/ContourPoints",
            to_disk(&points.mapv(|z| z / HTR_TO_EV + FERMI).into_dyn()),
        )
        .add_dataset(
            "/EnergyContours/contour-1/IntegrationWeights",
            to_disk(&weights.mapv(|w| w / HTR_TO_EV).into_dyn()),
        );

    let elements: [(i64, i64, [f64; 3], f64); 6] = [
        (1, 1, [0.0; 3], 1.0),
        (2, 2, [0.0; 3], 1.0),
        (1, 2, [3.0, 0.0, 0.0], 0.4),
        (2, 1, [-3.0, 0.0, 0.0], 0.4),
        (1, 2, [3.0, 3.0, 0.0], 0.2),
        (2, 1, [-3.0, -3.0, 0.0], 0.2),
    ];
    for (k, (atom_type, atom_type_p, diff, amplitude)) in elements.iter().enumerate() {
        let path = format!("/GreensFunctionElements/element-{}", k + 1);
        container
            .set_attribute(&path, "l", 0i64)
            .set_attribute(&path, "lp", 0i64)
            .set_attribute(&path, "atomType", *atom_type)
            .set_attribute(&path, "atomTypep", *atom_type_p)
            .set_attribute(&path, "l_sphavg", true)
            .set_attribute(&path, "l_onsite", atom_type == atom_type_p)
            .set_attribute(&path, "iContour", 1i64)
            .set_attribute(&path, "numLOs", 0i64)
            .set_attribute(&path, "atomDiff", diff.to_vec())
            .add_dataset(
                &format!("{path}/sphavg"),
                coefficient_to_disk(&s_coefficient(&points, *amplitude)),
            );
    }
    container
}

#[test]
fn test_catalog_and_loading() {
    let container = build_container();
    let elements = list_elements(&container, false).unwrap();
    assert_eq!(elements.len(), 6);
    assert_eq!(elements.iter().filter(|element| element.onsite).count(), 2);
    assert_relative_eq!(
        elements[2].distance(),
        3.0 * BOHR_TO_ANGSTROM,
        max_relative = 1e-12
    );

    let selection = ElementSelection::new()
        .with("atomType", 2i64)
        .with("l_onsite", true);
    let gf = GreensFunction::from_container(&container, ElementLocator::Selection(selection))
        .unwrap();
    assert_eq!(gf.index(), 1);
    assert!(!gf.mperp());
    assert_relative_eq!(gf.points()[0].re, contour().0[0].re, max_relative = 1e-12);

    let ambiguous = ElementSelection::new().with("l_onsite", true);
    assert!(GreensFunction::from_container(&container, ElementLocator::Selection(ambiguous)).is_err());
    assert!(GreensFunction::from_container(&container, ElementLocator::Index(7)).is_err());
}

#[test]
fn test_occupation() {
    let container = build_container();
    let gf = GreensFunction::from_container(&container, ElementLocator::Index(1)).unwrap();

    // A level below the Fermi energy contributes one half per branch pair; one above contributes
    // nothing.
    let up = gf.occupation(Some(1)).unwrap();
    let down = gf.occupation(Some(2)).unwrap();
    assert_eq!(up.shape(), &[1, 1]);
    assert_abs_diff_eq!(up[[0, 0]].re, 0.5, epsilon = 1e-8);
    assert_abs_diff_eq!(up[[0, 0]].im, 0.0, epsilon = 1e-8);
    assert_abs_diff_eq!(down[[0, 0]].norm(), 0.0, epsilon = 1e-8);
}

#[test]
fn test_exchange_scaling() {
    let container = build_container();
    let delta = OnsiteDelta::Scalar(Array2::from_elem((2, 4), 2.0));
    let records = calculate_heisenberg_jij(&container, 1, Some(&delta), None, None).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].distance < records[1].distance);
    assert!(records[0].j_ij.abs() > 0.0);

    // The second shell has half the amplitude on both sides of the pair.
    assert_relative_eq!(
        records[1].j_ij,
        records[0].j_ij / 4.0,
        max_relative = 1e-10
    );

    // The exchange constant is quadratic in the exchange splitting.
    let doubled = OnsiteDelta::Scalar(Array2::from_elem((2, 4), 4.0));
    let stronger = calculate_heisenberg_jij(&container, 1, Some(&doubled), Some(1), None).unwrap();
    assert_eq!(stronger.len(), 1);
    assert_relative_eq!(
        stronger[0].j_ij,
        4.0 * records[0].j_ij,
        max_relative = 1e-10
    );
}
