use std::f64::consts::PI;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{array, Array2, Array4, ArrayD};
use num_complex::Complex;
use num_traits::Zero;

use crate::auxiliary::constants::{BOHR_TO_ANGSTROM, HTR_TO_EV};
use crate::auxiliary::error::GreensfError;
use crate::greensfunction::fixtures::{
    jij_container, jij_intersite, semicircle_contour, JIJ_BXC, JIJ_NZ, JIJ_SHELLS,
};
use crate::greensfunction::{ElementLocator, GreensFunction};
use crate::heisenberg::{
    calculate_heisenberg_jij, calculate_heisenberg_tensor, decompose_jij_tensor,
    heisenberg_reciprocal, ExchangeRecord, JijRecord, JijTensorRecord, MomentDirection,
    OnsiteDelta,
};

type C128 = Complex<f64>;

const DELTA: f64 = 1.8348;

fn scalar_delta(value: f64) -> OnsiteDelta {
    OnsiteDelta::Scalar(Array2::from_elem((2, 4), value))
}

/// Loop-based evaluation of the scalar exchange constant of a fixture shell, using
/// $`G_{ji} = G_{ij}^T`$.
fn reference_jij(shell: usize, delta: f64) -> f64 {
    let (points, weights) = semicircle_contour(JIJ_NZ, -6.0);
    let g = jij_intersite(&points, shell);
    let mut total = C128::zero();
    for iz in 0..JIJ_NZ {
        for (c, w) in [weights[iz], -weights[iz].conj()].into_iter().enumerate() {
            for m in 0..5 {
                for n in 0..5 {
                    total += w * delta * delta * g[[iz, m, n, 0, c]] * g[[iz, m, n, 1, c]];
                }
            }
        }
    }
    0.5 * (total / C128::new(0.0, 8.0 * PI)).re * 1000.0
}

#[test]
fn test_heisenberg_scalar_jij() {
    let container = jij_container();
    let delta = scalar_delta(DELTA);
    let records = calculate_heisenberg_jij(&container, 1, Some(&delta), None, None).unwrap();
    assert_eq!(records.len(), 2);

    for (shell, record) in records.iter().enumerate() {
        let expected = reference_jij(shell, DELTA);
        assert!(expected.abs() > 1e-3);
        assert_relative_eq!(record.j_ij, expected, max_relative = 1e-8);
        assert_eq!(record.atom_i, "Fe-1");
        assert_eq!(record.atom_j, "Fe-2");
        for (x, x_bohr) in record.displacement.iter().zip(JIJ_SHELLS[shell].iter()) {
            assert_abs_diff_eq!(*x, x_bohr * BOHR_TO_ANGSTROM, epsilon = 1e-12);
        }
    }
    assert!(records[0].distance < records[1].distance);

    let limited = calculate_heisenberg_jij(&container, 1, Some(&delta), Some(1), None).unwrap();
    assert_eq!(limited, records[..1].to_vec());

    let reversed = calculate_heisenberg_jij(&container, 2, Some(&delta), None, None).unwrap();
    assert_eq!(reversed.len(), 2);
    assert_relative_eq!(reversed[0].j_ij, records[0].j_ij, max_relative = 1e-8);
    assert_eq!(reversed[0].atom_i, "Fe-2");
}

#[test]
fn test_heisenberg_delta_forms() {
    let container = jij_container();
    let scalar = calculate_heisenberg_jij(&container, 1, Some(&scalar_delta(DELTA)), None, None)
        .unwrap();

    let mut matrix = Array4::<C128>::zeros((2, 4, 7, 7));
    for t in 0..2 {
        for l in 0..4 {
            for m in 0..(2 * l + 1) {
                matrix[(t, l, m, m)] = C128::from(DELTA);
            }
        }
    }
    let matrix = calculate_heisenberg_jij(
        &container,
        1,
        Some(&OnsiteDelta::Matrix(matrix)),
        None,
        None,
    )
    .unwrap();
    for (a, b) in scalar.iter().zip(matrix.iter()) {
        assert_relative_eq!(a.j_ij, b.j_ij, max_relative = 1e-10);
    }

    // Without an explicit splitting, containers assemble it from their constant Bxc field.
    let bxc_value = JIJ_BXC * HTR_TO_EV * 3.0 / (4.0 * PI).sqrt();
    let from_bxc = calculate_heisenberg_jij(&container, 1, None, None, None).unwrap();
    let from_scalar =
        calculate_heisenberg_jij(&container, 1, Some(&scalar_delta(bxc_value)), None, None)
            .unwrap();
    for (a, b) in from_bxc.iter().zip(from_scalar.iter()) {
        assert_relative_eq!(a.j_ij, b.j_ij, max_relative = 1e-8);
    }
}

#[test]
fn test_heisenberg_preloaded_source() {
    let container = jij_container();
    let delta = scalar_delta(DELTA);
    let loaded = (1..=6)
        .map(|k| GreensFunction::from_container(&container, ElementLocator::Index(k)).unwrap())
        .collect::<Vec<_>>();

    let from_file = calculate_heisenberg_jij(&container, 1, Some(&delta), None, None).unwrap();
    let from_list = calculate_heisenberg_jij(&loaded, 1, Some(&delta), None, None).unwrap();
    assert_eq!(from_file, from_list);

    assert!(matches!(
        calculate_heisenberg_jij(&loaded, 1, None, None, None),
        Err(GreensfError::NotAvailable { .. })
    ));
    assert!(matches!(
        calculate_heisenberg_jij(loaded.as_slice(), 1, Some(&scalar_delta(DELTA)), None, None)
            .map(|records| records.len()),
        Ok(2)
    ));
}

#[test]
fn test_heisenberg_transform_hook() {
    let container = jij_container();
    let delta = scalar_delta(DELTA);
    let plain = calculate_heisenberg_jij(&container, 1, Some(&delta), None, None).unwrap();

    let double = |x: ArrayD<C128>| x.mapv(|v| v * 2.0);
    let doubled =
        calculate_heisenberg_jij(&container, 1, Some(&delta), None, Some(&double)).unwrap();
    for (a, b) in plain.iter().zip(doubled.iter()) {
        assert_relative_eq!(b.j_ij, 16.0 * a.j_ij, max_relative = 1e-10);
    }
}

#[test]
fn test_heisenberg_tensor_decomposition() {
    let container = jij_container();
    let delta = scalar_delta(DELTA);
    let scalar = calculate_heisenberg_jij(&container, 1, Some(&delta), None, None).unwrap();
    let mut records = calculate_heisenberg_tensor(&container, 1, Some(&delta), None, None).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.decomposition.is_none()));

    for direction in [MomentDirection::X, MomentDirection::Y, MomentDirection::Z] {
        decompose_jij_tensor(&mut records, direction);
        let (a, b) = direction.perpendicular_axes();
        for record in records.iter() {
            let j = &record.tensor;
            let d = record.decomposition.as_ref().unwrap();
            assert_eq!(d.direction, direction);
            assert_abs_diff_eq!(d.j_ij, 0.5 * (j[a][a] + j[b][b]), epsilon = 1e-12);
            assert_abs_diff_eq!(d.a_ij, 0.5 * (j[a][a] - j[b][b]), epsilon = 1e-12);
            assert_abs_diff_eq!(d.s_ij, 0.5 * (j[a][b] + j[b][a]), epsilon = 1e-12);
            assert_abs_diff_eq!(d.d_ij, 0.5 * (j[a][b] - j[b][a]), epsilon = 1e-12);
        }
    }

    // Collinear moments along z: the transverse response is isotropic and equals the scalar J.
    decompose_jij_tensor(&mut records, MomentDirection::Z);
    for (record, scalar) in records.iter().zip(scalar.iter()) {
        let d = record.decomposition.as_ref().unwrap();
        assert_relative_eq!(d.j_ij, scalar.j_ij, max_relative = 1e-8);
        assert_abs_diff_eq!(d.a_ij, 0.0, epsilon = 1e-8 * scalar.j_ij.abs());
        assert_abs_diff_eq!(d.s_ij, 0.0, epsilon = 1e-8 * scalar.j_ij.abs());
        assert_abs_diff_eq!(d.d_ij, 0.0, epsilon = 1e-8 * scalar.j_ij.abs());
        assert_eq!(record.entry("J_ij"), Some(d.j_ij));
        assert_eq!(record.entry("J_xy"), Some(record.tensor[0][1]));
    }
}

#[test]
fn test_heisenberg_reciprocal() {
    let records = vec![
        JijRecord {
            distance: 1.0,
            displacement: [1.0, 0.0, 0.0],
            atom_i: "1".to_string(),
            atom_j: "2".to_string(),
            j_ij: 2.0,
        },
        JijRecord {
            distance: 1.0,
            displacement: [-1.0, 0.0, 0.0],
            atom_i: "1".to_string(),
            atom_j: "2".to_string(),
            j_ij: 0.5,
        },
    ];
    let qpoints = array![[0.0, 0.0, 0.0], [PI, 0.0, 0.0], [0.5 * PI, 0.0, 0.0]];
    let jq = heisenberg_reciprocal(&qpoints, &records, "J_ij").unwrap();
    assert_abs_diff_eq!((jq[0] - C128::new(2.5, 0.0)).norm(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((jq[1] - C128::new(-2.5, 0.0)).norm(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((jq[2] - C128::new(0.0, 1.5)).norm(), 0.0, epsilon = 1e-12);

    let r = heisenberg_reciprocal(&qpoints, &records, "R").unwrap();
    assert_abs_diff_eq!(r[0].re, 2.0, epsilon = 1e-12);

    assert!(matches!(
        heisenberg_reciprocal(&qpoints, &records, "D_ij"),
        Err(GreensfError::BadField(_))
    ));
    assert!(matches!(
        heisenberg_reciprocal(&array![[0.0, 0.0]], &records, "J_ij"),
        Err(GreensfError::BadShape(_))
    ));

    // At q = 0 the sum is the column sum of the fixture table.
    let mut tensor = calculate_heisenberg_tensor(
        &jij_container(),
        1,
        Some(&scalar_delta(DELTA)),
        None,
        None,
    )
    .unwrap();
    decompose_jij_tensor(&mut tensor, MomentDirection::Z);
    let jq = heisenberg_reciprocal(&array![[0.0, 0.0, 0.0]], &tensor, "D_ij").unwrap();
    let column = tensor
        .iter()
        .map(|record| record.entry("D_ij").unwrap())
        .sum::<f64>();
    assert_abs_diff_eq!(jq[0].re, column, epsilon = 1e-12);
    assert_abs_diff_eq!(jq[0].im, 0.0, epsilon = 1e-12);
}

#[test]
fn test_onsite_delta_expand() {
    let delta = OnsiteDelta::Scalar(array![[0.1, 0.2, 0.3], [1.1, 1.2, 1.3]]);
    let block = delta.expand(2, 1, 0.4, 0.7).unwrap();
    assert_eq!(block.dim(), (3, 3));
    assert_eq!(block[(1, 1)], C128::from(1.2));
    assert_eq!(block[(0, 1)], C128::zero());
    assert!(matches!(
        delta.expand(3, 1, 0.0, 0.0),
        Err(GreensfError::OutOfRange { .. })
    ));
    assert!(matches!(
        delta.expand(0, 1, 0.0, 0.0),
        Err(GreensfError::OutOfRange { .. })
    ));
    assert!(matches!(
        delta.expand(1, 3, 0.0, 0.0),
        Err(GreensfError::OutOfRange { .. })
    ));

    // A non-uniform local matrix stays Hermitian with the same trace when rotated.
    let mut values = Array4::<C128>::zeros((1, 4, 7, 7));
    for m in 0..5 {
        values[(0, 2, m, m)] = C128::from(0.5 + 0.25 * m as f64);
    }
    let matrix = OnsiteDelta::Matrix(values);
    let local = matrix.expand(1, 2, 0.0, 0.0).unwrap();
    assert_abs_diff_eq!(local[(4, 4)].re, 1.5, epsilon = 1e-12);
    let rotated = matrix.expand(1, 2, 0.3, 1.1).unwrap();
    let trace = rotated.diag().sum();
    assert_abs_diff_eq!(trace.re, local.diag().sum().re, epsilon = 1e-12);
    assert_abs_diff_eq!(trace.im, 0.0, epsilon = 1e-12);
    for m in 0..5 {
        for mp in 0..5 {
            assert_abs_diff_eq!(
                (rotated[(m, mp)] - rotated[(mp, m)].conj()).norm(),
                0.0,
                epsilon = 1e-12
            );
        }
    }
    assert!(rotated[(0, 1)].norm() > 1e-6);
}

#[test]
fn test_moment_direction() {
    assert_eq!("z".parse::<MomentDirection>().unwrap(), MomentDirection::Z);
    assert_eq!(" X ".parse::<MomentDirection>().unwrap(), MomentDirection::X);
    assert!(matches!(
        "w".parse::<MomentDirection>(),
        Err(GreensfError::BadField(_))
    ));
    assert_eq!(MomentDirection::Y.to_string(), "y");
    assert_eq!(MomentDirection::X.perpendicular_axes(), (1, 2));
    assert_eq!(MomentDirection::Y.perpendicular_axes(), (2, 0));
    assert_eq!(MomentDirection::Z.perpendicular_axes(), (0, 1));
}

#[test]
fn test_exchange_record_entries() {
    let record = JijTensorRecord {
        distance: 2.0,
        displacement: [0.0, 2.0, 0.0],
        atom_i: "Fe-1".to_string(),
        atom_j: "Fe-2".to_string(),
        tensor: [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
        decomposition: None,
    };
    assert_eq!(record.entry("R"), Some(2.0));
    assert_eq!(record.entry("R_ij_y"), Some(2.0));
    assert_eq!(record.entry("J_xz"), Some(3.0));
    assert_eq!(record.entry("J_zy"), Some(8.0));
    assert_eq!(record.entry("J_ij"), None);
    assert_eq!(record.entry("J_xw"), None);
    assert_eq!(record.displacement(), [0.0, 2.0, 0.0]);
}
