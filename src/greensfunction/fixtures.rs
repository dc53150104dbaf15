//! Synthetic in-memory containers shared by the unit tests.
//!
//! All fixtures build their coefficients in the in-memory layout (1/eV, energies relative to the
//! Fermi energy) and write them to the container in the on-disk layout (Hartree, reversed axes,
//! trailing real/imaginary axis), so that loading them must recover the original arrays.

use std::f64::consts::PI;

use ndarray::{stack, Array1, Array2, ArrayD, Axis, Dimension, IxDyn};
use num_complex::Complex;

use crate::auxiliary::constants::HTR_TO_EV;
use crate::container::memory::MemoryContainer;

type C128 = Complex<f64>;

/// Fermi energy of every fixture, in Hartree.
pub(crate) const FERMI_ENERGY_HTR: f64 = 0.25;

pub(crate) const ELEMENTS: &str = "/GreensFunctionElements";

/// Spin-resolved levels (eV) of the spherically averaged fixture, indexed by `[spin, m + l]`.
/// Spin-up levels all lie inside the contour; spin-down levels with $`m \geq 0`$ lie above the
/// Fermi energy.
pub(crate) fn sphavg_levels() -> Array2<f64> {
    Array2::from_shape_fn((2, 5), |(s, mi)| {
        let m = mi as f64 - 2.0;
        if s == 0 {
            -1.5 - 0.5 * m
        } else {
            m + 0.5
        }
    })
}

// ==================
// Struct definitions
// ==================

/// Header attributes of one synthetic element.
#[derive(Clone, Debug)]
pub(crate) struct ElementSpec {
    pub(crate) l: i64,
    pub(crate) lp: i64,
    pub(crate) atom_type: i64,
    pub(crate) atom_type_p: i64,
    pub(crate) sphavg: bool,
    pub(crate) onsite: bool,
    pub(crate) kresolved: Option<bool>,
    pub(crate) contour: i64,
    pub(crate) n_lo: i64,

    /// Displacement in Bohr.
    pub(crate) atom_diff: [f64; 3],
    pub(crate) atoms: Option<(i64, i64)>,
}

impl ElementSpec {
    pub(crate) fn onsite(l: i64, atom_type: i64) -> Self {
        Self {
            l,
            lp: l,
            atom_type,
            atom_type_p: atom_type,
            sphavg: true,
            onsite: true,
            kresolved: None,
            contour: 1,
            n_lo: 0,
            atom_diff: [0.0; 3],
            atoms: None,
        }
    }

    pub(crate) fn intersite(
        l: i64,
        atom_type: i64,
        atom_type_p: i64,
        atom_diff: [f64; 3],
    ) -> Self {
        Self {
            onsite: false,
            atom_type_p,
            atom_diff,
            ..Self::onsite(l, atom_type)
        }
    }
}

// ================
// Layout utilities
// ================

/// Appends a trailing real/imaginary axis.
pub(crate) fn complex_to_disk(x: &ArrayD<C128>) -> ArrayD<f64> {
    let re = x.mapv(|z| z.re);
    let im = x.mapv(|z| z.im);
    stack(Axis(x.ndim()), &[re.view(), im.view()]).unwrap()
}

/// Converts an in-memory coefficient in 1/eV into its on-disk form in 1/Htr.
pub(crate) fn coefficient_to_disk(canonical: &ArrayD<C128>) -> ArrayD<f64> {
    let reversed = canonical
        .mapv(|x| x * HTR_TO_EV)
        .reversed_axes()
        .as_standard_layout()
        .to_owned();
    complex_to_disk(&reversed)
}

/// Deterministic, non-symmetric complex values.
pub(crate) fn synthetic(shape: &[usize], seed: f64) -> ArrayD<C128> {
    ArrayD::from_shape_fn(IxDyn(shape), |idx| {
        let phase = idx
            .slice()
            .iter()
            .enumerate()
            .map(|(k, &i)| (k as f64 + 1.3) * (i as f64 + 0.7))
            .sum::<f64>()
            + seed;
        C128::new(0.3 * phase.sin(), 0.2 * (1.7 * phase).cos())
    })
}

/// Returns a semicircle contour from `e_bottom` to the Fermi energy (both in eV), traversed
/// through the upper half-plane with midpoint weights.
///
/// Together with the mirrored lower branch, a level enclosed by the contour contributes exactly
/// one half to the zeroth moment.
pub(crate) fn semicircle_contour(nz: usize, e_bottom: f64) -> (Array1<C128>, Array1<C128>) {
    let radius = -e_bottom / 2.0;
    let centre = e_bottom / 2.0;
    let dtheta = PI / nz as f64;
    let thetas = Array1::from_shape_fn(nz, |j| (j as f64 + 0.5) * dtheta);
    let points = thetas.mapv(|t| centre + radius * C128::from_polar(1.0, PI - t));
    let weights = thetas.mapv(|t| -C128::i() * radius * C128::from_polar(1.0, PI - t) * dtheta);
    (points, weights)
}

/// Green's function with diagonal poles, `[nz, 2l+1, 2l+1, Nspin, 2]`.
pub(crate) fn pole_coefficient(points: &Array1<C128>, levels: &Array2<f64>) -> ArrayD<C128> {
    let (nspin, nm) = levels.dim();
    let mut g = ArrayD::<C128>::zeros(IxDyn(&[points.len(), nm, nm, nspin, 2]));
    for (iz, &z) in points.iter().enumerate() {
        for s in 0..nspin {
            for m in 0..nm {
                g[[iz, m, m, s, 0]] = 1.0 / (z - levels[(s, m)]);
                g[[iz, m, m, s, 1]] = 1.0 / (z.conj() - levels[(s, m)]);
            }
        }
    }
    g
}

// ====================
// Container assemblies
// ====================

fn base_container(version: i64, spins: i64, mperp: bool) -> MemoryContainer {
    let mut container = MemoryContainer::new();
    container
        .set_attribute("/meta", "version", version)
        .set_attribute("/general", "FermiEnergy", FERMI_ENERGY_HTR)
        .set_attribute("/general", "spins", spins)
        .set_attribute("/general", "mperp", mperp)
        .set_attribute(ELEMENTS, "maxl", 3i64);
    container
}

fn add_contour(
    container: &mut MemoryContainer,
    index: usize,
    points: &Array1<C128>,
    weights: &Array1<C128>,
) {
    let points_htr = points.mapv(|z| z / HTR_TO_EV + FERMI_ENERGY_HTR).into_dyn();
    let weights_htr = weights.mapv(|w| w / HTR_TO_EV).into_dyn();
    let path = format!("/EnergyContours/contour-{index}");
    container
        .add_dataset(&format!("{path}/ContourPoints"), complex_to_disk(&points_htr))
        .add_dataset(
            &format!("{path}/IntegrationWeights"),
            complex_to_disk(&weights_htr),
        );
}

pub(crate) fn element_group(k: usize) -> String {
    format!("{ELEMENTS}/element-{k}")
}

pub(crate) fn add_element_header(container: &mut MemoryContainer, k: usize, spec: &ElementSpec) {
    let path = element_group(k);
    container
        .set_attribute(&path, "l", spec.l)
        .set_attribute(&path, "lp", spec.lp)
        .set_attribute(&path, "atomType", spec.atom_type)
        .set_attribute(&path, "atomTypep", spec.atom_type_p)
        .set_attribute(&path, "l_sphavg", spec.sphavg)
        .set_attribute(&path, "l_onsite", spec.onsite)
        .set_attribute(&path, "iContour", spec.contour)
        .set_attribute(&path, "numLOs", spec.n_lo)
        .set_attribute(&path, "atomDiff", spec.atom_diff.to_vec());
    if let Some(kresolved) = spec.kresolved {
        container.set_attribute(&path, "l_kresolved", kresolved);
    }
    if let Some((atom, atomp)) = spec.atoms {
        container
            .set_attribute(&path, "atom", atom)
            .set_attribute(&path, "atomp", atomp);
    }
}

fn set_element_count(container: &mut MemoryContainer, n: usize) {
    container.set_attribute(ELEMENTS, "NumElements", n as i64);
}

// ~~~~~~~~~~~~~~~~~~
// Spherical average
// ~~~~~~~~~~~~~~~~~~

/// Number of energy points of the spherically averaged fixture.
pub(crate) const SPHAVG_NZ: usize = 128;

/// One spherically averaged `l = 2` on-site element with two collinear spins and diagonal poles
/// at [`sphavg_levels`]. The contour spans `[-10, 0]` eV.
pub(crate) fn sphavg_container() -> MemoryContainer {
    let mut container = base_container(6, 2, false);
    let (points, weights) = semicircle_contour(SPHAVG_NZ, -10.0);
    add_contour(&mut container, 1, &points, &weights);
    add_element_header(&mut container, 1, &ElementSpec::onsite(2, 1));
    container.add_dataset(
        &format!("{}/sphavg", element_group(1)),
        coefficient_to_disk(&pole_coefficient(&points, &sphavg_levels())),
    );
    set_element_count(&mut container, 1);
    container
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Non-collinear spherical average
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

pub(crate) const MPERP_NZ: usize = 64;

/// Spin Hamiltonian (eV) of the non-collinear `s` fixture, `[[↑↑, ↑↓], [↓↑, ↓↓]]`. Its lower
/// eigenvalue lies inside the contour and its upper one above the Fermi energy.
pub(crate) fn mperp_hamiltonian() -> Array2<C128> {
    let b = C128::new(0.4, 0.3);
    ndarray::array![[C128::from(-1.0), b], [b.conj(), C128::from(0.5)]]
}

/// Exact resolvent $`(z - H)^{-1}`$ of [`mperp_hamiltonian`].
pub(crate) fn mperp_resolvent(z: C128) -> Array2<C128> {
    let h = mperp_hamiltonian();
    let det = (z - h[(0, 0)]) * (z - h[(1, 1)]) - h[(0, 1)] * h[(1, 0)];
    ndarray::array![
        [(z - h[(1, 1)]) / det, h[(0, 1)] / det],
        [h[(1, 0)] / det, (z - h[(0, 0)]) / det],
    ]
}

/// One spherically averaged `l = 0` on-site element with `mperp` set, storing only the packed
/// entries (↑↑, ↓↓, ↓↑) of [`mperp_resolvent`]. The contour spans `[-6, 0]` eV.
pub(crate) fn mperp_container() -> MemoryContainer {
    let mut container = base_container(9, 2, true);
    let (points, weights) = semicircle_contour(MPERP_NZ, -6.0);
    add_contour(&mut container, 1, &points, &weights);
    add_element_header(&mut container, 1, &ElementSpec::onsite(0, 1));

    // Packed index to (row, column) of the spin block.
    let packed = [(0, 0), (1, 1), (1, 0)];
    let g = ArrayD::from_shape_fn(IxDyn(&[MPERP_NZ, 1, 1, 3, 2]), |idx| {
        let z = if idx[4] == 0 {
            points[idx[0]]
        } else {
            points[idx[0]].conj()
        };
        mperp_resolvent(z)[packed[idx[3]]]
    });
    container.add_dataset(
        &format!("{}/sphavg", element_group(1)),
        coefficient_to_disk(&g),
    );
    set_element_count(&mut container, 1);
    container
}

// ~~~~~~
// Radial
// ~~~~~~

pub(crate) const RADIAL_NZ: usize = 16;
pub(crate) const RADIAL_NR: usize = 12;
pub(crate) const RADIAL_JRI: usize = 10;

/// Local-orbital angular momenta of the single atom type: two `p` and one `d` local orbital.
pub(crate) const RADIAL_LLO: [f64; 3] = [1.0, 1.0, 2.0];

/// Scalar product `<name>n` of the radial fixture for `(spin, lo, lo')`.
pub(crate) fn radial_scalar_product(name: &str, s: usize, i: usize, j: usize) -> f64 {
    let offset = name.bytes().map(f64::from).sum::<f64>() / 100.0;
    1.0 + 0.1 * s as f64 + 0.05 * i as f64 + 0.01 * j as f64 + offset
}

/// In-memory value of a radial family, `[nz, 2l+1, 2l+1, 3, 2 (, nLO (, nLO'))]`, with three
/// stored spin entries (↑↑, ↓↓, ↓↑).
pub(crate) fn radial_family(l: usize, family: &str, lo_dims: &[usize]) -> ArrayD<C128> {
    let nm = 2 * l + 1;
    let mut shape = vec![RADIAL_NZ, nm, nm, 3, 2];
    shape.extend_from_slice(lo_dims);
    let seed = family.bytes().map(f64::from).sum::<f64>() + l as f64;
    synthetic(&shape, seed)
}

/// Writes one local-orbital family, split into its per-LO datasets.
fn add_lo_family(
    container: &mut MemoryContainer,
    element: &str,
    disk_name: &str,
    value: &ArrayD<C128>,
) {
    let nlo = value.shape()[5];
    for i in 0..nlo {
        let panel = value.index_axis(Axis(5), i).to_owned();
        container.add_dataset(
            &format!("{element}/LOcontribution/{disk_name}-{}", i + 1),
            coefficient_to_disk(&panel),
        );
    }
}

/// Two radial elements of one atom type: `l = 1` with two local orbitals and `l = 2` with one.
/// The calculation is non-collinear and stores three spin entries.
pub(crate) fn radial_container() -> MemoryContainer {
    let mut container = base_container(9, 2, true);
    container.set_attribute(ELEMENTS, "maxl", 2i64);
    let (points, weights) = semicircle_contour(RADIAL_NZ, -8.0);
    add_contour(&mut container, 1, &points, &weights);

    let nlo_max = RADIAL_LLO.len();
    for (k, l) in [(1usize, 1usize), (2, 2)] {
        let los = RADIAL_LLO
            .iter()
            .enumerate()
            .filter(|&(_, &lo_l)| lo_l as usize == l)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let nlo = los.len();
        let mut spec = ElementSpec::onsite(l as i64, 1);
        spec.sphavg = false;
        spec.n_lo = nlo as i64;
        spec.atoms = Some((1, 1));
        add_element_header(&mut container, k, &spec);

        let element = element_group(k);
        for family in ["uu", "ud", "du", "dd"] {
            container.add_dataset(
                &format!("{element}/{family}"),
                coefficient_to_disk(&radial_family(l, family, &[])),
            );
        }
        for family in ["uulo", "ulou", "dulo", "ulod"] {
            add_lo_family(
                &mut container,
                &element,
                family,
                &radial_family(l, family, &[nlo]),
            );
        }
        add_lo_family(
            &mut container,
            &element,
            "uloulop",
            &radial_family(l, "uloulo", &[nlo, nlo]),
        );

        let sp = format!("{element}/scalarProducts");
        for name in ["uu", "ud", "du", "dd"] {
            let values = (0..2)
                .map(|s| radial_scalar_product(name, s, 0, 0))
                .collect::<Vec<_>>();
            container.set_attribute(&sp, &format!("{name}n"), values);
        }
        for name in ["uulo", "ulou", "dulo", "ulod"] {
            let values = (0..2)
                .flat_map(|s| (0..nlo_max).map(move |i| radial_scalar_product(name, s, i, 0)))
                .collect::<Vec<_>>();
            container.set_attribute(&sp, &format!("{name}n"), values);
        }
        let values = (0..2)
            .flat_map(|s| {
                (0..nlo_max).flat_map(move |i| {
                    (0..nlo_max).map(move |j| radial_scalar_product("uloulop", s, i, j))
                })
            })
            .collect::<Vec<_>>();
        container.set_attribute(&sp, "uloulopn", values);
    }
    set_element_count(&mut container, 2);

    let radial = "/RadialFunctions";
    let rmsh = Array2::from_shape_fn((1, RADIAL_NR), |(_, i)| 1e-4 * (0.8 * i as f64).exp());
    let u = ArrayD::from_shape_fn(IxDyn(&[2, 1, 3, RADIAL_NR]), |idx| {
        (idx[0] + 2 * idx[2]) as f64 + 0.01 * idx[3] as f64
    });
    let d = u.mapv(|x| -x);
    let ulo = ArrayD::from_shape_fn(IxDyn(&[2, 1, nlo_max, RADIAL_NR]), |idx| {
        100.0 * idx[0] as f64 + 10.0 * idx[2] as f64 + idx[3] as f64
    });
    let llo = Array2::from_shape_vec((1, nlo_max), RADIAL_LLO.to_vec()).unwrap();
    container
        .add_dataset(&format!("{radial}/rmsh"), rmsh.into_dyn())
        .add_dataset(&format!("{radial}/u"), u)
        .add_dataset(&format!("{radial}/d"), d)
        .add_dataset(&format!("{radial}/ulo"), ulo)
        .add_dataset(&format!("{radial}/llo"), llo.into_dyn())
        .set_attribute(radial, "jri", vec![RADIAL_JRI as i64]);
    container
}

// ~~~~~~~~~~
// k-resolved
// ~~~~~~~~~~

pub(crate) const KRESOLVED_NZ: usize = 200;
pub(crate) const KRESOLVED_NK: usize = 20;

/// In-memory value of the `q`-th k panel (0-based), `[nz, 3, 3, 2, 2]`.
pub(crate) fn kresolved_panel(q: usize) -> ArrayD<C128> {
    synthetic(&[KRESOLVED_NZ, 3, 3, 2, 2], 0.37 * q as f64)
}

/// One k-resolved `l = 1` element with twenty k panels on a path.
pub(crate) fn kresolved_container() -> MemoryContainer {
    let mut container = base_container(9, 2, false);
    let (points, weights) = semicircle_contour(KRESOLVED_NZ, -12.0);
    add_contour(&mut container, 1, &points, &weights);
    let mut spec = ElementSpec::onsite(1, 1);
    spec.kresolved = Some(true);
    spec.atoms = Some((1, 1));
    add_element_header(&mut container, 1, &spec);
    // Panels are added out of order; the loader sorts them by their numeric suffix.
    for q in (0..KRESOLVED_NK).rev() {
        container.add_dataset(
            &format!("{}/kresolved-{}", element_group(1), q + 1),
            coefficient_to_disk(&kresolved_panel(q)),
        );
    }
    set_element_count(&mut container, 1);

    let kpts = "/general/kpts";
    let coordinates = Array2::from_shape_fn((KRESOLVED_NK, 3), |(k, x)| {
        if x == 0 {
            0.5 * k as f64 / (KRESOLVED_NK - 1) as f64
        } else {
            0.0
        }
    });
    container
        .add_dataset(&format!("{kpts}/coordinates"), coordinates.into_dyn())
        .add_dataset(
            &format!("{kpts}/weights"),
            Array1::from_elem(KRESOLVED_NK, 1.0 / KRESOLVED_NK as f64).into_dyn(),
        )
        .set_attribute(kpts, "kind", "path")
        .set_attribute(kpts, "specialPointIndices", vec![1i64, KRESOLVED_NK as i64])
        .set_attribute(
            kpts,
            "specialPointLabels",
            vec!["Γ".to_string(), "X".to_string()],
        );
    container
}

// ~~~
// Jij
// ~~~

pub(crate) const JIJ_NZ: usize = 64;

/// Collinear levels (eV) of the Jij fixture for spin up and spin down. Only the spin-up level
/// lies inside the contour.
pub(crate) const JIJ_LEVELS: [f64; 2] = [-2.0, 0.4];

/// Displacements (Bohr) of the two shells from atom 1 to atom 2.
pub(crate) const JIJ_SHELLS: [[f64; 3]; 2] = [[2.0, 0.0, 0.0], [2.0, 2.0, 0.0]];

/// Bxc value (Htr) used for the constant exchange field of both atom types.
pub(crate) const JIJ_BXC: f64 = 0.05;

/// Non-symmetric orbital amplitudes of the inter-site Green's function of a shell.
pub(crate) fn jij_amplitudes(shell: usize) -> Array2<f64> {
    let scale = 1.0 / (shell as f64 + 1.0);
    Array2::from_shape_fn((5, 5), |(m, mp)| {
        scale * (0.2 + 0.1 * m as f64 - 0.05 * mp as f64 + 0.03 * (m * mp) as f64)
    })
}

/// In-memory inter-site Green's function $`G_{ij}`$, `[nz, 5, 5, 2, 2]`, of a shell.
/// $`G_{ji}`$ is its orbital transpose.
pub(crate) fn jij_intersite(points: &Array1<C128>, shell: usize) -> ArrayD<C128> {
    let amplitudes = jij_amplitudes(shell);
    ArrayD::from_shape_fn(IxDyn(&[points.len(), 5, 5, 2, 2]), |idx| {
        let z = if idx[4] == 0 {
            points[idx[0]]
        } else {
            points[idx[0]].conj()
        };
        amplitudes[(idx[1], idx[2])] / (z - JIJ_LEVELS[idx[3]])
    })
}

/// Two `d` atoms of types 1 and 2 (both Fe) with on-site elements and two shells of inter-site
/// elements in both directions, plus a constant exchange field.
///
/// Element order: on-site 1, shell 1 (1→2, 2→1), on-site 2, shell 2 (1→2, 2→1).
pub(crate) fn jij_container() -> MemoryContainer {
    let mut container = base_container(9, 2, false);
    let (points, weights) = semicircle_contour(JIJ_NZ, -6.0);
    add_contour(&mut container, 1, &points, &weights);

    let onsite_levels = Array2::from_shape_fn((2, 5), |(s, _)| JIJ_LEVELS[s]);
    let onsite = pole_coefficient(&points, &onsite_levels);
    let mut k = 0;
    let mut add = |container: &mut MemoryContainer, spec: ElementSpec, g: &ArrayD<C128>| {
        k += 1;
        add_element_header(container, k, &spec);
        container.add_dataset(
            &format!("{}/sphavg", element_group(k)),
            coefficient_to_disk(g),
        );
    };

    for (shell, displacement) in JIJ_SHELLS.iter().enumerate() {
        if shell == 1 {
            let mut spec = ElementSpec::onsite(2, 2);
            spec.atoms = Some((2, 2));
            add(&mut container, spec, &onsite);
        } else {
            let mut spec = ElementSpec::onsite(2, 1);
            spec.atoms = Some((1, 1));
            add(&mut container, spec, &onsite);
        }
        let gij = jij_intersite(&points, shell);
        let mut gji = gij.clone();
        gji.swap_axes(1, 2);
        let gji = gji.as_standard_layout().to_owned();
        let reversed = displacement.map(|x| -x);

        let mut spec = ElementSpec::intersite(2, 1, 2, *displacement);
        spec.atoms = Some((1, 2));
        add(&mut container, spec, &gij);
        let mut spec = ElementSpec::intersite(2, 2, 1, reversed);
        spec.atoms = Some((2, 1));
        add(&mut container, spec, &gji);
    }
    set_element_count(&mut container, 6);

    container
        .add_dataset(
            "/atoms/atomicNumbers",
            Array1::from(vec![26.0, 26.0]).into_dyn(),
        )
        .add_dataset(
            "/atoms/equivAtomsGroup",
            Array1::from(vec![1.0, 2.0]).into_dyn(),
        );

    let nr = 30;
    let rmsh = Array2::from_shape_fn((2, nr), |(_, i)| 0.1 * (i as f64 + 1.0));
    let bxc = ArrayD::from_shape_fn(IxDyn(&[2, 1, nr, 2]), |idx| {
        if idx[3] == 0 {
            JIJ_BXC
        } else {
            0.0
        }
    });
    container
        .add_dataset("/RadialFunctions/rmsh", rmsh.into_dyn())
        .set_attribute("/RadialFunctions", "jri", vec![nr as i64, nr as i64])
        .add_dataset("/bxc/data", bxc);
    container
}

/// Largest entry-wise absolute difference between two complex arrays of equal shape.
pub(crate) fn max_abs_diff(a: &ArrayD<C128>, b: &ArrayD<C128>) -> f64 {
    assert_eq!(a.shape(), b.shape());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}
