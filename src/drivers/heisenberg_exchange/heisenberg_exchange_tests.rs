use approx::assert_relative_eq;
use ndarray::Array2;

use crate::drivers::heisenberg_exchange::{
    ExchangeTable, HeisenbergDriver, HeisenbergParams, HeisenbergResult,
};
use crate::drivers::GreensfDriver;
use crate::greensfunction::fixtures::jij_container;
use crate::heisenberg::{calculate_heisenberg_jij, ExchangeMode, MomentDirection, OnsiteDelta};
use crate::io::{read_greensf_binary, GreensfFileType};

#[test]
fn test_drivers_heisenberg_scalar() {
    let _ = env_logger::builder().is_test(true).try_init();
    let container = jij_container();
    let delta = OnsiteDelta::Scalar(Array2::from_elem((2, 4), 1.8348));
    let params = HeisenbergParams::builder()
        .reference_atom(1)
        .max_shells(Some(1))
        .build()
        .unwrap();
    let mut driver = HeisenbergDriver::builder()
        .parameters(&params)
        .source(&container)
        .onsite_delta(Some(&delta))
        .build()
        .unwrap();
    assert!(driver.result().is_err());
    driver.run().unwrap();

    let expected = calculate_heisenberg_jij(&container, 1, Some(&delta), Some(1), None).unwrap();
    let heisenberg_res = driver.result().unwrap();
    assert_eq!(heisenberg_res.parameters.mode, ExchangeMode::Scalar);
    assert_eq!(heisenberg_res.table, ExchangeTable::Scalar(expected));
    assert!(heisenberg_res.to_string().contains("Fe-1"));
}

#[test]
fn test_drivers_heisenberg_tensor_saved() {
    let container = jij_container();
    let name = std::env::temp_dir().join(format!("greensf-driver-{}", std::process::id()));
    let params = HeisenbergParams::builder()
        .reference_atom(1)
        .mode(ExchangeMode::Tensor)
        .moment_direction(Some(MomentDirection::Z))
        .result_save_name(Some(name.to_string_lossy().to_string()))
        .build()
        .unwrap();
    assert!(params.to_string().contains("Decompose exchange tensors: yes"));
    assert!(params.to_string().contains(".greensf.jten"));

    // The exchange splitting is assembled from the Bxc field of the container.
    let mut driver = HeisenbergDriver::builder()
        .parameters(&params)
        .source(&container)
        .build()
        .unwrap();
    driver.run().unwrap();
    let heisenberg_res = driver.result().unwrap();
    let ExchangeTable::Tensor(records) = &heisenberg_res.table else {
        panic!("Expected a tensor table.");
    };
    assert_eq!(records.len(), 2);
    for record in records.iter() {
        let decomposition = record.decomposition.as_ref().unwrap();
        assert_relative_eq!(
            decomposition.j_ij,
            0.5 * (record.tensor[0][0] + record.tensor[1][1]),
            max_relative = 1e-12
        );
    }

    let saved: HeisenbergResult = read_greensf_binary(&name, GreensfFileType::Tensor).unwrap();
    assert_eq!(saved.table, heisenberg_res.table);
    assert_eq!(saved.parameters.reference_atom, 1);
    std::fs::remove_file(GreensfFileType::Tensor.path(&name)).unwrap();
}

#[test]
fn test_drivers_heisenberg_errors() {
    let container = jij_container();
    let params = HeisenbergParams::builder().reference_atom(1).build().unwrap();
    let loaded = crate::heisenberg::shells::intersite_shells_from_file(&container, 1, false, None)
        .unwrap()
        .flat_map(|triple| {
            let (_, gij, gji) = triple.unwrap();
            [gij, gji]
        })
        .collect::<Vec<_>>();

    // Loaded Green's functions cannot provide an exchange splitting on their own.
    let mut driver = HeisenbergDriver::builder()
        .parameters(&params)
        .source(&loaded)
        .build()
        .unwrap();
    assert!(driver.run().is_err());
    assert!(driver.result().is_err());

    assert!(HeisenbergParams::builder().build().is_err());
}
