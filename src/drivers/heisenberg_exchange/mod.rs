//! Driver for Heisenberg exchange constants.

use std::fmt;

use anyhow::{self, format_err};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::drivers::GreensfDriver;
use crate::heisenberg::{
    calculate_heisenberg_jij, calculate_heisenberg_tensor, decompose_jij_tensor,
    write_jij_table, write_tensor_table, ExchangeMode, JijRecord, JijTensorRecord,
    MomentDirection, OnsiteDelta, ShellSource, TransformFn,
};
use crate::io::format::{
    greensf_output, greensf_warn, log_title, nice_bool, nice_limit, GreensfOutput,
};
use crate::io::{write_greensf_binary, GreensfFileType};

#[cfg(test)]
#[path = "heisenberg_exchange_tests.rs"]
mod heisenberg_exchange_tests;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for Heisenberg exchange calculations.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct HeisenbergParams {
    /// The 1-based atom type at the centre of the shells.
    pub reference_atom: usize,

    /// The maximum number of shells to consider. If `None`, all shells are considered.
    #[builder(default = "None")]
    pub max_shells: Option<usize>,

    /// The kind of exchange constants to calculate.
    #[builder(default = "ExchangeMode::Scalar")]
    pub mode: ExchangeMode,

    /// The direction of the magnetic moments. If given in tensor mode, the exchange tensors are
    /// decomposed relative to it.
    #[builder(default = "None")]
    pub moment_direction: Option<MomentDirection>,

    /// Optional name for saving the result as a binary file of type [`GreensfFileType::Jij`] or
    /// [`GreensfFileType::Tensor`]. If `None`, the result will not be saved.
    #[builder(default = "None")]
    pub result_save_name: Option<String>,
}

impl HeisenbergParams {
    /// Returns a builder to construct a [`HeisenbergParams`] structure.
    pub fn builder() -> HeisenbergParamsBuilder {
        HeisenbergParamsBuilder::default()
    }
}

impl fmt::Display for HeisenbergParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reference atom type: {}", self.reference_atom)?;
        writeln!(
            f,
            "Maximum number of shells: {}",
            nice_limit(self.max_shells)
        )?;
        writeln!(f, "Exchange constants: {}", self.mode)?;
        if let Some(direction) = self.moment_direction {
            writeln!(f, "Moment direction: {direction}")?;
        }
        writeln!(
            f,
            "Decompose exchange tensors: {}",
            nice_bool(self.mode == ExchangeMode::Tensor && self.moment_direction.is_some())
        )?;
        writeln!(
            f,
            "Save exchange constants to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                GreensfFileType::for_mode(self.mode)
                    .path(name)
                    .display()
                    .to_string()
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;

        Ok(())
    }
}

// ------
// Result
// ------

/// An enumerated type for the tables produced by the driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExchangeTable {
    Scalar(Vec<JijRecord>),
    Tensor(Vec<JijTensorRecord>),
}

impl ExchangeTable {
    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        match self {
            ExchangeTable::Scalar(records) => records.len(),
            ExchangeTable::Tensor(records) => records.len(),
        }
    }

    /// Checks if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A structure to contain Heisenberg exchange results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct HeisenbergResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: HeisenbergParams,

    /// The exchange table, in shell order.
    pub table: ExchangeTable,
}

impl HeisenbergResult {
    /// Returns a builder to construct a [`HeisenbergResult`] structure.
    fn builder() -> HeisenbergResultBuilder {
        HeisenbergResultBuilder::default()
    }
}

impl fmt::Display for HeisenbergResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} exchange constants around atom type {} (meV):",
            self.table.len(),
            self.parameters.reference_atom
        )?;
        match &self.table {
            ExchangeTable::Scalar(records) => write_jij_table(f, records)?,
            ExchangeTable::Tensor(records) => write_tensor_table(f, records)?,
        }
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for Heisenberg exchange calculations.
#[derive(Builder)]
pub struct HeisenbergDriver<'a> {
    /// The control parameters for the exchange calculation.
    parameters: &'a HeisenbergParams,

    /// The source of inter-site Green's functions: a container or a list of loaded Green's
    /// functions.
    source: &'a dyn ShellSource,

    /// The exchange splitting. If `None`, it is assembled by the source, if possible.
    #[builder(default = "None")]
    onsite_delta: Option<&'a OnsiteDelta>,

    /// An optional hook applied to every Green's function and exchange splitting before
    /// contraction.
    #[builder(default = "None")]
    transform: Option<TransformFn<'a>>,

    /// The result of the exchange calculation.
    #[builder(setter(skip), default = "None")]
    result: Option<HeisenbergResult>,
}

impl<'a> HeisenbergDriver<'a> {
    /// Returns a builder to construct a [`HeisenbergDriver`] structure.
    pub fn builder() -> HeisenbergDriverBuilder<'a> {
        HeisenbergDriverBuilder::default()
    }

    /// Executes the exchange calculation.
    fn calculate_exchange(&mut self) -> Result<(), anyhow::Error> {
        log_title("Heisenberg Exchange Constants");
        greensf_output!("");
        let params = self.parameters;
        params.log_output_display();

        let table = match params.mode {
            ExchangeMode::Scalar => {
                if params.moment_direction.is_some() {
                    log::debug!("The moment direction is only used to decompose tensors.");
                }
                ExchangeTable::Scalar(calculate_heisenberg_jij(
                    self.source,
                    params.reference_atom,
                    self.onsite_delta,
                    params.max_shells,
                    self.transform,
                )?)
            }
            ExchangeMode::Tensor => {
                let mut records = calculate_heisenberg_tensor(
                    self.source,
                    params.reference_atom,
                    self.onsite_delta,
                    params.max_shells,
                    self.transform,
                )?;
                if let Some(direction) = params.moment_direction {
                    decompose_jij_tensor(&mut records, direction);
                }
                ExchangeTable::Tensor(records)
            }
        };
        if table.is_empty() {
            greensf_warn!(
                "No inter-site pairs found around atom type {}.",
                params.reference_atom
            );
        }

        self.result = HeisenbergResult::builder()
            .parameters(params.clone())
            .table(table)
            .build()
            .ok();

        // Save exchange results, if requested
        if let Some(heisenberg_res) = self.result.as_ref() {
            heisenberg_res.log_output_display();
            if let Some(name) = params.result_save_name.as_ref() {
                let path = write_greensf_binary(
                    name,
                    GreensfFileType::for_mode(params.mode),
                    heisenberg_res,
                )?;
                greensf_output!("Exchange constants saved as {}.", path.display());
                greensf_output!("");
            }
        }

        Ok(())
    }
}

impl GreensfDriver for HeisenbergDriver<'_> {
    type Params = HeisenbergParams;

    type Outcome = HeisenbergResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No Heisenberg exchange results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.calculate_exchange()
    }
}
