use super::{GlobalConfiguration, OutputFormat, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gallager::cancel::CancellationToken;
use gallager::compute::{compute, ComputeParams, DEFAULT_THRESHOLD};
use gallager::constellation::{CustomPoints, Modulation};
use gallager::prior::PriorKind;
use prettytable::{row, Table};
use std::process::ExitCode;

/// Command-line mirror of [`gallager::constellation::Modulation`], needed
/// because the library enum derives `serde`'s `lowercase` renaming rather
/// than `clap::ValueEnum`.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModulationArg {
    Pam,
    Psk,
    Qam,
    Custom,
}

impl From<ModulationArg> for Modulation {
    fn from(value: ModulationArg) -> Self {
        match value {
            ModulationArg::Pam => Self::Pam,
            ModulationArg::Psk => Self::Psk,
            ModulationArg::Qam => Self::Qam,
            ModulationArg::Custom => Self::Custom,
        }
    }
}

/// Command-line mirror of [`gallager::prior::PriorKind`].
#[derive(Clone, Copy, Debug, ValueEnum)]
enum PriorArg {
    Uniform,
    MaxwellBoltzmann,
}

impl From<PriorArg> for PriorKind {
    fn from(value: PriorArg) -> Self {
        match value {
            PriorArg::Uniform => Self::Uniform,
            PriorArg::MaxwellBoltzmann => Self::MaxwellBoltzmann,
        }
    }
}

/// Computes `E0(rho)`, the Gallager error exponent `E(R)` and the block-error
/// bound `Pe` for a memoryless AWGN channel with a discrete input
/// constellation.
#[derive(Parser)]
pub struct Opts {
    /// Alphabet size M.
    #[arg(long)]
    m: usize,
    /// Modulation family.
    #[arg(long, value_enum)]
    modulation: ModulationArg,
    /// Real parts of the constellation points (only with `--modulation custom`).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    custom_re: Vec<f64>,
    /// Imaginary parts of the constellation points (only with `--modulation custom`).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    custom_im: Vec<f64>,
    /// A-priori symbol probabilities (only with `--modulation custom`).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    custom_prob: Vec<f64>,
    /// Signal-to-noise ratio, linear scale (not dB).
    #[arg(long)]
    snr: f64,
    /// Target code rate in bits per channel use, `0 < R < log2(M)`.
    #[arg(long)]
    rate: f64,
    /// Gauss-Hermite quadrature order, `2 <= N <= 200`.
    #[arg(long, default_value_t = 30)]
    quadrature_order: usize,
    /// Block length used to turn `E(R)` into the `Pe` bound.
    #[arg(long = "n", default_value_t = 100.0)]
    block_length: f64,
    /// Gradient-ascent convergence tolerance for the rho-optimiser.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
    /// A-priori symbol distribution family.
    #[arg(long, default_value = "uniform", value_enum)]
    prior: PriorArg,
    /// Maxwell-Boltzmann shaping parameter (ignored unless `--prior maxwell-boltzmann`).
    #[arg(long, default_value_t = 0.0)]
    beta: f64,
}

impl Subcommand for Opts {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let custom_points = matches!(self.modulation, ModulationArg::Custom).then(|| CustomPoints {
            re: self.custom_re.clone(),
            im: self.custom_im.clone(),
            prob: self.custom_prob.clone(),
        });

        let params = ComputeParams {
            m: self.m,
            modulation: self.modulation.into(),
            custom_points,
            snr: self.snr,
            r: self.rate,
            n: self.quadrature_order,
            block_length: self.block_length,
            threshold: self.threshold,
            prior: self.prior.into(),
            beta: self.beta,
        };

        let report = compute(&params, &CancellationToken::new())
            .context("compute() rejected the given parameters")?;

        match cfg.format {
            OutputFormat::Table => print_table(&report),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

fn print_table(report: &gallager::compute::ComputeReport) {
    let mut table = Table::new();
    table.set_titles(row![
        "Pe",
        "E0(rho*)",
        "rho*",
        "I(X;Y)",
        "R0",
        "converged",
        "iterations"
    ]);
    table.add_row(row![
        report.pe.to_string(),
        report.error_exponent.to_string(),
        report.rho_optimal.to_string(),
        report.mutual_information.to_string(),
        report.cutoff_rate.to_string(),
        report.convergence.converged.to_string(),
        report.convergence.iterations.to_string()
    ]);
    table.printstd();
}
