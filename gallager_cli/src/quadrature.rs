use super::{GlobalConfiguration, OutputFormat, Subcommand};
use anyhow::{Context, Result};
use clap::Parser;
use gallager::quadrature;
use prettytable::{row, Table};
use serde::Serialize;
use std::process::ExitCode;

/// Prints the Gauss-Hermite quadrature table (roots and weights) for a given
/// order. Mostly useful to sanity-check `--quadrature-order` choices for
/// `compute` without running a full optimisation.
#[derive(Parser)]
pub struct Opts {
    /// Quadrature order, `2 <= N <= 200`.
    #[arg(long)]
    n: usize,
}

#[derive(Serialize)]
struct QuadratureReport<'a> {
    n: usize,
    roots: &'a [f64],
    weights: &'a [f64],
}

impl Subcommand for Opts {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let table = quadrature::quadrature(self.n).context("failed to build quadrature table")?;

        match cfg.format {
            OutputFormat::Table => {
                let mut out = Table::new();
                out.set_titles(row!["k", "root", "weight"]);
                for (k, (&t, &w)) in table.roots.iter().zip(&table.weights).enumerate() {
                    out.add_row(row![k.to_string(), t.to_string(), w.to_string()]);
                }
                out.printstd();
            }
            OutputFormat::Json => {
                let report = QuadratureReport {
                    n: table.n,
                    roots: &table.roots,
                    weights: &table.weights,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
