#![allow(clippy::missing_errors_doc)]
#![allow(missing_docs)]

mod compute;
mod quadrature;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use enum_dispatch::enum_dispatch;
use git_version::git_version;
use std::process::ExitCode;

/// Flags shared by every subcommand.
#[derive(Parser)]
pub struct GlobalConfiguration {
    /// How to render a subcommand's result.
    #[arg(default_value = "table", long, value_enum)]
    pub format: OutputFormat,
}

/// Output rendering chosen with `--format`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, aligned table (the default).
    Table,
    /// A single JSON object on stdout, for piping into another tool.
    Json,
}

#[enum_dispatch]
pub trait Subcommand {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode>;
}

#[enum_dispatch(Subcommand)]
#[derive(Parser)]
pub enum SubcommandEnum {
    Compute(compute::Opts),
    Quadrature(quadrature::Opts),
}

#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    author,
    about,
    disable_help_subcommand = true,
    name = "gallager",
    version = git_version!(
        args = ["--always", "--dirty", "--long", "--tags"],
        cargo_prefix = "",
        fallback = env!("CARGO_PKG_VERSION")
    )
)]
pub struct Opts {
    #[command(flatten)]
    pub configuration: GlobalConfiguration,
    #[command(subcommand)]
    pub subcommand: SubcommandEnum,
}
