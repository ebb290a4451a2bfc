//! Command-line interface definitions for the `kiln` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::Parser;

/// Top-level CLI for the `kiln` binary.
#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    about = "Bake a custom machine image from a temporary cloud instance",
    arg_required_else_help = true
)]
pub enum Cli {
    /// Provision an instance, snapshot it into an image, and tear it down.
    #[command(
        name = "build",
        about = "Provision an instance, snapshot it into an image, and tear it down"
    )]
    Build(BuildCommand),
}

/// Arguments for the `kiln build` subcommand.
#[derive(Debug, Parser)]
pub struct BuildCommand {
    /// Override the display name for the produced image.
    ///
    /// When omitted, a configured name is used if present, and a generated
    /// `kiln-<uuid>` name otherwise.
    #[arg(long, value_name = "NAME")]
    pub image_name: Option<String>,
}
