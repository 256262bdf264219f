//! Command-line interface for eggtrack.
//!
//! This module provides the CLI structure for the `eggtrack` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, DeleteCommand, EggNumberCommand, ListCommand, PdfCommand,
    QrCommand, ServeCommand, SheetCommand, StatusCommand,
};

/// eggtrack - Egg labels with sequential ids and QR codes
///
/// Runs the label server and performs operator tasks against the
/// configured entry store.
#[derive(Debug, Parser)]
#[command(name = "eggtrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// Show store status
    Status(StatusCommand),

    /// List entries
    List(ListCommand),

    /// Add an entry
    Add(AddCommand),

    /// Delete an entry by id
    Delete(DeleteCommand),

    /// Show or set the next egg number
    EggNumber(EggNumberCommand),

    /// Write a QR code PNG
    Qr(QrCommand),

    /// Write the label PDF of one entry
    Pdf(PdfCommand),

    /// Write a PDF sheet of all labels
    Sheet(SheetCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use crate::view::CellPosition;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "eggtrack");
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["eggtrack", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind, Some("0.0.0.0:8080".parse().unwrap())),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_add_without_egg_id() {
        let cli =
            Cli::try_parse_from(["eggtrack", "add", "--name", "Alice", "--cage", "B12"]).unwrap();
        match cli.command {
            Command::Add(cmd) => {
                assert_eq!(cmd.name, "Alice");
                assert_eq!(cmd.cage, "B12");
                assert!(cmd.egg_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_add_requires_name() {
        assert!(Cli::try_parse_from(["eggtrack", "add", "--cage", "B12"]).is_err());
    }

    #[test]
    fn test_parse_egg_number_rejects_zero() {
        assert!(Cli::try_parse_from(["eggtrack", "egg-number", "--set", "0"]).is_err());
        let cli = Cli::try_parse_from(["eggtrack", "egg-number", "--set", "500"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::EggNumber(EggNumberCommand { set: Some(500) })
        ));
    }

    #[test]
    fn test_parse_list_grid_conflicts_with_json() {
        assert!(Cli::try_parse_from(["eggtrack", "list", "--grid", "--json"]).is_err());
    }

    #[test]
    fn test_parse_qr() {
        let cli = Cli::try_parse_from(["eggtrack", "qr", "https://x.test/a", "-o", "a.png"]).unwrap();
        match cli.command {
            Command::Qr(cmd) => {
                assert_eq!(cmd.link, "https://x.test/a");
                assert_eq!(cmd.output, PathBuf::from("a.png"));
                assert_eq!(cmd.size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sheet_rearrangement() {
        let cli = Cli::try_parse_from([
            "eggtrack", "sheet", "-o", "labels.pdf", "--swap", "1:1:1,1:1:2", "--move",
            "1:2:3,2:1:1", "--swap", "1:1:3,1:2:1",
        ])
        .unwrap();
        match cli.command {
            Command::Sheet(cmd) => {
                assert_eq!(cmd.swap.len(), 2);
                assert_eq!(
                    cmd.moves,
                    vec![(CellPosition::new(0, 1, 2), CellPosition::new(1, 0, 0))]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["eggtrack", "sheet", "-o", "a.pdf", "--swap", "1:1:1"]).is_err());
    }

    #[test]
    fn test_parse_config_subcommands() {
        let cli = Cli::try_parse_from(["eggtrack", "config", "path"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["eggtrack", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["eggtrack", "list", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_with_quiet() {
        let args = vec!["eggtrack", "-q", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.quiet);
    }
}
