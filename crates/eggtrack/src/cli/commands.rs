//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::view::CellPosition;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Show the label sheet grid instead of a table
    #[arg(short, long, conflicts_with = "json")]
    pub grid: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Name printed on the label
    #[arg(short, long)]
    pub name: String,

    /// Cage the egg belongs to
    #[arg(long)]
    pub cage: String,

    /// Explicit egg id; the next free one is allocated when omitted
    #[arg(short, long, value_name = "EGG_ID")]
    pub egg_id: Option<String>,

    /// Link encoded in the QR code (defaults to the link base plus egg id)
    #[arg(short, long, value_name = "URL")]
    pub link: Option<String>,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Entry id (not the egg id)
    pub id: String,
}

/// Egg number command arguments.
#[derive(Debug, Args)]
pub struct EggNumberCommand {
    /// Make the next allocated egg id `Egg-N`
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub set: Option<u64>,
}

/// QR command arguments.
#[derive(Debug, Args)]
pub struct QrCommand {
    /// Text to encode
    pub link: String,

    /// Output PNG file
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Image size in pixels (defaults to `qr.size`)
    #[arg(short, long)]
    pub size: Option<u32>,
}

/// PDF command arguments.
#[derive(Debug, Args)]
pub struct PdfCommand {
    /// Entry id
    pub id: String,

    /// Output PDF file
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Sheet command arguments.
#[derive(Debug, Args)]
pub struct SheetCommand {
    /// Output PDF file
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Exchange two cells before printing (repeatable)
    #[arg(long, value_name = "A,B", value_parser = parse_cell_pair)]
    pub swap: Vec<(CellPosition, CellPosition)>,

    /// Move a label, shifting the cells in between (repeatable, after swaps)
    #[arg(long = "move", value_name = "FROM,TO", value_parser = parse_cell_pair)]
    pub moves: Vec<(CellPosition, CellPosition)>,
}

/// Parse a one-based `PAGE:ROW:COL` cell, as printed by `list --grid`.
fn parse_cell(s: &str) -> Result<CellPosition, String> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    let [page, row, column] = parts.as_slice() else {
        return Err(format!("expected PAGE:ROW:COL, got `{s}`"));
    };
    let index = |field: &str, name: &str| -> Result<usize, String> {
        match field.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(format!("{name} must be a number starting at 1, got `{field}`")),
        }
    };
    Ok(CellPosition::new(
        index(page, "page")?,
        index(row, "row")?,
        index(column, "column")?,
    ))
}

/// Parse two cells separated by a comma.
fn parse_cell_pair(s: &str) -> Result<(CellPosition, CellPosition), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two cells separated by a comma, got `{s}`"))?;
    Ok((parse_cell(a)?, parse_cell(b)?))
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_command_debug() {
        let cmd = StatusCommand { json: true };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("json"));
    }

    #[test]
    fn test_add_command_debug() {
        let cmd = AddCommand {
            name: "Alice".to_string(),
            cage: "B12".to_string(),
            egg_id: None,
            link: None,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Alice"));
        assert!(debug_str.contains("egg_id"));
    }

    #[test]
    fn test_parse_cell_is_one_based() {
        assert_eq!(parse_cell("1:2:3"), Ok(CellPosition::new(0, 1, 2)));
        assert_eq!(parse_cell(" 2:1:1 "), Ok(CellPosition::new(1, 0, 0)));
        assert!(parse_cell("0:1:1").is_err());
        assert!(parse_cell("1:1").is_err());
        assert!(parse_cell("1:x:1").is_err());
    }

    #[test]
    fn test_parse_cell_pair() {
        assert_eq!(
            parse_cell_pair("1:1:1,1:1:3"),
            Ok((CellPosition::new(0, 0, 0), CellPosition::new(0, 0, 2)))
        );
        assert!(parse_cell_pair("1:1:1").is_err());
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
