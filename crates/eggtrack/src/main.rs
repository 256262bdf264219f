//! `eggtrack` - CLI for the egg label tracker
//!
//! This binary runs the label server and performs operator tasks against the
//! configured entry store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;

use eggtrack::cli::{
    AddCommand, Cli, Command, ConfigCommand, EggNumberCommand, ListCommand, QrCommand,
};
use eggtrack::http::{self, AppState};
use eggtrack::storage::{AppendOutcome, EntryStore};
use eggtrack::view::{self, SheetLayout};
use eggtrack::{ingest, init_logging, render, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // These must work even when the configuration is broken
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            return validate_config(file.as_deref().or(cli.config.as_deref()));
        }
        _ => {}
    }

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(cmd) => {
            let addr = match cmd.bind {
                Some(addr) => addr,
                None => config
                    .server
                    .bind
                    .parse()
                    .context("server.bind is not a socket address")?,
            };
            let store = EntryStore::open(&config)?;
            http::serve(AppState::new(store, config), addr).await
        }
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::List(cmd) => handle_list(&config, &cmd).await,
        Command::Add(cmd) => handle_add(&config, cmd).await,
        Command::Delete(cmd) => {
            let store = EntryStore::open(&config)?;
            if store.delete(&cmd.id).await? {
                println!("Deleted entry {}", cmd.id);
            } else {
                println!("No entry with id {}", cmd.id);
            }
            Ok(())
        }
        Command::EggNumber(cmd) => handle_egg_number(&config, cmd).await,
        Command::Qr(cmd) => handle_qr(&config, &cmd),
        Command::Pdf(cmd) => {
            let store = EntryStore::open(&config)?;
            let entry = store.get(&cmd.id).await?;
            let bytes = render::label_pdf(&entry, config.qr.margin)?;
            write_artifact(&cmd.output, &bytes)
        }
        Command::Sheet(cmd) => {
            let store = EntryStore::open(&config)?;
            let entries = store.read_all().await;
            let mut layout = SheetLayout::new(&entries, config.sheet.columns, config.sheet.rows)?;
            for (a, b) in &cmd.swap {
                layout.swap(*a, *b)?;
            }
            for (from, to) in &cmd.moves {
                layout.move_cell(*from, *to)?;
            }
            let bytes = render::sheet_pdf(&layout, config.qr.margin)?;
            write_artifact(&cmd.output, &bytes)?;
            println!("{} labels on {} page(s)", layout.len(), layout.page_count().max(1));
            Ok(())
        }
        Command::Config(ConfigCommand::Show { json }) => show_config(&config, json),
        Command::Config(_) => Ok(()),
    }
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = EntryStore::open(config)?;
    let stats = store.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("eggtrack status");
    println!("---------------");
    println!("Backend:       {}", stats.backend);
    println!("Location:      {}", stats.location);
    println!("Entries:       {}", stats.display_entries);
    println!("Reset markers: {}", stats.reset_markers);
    println!("Next egg id:   {}", stats.next_egg_id);
    match (stats.oldest_entry, stats.newest_entry) {
        (Some(oldest), Some(newest)) => {
            println!("Oldest:        {}", oldest.format("%Y-%m-%d %H:%M"));
            println!("Newest:        {}", newest.format("%Y-%m-%d %H:%M"));
        }
        _ => println!("Oldest:        -"),
    }
    match stats.digest {
        Some(digest) => println!(
            "Document:      {} bytes, blake3 {}",
            stats.document_bytes,
            &digest[..16]
        ),
        None => println!("Document:      not created yet"),
    }
    Ok(())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let store = EntryStore::open(config)?;
    let entries = store.read_all().await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&view::display_entries(&entries))?);
    } else if cmd.grid {
        let layout = SheetLayout::new(&entries, config.sheet.columns, config.sheet.rows)?;
        print!("{}", view::render_grid(&layout));
    } else {
        print!("{}", view::render_table(&entries));
    }
    Ok(())
}

async fn handle_add(config: &Config, cmd: AddCommand) -> anyhow::Result<()> {
    let store = EntryStore::open(config)?;
    let (entry, outcome) = match cmd.egg_id.as_deref() {
        Some(egg_id) => {
            let entry =
                ingest::manual_entry(config, egg_id, &cmd.name, &cmd.cage, cmd.link.as_deref())?;
            let outcome = store.append(entry.clone()).await?;
            (entry, outcome)
        }
        None => {
            ingest::add_allocated(&store, config, &cmd.name, &cmd.cage, cmd.link.as_deref())
                .await?
        }
    };

    match outcome {
        AppendOutcome::Appended => println!("Added {} ({})", entry.egg_id, entry.id),
        AppendOutcome::Duplicate => println!("{} already exists; nothing added", entry.egg_id),
    }
    Ok(())
}

async fn handle_egg_number(config: &Config, cmd: EggNumberCommand) -> anyhow::Result<()> {
    let store = EntryStore::open(config)?;
    match cmd.set {
        Some(number) => {
            let next = store.set_egg_number(number).await?;
            println!("Current egg number set to {next}");
        }
        None => println!("{}", store.current_egg_number().await),
    }
    Ok(())
}

fn handle_qr(config: &Config, cmd: &QrCommand) -> anyhow::Result<()> {
    let size = cmd.size.unwrap_or(config.qr.size);
    if size == 0 || size > eggtrack::config::MAX_QR_SIZE {
        bail!(
            "size must be between 1 and {}",
            eggtrack::config::MAX_QR_SIZE
        );
    }
    let bytes = render::png(&cmd.link, size, config.qr.margin)?;
    write_artifact(&cmd.output, &bytes)
}

fn write_artifact(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn show_config(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", config.redacted_json()?);
    } else {
        println!("Current Configuration");
        println!("=====================");
        println!();
        println!("[Server]");
        println!("  Bind:               {}", config.server.bind);
        println!("  Base URL:           {}", config.base_url());
        println!(
            "  Secret:             {}",
            if config.secret().is_some() { "set" } else { "not set" }
        );
        println!();
        println!("[Storage]");
        println!("  Backend:            {}", config.storage.backend);
        println!("  Resource path:      {}", config.storage.resource_path);
        println!("  Data dir:           {}", config.data_dir().display());
        println!("  Database path:      {}", config.database_path().display());
        if let Some(url) = &config.storage.http_url {
            println!("  HTTP store:         {url}");
        }
        println!();
        println!("[Labels]");
        println!("  Link base:          {}", config.labels.link_base);
        println!("  QR size / margin:   {} px / {}", config.qr.size, config.qr.margin);
        println!(
            "  Sheet grid:         {} x {}",
            config.sheet.columns, config.sheet.rows
        );
    }
    Ok(())
}

fn validate_config(file: Option<&Path>) -> anyhow::Result<()> {
    let path = file.map_or_else(Config::default_config_path, Path::to_path_buf);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => {
            println!("Configuration is valid.");
            Ok(())
        }
        Err(e) => bail!("configuration error: {e}"),
    }
}
