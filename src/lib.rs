pub mod cache;
pub mod cli;
pub mod columns;
pub mod data;
pub mod deriver;
pub mod error;
pub mod group;
pub mod hooks;
pub mod io_utils;
pub mod merge;
pub mod migration;
pub mod pipeline;
pub mod reader;
pub mod remap;
pub mod request;
pub mod source;
pub mod store;
pub mod yaml_provider;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cache::LogInvalidator,
    cli::{
        Cli, Commands, OutputFormat, PreviewArgs, RequestArgs, SourceArgs, StoreArgs,
        StoreRequestArgs,
    },
    columns::SourceConfig,
    deriver::MigrationDeriver,
    error::IngestError,
    group::{GroupDeriver, GroupNamer, PrefixGroupNamer},
    hooks::{GroupTemplateProvider, TemplateRegistry},
    request::Request,
    source::SpreadsheetSource,
    store::{DirectoryStore, MigrationStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => handle_preview(&args),
        Commands::Fields(args) => handle_fields(&args),
        Commands::UsedColumns(args) => handle_used_columns(&args),
        Commands::Derive(args) => handle_derive(&args),
        Commands::Teardown(args) => handle_teardown(&args),
        Commands::Templates(args) => handle_templates(&args),
    }
}

/// Source configuration assembled from a stored migration, a YAML file, or
/// defaults, with command-line flags applied on top.
pub fn build_source_config(args: &SourceArgs) -> Result<SourceConfig> {
    let mut config = if let Some(id) = &args.migration {
        let dir = args
            .config_dir
            .as_ref()
            .context("--migration requires --config-dir")?;
        let store = DirectoryStore::open(dir)?;
        let migration = store
            .load(id)?
            .ok_or_else(|| IngestError::UnknownMigration(id.clone()))?;
        let group = match migration.group() {
            Some(group) => store.load_group(group)?,
            None => None,
        };
        SourceConfig::for_migration(&migration, group.as_ref())
            .with_context(|| format!("Reading source configuration of migration {id}"))?
    } else if let Some(path) = &args.source {
        yaml_provider::load_from_path(path)?
    } else {
        SourceConfig::default()
    };

    if let Some(input) = &args.input {
        config.file = Some(input.clone());
    }
    if let Some(worksheet) = &args.worksheet {
        config.worksheet = Some(worksheet.clone());
    }
    if let Some(header_row) = args.header_row {
        config.header_row = header_row;
    }
    let columns = args
        .columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect::<Vec<_>>();
    if !columns.is_empty() {
        config.columns = columns;
    }
    if let Some(name) = &args.row_index_column {
        config.row_index_column = Some(name.clone());
    }
    if let Some(delimiter) = args.delimiter {
        config.delimiter = Some(delimiter as char);
    }
    if let Some(encoding) = &args.input_encoding {
        config.encoding = Some(encoding.clone());
    }
    debug!("Source configuration: {config:?}");
    Ok(config)
}

fn handle_preview(args: &PreviewArgs) -> Result<()> {
    let config = build_source_config(&args.source)?;
    let mut source = SpreadsheetSource::new(config)?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut emitted = 0usize;
    for record in source.records()?.take(limit) {
        let record = record?;
        match args.format {
            OutputFormat::Yaml => print!("---\n{}", yaml_provider::to_string(&record)?),
            OutputFormat::Json => println!("{}", serde_json::to_string(&record)?),
        }
        emitted += 1;
    }
    source.close();
    info!("Previewed {emitted} record(s)");
    Ok(())
}

fn handle_fields(args: &PreviewArgs) -> Result<()> {
    let config = build_source_config(&args.source)?;
    let mut source = SpreadsheetSource::new(config)?;
    for field in source.fields()? {
        println!("{field}");
    }
    match source.ids() {
        Ok(ids) => {
            for (name, key) in ids {
                info!("Key field '{name}' ({})", key.key_type);
            }
        }
        Err(err) => warn!("{err}"),
    }
    Ok(())
}

fn load_request(args: &RequestArgs) -> Result<Request> {
    yaml_provider::load_from_path(&args.request)
        .with_context(|| format!("Loading request from {:?}", args.request))
}

fn handle_used_columns(args: &RequestArgs) -> Result<()> {
    let request = load_request(args)?;
    for (name, mapping) in request.migration_mappings() {
        let columns = remap::used_columns(&mapping.mappings).unique().join(", ");
        println!("{name}: {columns}");
    }
    Ok(())
}

fn handle_derive(args: &StoreRequestArgs) -> Result<()> {
    let request = load_request(&args.request)?;
    let store = DirectoryStore::open(&args.store.config_dir)?;
    let namer = PrefixGroupNamer::default();
    let invalidator = LogInvalidator;
    if request.is_eligible() {
        GroupDeriver::new(&store, &namer).create(&request)?;
    }
    MigrationDeriver::new(&store, &invalidator, &namer)
        .create_all(&request)
        .with_context(|| format!("Deriving migrations for request {}", request.id))?;
    let group = namer.derive_name(&request);
    info!(
        "Group {group} holds {} migration(s)",
        store.load_by_group(&group)?.len()
    );
    Ok(())
}

fn handle_teardown(args: &StoreRequestArgs) -> Result<()> {
    let request = load_request(&args.request)?;
    let store = DirectoryStore::open(&args.store.config_dir)?;
    let namer = PrefixGroupNamer::default();
    let invalidator = LogInvalidator;
    MigrationDeriver::new(&store, &invalidator, &namer).delete_all(&request)?;
    GroupDeriver::new(&store, &namer).delete(&request)?;
    Ok(())
}

fn handle_templates(args: &StoreArgs) -> Result<()> {
    let store = DirectoryStore::open(&args.config_dir)?;
    let mut registry = TemplateRegistry::new();
    registry.register(GroupTemplateProvider::new(&store));
    for template in registry.templates()? {
        println!("{}\t{}", template.id, template.name);
    }
    Ok(())
}
