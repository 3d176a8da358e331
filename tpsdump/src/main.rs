//! tpsdump - print tables, rows and memos of a TopSpeed (.TPS) file

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use topspeed_engine::{Policy, Table, TpsFile, Value};

mod config;

use config::{FileConfig, Format, Overrides, Settings};

/// Read-only dumper for TopSpeed database files
#[derive(Parser, Debug)]
#[command(name = "tpsdump")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TPS file to read
    file: PathBuf,

    /// TOML file with password, policy, format and log_level
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Password for encrypted files
    #[arg(short, long)]
    password: Option<String>,

    /// strict stops at the first error, tolerant skips damaged parts
    #[arg(long)]
    policy: Option<Policy>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Log level (trace, debug, info, warn, error), RUST_LOG wins when set
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables
    Tables,
    /// Show table definitions
    Schema {
        /// Table name, all tables when omitted
        table: Option<String>,
    },
    /// Print rows with their memos joined in
    Rows {
        /// Table name, the first table when omitted
        table: Option<String>,
        /// Stop after this many rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print one memo, or write a blob to a file
    Memo {
        table: String,
        record: u32,
        index: u32,
        /// Write the raw bytes here instead of standard output
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct TableSummary<'a> {
    number: u32,
    name: &'a str,
    record_length: u16,
    fields: usize,
    memos: usize,
    indexes: usize,
}

type Tps = TpsFile<BufReader<File>>;

fn main() -> Result<()> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(
        file_config,
        Overrides {
            password: args.password.clone(),
            policy: args.policy,
            format: args.format,
            log_level: args.log_level.clone(),
        },
    );

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .with_context(|| format!("invalid log level '{}'", settings.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut tps = TpsFile::open_path(&args.file, settings.password.as_deref())
        .with_context(|| format!("opening {}", args.file.display()))?;
    info!(
        path = %args.file.display(),
        encrypted = tps.header().is_encrypted(),
        "opened TPS file"
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match args.command {
        Command::Tables => dump_tables(&mut tps, &settings, &mut out)?,
        Command::Schema { table } => dump_schema(&mut tps, table.as_deref(), &settings, &mut out)?,
        Command::Rows { table, limit } => {
            dump_rows(&mut tps, table.as_deref(), limit, &settings, &mut out)?
        }
        Command::Memo {
            table,
            record,
            index,
            out: target,
        } => dump_memo(&mut tps, &table, record, index, target, &settings, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn dump_tables(tps: &mut Tps, settings: &Settings, out: &mut impl Write) -> Result<()> {
    let tables = tps.tables(settings.policy).context("listing tables")?;
    let summaries: Vec<_> = tables
        .iter()
        .map(|t| TableSummary {
            number: t.number,
            name: &t.name,
            record_length: t.definition.record_length,
            fields: t.definition.fields.len(),
            memos: t.definition.memos.len(),
            indexes: t.definition.indexes.len(),
        })
        .collect();

    match settings.format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?,
        Format::Text => {
            for s in &summaries {
                writeln!(
                    out,
                    "{:>4}  {:<20} reclen={} fields={} memos={} indexes={}",
                    s.number, s.name, s.record_length, s.fields, s.memos, s.indexes
                )?;
            }
        }
    }
    Ok(())
}

fn dump_schema(
    tps: &mut Tps,
    name: Option<&str>,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let tables = match name {
        Some(name) => vec![tps.table(name, settings.policy)?],
        None => tps.tables(settings.policy).context("listing tables")?,
    };

    if settings.format == Format::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(&tables)?)?;
        return Ok(());
    }
    for table in &tables {
        let def = &table.definition;
        writeln!(
            out,
            "{} (table {}, driver {}, record length {})",
            table.name, table.number, def.driver_version, def.record_length
        )?;
        for field in &def.fields {
            writeln!(
                out,
                "  {:<24} {:<10} @{:<5} len={}{}",
                field.name,
                format!("{:?}", field.field_type),
                field.offset,
                field.length,
                if field.is_array() {
                    format!(" x{}", field.elements)
                } else {
                    String::new()
                }
            )?;
            for member in &field.members {
                writeln!(
                    out,
                    "    {:<22} {:<10} @{:<5} len={}",
                    member.name,
                    format!("{:?}", member.field_type),
                    member.offset,
                    member.length
                )?;
            }
        }
        for memo in &def.memos {
            let kind = if memo.is_blob() { "blob" } else { "memo" };
            writeln!(out, "  {:<24} {:<10} #{}", memo.name, kind, memo.index)?;
        }
        for index in &def.indexes {
            let fields: Vec<_> = index.key_fields.iter().map(|k| k.field_number).collect();
            writeln!(out, "  {:<24} {:<10} on {:?}", index.name, "index", fields)?;
        }
    }
    Ok(())
}

fn pick_table(tps: &mut Tps, name: Option<&str>, policy: Policy) -> Result<Table> {
    match name {
        Some(name) => Ok(tps.table(name, policy)?),
        None => tps
            .first_table(policy)?
            .context("file contains no tables"),
    }
}

fn dump_rows(
    tps: &mut Tps,
    name: Option<&str>,
    limit: Option<usize>,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let table = pick_table(tps, name, settings.policy)?;
    debug!(table = %table.name, "dumping rows");

    let mut count = 0usize;
    for row in tps
        .rows(&table, settings.policy)
        .take(limit.unwrap_or(usize::MAX))
    {
        let row = row.with_context(|| format!("reading rows of {}", table.name))?;
        match settings.format {
            Format::Json => writeln!(out, "{}", serde_json::to_string(&row)?)?,
            Format::Text => {
                write!(out, "#{}", row.record_number)?;
                for (name, value) in &row.values {
                    write!(out, " {}={}", name, text_value(value))?;
                }
                writeln!(out)?;
            }
        }
        count += 1;
    }
    info!(table = %table.name, rows = count, "done");
    Ok(())
}

fn text_value(value: &Value) -> String {
    match value {
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
        other => other.to_string(),
    }
}

fn dump_memo(
    tps: &mut Tps,
    name: &str,
    record: u32,
    index: u32,
    target: Option<PathBuf>,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let table = tps.table(name, settings.policy)?;
    let Some(value) = tps.memo(&table.definition, record, index, settings.policy)? else {
        bail!("record {} of {} has no memo {}", record, table.name, index);
    };

    let bytes = match &value {
        Value::Blob(bytes) => bytes.as_slice(),
        Value::Memo(text) => text.as_bytes(),
        other => bail!("unexpected {} value for memo", other.type_name()),
    };
    match target {
        Some(path) => {
            std::fs::write(&path, bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "memo written");
        }
        None if settings.format == Format::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?
        }
        None => {
            out.write_all(bytes)?;
            if matches!(value, Value::Memo(_)) {
                writeln!(out)?;
            }
        }
    }
    Ok(())
}
