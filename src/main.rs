use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};
use postgrustscan::{
    ComparisonOp, ConfigOverrides, DataBatch, FilterSet, PgConnector, PostgresScanner, ProjectedColumn, ScalarValue, ScanConfig,
    ScanError, TableFilter,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parallel Postgres table scanner
#[derive(Parser, Debug)]
#[command(name = "pgscan")]
#[command(about = "Read a Postgres table through parallel binary COPY streams", long_about = None)]
struct Args {
    /// Source schema
    schema: String,

    /// Source table
    table: String,

    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// libpq-style connection string
    #[arg(short = 'c', long)]
    connection: Option<String>,

    #[arg(long)]
    pages_per_task: Option<u64>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    max_workers: Option<usize>,

    /// Evaluate filters locally instead of sending them to Postgres
    #[arg(long)]
    no_filter_pushdown: bool,

    #[arg(long)]
    log_level: Option<String>,

    /// Comma-separated column names to read (default: all)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Append the tuple id as a BIGINT column
    #[arg(long)]
    row_id: bool,

    /// Filter as COLUMN:OP[:VALUE], OP one of eq, ne, lt, gt, le, ge, null, notnull
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Print the bound schema and exit
    #[arg(long)]
    describe: bool,

    /// Stop after this many rows
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            connection_string: self.connection.clone(),
            pages_per_task: self.pages_per_task,
            batch_size: self.batch_size,
            max_workers: self.max_workers,
            filter_pushdown: self.no_filter_pushdown.then_some(false),
            log_level: self.log_level.clone(),
        }
    }
}

fn init_logging(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_filter(spec: &str, scanner: &PostgresScanner<PgConnector>) -> Result<(usize, TableFilter), ScanError> {
    let mut parts = spec.splitn(3, ':');
    let column = parts.next().unwrap_or_default();
    let op = parts.next().unwrap_or_default();
    let value = parts.next();

    let idx = scanner
        .schema()
        .position(column)
        .ok_or_else(|| ScanError::InvalidConfig(format!("unknown filter column '{column}'")))?;

    let compare = |op: ComparisonOp| {
        value
            .map(|v| TableFilter::compare(op, ScalarValue::Utf8(v.to_string())))
            .ok_or_else(|| ScanError::InvalidConfig(format!("filter '{spec}' needs a value")))
    };
    let filter = match op {
        "eq" => compare(ComparisonOp::Equal)?,
        "ne" => compare(ComparisonOp::NotEqual)?,
        "lt" => compare(ComparisonOp::LessThan)?,
        "gt" => compare(ComparisonOp::GreaterThan)?,
        "le" => compare(ComparisonOp::LessThanOrEqual)?,
        "ge" => compare(ComparisonOp::GreaterThanOrEqual)?,
        "null" => TableFilter::IsNull,
        "notnull" => TableFilter::IsNotNull,
        other => return Err(ScanError::InvalidConfig(format!("unknown filter operator '{other}'"))),
    };
    Ok((idx, filter))
}

fn print_json(names: &[String], batch: &DataBatch, limit: usize) {
    for row in 0..batch.num_rows().min(limit) {
        let object: serde_json::Map<String, serde_json::Value> = names
            .iter()
            .cloned()
            .zip(batch.row(row).iter().map(ScalarValue::to_json))
            .collect();
        println!("{}", serde_json::Value::Object(object));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = ScanConfig::load(args.config.as_deref(), &args.overrides())?;
    init_logging(&config.log_level);

    let scanner = PostgresScanner::connect(&config, &args.schema, &args.table).await?;

    if args.describe {
        let mut table = ComfyTable::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["column", "source type", "target type", "nullable"]);
        for column in scanner.schema().iter() {
            table.add_row(vec![
                Cell::new(column.name()),
                Cell::new(&column.descriptor.type_info.name),
                Cell::new(column.target_type()),
                Cell::new(column.descriptor.nullable),
            ]);
        }
        println!("{table}");
        return Ok(());
    }

    let mut projection = Vec::new();
    let mut names = Vec::new();
    if args.columns.is_empty() {
        projection.extend((0..scanner.schema().len()).map(ProjectedColumn::Column));
        names.extend(scanner.schema().names().into_iter().map(str::to_string));
    } else {
        for name in &args.columns {
            let idx = scanner
                .schema()
                .position(name)
                .ok_or_else(|| ScanError::InvalidConfig(format!("unknown column '{name}'")))?;
            projection.push(ProjectedColumn::Column(idx));
            names.push(name.clone());
        }
    }
    if args.row_id {
        projection.push(ProjectedColumn::RowId);
        names.push("rowid".to_string());
    }

    let mut filters = FilterSet::new();
    for spec in &args.filters {
        let (idx, filter) = parse_filter(spec, &scanner)?;
        filters.push(idx, filter);
    }

    let mut scan = scanner.scan(Some(projection), &filters)?;
    let mut remaining = args.limit.unwrap_or(usize::MAX);
    let mut table = ComfyTable::new();
    table.load_preset(UTF8_FULL);
    table.set_header(names.iter().map(Cell::new));
    let mut total = 0usize;

    while remaining > 0 {
        let Some(batch) = scan.next_batch().await? else {
            break;
        };
        let take = batch.num_rows().min(remaining);
        match args.format {
            OutputFormat::Json => print_json(&names, &batch, take),
            OutputFormat::Table => {
                for row in 0..take {
                    table.add_row(batch.row(row).iter().map(Cell::new));
                }
            }
        }
        remaining -= take;
        total += take;
    }

    if args.format == OutputFormat::Table {
        println!("{table}");
    }
    info!(rows = total, "scan complete");
    Ok(())
}
