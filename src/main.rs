use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use northwind_query::workload::{QueryStats, SearchTerms, Workload};
use northwind_query::{northwind, AppConfig, ExecutionEngine, SqliteStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs the Northwind query workload against a SQLite database
#[derive(Parser, Debug)]
#[command(name = "northwind-query", version, about)]
struct Args {
    /// Configuration file (defaults to ./northwind-query.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file, or :memory:
    #[arg(short, long)]
    database: Option<String>,

    /// Migration SQL applied after opening the database
    #[arg(short, long)]
    migrations: Option<PathBuf>,

    /// Customer company-name search terms
    #[arg(long = "customer-search", value_delimiter = ',', default_value = "ha,ar,mo,zz")]
    customer_search: Vec<String>,

    /// Product name search terms
    #[arg(long = "product-search", value_delimiter = ',', default_value = "ch,co,ra")]
    product_search: Vec<String>,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(path) = args.database {
        config.database.path = path;
    }
    if let Some(migrations) = args.migrations {
        config.database.migrations = Some(migrations);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    info!(database = %config.database.path, "opening store");
    let store = SqliteStore::from_config(&config.database)?;
    let engine = ExecutionEngine::from_config(store, &config);
    let registry = northwind()?;

    let terms = SearchTerms {
        customers: args.customer_search,
        products: args.product_search,
    };
    let stats = Workload::new(&engine, &registry).run(&terms).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", summary(&stats));
    }
    Ok(())
}

fn summary(stats: &[QueryStats]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["query", "runs", "rows", "elapsed (ms)", "avg (ms)"]);

    for s in stats {
        let total_ms = s.elapsed.as_secs_f64() * 1000.0;
        let avg_ms = if s.runs == 0 { 0.0 } else { total_ms / s.runs as f64 };
        table.add_row(vec![
            Cell::new(&s.name),
            Cell::new(s.runs).set_alignment(CellAlignment::Right),
            Cell::new(s.rows).set_alignment(CellAlignment::Right),
            Cell::new(format!("{total_ms:.2}")).set_alignment(CellAlignment::Right),
            Cell::new(format!("{avg_ms:.2}")).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}
