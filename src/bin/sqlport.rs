//! sqlport: run one SQL template on any backend
//!
//! # Usage
//!
//! ```bash
//! # Show the rewritten SQL for SQL Server
//! sqlport "select * from t where c = ? limit ? offset ?" --dialect mssql --bind x,10,0
//!
//! # Execute against a database
//! sqlport "select id, name from users limit ?" --bind 5 --database-url sqlite://app.db
//!
//! # Each rewrite stage
//! sqlport explain "select * from t where d > DATE ? limit ?" --dialect oracle11g --bind 2024-01-01,10
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlport::prelude::*;
use sqlport::transpiler::{renumber, rewrite_idioms, rewrite_paging};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlport")]
#[command(version)]
#[command(about = "Portable SQL templates: one placeholder, every backend", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlport 'select * from t where c = ? limit ? offset ?' --dialect mssql --bind x,10,0
    sqlport 'select * from users where created > DATE ?' --dialect oracle --bind 2024-01-01
    sqlport 'delete from sessions where expires < now()' --database-url sqlite://app.db")]
struct Cli {
    /// The SQL template, with `?` placeholders
    template: Option<String>,

    /// Target dialect (postgres, mysql, mariadb, mssql, oracle, oci8, oracle11g, sqlite3)
    #[arg(short, long, global = true)]
    dialect: Option<String>,

    /// Arguments for the placeholders, in order
    #[arg(short, long, value_delimiter = ',', global = true)]
    bind: Vec<String>,

    /// Don't execute, just show the rewritten SQL
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Database connection URL
    #[arg(long, env = "SQLPORT_DATABASE_URL")]
    database_url: Option<String>,

    /// Config file (defaults to <config dir>/sqlport/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the template after each rewrite stage
    Explain {
        /// The SQL template to explain
        template: String,
    },
    /// Show the rule table of every dialect
    Dialects,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { template }) => explain(template, &cli),
        Some(Commands::Dialects) => {
            show_dialects();
            Ok(())
        }
        None => match &cli.template {
            Some(template) => run(template, &cli).await,
            None => {
                println!("{}", "sqlport: one placeholder, every backend".cyan().bold());
                println!();
                println!("Usage: sqlport <TEMPLATE> [OPTIONS]");
                println!();
                println!("Try: sqlport --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlport=debug" } else { "sqlport=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File config with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => Config::load()?,
    };
    if let Some(dialect) = &cli.dialect {
        config.dialect = Some(dialect.clone());
    }
    if let Some(url) = &cli.database_url {
        config.database_url = Some(url.clone());
    }
    Ok(config)
}

/// Numbers, booleans and `null` are typed; anything else is text.
fn parse_arg(raw: &str) -> SqlValue {
    if let Ok(n) = raw.parse::<i64>() {
        SqlValue::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        SqlValue::Float(f)
    } else {
        match raw {
            "true" => SqlValue::Bool(true),
            "false" => SqlValue::Bool(false),
            "null" | "NULL" => SqlValue::Null,
            _ => SqlValue::Text(raw.to_string()),
        }
    }
}

fn returns_rows(template: &str) -> bool {
    let first = template.split_whitespace().next().unwrap_or_default();
    ["select", "with", "values", "show", "pragma"]
        .iter()
        .any(|kw| first.eq_ignore_ascii_case(kw))
}

async fn run(template: &str, cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let dialect = config.dialect().context("cannot determine the dialect")?;
    if cli.verbose {
        println!("{} {} {}", "Template:".dimmed(), template.yellow(), format!("[{}]", dialect).dimmed());
    }

    let args: Vec<SqlValue> = cli.bind.iter().map(|b| parse_arg(b)).collect();
    let prepared = rewrite(dialect, template, args.clone())?;

    if cli.dry_run || config.database_url.is_none() {
        print_prepared(&prepared);
        if config.database_url.is_none() && !cli.dry_run {
            println!();
            println!(
                "{}",
                "⚠ No database URL. Use --database-url or set SQLPORT_DATABASE_URL".yellow()
            );
        }
        return Ok(());
    }

    if cli.verbose {
        print_prepared(&prepared);
        println!();
    }

    let db = Database::connect(&config).await?;
    let query = args.into_iter().fold(db.query(template), |q, arg| q.bind(arg));

    if returns_rows(template) {
        let rows = query.fetch_values().await?;
        format_output(&rows, &cli.format)?;
    } else {
        let affected = query.execute().await?;
        println!("{} {} rows affected", "✓".green(), affected);
    }
    db.close().await;

    Ok(())
}

fn print_prepared(prepared: &PreparedQuery) {
    println!("{}", "Rewritten SQL:".green().bold());
    println!("{}", prepared.text().white());

    if !prepared.args().is_empty() {
        println!();
        println!("{}", "Arguments:".cyan());
        let prefix = prepared.dialect().placeholder_prefix();
        for (i, arg) in prepared.args().iter().enumerate() {
            let label = if prefix.is_empty() { format!("#{}", i + 1) } else { format!("{}{}", prefix, i + 1) };
            println!("  {} = {}", label, arg.to_string().yellow());
        }
    }
}

fn format_output(rows: &[Vec<(String, SqlValue)>], format: &OutputFormat) -> anyhow::Result<()> {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(name, value)| (name.clone(), value.to_json()))
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            let columns: Vec<&str> = rows[0].iter().map(|(name, _)| name.as_str()).collect();
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|row| row.iter().map(|(_, v)| cell(v)).collect())
                .collect();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
            for row in &cells {
                for (w, value) in widths.iter_mut().zip(row) {
                    *w = (*w).max(value.chars().count());
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in &cells {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", v, width = w))
                    .collect();
                println!("{}", line.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
    Ok(())
}

fn cell(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

fn explain(template: &str, cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let dialect = config.dialect().context("cannot determine the dialect")?;
    let rules = dialect.rules();
    let mut args: Vec<SqlValue> = cli.bind.iter().map(|b| parse_arg(b)).collect();

    println!("{}", "sqlport rewrite".cyan().bold());
    println!();
    println!("{} {}", "Dialect:".dimmed(), rules.name.cyan());
    println!("{} {}", "Template:".dimmed(), template.yellow());
    println!();

    let text = rewrite_idioms(template, rules.idioms);
    stage("1. Idioms", &text, None);

    let text = rewrite_paging(&text, &mut args, rules.paging)?;
    stage("2. Paging", &text, Some(args.as_slice()));

    let text = renumber(&text, rules.placeholder_prefix);
    stage("3. Placeholders", &text, None);

    Ok(())
}

fn stage(title: &str, text: &str, args: Option<&[SqlValue]>) {
    println!("{}", title.green().bold());
    println!("  {}", text.white());
    if let Some(args) = args.filter(|a| !a.is_empty()) {
        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        println!("  {} [{}]", "args:".dimmed(), rendered.join(", ").yellow());
    }
    println!();
}

fn show_dialects() {
    println!("{}", "sqlport dialects".cyan().bold());
    println!();

    println!(
        "{:10} {:7} {:8} {:11} {:7} {}",
        "Name".white().bold(),
        "Prefix".white().bold(),
        "Paging".white().bold(),
        "Temporal".white().bold(),
        "Idioms".white().bold(),
        "Quoted ids".white().bold()
    );
    println!("{}", "─".repeat(60).dimmed());

    for dialect in Dialect::ALL {
        let rules = dialect.rules();
        let prefix = if rules.placeholder_prefix.is_empty() { "?" } else { rules.placeholder_prefix };
        println!(
            "{:10} {:7} {:8} {:11} {:7} {}",
            rules.name.cyan().bold(),
            prefix.yellow(),
            format!("{:?}", rules.paging),
            format!("{:?}", rules.temporal),
            rules.idioms.len(),
            (if rules.quoted_identifiers { "yes" } else { "no" }).dimmed()
        );
    }
}
