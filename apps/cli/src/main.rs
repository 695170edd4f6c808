//! `tagql` - inspect filter expressions without a server
//!
//! ```text
//! tagql parse 'site and equipRef->siteRef->area > 1000'
//! tagql compile 'yearBuilt == 1986' --org-id 5 --user-id 2 --tags dis,area
//! echo 'site' | tagql compile - --kind-source parents-view
//! ```

use std::io::Read;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tagql_filter::{
    CompileOptions, FilterCompiler, FilterQuery, KindSource, ValueColumns, DEFAULT_MAX_PATH_DEPTH,
};

#[derive(Parser)]
#[command(name = "tagql")]
#[command(about = "Parse and compile tag filter expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the syntax tree of a filter as JSON
    Parse {
        /// Filter expression, or `-` to read stdin
        filter: String,
    },
    /// Print the SQL statement for a filter
    Compile {
        /// Filter expression, or `-` to read stdin
        filter: String,

        #[arg(long, default_value_t = 1)]
        org_id: i64,

        #[arg(long, default_value_t = 1)]
        user_id: i64,

        /// Tag names to return per entity (comma separated, `*` for all)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Schema holding the entity and tag tables
        #[arg(long, default_value = "public")]
        schema: String,

        #[arg(long, value_enum, default_value_t = KindSourceArg::Hierarchy)]
        kind_source: KindSourceArg,

        #[arg(long, default_value_t = DEFAULT_MAX_PATH_DEPTH)]
        max_path_depth: usize,

        /// entity_tag value columns to project (comma separated)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindSourceArg {
    /// Recursive CTE over tag_hierarchy
    Hierarchy,
    /// Precomputed tag_def_parents view
    ParentsView,
}

impl From<KindSourceArg> for KindSource {
    fn from(arg: KindSourceArg) -> Self {
        match arg {
            KindSourceArg::Hierarchy => KindSource::Hierarchy,
            KindSourceArg::ParentsView => KindSource::ParentsView,
        }
    }
}

fn read_filter(filter: String) -> anyhow::Result<String> {
    if filter != "-" {
        return Ok(filter);
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read filter from stdin")?;
    Ok(text.trim_end().to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { filter } => {
            let filter = read_filter(filter)?;
            let expr = tagql_filter::parse(&filter)?;
            println!("{}", serde_json::to_string_pretty(&expr)?);
        }
        Commands::Compile {
            filter,
            org_id,
            user_id,
            tags,
            schema,
            kind_source,
            max_path_depth,
            columns,
        } => {
            let filter = read_filter(filter)?;
            let columns = if columns.is_empty() {
                ValueColumns::default()
            } else {
                ValueColumns::new(columns)?
            };
            let compiler = FilterCompiler::new(
                CompileOptions {
                    kind_source: kind_source.into(),
                    max_path_depth,
                },
                columns,
            )?;

            let compiled = compiler.compile(&FilterQuery {
                filter: &filter,
                org_id,
                user_id,
                tags: &tags,
                schema: &schema,
            })?;
            println!("{}", compiled.sql);
        }
    }

    Ok(())
}
