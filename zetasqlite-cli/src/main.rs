use std::fs;
use std::io::{self, Read};

use env_logger::Env;
use log::info;
use structopt::StructOpt;
use zetasqlite::driver::{ConnectOptions, Driver, QueryResult};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "zetasqlite",
    about = "Runs a resolved ZetaSQL (BigQuery-dialect) plan against an embedded SQLite database."
)]
struct Opt {
    /// Path to a JSON file holding the resolved plan to run. Reads from
    /// stdin if omitted.
    plan_file: Option<String>,
    /// Path to the SQLite database file; defaults to an in-memory database.
    #[structopt(long("db"))]
    db: Option<String>,
    /// Print the translated SQL instead of running it.
    #[structopt(long)]
    explain: bool,
    /// Pretty-print the translated SQL (`--explain` only).
    #[structopt(long)]
    pretty: bool,
}

fn read_plan(opt: &Opt) -> Result<String, Box<dyn std::error::Error>> {
    match &opt.plan_file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_rows(result: &QueryResult) {
    for row in &result.rows {
        let rendered: Vec<String> = row
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{name}={v:?}"),
                None => format!("{name}=NULL"),
            })
            .collect();
        println!("{}", rendered.join(" | "));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("zetasqlite=info,zetasqlite_cli=info")).init();

    let opt = Opt::from_args();
    let plan_json = read_plan(&opt)?;

    let options = ConnectOptions {
        path: opt.db.clone(),
        pretty_sql: opt.pretty,
    };
    let driver = Driver::open(&options)?;

    if opt.explain {
        println!("{}", driver.prepare(&plan_json)?);
        return Ok(());
    }

    let result = driver.query(&plan_json, None)?;
    print_rows(&result);
    info!("{} row(s)", result.rows.len());
    Ok(())
}
