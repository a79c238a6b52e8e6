//! The `diff-headless` flow: build both schemas in a disposable Postgres
//! container, diff them, and optionally verify the generated DDL by applying
//! it to the master database and re-extracting.

use std::time::Duration;

use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::{Client, NoTls};

use pgdrift::{diff, emit_all, Error};
use pgdrift_extract::extract_catalog;

pub struct Options {
    pub initial_sql: String,
    pub master_sql: String,
    pub branch_sql: String,
    pub postgres_image: String,
    pub output: Option<Utf8PathBuf>,
    pub verify: bool,
    pub verbose: bool,
}

type AnyError = Box<dyn std::error::Error>;

pub fn run(options: Options) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} {e}", "failed to start runtime:".red());
            return 1;
        }
    };
    match runtime.block_on(execute(options)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red());
            1
        }
    }
}

/// Accepts `postgres` or `postgres:<tag>`; anything else is an input error,
/// since the container module only runs the official image.
fn image_tag(image: &str) -> Option<&str> {
    match image.split_once(':') {
        None if image == "postgres" => Some("17"),
        Some(("postgres", tag)) if !tag.is_empty() => Some(tag),
        _ => None,
    }
}

async fn execute(options: Options) -> Result<i32, AnyError> {
    let Some(tag) = image_tag(&options.postgres_image) else {
        eprintln!(
            "{} unsupported image {:?}; expected postgres[:tag]",
            "invalid input:".red(),
            options.postgres_image
        );
        return Ok(1);
    };

    if options.verbose {
        eprintln!("{}", format!("starting postgres:{tag} container...").blue());
    }
    let container = Postgres::default().with_tag(tag).start().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let base = format!("host=127.0.0.1 port={port} user=postgres password=postgres");

    let admin = connect(&format!("{base} dbname=postgres")).await?;
    // One statement per call: CREATE DATABASE refuses to run inside the
    // implicit transaction a multi-statement batch gets.
    admin.batch_execute("CREATE DATABASE pgdrift_master").await?;
    admin.batch_execute("CREATE DATABASE pgdrift_branch").await?;

    let master = connect(&format!("{base} dbname=pgdrift_master")).await?;
    let branch = connect(&format!("{base} dbname=pgdrift_branch")).await?;

    if !options.initial_sql.trim().is_empty() {
        if options.verbose {
            eprintln!("{}", "running initial SQL in both databases...".blue());
        }
        master.batch_execute(&options.initial_sql).await?;
        branch.batch_execute(&options.initial_sql).await?;
    }
    if !options.master_sql.trim().is_empty() {
        master.batch_execute(&options.master_sql).await?;
    }
    if !options.branch_sql.trim().is_empty() {
        branch.batch_execute(&options.branch_sql).await?;
    }

    if options.verbose {
        eprintln!("{}", "extracting schema catalogs...".blue());
    }
    let master_catalog = extract_catalog(&master).await?;
    let branch_catalog = extract_catalog(&branch).await?;

    let changes = match diff(&master_catalog, &branch_catalog) {
        Ok(changes) => changes,
        Err(e @ Error::CyclicDependency { .. }) => {
            eprintln!("{} {e}", "cannot order changes:".red());
            return Ok(1);
        }
    };

    if changes.is_empty() {
        eprintln!("{}", "no changes detected between schemas".green());
        if let Some(path) = &options.output {
            std::fs::write(path, "")?;
        }
        return Ok(0);
    }

    let statements = emit_all(&changes);
    let sql = statements.join("\n");
    if options.verbose {
        eprintln!("{}", format!("generated {} statement(s)", statements.len()).blue());
    }

    if options.verify {
        if options.verbose {
            eprintln!("{}", "verifying roundtrip...".blue());
        }
        master.batch_execute(&sql).await?;
        let master_after = extract_catalog(&master).await?;
        let differences = branch_catalog.semantic_differences(&master_after);
        if !differences.is_empty() {
            eprintln!("{}", "verification failed; residual differences:".red());
            for difference in differences {
                eprintln!("  {difference}");
            }
            return Ok(1);
        }
        eprintln!("{}", "verification passed".green());
    }

    match &options.output {
        Some(path) => {
            std::fs::write(path, format!("{sql}\n"))?;
            eprintln!("{}", format!("wrote {path}").green());
        }
        None => println!("{sql}"),
    }
    Ok(0)
}

async fn connect(conn_str: &str) -> Result<Client, tokio_postgres::Error> {
    let mut attempts = 0;
    loop {
        match tokio_postgres::connect(conn_str, NoTls).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::debug!("connection closed: {e}");
                    }
                });
                return Ok(client);
            }
            Err(e) if attempts < 10 => {
                attempts += 1;
                tracing::debug!("connection attempt {attempts} failed: {e}, retrying");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
