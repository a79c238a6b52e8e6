//! pgdrift command line.

mod headless;

use facet::Facet;
use facet_args as args;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

/// PostgreSQL schema differ and DDL generator.
#[derive(Facet, Debug)]
struct Cli {
    /// Show version information
    #[facet(args::named, args::short = 'V')]
    version: bool,

    /// Show verbose output (debug logging)
    #[facet(args::named, args::short = 'v')]
    verbose: bool,

    /// Command to run
    #[facet(default, args::subcommand)]
    command: Option<Command>,
}

/// Available commands
#[derive(Facet, Debug)]
#[repr(u8)]
enum Command {
    /// Generate the diff between two schemas using a disposable Postgres container
    DiffHeadless {
        /// SQL to run in both databases before comparison
        #[facet(default, args::named)]
        initial_sql: Option<String>,

        /// SQL that builds the source (master) schema
        #[facet(default, args::named)]
        master_sql: Option<String>,

        /// SQL that builds the target (branch) schema
        #[facet(default, args::named)]
        branch_sql: Option<String>,

        /// PostgreSQL image to use (default: postgres:17)
        #[facet(default, args::named, args::short = 'i')]
        postgres_image: Option<String>,

        /// Output file for the generated DDL (default: stdout)
        #[facet(default, args::named, args::short = 'o')]
        output: Option<String>,

        /// Verify the generated DDL with a roundtrip test (the default)
        #[facet(args::named)]
        verify: bool,

        /// Skip the roundtrip verification
        #[facet(args::named)]
        no_verify: bool,
    },
    /// Print version and host information
    Info,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    let result: Result<Cli, _> = args::from_slice(&args_ref);

    match result {
        Ok(cli) => std::process::exit(run(cli)),
        Err(err) if err.is_help_request() => {
            print!("{}", err.help_text().unwrap_or(""));
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> i32 {
    init_tracing(cli.verbose);

    if cli.version {
        println!("pgdrift {}", env!("CARGO_PKG_VERSION"));
        return 0;
    }

    match cli.command {
        Some(Command::DiffHeadless {
            initial_sql,
            master_sql,
            branch_sql,
            postgres_image,
            output,
            verify: _,
            no_verify,
        }) => headless::run(headless::Options {
            initial_sql: initial_sql.unwrap_or_default(),
            master_sql: master_sql.unwrap_or_default(),
            branch_sql: branch_sql.unwrap_or_default(),
            postgres_image: postgres_image.unwrap_or_else(|| "postgres:17".to_string()),
            output: output.map(camino::Utf8PathBuf::from),
            verify: !no_verify,
            verbose: cli.verbose,
        }),
        Some(Command::Info) => {
            println!("pgdrift {}", env!("CARGO_PKG_VERSION"));
            println!("host: {} {}", std::env::consts::OS, std::env::consts::ARCH);
            println!("time: {}", jiff::Zoned::now());
            0
        }
        None => {
            eprintln!("{}", "no command given; try --help".yellow());
            1
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
