//! A small CLI for driving the planner against a toy problem/solver pair:
//! plan a handful of lengths, print cache statistics, and round-trip wisdom
//! through a file. Exists for manual smoke-testing, not as a real transform
//! library front end.

mod toy;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use planner_core::{export_wisdom, Amnesia, PlannerFlags, StringPrinter, StringScanner};
use toy::Transform;

#[derive(Parser)]
#[command(name = "planner-wisdom", author, version, about, long_about = None)]
struct Cli {
    /// Planner impatience level: 0 is most exhaustive, higher values search less.
    #[arg(long, default_value_t = 0)]
    impatience: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a handful of lengths and print cache statistics.
    Demo {
        /// Transform lengths to plan, in order.
        #[arg(long, value_delimiter = ',', default_value = "2,4,8,16,32,64")]
        lengths: Vec<u32>,

        /// Bless every entry this run inserts, so `export` has something to write.
        #[arg(long)]
        bless: bool,
    },
    /// Plan the given lengths (blessing every entry) and write wisdom to a file.
    Export {
        #[arg(long, value_delimiter = ',', default_value = "2,4,8,16,32,64")]
        lengths: Vec<u32>,
        out: PathBuf,
    },
    /// Import wisdom from a file and report what it primed.
    Import {
        wisdom: PathBuf,
        /// Re-plan these lengths after import and report whether each was a cache hit.
        #[arg(long, value_delimiter = ',', default_value = "2,4,8,16,32,64")]
        lengths: Vec<u32>,
    },
    /// Discard cache entries: "everything", or only the unblessed ("accursed").
    Forget {
        #[arg(value_enum)]
        mode: ForgetMode,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ForgetMode {
    Everything,
    Accursed,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("reading wisdom file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing wisdom file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("importing wisdom: {0}")]
    Wisdom(#[from] planner_core::WisdomError),
}

fn precision_bytes() -> u32 {
    8 // f64, the only precision this toy problem plans for
}

fn run(cli: Cli) -> Result<(), CliError> {
    let flags = PlannerFlags::default().with_impatience(cli.impatience);

    match cli.command {
        Commands::Demo { lengths, bless } => {
            let mut flags = flags;
            if bless {
                flags = flags.with_blessing(true);
            }
            let mut planner = toy::make_planner(flags);
            for length in lengths {
                let problem = Transform {
                    length,
                    precision_bytes: precision_bytes(),
                };
                match planner.mkplan(&problem) {
                    Some(plan) => println!(
                        "length={length}: add={} mul={} fma={}",
                        plan.ops.add, plan.ops.mul, plan.ops.fma
                    ),
                    None => println!("length={length}: no plan found"),
                }
            }
            println!(
                "cache: {} entries, {} accesses, {} hits, {} rehashes",
                planner.cache_len(),
                planner.access_count(),
                planner.hit_count(),
                planner.rehash_count()
            );
        }
        Commands::Export { lengths, out } => {
            let mut planner = toy::make_planner(flags.with_blessing(true));
            for length in lengths {
                let problem = Transform {
                    length,
                    precision_bytes: precision_bytes(),
                };
                planner.mkplan(&problem);
            }
            let mut printer = StringPrinter::default();
            export_wisdom(planner.cache(), &mut printer);
            fs::write(&out, printer.out).map_err(|source| CliError::Write {
                path: out.clone(),
                source,
            })?;
            println!(
                "wrote {} blessed entries to {}",
                planner.cache().len(),
                out.display()
            );
        }
        Commands::Import { wisdom, lengths } => {
            let mut planner = toy::make_planner(flags);
            let text = fs::read_to_string(&wisdom).map_err(|source| CliError::Read {
                path: wisdom.clone(),
                source,
            })?;
            let mut scanner = StringScanner::new(&text);
            planner.import_wisdom(&mut scanner)?;
            println!("imported {} entries", planner.cache_len());

            for length in lengths {
                let problem = Transform {
                    length,
                    precision_bytes: precision_bytes(),
                };
                let access_before = planner.access_count();
                let hit_before = planner.hit_count();
                let found = planner.mkplan(&problem).is_some();
                let was_hit = planner.hit_count() > hit_before && planner.access_count() > access_before;
                println!("length={length}: found={found} cache_hit={was_hit}");
            }
        }
        Commands::Forget { mode } => {
            let mut planner = toy::make_planner(flags);
            for length in [2, 4, 8, 16, 32] {
                planner.mkplan(&Transform {
                    length,
                    precision_bytes: precision_bytes(),
                });
            }
            let before = planner.cache_len();
            planner.forget(match mode {
                ForgetMode::Everything => Amnesia::Everything,
                ForgetMode::Accursed => Amnesia::Accursed,
            });
            println!("cache: {before} -> {} entries", planner.cache_len());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
