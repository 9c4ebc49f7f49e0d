#[macro_use]
extern crate log;

use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pagerank_mr::iteration::InputKind;
use pagerank_mr::{sink, source, JobConfig, JobError, PageRankJob};

/// Compute the PageRank of a graph given as `page_id<TAB>outlinks` lines.
///
/// The output has one `page_id<TAB>rank<TAB>outlinks` line per page.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input file.
    input: PathBuf,

    /// Total number of pages in the graph.
    #[arg(long)]
    num_pages: Option<usize>,

    /// Number of rounds to run.
    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    damping_factor: Option<f64>,

    /// Number of map and reduce workers of each round.
    #[arg(long)]
    parallelism: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// TOML configuration file, overridden by the command line options.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file, the standard output if missing.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The input is the output of a previous run and not a raw graph.
    #[arg(long)]
    ranked_input: bool,

    /// Directory where the output of every intermediate round is written.
    #[arg(long)]
    rounds_dir: Option<PathBuf>,
}

impl Args {
    fn job_config(&self) -> Result<JobConfig, JobError> {
        let mut config = match &self.config {
            Some(path) => JobConfig::from_file(path)?,
            None => JobConfig::default(),
        };
        if let Some(n) = self.num_pages {
            config.rank.num_pages = n;
        }
        if let Some(n) = self.iterations {
            config.rank.iterations = n;
        }
        if let Some(d) = self.damping_factor {
            config.rank.damping_factor = d;
        }
        if let Some(p) = self.parallelism {
            config.runtime.parallelism = p;
        }
        if let Some(b) = self.batch_size {
            config.runtime.batch_size = b;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(args: Args) -> Result<(), JobError> {
    let config = args.job_config()?;
    let input = source::read_lines(&args.input)?;
    let kind = if args.ranked_input {
        InputKind::Ranked
    } else {
        InputKind::Raw
    };

    if let Some(dir) = &args.rounds_dir {
        std::fs::create_dir_all(dir)?;
    }
    let mut write_error = None;
    let mut job = PageRankJob::from_config(config);
    if let Some(dir) = args.rounds_dir.clone() {
        let write_error = &mut write_error;
        job = job.observe(move |snapshot| {
            let path = dir.join(format!("round-{:03}.tsv", snapshot.round));
            if let Err(e) = sink::write_lines(&path, snapshot.lines) {
                error!("cannot write {}: {e}", path.display());
                write_error.get_or_insert(e);
            }
        });
    }
    let report = job.run_from(input, kind)?;
    drop(job);
    if let Some(e) = write_error {
        return Err(e.into());
    }

    match &args.output {
        Some(path) => sink::write_lines(path, &report.lines)?,
        None => {
            sink::write_to(stdout().lock(), &report.lines)?;
        }
    }
    info!(
        "{} pages ranked, total rank {:.6}",
        report.pages.len(),
        report.total_rank()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
