use clap::Parser;
use log::info;
use polyfreq::{Aggregator, DuplicatePolicy, PolyFreqError, ReportMode};

const INFO: &str = "\
calc_poly_freq: count amino-acid polymorphisms per peptide fragment
usage: calc_poly_freq -peptide_map <csv> -sample_maps <csv>[,<csv>...] -outfile <tsv> [-nonreference yes]

Output is tab-separated with no header (unless --header is given):

  reference mode:      reference_allele  position  allele:proportion ...
  non-reference mode:  fragment  reference_allele  position  allele:proportion ...
";

/// Long options historically spelled with a single dash.
const SINGLE_DASH_OPTIONS: [&str; 4] = ["peptide_map", "sample_maps", "outfile", "nonreference"];

#[derive(Parser, Debug)]
#[clap(name = "calc_poly_freq")]
#[clap(about = INFO)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// peptide map CSV with Name, Sequence, StartAA and EndAA columns
    #[arg(long = "peptide_map", required = true)]
    peptide_map: String,

    /// comma-separated list of sample CSVs with AA<position> columns
    #[arg(long = "sample_maps", required = true, value_delimiter = ',')]
    sample_maps: Vec<String>,

    /// the output file path (a .gz extension writes gzip output)
    #[arg(long, required = true)]
    outfile: String,

    /// any non-empty value (e.g. "yes") reports each peptide fragment distinctly,
    /// for when variant fragments cover the same region
    #[arg(long)]
    nonreference: Option<String>,

    /// keep the last row for duplicate fragment names instead of failing
    #[arg(long = "allow-duplicates", default_value_t = false)]
    allow_duplicates: bool,

    /// include a header line
    #[arg(long, default_value_t = false)]
    header: bool,
}

impl Cli {
    fn mode(&self) -> ReportMode {
        match self.nonreference.as_deref() {
            Some(value) if !value.is_empty() => ReportMode::NonReference,
            _ => ReportMode::Reference,
        }
    }

    fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.allow_duplicates {
            DuplicatePolicy::LastWriteWins
        } else {
            DuplicatePolicy::Fail
        }
    }
}

/// Rewrite `-peptide_map` style options to `--peptide_map` so clap accepts them.
fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if !rest.starts_with('-') && SINGLE_DASH_OPTIONS.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn calc_poly_freq(cli: &Cli) -> Result<(), PolyFreqError> {
    let aggregator =
        Aggregator::from_files(&cli.peptide_map, cli.sample_maps.as_slice(), cli.duplicate_policy())?;
    let mode = cli.mode();
    info!("building {:?} report over {} fragments", mode, aggregator.len());
    let report = aggregator.report(mode);
    report.write_tsv(&cli.outfile, cli.header)
}

fn run() -> Result<(), PolyFreqError> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));
    init_logging(cli.debug);
    calc_poly_freq(&cli)
}

fn main() {
    match run() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
