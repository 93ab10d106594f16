use std::path;
use std::process;
use std::time::Instant;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use int_ext_sort::{verify_sorted, ExternalSorterBuilder, RecordGenerator, RECORD_WIDTH};

/// Read buffer size used by the `verify` subcommand.
const VERIFY_BUFFER_SIZE: usize = 4 * 1024 * 1024;

fn main() {
    let arg_parser = build_arg_parser();

    match arg_parser.subcommand() {
        Some(("sort", args)) => run_sort(args),
        Some(("generate", args)) => run_generate(args),
        Some(("verify", args)) => run_verify(args),
        _ => unreachable!("subcommand is required"),
    }
}

fn run_sort(args: &clap::ArgMatches) {
    init_logger(args.value_of_t_or_exit("log_level"));

    let input = path::Path::new(args.value_of("input").expect("value is required"));
    let output = path::Path::new(args.value_of("output").expect("value is required"));
    let memory = parse_memory_budget(args.value_of("memory").expect("value is required"))
        .expect("value is pre-validated");

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_memory_budget(memory)
        .with_preserve_input(args.is_present("preserve_input"));

    if let Some(tmp_dir) = args.value_of("tmp_dir") {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let started = Instant::now();
    match sorter.sort(input, output) {
        Ok(summary) => log::info!(
            "sorted {} records from {} runs in {:.3}s",
            summary.records,
            summary.runs,
            started.elapsed().as_secs_f64()
        ),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

fn run_generate(args: &clap::ArgMatches) {
    init_logger(args.value_of_t_or_exit("log_level"));

    let output = path::Path::new(args.value_of("output").expect("value is required"));
    let size = parse_size(args.value_of("size").expect("value is required"));
    let min: i32 = args.value_of_t_or_exit("min");
    let max: i32 = args.value_of_t_or_exit("max");
    let seed: Option<u64> = args.is_present("seed").then(|| args.value_of_t_or_exit("seed"));

    let mut generator = match RecordGenerator::new(min, max) {
        Ok(generator) => generator,
        Err(err) => {
            log::error!("generator initialization error: {}", err);
            process::exit(1);
        }
    };
    if let Some(seed) = seed {
        generator = generator.with_seed(seed);
    }

    let started = Instant::now();
    if let Err(err) = generator.generate(output, size / RECORD_WIDTH as u64) {
        log::error!("data generation error: {}", err);
        process::exit(1);
    }
    log::info!("generated {} in {:.3}s", output.display(), started.elapsed().as_secs_f64());
}

fn run_verify(args: &clap::ArgMatches) {
    init_logger(args.value_of_t_or_exit("log_level"));

    let input = path::Path::new(args.value_of("input").expect("value is required"));

    let started = Instant::now();
    let verification = match verify_sorted(input, VERIFY_BUFFER_SIZE) {
        Ok(verification) => verification,
        Err(err) => {
            log::error!("verification error: {}", err);
            process::exit(1);
        }
    };
    log::info!(
        "checked {} records in {:.3}s",
        verification.records,
        started.elapsed().as_secs_f64()
    );

    if !verification.is_sorted() {
        process::exit(1);
    }
}

fn parse_size(value: &str) -> u64 {
    value.parse::<ByteSize>().expect("value is pre-validated").as_u64()
}

fn parse_memory_budget(value: &str) -> Result<usize, String> {
    let size = value
        .parse::<ByteSize>()
        .map_err(|err| format!("memory budget format incorrect: {}", err))?;

    usize::try_from(size.as_u64()).map_err(|_| format!("memory budget {} exceeds the address space", size))
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn size_arg(name: &'static str, short: char, help: &'static str) -> clap::Arg<'static> {
    clap::Arg::new(name)
        .short(short)
        .long(name)
        .help(help)
        .required(true)
        .takes_value(true)
        .validator(|v| match v.parse::<ByteSize>() {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("size format incorrect: {}", err)),
        })
}

fn log_level_arg() -> clap::Arg<'static> {
    clap::Arg::new("log_level")
        .short('l')
        .long("loglevel")
        .help("logging level")
        .takes_value(true)
        .default_value("info")
        .possible_values(LogLevel::possible_values())
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("int-ext-sort")
        .about("external merge sort for files of 4-byte big-endian integers")
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            clap::App::new("sort")
                .about("sort a record file")
                .arg(
                    clap::Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("file to be sorted")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("memory")
                        .short('m')
                        .long("memory")
                        .help("total memory budget")
                        .required(true)
                        .takes_value(true)
                        .validator(parse_memory_budget),
                )
                .arg(
                    clap::Arg::new("preserve_input")
                        .short('p')
                        .long("preserve-input")
                        .help("build runs in a scratch copy instead of rewriting the input file"),
                )
                .arg(
                    clap::Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory to be used to store the scratch copy")
                        .takes_value(true),
                )
                .arg(log_level_arg()),
        )
        .subcommand(
            clap::App::new("generate")
                .about("generate a file of random records")
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("file to be generated")
                        .required(true)
                        .takes_value(true),
                )
                .arg(size_arg("size", 's', "file size, rounded down to whole records"))
                .arg(
                    clap::Arg::new("min")
                        .long("min")
                        .help("smallest generated value")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("0"),
                )
                .arg(
                    clap::Arg::new("max")
                        .long("max")
                        .help("upper bound of generated values, exclusive")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("1000"),
                )
                .arg(
                    clap::Arg::new("seed")
                        .long("seed")
                        .help("random generator seed")
                        .takes_value(true),
                )
                .arg(log_level_arg()),
        )
        .subcommand(
            clap::App::new("verify")
                .about("check that a record file is sorted")
                .arg(
                    clap::Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("file to be checked")
                        .required(true)
                        .takes_value(true),
                )
                .arg(log_level_arg()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
