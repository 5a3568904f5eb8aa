use anyhow::Context;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use demo_pivot::analyzer::Analyzer;
use demo_pivot::analyzer::catalog::Catalog;
use demo_pivot::analyzer::change_dump::ChangeDumpBuilder;
use demo_pivot::analyzer::identity::IdentityTimelineBuilder;
use demo_pivot::analyzer::survey::{SurveyBuilder, SurveyStats};
use demo_pivot::{CaptureDocument, Extractor, ExtractorConfig, TickIndexing};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn capture_args<'a, 'b>() -> [Arg<'a, 'b>; 3] {
    [
        Arg::with_name("CAPTURE")
            .help("The decoded capture JSON to process")
            .required(true)
            .index(1),
        Arg::with_name("CONFIG")
            .help("TOML extraction config (see the `config` subcommand)")
            .short("c")
            .long("config")
            .takes_value(true),
        Arg::with_name("OUTPUT")
            .help("Write output to this file instead of stdout")
            .short("o")
            .long("output")
            .takes_value(true),
    ]
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ExtractorConfig> {
    let Some(path) = matches.value_of("CONFIG") else {
        return Ok(ExtractorConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let config: ExtractorConfig =
        toml::from_str(&contents).with_context(|| format!("failed to parse config file {path}"))?;
    Ok(config)
}

fn load_capture(matches: &ArgMatches) -> anyhow::Result<CaptureDocument> {
    let path = matches
        .value_of("CAPTURE")
        .context("no capture path given")?;
    info!("reading capture {path}");
    let data = std::fs::read(Path::new(path)).with_context(|| format!("failed to read {path}"))?;
    CaptureDocument::from_json_slice(&data).with_context(|| format!("failed to load capture {path}"))
}

fn open_output(matches: &ArgMatches) -> anyhow::Result<Box<dyn Write>> {
    Ok(match matches.value_of("OUTPUT") {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {path}"))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

fn write_json<T: Serialize + ?Sized>(matches: &ArgMatches, value: &T) -> anyhow::Result<()> {
    let mut out = open_output(matches)?;
    if matches.is_present("PRETTY") {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn build_catalog(document: &CaptureDocument) -> Catalog {
    let mut catalog = Catalog::new();
    catalog.process_all(document.records());
    catalog
}

fn run_extract(matches: &ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(matches)?;
    if matches.is_present("SPARSE") {
        config.tick_indexing = TickIndexing::Sparse;
    }
    let document = load_capture(matches)?;

    let extraction = Extractor::new(config).run(&document);
    for (kind, count) in extraction.stats().issues.iter() {
        info!("{count} x {kind}");
    }
    write_json(matches, extraction.result())
}

fn run_identifiers(matches: &ArgMatches) -> anyhow::Result<()> {
    let document = load_capture(matches)?;
    let catalog = build_catalog(&document);
    write_json(matches, catalog.identifier_map())
}

fn run_tables(matches: &ArgMatches) -> anyhow::Result<()> {
    let document = load_capture(matches)?;
    let catalog = build_catalog(&document);
    write_json(matches, catalog.table_names())
}

fn run_slots(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(matches)?;
    let document = load_capture(matches)?;
    let catalog = build_catalog(&document);

    let mut builder = IdentityTimelineBuilder::new(&catalog, &config);
    builder.process_all(document.records());
    let (timeline, _) = builder.into_parts();
    write_json(matches, &timeline)
}

fn run_changes(matches: &ArgMatches) -> anyhow::Result<()> {
    let document = load_capture(matches)?;
    let catalog = build_catalog(&document);

    let mut dump = ChangeDumpBuilder::new(&catalog).build(open_output(matches)?);
    dump.process_all(document.records());
    let written = dump.into_result().context("failed to write changes")?;
    info!("wrote {written} changes");
    Ok(())
}

fn run_survey(matches: &ArgMatches) -> anyhow::Result<()> {
    let document = load_capture(matches)?;

    let stats = Rc::new(RefCell::new(SurveyStats::new()));
    let mut survey = SurveyBuilder::new(stats.clone()).build(document.malformed_record_count());
    survey.process_all(document.records());

    let stats = stats.borrow();
    write_json(matches, &*stats)
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let pretty = Arg::with_name("PRETTY")
        .help("Pretty-print the JSON output")
        .long("pretty");

    let matches = App::new("pivotshark")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resolves player identities and properties from decoded demo captures")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("extract")
                .about("Writes tick -> steam id -> table -> field -> value as JSON")
                .args(&capture_args())
                .arg(pretty.clone())
                .arg(
                    Arg::with_name("SPARSE")
                        .help("Omit ticks with no attributed players")
                        .long("sparse"),
                ),
        )
        .subcommand(
            SubCommand::with_name("identifiers")
                .about("Writes the identifier -> field name map")
                .args(&capture_args())
                .arg(pretty.clone()),
        )
        .subcommand(
            SubCommand::with_name("tables")
                .about("Writes every data table name in the capture")
                .args(&capture_args())
                .arg(pretty.clone()),
        )
        .subcommand(
            SubCommand::with_name("slots")
                .about("Writes the per-slot account/user id timeline")
                .args(&capture_args())
                .arg(pretty.clone()),
        )
        .subcommand(
            SubCommand::with_name("changes")
                .about("Writes every property change with its resolved name, one JSON object per line")
                .args(&capture_args()),
        )
        .subcommand(
            SubCommand::with_name("survey")
                .about("Summarizes the records in a capture")
                .args(&capture_args())
                .arg(pretty),
        )
        .subcommand(
            SubCommand::with_name("config").about("Prints the default extraction config as TOML"),
        )
        .get_matches();

    match matches.subcommand() {
        ("extract", Some(sub)) => run_extract(sub),
        ("identifiers", Some(sub)) => run_identifiers(sub),
        ("tables", Some(sub)) => run_tables(sub),
        ("slots", Some(sub)) => run_slots(sub),
        ("changes", Some(sub)) => run_changes(sub),
        ("survey", Some(sub)) => run_survey(sub),
        ("config", _) => {
            print!("{}", ExtractorConfig::generate_default_toml());
            Ok(())
        }
        _ => unreachable!("clap requires a subcommand"),
    }
}
