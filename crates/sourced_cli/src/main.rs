mod args;

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use sourced::{
    parse_max_age, BinaryCodec, Codec, CsvCodec, FetchSettings, IniCodec, JsonCodec, PageArtifact,
    ResourceBuilder, ResourceEngine, TextCodec,
};
use sourced_logging::{sourced_debug, sourced_error};

use args::{Args, Format};

const LOG_FILE: &str = "sourced.log";

fn main() -> ExitCode {
    let args = Args::parse();
    sourced_logging::initialize(args.log.into(), args.level(), Path::new(LOG_FILE));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            sourced_error!("{err:#}");
            eprintln!("sourced: error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut settings = FetchSettings::default();
    if let Some(timeout) = args.timeout.as_deref() {
        settings.request_timeout = parse_max_age(timeout).context("invalid --timeout")?;
    }
    let engine = ResourceEngine::new(settings).lock_files(!args.no_lock);
    sourced_debug!("acquiring {:?} as {:?}", args.path, args.format);

    if args.format != Format::Json && args.uses_queries() {
        bail!("--find, --pick and --next-page need --format json");
    }

    match args.format {
        Format::Json => {
            let mut builder = configure(ResourceBuilder::<Value>::new(&args.path), args);
            if let Some(query) = args.find.as_deref() {
                builder = builder.find(query);
            }
            if let Some(query) = args.pick.as_deref() {
                builder = builder.pick(query);
            }
            if let Some(query) = args.next_page.as_deref() {
                builder = builder.next_page_query(query);
            }
            let codec = match args.indent {
                Some(width) => JsonCodec::with_indent(width),
                None => JsonCodec::new(),
            };
            acquire_and_print(&engine, builder, &codec)
        }
        Format::Text => {
            let codec = if args.encoding.eq_ignore_ascii_case("detect") {
                TextCodec::detect()
            } else {
                TextCodec::for_label(&args.encoding)?
            };
            let builder = configure(ResourceBuilder::new(&args.path), args);
            acquire_and_print(&engine, builder, &codec)
        }
        Format::Binary => {
            let builder = configure(ResourceBuilder::new(&args.path), args);
            acquire_and_print(&engine, builder, &BinaryCodec)
        }
        Format::Csv => {
            let builder = configure(ResourceBuilder::new(&args.path), args);
            let codec = CsvCodec::default().encoding_label(&args.encoding)?;
            acquire_and_print(&engine, builder, &codec)
        }
        Format::Ini => {
            let builder = configure(ResourceBuilder::new(&args.path), args);
            acquire_and_print(&engine, builder, &IniCodec)
        }
    }
}

/// Options shared by every format.
fn configure<A: 'static>(mut builder: ResourceBuilder<A>, args: &Args) -> ResourceBuilder<A> {
    builder = builder.urls(args.urls.iter().cloned());
    for (name, value) in &args.headers {
        builder = builder.header(name.clone(), value.clone());
    }
    if let Some(max_age) = args.max_age.as_deref() {
        builder = builder.max_age(max_age);
    }
    if let Some(expr) = args.grep.as_deref() {
        builder = builder.grep(expr);
    }
    if let Some(limit) = args.max_pages {
        builder = builder.max_pages(limit);
    }
    builder
}

/// Acquire the artifact and write it to stdout in its stored form.
fn acquire_and_print<C>(
    engine: &ResourceEngine,
    builder: ResourceBuilder<C::Artifact>,
    codec: &C,
) -> Result<()>
where
    C: Codec,
    C::Artifact: PageArtifact + 'static,
{
    let resource = builder.build()?;
    let artifact = engine
        .acquire(&resource, codec)
        .with_context(|| format!("acquiring {}", resource.path().display()))?;
    let bytes = codec.serialize(&artifact)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
