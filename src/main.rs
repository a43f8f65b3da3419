mod args;
mod colors;
mod config;
mod download;
mod extract;
mod fetch;
mod install;
mod launch;
mod platform;
mod probe;
mod vars;
mod version;

use crate::args::Args;
use crate::colors::*;
use crate::config::*;
use crate::fetch::{Fetcher, Outcome};
use crate::launch::OsLauncher;
use crate::platform::{Platform, PlatformConfig};
use crate::probe::NativeProbe;
use crate::vars::VarExpander;
use crate::version::BuildInfo;
use anyhow::Context;
use clap::Parser;
use std::path::{self, Path, PathBuf};
use std::time::{Duration, Instant};
use threadpool::ThreadPool;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{level_filters::*, *};
use tracing_subscriber::EnvFilter;

// Exit code used in case there were no errors.
#[doc(hidden)]
const EXIT_OK: i32 = 0;

// Exit code used in case of errors.
#[doc(hidden)]
const EXIT_NOK: i32 = 1;

/// Main entry point for the application.
fn main() {
    // enable ansi support to use colorised/styled output
    #[cfg(windows)]
    let _ = nu_ansi_term::enable_ansi_support();

    // delegate
    if let Err(err) = internal_main() {
        eprintln!("{} {err:#}", ATTENTION_COLOR.paint("Failed!"));
        std::process::exit(EXIT_NOK);
    } else {
        std::process::exit(EXIT_OK);
    }
}

// Internal main entry point for the application.
#[doc(hidden)]
fn internal_main() -> anyhow::Result<()> {
    // remember start date/time
    let start = Instant::now();

    // parse arguments
    let args = Args::parse();

    // print some information
    if !args.quiet || args.version {
        print_info();
    }

    // stop here in case only the version was requested
    if args.version {
        return Ok(());
    }

    // init tracing
    init_tracing(&args);

    // print parsed arguments
    trace!("arguments: {args:#?}");

    // resolve platform before touching anything
    let platform = Platform::resolve(args.platform.as_deref())?;
    debug!(%platform);

    // load config
    let explicit = args.config.is_some();
    let config_path = PathBuf::from(args.config.as_deref().unwrap_or(CONFIG_FILENAME));
    let config_path = path::absolute(&config_path).unwrap_or(config_path);
    let config = Config::load(&config_path, explicit).with_context(|| format!("failed to load {}", config_path.display()))?;
    if !args.quiet && config_path.exists() {
        println!("Using configuration from {}.", PATH_COLOR.paint(config_path.to_string_lossy()));
    }
    for id in config.unknown_platforms() {
        warn!(id, "ignoring configuration for unsupported platform");
    }
    debug!(?config);

    // derive base directory
    let expander = VarExpander::for_platform(platform);
    let cwd = std::env::current_dir()?;
    let basedir = match &args.directory {
        Some(directory) => cwd.join(expander.expand(directory)?.as_ref()),
        None => config.resolve_directory(&expander, &cwd)?,
    };
    let basedir = path::absolute(&basedir).unwrap_or(basedir);
    debug!(basedir = %basedir.display());

    let platform_config = platform_config(platform, &basedir, &config, &expander)?;
    trace!(?platform_config);

    let mut probe = NativeProbe::new(&platform_config);
    probe
        .bindings(config.resolve_bindings(&expander, &basedir)?) //
        .library_dirs(config.resolve_library_dirs(&expander, &basedir)?);

    // probe and fetch
    let thread_pool = ThreadPool::new(num_threads(args.threads));
    let mut fetcher = Fetcher::new(&platform_config, &probe, &OsLauncher, &thread_pool);
    fetcher.dry_run(args.dry_run);
    let outcome = fetcher.run().context("nrfjprog libraries are not usable and fetching them won't help")?;
    if let Outcome::Failed(err) = &outcome {
        debug!(?err, "fetching failed (reported)");
    }
    thread_pool.join();

    // print some statistics
    if !args.quiet {
        let elapsed = start.elapsed();
        println!("Total time: {}", format_elapsed(elapsed));
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        println!("Finished at: {}", format_now(now));
    }

    Ok(())
}

// Builds the configuration for the given platform and applies the overrides from the configuration file.
#[doc(hidden)]
fn platform_config(platform: Platform, basedir: &Path, config: &Config, expander: &VarExpander) -> anyhow::Result<PlatformConfig> {
    let mut platform_config = PlatformConfig::for_platform(platform, basedir);
    config.apply(expander, &mut platform_config)?;

    Ok(platform_config)
}

// Factor to compute the threads.
const THREADS_FACTOR: usize = 2;

// Computes the number of threads to use.
#[doc(hidden)]
fn num_threads(threads: Option<usize>) -> usize {
    // at least one thread
    let min_threads = 1;
    // at most max_threads
    let max_threads = std::thread::available_parallelism().map_or(min_threads, std::num::NonZeroUsize::get);
    // installing files is I/O bound, so we can use more threads than available parallelism
    let max_threads = max_threads * THREADS_FACTOR;
    threads.unwrap_or(max_threads).clamp(min_threads, max_threads)
}

// Formats the elapsed time with a resolution of seconds.
#[doc(hidden)]
fn format_elapsed(elapsed: Duration) -> String {
    // null out everything below seconds
    let elapsed = Duration::from_secs(elapsed.as_secs());

    // format the remaining duration
    humantime::format_duration(elapsed).to_string()
}

// Formats the given date/time in the local offset (or UTC).
#[doc(hidden)]
fn format_now(now: OffsetDateTime) -> String {
    // define format
    const FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]");

    // local offset or UTC
    let offset = UtcOffset::current_local_offset();
    let offset = offset.unwrap_or(UtcOffset::UTC);
    trace!(?offset);

    // format
    let now = now.to_offset(offset);
    now.format(&FORMAT).unwrap_or(now.to_string())
}

// Prints some information (version, path of executable, etc.).
#[doc(hidden)]
fn print_info() {
    let info = BuildInfo::default();
    if let Ok(exe) = std::env::current_exe() {
        let exe = PATH_COLOR.paint(exe.to_string_lossy());
        println!("{info} [{exe}]");
    } else {
        println!("{info}");
    }
}

// Initialises the tracing framework based on given command line arguments.
#[doc(hidden)]
fn init_tracing(args: &Args) {
    // falls back to the verbosity from the command line if RUST_LOG has not been set
    let level_filter = match args.verbose {
        0 => LevelFilter::ERROR.into(),
        1 => LevelFilter::WARN.into(),
        2 => LevelFilter::INFO.into(),
        3 => LevelFilter::DEBUG.into(),
        _ => LevelFilter::TRACE.into(),
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level_filter);
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();
}
