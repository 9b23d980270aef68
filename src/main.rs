use clap::{Parser, Subcommand};
use pagepack::config::{self, BuildConfig};
use pagepack::pipeline::{self, Builder, Pipeline};
use pagepack::types::BuildMode;
use pagepack::{hooks, logger, output, watch};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let hash = env!("PAGEPACK_GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}@{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "pagepack")]
#[command(about = "Front-end asset builder for single-page apps and inline page variants")]
#[command(long_about = "\
Front-end asset builder for single-page apps and inline page variants

SPA layout (pagepack build / serve):

  www/
  ├── src/
  │   ├── main.js                # Entry, last in the main chunk
  │   ├── template.html          # Shell template (optional)
  │   ├── app/*.js               # Scripts → main chunk
  │   ├── styles/*.scss, *.css   # Stylesheets → main chunk
  │   ├── views/*.vue, *.html    # Templates → compiled into the main chunk
  │   └── node_modules/          # Vendor code → vendor chunk, never transpiled
  ├── build.html                 # Generated shell
  └── dist/                      # Generated chunks, fonts/, images/

Variant layout (pagepack variant campaigns/holiday/):

  campaigns/holiday/
  ├── js/main.js
  ├── html/index.html
  └── dist/holiday.html          # Everything inlined

Production builds minify scripts, styles and the shell, and content-hash
chunk names; images and fonts keep their own names. 'serve' reloads open
pages after each successful rebuild.
Run 'pagepack gen-config' to generate a documented pagepack.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/pagepack.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Dev server overrides.
#[derive(clap::Args, Clone, Default)]
struct ServeArgs {
    /// Dev server host
    #[arg(long)]
    host: Option<String>,

    /// Dev server port
    #[arg(long)]
    port: Option<u16>,

    /// Do not open a browser
    #[arg(long)]
    no_open: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the single-page application
    Build {
        #[arg(long, value_enum, default_value_t = BuildMode::Production)]
        mode: BuildMode,

        /// Build once in development mode instead of serving and watching
        #[arg(long)]
        no_serve: bool,

        #[command(flatten)]
        serve: ServeArgs,
    },
    /// Build a variant directory into one inline HTML document
    Variant {
        /// Variant directory, relative to the project root
        path: String,

        /// Defaults to [variant] mode in the config
        #[arg(long, value_enum)]
        mode: Option<BuildMode>,
    },
    /// Development build with dev server and rebuild on change
    Serve {
        #[command(flatten)]
        serve: ServeArgs,
    },
    /// Show what a build would do without writing anything
    Check {
        /// Check a variant instead of the SPA
        #[arg(long)]
        variant: Option<String>,

        #[arg(long, value_enum)]
        mode: Option<BuildMode>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock pagepack.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let command = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        command => command,
    };

    logger::init_logger(cli.verbose, cli.quiet);
    let mut config = config::load_config(&cli.root, cli.config.as_deref())?;
    init_thread_pool(&config.processing);

    match command {
        Command::Build {
            mode,
            no_serve,
            serve,
        } => {
            let pipeline = Pipeline::Spa { mode };
            if pipeline.is_interactive() && !no_serve {
                apply_serve_args(&mut config, serve);
                serve_and_watch(pipeline, &cli.root, config)?;
            } else {
                build_once(pipeline, &cli.root, config)?;
            }
        }
        Command::Variant { path, mode } => {
            let mode = mode.unwrap_or(config.variant.mode);
            build_once(Pipeline::Variant { path, mode }, &cli.root, config)?;
        }
        Command::Serve { serve } => {
            apply_serve_args(&mut config, serve);
            let pipeline = Pipeline::Spa {
                mode: BuildMode::Development,
            };
            serve_and_watch(pipeline, &cli.root, config)?;
        }
        Command::Check {
            variant,
            mode,
            json,
        } => {
            let pipeline = match variant {
                Some(path) => Pipeline::Variant {
                    path,
                    mode: mode.unwrap_or(config.variant.mode),
                },
                None => Pipeline::Spa {
                    mode: mode.unwrap_or(BuildMode::Production),
                },
            };
            let plan = pipeline::plan(&pipeline, &cli.root, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&output::plan_json(&plan))?);
            } else {
                output::print_plan(&plan, &cli.root);
            }
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn build_once(
    pipeline: Pipeline,
    root: &Path,
    config: BuildConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = pipeline::run_build(pipeline, root, config)?;
    output::print_build_report(&report, root);
    Ok(())
}

fn serve_and_watch(
    pipeline: Pipeline,
    root: &Path,
    config: BuildConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let hook = hooks::from_config(&config.hooks.post_build, root);
    let server = config.server.clone();
    let watch_config = config.watch.clone();
    let builder = Builder::new(pipeline, root, config).with_hook(hook);
    watch::run_dev(builder, &server, &watch_config)?;
    Ok(())
}

fn apply_serve_args(config: &mut BuildConfig, args: ServeArgs) {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_open {
        config.server.open_browser = false;
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
