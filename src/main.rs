use clap::{ArgAction, Parser, Subcommand};
use sitegraph::{config, output, pipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("SITEGRAPH_ON_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("SITEGRAPH_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "sitegraph")]
#[command(about = "Content-graph build pipeline with per-locale fan-out")]
#[command(long_about = "\
Content-graph build pipeline with per-locale fan-out

Every file in the site directory becomes a node; pages, stylesheets and
scripts are parsed and linked by the references they make. With locales
configured, each entry page and everything it depends on that mentions
the locale is copied once per locale and rewritten.

Site structure:

  site/
  ├── sitegraph.toml      # Config (optional)
  ├── strings.i18n        # Translations: { \"key\": { \"en\": \"…\", \"fr\": \"…\" } }
  ├── index.html          # Top-level pages are entry points
  ├── css/site.css        # html[lang|=\"fr\"] rules are compiled per locale
  └── js/app.js           # TR('key') and LOCALEID are substituted per locale

Locale copies are written next to their originals: index.html → index.fr.html.

Run 'sitegraph gen-config' to generate a documented sitegraph.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site directory
    #[arg(long, default_value = "site", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: scan → fan-out → emit
    Build,
    /// Scan the site and show what each entry point would localize
    Check,
    /// Print a stock sitegraph.toml with all options documented
    GenConfig,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sitegraph={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build => {
            println!(
                "==> Building {} → {}",
                cli.source.display(),
                cli.output.display()
            );
            let report = pipeline::build(&cli.source, &cli.output)?;
            output::print_build_output(&report);
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let report = pipeline::check(&cli.source)?;
            output::print_check_output(&report);
            println!("==> Site is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
