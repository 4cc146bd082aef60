mod assets;
mod build;
mod config;
mod deploy;
mod error;
mod frontmatter;
mod loader;
mod models;
mod parser;
mod render;
mod rss;
mod server;
mod term;
mod verify;
mod writer;

use clap::{Parser as ClapParser, Subcommand};
use rust_embed::RustEmbed;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use verify::{HttpProbe, VerifyOptions};

#[derive(RustEmbed)]
#[folder = "assets/starter/"]
struct Starter;

#[derive(ClapParser)]
#[command(author, version, about = "alisite - static homepage builder for the Artificial Life Institute")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project file; optional, defaults apply when it does not exist.
    #[arg(short, long, global = true, default_value = "alisite.toml")]
    config: PathBuf,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Build the site into the output directory (the default command).
    Build {
        /// Verify links after building.
        #[arg(long)]
        check: bool,
        /// Skip external links when verifying.
        #[arg(long)]
        offline: bool,
    },
    /// Verify links in the current output directory.
    Check {
        #[arg(long)]
        offline: bool,
        /// Exit non-zero when broken links are found.
        #[arg(long)]
        strict: bool,
    },
    /// Serve the output directory and rebuild on changes.
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Quarantine the remote output and mirror the local output into it.
    Deploy,
    /// Write starter content into the current directory.
    Init,
}

fn main() -> anyhow::Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Commands::Build { check: false, offline: false });

    if let Commands::Init = command {
        println!("alisite init v{}", env!("CARGO_PKG_VERSION"));
        init_project(Path::new("."), cli.verbose)?;
        term::success("Project initialized.");
        println!("Done in {:.2}s.", start.elapsed().as_secs_f32());
        return Ok(());
    }

    let config = config::Config::load(&cli.config)?;

    match command {
        Commands::Build { check, offline } => {
            let report = build::perform_build(&config, cli.verbose)?;
            term::success(format!(
                "built {} pages and {} posts into {} in {:.2}s.",
                report.pages,
                report.posts,
                config.output_dir.display(),
                report.elapsed.as_secs_f32()
            ));
            if check {
                run_check(&config, offline, cli.verbose)?;
            }
        }
        Commands::Check { offline, strict } => {
            let broken = run_check(&config, offline, cli.verbose)?;
            if strict && broken > 0 {
                anyhow::bail!("{} broken links", broken);
            }
        }
        Commands::Serve { port } => {
            println!("alisite serve v{}", env!("CARGO_PKG_VERSION"));
            server::serve(config, port, cli.verbose)?;
        }
        Commands::Deploy => {
            deploy::run_deploy(&config, cli.verbose)?;
            term::success(format!("deployed in {:.2}s.", start.elapsed().as_secs_f32()));
        }
        Commands::Init => unreachable!(),
    }
    Ok(())
}

/// Prints the verification report and returns the number of findings.
fn run_check(config: &config::Config, offline: bool, verbose: bool) -> anyhow::Result<usize> {
    let http;
    let probe: Option<&dyn verify::ExternalProbe> = if offline || !config.verify.check_external {
        None
    } else {
        http = HttpProbe::new(Duration::from_secs(config.verify.timeout_secs))?;
        Some(&http)
    };

    term::step(verbose, 1, 1, "Checking links...");
    let broken = verify::verify_site(
        &config.output_dir,
        &VerifyOptions { probe, workers: config.verify.workers },
    )?;

    for b in &broken {
        println!("{}  {}  ({})", b.source, b.link, b.reason);
    }
    if broken.is_empty() {
        term::success("no broken links.");
    } else {
        term::warn(format!("{} broken links", broken.len()));
    }
    Ok(broken.len())
}

/// Extracts the embedded starter project without overwriting anything.
fn init_project(root: &Path, verbose: bool) -> anyhow::Result<()> {
    term::step(verbose, 1, 1, "Extracting starter content...");

    for file in Starter::iter() {
        let path = root.join(file.as_ref());
        if path.exists() {
            term::detail(verbose, "kept", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let Some(content) = Starter::get(file.as_ref()) else { continue };
        fs::write(&path, content.data)?;
        term::detail(verbose, "created", path.display());
    }
    Ok(())
}
