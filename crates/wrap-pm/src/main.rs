//! Wrap package manager (wrap)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use wrap_pm::archive::package_file_name;
use wrap_pm::{
    build_package, content_from_directory, Config, DependencyResolver, Environment,
    PackageCleaner, RepositoryScope, Version, WrapDescriptor,
};

#[derive(Parser)]
#[command(name = "wrap")]
#[command(about = "Wrap package manager", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the dependencies of the current project
    Resolve {
        /// Follow the descriptors of resolved packages
        #[arg(long)]
        transitive: bool,
        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove package versions that are no longer needed
    Clean {
        /// Only clean versions of this package
        name: Option<String>,
        /// Clean the system repository
        #[arg(long)]
        system: bool,
        /// Clean the project repository
        #[arg(long)]
        project: bool,
    },
    /// Build a package archive
    Build {
        /// Package name
        #[arg(long)]
        name: String,
        /// Package version
        #[arg(long)]
        version: String,
        /// Descriptor to embed
        #[arg(long)]
        descriptor: Option<PathBuf>,
        /// Directory whose files are packaged
        #[arg(long)]
        content: Option<PathBuf>,
        /// Output file (defaults to <name>-<version>.wrap)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Resolve { transitive, json } => resolve(transitive, json),
        Commands::Clean {
            name,
            system,
            project,
        } => clean(name, system, project),
        Commands::Build {
            name,
            version,
            descriptor,
            content,
            output,
        } => build(name, version, descriptor, content, output),
    }
}

fn load_environment() -> Result<Environment> {
    let config = Config::load().context("Failed to load configuration")?;
    let cwd = std::env::current_dir()?;
    Ok(Environment::discover(&cwd, &config)?)
}

fn resolve(transitive: bool, json: bool) -> Result<()> {
    let environment = load_environment()?;
    let resolver = DependencyResolver::new();
    let repositories = environment.repositories();

    let result = if transitive {
        resolver.resolve_transitive(&environment.descriptor, &repositories)
    } else {
        resolver.resolve(&environment.descriptor, &repositories)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for dependency in &result.dependencies {
            match (&dependency.package, &dependency.source) {
                (Some(package), Some(source)) => {
                    println!("{} -> {} ({})", dependency.requested, package.version, source)
                }
                _ => println!("{} -> unresolved", dependency.requested),
            }
        }
        for error in &result.errors {
            eprintln!("error: {}", error);
        }
    }

    if !result.is_success() {
        bail!("{} dependencies could not be resolved", result.errors.len());
    }
    Ok(())
}

fn clean(name: Option<String>, system: bool, project: bool) -> Result<()> {
    let mut scopes = Vec::new();
    if project || !system {
        scopes.push(RepositoryScope::Project);
    }
    if system {
        scopes.push(RepositoryScope::System);
    }

    let mut environment = load_environment()?;
    let report = PackageCleaner::new(&mut environment, DependencyResolver::new())
        .clean(name.as_deref(), &scopes);

    for notification in report.notifications() {
        println!("{}", notification);
    }
    for error in &report.errors {
        eprintln!("error: {}", error);
    }

    if !report.is_success() {
        bail!("Clean finished with {} errors", report.errors.len());
    }
    Ok(())
}

fn build(
    name: String,
    version: String,
    descriptor: Option<PathBuf>,
    content: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    Version::parse(&version).with_context(|| format!("Invalid package version '{}'", version))?;

    let descriptor_lines = match descriptor {
        Some(path) => WrapDescriptor::from_file(&path)
            .with_context(|| format!("Failed to read descriptor {}", path.display()))?
            .to_lines(),
        None => Vec::new(),
    };

    let content = match content {
        Some(dir) => content_from_directory(&dir)
            .with_context(|| format!("Failed to read content directory {}", dir.display()))?,
        None => Vec::new(),
    };

    let output = output.unwrap_or_else(|| PathBuf::from(package_file_name(&name, &version)));
    info!("Building {} with {} content entries", output.display(), content.len());

    build_package(&output, &name, &version, content, &descriptor_lines)?;
    println!("Built {}", output.display());
    Ok(())
}
