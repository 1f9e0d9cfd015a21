//! Command-line interface for inspecting course packages.
//!
//! Reads an H5P or SCORM archive from disk, runs it through the same safe
//! extraction and resolution used by the library, and prints the result.
//! Logs go to stderr; stdout carries only command output.

use clap::{Parser, Subcommand, ValueEnum};
use coursepack::service::{package_metadata, render_asset, PackageMetadata};
use coursepack::types::{DEFAULT_MAX_ENTRIES, DEFAULT_MAX_TOTAL_BYTES};
use coursepack::{
    classify_by_contents, classify_by_extension, extract, Classification, ExtractionLimits,
    PackageType, ServiceConfig,
};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;

#[derive(Parser)]
#[command(name = "coursepack")]
#[command(version, about = "Inspect H5P and SCORM packages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a package and print its metadata
    Inspect {
        /// Package file
        file: PathBuf,

        /// Package type
        #[arg(long = "type", value_enum, default_value_t = TypeChoice::Auto)]
        package_type: TypeChoice,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Classify a package by extension and by contents
    Classify {
        /// Package file
        file: PathBuf,

        /// Expected package type
        #[arg(long, value_enum, default_value_t = TypeChoice::Auto)]
        expect: TypeChoice,
    },

    /// List the entries of a package with their sizes
    List {
        /// Package file
        file: PathBuf,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Resolve one asset of a package and write it out
    Asset {
        /// Package file
        file: PathBuf,

        /// Asset path; defaults to the entry point
        #[arg(long)]
        asset: Option<String>,

        /// Output file; defaults to stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Package type
        #[arg(long = "type", value_enum, default_value_t = TypeChoice::Auto)]
        package_type: TypeChoice,

        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TypeChoice {
    Auto,
    H5p,
    Scorm,
}

impl TypeChoice {
    fn package_type(self) -> Option<PackageType> {
        match self {
            TypeChoice::Auto => None,
            TypeChoice::H5p => Some(PackageType::H5p),
            TypeChoice::Scorm => Some(PackageType::Scorm),
        }
    }
}

#[derive(clap::Args)]
struct LimitArgs {
    /// Maximum number of archive entries
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES)]
    max_entries: usize,

    /// Maximum total decompressed size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_TOTAL_BYTES)]
    max_total_bytes: u64,
}

impl LimitArgs {
    fn limits(&self) -> Result<ExtractionLimits, Box<dyn std::error::Error>> {
        ExtractionLimits::new(self.max_entries, self.max_total_bytes)
            .ok_or_else(|| "--max-entries and --max-total-bytes must be greater than zero".into())
    }

    fn service_config(&self) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
        Ok(ServiceConfig {
            limits: self.limits()?,
            ..ServiceConfig::default()
        })
    }
}

/// Output of `inspect --json`.
#[derive(Serialize)]
struct InspectReport {
    #[serde(rename = "type")]
    package_type: PackageType,
    metadata: PackageMetadata,
}

/// Output of `classify`.
#[derive(Serialize)]
struct ClassifyReport {
    extension: Option<PackageType>,
    contents: Classification,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            file,
            package_type,
            json,
            limits,
        } => handle_inspect(&file, package_type, json, &limits),
        Commands::Classify { file, expect } => handle_classify(&file, expect),
        Commands::List { file, limits } => handle_list(&file, &limits),
        Commands::Asset {
            file,
            asset,
            out,
            package_type,
            limits,
        } => handle_asset(&file, asset.as_deref(), out.as_deref(), package_type, &limits),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Picks the package type from the explicit choice, then the contents.
fn detect_type(
    buffer: &[u8],
    choice: TypeChoice,
) -> Result<PackageType, Box<dyn std::error::Error>> {
    if let Some(package_type) = choice.package_type() {
        return Ok(package_type);
    }
    let classification = classify_by_contents(buffer, None);
    classification
        .package_type
        .ok_or_else(|| classification.reason.unwrap_or_default().into())
}

fn handle_inspect(
    file: &Path,
    choice: TypeChoice,
    as_json: bool,
    limits: &LimitArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = fs::read(file)?;
    let config = limits.service_config()?;
    let package_type = detect_type(&buffer, choice)?;

    let report = InspectReport {
        package_type,
        metadata: package_metadata(package_type, &buffer, &config)?,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Type:         {}", report.package_type);
    match &report.metadata {
        PackageMetadata::H5p(metadata) => {
            println!("Title:        {}", metadata.title);
            if let Some(library) = &metadata.main_library {
                println!("Main library: {}", library);
            }
            println!("Main file:    {}", metadata.main_file);
            if let Some(language) = &metadata.language {
                println!("Language:     {}", language);
            }
        }
        PackageMetadata::Scorm {
            title,
            version,
            organization,
            launch_file,
        } => {
            println!("Title:        {}", title);
            println!("Version:      {}", version);
            if let Some(organization) = organization {
                println!("Organization: {}", organization);
            }
            println!("Launch file:  {}", launch_file);
        }
    }
    Ok(())
}

fn handle_classify(file: &Path, expect: TypeChoice) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = fs::read(file)?;

    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let report = ClassifyReport {
        extension: classify_by_extension(&filename, None),
        contents: classify_by_contents(&buffer, expect.package_type()),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.contents.valid {
        return Err(report.contents.reason.unwrap_or_default().into());
    }
    Ok(())
}

fn handle_list(file: &Path, limits: &LimitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = fs::read(file)?;
    let entries = extract(&buffer, &std::env::temp_dir(), &limits.limits()?)?;

    let total: u64 = entries.iter().map(|entry| entry.size).sum();
    for entry in &entries {
        println!("{:>12}  {}", entry.size, entry.path);
    }
    println!("{:>12}  {} files", total, entries.len());
    Ok(())
}

fn handle_asset(
    file: &Path,
    asset: Option<&str>,
    out: Option<&Path>,
    choice: TypeChoice,
    limits: &LimitArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = fs::read(file)?;
    let config = limits.service_config()?;
    let package_type = detect_type(&buffer, choice)?;
    let package_id = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let response = render_asset(package_type, &package_id, &buffer, asset, &config)?;
    info!(
        path = %response.path,
        content_type = response.content_type,
        size = response.body.len(),
        "Resolved asset"
    );

    match out {
        Some(out) => fs::write(out, &response.body)?,
        None => std::io::stdout().write_all(&response.body)?,
    }
    Ok(())
}
