extern crate log;
pub mod api;
pub mod candidates;
pub mod error;
pub mod geofile;
pub mod geozip;
use crate::api::{resolve_request_body, STATUS_OK};
use crate::candidates::geofile_index::GeofileCandidateIndex;
use crate::candidates::remote::RemoteCandidateLoader;
use crate::candidates::CandidateLoader;
use crate::geozip::matching::PostalCodeKeys;
use crate::geozip::resolver::ZipResolver;
use anyhow::anyhow;
use clap::Parser;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use std::{fs::read_to_string, path::Path};

/// Resolve a drawn service area to the ZIP codes it covers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,

    /// Path to the request body. Read from stdin when omitted.
    #[arg(short, long)]
    request_filepath: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Debug)]
enum CandidateSourceConfig {
    Geofile {
        filepath: PathBuf,
    },
    Remote {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Deserialize, Debug)]
struct Config {
    candidate_source: CandidateSourceConfig,
    #[serde(default)]
    extra_postal_code_keys: Vec<String>,
    coverage_output: Option<PathBuf>,
}

fn build_candidate_loader(
    source: &CandidateSourceConfig,
) -> anyhow::Result<Box<dyn CandidateLoader>> {
    match source {
        CandidateSourceConfig::Geofile { filepath } => {
            let index = GeofileCandidateIndex::load_from_geofile(filepath)?;
            Ok(Box::new(index))
        }
        CandidateSourceConfig::Remote {
            url,
            timeout_secs,
            cache_dir,
        } => {
            log::info!("Querying postal boundaries from {}", url);
            let loader = RemoteCandidateLoader::new(
                url,
                Duration::from_secs(*timeout_secs),
                cache_dir.clone(),
            )?;
            Ok(Box::new(loader))
        }
    }
}

fn read_request_body(request_filepath: &Option<PathBuf>) -> anyhow::Result<String> {
    match request_filepath {
        Some(filepath) => Ok(read_to_string(filepath)?),
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            Ok(body)
        }
    }
}

fn try_main() -> anyhow::Result<bool> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)?;

    let loader = build_candidate_loader(&config.candidate_source)?;
    let resolver = ZipResolver::new(loader).with_postal_code_keys(
        PostalCodeKeys::with_extra_keys(&config.extra_postal_code_keys),
    );

    let body = read_request_body(&args.request_filepath)?;
    let (reply, resolution) = resolve_request_body(&body, &resolver);

    if let Some(resolution) = &resolution {
        log::info!(
            "{} postal codes from {} candidates ({} unions and {} candidates skipped)",
            resolution.zips.len(),
            resolution.candidate_count,
            resolution.skipped_unions,
            resolution.skipped_candidates
        );
    }
    if let (Some(coverage_output), Some(resolution)) = (&config.coverage_output, &resolution) {
        if let Some(coverage) = &resolution.coverage {
            log::info!("Writing coverage area to {:?}", coverage_output);
            geofile::geojson::write_coverage_to_geojson(
                coverage,
                &resolution.zips,
                coverage_output,
            )?;
        }
    }

    println!("{}", serde_json::to_string(&reply.response)?);
    Ok(reply.status == STATUS_OK)
}

fn main() {
    match try_main() {
        Ok(true) => (),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            std::process::exit(1)
        }
    }
}
