use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::anyhow;
use geohash::{encode, Coord};
use geojson::GeoJson;

use super::{CandidateBoundary, CandidateLoader};
use crate::error::{Result, ZipMatchError};
use crate::geozip::bbox::WgsBoundingBox;

const GEOHASH_LENGTH: usize = 8;

/// Postal boundaries fetched from an ArcGIS REST feature layer, e.g. the TIGERweb ZCTA layer,
/// with an envelope query per request.
pub struct RemoteCandidateLoader {
    url: String,
    cache_dir: Option<PathBuf>,
    client: reqwest::blocking::Client,
}

impl RemoteCandidateLoader {
    pub fn new(url: &str, timeout: Duration, cache_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(cache_dir) = &cache_dir {
            fs::create_dir_all(cache_dir)?;
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent("zipmatch")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.trim_end_matches('?').to_string(),
            cache_dir,
            client,
        })
    }

    pub fn query_url(&self, bbox: &WgsBoundingBox) -> String {
        format!(
            "{}?geometry={},{},{},{}&geometryType=esriGeometryEnvelope&inSR=4326\
             &spatialRel=esriSpatialRelIntersects&outFields=*&outSR=4326&f=geojson",
            self.url, bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
        )
    }

    fn download_boundaries(&self, bbox: &WgsBoundingBox) -> anyhow::Result<String> {
        let query = self.query_url(bbox);
        log::debug!("Querying postal boundaries: {}", query);
        let response = self.client.get(&query).send()?.error_for_status()?;
        response.text().or(Err(anyhow!("No response text")))
    }

    /// Serve from the cache directory when the same box was fetched before, download otherwise.
    fn sync_boundaries(&self, bbox: &WgsBoundingBox) -> anyhow::Result<String> {
        let cache_dir = match &self.cache_dir {
            Some(cache_dir) => cache_dir,
            None => return self.download_boundaries(bbox),
        };
        let cache_filepath = cache_dir.join(get_filename_for_bbox(bbox)?);
        if cache_filepath.exists() {
            log::debug!("Local file exists for postal boundaries: {:?}", cache_filepath);
            return Ok(fs::read_to_string(&cache_filepath)?);
        }
        let contents = self.download_boundaries(bbox)?;
        write_cache_file(&cache_filepath, &contents);
        Ok(contents)
    }
}

impl CandidateLoader for RemoteCandidateLoader {
    fn load_candidates(&self, bbox: &WgsBoundingBox) -> Result<Vec<CandidateBoundary>> {
        let contents = self
            .sync_boundaries(bbox)
            .map_err(|err| ZipMatchError::CandidateSourceUnavailable(format!("{:#}", err)))?;
        parse_boundaries(&contents)
    }
}

/// Cache filename for one envelope query. The corner geohashes group files of the same area,
/// the full-precision coordinates keep every distinct box in its own file.
pub fn get_filename_for_bbox(bbox: &WgsBoundingBox) -> anyhow::Result<String> {
    let south_west_coord = Coord {
        x: bbox.min_lon,
        y: bbox.min_lat,
    };
    let north_east_coord = Coord {
        x: bbox.max_lon,
        y: bbox.max_lat,
    };
    let south_west_geohash = encode(south_west_coord, GEOHASH_LENGTH)?;
    let north_east_geohash = encode(north_east_coord, GEOHASH_LENGTH)?;
    Ok(format!(
        "{south_west_geohash}_{north_east_geohash}_{}_{}_{}_{}_zcta.geojson",
        bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
    ))
}

fn write_cache_file(cache_filepath: &Path, contents: &str) {
    // Error payloads are not cached.
    if parse_boundaries(contents).is_err() {
        return;
    }
    if let Err(err) = fs::write(cache_filepath, contents) {
        log::warn!("Could not cache postal boundaries to {:?}: {}", cache_filepath, err);
    }
}

fn parse_boundaries(contents: &str) -> Result<Vec<CandidateBoundary>> {
    match GeoJson::from_str(contents) {
        Ok(GeoJson::FeatureCollection(feature_collection)) => Ok(feature_collection.features),
        Ok(_) => Err(ZipMatchError::CandidateSourceUnavailable(
            "boundary service did not return a FeatureCollection".to_string(),
        )),
        Err(err) => Err(ZipMatchError::CandidateSourceUnavailable(format!(
            "could not parse boundary service response, {}",
            err
        ))),
    }
}
