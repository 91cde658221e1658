use std::collections::BTreeSet;

use geo::Intersects;
use rayon::prelude::*;

use super::bbox::WgsBoundingBox;
use super::guard::run_guarded;
use crate::candidates::CandidateBoundary;
use crate::geofile::{feature::Feature, geojson::feature_from_geojson};

/// Property keys holding the postal code in the common ZCTA datasets, in priority order.
pub const DEFAULT_POSTAL_CODE_KEYS: [&str; 3] = ["ZCTA5CE10", "ZIP", "ZCTA"];

/// Ordered list of property keys consulted for a candidate's postal code. The first key holding
/// a usable value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalCodeKeys(Vec<String>);

impl Default for PostalCodeKeys {
    fn default() -> Self {
        Self(
            DEFAULT_POSTAL_CODE_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
        )
    }
}

impl PostalCodeKeys {
    /// The default keys followed by `extra_keys`. Extra keys never take precedence.
    pub fn with_extra_keys(extra_keys: &[String]) -> Self {
        let mut keys = Self::default();
        for key in extra_keys {
            if !keys.0.contains(key) {
                keys.0.push(key.clone());
            }
        }
        keys
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn postal_code_of(&self, feature: &Feature) -> Option<String> {
        self.0
            .iter()
            .find_map(|key| feature.property(key).and_then(postal_code_value))
    }
}

/// Strings are trimmed, integers are zero-padded to five digits since numeric columns lose the
/// leading zeros of codes such as `01001`. Anything else does not count.
fn postal_code_value(value: &geojson::JsonValue) -> Option<String> {
    match value {
        geojson::JsonValue::String(code) => {
            let code = code.trim();
            (!code.is_empty()).then(|| code.to_string())
        }
        geojson::JsonValue::Number(number) => number.as_u64().map(|code| format!("{:05}", code)),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Matched postal codes, unique and in ascending order.
    pub zips: Vec<String>,
    /// Candidates dropped because their geometry was malformed or the intersection test failed.
    pub skipped: usize,
    /// The part of `skipped` whose raw extent overlaps the coverage, i.e. candidates that might
    /// have matched.
    pub skipped_near_coverage: usize,
}

enum CandidateCheck {
    Matched(String),
    Unmatched,
    Skipped { near_coverage: bool },
}

/// Collect the postal codes of every candidate intersecting `coverage`.
///
/// Candidates are tested independently. A malformed candidate is counted in
/// `MatchOutcome::skipped` and does not affect the others; an intersecting candidate without a
/// postal code contributes nothing.
pub fn match_candidates(
    coverage: &geo::MultiPolygon,
    candidates: &[CandidateBoundary],
    postal_code_keys: &PostalCodeKeys,
) -> MatchOutcome {
    let coverage_bbox = match WgsBoundingBox::from_geometry(coverage) {
        Some(bbox) => bbox,
        None => return MatchOutcome::default(),
    };

    let checks: Vec<CandidateCheck> = candidates
        .par_iter()
        .enumerate()
        .map(|(index, candidate)| {
            check_candidate(coverage, &coverage_bbox, index, candidate, postal_code_keys)
        })
        .collect();

    let mut zips = BTreeSet::new();
    let mut skipped = 0;
    let mut skipped_near_coverage = 0;
    for check in checks {
        match check {
            CandidateCheck::Matched(zip) => {
                zips.insert(zip);
            }
            CandidateCheck::Skipped { near_coverage } => {
                skipped += 1;
                if near_coverage {
                    skipped_near_coverage += 1;
                }
            }
            CandidateCheck::Unmatched => (),
        }
    }
    MatchOutcome {
        zips: zips.into_iter().collect(),
        skipped,
        skipped_near_coverage,
    }
}

fn check_candidate(
    coverage: &geo::MultiPolygon,
    coverage_bbox: &WgsBoundingBox,
    index: usize,
    candidate: &CandidateBoundary,
    postal_code_keys: &PostalCodeKeys,
) -> CandidateCheck {
    let boundary = match feature_from_geojson(candidate) {
        Ok(boundary) => boundary,
        Err(err) => {
            log::debug!("Skipping candidate {}: {}", index, err);
            // A candidate without any polygonal coordinates could not have matched anywhere.
            let near_coverage = candidate
                .geometry
                .as_ref()
                .and_then(WgsBoundingBox::from_geojson_geometry)
                .map_or(false, |bbox| bbox.intersects(coverage_bbox));
            return CandidateCheck::Skipped { near_coverage };
        }
    };
    let intersects = run_guarded("intersection test", || {
        geometries_intersect(coverage, coverage_bbox, &boundary.geometry)
    });
    match intersects {
        Ok(true) => match postal_code_keys.postal_code_of(&boundary) {
            Some(zip) => CandidateCheck::Matched(zip),
            None => {
                log::debug!("Candidate {} intersects but carries no postal code", index);
                CandidateCheck::Unmatched
            }
        },
        Ok(false) => CandidateCheck::Unmatched,
        Err(err) => {
            log::debug!("Skipping candidate {}: {}", index, err);
            CandidateCheck::Skipped {
                near_coverage: true,
            }
        }
    }
}

/// Shared points, edges or area all count, touching boundaries included.
fn geometries_intersect(
    coverage: &geo::MultiPolygon,
    coverage_bbox: &WgsBoundingBox,
    boundary: &geo::MultiPolygon,
) -> bool {
    match WgsBoundingBox::from_geometry(boundary) {
        Some(boundary_bbox) if boundary_bbox.intersects(coverage_bbox) => coverage
            .0
            .iter()
            .any(|polygon| boundary.0.iter().any(|other| polygon.intersects(other))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use crate::candidates::CandidateBoundary;
    use crate::geofile::feature::{Feature, FeatureMap};

    use super::{match_candidates, PostalCodeKeys};

    fn unit_square_coverage() -> geo::MultiPolygon {
        geo::MultiPolygon::new(vec![geo::Polygon::new(
            vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)].into(),
            vec![],
        )])
    }

    fn candidate(min_x: f64, min_y: f64, size: f64, properties: serde_json::Value) -> CandidateBoundary {
        serde_json::from_value(json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [min_x, min_y],
                    [min_x, min_y + size],
                    [min_x + size, min_y + size],
                    [min_x + size, min_y],
                    [min_x, min_y]
                ]]
            },
            "properties": properties
        }))
        .unwrap()
    }

    fn feature_with_properties(properties: serde_json::Value) -> Feature {
        let properties: FeatureMap = serde_json::from_value(properties).unwrap();
        Feature {
            geometry: unit_square_coverage(),
            properties: Some(properties),
        }
    }

    #[rstest]
    #[case(json!({ "ZCTA5CE10": "10001", "ZIP": "20002", "ZCTA": "30003" }), Some("10001"))]
    #[case(json!({ "ZIP": "20002", "ZCTA": "30003" }), Some("20002"))]
    #[case(json!({ "ZCTA": "30003" }), Some("30003"))]
    #[case(json!({ "ZCTA5CE10": " 10001 " }), Some("10001"))]
    #[case(json!({ "ZIP": 94103 }), Some("94103"))]
    #[case(json!({ "ZIP": 1001 }), Some("01001"))]
    #[case(json!({ "ZCTA5CE10": "", "ZIP": "20002" }), Some("20002"))]
    #[case(json!({ "ZCTA5CE10": null, "ZCTA": "30003" }), Some("30003"))]
    #[case(json!({ "zip": "10001", "NAME": "New York" }), None)]
    #[case(json!({}), None)]
    fn test_postal_code_key_order(
        #[case] properties: serde_json::Value,
        #[case] expected: Option<&str>,
    ) {
        let feature = feature_with_properties(properties);
        assert_eq!(
            expected.map(String::from),
            PostalCodeKeys::default().postal_code_of(&feature)
        );
    }

    #[test]
    fn test_extra_keys_come_last() {
        let keys = PostalCodeKeys::with_extra_keys(&["ZCTA5CE20".to_string(), "ZIP".to_string()]);
        assert_eq!(["ZCTA5CE10", "ZIP", "ZCTA", "ZCTA5CE20"], keys.keys());

        let feature = feature_with_properties(json!({ "ZCTA5CE20": "10001", "ZCTA": "30003" }));
        assert_eq!(Some("30003".to_string()), keys.postal_code_of(&feature));
        let feature = feature_with_properties(json!({ "ZCTA5CE20": "10001" }));
        assert_eq!(Some("10001".to_string()), keys.postal_code_of(&feature));
    }

    #[test]
    fn test_duplicate_codes_are_reported_once() {
        let candidates = vec![
            candidate(0.5, 0.5, 1.0, json!({ "ZCTA5CE10": "10001" })),
            candidate(-0.5, -0.5, 1.0, json!({ "ZIP": "10001" })),
            candidate(0.2, 0.2, 0.2, json!({ "ZCTA": "10000" })),
        ];
        let outcome = match_candidates(&unit_square_coverage(), &candidates, &PostalCodeKeys::default());
        assert_eq!(vec!["10000", "10001"], outcome.zips);
        assert_eq!(0, outcome.skipped);
    }

    #[test]
    fn test_candidate_order_does_not_matter() {
        let mut candidates = vec![
            candidate(0.9, 0.9, 1.0, json!({ "ZCTA5CE10": "10003" })),
            candidate(3.0, 3.0, 1.0, json!({ "ZCTA5CE10": "10009" })),
            candidate(-0.5, 0.2, 1.0, json!({ "ZCTA5CE10": "10001" })),
            candidate(0.1, -0.5, 0.5, json!({ "ZCTA5CE10": "10002" })),
        ];
        let keys = PostalCodeKeys::default();
        let forward = match_candidates(&unit_square_coverage(), &candidates, &keys);
        candidates.reverse();
        let backward = match_candidates(&unit_square_coverage(), &candidates, &keys);
        assert_eq!(vec!["10001", "10002", "10003"], forward.zips);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_touching_boundary_counts_as_match() {
        let candidates = vec![candidate(1.0, 0.0, 1.0, json!({ "ZCTA5CE10": "10004" }))];
        let outcome = match_candidates(&unit_square_coverage(), &candidates, &PostalCodeKeys::default());
        assert_eq!(vec!["10004"], outcome.zips);
    }

    #[test]
    fn test_candidate_inside_a_hole_does_not_match() {
        let coverage = geo::MultiPolygon::new(vec![geo::Polygon::new(
            vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)].into(),
            vec![vec![(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0)].into()],
        )]);
        let candidates = vec![
            candidate(4.0, 4.0, 1.0, json!({ "ZCTA5CE10": "10005" })),
            candidate(0.5, 0.5, 1.0, json!({ "ZCTA5CE10": "10006" })),
        ];
        let outcome = match_candidates(&coverage, &candidates, &PostalCodeKeys::default());
        assert_eq!(vec!["10006"], outcome.zips);
    }

    #[test]
    fn test_malformed_candidates_are_skipped() {
        let candidates: Vec<CandidateBoundary> = vec![
            serde_json::from_value(json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [0.5, 0.5], [0.0, 0.0]]] },
                "properties": { "ZCTA5CE10": "99999" }
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "type": "Feature",
                "geometry": null,
                "properties": { "ZCTA5CE10": "99998" }
            }))
            .unwrap(),
            candidate(0.5, 0.5, 1.0, json!({ "ZCTA5CE10": "10010" })),
        ];
        let outcome = match_candidates(&unit_square_coverage(), &candidates, &PostalCodeKeys::default());
        assert_eq!(vec!["10010"], outcome.zips);
        assert_eq!(2, outcome.skipped);
        assert_eq!(1, outcome.skipped_near_coverage);
    }

    #[test]
    fn test_malformed_candidates_away_from_coverage() {
        let candidates: Vec<CandidateBoundary> = vec![
            serde_json::from_value(json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [[[50.0, 50.0], [51.0, 51.0], [50.0, 51.0]]] },
                "properties": { "ZCTA5CE10": "99997" }
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.5, 0.5] },
                "properties": { "ZCTA5CE10": "99996" }
            }))
            .unwrap(),
        ];
        let outcome = match_candidates(&unit_square_coverage(), &candidates, &PostalCodeKeys::default());
        assert!(outcome.zips.is_empty());
        assert_eq!(2, outcome.skipped);
        assert_eq!(0, outcome.skipped_near_coverage);
    }

    #[rstest]
    #[case(0.5, vec!["10040", "10041"])]
    #[case(20.0, vec!["10041"])]
    fn test_self_intersecting_candidate_is_tested_as_drawn(
        #[case] offset: f64,
        #[case] expected: Vec<&str>,
    ) {
        // Closed bowtie ring crossing itself at (offset + 0.5, offset + 0.5).
        let bowtie: CandidateBoundary = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[
                [offset, offset],
                [offset + 1.0, offset + 1.0],
                [offset + 1.0, offset],
                [offset, offset + 1.0],
                [offset, offset]
            ]] },
            "properties": { "ZCTA5CE10": "10040" }
        }))
        .unwrap();
        let candidates = vec![bowtie, candidate(0.2, 0.2, 0.5, json!({ "ZCTA5CE10": "10041" }))];
        let outcome = match_candidates(&unit_square_coverage(), &candidates, &PostalCodeKeys::default());
        assert_eq!(expected, outcome.zips);
        assert_eq!(0, outcome.skipped);
    }

    #[test]
    fn test_candidate_without_postal_code_contributes_nothing() {
        let candidates = vec![
            candidate(0.0, 0.0, 1.0, json!({ "NAME": "Somewhere" })),
            candidate(0.0, 0.0, 1.0, json!({ "ZIP": "10011" })),
        ];
        let outcome = match_candidates(&unit_square_coverage(), &candidates, &PostalCodeKeys::default());
        assert_eq!(vec!["10011"], outcome.zips);
        assert_eq!(0, outcome.skipped);
    }
}
