//! GeoJSON reading and writing for feature collections

use super::publish::publish_atomically;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{GeoJson, JsonObject, JsonValue};
use std::io::Write;
use std::path::Path;

/// Read points or polygons from a GeoJSON file.
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry. A legacy
/// `crs` member naming an EPSG code is honoured.
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Vector(format!("cannot read '{}': {}", path.display(), e)))?;
    let collection = parse_features(&text)
        .map_err(|e| Error::Vector(format!("'{}': {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), features = collection.len(), "read features");
    Ok(collection)
}

/// Parse GeoJSON text into a feature collection
pub fn parse_features(text: &str) -> Result<FeatureCollection> {
    let parsed: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::Vector(e.to_string()))?;

    match parsed {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(crs_from_member);
            let features = fc
                .features
                .into_iter()
                .map(feature_from_geojson)
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureCollection { features, crs })
        }
        GeoJson::Feature(f) => Ok(FeatureCollection {
            features: vec![feature_from_geojson(f)?],
            crs: None,
        }),
        GeoJson::Geometry(g) => {
            let geometry = geo_types::Geometry::<f64>::try_from(g)
                .map_err(|e| Error::Vector(e.to_string()))?;
            Ok(FeatureCollection {
                features: vec![Feature::new(geometry)],
                crs: None,
            })
        }
    }
}

fn feature_from_geojson(f: geojson::Feature) -> Result<Feature> {
    let geometry = f
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()
        .map_err(|e| Error::Vector(e.to_string()))?;

    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();

    let id = f.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

fn crs_from_member(members: &JsonObject) -> Option<CRS> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    let code = name.rsplit(|c| c == ':').next()?.parse().ok()?;
    Some(CRS::from_epsg(code))
}

/// Convert a feature collection into a GeoJSON value
pub fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .features
        .iter()
        .map(|f| geojson::Feature {
            bbox: None,
            geometry: f
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: f.id.clone().map(geojson::feature::Id::String),
            properties: Some(
                f.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = collection.crs.as_ref().and_then(CRS::epsg).map(|code| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
            }),
        );
        members
    });

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Atomically write a feature collection as GeoJSON
pub fn write_features<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    let text = GeoJson::FeatureCollection(to_geojson(collection)).to_string();
    publish_atomically(path, |file| {
        file.write_all(text.as_bytes())?;
        Ok(())
    })?;
    tracing::info!(path = %path.display(), features = collection.len(), "wrote features");
    Ok(())
}
