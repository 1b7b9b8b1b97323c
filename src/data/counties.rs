use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, JsonObject, Value};
use std::fs;
use std::path::Path;

/// A closed ring of (lon, lat) coordinates
pub type Ring = Vec<(f64, f64)>;

/// Exterior ring followed by any holes
pub type Polygon = Vec<Ring>;

/// County geometry with the feature properties expressions are evaluated against
#[derive(Clone, Debug)]
pub struct County {
    pub properties: JsonObject,
    pub polygons: Vec<Polygon>,
}

/// Load county polygons from a GeoJSON file
pub fn load_counties(path: &Path) -> Result<Vec<County>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("{} is not valid GeoJSON", path.display()))?;

    let counties = counties_from_geojson(geojson);
    tracing::info!(path = %path.display(), counties = counties.len(), "loaded county geometry");
    Ok(counties)
}

fn counties_from_geojson(geojson: GeoJson) -> Vec<County> {
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            tracing::warn!("bare geometry has no properties to match counties against");
            return Vec::new();
        }
    };

    features
        .into_iter()
        .filter_map(|feature| {
            let geometry = feature.geometry?;
            let mut polygons = Vec::new();
            collect_polygons(&geometry, &mut polygons);
            if polygons.is_empty() {
                return None;
            }
            Some(County {
                properties: feature.properties.unwrap_or_default(),
                polygons,
            })
        })
        .collect()
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match &geometry.value {
        Value::Polygon(rings) => out.push(to_polygon(rings)),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.push(to_polygon(rings));
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Polygon {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .filter(|c| c.len() >= 2)
                .map(|c| (c[0], c[1]))
                .collect()
        })
        .collect()
}
