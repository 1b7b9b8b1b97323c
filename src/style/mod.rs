mod color;
mod expr;

pub use color::parse_hex;
pub use expr::Expr;

use crate::classify::{classify_records, Classification, ClassifyError, LegendEntry};
use crate::config::StyleConfig;
use crate::data::{ValueRecord, FIPS_WIDTH};
use serde::Serialize;

/// `["slice", ["concat", ["to-string", ["get", prop]]], -5]`: the last five
/// characters of the feature's identifier property.
pub fn feature_key(id_property: &str) -> Expr {
    Expr::slice(
        Expr::Concat(vec![Expr::stringify(Expr::get(id_property))]),
        -(FIPS_WIDTH as i64),
    )
}

/// Filter that keeps only features whose key is in `keys`.
pub fn inclusion_filter(id_property: &str, keys: Vec<String>) -> Expr {
    Expr::contains(feature_key(id_property), Expr::Literal(keys))
}

/// Paint expression mapping each classified county to its bucket color.
/// With nothing classified the paint is just the fallback color.
pub fn color_match(id_property: &str, classification: Option<&Classification>, fallback: &str) -> Expr {
    let Some(classification) = classification else {
        return Expr::Str(fallback.to_string());
    };
    let arms = classification
        .assignments
        .iter()
        .map(|a| (a.key.clone(), Expr::Str(classification.color_of(a).to_string())))
        .collect();
    Expr::Match {
        input: Box::new(feature_key(id_property)),
        arms,
        fallback: Box::new(Expr::Str(fallback.to_string())),
    }
}

/// Everything the map needs to draw one year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearStyle {
    pub year: i32,
    pub classification: Option<Classification>,
    pub filter: Expr,
    pub paint: Expr,
}

impl YearStyle {
    /// Classify a year's records and build its filter and paint expressions.
    /// An empty year yields an empty filter list and no legend.
    pub fn build(options: &StyleConfig, year: i32, records: &[ValueRecord]) -> Result<Self, ClassifyError> {
        let classification = classify_records(records, &options.colors)?;
        tracing::info!(year, counties = records.len(), "classified year");

        let keys = records.iter().map(|r| r.key.clone()).collect();
        let filter = inclusion_filter(&options.id_property, keys);
        let paint = color_match(&options.id_property, classification.as_ref(), &options.fallback_color);

        Ok(Self {
            year,
            classification,
            filter,
            paint,
        })
    }

    pub fn county_count(&self) -> usize {
        self.classification
            .as_ref()
            .map_or(0, |c| c.assignments.len())
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.classification
            .as_ref()
            .map(Classification::legend)
            .unwrap_or_default()
    }

    /// Fill layer definition for the web map.
    pub fn fill_layer(&self, options: &StyleConfig) -> FillLayer {
        FillLayer {
            id: options.layer_id.clone(),
            kind: "fill",
            source: options.source_id.clone(),
            source_layer: options.source_layer.clone(),
            filter: self.filter.clone(),
            paint: FillPaint {
                fill_color: self.paint.clone(),
                fill_opacity: options.fill_opacity,
            },
        }
    }

    /// Serializable bundle the web page loads per year.
    pub fn export(&self, options: &StyleConfig) -> StyleExport {
        StyleExport {
            year: self.year,
            layer: self.fill_layer(options),
            before: options.before_layer.clone(),
            legend: self.legend(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FillLayer {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: String,
    #[serde(rename = "source-layer")]
    pub source_layer: String,
    pub filter: Expr,
    pub paint: FillPaint,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillPaint {
    #[serde(rename = "fill-color")]
    pub fill_color: Expr,
    #[serde(rename = "fill-opacity")]
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StyleExport {
    pub year: i32,
    pub layer: FillLayer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    pub legend: Vec<LegendEntry>,
}
