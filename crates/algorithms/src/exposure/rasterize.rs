//! Burning vector features into a grid

use georisk_core::vector::FeatureCollection;
use georisk_core::{Error, GeoTransform, Raster, RasterElement, Result};
use geo::Centroid;
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Value burned for each feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnValue {
    Fixed(f64),
    /// Numeric attribute, with a default for features lacking it
    Attribute { name: String, default: f64 },
}

impl Default for BurnValue {
    fn default() -> Self {
        BurnValue::Fixed(1.0)
    }
}

/// How a burn combines with what is already in the cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAlg {
    /// Accumulate (feature counts, densities)
    #[default]
    Add,
    /// Last feature wins
    Replace,
}

/// Rasterize `features` onto the lattice of `reference`.
///
/// Points burn the cell containing them. Polygons burn every cell whose
/// centre they contain; a polygon too small to contain any centre burns the
/// cell under its centroid so that it is still counted. Each feature burns a
/// cell at most once. Other geometry types are ignored.
pub fn rasterize<T: RasterElement>(
    features: &FeatureCollection,
    reference: &Raster<T>,
    burn: &BurnValue,
    merge: MergeAlg,
) -> Result<Raster<f64>> {
    ensure_same_crs(features, reference)?;

    let (rows, cols) = reference.shape();
    let mut out: Raster<f64> = reference.with_same_meta(rows, cols);
    out.set_nodata(Some(f64::NAN));
    let transform = *reference.transform();

    let mut burned = 0usize;
    let mut cells = Vec::new();
    for feature in features.iter() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let value = match burn {
            BurnValue::Fixed(v) => *v,
            BurnValue::Attribute { name, default } => feature
                .get_property(name)
                .and_then(|v| v.as_f64())
                .filter(|v| v.is_finite())
                .unwrap_or(*default),
        };

        cells.clear();
        for_each_covered_cell(geometry, &transform, rows, cols, |r, c| cells.push((r, c)));
        cells.sort_unstable();
        cells.dedup();
        if !cells.is_empty() {
            burned += 1;
        }

        for &(r, c) in &cells {
            let current = out.get(r, c)?;
            let next = match merge {
                MergeAlg::Add => current + value,
                MergeAlg::Replace => value,
            };
            out.set(r, c, next)?;
        }
    }

    tracing::debug!(features = features.len(), burned, "rasterized features");
    Ok(out)
}

pub(crate) fn ensure_same_crs<T: RasterElement>(features: &FeatureCollection, grid: &Raster<T>) -> Result<()> {
    if let (Some(a), Some(b)) = (features.crs.as_ref(), grid.crs()) {
        if !a.is_equivalent(b) {
            return Err(Error::GridMismatch(format!(
                "features in {} cannot be overlaid on a grid in {}",
                a.identifier(),
                b.identifier()
            )));
        }
    }
    Ok(())
}

/// Call `f(row, col)` for each grid cell covered by `geometry`.
pub(crate) fn for_each_covered_cell<F>(
    geometry: &Geometry<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    mut f: F,
) where
    F: FnMut(usize, usize),
{
    visit(geometry, transform, rows, cols, &mut f);
}

fn visit(
    geometry: &Geometry<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    f: &mut dyn FnMut(usize, usize),
) {
    match geometry {
        Geometry::Point(p) => point_cell(p.0, transform, rows, cols, f),
        Geometry::MultiPoint(mp) => {
            for p in &mp.0 {
                point_cell(p.0, transform, rows, cols, f);
            }
        }
        Geometry::Polygon(poly) => polygon_cells(poly, transform, rows, cols, f),
        Geometry::MultiPolygon(mp) => {
            for poly in &mp.0 {
                polygon_cells(poly, transform, rows, cols, f);
            }
        }
        Geometry::Rect(r) => polygon_cells(&r.to_polygon(), transform, rows, cols, f),
        Geometry::Triangle(t) => polygon_cells(&t.to_polygon(), transform, rows, cols, f),
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                visit(g, transform, rows, cols, f);
            }
        }
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {}
    }
}

fn point_cell(p: Coord<f64>, transform: &GeoTransform, rows: usize, cols: usize, f: &mut dyn FnMut(usize, usize)) {
    let (c, r) = transform.geo_to_pixel(p.x, p.y);
    if c.is_finite() && r.is_finite() && c >= 0.0 && r >= 0.0 && (r as usize) < rows && (c as usize) < cols {
        f(r as usize, c as usize);
    }
}

/// Even-odd scanline over cell centres in pixel space
fn polygon_cells(
    poly: &Polygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    f: &mut dyn FnMut(usize, usize),
) {
    let to_pixel = |ring: &LineString<f64>| -> Vec<(f64, f64)> {
        ring.0.iter().map(|c| transform.geo_to_pixel(c.x, c.y)).collect()
    };
    let rings: Vec<Vec<(f64, f64)>> = std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .map(to_pixel)
        .collect();

    let (min_r, max_r) = rings
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, r)| (lo.min(r), hi.max(r)));
    if !(min_r.is_finite() && max_r.is_finite()) || rows == 0 || cols == 0 {
        return;
    }

    let first_row = (min_r - 0.5).ceil().max(0.0) as usize;
    let last_row = ((max_r - 0.5).floor().min(rows as f64 - 1.0)).max(-1.0);
    let mut hit = false;
    let mut xs: Vec<f64> = Vec::new();

    if last_row >= 0.0 {
        for r in first_row..=last_row as usize {
            let yc = r as f64 + 0.5;
            xs.clear();
            for ring in &rings {
                for pair in ring.windows(2) {
                    let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
                    if (y0 <= yc) != (y1 <= yc) {
                        xs.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                    }
                }
            }
            xs.sort_by(f64::total_cmp);

            for span in xs.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0);
                let end = (span[1] - 0.5).ceil().min(cols as f64);
                if end <= start {
                    continue;
                }
                for c in start as usize..end as usize {
                    hit = true;
                    f(r, c);
                }
            }
        }
    }

    if !hit {
        if let Some(centroid) = poly.centroid() {
            point_cell(centroid.0, transform, rows, cols, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georisk_core::vector::Feature;
    use georisk_core::CRS;
    use geo_types::{point, polygon};

    fn reference() -> Raster<f64> {
        let mut r = Raster::new(4, 4);
        r.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32633)));
        r
    }

    #[test]
    fn points_accumulate() {
        let fc: FeatureCollection = vec![
            Feature::new(point!(x: 5.0, y: 35.0).into()),
            Feature::new(point!(x: 6.0, y: 36.0).into()),
            Feature::new(point!(x: 25.0, y: 5.0).into()),
            Feature::new(point!(x: 99.0, y: 5.0).into()),
        ]
        .into_iter()
        .collect();
        let out = rasterize(&fc, &reference(), &BurnValue::Fixed(1.0), MergeAlg::Add).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 2.0);
        assert_eq!(out.get(3, 2).unwrap(), 1.0);
        assert_eq!(out.valid_values().sum::<f64>(), 3.0);
    }

    #[test]
    fn polygon_burns_cell_centres() {
        // covers centres of columns 0..2 in rows 1..3
        let poly = polygon![(x: 0.0, y: 30.0), (x: 20.0, y: 30.0), (x: 20.0, y: 10.0), (x: 0.0, y: 10.0)];
        let fc: FeatureCollection = std::iter::once(Feature::new(poly.into()).with_property("floors", 3i64)).collect();
        let burn = BurnValue::Attribute {
            name: "floors".into(),
            default: 1.0,
        };
        let out = rasterize(&fc, &reference(), &burn, MergeAlg::Replace).unwrap();
        for r in 0..4 {
            for c in 0..4 {
                let expected = if (1..3).contains(&r) && c < 2 { 3.0 } else { 0.0 };
                assert_eq!(out.get(r, c).unwrap(), expected, "cell ({}, {})", r, c);
            }
        }
    }

    #[test]
    fn tiny_polygon_uses_centroid() {
        let poly = polygon![(x: 31.0, y: 1.0), (x: 32.0, y: 1.0), (x: 32.0, y: 2.0), (x: 31.0, y: 2.0)];
        let fc: FeatureCollection = std::iter::once(Feature::new(poly.into())).collect();
        let out = rasterize(&fc, &reference(), &BurnValue::default(), MergeAlg::Add).unwrap();
        assert_eq!(out.get(3, 3).unwrap(), 1.0);
        assert_eq!(out.valid_values().sum::<f64>(), 1.0);
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let mut fc: FeatureCollection = std::iter::once(Feature::new(point!(x: 5.0, y: 5.0).into())).collect();
        fc.crs = Some(CRS::wgs84());
        assert!(matches!(
            rasterize(&fc, &reference(), &BurnValue::default(), MergeAlg::Add),
            Err(Error::GridMismatch(_))
        ));
    }
}
