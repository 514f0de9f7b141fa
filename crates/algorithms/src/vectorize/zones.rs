//! Classed polygon zones: vectorization and the inverse rasterization

use super::regions::{label_regions, Connectivity};
use super::trace::{boundary_edges, link_rings, Corner, CornerRing};
use crate::exposure::for_each_covered_cell;
use crate::maybe_rayon::*;
use georisk_core::io::{read_features, to_geojson, write_features};
use georisk_core::vector::{AttributeValue, Feature, FeatureCollection};
use georisk_core::{CancellationToken, Error, GeoTransform, Raster, RasterElement, Result, CRS};
use geo::algorithm::orient::{Direction, Orient};
use geo::{Area, Contains};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CLASS_INDEX: &str = "class_index";
pub const CLASS_LABEL: &str = "class_label";
pub const CELL_COUNT: &str = "cell_count";
pub const AREA: &str = "area";

/// Options for [`vectorize`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeOptions {
    pub connectivity: Connectivity,
    /// Emit only these classes; `None` emits every class
    pub classes: Option<Vec<u8>>,
}

/// One connected region of a single class
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub class_index: u8,
    pub class_label: String,
    pub cell_count: usize,
    /// Map units squared
    pub area: f64,
    /// `Polygon`, or `MultiPolygon` when the region only touches itself at corners
    pub geometry: Geometry<f64>,
}

/// Ordered zones of one classified grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneCollection {
    zones: Vec<Zone>,
    crs: Option<CRS>,
}

impl ZoneCollection {
    pub fn new(crs: Option<CRS>) -> Self {
        Self { zones: Vec::new(), crs }
    }

    pub fn push(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Total area per class index
    pub fn area_by_class(&self) -> Vec<(u8, f64)> {
        let mut totals: std::collections::BTreeMap<u8, f64> = Default::default();
        for z in &self.zones {
            *totals.entry(z.class_index).or_default() += z.area;
        }
        totals.into_iter().collect()
    }

    pub fn to_features(&self) -> FeatureCollection {
        let mut fc = FeatureCollection::with_crs(self.crs.clone());
        for (i, z) in self.zones.iter().enumerate() {
            let mut f = Feature::new(z.geometry.clone())
                .with_property(CLASS_INDEX, i64::from(z.class_index))
                .with_property(CLASS_LABEL, z.class_label.as_str())
                .with_property(CELL_COUNT, z.cell_count as i64)
                .with_property(AREA, z.area);
            f.id = Some(i.to_string());
            fc.push(f);
        }
        fc
    }

    /// Rebuild zones from features carrying the zone attributes.
    pub fn from_features(features: &FeatureCollection) -> Result<Self> {
        let mut out = ZoneCollection::new(features.crs.clone());
        for (i, f) in features.iter().enumerate() {
            let geometry = f
                .geometry
                .clone()
                .ok_or_else(|| Error::Vector(format!("zone {} has no geometry", i)))?;
            let class_index = f
                .get_property(CLASS_INDEX)
                .and_then(AttributeValue::as_f64)
                .filter(|v| (1.0..=255.0).contains(v) && v.fract() == 0.0)
                .ok_or_else(|| Error::Vector(format!("zone {} has no valid {}", i, CLASS_INDEX)))?
                as u8;
            out.push(Zone {
                class_index,
                class_label: f
                    .get_property(CLASS_LABEL)
                    .and_then(AttributeValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                cell_count: f.get_property(CELL_COUNT).and_then(AttributeValue::as_f64).unwrap_or(0.0) as usize,
                area: f.get_property(AREA).and_then(AttributeValue::as_f64).unwrap_or(0.0),
                geometry,
            });
        }
        Ok(out)
    }

    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&to_geojson(&self.to_features()))?)
    }

    /// Atomically write the zones as a GeoJSON FeatureCollection
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_features(&self.to_features(), path)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_features(&read_features(path)?)
    }
}

/// Polygonize a classified grid.
///
/// One zone per maximal connected region of equal class (0 and no-data are
/// skipped), in row-major order of each region's first cell. Polygon
/// boundaries follow cell edges exactly: exterior rings counter-clockwise,
/// holes clockwise. `labels[i]` names class `i + 1`.
pub fn vectorize(
    classified: &Raster<u8>,
    labels: &[String],
    options: &VectorizeOptions,
    cancel: &CancellationToken,
) -> Result<ZoneCollection> {
    let map = label_regions(classified, options.connectivity, cancel)?;
    let edges = boundary_edges(&map, cancel)?;
    let transform = *classified.transform();
    let cell_area = classified.cell_area();

    let wanted = |class: u8| options.classes.as_ref().map_or(true, |c| c.contains(&class));

    let zones: Vec<Option<Zone>> = map
        .regions()
        .iter()
        .zip(edges)
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(region, edges)| -> Result<Option<Zone>> {
            if !wanted(region.class) {
                return Ok(None);
            }
            cancel.check()?;
            let rings = link_rings(&edges)?;
            Ok(Some(Zone {
                class_index: region.class,
                class_label: class_label(labels, region.class),
                cell_count: region.cell_count,
                area: region.cell_count as f64 * cell_area,
                geometry: rings_to_geometry(rings, &transform)?,
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = ZoneCollection::new(classified.crs().cloned());
    for zone in zones.into_iter().flatten() {
        out.push(zone);
    }
    tracing::debug!(zones = out.len(), regions = map.len(), "vectorized");
    Ok(out)
}

/// Burn `class_index` of each zone into the lattice of `reference`.
///
/// Cells whose centre lies inside a zone get its class; all others are 0
/// (no-data). For zones produced by [`vectorize`] on the same grid this
/// reproduces the classified grid.
pub fn rasterize_zones<T: RasterElement>(zones: &ZoneCollection, reference: &Raster<T>) -> Result<Raster<u8>> {
    let (rows, cols) = reference.shape();
    let mut out: Raster<u8> = reference.with_same_meta(rows, cols);
    out.set_nodata(Some(0));
    for zone in zones.iter() {
        let class = zone.class_index;
        let mut cells = Vec::new();
        for_each_covered_cell(&zone.geometry, reference.transform(), rows, cols, |r, c| cells.push((r, c)));
        for (r, c) in cells {
            out.set(r, c, class)?;
        }
    }
    Ok(out)
}

fn class_label(labels: &[String], class: u8) -> String {
    labels
        .get(class as usize - 1)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class))
}

fn rings_to_geometry(rings: Vec<CornerRing>, transform: &GeoTransform) -> Result<Geometry<f64>> {
    let (exteriors, holes): (Vec<CornerRing>, Vec<CornerRing>) = rings.into_iter().partition(CornerRing::is_exterior);
    if exteriors.is_empty() {
        return Err(Error::Algorithm("region boundary has no exterior ring".into()));
    }

    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); exteriors.len()];
    if exteriors.len() == 1 {
        interiors[0] = holes.iter().map(|h| to_map(h, transform)).collect();
    } else {
        // Assign each hole to the smallest exterior containing a cell it bounds.
        let lattice: Vec<Polygon<f64>> = exteriors.iter().map(|e| Polygon::new(to_lattice(e), vec![])).collect();
        for hole in &holes {
            let probe = inner_probe(hole);
            let owner = lattice
                .iter()
                .enumerate()
                .filter(|(_, p)| p.contains(&probe))
                .min_by(|a, b| a.1.unsigned_area().total_cmp(&b.1.unsigned_area()))
                .map(|(i, _)| i)
                .ok_or_else(|| Error::Algorithm("hole outside every exterior ring".into()))?;
            interiors[owner].push(to_map(hole, transform));
        }
    }

    let mut polygons: Vec<Polygon<f64>> = exteriors
        .iter()
        .zip(interiors)
        .map(|(e, holes)| Polygon::new(to_map(e, transform), holes).orient(Direction::Default))
        .collect();

    Ok(if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    })
}

fn to_map(ring: &CornerRing, transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring
        .corners
        .iter()
        .map(|&(c, r)| {
            let (x, y) = transform.pixel_to_geo_corner(c, r);
            Coord { x, y }
        })
        .collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn to_lattice(ring: &CornerRing) -> LineString<f64> {
    ring.corners
        .iter()
        .map(|&(c, r)| Coord {
            x: c as f64,
            y: -(r as f64),
        })
        .collect()
}

/// Centre of the region cell on the left of the ring's first edge,
/// in lattice coordinates with y up.
fn inner_probe(ring: &CornerRing) -> Point<f64> {
    let (a, b): (Corner, Corner) = (ring.corners[0], ring.corners[1 % ring.corners.len()]);
    let dx = (b.0 as f64 - a.0 as f64).signum();
    let dy = -(b.1 as f64 - a.1 as f64).signum();
    // left normal of (dx, dy) with y up is (-dy, dx)
    Point::new(a.0 as f64 + 0.5 * dx - 0.5 * dy, -(a.1 as f64) + 0.5 * dy + 0.5 * dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use georisk_core::CRS;

    fn classified(rows: &[&[u8]]) -> Raster<u8> {
        let mut g = Raster::from_vec(rows.concat(), rows.len(), rows[0].len()).unwrap();
        g.set_transform(GeoTransform::new(500.0, 1000.0, 10.0, -10.0));
        g.set_crs(Some(CRS::from_epsg(32633)));
        g.set_nodata(Some(0));
        g
    }

    fn labels() -> Vec<String> {
        ["very_low", "low", "moderate", "high", "very_high"].map(String::from).to_vec()
    }

    #[test]
    fn zones_carry_class_attributes() {
        let g = classified(&[&[1, 1, 2], &[1, 5, 2], &[0, 0, 2]]);
        let zones = vectorize(&g, &labels(), &VectorizeOptions::default(), &CancellationToken::new()).unwrap();

        assert_eq!(zones.len(), 3);
        let z = &zones.zones()[0];
        assert_eq!((z.class_index, z.class_label.as_str(), z.cell_count), (1, "very_low", 3));
        assert_eq!(z.area, 300.0);
        assert_eq!(zones.zones()[1].class_label, "low");
        assert_eq!(zones.zones()[2].class_label, "very_high");

        match &z.geometry {
            Geometry::Polygon(p) => {
                assert_eq!(p.unsigned_area(), 300.0);
                assert!(p.exterior().is_closed());
            }
            other => panic!("expected polygon, got {:?}", other),
        }
        assert_eq!(zones.crs(), Some(&CRS::from_epsg(32633)));
    }

    #[test]
    fn exterior_ccw_hole_cw() {
        use geo::Winding;
        let g = classified(&[&[3, 3, 3], &[3, 1, 3], &[3, 3, 3]]);
        let zones = vectorize(&g, &labels(), &VectorizeOptions::default(), &CancellationToken::new()).unwrap();
        let Geometry::Polygon(p) = &zones.zones()[0].geometry else {
            panic!("expected polygon");
        };
        assert!(p.exterior().is_ccw());
        assert_eq!(p.interiors().len(), 1);
        assert!(p.interiors()[0].is_cw());
        assert_eq!(p.unsigned_area(), 800.0);
    }

    #[test]
    fn all_nodata_gives_empty_collection() {
        let g = classified(&[&[0, 0], &[0, 0]]);
        let zones = vectorize(&g, &labels(), &VectorizeOptions::default(), &CancellationToken::new()).unwrap();
        assert!(zones.is_empty());
    }

    #[test]
    fn class_filter_keeps_requested_classes() {
        let g = classified(&[&[1, 2], &[2, 1]]);
        let options = VectorizeOptions {
            classes: Some(vec![2]),
            ..Default::default()
        };
        let zones = vectorize(&g, &labels(), &options, &CancellationToken::new()).unwrap();
        assert_eq!(zones.len(), 2);
        assert!(zones.iter().all(|z| z.class_index == 2));
    }

    #[test]
    fn rasterize_inverts_vectorize() {
        let g = classified(&[
            &[1, 1, 2, 2, 0],
            &[1, 3, 3, 2, 0],
            &[4, 3, 1, 2, 5],
            &[4, 4, 1, 1, 5],
        ]);
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let options = VectorizeOptions {
                connectivity,
                classes: None,
            };
            let zones = vectorize(&g, &labels(), &options, &CancellationToken::new()).unwrap();
            let back = rasterize_zones(&zones, &g).unwrap();
            assert_eq!(back.data(), g.data(), "{:?}", connectivity);
        }
    }

    #[test]
    fn features_roundtrip() {
        let g = classified(&[&[2, 2], &[0, 4]]);
        let zones = vectorize(&g, &labels(), &VectorizeOptions::default(), &CancellationToken::new()).unwrap();
        let again = ZoneCollection::from_features(&zones.to_features()).unwrap();
        assert_eq!(again, zones);
    }

    #[test]
    fn inner_probe_hits_region_cell() {
        // Hole around cell (1,1): first edge runs east along row 1 under cell (0,1)
        let hole = CornerRing {
            corners: vec![(1, 1), (2, 1), (2, 2), (1, 2)],
        };
        let p = inner_probe(&hole);
        assert_eq!((p.x(), p.y()), (1.5, -0.5));
    }
}
