//! Buildings per hazard class

use super::rasterize::{ensure_same_crs, for_each_covered_cell};
use crate::classify::NODATA_CLASS;
use georisk_core::vector::FeatureCollection;
use georisk_core::{Raster, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Count the features that touch each class of a classified grid.
///
/// A feature covering cells of several classes is counted once in each of
/// them; features over no-data only, or outside the grid, are not counted.
/// Cell coverage follows [`rasterize`](super::rasterize).
pub fn exposed_buildings(buildings: &FeatureCollection, classified: &Raster<u8>) -> Result<BTreeMap<u8, usize>> {
    ensure_same_crs(buildings, classified)?;

    let (rows, cols) = classified.shape();
    let transform = *classified.transform();
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    let mut classes = BTreeSet::new();

    for feature in buildings.iter() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        classes.clear();
        for_each_covered_cell(geometry, &transform, rows, cols, |r, c| {
            let class = unsafe { classified.get_unchecked(r, c) };
            if class != NODATA_CLASS && !classified.is_nodata(class) {
                classes.insert(class);
            }
        });
        for &class in &classes {
            *counts.entry(class).or_default() += 1;
        }
    }

    tracing::info!(?counts, "exposed buildings by class");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use georisk_core::vector::Feature;
    use georisk_core::{Error, GeoTransform, CRS};
    use geo_types::{point, polygon};

    /// 4x4 grid, 10 m cells: class 1 on the left half, 3 on the right,
    /// no-data in the bottom-right cell
    fn classes() -> Raster<u8> {
        let mut r: Raster<u8> = Raster::new(4, 4);
        r.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32633)));
        r.set_nodata(Some(NODATA_CLASS));
        for row in 0..4 {
            for col in 0..4 {
                r.set(row, col, if col < 2 { 1 } else { 3 }).unwrap();
            }
        }
        r.set(3, 3, NODATA_CLASS).unwrap();
        r
    }

    #[test]
    fn counts_per_class() {
        let fc: FeatureCollection = vec![
            Feature::new(point!(x: 5.0, y: 35.0).into()),
            Feature::new(point!(x: 15.0, y: 5.0).into()),
            Feature::new(point!(x: 25.0, y: 25.0).into()),
            // straddles both classes
            Feature::new(polygon![(x: 10.0, y: 20.0), (x: 30.0, y: 20.0), (x: 30.0, y: 10.0), (x: 10.0, y: 10.0)].into()),
            // no-data cell
            Feature::new(point!(x: 35.0, y: 5.0).into()),
            // off the grid
            Feature::new(point!(x: 95.0, y: 5.0).into()),
        ]
        .into_iter()
        .collect();

        let counts = exposed_buildings(&fc, &classes()).unwrap();
        assert_eq!(counts.get(&1), Some(&3));
        assert_eq!(counts.get(&3), Some(&2));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let mut fc: FeatureCollection = std::iter::once(Feature::new(point!(x: 5.0, y: 5.0).into())).collect();
        fc.crs = Some(CRS::wgs84());
        assert!(matches!(exposed_buildings(&fc, &classes()), Err(Error::GridMismatch(_))));
    }
}
