//! GeoTIFF reading and writing
//!
//! Uses the `tiff` crate directly. Georeferencing is carried in the
//! standard GeoTIFF tags; no-data in the GDAL_NODATA ASCII tag. Samples are
//! always written as 64-bit floats so every supported cell type survives a
//! write/read cycle unchanged.

use super::publish::publish_atomically;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const MODEL_TRANSFORMATION: Tag = Tag::ModelTransformationTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read the first band of a GeoTIFF file.
///
/// Missing, unreadable or corrupt files fail with [`Error::GridRead`].
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::grid_read(path, e))?;
    let raster = decode_geotiff(BufReader::new(file)).map_err(|e| match e {
        Error::GridRead { reason, .. } => Error::grid_read(path, reason),
        other => other,
    })?;
    tracing::debug!(
        path = %path.display(),
        rows = raster.rows(),
        cols = raster.cols(),
        "read grid"
    );
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let corrupt = |what: &str, e: tiff::TiffError| Error::grid_read("<buffer>", format!("{}: {}", what, e));

    let mut decoder = Decoder::new(reader).map_err(|e| corrupt("not a TIFF", e))?;
    let (width, height) = decoder.dimensions().map_err(|e| corrupt("cannot read dimensions", e))?;
    let rows = height as usize;
    let cols = width as usize;

    let image = decoder.read_image().map_err(|e| corrupt("cannot read image data", e))?;

    fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
            .collect()
    }

    let data: Vec<T> = match image {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF sample format".to_string())),
    };

    // Multi-sample images decode interleaved; only single-band grids are accepted.
    if data.len() != rows * cols {
        return Err(Error::grid_read(
            "<buffer>",
            format!("expected {} samples for a single band, found {}", rows * cols, data.len()),
        ));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    if let Ok(text) = decoder.get_tag_ascii_string(GDAL_NODATA) {
        let parsed = text.trim_matches(char::from(0)).trim().parse::<f64>().ok();
        raster.set_nodata(parsed.and_then(num_traits::cast));
    }

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(MODEL_TRANSFORMATION) {
        if m.len() >= 8 {
            return Some(GeoTransform {
                origin_x: m[3],
                pixel_width: m[0],
                row_rotation: m[1],
                origin_y: m[7],
                col_rotation: m[4],
                pixel_height: m[5],
            });
        }
    }

    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    None
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;

    keys[4..]
        .chunks_exact(4)
        .take(count)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY)
                && entry[1] == 0
                && entry[3] != 0
                && entry[3] != 32767
        })
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

/// Write a grid to a GeoTIFF file.
///
/// The file is written to a temporary sibling and renamed into place only
/// when complete.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    publish_atomically(path, |file| {
        let mut writer = BufWriter::new(file);
        encode_geotiff(raster, &mut writer)?;
        writer.flush()?;
        Ok(())
    })?;
    tracing::info!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "wrote grid");
    Ok(())
}

/// Write a grid to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{}: {}", what, e));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().unwrap_or(f64::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray64Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("cannot create TIFF image", e))?;

    let gt = raster.transform();
    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        image
            .encoder()
            .write_tag(MODEL_PIXEL_SCALE, &scale[..])
            .map_err(|e| tiff_err("cannot write scale tag", e))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(MODEL_TIEPOINT, &tiepoint[..])
            .map_err(|e| tiff_err("cannot write tiepoint tag", e))?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(MODEL_TRANSFORMATION, &matrix[..])
            .map_err(|e| tiff_err("cannot write transformation tag", e))?;
    }

    let geokeys = geo_key_directory(raster.crs());
    image
        .encoder()
        .write_tag(GEO_KEY_DIRECTORY, geokeys.as_slice())
        .map_err(|e| tiff_err("cannot write geokey tag", e))?;

    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
        let text = if nodata.is_nan() { "nan".to_string() } else { nodata.to_string() };
        image
            .encoder()
            .write_tag(GDAL_NODATA, text.as_str())
            .map_err(|e| tiff_err("cannot write nodata tag", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_err("cannot write image data", e))?;

    Ok(())
}

/// GeoKey directory: model type, pixel-is-area and the EPSG code when known.
fn geo_key_directory(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.map_or(false, CRS::is_geographic);
    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE_KEY, 0, 1, 1],
    ];

    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![1.5, f64::NAN, -3.25, 1e-12, 412.0, 0.0], 2, 3).unwrap();
        r.set_transform(GeoTransform::new(500_000.0, 4_100_000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32633)));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn buffer_roundtrip_is_lossless() {
        let original = sample();
        let bytes = write_geotiff_to_buffer(&original).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), original.shape());
        assert_eq!(back.transform(), original.transform());
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32633));
        assert!(back.nodata().map_or(false, f64::is_nan));
        for (a, b) in original.data().iter().zip(back.data().iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()), "{} != {}", a, b);
        }
    }

    #[test]
    fn sentinel_nodata_survives() {
        let mut r: Raster<u8> = Raster::from_vec(vec![0, 1, 2, 5], 2, 2).unwrap();
        r.set_nodata(Some(0));
        r.set_crs(Some(CRS::wgs84()));
        let bytes = write_geotiff_to_buffer(&r).unwrap();
        let back: Raster<u8> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.nodata(), Some(0));
        assert_eq!(back.data(), r.data());
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
    }

    #[test]
    fn rotated_transform_roundtrip() {
        let mut r = sample();
        r.set_transform(GeoTransform::from_gdal([100.0, 10.0, 2.0, 200.0, 1.0, -10.0]));
        let bytes = write_geotiff_to_buffer(&r).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.transform(), r.transform());
    }

    #[test]
    fn corrupt_input_is_grid_read_error() {
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(b"definitely not a tiff");
        assert!(matches!(result, Err(Error::GridRead { .. })));
    }

    #[test]
    fn missing_file_is_grid_read_error() {
        let result: Result<Raster<f64>> = read_geotiff("/nonexistent/dir/dem.tif");
        match result {
            Err(Error::GridRead { path, .. }) => assert!(path.ends_with("dem.tif")),
            other => panic!("expected GridRead, got {:?}", other.map(|r| r.shape())),
        }
    }
}
