//! GPS EXIF tags for downloaded images.
//!
//! Mapping pipelines read the shot position straight from the image file, so
//! after download every picture gets the vehicle position recorded at
//! shutter time: latitude/longitude as degree-minute-second rationals with
//! hemisphere refs, and the AMSL altitude in metres.

use std::path::Path;

use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use log::debug;

use crate::error::{Result, RigError};
use crate::telemetry::Position;

/// Write the GPS block of `position` into the image at `path`.
pub fn write_gps(path: &Path, position: &Position) -> Result<()> {
    let mut metadata =
        Metadata::new_from_path(path).map_err(|e| RigError::Exif(e.to_string()))?;

    metadata.set_tag(ExifTag::GPSVersionID(vec![2, 3, 0, 0]));
    metadata.set_tag(ExifTag::GPSLatitudeRef(hemisphere(position.latitude, 'N', 'S')));
    metadata.set_tag(ExifTag::GPSLatitude(dms_rationals(position.latitude)));
    metadata.set_tag(ExifTag::GPSLongitudeRef(hemisphere(position.longitude, 'E', 'W')));
    metadata.set_tag(ExifTag::GPSLongitude(dms_rationals(position.longitude)));
    metadata.set_tag(ExifTag::GPSAltitudeRef(vec![u8::from(position.alt_msl_m < 0.0)]));
    metadata.set_tag(ExifTag::GPSAltitude(vec![altitude_rational(position.alt_msl_m)]));

    metadata
        .write_to_file(path)
        .map_err(|e| RigError::Exif(e.to_string()))?;

    debug!(
        "geotagged {}: lat={:.6} lon={:.6} alt={:.1}m",
        path.display(),
        position.latitude,
        position.longitude,
        position.alt_msl_m
    );
    Ok(())
}

fn hemisphere(value: f64, positive: char, negative: char) -> String {
    if value < 0.0 { negative } else { positive }.to_string()
}

/// Decimal degrees to EXIF degree/minute/second rationals.  Seconds carry a
/// 1/1000 denominator, which keeps centimetre-level ground precision.
fn dms_rationals(degrees: f64) -> Vec<uR64> {
    let abs = degrees.abs();
    let d = abs.floor();
    let m = (abs * 60.0).floor() % 60.0;
    let s_milli = ((abs * 3600.0) % 60.0 * 1000.0).round();
    vec![
        uR64 { nominator: d as u32, denominator: 1 },
        uR64 { nominator: m as u32, denominator: 1 },
        uR64 { nominator: s_milli as u32, denominator: 1000 },
    ]
}

/// Altitude in metres with a 1/100 denominator.
fn altitude_rational(alt_m: f64) -> uR64 {
    uR64 {
        nominator: (alt_m.abs() * 100.0).round() as u32,
        denominator: 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dms_splits_degrees_minutes_seconds() {
        // 48.1234567° = 48° 7' 24.44412"
        let dms = dms_rationals(48.1234567);
        assert_eq!((dms[0].nominator, dms[0].denominator), (48, 1));
        assert_eq!((dms[1].nominator, dms[1].denominator), (7, 1));
        assert_eq!(dms[2].denominator, 1000);
        let seconds = dms[2].nominator as f64 / 1000.0;
        assert!((seconds - 24.44412).abs() < 0.001, "seconds={seconds}");
    }

    #[test]
    fn dms_uses_absolute_value() {
        let east = dms_rationals(11.5);
        let west = dms_rationals(-11.5);
        assert_eq!(east[0].nominator, west[0].nominator);
        assert_eq!(east[2].nominator, west[2].nominator);
        assert_eq!(east[0].nominator, 11);
        assert_eq!(east[1].nominator, 30);
        assert_eq!(east[2].nominator, 0);
    }

    #[test]
    fn hemisphere_refs_follow_sign() {
        assert_eq!(hemisphere(48.1, 'N', 'S'), "N");
        assert_eq!(hemisphere(-33.9, 'N', 'S'), "S");
        assert_eq!(hemisphere(151.2, 'E', 'W'), "E");
        assert_eq!(hemisphere(-122.4, 'E', 'W'), "W");
    }

    #[test]
    fn altitude_keeps_two_decimals() {
        let alt = altitude_rational(545.437);
        assert_eq!((alt.nominator, alt.denominator), (54544, 100));
    }

    #[test]
    fn whole_degree_has_zero_minutes_and_seconds() {
        let dms = dms_rationals(10.0);
        assert_eq!(dms[0].nominator, 10);
        assert_eq!(dms[1].nominator, 0);
        assert_eq!(dms[2].nominator, 0);
    }
}
