//! Binary day-file (de)serialization for the current and diffusivity
//! services, and the text metadata documents that describe them
//! (`SPEC_FULL.md` §6).

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

fn read_i32(bytes: &[u8], offset: usize) -> Result<i32, FieldError> {
    let slice = bytes
        .get(offset..offset + 4)
        .ok_or_else(|| FieldError::format("truncated header"))?;
    Ok(i32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_f32_array(bytes: &[u8], offset: usize, count: usize) -> Result<Vec<f32>, FieldError> {
    let needed = count * 4;
    let slice = bytes
        .get(offset..offset + needed)
        .ok_or_else(|| FieldError::format("payload shorter than declared dimensions"))?;
    Ok(slice
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

/// A decoded velocity grid day (§3 "Velocity Grid Day", §6 v3/v4 formats).
#[derive(Debug, Clone)]
pub struct VelocityDay {
    pub n_lat: usize,
    pub n_lon: usize,
    pub n_depth: usize,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub lon: Vec<f32>,
    pub lat: Vec<f32>,
    /// Flattened `[depth][lat*lon]`.
    pub u: Vec<f32>,
    /// Flattened `[depth][lat*lon]`.
    pub v: Vec<f32>,
}

impl VelocityDay {
    /// Parses either the version=4 (multi-depth) or version=3 (legacy,
    /// single-depth) binary layout, selected by the header's version field.
    pub fn parse(bytes: &[u8]) -> Result<Self, FieldError> {
        let version = read_i32(bytes, 0)?;
        match version {
            4 => Self::parse_v4(bytes),
            3 => Self::parse_v3(bytes),
            other => Err(FieldError::format(format!(
                "unsupported velocity day version {other}"
            ))),
        }
    }

    fn parse_v4(bytes: &[u8]) -> Result<Self, FieldError> {
        let n_lat = read_i32(bytes, 4)?;
        let n_lon = read_i32(bytes, 8)?;
        let n_depth = read_i32(bytes, 12)?;
        let year = read_i32(bytes, 16)?;
        let month = read_i32(bytes, 20)?;
        let day = read_i32(bytes, 24)?;
        if n_lat <= 0 || n_lon <= 0 || n_depth <= 0 {
            return Err(FieldError::format("non-positive grid dimension"));
        }
        let (n_lat, n_lon, n_depth) = (n_lat as usize, n_lon as usize, n_depth as usize);
        let cells = n_lat * n_lon;
        let mut offset = 28;
        let lon = read_f32_array(bytes, offset, cells)?;
        offset += cells * 4;
        let lat = read_f32_array(bytes, offset, cells)?;
        offset += cells * 4;
        let u = read_f32_array(bytes, offset, n_depth * cells)?;
        offset += n_depth * cells * 4;
        let v = read_f32_array(bytes, offset, n_depth * cells)?;

        Ok(VelocityDay {
            n_lat,
            n_lon,
            n_depth,
            year,
            month,
            day,
            lon,
            lat,
            u,
            v,
        })
    }

    fn parse_v3(bytes: &[u8]) -> Result<Self, FieldError> {
        let n_lat = read_i32(bytes, 4)?;
        let n_lon = read_i32(bytes, 8)?;
        let year = read_i32(bytes, 12)?;
        let month = read_i32(bytes, 16)?;
        let day = read_i32(bytes, 20)?;
        if n_lat <= 0 || n_lon <= 0 {
            return Err(FieldError::format("non-positive grid dimension"));
        }
        let (n_lat, n_lon) = (n_lat as usize, n_lon as usize);
        let cells = n_lat * n_lon;
        let mut offset = 24;
        let lon = read_f32_array(bytes, offset, cells)?;
        offset += cells * 4;
        let lat = read_f32_array(bytes, offset, cells)?;
        offset += cells * 4;
        let u = read_f32_array(bytes, offset, cells)?;
        offset += cells * 4;
        let v = read_f32_array(bytes, offset, cells)?;

        Ok(VelocityDay {
            n_lat,
            n_lon,
            n_depth: 1,
            year,
            month,
            day,
            lon,
            lat,
            u,
            v,
        })
    }

    /// Encodes this day back to the version=4 binary layout, used by tests
    /// that round-trip a synthetic day through the filesystem.
    pub fn to_bytes_v4(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&4i32.to_le_bytes());
        out.extend_from_slice(&(self.n_lat as i32).to_le_bytes());
        out.extend_from_slice(&(self.n_lon as i32).to_le_bytes());
        out.extend_from_slice(&(self.n_depth as i32).to_le_bytes());
        out.extend_from_slice(&self.year.to_le_bytes());
        out.extend_from_slice(&self.month.to_le_bytes());
        out.extend_from_slice(&self.day.to_le_bytes());
        for v in &self.lon {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.lat {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.u {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.v {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// |value| sentinel or NaN marks land, per §3.
    pub fn is_land_value(value: f32) -> bool {
        value.is_nan() || value.abs() >= 1000.0
    }
}

/// Shared lon/lat coordinates for the diffusivity grid, loaded once (§4.4).
#[derive(Debug, Clone)]
pub struct DiffusivityCoordinates {
    pub n_lat: usize,
    pub n_lon: usize,
    pub lon: Vec<f32>,
    pub lat: Vec<f32>,
}

impl DiffusivityCoordinates {
    pub fn parse(bytes: &[u8]) -> Result<Self, FieldError> {
        let _version = read_i32(bytes, 0)?;
        let n_lat = read_i32(bytes, 4)?;
        let n_lon = read_i32(bytes, 8)?;
        if n_lat <= 0 || n_lon <= 0 {
            return Err(FieldError::format("non-positive grid dimension"));
        }
        let (n_lat, n_lon) = (n_lat as usize, n_lon as usize);
        let cells = n_lat * n_lon;
        let lon = read_f32_array(bytes, 12, cells)?;
        let lat = read_f32_array(bytes, 12 + cells * 4, cells)?;
        Ok(DiffusivityCoordinates {
            n_lat,
            n_lon,
            lon,
            lat,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&(self.n_lat as i32).to_le_bytes());
        out.extend_from_slice(&(self.n_lon as i32).to_le_bytes());
        for v in &self.lon {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.lat {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

/// A decoded diffusivity grid day (§3, §6 version=1 format).
#[derive(Debug, Clone)]
pub struct DiffusivityDay {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub k: Vec<f32>,
}

impl DiffusivityDay {
    pub fn parse(bytes: &[u8], cells: usize) -> Result<Self, FieldError> {
        let version = read_i32(bytes, 0)?;
        if version != 1 {
            return Err(FieldError::format(format!(
                "unsupported diffusivity day version {version}"
            )));
        }
        let year = read_i32(bytes, 4)?;
        let month = read_i32(bytes, 8)?;
        let day = read_i32(bytes, 12)?;
        let k = read_f32_array(bytes, 16, cells)?;
        Ok(DiffusivityDay { year, month, day, k })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&self.year.to_le_bytes());
        out.extend_from_slice(&self.month.to_le_bytes());
        out.extend_from_slice(&self.day.to_le_bytes());
        for v in &self.k {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

/// Reads a whole file into memory, translating I/O failures into the
/// taxonomy's `IoError` case.
pub fn read_file(path: &std::path::Path) -> Result<Vec<u8>, FieldError> {
    let mut file = std::fs::File::open(path).map_err(|source| FieldError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|source| FieldError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(buf)
}

/// One entry in the velocity metadata `days` list (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayEntry {
    pub day_offset: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub date_str: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Velocity metadata document (§6): available days, discrete depth levels,
/// and the bounding box of the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityMetadata {
    pub days: Vec<DayEntry>,
    pub depths: Vec<f64>,
    pub bounding_box: BoundingBox,
}

impl VelocityMetadata {
    pub fn from_json(text: &str) -> Result<Self, FieldError> {
        serde_json::from_str(text).map_err(|e| FieldError::format(e.to_string()))
    }
}

/// Diffusivity metadata document (§6): total day count and the dates present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffusivityMetadata {
    pub total_days: usize,
    pub dates: Vec<u32>,
}

impl DiffusivityMetadata {
    pub fn from_json(text: &str) -> Result<Self, FieldError> {
        serde_json::from_str(text).map_err(|e| FieldError::format(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_day() -> VelocityDay {
        VelocityDay {
            n_lat: 2,
            n_lon: 2,
            n_depth: 1,
            year: 2011,
            month: 1,
            day: 1,
            lon: vec![0.0, 1.0, 0.0, 1.0],
            lat: vec![0.0, 0.0, 1.0, 1.0],
            u: vec![0.1, 0.2, 0.3, 1000.0],
            v: vec![0.0, 0.0, 0.0, f32::NAN],
        }
    }

    #[test]
    fn v4_round_trips() {
        let day = sample_day();
        let bytes = day.to_bytes_v4();
        let parsed = VelocityDay::parse(&bytes).unwrap();
        assert_eq!(parsed.n_lat, 2);
        assert_eq!(parsed.n_lon, 2);
        assert_eq!(parsed.u[1], 0.2);
        assert!(VelocityDay::is_land_value(parsed.u[3]));
        assert!(VelocityDay::is_land_value(parsed.v[3]));
        assert!(!VelocityDay::is_land_value(parsed.u[0]));
    }

    #[test]
    fn truncated_buffer_is_format_error() {
        let err = VelocityDay::parse(&[4, 0, 0, 0]);
        assert!(err.is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = sample_day().to_bytes_v4();
        bytes[0..4].copy_from_slice(&99i32.to_le_bytes());
        assert!(VelocityDay::parse(&bytes).is_err());
    }

    #[test]
    fn diffusivity_coordinates_round_trip() {
        let coords = DiffusivityCoordinates {
            n_lat: 2,
            n_lon: 2,
            lon: vec![0.0, 1.0, 0.0, 1.0],
            lat: vec![0.0, 0.0, 1.0, 1.0],
        };
        let bytes = coords.to_bytes();
        let parsed = DiffusivityCoordinates::parse(&bytes).unwrap();
        assert_eq!(parsed.lon, coords.lon);
    }

    #[test]
    fn diffusivity_day_round_trips() {
        let day = DiffusivityDay {
            year: 2011,
            month: 3,
            day: 4,
            k: vec![50.0, 3500.0],
        };
        let bytes = day.to_bytes();
        let parsed = DiffusivityDay::parse(&bytes, 2).unwrap();
        assert_eq!(parsed.k, day.k);
    }
}
