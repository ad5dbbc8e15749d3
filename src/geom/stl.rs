//! STL decoding for delivered artifacts.
//!
//! Both encodings are accepted. A file is treated as binary when its length
//! matches the triangle count in the header exactly; this also covers binary
//! files whose 80-byte header happens to start with `solid`.

use super::diagnostics::GeomMeshDiagnostics;
use super::mesh::{GeomMesh, finalize_mesh};
use super::{Point3, Tolerance};

const HEADER_LEN: usize = 80;
const TRIANGLE_RECORD_LEN: usize = 50;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum StlError {
    #[error("STL data is empty")]
    Empty,
    #[error("binary STL is truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("ASCII STL parse error on line {line}: {reason}")]
    Ascii { line: usize, reason: String },
    #[error("STL contains no triangles")]
    NoTriangles,
    #[error("STL contains non-finite coordinates")]
    NonFinite,
}

/// Decodes an STL file and welds its triangle soup into an indexed mesh.
pub fn parse_stl(bytes: &[u8]) -> Result<(GeomMesh, GeomMeshDiagnostics), StlError> {
    if bytes.is_empty() {
        return Err(StlError::Empty);
    }

    let points = if looks_binary(bytes) {
        parse_binary(bytes)?
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        parse_ascii(bytes)?
    } else {
        parse_binary(bytes)?
    };

    if points.is_empty() {
        return Err(StlError::NoTriangles);
    }
    if points.iter().any(|p| !p.is_finite()) {
        return Err(StlError::NonFinite);
    }

    let indices: Vec<u32> = (0..points.len() as u32).collect();
    let (mesh, diagnostics) = finalize_mesh(points, indices, Tolerance::WELD);
    if mesh.is_empty() {
        return Err(StlError::NoTriangles);
    }
    log::debug!("decoded STL: {}", diagnostics.summary());
    Ok((mesh, diagnostics))
}

fn binary_triangle_count(bytes: &[u8]) -> Option<usize> {
    let count = bytes.get(HEADER_LEN..HEADER_LEN + 4)?;
    Some(u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize)
}

fn looks_binary(bytes: &[u8]) -> bool {
    binary_triangle_count(bytes)
        .and_then(|count| count.checked_mul(TRIANGLE_RECORD_LEN))
        .is_some_and(|body| body + HEADER_LEN + 4 == bytes.len())
}

fn parse_binary(bytes: &[u8]) -> Result<Vec<Point3>, StlError> {
    let Some(count) = binary_triangle_count(bytes) else {
        return Err(StlError::Truncated {
            expected: HEADER_LEN + 4,
            actual: bytes.len(),
        });
    };
    let expected = count
        .saturating_mul(TRIANGLE_RECORD_LEN)
        .saturating_add(HEADER_LEN + 4);
    if bytes.len() < expected {
        return Err(StlError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let mut points = Vec::with_capacity(count * 3);
    for record in bytes[HEADER_LEN + 4..expected].chunks_exact(TRIANGLE_RECORD_LEN) {
        // 12 bytes of facet normal, then three vertices, then 2 attribute bytes.
        for vertex in record[12..48].chunks_exact(12) {
            points.push(Point3::new(
                read_f32(&vertex[0..4]),
                read_f32(&vertex[4..8]),
                read_f32(&vertex[8..12]),
            ));
        }
    }
    Ok(points)
}

fn read_f32(bytes: &[u8]) -> f64 {
    f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_ascii(bytes: &[u8]) -> Result<Vec<Point3>, StlError> {
    let text = String::from_utf8_lossy(bytes);
    let mut points = Vec::new();
    let mut in_loop = 0usize;

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let mut coords = [0.0; 3];
                for coord in &mut coords {
                    let token = tokens.next().ok_or_else(|| StlError::Ascii {
                        line: line_no,
                        reason: "vertex needs three coordinates".to_string(),
                    })?;
                    *coord = token.parse::<f64>().map_err(|err| StlError::Ascii {
                        line: line_no,
                        reason: format!("invalid coordinate `{token}`: {err}"),
                    })?;
                }
                points.push(Point3::from_array(coords));
                in_loop += 1;
            }
            Some("endloop") => {
                if in_loop != 3 {
                    return Err(StlError::Ascii {
                        line: line_no,
                        reason: format!("facet has {in_loop} vertices, expected 3"),
                    });
                }
                in_loop = 0;
            }
            Some("outer") => in_loop = 0,
            _ => {}
        }
    }

    if points.len() % 3 != 0 {
        return Err(StlError::Ascii {
            line: text.lines().count(),
            reason: "file ends inside a facet".to_string(),
        });
    }
    Ok(points)
}
