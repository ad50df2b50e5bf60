use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::EngineError;

pub const BLOB_FORMAT_VERSION: u32 = 1;
pub const BLOB_HEADER_SIZE: usize = 8;
pub const BYTES_PER_F32: usize = 4;

/// Write all vectors in insertion order as a raw little-endian f32 blob,
/// prefixed with `[format_version: u32][dimension: u32]`.
pub fn write_vectors(path: &Path, dimension: usize, vectors: &[Vec<f32>]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&BLOB_FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(dimension as u32).to_le_bytes())?;

    for vector in vectors {
        for &val in vector {
            writer.write_all(&val.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn parse_header(bytes: &[u8]) -> Result<(u32, usize)> {
    if bytes.len() < BLOB_HEADER_SIZE {
        return Err(EngineError::validation("Invalid vectors file: too small").into());
    }
    let format_version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let dimension = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    Ok((format_version, dimension))
}

pub fn validate_size(bytes: &[u8], dimension: usize, num_vectors: usize) -> Result<()> {
    let expected = BLOB_HEADER_SIZE + num_vectors * dimension * BYTES_PER_F32;
    if bytes.len() < expected {
        return Err(EngineError::validation(format!(
            "Invalid vectors file: expected {} bytes, got {}",
            expected,
            bytes.len()
        ))
        .into());
    }
    Ok(())
}

pub fn read_vectors(bytes: &[u8], dimension: usize, num_vectors: usize) -> Vec<Vec<f32>> {
    let vector_bytes = dimension * BYTES_PER_F32;
    (0..num_vectors)
        .map(|i| {
            let offset = BLOB_HEADER_SIZE + i * vector_bytes;
            bytes[offset..offset + vector_bytes]
                .chunks_exact(BYTES_PER_F32)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect()
}
