//! Chunk encoding and crash-safe file writes

use crate::errors::{Result, RuEnsError};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Encode a field as little-endian f32, row-major
pub(crate) fn encode_field(field: &ArrayViewD<'_, f32>) -> Vec<u8> {
    field.iter().flat_map(|&f| f.to_le_bytes()).collect()
}

/// Decode a chunk written by [`encode_field`]
pub(crate) fn decode_field(path: &Path, bytes: &[u8], shape: &[usize]) -> Result<ArrayD<f32>> {
    let expected: usize = shape.iter().product::<usize>() * 4;
    if bytes.len() != expected {
        return Err(RuEnsError::CorruptChunk {
            path: path.to_path_buf(),
            message: format!("expected {expected} bytes, found {}", bytes.len()),
        });
    }

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}

/// Write `data` to `path` through a temp file in the same directory
///
/// Readers see either the old content or the new one, never a partial file.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decode_rejects_short_chunk() {
        let err = decode_field(Path::new("x.f32"), &[0u8; 7], &[2]).unwrap_err();
        assert!(matches!(err, RuEnsError::CorruptChunk { .. }));
    }

    #[test]
    fn encoded_field_decodes_with_nan() {
        let field = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, f32::NAN, -3.5, 0.0]).unwrap();
        let bytes = encode_field(&field.view());
        let back = decode_field(Path::new("x.f32"), &bytes, &[2, 2]).unwrap();
        assert_eq!(back[[0, 0]], 1.0);
        assert!(back[[0, 1]].is_nan());
        assert_eq!(back[[1, 0]], -3.5);
    }

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("refs").join("main.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
    }
}
