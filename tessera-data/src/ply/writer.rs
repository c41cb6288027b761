//! PLY file writing

use crate::error::DataError;
use crate::ply::PlyVertex;
use crate::types::ScenePoint;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

const FORMAT: &str = if cfg!(target_endian = "little") {
    "binary_little_endian"
} else {
    "binary_big_endian"
};

/// Write colored points as a binary PLY point cloud.
#[tracing::instrument(skip_all, fields(path = %path.display(), points = points.len()))]
pub fn write_points_ply(path: &Path, points: &[ScenePoint]) -> Result<(), DataError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    write!(
        writer,
        "ply\n\
         format {FORMAT} 1.0\n\
         comment generated by tessera\n\
         element vertex {}\n\
         property float x\n\
         property float y\n\
         property float z\n\
         property uchar red\n\
         property uchar green\n\
         property uchar blue\n\
         end_header\n",
        points.len()
    )?;

    let vertices: Vec<PlyVertex> = points.iter().map(PlyVertex::from).collect();
    writer.write_all(bytemuck::cast_slice(&vertices))?;
    writer.flush()?;

    debug!("Wrote {} vertices", vertices.len());
    Ok(())
}
