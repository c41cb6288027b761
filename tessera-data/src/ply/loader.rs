//! PLY file loading functions

use crate::error::DataError;
use crate::types::ScenePoint;
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

// PLY file structure, vertices only
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
}

/// Load colored vertices from a PLY file.
///
/// Colors are read from `red/green/blue` or `r/g/b`; vertices without color
/// come back light grey.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_vertices_from_ply(path: &Path) -> Result<Vec<ScenePoint>, DataError> {
    debug!("Loading PLY vertices from: {}", path.display());
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let ply_data: PlyFile = serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DataError::Ply(e.to_string())
    })?;

    info!("PLY file parsed: {} vertices", ply_data.vertex.len());

    fn get_f32(prop: Option<&JsonValue>) -> Option<f32> {
        prop.and_then(|v| match v {
            JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
            _ => None,
        })
    }

    fn get_u8(prop: Option<&JsonValue>) -> Option<u8> {
        prop.and_then(|v| match v {
            JsonValue::Number(n) => n
                .as_u64()
                .map(|u| u.min(255) as u8)
                .or_else(|| n.as_f64().map(|f| f.clamp(0.0, 255.0) as u8)),
            _ => None,
        })
    }

    let mut points = Vec::with_capacity(ply_data.vertex.len());

    for (i, vertex) in ply_data.vertex.iter().enumerate() {
        let coord = |name: &'static str| {
            get_f32(vertex.get(name)).ok_or(DataError::MissingProperty {
                property: name,
                vertex: i,
            })
        };
        let position = Vec3::new(coord("x")?, coord("y")?, coord("z")?);

        let color = if let (Some(r), Some(g), Some(b)) = (
            get_u8(vertex.get("red")),
            get_u8(vertex.get("green")),
            get_u8(vertex.get("blue")),
        ) {
            [r, g, b]
        } else if let (Some(r), Some(g), Some(b)) = (
            get_u8(vertex.get("r")),
            get_u8(vertex.get("g")),
            get_u8(vertex.get("b")),
        ) {
            [r, g, b]
        } else {
            ScenePoint::default().color
        };

        points.push(ScenePoint::new(position, color));
    }

    debug!("Loaded {} vertices from PLY file", points.len());
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ply::write_points_ply;

    #[test]
    fn test_load_written_cloud() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scene.ply");
        let points = vec![
            ScenePoint::new(Vec3::new(0.25, -1.0, 4.0), [10, 20, 30]),
            ScenePoint::new(Vec3::new(2.0, 3.0, -0.5), [255, 128, 0]),
            ScenePoint::white(Vec3::ZERO),
        ];
        write_points_ply(&path, &points).unwrap();

        let loaded = load_vertices_from_ply(&path).unwrap();
        assert_eq!(loaded, points);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_vertices_from_ply(Path::new("/nonexistent/scene.ply"));
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
