use crate::export::{ExportError, SceneExporter};
use crate::submap::{Submap, SubmapStore};
use ordered_float::OrderedFloat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tessera_data::{
    CameraPose, CameraRecord, ScenePoint, SubmapRecord, Trajectory, write_points_ply,
};
use tracing::info;

pub const SCENE_FILE: &str = "scene.ply";
pub const TRAJECTORY_FILE: &str = "trajectory.json";

/// Writes `scene.ply` and `trajectory.json` into an output directory.
pub struct PlyExporter {
    output_dir: PathBuf,
    /// Per-submap confidence percentile below which points are dropped.
    confidence_percentile: f32,
    points: Vec<ScenePoint>,
    trajectory: Trajectory,
}

impl PlyExporter {
    pub fn new(output_dir: impl Into<PathBuf>, confidence_percentile: f32) -> Self {
        Self {
            output_dir: output_dir.into(),
            confidence_percentile: confidence_percentile.clamp(0.0, 100.0),
            points: Vec::new(),
            trajectory: Trajectory::default(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn points(&self) -> &[ScenePoint] {
        &self.points
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    fn confidence_cutoff(&self, submap: &Submap) -> f32 {
        let mut values: Vec<f32> = submap
            .geometry
            .iter()
            .flat_map(|g| g.confidence.iter().copied())
            .filter(|c| c.is_finite())
            .collect();
        if values.is_empty() {
            return f32::NEG_INFINITY;
        }
        values.sort_by_key(|c| OrderedFloat(*c));
        let rank = self.confidence_percentile / 100.0 * (values.len() - 1) as f32;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        values[lo] + (values[hi] - values[lo]) * (rank - lo as f32)
    }
}

impl SceneExporter for PlyExporter {
    fn refresh(&mut self, store: &SubmapStore) -> Result<(), ExportError> {
        self.points.clear();
        self.trajectory = Trajectory::default();
        let mut seen_frames = HashSet::new();

        for submap in store.iter() {
            let cutoff = self.confidence_cutoff(submap);
            for prediction in &submap.geometry {
                let kept = prediction
                    .points
                    .iter()
                    .zip(&prediction.colors)
                    .zip(&prediction.confidence)
                    .filter(|(_, c)| **c >= cutoff)
                    .map(|((p, color), _)| ScenePoint::new(submap.transform.project_point3(*p), *color));
                self.points.extend(kept);
            }

            for frame in &submap.frames {
                if !seen_frames.insert(frame.index) {
                    continue;
                }
                if let Some(pose) = submap.world_camera_pose(frame.index) {
                    self.trajectory.cameras.push(CameraRecord::new(
                        frame.index,
                        submap.id,
                        frame.path.clone(),
                        CameraPose::from_transform(pose),
                    ));
                }
            }
            self.trajectory
                .submaps
                .push(SubmapRecord::new(submap.id, submap.frame_indices(), submap.transform));
        }
        Ok(())
    }

    fn export(&mut self, loop_closures: usize) -> Result<PathBuf, ExportError> {
        if self.trajectory.submaps.is_empty() {
            return Err(ExportError::EmptyScene);
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let scene = self.output_dir.join(SCENE_FILE);
        write_points_ply(&scene, &self.points)?;

        self.trajectory.loop_closures = loop_closures;
        self.trajectory.write(&self.output_dir.join(TRAJECTORY_FILE))?;

        info!(
            "Exported {} points and {} cameras to {}",
            self.points.len(),
            self.trajectory.cameras.len(),
            scene.display()
        );
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submap::FrameGeometry;
    use crate::test_support::tiny_frame;
    use glam::{Mat4, Vec3};
    use std::sync::Arc;
    use tessera_data::load_vertices_from_ply;

    fn prediction(frame: usize, confidence: Vec<f32>) -> FrameGeometry {
        let n = confidence.len();
        FrameGeometry {
            frame,
            camera_pose: Mat4::IDENTITY,
            points: (0..n).map(|i| Vec3::new(i as f32, 0.0, 1.0)).collect(),
            colors: vec![[10, 20, 30]; n],
            confidence,
        }
    }

    fn store() -> SubmapStore {
        let mut store = SubmapStore::new();
        store.insert(
            vec![Arc::new(tiny_frame(0)), Arc::new(tiny_frame(1))],
            vec![prediction(0, vec![1.0, 2.0]), prediction(1, vec![3.0, 4.0])],
            Mat4::IDENTITY,
        );
        store.insert(
            vec![Arc::new(tiny_frame(1)), Arc::new(tiny_frame(2))],
            vec![prediction(1, vec![1.0, 1.0]), prediction(2, vec![1.0, 1.0])],
            Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)),
        );
        store
    }

    #[test]
    fn test_percentile_drops_low_confidence_points() {
        let mut exporter = PlyExporter::new("unused", 50.0);
        exporter.refresh(&store()).unwrap();
        // Submap 0 keeps 3.0 and 4.0; submap 1 is uniform and keeps everything.
        assert_eq!(exporter.points().len(), 2 + 4);
        assert!(exporter.points()[2..].iter().all(|p| p.position.y == 5.0));
    }

    #[test]
    fn test_zero_percentile_keeps_everything() {
        let mut exporter = PlyExporter::new("unused", 0.0);
        exporter.refresh(&store()).unwrap();
        assert_eq!(exporter.points().len(), 8);
    }

    #[test]
    fn test_cameras_recorded_once_per_frame() {
        let mut exporter = PlyExporter::new("unused", 0.0);
        exporter.refresh(&store()).unwrap();
        let frames: Vec<usize> = exporter.trajectory().cameras.iter().map(|c| c.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
        assert_eq!(exporter.trajectory().cameras[2].position, [0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_export_writes_scene_and_trajectory() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut exporter = PlyExporter::new(&out, 0.0);
        exporter.refresh(&store()).unwrap();
        let scene = exporter.export(3).unwrap();

        assert_eq!(scene, out.join(SCENE_FILE));
        assert_eq!(load_vertices_from_ply(&scene).unwrap().len(), 8);
        let trajectory = Trajectory::read(&out.join(TRAJECTORY_FILE)).unwrap();
        assert_eq!(trajectory.loop_closures, 3);
        assert_eq!(trajectory.submaps.len(), 2);
    }

    #[test]
    fn test_export_without_submaps_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut exporter = PlyExporter::new(dir.path(), 25.0);
        exporter.refresh(&SubmapStore::new()).unwrap();
        assert!(matches!(exporter.export(0), Err(ExportError::EmptyScene)));
    }
}
