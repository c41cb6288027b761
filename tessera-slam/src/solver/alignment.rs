//! Transform estimation between two predictions of the same frame.

use crate::solver::TransformModel;
use crate::submap::FrameGeometry;
use glam::Mat4;
use nalgebra::{Matrix3, Matrix4, SMatrix, SVector, SymmetricEigen, Vector3, Vector4};
use ordered_float::OrderedFloat;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AlignmentError {
    #[error("Predictions have {src} and {dst} points")]
    CorrespondenceMismatch { src: usize, dst: usize },

    #[error("Need at least {needed} correspondences, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("Degenerate point configuration")]
    Degenerate,
}

/// Transform mapping `src` coordinates onto `dst` coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Alignment {
    pub transform: Mat4,
    /// RMS point error divided by the RMS spread of the target points.
    pub residual: f32,
    pub correspondences: usize,
}

const MIN_SIMILARITY_POINTS: usize = 3;
const MIN_PROJECTIVE_POINTS: usize = 8;

/// Align two predictions of one frame, using the most confident points.
pub fn align_frames(
    src: &FrameGeometry,
    dst: &FrameGeometry,
    model: TransformModel,
    max_points: usize,
) -> Result<Alignment, AlignmentError> {
    if src.len() != dst.len() {
        return Err(AlignmentError::CorrespondenceMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }

    let mut order: Vec<usize> = (0..src.len())
        .filter(|&i| src.points[i].is_finite() && dst.points[i].is_finite())
        .collect();
    order.sort_by_key(|&i| {
        let c = src.confidence.get(i).copied().unwrap_or(0.0).min(dst.confidence.get(i).copied().unwrap_or(0.0));
        std::cmp::Reverse(OrderedFloat(c))
    });
    order.truncate(max_points.max(MIN_PROJECTIVE_POINTS));

    let to_na = |v: glam::Vec3| Vector3::new(v.x as f64, v.y as f64, v.z as f64);
    let s: Vec<Vector3<f64>> = order.iter().map(|&i| to_na(src.points[i])).collect();
    let d: Vec<Vector3<f64>> = order.iter().map(|&i| to_na(dst.points[i])).collect();

    let transform = match model {
        TransformModel::Similarity => {
            require(s.len(), MIN_SIMILARITY_POINTS)?;
            umeyama(&s, &d)?
        }
        TransformModel::Projective => {
            require(s.len(), MIN_PROJECTIVE_POINTS)?;
            projective_dlt(&s, &d)?
        }
    };

    let residual = normalized_residual(&transform, &s, &d);
    if !residual.is_finite() {
        return Err(AlignmentError::Degenerate);
    }

    Ok(Alignment {
        transform: to_glam(&transform),
        residual: residual as f32,
        correspondences: s.len(),
    })
}

fn require(got: usize, needed: usize) -> Result<(), AlignmentError> {
    if got < needed {
        Err(AlignmentError::TooFewPoints { needed, got })
    } else {
        Ok(())
    }
}

fn centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    points.iter().fold(Vector3::zeros(), |acc, p| acc + p) / points.len() as f64
}

/// Least-squares similarity (Umeyama 1991).
fn umeyama(src: &[Vector3<f64>], dst: &[Vector3<f64>]) -> Result<Matrix4<f64>, AlignmentError> {
    let n = src.len() as f64;
    let mu_s = centroid(src);
    let mu_d = centroid(dst);

    let mut cov = Matrix3::zeros();
    let mut var_s = 0.0;
    for (s, d) in src.iter().zip(dst) {
        let sc = s - mu_s;
        cov += (d - mu_d) * sc.transpose();
        var_s += sc.norm_squared();
    }
    cov /= n;
    var_s /= n;
    if var_s < 1e-12 {
        return Err(AlignmentError::Degenerate);
    }

    let svd = cov.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(AlignmentError::Degenerate);
    };
    let mut sign = Matrix3::identity();
    if u.determinant() * v_t.determinant() < 0.0 {
        sign[(2, 2)] = -1.0;
    }
    let rotation = u * sign * v_t;
    let scale = (svd.singular_values.component_mul(&sign.diagonal())).sum() / var_s;
    if scale <= 0.0 || !scale.is_finite() {
        return Err(AlignmentError::Degenerate);
    }
    let translation = mu_d - rotation * mu_s * scale;

    let mut out = Matrix4::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&(rotation * scale));
    out.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
    Ok(out)
}

/// Similarity that moves the centroid to the origin with mean distance sqrt(3).
fn normalizer(points: &[Vector3<f64>]) -> Result<Matrix4<f64>, AlignmentError> {
    let mu = centroid(points);
    let mean_dist = points.iter().map(|p| (p - mu).norm()).sum::<f64>() / points.len() as f64;
    if mean_dist < 1e-12 {
        return Err(AlignmentError::Degenerate);
    }
    let s = 3f64.sqrt() / mean_dist;
    let mut t = Matrix4::identity() * s;
    t[(3, 3)] = 1.0;
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-mu * s));
    Ok(t)
}

/// Normalized direct linear transform for a full 4x4 projective map.
fn projective_dlt(src: &[Vector3<f64>], dst: &[Vector3<f64>]) -> Result<Matrix4<f64>, AlignmentError> {
    let ts = normalizer(src)?;
    let td = normalizer(dst)?;

    let mut ata = SMatrix::<f64, 16, 16>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let p = ts * Vector4::new(s.x, s.y, s.z, 1.0);
        let q = td * Vector4::new(d.x, d.y, d.z, 1.0);
        for row_idx in 0..3 {
            let mut row = SVector::<f64, 16>::zeros();
            for k in 0..4 {
                row[row_idx * 4 + k] = p[k];
                row[12 + k] = -q[row_idx] * p[k];
            }
            ata += row * row.transpose();
        }
    }

    let eigen = SymmetricEigen::new(ata);
    let (smallest, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(AlignmentError::Degenerate)?;
    let h = eigen.eigenvectors.column(smallest);

    let hn = Matrix4::from_fn(|r, c| h[r * 4 + c]);
    let td_inv = td.try_inverse().ok_or(AlignmentError::Degenerate)?;
    let mut out = td_inv * hn * ts;
    let w = out[(3, 3)];
    if w.abs() > 1e-12 {
        out /= w;
    } else {
        let norm = out.norm();
        if norm < 1e-12 {
            return Err(AlignmentError::Degenerate);
        }
        out /= norm;
    }
    Ok(out)
}

fn apply(m: &Matrix4<f64>, p: &Vector3<f64>) -> Vector3<f64> {
    let h = m * Vector4::new(p.x, p.y, p.z, 1.0);
    Vector3::new(h.x / h.w, h.y / h.w, h.z / h.w)
}

fn normalized_residual(m: &Matrix4<f64>, src: &[Vector3<f64>], dst: &[Vector3<f64>]) -> f64 {
    let n = src.len() as f64;
    let mu = centroid(dst);
    let spread = (dst.iter().map(|d| (d - mu).norm_squared()).sum::<f64>() / n).sqrt();
    let error = (src
        .iter()
        .zip(dst)
        .map(|(s, d)| (apply(m, s) - d).norm_squared())
        .sum::<f64>()
        / n)
        .sqrt();
    if spread < 1e-12 { f64::INFINITY } else { error / spread }
}

fn to_glam(m: &Matrix4<f64>) -> Mat4 {
    let mut cols = [0f32; 16];
    for (dst, src) in cols.iter_mut().zip(m.as_slice()) {
        *dst = *src as f32;
    }
    Mat4::from_cols_array(&cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3, Vec4};

    fn cloud() -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in 0..4 {
            for y in 0..3 {
                for z in 0..3 {
                    let jitter = ((x * 7 + y * 3 + z) % 5) as f32 * 0.03;
                    points.push(Vec3::new(x as f32 * 0.4, y as f32 * 0.5 + jitter, 1.0 + z as f32 * 0.3));
                }
            }
        }
        points
    }

    fn geometry(points: Vec<Vec3>) -> FrameGeometry {
        let n = points.len();
        FrameGeometry {
            frame: 0,
            camera_pose: Mat4::IDENTITY,
            points,
            colors: vec![[0, 0, 0]; n],
            confidence: vec![1.0; n],
        }
    }

    fn assert_mat_close(a: Mat4, b: Mat4, tol: f32) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array()) {
            assert!((x - y).abs() < tol, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_similarity_recovers_scaled_rigid_motion() {
        let truth = Mat4::from_scale_rotation_translation(
            Vec3::splat(1.7),
            Quat::from_euler(glam::EulerRot::XYZ, 0.2, -0.4, 0.1),
            Vec3::new(0.5, -1.0, 2.0),
        );
        let src = cloud();
        let dst: Vec<Vec3> = src.iter().map(|p| truth.transform_point3(*p)).collect();

        let alignment =
            align_frames(&geometry(src), &geometry(dst), TransformModel::Similarity, 1000).unwrap();
        assert_mat_close(alignment.transform, truth, 1e-3);
        assert!(alignment.residual < 1e-4);
    }

    #[test]
    fn test_projective_recovers_general_map() {
        let truth = Mat4::from_cols(
            Vec4::new(1.1, 0.05, 0.0, 0.02),
            Vec4::new(-0.1, 0.9, 0.1, 0.0),
            Vec4::new(0.0, 0.2, 1.2, 0.05),
            Vec4::new(0.3, -0.2, 0.4, 1.0),
        );
        let src = cloud();
        let dst: Vec<Vec3> = src.iter().map(|p| truth.project_point3(*p)).collect();

        let alignment =
            align_frames(&geometry(src), &geometry(dst), TransformModel::Projective, 1000).unwrap();
        assert_mat_close(alignment.transform, truth, 1e-2);
        assert!(alignment.residual < 1e-3);
    }

    #[test]
    fn test_mismatched_predictions_rejected() {
        let a = geometry(cloud());
        let b = geometry(cloud()[..10].to_vec());
        assert_eq!(
            align_frames(&a, &b, TransformModel::Similarity, 100).unwrap_err(),
            AlignmentError::CorrespondenceMismatch { src: 36, dst: 10 }
        );
    }

    #[test]
    fn test_collapsed_points_are_degenerate() {
        let a = geometry(vec![Vec3::ONE; 12]);
        let b = geometry(vec![Vec3::ONE; 12]);
        assert_eq!(
            align_frames(&a, &b, TransformModel::Similarity, 100).unwrap_err(),
            AlignmentError::Degenerate
        );
    }

    #[test]
    fn test_too_few_points_for_projective() {
        let a = geometry(cloud()[..5].to_vec());
        let b = geometry(cloud()[..5].to_vec());
        assert_eq!(
            align_frames(&a, &b, TransformModel::Projective, 100).unwrap_err(),
            AlignmentError::TooFewPoints { needed: 8, got: 5 }
        );
    }
}
