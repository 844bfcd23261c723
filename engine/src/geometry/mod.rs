//! 3-D affine helpers.
//!
//! Points are lifted to homogeneous coordinates (`w = 1`) and transformed by
//! 4x4 row-major matrices. The planar transforms work on the `z = 0` plane.

pub type Vec3 = [f64; 3];
pub type Vec4 = [f64; 4];
pub type Mat4 = [[f64; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Lift a point to homogeneous coordinates.
pub fn to_affine(p: Vec3) -> Vec4 {
    [p[0], p[1], p[2], 1.0]
}

/// Project a homogeneous point back to 3-D.
pub fn from_affine(p: Vec4) -> Vec3 {
    if p[3] == 1.0 || p[3] == 0.0 {
        [p[0], p[1], p[2]]
    } else {
        [p[0] / p[3], p[1] / p[3], p[2] / p[3]]
    }
}

/// Scale a vector to unit length. The zero vector is returned unchanged.
pub fn normalise(v: Vec3) -> Vec3 {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if norm == 0.0 {
        v
    } else {
        [v[0] / norm, v[1] / norm, v[2] / norm]
    }
}

/// Rotation by `angle` radians about `axis` (right-handed).
pub fn rotation_matrix(angle: f64, axis: Vec3) -> Mat4 {
    let [x, y, z] = normalise(axis);
    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;

    [
        [c + t * x * x, t * x * y - s * z, t * x * z + s * y, 0.0],
        [t * x * y + s * z, c + t * y * y, t * y * z - s * x, 0.0],
        [t * x * z - s * y, t * y * z + s * x, c + t * z * z, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Translation by `v`.
pub fn translation_matrix(v: Vec3) -> Mat4 {
    let mut m = IDENTITY;
    m[0][3] = v[0];
    m[1][3] = v[1];
    m[2][3] = v[2];
    m
}

/// Matrix product `a · b`, so `b` applies first.
pub fn mat_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

pub fn transform_point(m: &Mat4, p: Vec4) -> Vec4 {
    let mut out = [0.0; 4];
    for (i, cell) in out.iter_mut().enumerate() {
        *cell = (0..4).map(|k| m[i][k] * p[k]).sum();
    }
    out
}

/// Rotation in the `z = 0` plane by `angle` about `(cx, cy)`.
pub fn planar_rotation(angle: f64, cx: f64, cy: f64) -> Mat4 {
    let to_origin = translation_matrix([-cx, -cy, 0.0]);
    let rotate = rotation_matrix(angle, [0.0, 0.0, 1.0]);
    let back = translation_matrix([cx, cy, 0.0]);
    mat_mul(&back, &mat_mul(&rotate, &to_origin))
}

/// Apply `m` to the point `(x, y, 0)` and return the new `(x, y)`.
pub fn apply_planar(m: &Mat4, x: f64, y: f64) -> (f64, f64) {
    let [nx, ny, _] = from_affine(transform_point(m, to_affine([x, y, 0.0])));
    (nx, ny)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} vs {b}");
    }

    #[test]
    fn test_normalise() {
        assert_eq!(normalise([3.0, 0.0, 4.0]), [0.6, 0.0, 0.8]);
        assert_eq!(normalise([0.0; 3]), [0.0; 3]);
    }

    #[test]
    fn test_rotation_about_z() {
        let m = rotation_matrix(FRAC_PI_2, [0.0, 0.0, 2.0]);
        let [x, y, z, w] = transform_point(&m, to_affine([1.0, 0.0, 0.0]));
        assert_close(x, 0.0);
        assert_close(y, 1.0);
        assert_close(z, 0.0);
        assert_close(w, 1.0);
    }

    #[test]
    fn test_rotation_about_x_moves_y_to_z() {
        let m = rotation_matrix(FRAC_PI_2, [1.0, 0.0, 0.0]);
        let [x, y, z] = from_affine(transform_point(&m, to_affine([0.0, 1.0, 0.0])));
        assert_close(x, 0.0);
        assert_close(y, 0.0);
        assert_close(z, 1.0);
    }

    #[test]
    fn test_translation_and_product() {
        let m = mat_mul(&translation_matrix([1.0, 2.0, 3.0]), &translation_matrix([1.0, 0.0, -3.0]));
        assert_eq!(from_affine(transform_point(&m, to_affine([0.0; 3]))), [2.0, 2.0, 0.0]);
        assert_eq!(mat_mul(&IDENTITY, &m), m);
    }

    #[test]
    fn test_planar_rotation_about_centre() {
        let m = planar_rotation(FRAC_PI_2, 1.0, 1.0);
        let (x, y) = apply_planar(&m, 2.0, 1.0);
        assert_close(x, 1.0);
        assert_close(y, 2.0);

        let (x, y) = apply_planar(&m, 1.0, 1.0);
        assert_close(x, 1.0);
        assert_close(y, 1.0);
    }
}
