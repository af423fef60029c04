//! Pose and orientation helpers.
//!
//! Euler angles use the intrinsic XYZ sequence (`q = Rx * Ry * Rz`), which is
//! also MuJoCo's default `eulerseq`. Quaternions are written to MJCF in
//! `w x y z` order, the order the `quat` attribute is defined with.

use nalgebra::{Quaternion, UnitQuaternion, Vector3, Vector4};

use crate::document::{parse_vector3, parse_vector4};
use crate::error::{Result, SceneError};

/// Below this `cos(ry)` the X and Z axes are treated as aligned.
const GIMBAL_EPS: f64 = 1e-6;

/// Position plus orientation of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in the parent frame.
    pub position: Vector3<f64>,
    /// Orientation in the parent frame.
    pub orientation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create a pose from position and orientation.
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at the origin with no rotation.
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Pose at `position` with no rotation.
    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Pose from a position and intrinsic XYZ Euler angles (radians).
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidRotation`] for non-finite angles.
    pub fn from_euler(position: Vector3<f64>, euler: Vector3<f64>) -> Result<Self> {
        Ok(Self::new(position, euler_to_quaternion(euler)?))
    }

    /// MJCF `pos`/`quat` attribute strings for this pose.
    pub fn attributes(&self) -> PoseAttributes {
        format_pose_attribute(&self.position, &self.orientation)
    }
}

/// Rendered `pos` and `quat` attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseAttributes {
    /// `"x y z"`.
    pub pos: String,
    /// `"w x y z"`.
    pub quat: String,
}

/// Convert intrinsic XYZ Euler angles (radians) to a quaternion.
///
/// # Errors
///
/// Returns [`SceneError::InvalidRotation`] if any angle is NaN or infinite.
pub fn euler_to_quaternion(euler: Vector3<f64>) -> Result<UnitQuaternion<f64>> {
    if !euler.iter().all(|a| a.is_finite()) {
        return Err(SceneError::InvalidRotation(format!(
            "non-finite euler angles ({}, {}, {})",
            euler.x, euler.y, euler.z
        )));
    }
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), euler.x);
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), euler.y);
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), euler.z);
    Ok(rx * ry * rz)
}

/// Convert a quaternion back to intrinsic XYZ Euler angles (radians).
///
/// At gimbal lock (`ry = ±π/2`) the Z rotation is folded into X and `rz` is
/// returned as zero, so the result describes the same rotation but not
/// necessarily the same angles that produced it.
pub fn quaternion_to_euler(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    let rot = q.to_rotation_matrix();
    let m = rot.matrix();

    let cy = m[(0, 0)].hypot(m[(0, 1)]);
    let ry = m[(0, 2)].atan2(cy);

    if cy.abs() > GIMBAL_EPS {
        let rx = (-m[(1, 2)]).atan2(m[(2, 2)]);
        let rz = (-m[(0, 1)]).atan2(m[(0, 0)]);
        Vector3::new(rx, ry, rz)
    } else {
        let rx = m[(2, 1)].atan2(m[(1, 1)]);
        Vector3::new(rx, ry, 0.0)
    }
}

/// Convert an MJCF quaternion `[w, x, y, z]` to a `UnitQuaternion`.
///
/// # Errors
///
/// Returns [`SceneError::InvalidRotation`] if a component is non-finite or
/// the quaternion has zero length.
pub fn quat_from_wxyz(q: Vector4<f64>) -> Result<UnitQuaternion<f64>> {
    if !q.iter().all(|c| c.is_finite()) || q.norm() < 1e-12 {
        return Err(SceneError::InvalidRotation(format!(
            "cannot normalize quaternion ({}, {}, {}, {})",
            q[0], q[1], q[2], q[3]
        )));
    }
    Ok(UnitQuaternion::from_quaternion(Quaternion::new(
        q[0], q[1], q[2], q[3],
    )))
}

/// Convert a scalar-last `[x, y, z, w]` quaternion to a `UnitQuaternion`.
pub fn quat_from_xyzw(q: Vector4<f64>) -> Result<UnitQuaternion<f64>> {
    quat_from_wxyz(Vector4::new(q[3], q[0], q[1], q[2]))
}

/// Convert a `UnitQuaternion` back to MJCF order (w, x, y, z).
pub fn quat_to_wxyz(q: &UnitQuaternion<f64>) -> Vector4<f64> {
    let qi = q.into_inner();
    Vector4::new(qi.w, qi.i, qi.j, qi.k)
}

/// Render a pose as MJCF `pos` and `quat` attribute values.
pub fn format_pose_attribute(
    position: &Vector3<f64>,
    orientation: &UnitQuaternion<f64>,
) -> PoseAttributes {
    PoseAttributes {
        pos: join_numbers(position.iter()),
        quat: join_numbers(quat_to_wxyz(orientation).iter()),
    }
}

/// Parse MJCF `pos` and `quat` attribute values into a pose.
///
/// Missing attributes take MJCF defaults (origin, identity).
pub fn parse_pose_attributes(pos: Option<&str>, quat: Option<&str>) -> Result<Pose> {
    let position = match pos {
        Some(s) => parse_vector3(s)?,
        None => Vector3::zeros(),
    };
    let orientation = match quat {
        Some(s) => quat_from_wxyz(parse_vector4(s)?)?,
        None => UnitQuaternion::identity(),
    };
    Ok(Pose::new(position, orientation))
}

fn join_numbers<'a>(values: impl Iterator<Item = &'a f64>) -> String {
    values
        // `+ 0.0` turns -0.0 into 0.0
        .map(|v| format!("{}", v + 0.0))
        .collect::<Vec<_>>()
        .join(" ")
}
