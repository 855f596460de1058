use std::fmt;

/// Element-wise tolerance below which two poses are considered the same.
///
/// Tracking hardware jitters in the last few bits of its doubles; updates
/// within this band must not re-fire `PoseChanged`.
pub const POSE_TOLERANCE: f64 = 1e-6;

/// A 4x4 rigid/affine transform giving a tool's position and orientation
/// in its parent coordinate frame. Row-major, matching the wire layout.
///
/// Poses are opaque to this crate: they are decoded, stored, compared,
/// and republished, never computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(pub [f64; 16]);

impl Transform {
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Element-wise similarity test against `other` within `tol`.
    pub fn approx_eq(&self, other: &Transform, tol: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// Stable identity for one tracked tool.
///
/// A tool is addressed by the tracking system that hosts it plus its slot
/// on that system; the derived uid is the key used everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToolIdentity {
    pub system_id: i32,
    pub tool_id: i32,
}

impl ToolIdentity {
    pub fn new(system_id: i32, tool_id: i32) -> Self {
        Self { system_id, tool_id }
    }

    /// Derive the string uid, e.g. `"tool_7:2"`.
    pub fn uid(&self) -> String {
        format!("tool_{}:{}", self.system_id, self.tool_id)
    }
}

impl fmt::Display for ToolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool_{}:{}", self.system_id, self.tool_id)
    }
}

/// Kind of a tracked tool, classified from its identity code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Reference,
    UltrasoundProbe,
    Pointer,
    None,
}

impl ToolKind {
    /// Map a tool identity code to its kind.
    pub fn from_code(code: i32) -> ToolKind {
        match code {
            0 => ToolKind::Reference,
            1 | 2 => ToolKind::UltrasoundProbe,
            3 | 6 => ToolKind::Pointer,
            _ => ToolKind::None,
        }
    }
}

/// Outward event raised at the per-tool boundary for UI binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A tool's pose changed; carries the pose and a host-relative
    /// timestamp in seconds (the wire timestamp is discarded upstream).
    TransformAndTimestamp {
        uid: String,
        pose: Transform,
        timestamp_s: f64,
    },
    /// A tool's visibility flipped.
    Visible { uid: String, visible: bool },
    /// The hardware feed ended unexpectedly; tracking has stopped.
    TrackingStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_derivation() {
        assert_eq!(ToolIdentity::new(7, 2).uid(), "tool_7:2");
        assert_eq!(ToolIdentity::new(0, 0).uid(), "tool_0:0");
    }

    #[test]
    fn kind_classification() {
        assert_eq!(ToolKind::from_code(0), ToolKind::Reference);
        assert_eq!(ToolKind::from_code(1), ToolKind::UltrasoundProbe);
        assert_eq!(ToolKind::from_code(2), ToolKind::UltrasoundProbe);
        assert_eq!(ToolKind::from_code(3), ToolKind::Pointer);
        assert_eq!(ToolKind::from_code(6), ToolKind::Pointer);
        assert_eq!(ToolKind::from_code(4), ToolKind::None);
        assert_eq!(ToolKind::from_code(-1), ToolKind::None);
        assert_eq!(ToolKind::from_code(99), ToolKind::None);
    }

    #[test]
    fn transform_similarity() {
        let a = Transform::IDENTITY;
        let mut b = Transform::IDENTITY;
        b.0[3] = 1e-9;
        assert!(a.approx_eq(&b, POSE_TOLERANCE));
        b.0[3] = 0.5;
        assert!(!a.approx_eq(&b, POSE_TOLERANCE));
    }
}
