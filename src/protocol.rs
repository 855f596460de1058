use crate::bus::HardwareBus;
use crate::types::Transform;

// -- Signal ids (closed set, shared with the tracking firmware) --

/// No data pending; the receive side surfaces this periodically so the
/// poll loop can check its stop flag.
pub const SIG_IDLE: i32 = 0;
/// Host -> hardware: begin the tracking session.
pub const SIG_BEGIN: i32 = 1;
/// Host -> hardware: initialize one tracking system. Payload: system id.
pub const SIG_INIT: i32 = 2;
/// Host -> hardware: request the tool roster of one system. Payload: system id.
pub const SIG_TOOL_REQUEST: i32 = 3;
/// Host -> hardware: start streaming poses for one system. Payload: system id.
pub const SIG_START_TRACKING: i32 = 4;
/// Host -> hardware: pause streaming for one system. Payload: system id.
pub const SIG_PAUSE: i32 = 5;
/// Hardware -> host: a tracking system came online. Payload: system id.
pub const SIG_SYSTEM_DISCOVERED: i32 = 6;
/// Hardware -> host: one tool position report. Payload: system id, tool id,
/// timestamp (uint32, unused), status code, then a 16-double row-major pose
/// present only when the status code is [`STATUS_OK`].
pub const SIG_TOOL_POSITION: i32 = 7;

/// Status code meaning the tool is currently visible to the tracker.
pub const STATUS_OK: i32 = 0;

/// Decoded payload of a [`SIG_TOOL_POSITION`] message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPositionMsg {
    pub system_id: i32,
    pub tool_id: i32,
    pub status: i32,
    /// Present only when `status == STATUS_OK`.
    pub pose: Option<Transform>,
}

/// Read the body of a tool-position message off the bus.
///
/// The wire timestamp is read and discarded. Returns `None` on any short
/// read; the caller drops the message and resumes polling.
pub fn read_tool_position(bus: &dyn HardwareBus) -> Option<ToolPositionMsg> {
    let system_id = bus.read_int()?;
    let tool_id = bus.read_int()?;
    let _timestamp = bus.read_uint()?;
    let status = bus.read_int()?;

    let pose = if status == STATUS_OK {
        let mut m = [0.0f64; 16];
        if !bus.read_doubles(&mut m) {
            return None;
        }
        Some(Transform(m))
    } else {
        None
    };

    Some(ToolPositionMsg {
        system_id,
        tool_id,
        status,
        pose,
    })
}
