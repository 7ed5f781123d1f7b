//! Message tags, control codes, and point framing.
//!
//! Two tags cover every message in a run. Tag 0 carries a single integer
//! control code; tag 1 carries a packed sequence of `f64` values whose
//! length is a multiple of three, each triple being one point in
//! `(x, y, z)` order. The packing order is a wire contract: readers pack
//! and workers unpack with the same convention. Any other tag, and any
//! bulk payload whose length is not a multiple of three, is a protocol
//! error at the receiving peer.

use mpi::point_to_point::Status;
use mpi::traits::{Communicator, Destination, Source};

use crate::error::{Error, Result};
use crate::geometry::Vector3d;

/// Tag of control messages.
pub const CONTROL_TAG: i32 = 0;

/// Tag of bulk point messages.
pub const DATA_TAG: i32 = 1;

/// Number of points a reader batches into one bulk message.
pub const SEND_BATCH: usize = 100;

/// Control codes carried on tag 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCode {
    /// A reader has finished distributing its share of the current phase.
    ReaderDone = 0,
    /// A worker has finished thinning (and emitting) the current phase.
    WorkerDone = 1,
    /// The director releases the next role into its phase.
    StartWorking = 2,
}

impl ControlCode {
    /// Wire representation of the code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a received integer; `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ControlCode::ReaderDone),
            1 => Some(ControlCode::WorkerDone),
            2 => Some(ControlCode::StartWorking),
            _ => None,
        }
    }
}

/// A received message, already classified by tag.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A control code from tag 0.
    Control(ControlCode),
    /// A batch of points from tag 1.
    Points(Vec<Vector3d>),
}

/// Send a control code to the peer at `target`.
pub fn send_control<C: Communicator>(comm: &C, target: i32, code: ControlCode) {
    comm.process_at_rank(target)
        .send_with_tag(&code.code(), CONTROL_TAG);
}

/// Pack points into `buffer` and send them as one bulk message to the peer
/// at `target`.
///
/// The buffer is cleared and reused; its capacity persists across sends.
pub fn send_points<C: Communicator>(
    comm: &C,
    target: i32,
    points: &[Vector3d],
    buffer: &mut Vec<f64>,
) {
    buffer.clear();
    for point in points {
        buffer.push(point.x);
        buffer.push(point.y);
        buffer.push(point.z);
    }

    comm.process_at_rank(target)
        .send_with_tag(&buffer[..], DATA_TAG);
}

/// Decode a bulk payload into points.
pub fn unpack_points(payload: &[f64]) -> Result<Vec<Vector3d>> {
    if payload.len() % 3 != 0 {
        return Err(Error::Protocol(format!(
            "bulk payload of {} doubles is not a whole number of points",
            payload.len()
        )));
    }

    let triples: &[[f64; 3]] = bytemuck::cast_slice(payload);
    Ok(triples.iter().map(|&t| Vector3d::from(t)).collect())
}

/// Block until any message arrives, receive it, and classify it.
///
/// Returns the message and the source rank.
pub fn receive_any<C: Communicator>(comm: &C) -> Result<(Message, i32)> {
    let status: Status = comm.any_process().probe();
    let source = status.source_rank();

    match status.tag() {
        CONTROL_TAG => {
            let (raw, _status) = comm
                .process_at_rank(source)
                .receive_with_tag::<i32>(CONTROL_TAG);
            let code = ControlCode::from_code(raw)
                .ok_or_else(|| Error::Protocol(format!("unknown control code {}", raw)))?;
            Ok((Message::Control(code), source))
        }
        DATA_TAG => {
            let (payload, _status) = comm
                .process_at_rank(source)
                .receive_vec_with_tag::<f64>(DATA_TAG);
            Ok((Message::Points(unpack_points(&payload)?), source))
        }
        tag => Err(Error::Protocol(format!(
            "unexpected message tag {} from rank {}",
            tag, source
        ))),
    }
}

/// Block until the director sends `StartWorking`.
///
/// Control codes other than the start instruction are ignored; a bulk
/// message arriving here is a protocol error.
pub fn await_start<C: Communicator>(comm: &C) -> Result<()> {
    loop {
        match receive_any(comm)? {
            (Message::Control(ControlCode::StartWorking), _) => return Ok(()),
            (Message::Control(_), _) => continue,
            (Message::Points(_), source) => {
                return Err(Error::Protocol(format!(
                    "bulk message from rank {} while waiting for a start instruction",
                    source
                )))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_control_code_round_trip() {
        for code in [
            ControlCode::ReaderDone,
            ControlCode::WorkerDone,
            ControlCode::StartWorking,
        ] {
            assert_eq!(ControlCode::from_code(code.code()), Some(code));
        }

        assert_eq!(ControlCode::from_code(3), None);
        assert_eq!(ControlCode::from_code(-1), None);
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let points = vec![
            Vector3d::new(1.0, 2.0, 3.0),
            Vector3d::new(-0.5, 0.25, -0.125),
            Vector3d::new(1e300, -1e-300, 0.0),
        ];

        // Pack the way send_points does.
        let mut payload = Vec::new();
        for point in &points {
            payload.push(point.x);
            payload.push(point.y);
            payload.push(point.z);
        }

        assert_eq!(unpack_points(&payload).unwrap(), points);
    }

    #[test]
    fn test_unpack_rejects_ragged_payload() {
        assert!(unpack_points(&[1.0, 2.0]).is_err());
        assert!(unpack_points(&[1.0, 2.0, 3.0, 4.0]).is_err());
    }

    #[test]
    fn test_unpack_empty_payload() {
        assert_eq!(unpack_points(&[]).unwrap(), Vec::new());
    }
}
