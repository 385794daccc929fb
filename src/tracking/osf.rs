//! OpenSeeFace native binary UDP protocol receiver
//!
//! Parses the binary UDP protocol sent by OpenSeeFace's facetracker when
//! streaming face tracking data. Each face frame is exactly 1785 bytes:
//!
//!   - f64 time (8 bytes)
//!   - i32 face_id (4 bytes)
//!   - 2×f32 camera_resolution (8 bytes)
//!   - f32 right_eye_open (4 bytes)
//!   - f32 left_eye_open (4 bytes)
//!   - u8 got_3d_points (1 byte)
//!   - f32 fit_3d_error (4 bytes)
//!   - 4×f32 quaternion (16 bytes) — x, y, z, w
//!   - 3×f32 euler (12 bytes) — pitch, yaw, roll in degrees
//!   - 3×f32 translation (12 bytes)
//!   - 68×f32 per-landmark confidence (272 bytes)
//!   - 68×(2×f32) 2D landmarks (544 bytes)
//!   - 70×(3×f32) 3D landmarks (840 bytes)
//!   - 14×f32 features (56 bytes) — index 12 is mouth-open, 13 is mouth-wide
//!
//! Multi-face packets contain N×1785 bytes. Only the fields the applier
//! consumes are retained; landmark and confidence blocks are skipped.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TrackingConfig;
use crate::error::{FacedriverError, TrackingError};
use crate::tracking::TrackingStore;

/// Size of a single face frame in bytes
pub const FRAME_SIZE: usize = 1785;

/// Byte length of the skipped confidence + 2D/3D landmark blocks
const LANDMARK_BLOCK: usize = 272 + 544 + 840;

/// Number of trailing feature floats
const NUM_FEATURES: usize = 14;

/// One face sample, as consumed by the applier.
///
/// Immutable once parsed. `time` is the tracker's own monotonic clock, used
/// by consumers to reject stale frames.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSample {
    /// Timestamp from the tracker (seconds, monotonic per tracker process)
    pub time: f64,
    /// Subject id for multi-face tracking
    pub face_id: i32,
    /// Right eye openness (0.0 = closed, 1.0 = open)
    pub right_eye_open: f32,
    /// Left eye openness (0.0 = closed, 1.0 = open)
    pub left_eye_open: f32,
    /// Whether 3D landmark data was computed for this frame
    pub got_3d_points: bool,
    /// 3D pose fit error; higher means less reliable
    pub fit_error: f32,
    /// Raw orientation quaternion (x, y, z, w)
    pub quaternion: [f32; 4],
    /// Raw Euler triple in degrees (pitch, yaw, roll)
    pub euler: [f32; 3],
    /// Mouth-open feature scalar
    pub mouth_open: f32,
    /// Mouth-wide feature scalar
    pub mouth_wide: f32,
}

/// Little-endian cursor over a single frame.
///
/// Bounds are checked once when the reader is created, so the individual
/// reads cannot run past the end of the frame.
struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8], offset: usize) -> Result<Self, TrackingError> {
        if buf.len() < offset + FRAME_SIZE {
            return Err(TrackingError::Parse(format!(
                "Buffer too short: need {} bytes at offset {}, have {}",
                FRAME_SIZE,
                offset,
                buf.len()
            )));
        }
        Ok(Self {
            buf: &buf[offset..offset + FRAME_SIZE],
            pos: 0,
        })
    }

    fn f64(&mut self) -> f64 {
        let val = f64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        val
    }

    fn f32(&mut self) -> f32 {
        let val = f32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        val
    }

    fn i32(&mut self) -> i32 {
        let val = i32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        val
    }

    fn u8(&mut self) -> u8 {
        let val = self.buf[self.pos];
        self.pos += 1;
        val
    }

    fn skip(&mut self, bytes: usize) {
        self.pos += bytes;
    }
}

/// Parse a single face sample from the buffer at the given offset.
///
/// Consumes exactly [`FRAME_SIZE`] bytes on success.
pub fn parse_sample(buf: &[u8], offset: usize) -> Result<TrackingSample, TrackingError> {
    let mut r = FrameReader::new(buf, offset)?;

    let time = r.f64();
    let face_id = r.i32();
    r.skip(8); // camera resolution
    let right_eye_open = r.f32();
    let left_eye_open = r.f32();
    let got_3d_points = r.u8() != 0;
    let fit_error = r.f32();
    let quaternion = [r.f32(), r.f32(), r.f32(), r.f32()];
    let euler = [r.f32(), r.f32(), r.f32()];
    r.skip(12); // translation
    r.skip(LANDMARK_BLOCK);

    let mut features = [0.0f32; NUM_FEATURES];
    for f in &mut features {
        *f = r.f32();
    }

    debug_assert_eq!(r.pos, FRAME_SIZE);

    Ok(TrackingSample {
        time,
        face_id,
        right_eye_open,
        left_eye_open,
        got_3d_points,
        fit_error,
        quaternion,
        euler,
        mouth_open: features[12],
        mouth_wide: features[13],
    })
}

/// OpenSeeFace UDP receiver.
///
/// Parses every face in each packet and publishes them to the shared
/// [`TrackingStore`], keyed by subject id.
pub struct OsfReceiver {
    config: TrackingConfig,
    socket: Option<UdpSocket>,
    store: Arc<TrackingStore>,
}

impl OsfReceiver {
    pub fn new(config: &TrackingConfig, store: Arc<TrackingStore>) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            store,
        }
    }

    /// Bind the UDP socket and start receiving.
    pub fn start(&mut self) -> Result<(), FacedriverError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TrackingError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .ok();

        tracing::info!("Tracking receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Process pending packets (non-blocking).
    ///
    /// Packets may contain multiple faces (N×1785 bytes); each parsed sample
    /// is published under its own subject id.
    pub async fn process(&self) -> Result<(), FacedriverError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(()),
        };

        let mut buf = [0u8; 65536];

        match socket.recv(&mut buf) {
            Ok(size) => {
                let num_faces = size / FRAME_SIZE;
                for i in 0..num_faces {
                    match parse_sample(&buf, i * FRAME_SIZE) {
                        Ok(sample) => self.store.publish(sample).await,
                        Err(e) => {
                            tracing::trace!("Tracking frame parse error: {}", e);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No data available
            }
            Err(e) => {
                return Err(TrackingError::Receiver(format!("Receive error: {}", e)).into());
            }
        }

        Ok(())
    }

    /// Stop the receiver.
    pub fn stop(&mut self) {
        self.socket = None;
        tracing::info!("Tracking receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parameters the tests care about; everything else is zero-filled.
    pub(crate) struct TestFrame {
        pub time: f64,
        pub face_id: i32,
        pub right_eye_open: f32,
        pub left_eye_open: f32,
        pub fit_error: f32,
        pub quaternion: [f32; 4],
        pub euler: [f32; 3],
        pub mouth_open: f32,
        pub mouth_wide: f32,
    }

    impl Default for TestFrame {
        fn default() -> Self {
            Self {
                time: 0.0,
                face_id: 0,
                right_eye_open: 1.0,
                left_eye_open: 1.0,
                fit_error: 0.01,
                quaternion: [0.0, 0.0, 0.0, 1.0],
                euler: [0.0, 0.0, 0.0],
                mouth_open: 0.0,
                mouth_wide: 0.0,
            }
        }
    }

    /// Build a 1785-byte frame matching the real protocol layout.
    pub(crate) fn build_frame(frame: &TestFrame) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_SIZE);

        buf.extend_from_slice(&frame.time.to_le_bytes());
        buf.extend_from_slice(&frame.face_id.to_le_bytes());
        // camera resolution
        buf.extend_from_slice(&640.0f32.to_le_bytes());
        buf.extend_from_slice(&480.0f32.to_le_bytes());
        buf.extend_from_slice(&frame.right_eye_open.to_le_bytes());
        buf.extend_from_slice(&frame.left_eye_open.to_le_bytes());
        // got_3d_points
        buf.push(1);
        buf.extend_from_slice(&frame.fit_error.to_le_bytes());
        for &v in &frame.quaternion {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for &v in &frame.euler {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        // translation
        for _ in 0..3 {
            buf.extend_from_slice(&0.0f32.to_le_bytes());
        }
        // confidence + 2D + 3D landmark blocks (skipped by the parser)
        buf.resize(buf.len() + LANDMARK_BLOCK, 0);
        // features: indices 12/13 are mouth-open/mouth-wide
        let mut features = [0.0f32; NUM_FEATURES];
        features[12] = frame.mouth_open;
        features[13] = frame.mouth_wide;
        for &v in &features {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        assert_eq!(buf.len(), FRAME_SIZE);
        buf
    }

    #[test]
    fn test_parse_sample_basic() {
        let buf = build_frame(&TestFrame {
            time: 1.234,
            face_id: 3,
            right_eye_open: 0.8,
            left_eye_open: 0.9,
            fit_error: 0.01,
            quaternion: [0.1, 0.2, 0.3, 0.9],
            euler: [10.0, 20.0, 5.0],
            mouth_open: 0.7,
            mouth_wide: 0.25,
        });

        let sample = parse_sample(&buf, 0).unwrap();

        assert!((sample.time - 1.234).abs() < 1e-6);
        assert_eq!(sample.face_id, 3);
        assert!((sample.right_eye_open - 0.8).abs() < 1e-6);
        assert!((sample.left_eye_open - 0.9).abs() < 1e-6);
        assert!(sample.got_3d_points);
        assert!((sample.fit_error - 0.01).abs() < 1e-6);
        assert!((sample.quaternion[3] - 0.9).abs() < 1e-6);
        assert!((sample.euler[1] - 20.0).abs() < 1e-6);
        assert!((sample.mouth_open - 0.7).abs() < 1e-6);
        assert!((sample.mouth_wide - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_parse_sample_buffer_too_short() {
        let buf = vec![0u8; 100];
        assert!(parse_sample(&buf, 0).is_err());
    }

    #[test]
    fn test_parse_sample_bad_offset() {
        let buf = build_frame(&TestFrame::default());
        assert!(parse_sample(&buf, 1).is_err());
    }

    #[test]
    fn test_parse_multi_face() {
        let mut buf = build_frame(&TestFrame {
            face_id: 0,
            euler: [10.0, 0.0, 0.0],
            ..TestFrame::default()
        });
        buf.extend_from_slice(&build_frame(&TestFrame {
            face_id: 1,
            euler: [20.0, 0.0, 0.0],
            ..TestFrame::default()
        }));

        let f0 = parse_sample(&buf, 0).unwrap();
        let f1 = parse_sample(&buf, FRAME_SIZE).unwrap();

        assert_eq!(f0.face_id, 0);
        assert!((f0.euler[0] - 10.0).abs() < 1e-6);
        assert_eq!(f1.face_id, 1);
        assert!((f1.euler[0] - 20.0).abs() < 1e-6);
    }
}
