//! Tracking intake
//!
//! Consumes the OpenSeeFace native binary UDP protocol and keeps the most
//! recent sample per tracked subject id for the applier to pull from.

pub mod osf;
pub mod store;

pub use osf::{parse_sample, OsfReceiver, TrackingSample, FRAME_SIZE};
pub use store::TrackingStore;
