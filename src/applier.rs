//! Tracking-to-avatar applier.
//!
//! Each tick, takes the most recent [`TrackingSample`] for the configured
//! subject and writes derived values into the rig: per-eye blink and mouth
//! expression weights, and a smoothed head-bone rotation composed with the
//! rest pose captured at initialization.
//!
//! A frame is only processed when all preconditions hold — a rig is assigned
//! and initialized, the sample is strictly newer than the last processed one,
//! and its fit error is within bounds. A skipped frame has no side effects at
//! all.

use glam::{EulerRot, Quat};

use crate::avatar::AvatarRig;
use crate::config::{ApplierConfig, RotationMode};
use crate::tracking::TrackingSample;

/// Expression preset keys driven by the applier (VRM 1.0 names).
const BLINK_LEFT: &str = "blinkLeft";
const BLINK_RIGHT: &str = "blinkRight";
const MOUTH_OPEN: &str = "aa";
const MOUTH_WIDE: &str = "ih";

/// Humanoid bone receiving head rotation.
const HEAD_BONE: &str = "head";

/// Initialization state for the current rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// No rig has been assigned yet
    Uninitialized,
    /// A rig was assigned; rest pose not yet captured
    Initializing,
    /// Rest pose captured, frames are processed
    Ready,
    /// Rig has no humanoid bone map; all frames are skipped
    Inert,
}

/// Maps tracking samples onto a rig.
///
/// All mutable state lives here: the last processed timestamp, the smoothed
/// head orientation, and the captured rest pose. Assigning a new rig resets
/// all of it via [`TrackingApplier::avatar_assigned`].
pub struct TrackingApplier {
    config: ApplierConfig,
    readiness: Readiness,
    /// Timestamp of the last processed sample; only strictly newer samples
    /// are consumed
    last_time: f64,
    /// Smoothed head orientation delta, before rest-pose composition
    current: Quat,
    /// Head bone local rotation captured when the rig was initialized
    initial_head: Quat,
    /// False when the rig has no head bone (blink/mouth still apply)
    head_available: bool,
}

impl TrackingApplier {
    pub fn new(config: ApplierConfig) -> Self {
        Self {
            config,
            readiness: Readiness::Uninitialized,
            last_time: f64::NEG_INFINITY,
            current: Quat::IDENTITY,
            initial_head: Quat::IDENTITY,
            head_available: false,
        }
    }

    /// Subject id this applier consumes.
    pub fn face_id(&self) -> i32 {
        self.config.face_id
    }

    /// Notify the applier that a (new) rig has been assigned.
    ///
    /// Re-enters initialization: the next [`apply`](Self::apply) call
    /// captures the new rig's rest pose and clears its expression weights.
    /// Smoothing state and the last-processed timestamp are reset so state
    /// from a previous avatar can never leak into the new one.
    pub fn avatar_assigned(&mut self) {
        self.readiness = Readiness::Initializing;
        self.last_time = f64::NEG_INFINITY;
        self.current = Quat::IDENTITY;
        self.initial_head = Quat::IDENTITY;
        self.head_available = false;
    }

    /// Whether the applier is initialized and processing frames.
    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    /// Smoothed head orientation delta (identity until a frame with head
    /// tracking has been processed).
    pub fn current_orientation(&self) -> Quat {
        self.current
    }

    /// Process one tick against the assigned rig.
    pub fn apply(&mut self, rig: &mut AvatarRig, sample: Option<&TrackingSample>) {
        match self.readiness {
            Readiness::Uninitialized | Readiness::Inert => return,
            Readiness::Initializing => self.initialize(rig),
            Readiness::Ready => {}
        }
        if self.readiness != Readiness::Ready {
            return;
        }

        let sample = match sample {
            Some(s) => s,
            None => return,
        };

        // Monotonic consumption: never reprocess or reorder
        if sample.time <= self.last_time {
            return;
        }
        if sample.fit_error > self.config.max_fit_error {
            return;
        }

        self.apply_eyes(rig, sample);
        self.apply_mouth(rig, sample);
        if self.config.head_tracking && self.head_available {
            self.apply_head(rig, sample);
        }

        self.last_time = sample.time;
    }

    /// Capture the rig's rest pose and clear its expression weights.
    fn initialize(&mut self, rig: &mut AvatarRig) {
        if !rig.has_humanoid() {
            tracing::warn!("Avatar has no humanoid bone map, tracking stays inert");
            self.readiness = Readiness::Inert;
            return;
        }

        match rig.bone_local_rotation(HEAD_BONE) {
            Some(rest) => {
                self.initial_head = rest;
                self.head_available = true;
            }
            None => {
                tracing::warn!("Avatar has no head bone, head tracking disabled");
                self.head_available = false;
            }
        }

        rig.reset_expressions();
        self.readiness = Readiness::Ready;
        tracing::info!("Tracking applier initialized (head: {})", self.head_available);
    }

    fn apply_eyes(&self, rig: &mut AvatarRig, sample: &TrackingSample) {
        // Threshold ≤ 0 is rejected at config validation; clamp the divisor
        // anyway so a zero can never reach the division
        let threshold = self.config.eye_open_threshold.max(f32::EPSILON);

        let blink_left = 1.0 - clamp01(sample.left_eye_open / threshold);
        let blink_right = 1.0 - clamp01(sample.right_eye_open / threshold);
        rig.set_expression(BLINK_LEFT, blink_left);
        rig.set_expression(BLINK_RIGHT, blink_right);
    }

    fn apply_mouth(&self, rig: &mut AvatarRig, sample: &TrackingSample) {
        let open = clamp01(sample.mouth_open * self.config.mouth_open_multiplier);
        let wide = clamp01(sample.mouth_wide * self.config.mouth_wide_multiplier);
        rig.set_expression(MOUTH_OPEN, open);
        rig.set_expression(MOUTH_WIDE, wide);
    }

    fn apply_head(&mut self, rig: &mut AvatarRig, sample: &TrackingSample) {
        let target = self.target_orientation(sample);

        // smoothing 0.0 snaps to the target in one step, 1.0 freezes
        self.current = self.current.slerp(target, 1.0 - self.config.smoothing);

        // Compose with the captured rest pose rather than replacing it
        rig.set_bone_local_rotation(HEAD_BONE, self.initial_head * self.current);
    }

    /// Convert a sample into the target head orientation for the configured
    /// mode. Each variant spells out its full transform; `Raw` deliberately
    /// never sees the multiplier, offset or inverse settings.
    pub(crate) fn target_orientation(&self, sample: &TrackingSample) -> Quat {
        let multiplier = self.config.rotation_multiplier;
        let offset = self.config.rotation_offset;

        match self.config.rotation_mode {
            RotationMode::Simple => {
                let [ex, ey, ez] = sample.euler;
                let target = euler_deg(
                    -ex * multiplier + offset[0],
                    ey * multiplier + offset[1],
                    -ez * multiplier + offset[2],
                );
                if self.config.apply_inverse {
                    target.inverse()
                } else {
                    target
                }
            }
            RotationMode::Opencv => {
                let [ex, ey, ez] = sample.euler;
                let target = euler_deg(
                    ex * multiplier + offset[0],
                    -ey * multiplier + offset[1],
                    ez * multiplier + offset[2],
                );
                if self.config.apply_inverse {
                    target.inverse()
                } else {
                    target
                }
            }
            RotationMode::Raw => {
                let [x, y, z, w] = sample.quaternion;
                Quat::from_xyzw(-x, y, -z, w)
            }
        }
    }
}

/// Yaw-pitch-roll composition from degrees.
fn euler_deg(x: f32, y: f32, z: f32) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        y.to_radians(),
        x.to_radians(),
        z.to_radians(),
    )
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}
