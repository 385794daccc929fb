//! Latest-sample store, keyed by subject id.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::osf::TrackingSample;

/// Holds the most recent [`TrackingSample`] for each tracked subject.
///
/// The UDP receiver overwrites entries as packets arrive; consumers read the
/// latest sample for their configured subject id and decide for themselves
/// whether it is fresh (samples carry the tracker's timestamp).
#[derive(Debug, Default)]
pub struct TrackingStore {
    latest: RwLock<HashMap<i32, TrackingSample>>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample as the latest for its subject id.
    pub async fn publish(&self, sample: TrackingSample) {
        let mut latest = self.latest.write().await;
        latest.insert(sample.face_id, sample);
    }

    /// The most recent sample for `face_id`, if any has been received.
    pub async fn latest(&self, face_id: i32) -> Option<TrackingSample> {
        self.latest.read().await.get(&face_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(face_id: i32, time: f64) -> TrackingSample {
        TrackingSample {
            time,
            face_id,
            right_eye_open: 1.0,
            left_eye_open: 1.0,
            got_3d_points: true,
            fit_error: 0.0,
            quaternion: [0.0, 0.0, 0.0, 1.0],
            euler: [0.0, 0.0, 0.0],
            mouth_open: 0.0,
            mouth_wide: 0.0,
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = TrackingStore::new();
        assert!(store.latest(0).await.is_none());
    }

    #[tokio::test]
    async fn test_latest_wins_per_subject() {
        let store = TrackingStore::new();
        store.publish(sample(0, 1.0)).await;
        store.publish(sample(0, 2.0)).await;
        store.publish(sample(1, 5.0)).await;

        let s0 = store.latest(0).await.unwrap();
        assert_eq!(s0.time, 2.0);

        let s1 = store.latest(1).await.unwrap();
        assert_eq!(s1.time, 5.0);

        assert!(store.latest(2).await.is_none());
    }
}
