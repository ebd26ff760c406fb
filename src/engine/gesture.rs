//! Head-tilt gesture classification on top of three proximity volumes.
//!
//! A `front` volume follows the head while `top` and `bottom` volumes hang off
//! the neck. Tilting the head makes `front` overlap one of the zone volumes;
//! each overlap is classified as a [`Zone`] and debounced on its leading edge.

use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Name of the volume attached to the head.
pub const FRONT_VOLUME: &str = "front";
/// Name of the volume above the neck.
pub const TOP_VOLUME: &str = "top";
/// Name of the volume below the neck.
pub const BOTTOM_VOLUME: &str = "bottom";

/// Answer zone reached by a head tilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// Head tilted up: the player passes.
    Top,
    /// Head tilted down: the player got it right.
    Bottom,
}

impl Zone {
    /// Whether this zone counts as a correct answer.
    pub fn is_correct(self) -> bool {
        matches!(self, Zone::Bottom)
    }

    /// Lowercase label, matching the volume name.
    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Top => TOP_VOLUME,
            Zone::Bottom => BOTTOM_VOLUME,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain 3D vector, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Vec3 {
    /// Lateral axis.
    pub x: f32,
    /// Vertical axis.
    pub y: f32,
    /// Depth axis.
    pub z: f32,
}

impl Vec3 {
    /// Build a vector from its components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Tracked body part a volume can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BodyAnchor {
    /// Follows head rotation.
    Head,
    /// Stays level while the head tilts.
    Neck,
}

/// Box-shaped proximity volume placed relative to a body anchor.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct VolumeSpec {
    /// Name reported to the other volume's overlap callback.
    pub name: String,
    /// Box dimensions.
    pub size: Vec3,
    /// Offset from the anchor.
    pub offset: Vec3,
    /// Body part the volume follows.
    pub anchor: BodyAnchor,
}

impl VolumeSpec {
    fn new(name: &str, size: Vec3, offset: Vec3, anchor: BodyAnchor) -> Self {
        Self {
            name: name.to_owned(),
            size,
            offset,
            anchor,
        }
    }

    /// Head-mounted volume probing the zones.
    pub fn front() -> Self {
        Self::new(
            FRONT_VOLUME,
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(0.0, 0.0, 1.25),
            BodyAnchor::Head,
        )
    }

    /// Volume of the given answer zone.
    pub fn zone(zone: Zone) -> Self {
        let y = match zone {
            Zone::Top => 1.0,
            Zone::Bottom => -1.0,
        };
        Self::new(
            zone.as_str(),
            Vec3::new(1.5, 0.5, 0.5),
            Vec3::new(0.0, y, 1.0),
            BodyAnchor::Neck,
        )
    }
}

/// Handle of a volume living in a [`SensorHost`].
pub type VolumeId = Uuid;

/// Callback fired with the name of the volume that entered the watched one.
pub type OverlapCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Failure reported by a sensor host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The device backing the host went away.
    #[error("sensor host disconnected")]
    Disconnected,
    /// The volume handle is not known to the host.
    #[error("unknown volume {0}")]
    UnknownVolume(VolumeId),
    /// The host refused the request.
    #[error("sensor host rejected the request: {0}")]
    Rejected(String),
}

/// Primitives offered by whatever tracks the player's body.
///
/// Teardown operations are infallible: a host that lost the volume has nothing
/// left to release.
pub trait SensorHost: Send + Sync {
    /// Create a volume and return its handle.
    fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeId, SensorError>;
    /// Attach a volume to a tracked body part.
    fn attach(&self, volume: VolumeId, anchor: BodyAnchor) -> Result<(), SensorError>;
    /// Detach a volume from its body part.
    fn detach(&self, volume: VolumeId);
    /// Register the overlap callback of a volume, replacing any previous one.
    fn on_overlap(&self, volume: VolumeId, callback: OverlapCallback) -> Result<(), SensorError>;
    /// Destroy a volume and drop its callback.
    fn destroy(&self, volume: VolumeId);
}

/// Errors surfaced by [`GestureClassifier::start_detection`].
#[derive(Debug, Error)]
pub enum GestureError {
    /// A sensor could not be armed. Already armed sensors were torn down.
    #[error("failed to arm the `{sensor}` sensor")]
    Construction {
        /// Name of the volume that failed.
        sensor: String,
        /// Host error.
        #[source]
        source: SensorError,
    },
}

/// Leading-edge debounce: the first signal fires, later ones within `window` are dropped.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_fire: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given cooldown.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fire: None,
        }
    }

    /// Register a signal at `now`; returns `true` when it should fire.
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_fire
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }

        self.last_fire = Some(now);
        true
    }

    /// Whether a signal at `now` falls in the cooldown window.
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.last_fire
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
    }
}

struct Arming {
    active: AtomicBool,
    debouncer: Mutex<Debouncer>,
}

struct ArmedVolume {
    id: VolumeId,
    name: String,
}

/// Turns raw overlaps between the head and zone volumes into debounced [`Zone`] events.
pub struct GestureClassifier {
    host: Arc<dyn SensorHost>,
    debounce: Duration,
    arming: Option<Arc<Arming>>,
    volumes: Vec<ArmedVolume>,
}

impl GestureClassifier {
    /// Build a disarmed classifier on top of `host`.
    pub fn new(host: Arc<dyn SensorHost>, debounce: Duration) -> Self {
        Self {
            host,
            debounce,
            arming: None,
            volumes: Vec::new(),
        }
    }

    /// Arm the three volumes and start reporting zones to `callback`.
    ///
    /// Re-arming tears the previous volumes down first. When any step fails the
    /// volumes created so far are destroyed before the error is returned.
    pub fn start_detection<F>(&mut self, callback: F) -> Result<(), GestureError>
    where
        F: Fn(Zone) + Send + Sync + 'static,
    {
        self.stop_detection();

        let arming = Arc::new(Arming {
            active: AtomicBool::new(false),
            debouncer: Mutex::new(Debouncer::new(self.debounce)),
        });
        let callback: Arc<dyn Fn(Zone) + Send + Sync> = Arc::new(callback);

        let mut volumes = Vec::with_capacity(3);
        let result = self
            .arm(&mut volumes, VolumeSpec::front(), None)
            .and_then(|_| {
                self.arm(
                    &mut volumes,
                    VolumeSpec::zone(Zone::Top),
                    Some(zone_callback(Zone::Top, &arming, &callback)),
                )
            })
            .and_then(|_| {
                self.arm(
                    &mut volumes,
                    VolumeSpec::zone(Zone::Bottom),
                    Some(zone_callback(Zone::Bottom, &arming, &callback)),
                )
            });

        if let Err(err) = result {
            warn!(error = %err, "gesture sensors failed to arm; rolling back");
            release(self.host.as_ref(), volumes);
            return Err(err);
        }

        arming.active.store(true, Ordering::SeqCst);
        self.arming = Some(arming);
        self.volumes = volumes;
        info!("gesture detection armed");
        Ok(())
    }

    /// Tear down every volume. Calling it while disarmed does nothing.
    pub fn stop_detection(&mut self) {
        let Some(arming) = self.arming.take() else {
            return;
        };

        arming.active.store(false, Ordering::SeqCst);
        release(self.host.as_ref(), std::mem::take(&mut self.volumes));
        info!("gesture detection disarmed");
    }

    /// Whether the volumes are armed.
    pub fn is_detecting(&self) -> bool {
        self.arming
            .as_ref()
            .is_some_and(|arming| arming.active.load(Ordering::SeqCst))
    }

    /// Whether a zone signal right now would be suppressed by the debounce.
    pub fn is_debounced(&self) -> bool {
        self.arming.as_ref().is_some_and(|arming| {
            arming
                .debouncer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_cooling_down(Instant::now())
        })
    }

    fn arm(
        &self,
        volumes: &mut Vec<ArmedVolume>,
        spec: VolumeSpec,
        callback: Option<OverlapCallback>,
    ) -> Result<(), GestureError> {
        let construction = |source| GestureError::Construction {
            sensor: spec.name.clone(),
            source,
        };

        let id = self.host.create_volume(&spec).map_err(construction)?;
        volumes.push(ArmedVolume {
            id,
            name: spec.name.clone(),
        });
        self.host.attach(id, spec.anchor).map_err(construction)?;
        if let Some(callback) = callback {
            self.host.on_overlap(id, callback).map_err(construction)?;
        }
        debug!(volume = %spec.name, %id, "gesture volume armed");
        Ok(())
    }
}

impl Drop for GestureClassifier {
    fn drop(&mut self) {
        self.stop_detection();
    }
}

fn zone_callback(
    zone: Zone,
    arming: &Arc<Arming>,
    callback: &Arc<dyn Fn(Zone) + Send + Sync>,
) -> OverlapCallback {
    let arming = Arc::clone(arming);
    let callback = Arc::clone(callback);
    Arc::new(move |other: &str| {
        if other != FRONT_VOLUME {
            return;
        }
        if !arming.active.load(Ordering::SeqCst) {
            trace!(%zone, "overlap after teardown ignored");
            return;
        }

        let accepted = arming
            .debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accept(Instant::now());
        if !accepted {
            debug!(%zone, "classification suppressed by debounce");
            return;
        }

        debug!(%zone, "classification accepted");
        callback(zone);
    })
}

fn release(host: &dyn SensorHost, volumes: Vec<ArmedVolume>) {
    for volume in volumes.into_iter().rev() {
        host.detach(volume.id);
        host.destroy(volume.id);
        trace!(volume = %volume.name, id = %volume.id, "gesture volume released");
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::time::advance;

    use super::{testing::FakeSensorHost, *};

    const WINDOW: Duration = Duration::from_secs(1);

    fn classifier(host: &Arc<FakeSensorHost>) -> GestureClassifier {
        GestureClassifier::new(host.clone(), WINDOW)
    }

    fn recorder() -> (Arc<Mutex<Vec<Zone>>>, impl Fn(Zone) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |zone| sink.lock().unwrap().push(zone))
    }

    #[test]
    fn debouncer_fires_on_leading_edge() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_millis(10)));
        assert!(!debouncer.accept(start + Duration::from_millis(999)));
        assert!(debouncer.accept(start + WINDOW));
    }

    #[test]
    fn detection_state_follows_arming() {
        let host = Arc::new(FakeSensorHost::new());
        let mut classifier = classifier(&host);
        assert!(!classifier.is_detecting());

        classifier.start_detection(|_| {}).unwrap();
        assert!(classifier.is_detecting());
        assert_eq!(host.live_volumes(), 3);
        assert_eq!(host.attached_volumes(), 3);

        classifier.stop_detection();
        assert!(!classifier.is_detecting());
        assert_eq!(host.live_volumes(), 0);

        classifier.stop_detection();
        assert!(!classifier.is_detecting());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_window_fires_once() {
        let host = Arc::new(FakeSensorHost::new());
        let mut classifier = classifier(&host);
        let (seen, callback) = recorder();
        classifier.start_detection(callback).unwrap();

        for _ in 0..5 {
            host.tilt(Zone::Bottom);
            advance(Duration::from_millis(100)).await;
        }
        host.tilt(Zone::Top);

        assert_eq!(*seen.lock().unwrap(), vec![Zone::Bottom]);
        assert!(classifier.is_debounced());
    }

    #[tokio::test(start_paused = true)]
    async fn signals_beyond_window_fire_independently() {
        let host = Arc::new(FakeSensorHost::new());
        let mut classifier = classifier(&host);
        let (seen, callback) = recorder();
        classifier.start_detection(callback).unwrap();

        host.tilt(Zone::Bottom);
        advance(WINDOW + Duration::from_millis(1)).await;
        host.tilt(Zone::Top);
        advance(WINDOW + Duration::from_millis(1)).await;
        host.tilt(Zone::Bottom);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Zone::Bottom, Zone::Top, Zone::Bottom]
        );
    }

    #[test]
    fn only_front_overlaps_classify() {
        let host = Arc::new(FakeSensorHost::new());
        let mut classifier = classifier(&host);
        let (seen, callback) = recorder();
        classifier.start_detection(callback).unwrap();

        host.touch(TOP_VOLUME, BOTTOM_VOLUME);
        host.touch(FRONT_VOLUME, TOP_VOLUME);

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn partial_arming_failure_rolls_back() {
        for nth in 0..3 {
            let host = Arc::new(FakeSensorHost::failing_on_create(nth));
            let mut classifier = classifier(&host);

            let err = classifier.start_detection(|_| {}).unwrap_err();

            let GestureError::Construction { sensor, .. } = err;
            assert_eq!(sensor, [FRONT_VOLUME, TOP_VOLUME, BOTTOM_VOLUME][nth]);
            assert_eq!(host.live_volumes(), 0);
            assert!(!classifier.is_detecting());
        }
    }

    #[test]
    fn stale_callbacks_are_absorbed() {
        let host = Arc::new(FakeSensorHost::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let mut classifier = classifier(&host);
        classifier
            .start_detection(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // A host racing the teardown may still hold a callback it cloned earlier.
        let raced = host.callbacks_of(BOTTOM_VOLUME);
        assert_eq!(raced.len(), 1);

        classifier.stop_detection();
        assert!(!host.tilt(Zone::Bottom));
        raced[0](FRONT_VOLUME);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_the_classifier_releases_volumes() {
        let host = Arc::new(FakeSensorHost::new());
        {
            let mut classifier = classifier(&host);
            classifier.start_detection(|_| {}).unwrap();
            assert_eq!(host.live_volumes(), 3);
        }
        assert_eq!(host.live_volumes(), 0);
    }
}
