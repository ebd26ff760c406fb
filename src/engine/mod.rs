//! Timing and input primitives of a session: shuffling, countdowns and gesture classification.

pub mod countdown;
pub mod gesture;
pub mod shuffle;

pub use self::countdown::{CountdownCoordinator, CountdownHandle, CountdownTick};
pub use self::gesture::{GestureClassifier, GestureError, SensorError, SensorHost, Zone};
pub use self::shuffle::shuffle;
