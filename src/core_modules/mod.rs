// Layered from raw bytes up to the session ledger. Each layer only knows the ones
// listed before it.
pub mod pixel;
pub mod frame;
pub mod region_differencer;
pub mod threshold;
pub mod calibrator;
pub mod crossing_detector;
pub mod lap_timer;
pub mod rotation;
pub mod ledger;
