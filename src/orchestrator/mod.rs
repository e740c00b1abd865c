//! Async control loop bridging the UI thread and the backend API.
//!
//! Presentation layers are sync; the controller owns every await point.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
