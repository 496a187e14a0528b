//! Core Data Model
//!
//! Coordinate frame, modal state and operator messages shared by the
//! interpreter, pipeline and motion queue.

pub mod diagnostics;
pub mod frame;
pub mod modal;

pub use diagnostics::{Message, Severity};
pub use frame::{
    CartesianMode, Compensation, CoordinateFrame, CoordinateSystem, CycleTarget, DistanceMode,
    INCH_TO_MM, LengthCompMode, Mirror, Plane, Point3, RadiusCompMode, Rotation, Scaling, Units,
    WORK_SYSTEMS,
};
pub use modal::{CycleKind, FeedMode, ModalState, MotionMode, PathMode, Registers, RetractMode};
