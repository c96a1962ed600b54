pub mod keypoint;
pub mod schema;

pub use keypoint::{Keypoint, KeypointIndex, Pose};
pub use schema::{DepthReference, Joint, NamedPoseFrame, SchemaAdapter};
