pub mod features;
pub mod label;
pub mod normalize;
pub mod variant;

pub use features::{flatten, FeatureVector};
pub use label::GuardLabel;
pub use normalize::{anchor_point, depth_scale, NormalizedPoseFrame, Normalizer};
pub use variant::Variant;
