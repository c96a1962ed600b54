mod model;
mod network;
mod sample;

pub use model::{GuardModel, Prediction, TrainingOptions, TrainingReport};
pub use network::{Network, Trainer};
pub use sample::{load_samples, parse_samples, validate_corpus, validate_labels, LabeledSample};
