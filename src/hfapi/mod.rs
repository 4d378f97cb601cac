mod classifier;
mod retry;

pub use classifier::{Classifier, HfTransport, InferenceError, InferenceTransport, LabelScore};
pub use retry::RetryPolicy;
