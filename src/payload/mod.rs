pub mod classifier;
pub mod decoder;

pub use classifier::{classify, AlertLabel, Thresholds};
pub use decoder::{decode, DecodedReading};
