//! Domain types and pure computation for pqwatch: signals, wavelet
//! decomposition, feature extraction, classification events and config.

pub mod config;
mod error;
pub mod event;
pub mod features;
pub mod signal;
pub mod wavelet;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{ClassificationEvent, StoredEvent};
pub use features::{BandStats, FeatureError, FeatureExtractor, FeatureVector, WaveletConfig, extract};
pub use signal::{Signal, SignalError};
pub use wavelet::Wavelet;
