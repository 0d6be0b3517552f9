//! Audio fingerprint source.
//!
//! A background listener repeatedly records a sample, identifies it and
//! stores the result. [`FingerprintSource`] hands the latest result to the
//! polling loop through the ordinary [`MusicSource`](crate::MusicSource)
//! pull contract.

mod acoustid;
mod listener;

pub use acoustid::{pcm_rms, AcoustIdRecognizer};
pub use listener::{FingerprintSource, ListenerHandle, ListenerStats};

use async_trait::async_trait;

use spindle_state::Track;

use crate::error::Result;

/// Identifies whatever is currently audible.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Whether the external tools and credentials this recognizer needs exist.
    fn is_available(&self) -> bool;

    /// Record and identify one sample. `Ok(None)` means silence or no match.
    async fn identify(&self) -> Result<Option<Track>>;
}
