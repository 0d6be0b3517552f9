//! Startup source selection.

use spindle_state::SourceKind;

use crate::config::SourcesConfig;

/// Pick the active source from configuration.
///
/// Priority: streaming API credentials, then scrobble API credentials, then
/// the fingerprint listener when enabled, keyed and `fingerprint_available`,
/// then the demo playlist. Always returns exactly one source.
pub fn select(config: &SourcesConfig, fingerprint_available: bool) -> SourceKind {
    if config.spotify.has_credentials() {
        SourceKind::Spotify
    } else if config.lastfm.is_configured() {
        SourceKind::LastFm
    } else if config.fingerprint.enabled
        && config.fingerprint.has_credentials()
        && fingerprint_available
    {
        SourceKind::Fingerprint
    } else {
        SourceKind::Demo
    }
}
