pub mod config;
pub mod dataset;
pub mod extractor;
pub mod learn;
pub mod loader;
pub mod partition;
pub mod pipeline;
pub mod predict;
pub mod select;
pub mod vocabulary;

/// MIDI file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mid", "midi"];

/// Length of the track id suffix carried by each corpus leaf directory
/// (Million Song Dataset ids, e.g. `TRAAAGR128F425B14B`).
pub const TRACK_ID_LEN: usize = 18;

/// Application name for XDG paths
pub const APP_NAME: &str = "genrescope";
