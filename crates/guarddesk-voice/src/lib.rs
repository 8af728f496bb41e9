//! Voice sessions for the receptionist and the dashboard manager.
//!
//! [`VoiceSession`] is the turn state machine. [`orb`] and [`subtitles`]
//! turn its live state into something to draw.

pub mod orb;
pub mod session;
pub mod snapshot;
pub mod subtitles;

pub use orb::{OrbAnimation, OrbFrame, OrbSampler};
pub use session::{Collaborators, VoiceSession};
pub use snapshot::SessionSnapshot;
pub use subtitles::WordTimeline;
