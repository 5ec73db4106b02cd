//! Bundled providers.
//!
//! | Provider | Operation | Behaviour |
//! |----------|-----------|-----------|
//! | [`ScriptedProvider`] | any | Plays a [`Script`] and records calls into a [`CallLog`] |
//! | [`LastKnownProvider`] | location | Answers from the last-known store |
//! | [`GazetteerGeocoder`] | geocoding | Offline place-name search |
//! | [`GazetteerReverseGeocoder`] | reverse geocoding | Offline nearest-place lookup |

mod gazetteer;
mod last_known;
mod scripted;

pub use gazetteer::{
    Gazetteer, GazetteerGeocoder, GazetteerReverseGeocoder, Place, DEFAULT_REVERSE_RADIUS_M,
};
pub use last_known::{LastKnownFactory, LastKnownProvider};
pub use scripted::{Call, CallLog, CallRecord, Script, ScriptedFactory, ScriptedProvider};
