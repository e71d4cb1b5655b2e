//! Shared types for the voxgate speech gateway.
//!
//! Holds the language and voice catalog, the clone models, and request
//! intake: the raw form types the HTTP layer fills in and the validator that
//! turns them into a [`SynthesisRequest`]. Nothing in this crate performs
//! I/O.

pub mod request;
pub mod voice;

pub use request::{
    collapse_newlines, validate_clone, validate_clone_with, validate_simple, CloneFields,
    CloneForm, CloneTuning, ReferenceAudio, SimpleForm, SynthesisRequest, ValidationError,
    VoiceSelection, JSON_CLONE_FIELDS, MAX_REFERENCE_AUDIO_BYTES, MAX_SPEED, MIN_SPEED,
    MULTIPART_CLONE_FIELDS,
};
pub use voice::{find_voice, CloneModel, Gender, Language, PrebuiltVoice};
