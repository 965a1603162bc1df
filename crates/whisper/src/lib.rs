//! Ephemeral whisper relay core.
//!
//! A sender addresses a short private message to a handle; the relay keeps it
//! in memory for a fixed TTL and reveals it only to the sender and the bound
//! recipient, subject to a per-reader cooldown. Everything platform specific
//! (user directory, message delivery) sits behind the traits in [`directory`]
//! and [`transport`].

pub mod access;
pub mod cards;
pub mod cooldown;
pub mod directory;
pub mod error;
pub mod limits;
pub mod parser;
pub mod presenter;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;

pub use {
    access::AccessDecision,
    cooldown::{Admission, CooldownGate},
    directory::{Directory, Identity, Lookup, Profile},
    error::{CreateError, Error, Result, RevealError},
    limits::RelayLimits,
    parser::{AddressQuery, Addressed},
    presenter::Reveal,
    service::{AddressRequest, RevealRequest, WhisperRelay},
    store::WhisperStore,
    transport::{DeliveryTarget, Notice, RevealTransport, Suggestion, SuggestionBatch},
    types::{UserId, Whisper, WhisperId},
};
