//! `mimewalk`: a structural walker for MIME e-mail messages.
//!
//! Raw messages are turned into a [`Part`](model::Part) tree by
//! [`parser::mime`]; a [`MessageWalker`](walker::MessageWalker) then reports
//! the envelope and every part, classified and addressed, to a
//! [`Sink`](walker::Sink). TNEF containers and UU-encoded text are expanded
//! into ordinary parts on the way.

pub mod config;
pub mod error;
pub mod export;
pub mod legacy;
pub mod model;
pub mod parser;
pub mod walker;
