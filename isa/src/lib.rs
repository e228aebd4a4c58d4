//! A64/C64 instruction classification and emission.
//!
//! [`decoder`] turns instruction words into categories through a compiled
//! decode graph, [`emitter`] produces instruction words from abstract
//! operands, and [`immediates`] holds the immediate-field codecs both
//! sides share.

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::missing_panics_doc)]
pub mod decoder;

#[allow(clippy::missing_panics_doc)]
#[allow(clippy::similar_names)]
pub mod emitter;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod immediates;
