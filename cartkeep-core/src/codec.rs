//! Binary record codec for carts.
//!
//! Records are Protocol Buffers messages (see the tags on [`Cart`]). The
//! encoding is field-tagged, so decoders skip fields they do not know and
//! records written by a later schema remain readable here.

use prost::Message;
use thiserror::Error;

use crate::Cart;

/// Failure to turn record bytes back into a [`Cart`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid cart record: {reason}")]
pub struct RecordError {
    pub reason: String,
}

impl From<prost::DecodeError> for RecordError {
    fn from(e: prost::DecodeError) -> Self {
        Self {
            reason: e.to_string(),
        }
    }
}

/// Encode a cart into its record bytes.
pub fn encode_cart(cart: &Cart) -> Vec<u8> {
    cart.encode_to_vec()
}

/// Decode record bytes into a cart.
///
/// An empty slice is a valid record: the empty cart with no owner.
pub fn decode_cart(bytes: &[u8]) -> Result<Cart, RecordError> {
    Ok(Cart::decode(bytes)?)
}

/// The record for `Cart::default()`.
pub fn empty_record() -> Vec<u8> {
    encode_cart(&Cart::default())
}
