//! Manual-control link codec.
//!
//! One ASCII letter per command, no framing and no acknowledgement:
//!
//! | Byte | Command |
//! |------|---------|
//! | `f`  | forward |
//! | `b`  | backward |
//! | `l`  | left |
//! | `r`  | right |
//! | `s`  | stop |
//!
//! Case is ignored on receive. Anything else is not a command.

use crate::types::DriveCommand;

/// Decode a received byte.
#[inline]
#[must_use]
pub fn decode_command(byte: u8) -> Option<DriveCommand> {
    match byte.to_ascii_lowercase() {
        b'f' => Some(DriveCommand::Forward),
        b'b' => Some(DriveCommand::Backward),
        b'l' => Some(DriveCommand::Left),
        b'r' => Some(DriveCommand::Right),
        b's' => Some(DriveCommand::Stop),
        _ => None,
    }
}
