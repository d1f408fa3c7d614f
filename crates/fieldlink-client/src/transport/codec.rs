//! Decode-once codec for the read path.
//!
//! - Text frames => Envelope
//! - Ping/Pong/Binary are surfaced as control traffic and ignored upstream
//! - Close is surfaced so the state machine can treat it as a remote close

use fieldlink_core::error::Result;
use fieldlink_core::protocol::text;
use fieldlink_core::Envelope;

use crate::transport::Frame;

#[derive(Debug)]
pub enum Inbound {
    Envelope { env: Envelope, bytes_len: usize },
    Control,
    Close,
}

pub fn decode(frame: Frame) -> Result<Inbound> {
    match frame {
        Frame::Text(s) => {
            let bytes_len = s.len();
            let env = text::decode_text(&s)?;
            Ok(Inbound::Envelope { env, bytes_len })
        }
        Frame::Binary(_) | Frame::Ping(_) | Frame::Pong(_) => Ok(Inbound::Control),
        Frame::Close => Ok(Inbound::Close),
    }
}
