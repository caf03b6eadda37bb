//! Byte-at-a-time MIDI stream framing.
//!
//! Real-time bytes are reported straight back from [`StreamDecoder::push`].
//! Every other byte lands in an internal buffer that [`StreamDecoder::next_message`]
//! drains one complete message at a time. Running status is kept for channel
//! voice messages and cancelled by system common and exclusive messages.

use crate::consts::{EXCLUSIVE_END, EXCLUSIVE_START, SYSTEM};
use crate::message::{message_len, MidiMessage, RealTimeMessage};
use tracing::{trace, warn};

/// Longest exclusive message kept; anything past it is dropped whole.
pub const MAX_SYSEX_LEN: usize = 4096;

/// Outcome of feeding one byte to the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Push {
    /// Byte was a real-time message; the buffer is untouched.
    RealTime(RealTimeMessage),
    /// Byte was appended to the buffer.
    Buffered,
    /// Data byte without a status to attach to.
    Ignored,
}

#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    running_status: Option<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> Push {
        if let Some(realtime) = RealTimeMessage::from_byte(byte) {
            return Push::RealTime(realtime);
        }

        let is_status = byte & 0x80 != 0;

        if self.in_exclusive() {
            if !is_status || byte == EXCLUSIVE_END {
                if self.buffer.len() >= MAX_SYSEX_LEN {
                    warn!(limit = MAX_SYSEX_LEN, "Exclusive message too long, dropped");
                    self.buffer.clear();
                    self.running_status = None;
                    return Push::Ignored;
                }
                self.buffer.push(byte);
                return Push::Buffered;
            }
            trace!(status = byte, len = self.buffer.len(), "Exclusive message aborted");
            self.buffer.clear();
        }

        if is_status {
            if !self.buffer.is_empty() {
                trace!(status = byte, stale = ?self.buffer, "Incomplete message dropped");
                self.buffer.clear();
            }
        } else if self.buffer.is_empty() {
            match self.running_status {
                Some(status) => self.buffer.push(status),
                None => return Push::Ignored,
            }
        }

        self.buffer.push(byte);
        Push::Buffered
    }

    /// Takes the next complete message off the buffer.
    pub fn next_message(&mut self) -> Option<MidiMessage> {
        let status = *self.buffer.first()?;

        if status == EXCLUSIVE_START {
            if self.buffer.len() < 2 || self.buffer.last() != Some(&EXCLUSIVE_END) {
                return None;
            }
            self.running_status = None;
            return Some(MidiMessage::SysEx(std::mem::take(&mut self.buffer)));
        }

        let Some(len) = message_len(status) else {
            self.buffer.clear();
            return None;
        };
        if self.buffer.len() < len {
            return None;
        }

        let message = MidiMessage::from_bytes(&self.buffer[..len]);
        self.buffer.drain(..len);

        self.running_status = if status < SYSTEM { Some(status) } else { None };
        match message {
            Ok(message) => Some(message),
            Err(e) => {
                trace!(status, error = %e, "Undecodable message dropped");
                None
            }
        }
    }

    #[inline]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Number of bytes waiting for the rest of their message.
    #[inline]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    fn in_exclusive(&self) -> bool {
        self.buffer.first() == Some(&EXCLUSIVE_START)
            && self.buffer.last() != Some(&EXCLUSIVE_END)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.running_status = None;
    }
}
