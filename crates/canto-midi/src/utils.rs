//! MIDI value conversion helpers

/// Maps a 14-bit value centered at 8192 onto [-1.0, 1.0].
///
/// The negative half is divided by 8192 and the positive half by 8191 so
/// both extremes land exactly on -1.0 and 1.0.
#[inline]
pub fn centered_14bit(value: u16) -> f32 {
    let offset = value.min(0x3FFF) as f32 - 8192.0;
    if offset < 0.0 {
        offset / 8192.0
    } else {
        offset / 8191.0
    }
}

/// Maps a 7-bit value centered at 64 onto [-1.0, 1.0].
#[inline]
pub fn centered_7bit(value: u8) -> f32 {
    let offset = value.min(0x7F) as f32 - 64.0;
    if offset < 0.0 {
        offset / 64.0
    } else {
        offset / 63.0
    }
}

/// Joins a coarse/fine pair of 7-bit values into one 14-bit value.
#[inline]
pub fn combine_14bit(coarse: u8, fine: u8) -> u16 {
    (u16::from(coarse & 0x7F) << 7) | u16::from(fine & 0x7F)
}

#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    2.0_f32.powf(semitones / 12.0)
}

#[inline]
pub fn velocity_to_gain(velocity: u8) -> f32 {
    velocity as f32 / 127.0
}
