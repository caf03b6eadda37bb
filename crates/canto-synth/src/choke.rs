//! Exclusive-group (choke) tables for the named drum kits.
//!
//! Each entry maps a key to the keys it silences on the same channel.

type ChokeTable = &'static [(u8, &'static [u8])];

static STANDARD: ChokeTable = &[
    (42, &[46]),     // closed hi-hat
    (44, &[46]),     // pedal hi-hat
    (46, &[42, 44]), // open hi-hat
    (71, &[72]),     // short whistle
    (72, &[71]),     // long whistle
    (73, &[74]),     // short guiro
    (74, &[73]),     // long guiro
    (78, &[79]),     // mute cuica
    (79, &[78]),     // open cuica
    (80, &[81]),     // mute triangle
    (81, &[80]),     // open triangle
];

static TR808: ChokeTable = &[
    (42, &[46]),
    (44, &[46]),
    (46, &[42, 44]),
    (62, &[63]), // mute high conga
    (63, &[62]), // open high conga
    (67, &[68]), // high agogo
    (68, &[67]), // low agogo
    (71, &[72]),
    (72, &[71]),
    (73, &[74]),
    (74, &[73]),
    (78, &[79]),
    (79, &[78]),
    (80, &[81]),
    (81, &[80]),
];

static ORCHESTRA: ChokeTable = &[
    (27, &[29]),     // closed hi-hat
    (28, &[29]),     // pedal hi-hat
    (29, &[27, 28]), // open hi-hat
];

fn table(program: u8) -> ChokeTable {
    match program {
        // Standard, Room, Power, Electronic, Jazz, Brush
        0 | 8 | 16 | 24 | 32 | 40 => STANDARD,
        25 => TR808,
        48 => ORCHESTRA,
        _ => &[],
    }
}

/// Keys silenced when `key` is struck on drum kit `program`.
pub fn choked_keys(program: u8, key: u8) -> &'static [u8] {
    table(program)
        .iter()
        .find(|(k, _)| *k == key)
        .map(|&(_, stops)| stops)
        .unwrap_or(&[])
}
