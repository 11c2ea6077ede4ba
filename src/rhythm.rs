//! Rhythm style catalog and pattern generation.
//!
//! Every named style maps to one fixed drum grid. Free text picks the first
//! style whose name it contains; anything else gets a weighted random grid.

use crate::pattern::StepPattern;
use crate::percussion::TRACK_COUNT;
use crate::transport::STEPS;

const KICK: usize = 0;
const SNARE: usize = 1;
const HAT: usize = 2;
const OPEN_HAT: usize = 3;
const CRASH: usize = 4;
const PERC1: usize = 5;
const PERC2: usize = 6;
const CLAP: usize = 7;

const EVEN: &[usize] = &[0, 2, 4, 6, 8, 10, 12, 14];
const ALL: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Hit probability per cell for random generation, by track.
pub const RANDOM_WEIGHTS: [f64; TRACK_COUNT] = [0.4, 0.3, 0.6, 0.2, 0.2, 0.2, 0.2, 0.2];

/// Description keywords in matching order. `electronic` asks for a random
/// groove, so it shadows any style named after it.
const MATCH_ORDER: [(&str, Option<RhythmStyle>); 20] = [
    ("rock", Some(RhythmStyle::Rock)),
    ("funk", Some(RhythmStyle::Funk)),
    ("latin", Some(RhythmStyle::Latin)),
    ("jazz", Some(RhythmStyle::Jazz)),
    ("reggae", Some(RhythmStyle::Reggae)),
    ("electronic", None),
    ("ballad", Some(RhythmStyle::Ballad)),
    ("shuffle", Some(RhythmStyle::Shuffle)),
    ("hiphop", Some(RhythmStyle::HipHop)),
    ("trap", Some(RhythmStyle::Trap)),
    ("house", Some(RhythmStyle::House)),
    ("techno", Some(RhythmStyle::Techno)),
    ("dubstep", Some(RhythmStyle::Dubstep)),
    ("dnb", Some(RhythmStyle::Dnb)),
    ("afrobeat", Some(RhythmStyle::Afrobeat)),
    ("bossa", Some(RhythmStyle::Bossa)),
    ("blues", Some(RhythmStyle::Blues)),
    ("metal", Some(RhythmStyle::Metal)),
    ("ambient", Some(RhythmStyle::Ambient)),
    ("breakbeat", Some(RhythmStyle::Breakbeat)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhythmStyle {
    Rock,
    Funk,
    Latin,
    Jazz,
    Reggae,
    Ballad,
    Shuffle,
    HipHop,
    Trap,
    House,
    Techno,
    Dubstep,
    Dnb,
    Afrobeat,
    Bossa,
    Blues,
    Metal,
    Ambient,
    Breakbeat,
}

impl RhythmStyle {
    /// Catalog in matching order.
    pub const ALL: [RhythmStyle; 19] = [
        RhythmStyle::Rock,
        RhythmStyle::Funk,
        RhythmStyle::Latin,
        RhythmStyle::Jazz,
        RhythmStyle::Reggae,
        RhythmStyle::Ballad,
        RhythmStyle::Shuffle,
        RhythmStyle::HipHop,
        RhythmStyle::Trap,
        RhythmStyle::House,
        RhythmStyle::Techno,
        RhythmStyle::Dubstep,
        RhythmStyle::Dnb,
        RhythmStyle::Afrobeat,
        RhythmStyle::Bossa,
        RhythmStyle::Blues,
        RhythmStyle::Metal,
        RhythmStyle::Ambient,
        RhythmStyle::Breakbeat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RhythmStyle::Rock => "rock",
            RhythmStyle::Funk => "funk",
            RhythmStyle::Latin => "latin",
            RhythmStyle::Jazz => "jazz",
            RhythmStyle::Reggae => "reggae",
            RhythmStyle::Ballad => "ballad",
            RhythmStyle::Shuffle => "shuffle",
            RhythmStyle::HipHop => "hiphop",
            RhythmStyle::Trap => "trap",
            RhythmStyle::House => "house",
            RhythmStyle::Techno => "techno",
            RhythmStyle::Dubstep => "dubstep",
            RhythmStyle::Dnb => "dnb",
            RhythmStyle::Afrobeat => "afrobeat",
            RhythmStyle::Bossa => "bossa",
            RhythmStyle::Blues => "blues",
            RhythmStyle::Metal => "metal",
            RhythmStyle::Ambient => "ambient",
            RhythmStyle::Breakbeat => "breakbeat",
        }
    }

    /// Exact name lookup (case-insensitive).
    pub fn from_name(name: &str) -> Option<RhythmStyle> {
        let name = name.trim().to_lowercase();
        RhythmStyle::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Style of the first keyword that appears in `text`.
    ///
    /// `None` when nothing matches or when the first match is a keyword
    /// without a grid of its own.
    pub fn match_description(text: &str) -> Option<RhythmStyle> {
        let text = text.to_lowercase();
        MATCH_ORDER
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .and_then(|&(_, style)| style)
    }

    /// (track, steps) hits of this style.
    fn hits(self) -> &'static [(usize, &'static [usize])] {
        match self {
            RhythmStyle::Rock => &[(KICK, &[0, 8]), (SNARE, &[4, 12]), (HAT, EVEN), (CRASH, &[0])],
            RhythmStyle::Funk => &[
                (KICK, &[0, 6, 10]),
                (SNARE, &[2, 4, 10, 12]),
                (HAT, ALL),
                (OPEN_HAT, &[6, 14]),
            ],
            RhythmStyle::Latin => &[
                (KICK, &[0, 6, 10]),
                (SNARE, &[4, 12]),
                (HAT, EVEN),
                (PERC1, &[2, 6, 10, 14]),
                (PERC2, &[1, 5, 9, 13]),
            ],
            RhythmStyle::Jazz => &[
                (KICK, &[0, 12]),
                (SNARE, &[4, 12]),
                (HAT, &[0, 3, 6, 9, 12, 15]),
                (OPEN_HAT, &[6, 14]),
            ],
            RhythmStyle::Reggae => &[
                (KICK, &[8]),
                (SNARE, &[4, 12]),
                (HAT, &[2, 6, 10, 14]),
                (OPEN_HAT, &[4, 12]),
            ],
            RhythmStyle::Ballad => &[(KICK, &[0, 12]), (SNARE, &[8]), (HAT, &[4, 12])],
            RhythmStyle::Shuffle => &[(KICK, &[0, 8]), (SNARE, &[4, 12]), (HAT, &[2, 5, 8, 11, 14])],
            RhythmStyle::HipHop => &[
                (KICK, &[0, 8]),
                (SNARE, &[4, 12]),
                (HAT, &[2, 6, 10, 14]),
                (CLAP, &[6, 14]),
            ],
            RhythmStyle::Trap => &[
                (KICK, &[0, 6, 8, 14]),
                (SNARE, &[4, 12]),
                (HAT, EVEN),
                (CLAP, &[2, 6, 10, 14]),
            ],
            RhythmStyle::House => &[
                (KICK, &[0, 4, 8, 12]),
                (SNARE, &[4, 12]),
                (HAT, EVEN),
                (OPEN_HAT, &[8]),
            ],
            RhythmStyle::Techno => &[
                (KICK, &[0, 4, 8, 12]),
                (SNARE, &[4, 12]),
                (HAT, ALL),
                (PERC1, &[1, 5, 9, 13]),
            ],
            RhythmStyle::Dubstep => &[
                (KICK, &[0, 8]),
                (SNARE, &[4, 6, 12, 14]),
                (HAT, &[2, 10]),
                (PERC2, &[1, 3, 9, 11]),
            ],
            RhythmStyle::Dnb => &[
                (KICK, &[0, 10]),
                (SNARE, &[4, 13]),
                (HAT, EVEN),
                (PERC1, &[2, 6, 11, 15]),
            ],
            RhythmStyle::Afrobeat => &[
                (KICK, &[0, 6, 12]),
                (SNARE, &[4, 10]),
                (HAT, EVEN),
                (PERC1, &[1, 3, 7, 11, 15]),
                (PERC2, &[2, 6, 10, 14]),
            ],
            RhythmStyle::Bossa => &[
                (KICK, &[0, 8]),
                (SNARE, &[6, 14]),
                (HAT, &[2, 5, 8, 11]),
                (PERC1, &[1, 9]),
            ],
            RhythmStyle::Blues => &[(KICK, &[0, 12]), (SNARE, &[6, 14]), (HAT, &[2, 5, 8, 11, 14])],
            RhythmStyle::Metal => &[
                (KICK, &[0, 2, 8, 10]),
                (SNARE, &[4, 12]),
                (HAT, EVEN),
                (CRASH, &[0, 8]),
            ],
            RhythmStyle::Ambient => &[(KICK, &[0]), (SNARE, &[8]), (HAT, &[4, 12]), (CRASH, &[0, 8])],
            RhythmStyle::Breakbeat => &[
                (KICK, &[0, 10]),
                (SNARE, &[4, 6, 13]),
                (HAT, &[2, 5, 8, 11, 14]),
                (PERC1, &[3, 7, 15]),
            ],
        }
    }

    /// The style's drum grid.
    pub fn pattern(self) -> StepPattern {
        let mut rows = vec![[false; STEPS]; TRACK_COUNT];
        for &(track, steps) in self.hits() {
            for &step in steps {
                rows[track][step] = true;
            }
        }
        StepPattern::from(rows)
    }
}

/// A drum grid where each cell is on with its track's probability.
pub fn random_pattern(rng: &mut fastrand::Rng) -> StepPattern {
    let rows = RANDOM_WEIGHTS
        .iter()
        .map(|&p| std::array::from_fn(|_| rng.f64() < p))
        .collect::<Vec<[bool; STEPS]>>();
    StepPattern::from(rows)
}

/// Pattern for a free-text request: a matching style, else random.
pub fn generate(text: &str, rng: &mut fastrand::Rng) -> (Option<RhythmStyle>, StepPattern) {
    match RhythmStyle::match_description(text) {
        Some(style) => (Some(style), style.pattern()),
        None => (None, random_pattern(rng)),
    }
}
