use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{config::RaceLimits, state::race::RaceError};

/// Sentinel seed meaning "no seed".
pub const NO_SEED: &str = "-";
const SEED_LENGTH: usize = 8;
const SEED_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Race formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RaceFormat {
    /// Every racer plays a different, unseeded run.
    #[default]
    Unseeded,
    /// Every racer plays the same seed.
    Seeded,
    /// Seeded with random starting items.
    Diversity,
    /// Free-form rules agreed between the racers; never ranked.
    Custom,
}

/// Objective that ends a run.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RaceGoal {
    #[default]
    BlueBaby,
    TheLamb,
    MegaSatan,
    Hush,
    Delirium,
    Mother,
    TheBeast,
    BossRush,
    Custom,
}

impl RaceGoal {
    /// Goals whose route walks back up through already visited floors.
    pub fn has_backwards_path(self) -> bool {
        matches!(self, RaceGoal::TheBeast | RaceGoal::Custom)
    }
}

/// Game difficulty.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Normal,
    Hard,
}

/// Playable characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Character {
    Isaac,
    Magdalene,
    Cain,
    #[default]
    Judas,
    BlueBaby,
    Eve,
    Samson,
    Azazel,
    Lazarus,
    Eden,
    TheLost,
    Lilith,
    Keeper,
    Apollyon,
    TheForgotten,
    Bethany,
    JacobAndEsau,
}

/// Rating pool a finished race contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingKind {
    /// Ranked race played alone against the clock.
    RankedSolo,
    /// Ranked race between several racers.
    Multiplayer,
}

/// Complete set of rules a race is played under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Ruleset {
    /// Race format.
    pub format: RaceFormat,
    /// Character every racer plays.
    pub character: Character,
    /// Whether the character was picked at random.
    pub character_random: bool,
    /// Run objective.
    pub goal: RaceGoal,
    /// Game difficulty.
    pub difficulty: Difficulty,
    /// Eight uppercase alphanumerics, or [`NO_SEED`].
    pub seed: String,
    /// Starting build identifier, `0` for none.
    pub starting_build: u32,
    /// Single-player race.
    pub solo: bool,
    /// Whether the result counts towards ratings.
    pub ranked: bool,
    /// Item granted at the start of the run, `0` for none.
    pub instant_start: u32,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            format: RaceFormat::default(),
            character: Character::default(),
            character_random: false,
            goal: RaceGoal::default(),
            difficulty: Difficulty::default(),
            seed: NO_SEED.to_owned(),
            starting_build: 0,
            solo: false,
            ranked: false,
            instant_start: 0,
        }
    }
}

impl Ruleset {
    /// Normalise the seed and check the ruleset as a whole.
    pub fn validated(mut self, limits: &RaceLimits) -> Result<Self, RaceError> {
        self.seed = normalize_seed(&self.seed);
        if self.format == RaceFormat::Unseeded {
            self.seed = NO_SEED.to_owned();
        }
        if self.seed != NO_SEED && !is_valid_seed(&self.seed) {
            return Err(RaceError::InvalidSeed(self.seed));
        }
        if self.starting_build > limits.max_build_id {
            return Err(RaceError::BuildOutOfRange {
                max: limits.max_build_id,
            });
        }
        if self.starting_build > 0 && self.format != RaceFormat::Seeded {
            return Err(RaceError::BuildRequiresSeeded);
        }
        if self.instant_start > limits.max_item_id {
            return Err(RaceError::InstantStartOutOfRange {
                max: limits.max_item_id,
            });
        }
        if self.ranked && self.format == RaceFormat::Custom {
            return Err(RaceError::CustomCannotBeRanked);
        }
        Ok(self)
    }

    /// Seeded and diversity races without a seed get a random one.
    pub fn fill_seed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let wants_seed = matches!(self.format, RaceFormat::Seeded | RaceFormat::Diversity);
        if wants_seed && self.seed == NO_SEED {
            self.seed = (0..SEED_LENGTH)
                .map(|_| char::from(SEED_ALPHABET[rng.random_range(0..SEED_ALPHABET.len())]))
                .collect();
        }
    }

    /// Rating pool of a finished race, `None` when the race is not rated.
    pub fn rating_kind(&self) -> Option<RatingKind> {
        if !self.ranked || self.format == RaceFormat::Custom {
            return None;
        }
        if self.solo {
            Some(RatingKind::RankedSolo)
        } else {
            Some(RatingKind::Multiplayer)
        }
    }
}

/// Partial ruleset; `None` fields keep the value of the ruleset it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
#[allow(missing_docs)]
pub struct RulesetUpdate {
    pub format: Option<RaceFormat>,
    pub character: Option<Character>,
    pub character_random: Option<bool>,
    pub goal: Option<RaceGoal>,
    pub difficulty: Option<Difficulty>,
    pub seed: Option<String>,
    pub starting_build: Option<u32>,
    pub solo: Option<bool>,
    pub ranked: Option<bool>,
    pub instant_start: Option<u32>,
}

impl RulesetUpdate {
    /// Merge onto `base`, field by field.
    pub fn apply_to(&self, base: &Ruleset) -> Ruleset {
        Ruleset {
            format: self.format.unwrap_or(base.format),
            character: self.character.unwrap_or(base.character),
            character_random: self.character_random.unwrap_or(base.character_random),
            goal: self.goal.unwrap_or(base.goal),
            difficulty: self.difficulty.unwrap_or(base.difficulty),
            seed: self.seed.clone().unwrap_or_else(|| base.seed.clone()),
            starting_build: self.starting_build.unwrap_or(base.starting_build),
            solo: self.solo.unwrap_or(base.solo),
            ranked: self.ranked.unwrap_or(base.ranked),
            instant_start: self.instant_start.unwrap_or(base.instant_start),
        }
    }
}

/// Uppercase and strip spaces.
pub fn normalize_seed(seed: &str) -> String {
    seed.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn is_valid_seed(seed: &str) -> bool {
    seed.len() == SEED_LENGTH
        && seed
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
