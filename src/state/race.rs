use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    config::RaceLimits,
    state::ruleset::{Ruleset, RulesetUpdate},
};

/// Identifier of a live race, unique and monotonic for the process lifetime.
pub type RaceId = u64;

/// Last regular floor number ("Home").
pub const FINAL_FLOOR: u32 = 13;
/// Highest stage type a floor report may carry.
pub const MAX_STAGE_TYPE: u32 = 5;

/// Lifecycle of a race. Status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    /// Accepting racers and ruleset changes.
    Open,
    /// Every racer is ready; counting down to the start.
    Starting,
    /// Racers are playing.
    InProgress,
    /// Terminal; the race has left the registry.
    Finished,
}

/// Lifecycle of a single racer inside a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum RacerStatus {
    NotReady,
    Ready,
    Racing,
    Finished,
    Quit,
    Disqualified,
}

impl RacerStatus {
    /// Finished, quit and disqualified racers never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RacerStatus::Finished | RacerStatus::Quit | RacerStatus::Disqualified
        )
    }
}

/// Errors raised by race operations. The message is what the initiator receives.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    #[error("race {0} does not exist")]
    RaceNotFound(RaceId),
    #[error("race is not open")]
    NotOpen,
    #[error("race is not in progress")]
    NotInProgress,
    #[error("cannot move race from {from:?} to {to:?}")]
    InvalidTransition { from: RaceStatus, to: RaceStatus },
    #[error("already in this race")]
    AlreadyJoined,
    #[error("solo races cannot be joined")]
    SoloRace,
    #[error("a race with more than one racer cannot be made solo")]
    TooManyRacersForSolo,
    #[error("not in this race")]
    NotARacer,
    #[error("only the captain can do this")]
    NotCaptain,
    #[error("already ready")]
    AlreadyReady,
    #[error("not ready")]
    NotReady,
    #[error("not racing")]
    NotRacing,
    #[error("ruleset is unchanged")]
    RulesetUnchanged,
    #[error("a race named \"{0}\" already exists")]
    NameTaken(String),
    #[error("cannot captain more than {0} races at once")]
    CaptainLimit(usize),
    #[error("invalid race name")]
    InvalidName,
    #[error("invalid seed \"{0}\"")]
    InvalidSeed(String),
    #[error("starting builds require the seeded format")]
    BuildRequiresSeeded,
    #[error("custom races cannot be ranked")]
    CustomCannotBeRanked,
    #[error("starting build must be between 0 and {max}")]
    BuildOutOfRange { max: u32 },
    #[error("instant start item must be between 0 and {max}")]
    InstantStartOutOfRange { max: u32 },
    #[error("invalid floor {floor_num} (stage type {stage_type})")]
    InvalidFloor { floor_num: u32, stage_type: u32 },
    #[error("invalid character number")]
    InvalidCharacterNum,
    #[error("item must be between 1 and {max}")]
    InvalidItem { max: u32 },
    #[error("room id must not be empty")]
    EmptyRoom,
    #[error("comment must not be empty")]
    EmptyComment,
    #[error("comment must be at most {max} characters")]
    CommentTooLong { max: usize },
}

impl RaceError {
    /// Whether the error comes from malformed input rather than the current race state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RaceError::InvalidName
                | RaceError::InvalidSeed(_)
                | RaceError::BuildRequiresSeeded
                | RaceError::CustomCannotBeRanked
                | RaceError::BuildOutOfRange { .. }
                | RaceError::InstantStartOutOfRange { .. }
                | RaceError::InvalidFloor { .. }
                | RaceError::InvalidCharacterNum
                | RaceError::InvalidItem { .. }
                | RaceError::EmptyRoom
                | RaceError::EmptyComment
                | RaceError::CommentTooLong { .. }
        )
    }
}

/// Entry of a racer's append-only item log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPickup {
    /// Item identifier.
    pub item_id: u32,
    /// Floor the item was picked up on.
    pub floor_num: u32,
    /// Stage type of that floor.
    pub stage_type: u32,
    /// Acquisition time.
    pub at: SystemTime,
}

/// Entry of a racer's room visit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomVisit {
    /// In-game room identifier.
    pub room_id: String,
    /// Floor the room belongs to.
    pub floor_num: u32,
    /// Stage type of that floor.
    pub stage_type: u32,
    /// Time of the visit.
    pub at: SystemTime,
}

/// Progress reported by a racer when reaching a new floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorReport {
    /// Floor number, `1..=13`.
    pub floor_num: u32,
    /// Stage type, `0..=5`.
    pub stage_type: u32,
    /// Current character ordinal for multi-character races.
    pub character_num: Option<u32>,
    /// Whether the racer is walking the backwards path.
    pub backwards_path: Option<bool>,
}

/// Participant of a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Racer {
    /// Identity of the racer.
    pub name: String,
    /// Current status.
    pub status: RacerStatus,
    /// Live place, recomputed while racing.
    pub place_mid: u32,
    /// Final place, set when the racer finishes.
    pub place: Option<u32>,
    /// Current floor.
    pub floor_num: u32,
    /// Stage type of the current floor.
    pub stage_type: u32,
    /// Current character ordinal, starting at 1.
    pub character_num: u32,
    /// Whether the racer is on the backwards path.
    pub backwards_path: bool,
    /// Arrival time at the current floor.
    pub floor_arrived: SystemTime,
    /// Items in pickup order.
    pub items: Vec<ItemPickup>,
    /// Rooms in visit order.
    pub rooms: Vec<RoomVisit>,
    /// Latest comment.
    pub comment: String,
    /// Join time.
    pub joined_at: SystemTime,
    /// Time the racer finished or quit.
    pub finished_at: Option<SystemTime>,
    /// Duration between race start and finish, for finishers.
    pub run_time: Option<Duration>,
}

impl Racer {
    fn new(name: String, now: SystemTime) -> Self {
        Self {
            name,
            status: RacerStatus::NotReady,
            place_mid: 0,
            place: None,
            floor_num: 1,
            stage_type: 0,
            character_num: 1,
            backwards_path: false,
            floor_arrived: now,
            items: Vec::new(),
            rooms: Vec::new(),
            comment: String::new(),
            joined_at: now,
            finished_at: None,
            run_time: None,
        }
    }
}

/// Result of a racer leaving an open race.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Racer promoted to captain because the captain left.
    pub new_captain: Option<String>,
    /// The race has no racer left and must be deleted.
    pub emptied: bool,
}

/// A live race and its racers, keyed by identity in join order.
#[derive(Debug, Clone)]
pub struct Race {
    id: RaceId,
    name: String,
    status: RaceStatus,
    ruleset: Ruleset,
    captain: String,
    created_at: SystemTime,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
    racers: IndexMap<String, Racer>,
}

impl Race {
    /// Create an open race whose captain is its first racer.
    pub fn new(
        id: RaceId,
        name: impl Into<String>,
        ruleset: Ruleset,
        captain: impl Into<String>,
        now: SystemTime,
    ) -> Self {
        let captain = captain.into();
        let mut racers = IndexMap::new();
        racers.insert(captain.clone(), Racer::new(captain.clone(), now));
        Self {
            id,
            name: name.into(),
            status: RaceStatus::Open,
            ruleset,
            captain,
            created_at: now,
            started_at: None,
            finished_at: None,
            racers,
        }
    }

    #[allow(missing_docs)]
    pub fn id(&self) -> RaceId {
        self.id
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn status(&self) -> RaceStatus {
        self.status
    }

    #[allow(missing_docs)]
    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    #[allow(missing_docs)]
    pub fn captain(&self) -> &str {
        &self.captain
    }

    #[allow(missing_docs)]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    #[allow(missing_docs)]
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    #[allow(missing_docs)]
    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at
    }

    /// Racers in join order.
    pub fn racers(&self) -> &IndexMap<String, Racer> {
        &self.racers
    }

    #[allow(missing_docs)]
    pub fn racer(&self, name: &str) -> Option<&Racer> {
        self.racers.get(name)
    }

    #[allow(missing_docs)]
    pub fn is_racer(&self, name: &str) -> bool {
        self.racers.contains_key(name)
    }

    /// Add a `not_ready` racer.
    pub fn join(&mut self, name: &str, now: SystemTime) -> Result<(), RaceError> {
        self.require_status(RaceStatus::Open, RaceError::NotOpen)?;
        if self.racers.contains_key(name) {
            return Err(RaceError::AlreadyJoined);
        }
        if self.ruleset.solo {
            return Err(RaceError::SoloRace);
        }
        self.racers
            .insert(name.to_owned(), Racer::new(name.to_owned(), now));
        Ok(())
    }

    /// Remove a racer; a departing captain hands over to the earliest joiner.
    pub fn leave(&mut self, name: &str) -> Result<LeaveOutcome, RaceError> {
        self.require_status(RaceStatus::Open, RaceError::NotOpen)?;
        if self.racers.shift_remove(name).is_none() {
            return Err(RaceError::NotARacer);
        }

        let mut outcome = LeaveOutcome {
            emptied: self.racers.is_empty(),
            ..LeaveOutcome::default()
        };
        if self.captain == name {
            if let Some(successor) = self.racers.keys().next() {
                self.captain = successor.clone();
                outcome.new_captain = Some(successor.clone());
            }
        }
        Ok(outcome)
    }

    #[allow(missing_docs)]
    pub fn set_ready(&mut self, name: &str) -> Result<(), RaceError> {
        self.require_status(RaceStatus::Open, RaceError::NotOpen)?;
        let racer = self.racers.get_mut(name).ok_or(RaceError::NotARacer)?;
        if racer.status != RacerStatus::NotReady {
            return Err(RaceError::AlreadyReady);
        }
        racer.status = RacerStatus::Ready;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_unready(&mut self, name: &str) -> Result<(), RaceError> {
        self.require_status(RaceStatus::Open, RaceError::NotOpen)?;
        let racer = self.racers.get_mut(name).ok_or(RaceError::NotARacer)?;
        if racer.status != RacerStatus::Ready {
            return Err(RaceError::NotReady);
        }
        racer.status = RacerStatus::NotReady;
        Ok(())
    }

    /// Start-check: every racer ready, and either solo or more than one racer.
    ///
    /// A solo race never holds more than its creator, so "everyone ready" is its one ready racer.
    pub fn ready_to_start(&self) -> bool {
        self.status == RaceStatus::Open
            && !self.racers.is_empty()
            && (self.ruleset.solo || self.racers.len() > 1)
            && self
                .racers
                .values()
                .all(|racer| racer.status == RacerStatus::Ready)
    }

    /// `open` → `starting`.
    pub fn begin_countdown(&mut self) -> Result<(), RaceError> {
        self.advance(RaceStatus::Open, RaceStatus::Starting)
    }

    /// `starting` → `in_progress`; every racer starts racing in last place.
    pub fn start(&mut self, now: SystemTime) -> Result<(), RaceError> {
        self.advance(RaceStatus::Starting, RaceStatus::InProgress)?;
        self.started_at = Some(now);
        let count = self.racers.len() as u32;
        for racer in self.racers.values_mut() {
            racer.status = RacerStatus::Racing;
            racer.place_mid = count;
            racer.floor_num = 1;
            racer.stage_type = 0;
            racer.character_num = 1;
            racer.backwards_path = false;
            racer.floor_arrived = now;
        }
        Ok(())
    }

    /// Record arrival on a new floor.
    pub fn report_floor(
        &mut self,
        name: &str,
        report: FloorReport,
        now: SystemTime,
    ) -> Result<(), RaceError> {
        if !(1..=FINAL_FLOOR).contains(&report.floor_num) || report.stage_type > MAX_STAGE_TYPE {
            return Err(RaceError::InvalidFloor {
                floor_num: report.floor_num,
                stage_type: report.stage_type,
            });
        }
        if report.character_num == Some(0) {
            return Err(RaceError::InvalidCharacterNum);
        }

        let racer = self.racing_racer_mut(name)?;
        racer.floor_num = report.floor_num;
        racer.stage_type = report.stage_type;
        if let Some(character_num) = report.character_num {
            racer.character_num = character_num;
        }
        if let Some(backwards_path) = report.backwards_path {
            racer.backwards_path = backwards_path;
        }
        racer.floor_arrived = now;
        Ok(())
    }

    /// Append an item pickup on the racer's current floor.
    pub fn report_item(
        &mut self,
        name: &str,
        item_id: u32,
        limits: &RaceLimits,
        now: SystemTime,
    ) -> Result<ItemPickup, RaceError> {
        if !(1..=limits.max_item_id).contains(&item_id) {
            return Err(RaceError::InvalidItem {
                max: limits.max_item_id,
            });
        }

        let racer = self.racing_racer_mut(name)?;
        let pickup = ItemPickup {
            item_id,
            floor_num: racer.floor_num,
            stage_type: racer.stage_type,
            at: now,
        };
        racer.items.push(pickup.clone());
        Ok(pickup)
    }

    /// Append an in-game room visit.
    pub fn report_room(
        &mut self,
        name: &str,
        room_id: &str,
        now: SystemTime,
    ) -> Result<(), RaceError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(RaceError::EmptyRoom);
        }

        let racer = self.racing_racer_mut(name)?;
        let visit = RoomVisit {
            room_id: room_id.to_owned(),
            floor_num: racer.floor_num,
            stage_type: racer.stage_type,
            at: now,
        };
        racer.rooms.push(visit);
        Ok(())
    }

    /// Replace the racer's comment, returning the stored (trimmed) text.
    pub fn set_comment(
        &mut self,
        name: &str,
        comment: &str,
        limits: &RaceLimits,
    ) -> Result<String, RaceError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(RaceError::EmptyComment);
        }
        if comment.chars().count() > limits.max_comment_length {
            return Err(RaceError::CommentTooLong {
                max: limits.max_comment_length,
            });
        }

        let racer = self.racing_racer_mut(name)?;
        racer.comment = comment.to_owned();
        Ok(racer.comment.clone())
    }

    /// Mark the racer finished and return the final place it was given.
    pub fn finish_run(&mut self, name: &str, now: SystemTime) -> Result<u32, RaceError> {
        let place = self.current_place();
        let started_at = self.started_at;
        let racer = self.racing_racer_mut(name)?;
        racer.status = RacerStatus::Finished;
        racer.place = Some(place);
        racer.finished_at = Some(now);
        racer.run_time = started_at.and_then(|start| now.duration_since(start).ok());
        Ok(place)
    }

    #[allow(missing_docs)]
    pub fn quit(&mut self, name: &str, now: SystemTime) -> Result<(), RaceError> {
        let racer = self.racing_racer_mut(name)?;
        racer.status = RacerStatus::Quit;
        racer.finished_at = Some(now);
        Ok(())
    }

    /// Force every racer still racing to quit, returning who was affected.
    pub fn quit_remaining(&mut self, now: SystemTime) -> Vec<String> {
        if self.status != RaceStatus::InProgress {
            return Vec::new();
        }
        let mut affected = Vec::new();
        for racer in self.racers.values_mut() {
            if racer.status == RacerStatus::Racing {
                racer.status = RacerStatus::Quit;
                racer.finished_at = Some(now);
                affected.push(racer.name.clone());
            }
        }
        affected
    }

    /// Finish-check: an in-progress race with nobody left racing.
    pub fn everyone_done(&self) -> bool {
        self.status == RaceStatus::InProgress
            && self
                .racers
                .values()
                .all(|racer| racer.status.is_terminal())
    }

    /// `in_progress` → `finished`.
    pub fn mark_finished(&mut self, now: SystemTime) -> Result<(), RaceError> {
        self.advance(RaceStatus::InProgress, RaceStatus::Finished)?;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Captain-only ruleset change; resets every racer to `not_ready`.
    pub fn update_ruleset<R: Rng + ?Sized>(
        &mut self,
        requester: &str,
        update: &RulesetUpdate,
        limits: &RaceLimits,
        rng: &mut R,
    ) -> Result<&Ruleset, RaceError> {
        self.require_status(RaceStatus::Open, RaceError::NotOpen)?;
        if self.captain != requester {
            return Err(RaceError::NotCaptain);
        }

        let mut merged = update.apply_to(&self.ruleset).validated(limits)?;
        if merged == self.ruleset {
            return Err(RaceError::RulesetUnchanged);
        }
        if merged.solo && self.racers.len() > 1 {
            return Err(RaceError::TooManyRacersForSolo);
        }
        merged.fill_seed(rng);

        self.ruleset = merged;
        for racer in self.racers.values_mut() {
            racer.status = RacerStatus::NotReady;
        }
        Ok(&self.ruleset)
    }

    /// Place the next finisher gets: one past the best final place handed out so far.
    pub fn current_place(&self) -> u32 {
        self.racers
            .values()
            .filter_map(|racer| racer.place)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Worst place still reachable: racers that did not quit or get disqualified.
    pub fn last_place(&self) -> u32 {
        self.racers
            .values()
            .filter(|racer| {
                !matches!(racer.status, RacerStatus::Quit | RacerStatus::Disqualified)
            })
            .count() as u32
    }

    pub(crate) fn set_place_mid(&mut self, name: &str, place: u32) {
        if let Some(racer) = self.racers.get_mut(name) {
            racer.place_mid = place;
        }
    }

    fn racing_racer_mut(&mut self, name: &str) -> Result<&mut Racer, RaceError> {
        self.require_status(RaceStatus::InProgress, RaceError::NotInProgress)?;
        let racer = self.racers.get_mut(name).ok_or(RaceError::NotARacer)?;
        if racer.status != RacerStatus::Racing {
            return Err(RaceError::NotRacing);
        }
        Ok(racer)
    }

    fn require_status(&self, expected: RaceStatus, err: RaceError) -> Result<(), RaceError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(err)
        }
    }

    fn advance(&mut self, from: RaceStatus, to: RaceStatus) -> Result<(), RaceError> {
        if self.status != from {
            return Err(RaceError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
