//! Live ("mid-race") standings.
//!
//! Places are recomputed from scratch after every progress report. Only racers still racing are
//! touched; finishers and quitters keep the place they had when they stopped.

use std::cmp::Ordering;

use indexmap::IndexMap;
use tracing::error;

use crate::state::{
    race::{FINAL_FLOOR, Race, Racer, RacerStatus},
    ruleset::RaceGoal,
};

/// Stage types that sit one step deeper than their floor number.
const OFFSET_STAGE_TYPES: [u32; 2] = [4, 5];

/// Position of one racer relative to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    #[allow(missing_docs)]
    Ahead,
    #[allow(missing_docs)]
    Behind,
    /// Every criterion compared equal.
    Tied,
}

/// A racer whose live place changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceChange {
    /// Racer identity.
    pub name: String,
    /// New live place.
    pub place_mid: u32,
}

/// Outcome of a standings computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MidPlaces {
    /// Computed place per racing racer, in join order.
    pub places: IndexMap<String, u32>,
    /// Pairs of racers no criterion could separate.
    pub unresolved: Vec<(String, String)>,
}

/// Floor ordinal used for comparisons.
///
/// Offset stage types count one floor deeper; the final floor sorts below the first one.
pub fn adjusted_floor(floor_num: u32, stage_type: u32) -> u32 {
    if floor_num == FINAL_FLOOR {
        0
    } else if OFFSET_STAGE_TYPES.contains(&stage_type) {
        floor_num + 1
    } else {
        floor_num
    }
}

/// Compare `racer` against `other`.
pub fn compare(racer: &Racer, other: &Racer, goal: RaceGoal) -> Standing {
    match racer.character_num.cmp(&other.character_num) {
        Ordering::Greater => return Standing::Ahead,
        Ordering::Less => return Standing::Behind,
        Ordering::Equal => {}
    }

    let floor = adjusted_floor(racer.floor_num, racer.stage_type);
    let other_floor = adjusted_floor(other.floor_num, other.stage_type);

    let by_floor = if goal.has_backwards_path() && (racer.backwards_path || other.backwards_path) {
        match (racer.backwards_path, other.backwards_path) {
            (true, false) => return Standing::Ahead,
            (false, true) => return Standing::Behind,
            _ => other_floor.cmp(&floor),
        }
    } else {
        floor.cmp(&other_floor)
    };

    match by_floor {
        Ordering::Greater => return Standing::Ahead,
        Ordering::Less => return Standing::Behind,
        Ordering::Equal => {}
    }

    match racer.floor_arrived.cmp(&other.floor_arrived) {
        Ordering::Less => Standing::Ahead,
        Ordering::Greater => Standing::Behind,
        Ordering::Equal => Standing::Tied,
    }
}

fn still_on_first_floor(racer: &Racer) -> bool {
    racer.floor_num == 1
        && racer.character_num == 1
        && !OFFSET_STAGE_TYPES.contains(&racer.stage_type)
        && !racer.backwards_path
}

/// Compute the live place of every racing racer without touching the race.
pub fn mid_places(race: &Race) -> MidPlaces {
    let goal = race.ruleset().goal;
    let racing: Vec<&Racer> = race
        .racers()
        .values()
        .filter(|racer| racer.status == RacerStatus::Racing)
        .collect();

    let mut result = MidPlaces::default();
    for racer in &racing {
        if still_on_first_floor(racer) {
            result.places.insert(racer.name.clone(), race.last_place());
            continue;
        }

        let mut place = race.current_place();
        let mut tied = false;
        for other in &racing {
            if other.name == racer.name {
                continue;
            }
            match compare(other, racer, goal) {
                Standing::Ahead => place += 1,
                Standing::Behind => {}
                Standing::Tied => {
                    tied = true;
                    result
                        .unresolved
                        .push((racer.name.clone(), other.name.clone()));
                }
            }
        }

        let place = if tied { racer.place_mid } else { place };
        result.places.insert(racer.name.clone(), place);
    }
    result
}

/// Recompute live places and apply them, returning only the ones that changed.
pub fn recompute(race: &mut Race) -> Vec<PlaceChange> {
    let MidPlaces { places, unresolved } = mid_places(race);
    for (racer, other) in &unresolved {
        error!(
            race_id = race.id(),
            racer = %racer,
            other = %other,
            "unable to separate racers; keeping previous place"
        );
    }

    let changes: Vec<PlaceChange> = places
        .into_iter()
        .filter(|(name, place)| race.racer(name).map(|r| r.place_mid) != Some(*place))
        .map(|(name, place_mid)| PlaceChange { name, place_mid })
        .collect();

    for change in &changes {
        race.set_place_mid(&change.name, change.place_mid);
    }
    changes
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::state::{
        race::FloorReport,
        ruleset::{RaceGoal, Ruleset},
    };

    fn running_race(goal: RaceGoal, racers: &[&str], start: SystemTime) -> Race {
        let ruleset = Ruleset {
            goal,
            ..Ruleset::default()
        };
        let mut race = Race::new(7, "ranked", ruleset, racers[0], start);
        for name in &racers[1..] {
            race.join(name, start).unwrap();
        }
        for name in racers {
            race.set_ready(name).unwrap();
        }
        race.begin_countdown().unwrap();
        race.start(start).unwrap();
        race
    }

    fn floor(floor_num: u32, stage_type: u32) -> FloorReport {
        FloorReport {
            floor_num,
            stage_type,
            character_num: None,
            backwards_path: None,
        }
    }

    fn place_of(race: &Race, name: &str) -> u32 {
        race.racer(name).unwrap().place_mid
    }

    #[test]
    fn adjusted_floor_offsets_special_stages() {
        assert_eq!(adjusted_floor(3, 0), 3);
        assert_eq!(adjusted_floor(3, 4), 4);
        assert_eq!(adjusted_floor(3, 5), 4);
        assert_eq!(adjusted_floor(FINAL_FLOOR, 0), 0);
    }

    #[test]
    fn deeper_floor_is_ahead_and_ties_break_on_arrival() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut race = running_race(RaceGoal::BlueBaby, &["alice", "bob", "carol"], t0);

        race.report_floor("alice", floor(3, 0), t0 + Duration::from_secs(10))
            .unwrap();
        race.report_floor("bob", floor(3, 0), t0 + Duration::from_secs(20))
            .unwrap();
        race.report_floor("carol", floor(2, 0), t0 + Duration::from_secs(5))
            .unwrap();

        let changes = recompute(&mut race);
        assert_eq!(place_of(&race, "alice"), 1);
        assert_eq!(place_of(&race, "bob"), 2);
        assert_eq!(place_of(&race, "carol"), 3);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn first_floor_racers_are_pinned_to_last_place() {
        let t0 = SystemTime::now();
        let mut race = running_race(RaceGoal::BlueBaby, &["alice", "bob", "carol"], t0);
        race.report_floor("alice", floor(2, 0), t0 + Duration::from_secs(1))
            .unwrap();
        recompute(&mut race);

        assert_eq!(place_of(&race, "alice"), 1);
        assert_eq!(place_of(&race, "bob"), 3);
        assert_eq!(place_of(&race, "carol"), 3);
    }

    #[test]
    fn character_ordinal_dominates_floor_and_time() {
        let t0 = SystemTime::now();
        let mut race = running_race(RaceGoal::Custom, &["alice", "bob"], t0);
        race.report_floor("alice", floor(11, 0), t0 + Duration::from_secs(1))
            .unwrap();
        let second_character = FloorReport {
            character_num: Some(2),
            ..floor(1, 0)
        };
        race.report_floor("bob", second_character, t0 + Duration::from_secs(50))
            .unwrap();

        recompute(&mut race);
        assert_eq!(place_of(&race, "bob"), 1);
        assert_eq!(place_of(&race, "alice"), 2);
    }

    #[test]
    fn backwards_path_beats_forward_and_inverts_floors() {
        let t0 = SystemTime::now();
        let mut race = running_race(RaceGoal::TheBeast, &["alice", "bob", "carol"], t0);
        let backwards = |floor_num| FloorReport {
            backwards_path: Some(true),
            ..floor(floor_num, 0)
        };
        race.report_floor("alice", floor(10, 0), t0 + Duration::from_secs(1))
            .unwrap();
        race.report_floor("bob", backwards(6), t0 + Duration::from_secs(2))
            .unwrap();
        race.report_floor("carol", backwards(3), t0 + Duration::from_secs(3))
            .unwrap();

        recompute(&mut race);
        assert_eq!(place_of(&race, "carol"), 1);
        assert_eq!(place_of(&race, "bob"), 2);
        assert_eq!(place_of(&race, "alice"), 3);
    }

    #[test]
    fn backwards_flag_is_ignored_for_forward_goals() {
        let t0 = SystemTime::now();
        let mut race = running_race(RaceGoal::BlueBaby, &["alice", "bob"], t0);
        race.report_floor("alice", floor(8, 0), t0 + Duration::from_secs(1))
            .unwrap();
        let backwards = FloorReport {
            backwards_path: Some(true),
            ..floor(4, 0)
        };
        race.report_floor("bob", backwards, t0 + Duration::from_secs(2))
            .unwrap();

        recompute(&mut race);
        assert_eq!(place_of(&race, "alice"), 1);
        assert_eq!(place_of(&race, "bob"), 2);
    }

    #[test]
    fn recomputation_is_deterministic_and_idempotent() {
        let t0 = SystemTime::now();
        let mut race = running_race(RaceGoal::BlueBaby, &["alice", "bob", "carol"], t0);
        race.report_floor("bob", floor(4, 5), t0 + Duration::from_secs(3))
            .unwrap();
        race.report_floor("carol", floor(4, 0), t0 + Duration::from_secs(1))
            .unwrap();

        let first = mid_places(&race);
        assert_eq!(first, mid_places(&race));
        assert!(!recompute(&mut race).is_empty());
        assert!(recompute(&mut race).is_empty());
        assert_eq!(place_of(&race, "bob"), 1);
        assert_eq!(place_of(&race, "carol"), 2);
    }

    #[test]
    fn finished_racers_shift_live_places_and_keep_their_own() {
        let t0 = SystemTime::now();
        let mut race = running_race(RaceGoal::BlueBaby, &["alice", "bob", "carol"], t0);
        race.report_floor("alice", floor(9, 0), t0 + Duration::from_secs(1))
            .unwrap();
        race.report_floor("bob", floor(5, 0), t0 + Duration::from_secs(2))
            .unwrap();
        recompute(&mut race);
        assert_eq!(place_of(&race, "alice"), 1);

        race.finish_run("alice", t0 + Duration::from_secs(3)).unwrap();
        recompute(&mut race);
        assert_eq!(place_of(&race, "alice"), 1);
        assert_eq!(place_of(&race, "bob"), 2);
        assert_eq!(place_of(&race, "carol"), 3);
    }

    #[test]
    fn exact_tie_is_flagged_and_keeps_previous_place() {
        let t0 = SystemTime::now();
        let arrival = t0 + Duration::from_secs(5);
        let mut race = running_race(RaceGoal::BlueBaby, &["alice", "bob"], t0);
        race.report_floor("alice", floor(2, 0), arrival).unwrap();
        race.report_floor("bob", floor(2, 0), arrival).unwrap();

        let computed = mid_places(&race);
        assert_eq!(computed.unresolved.len(), 2);
        assert!(recompute(&mut race).is_empty());
        assert_eq!(place_of(&race, "alice"), 2);
        assert_eq!(place_of(&race, "bob"), 2);
    }
}
