//! The bracket controller: owns the tournament state and its CSV snapshot.
//!
//! At most one tournament is live at a time. Every mutating call rewrites
//! the whole file; writes are serialized behind a dedicated mutex and each
//! one lands atomically, so the on-disk file is always a consistent snapshot
//! of some recent state.

use crate::config::Defaults;
use crate::logic::series;
use crate::models::{Bracket, BracketError, BracketMatch, MatchStatus, UserId};
use crate::storage::write_atomic;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

const COLUMN_HEADER: [&str; 11] = [
    "round",
    "matchId",
    "player1",
    "player2",
    "player1Display",
    "player2Display",
    "p1wins",
    "p2wins",
    "status",
    "winner",
    "winnerDisplay",
];

/// Controller for the single live tournament.
///
/// Handles are cheap to share behind an `Arc`; tests construct independent
/// controllers against temporary directories.
pub struct BracketController {
    path: PathBuf,
    defaults: Defaults,
    state: Mutex<Option<Bracket>>,
    writer: Mutex<()>,
}

impl BracketController {
    pub fn new(path: impl Into<PathBuf>, defaults: Defaults) -> Self {
        Self {
            path: path.into(),
            defaults,
            state: Mutex::new(None),
            writer: Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<Bracket>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a tournament and persist it.
    pub fn initialize(
        &self,
        format: &str,
        players: &[String],
        best_of: u32,
        randomize: bool,
    ) -> Result<(), BracketError> {
        {
            let mut state = self.lock_state();
            if state.is_some() {
                return Err(BracketError::AlreadyStarted);
            }
            let bracket = series::build_bracket(format, players, best_of, randomize)?;
            log::info!(
                "created {} tournament: {} players, best of {}",
                bracket.format,
                bracket.participants,
                bracket.best_of
            );
            *state = Some(bracket);
        }
        self.persist()
    }

    /// Resume a persisted tournament if one is on disk; otherwise auto-create
    /// from the configured defaults when enabled; otherwise stay idle.
    /// Load failures are soft: they warn and leave the controller idle.
    pub fn load_or_initialize(&self) {
        {
            let mut state = self.lock_state();
            if state.is_some() {
                return;
            }
            match fs::read_to_string(&self.path) {
                Ok(text) => match decode_bracket(&text, &self.defaults) {
                    Ok(bracket) => {
                        log::info!(
                            "resumed {} tournament from {} ({} players, round {})",
                            bracket.format,
                            self.path.display(),
                            bracket.participants,
                            bracket.current_round
                        );
                        *state = Some(bracket);
                        return;
                    }
                    Err(e) => {
                        log::warn!("ignoring unreadable tournament file {}: {}", self.path.display(), e)
                    }
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => log::warn!("could not read {}: {}", self.path.display(), e),
            }
        }
        if !self.defaults.auto_init {
            return;
        }
        let defaults = self.defaults.clone();
        match self.initialize(
            &defaults.format,
            defaults.entrants(),
            defaults.best_of,
            defaults.randomize_seeding,
        ) {
            Ok(()) => {}
            Err(e) => log::warn!("auto-created tournament failed: {}", e),
        }
    }

    /// Whether `a` and `b` may battle each other right now.
    pub fn can_match(&self, a: &str, b: &str) -> bool {
        match &*self.lock_state() {
            Some(bracket) => series::can_match(bracket, a, b),
            None => false,
        }
    }

    /// Whether `player` may search for their bracket battle right now.
    pub fn can_search(&self, player: &str) -> bool {
        match &*self.lock_state() {
            Some(bracket) => series::can_search(bracket, player),
            None => false,
        }
    }

    /// Battle-end hook: record one win in the pair's shared series.
    /// Never fails; unknown pairings and save failures are logged only.
    pub fn record_win(&self, winner: &str, loser: &str) {
        let changed = match &mut *self.lock_state() {
            Some(bracket) => series::record_win(bracket, winner, loser),
            None => {
                log::warn!(
                    "battle result {} vs {} with no tournament in progress",
                    winner,
                    loser
                );
                false
            }
        };
        if changed {
            // persist() already logged; a battle hook has no caller to tell
            let _ = self.persist();
        }
    }

    /// Admin verb: end `winner`'s active series at once.
    pub fn force_win(&self, winner: &str) -> Result<(), BracketError> {
        {
            let mut state = self.lock_state();
            let bracket = state.as_mut().ok_or(BracketError::NotStarted)?;
            series::force_win(bracket, winner)?;
        }
        self.persist()
    }

    /// Opponent id for a player in an active series.
    pub fn opponent_of(&self, player: &str) -> Option<UserId> {
        match &*self.lock_state() {
            Some(bracket) => series::opponent_of(bracket, player),
            None => None,
        }
    }

    /// Human-readable bracket overview.
    pub fn status(&self) -> String {
        match &*self.lock_state() {
            Some(bracket) => series::status_text(bracket),
            None => "No tournament is in progress.".to_string(),
        }
    }

    /// Stop advancement: completed series hold their winners until resume.
    pub fn freeze(&self) -> Result<(), BracketError> {
        {
            let mut state = self.lock_state();
            let bracket = state.as_mut().ok_or(BracketError::NotStarted)?;
            if bracket.frozen {
                return Err(BracketError::AlreadyFrozen);
            }
            bracket.frozen = true;
            log::info!("tournament frozen in round {}", bracket.current_round);
        }
        self.persist()
    }

    /// Unfreeze and place every winner whose advancement was blocked.
    pub fn resume(&self) -> Result<(), BracketError> {
        {
            let mut state = self.lock_state();
            let bracket = state.as_mut().ok_or(BracketError::NotStarted)?;
            if !bracket.frozen {
                return Err(BracketError::NotFrozen);
            }
            bracket.frozen = false;
            series::advance_blocked_winners(bracket);
            log::info!("tournament resumed in round {}", bracket.current_round);
        }
        self.persist()
    }

    /// Clear all state and remove the persisted file.
    pub fn reset(&self) -> Result<(), BracketError> {
        *self.lock_state() = None;
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("tournament reset; removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                log::error!("could not remove {}: {}", self.path.display(), e);
                Err(BracketError::Storage(e.to_string()))
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.lock_state().as_ref().map(|b| b.frozen).unwrap_or(false)
    }

    /// Clone of the in-memory state, for inspection and tests.
    pub fn snapshot(&self) -> Option<Bracket> {
        self.lock_state().clone()
    }

    /// Serialize the current state and replace the file. The writer mutex
    /// queues concurrent callers; the snapshot is taken while holding it, so
    /// the last write always carries the newest state.
    fn persist(&self) -> Result<(), BracketError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = match &*self.lock_state() {
            Some(bracket) => encode_bracket(bracket)?,
            None => return Ok(()),
        };
        write_atomic(&self.path, &snapshot).map_err(|e| {
            log::error!("could not persist tournament to {}: {}", self.path.display(), e);
            BracketError::Storage(e.to_string())
        })
    }
}

fn encode_bracket(b: &Bracket) -> Result<String, BracketError> {
    let storage_err = |e: csv::Error| BracketError::Storage(e.to_string());
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(COLUMN_HEADER).map_err(storage_err)?;
    for m in &b.matches {
        let round = m.round.to_string();
        let match_id = m.match_id.to_string();
        let p1_wins = m.p1_wins.to_string();
        let p2_wins = m.p2_wins.to_string();
        wtr.write_record([
            round.as_str(),
            match_id.as_str(),
            m.p1.as_str(),
            m.p2.as_str(),
            m.p1_display.as_str(),
            m.p2_display.as_str(),
            p1_wins.as_str(),
            p2_wins.as_str(),
            m.status.as_str(),
            m.winner.as_str(),
            m.winner_display.as_str(),
        ])
        .map_err(storage_err)?;
    }
    let body = wtr
        .into_inner()
        .map_err(|e| BracketError::Storage(e.to_string()))?;
    let body = String::from_utf8(body).map_err(|e| BracketError::Storage(e.to_string()))?;
    Ok(format!(
        "# format={},bestOf={},participants={},frozen={}\n{}",
        b.format, b.best_of, b.participants, b.frozen, body
    ))
}

/// Parse a bracket file. Files without the `#` metadata line are accepted by
/// treating the first line as the column header and filling format, series
/// length, and freeze state from `defaults`.
fn decode_bracket(text: &str, defaults: &Defaults) -> Result<Bracket, String> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.is_empty() {
        return Err("empty bracket file".to_string());
    }

    let mut format = defaults.format.clone();
    let mut best_of = defaults.best_of;
    let mut frozen = false;
    let mut participants: Option<u32> = None;

    let body = if let Some(rest) = text.strip_prefix('#') {
        let (meta, body) = rest.split_once('\n').unwrap_or((rest, ""));
        for pair in meta.trim().split(',') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "format" => format = value.to_string(),
                "bestOf" => {
                    best_of = value
                        .parse()
                        .map_err(|_| format!("bad bestOf value {:?}", value))?
                }
                "participants" => {
                    participants = Some(
                        value
                            .parse()
                            .map_err(|_| format!("bad participants value {:?}", value))?,
                    )
                }
                "frozen" => frozen = value == "true",
                _ => {}
            }
        }
        body
    } else {
        text
    };

    let mut matches = Vec::new();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    for record in rdr.records() {
        let record = record.map_err(|e| e.to_string())?;
        if record.len() == 1 && record.get(0).unwrap_or("").trim().is_empty() {
            continue;
        }
        matches.push(parse_match_record(&record)?);
    }
    if matches.is_empty() {
        return Err("no matches in bracket file".to_string());
    }
    matches.sort_by_key(|m| m.match_id);

    let round_one = matches.iter().filter(|m| m.round == 1).count() as u32;
    let participants = participants.unwrap_or(round_one * 2);
    if participants < 2 || !participants.is_power_of_two() {
        return Err(format!("implausible participant count {}", participants));
    }

    let mut bracket = Bracket {
        format,
        participants,
        best_of,
        current_round: 1,
        matches,
        player_to_match: HashMap::new(),
        display_names: HashMap::new(),
        frozen,
    };
    rebuild_indexes(&mut bracket);
    Ok(bracket)
}

fn parse_match_record(record: &csv::StringRecord) -> Result<BracketMatch, String> {
    let field = |i: usize| record.get(i).unwrap_or("").to_string();
    let num = |i: usize| -> Result<u32, String> {
        record
            .get(i)
            .unwrap_or("")
            .trim()
            .parse()
            .map_err(|_| format!("bad number in column {}: {:?}", i + 1, record.get(i)))
    };
    if record.len() >= 11 {
        let status = MatchStatus::parse(record.get(8).unwrap_or(""))
            .ok_or_else(|| format!("bad status {:?}", record.get(8)))?;
        Ok(BracketMatch {
            round: num(0)?,
            match_id: num(1)?,
            p1: field(2),
            p2: field(3),
            p1_display: field(4),
            p2_display: field(5),
            p1_wins: num(6)?,
            p2_wins: num(7)?,
            status,
            winner: field(9),
            winner_display: field(10),
            started_at: None,
        })
    } else if record.len() >= 8 {
        // legacy 8-column record: no display names, identity stands in
        let status = MatchStatus::parse(record.get(6).unwrap_or(""))
            .ok_or_else(|| format!("bad status {:?}", record.get(6)))?;
        Ok(BracketMatch {
            round: num(0)?,
            match_id: num(1)?,
            p1: field(2),
            p2: field(3),
            p1_display: field(2),
            p2_display: field(3),
            p1_wins: num(4)?,
            p2_wins: num(5)?,
            status,
            winner: field(7),
            winner_display: field(7),
            started_at: None,
        })
    } else {
        Err(format!("record has only {} columns", record.len()))
    }
}

/// Rebuild the derived maps and `current_round` after a load.
fn rebuild_indexes(b: &mut Bracket) {
    let mut displays: HashMap<UserId, String> = HashMap::new();
    let mut lookup: HashMap<UserId, u32> = HashMap::new();
    let mut current = 1;
    for m in &b.matches {
        for (id, display) in [
            (&m.p1, &m.p1_display),
            (&m.p2, &m.p2_display),
            (&m.winner, &m.winner_display),
        ] {
            if !id.is_empty() {
                displays.entry(id.clone()).or_insert_with(|| {
                    if display.is_empty() {
                        id.clone()
                    } else {
                        display.clone()
                    }
                });
            }
        }
        match m.status {
            MatchStatus::Active => {
                lookup.insert(m.p1.clone(), m.match_id);
                lookup.insert(m.p2.clone(), m.match_id);
                current = current.max(m.round);
            }
            MatchStatus::Waiting => {
                if !m.p1.is_empty() {
                    lookup.insert(m.p1.clone(), m.match_id);
                }
                if !m.p2.is_empty() {
                    lookup.insert(m.p2.clone(), m.match_id);
                }
            }
            MatchStatus::Complete => current = current.max(m.round),
            MatchStatus::Pending => {}
        }
    }
    b.display_names = displays;
    b.player_to_match = lookup;
    b.current_round = current;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# format=gen1ou,bestOf=20,participants=4,frozen=false
round,matchId,player1,player2,player1Display,player2Display,p1wins,p2wins,status,winner,winnerDisplay
1,1,alice,dave,Alice,Dave,11,7,complete,alice,Alice
1,2,bob,carol,Bob,Carol,5,4,active,,
2,3,alice,,Alice,,0,0,waiting,,
";

    #[test]
    fn decodes_the_documented_example() {
        let b = decode_bracket(SAMPLE, &Defaults::default()).unwrap();
        assert_eq!(b.format, "gen1ou");
        assert_eq!(b.best_of, 20);
        assert_eq!(b.participants, 4);
        assert!(!b.frozen);
        assert_eq!(b.matches.len(), 3);
        assert_eq!(b.matches[0].status, MatchStatus::Complete);
        assert_eq!(b.matches[0].winner, "alice");
        assert_eq!(b.matches[2].status, MatchStatus::Waiting);
        // alice is waiting in match 3; bob and carol are active in match 2
        assert_eq!(b.player_to_match.get("alice"), Some(&3));
        assert_eq!(b.player_to_match.get("bob"), Some(&2));
        assert_eq!(b.player_to_match.get("dave"), None);
        assert_eq!(b.display_names.get("dave"), Some(&"Dave".to_string()));
        assert_eq!(b.current_round, 1);
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let b = decode_bracket(SAMPLE, &Defaults::default()).unwrap();
        let encoded = encode_bracket(&b).unwrap();
        let again = decode_bracket(&encoded, &Defaults::default()).unwrap();
        assert_eq!(b, again);
    }

    #[test]
    fn accepts_legacy_headerless_files() {
        let legacy = "\
round,matchId,player1,player2,p1wins,p2wins,status,winner
1,1,alice,dave,11,7,complete,alice
1,2,bob,carol,5,4,active,
2,3,alice,,0,0,waiting,
";
        let defaults = Defaults {
            format: "gen2ou".to_string(),
            best_of: 7,
            ..Defaults::default()
        };
        let b = decode_bracket(legacy, &defaults).unwrap();
        assert_eq!(b.format, "gen2ou");
        assert_eq!(b.best_of, 7);
        assert_eq!(b.participants, 4);
        // identity copied into the display slot
        assert_eq!(b.matches[0].p1_display, "alice");
        assert_eq!(b.matches[0].winner_display, "alice");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_bracket("", &Defaults::default()).is_err());
        assert!(decode_bracket("not,a,bracket\n1,2,3\n", &Defaults::default()).is_err());
        let bad_status = "\
# format=f,bestOf=3,participants=2,frozen=false
round,matchId,player1,player2,player1Display,player2Display,p1wins,p2wins,status,winner,winnerDisplay
1,1,a,b,A,B,0,0,bogus,,
";
        assert!(decode_bracket(bad_status, &Defaults::default()).is_err());
    }

    #[test]
    fn frozen_flag_round_trips() {
        let mut b = decode_bracket(SAMPLE, &Defaults::default()).unwrap();
        b.frozen = true;
        let encoded = encode_bracket(&b).unwrap();
        assert!(encoded.starts_with("# format=gen1ou,bestOf=20,participants=4,frozen=true\n"));
        assert!(decode_bracket(&encoded, &Defaults::default()).unwrap().frozen);
    }
}
