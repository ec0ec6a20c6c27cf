//! Per-format rating ladders: lazily loaded TSV files plus a process-wide
//! registry.
//!
//! The whole ladder is rewritten on every update. A save attempted while a
//! previous one is still writing is dropped; the next update saves again, so
//! the file converges on the newest state.

use crate::logic::{glicko, rating};
use crate::models::{
    to_user_id, Gxe, LadderEntry, LadderError, Outcome, STARTING_ELO, STARTING_GLICKO,
};
use crate::storage::write_atomic;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Exact TSV header line (without the line terminator).
pub const LADDER_HEADER: &str =
    "Elo\tUsername\tW\tL\tT\tGlicko\tRating_Deviation\tGXE\tGames_Played\tLast_update\tH2H_Data";

/// Ladder rows shown by the toplist before it cuts off.
const TOP_LIMIT: usize = 500;

/// Receives the human-readable rating change lines for a battle room.
pub trait MessageSink {
    fn add_line(&mut self, line: String);
}

impl MessageSink for Vec<String> {
    fn add_line(&mut self, line: String) {
        self.push(line);
    }
}

/// One format's ladder, backed by a TSV file under the store directory.
pub struct LadderStore {
    format: String,
    path: PathBuf,
    entries: Mutex<Option<Vec<LadderEntry>>>,
    saving: AtomicBool,
}

impl LadderStore {
    /// A store for `format` under `dir`. The format id is canonicalized and
    /// names the file, e.g. `gen1ou.tsv`.
    pub fn new(dir: &Path, format: &str) -> Self {
        let key = to_user_id(format);
        let path = dir.join(format!("{}.tsv", key));
        Self {
            format: key,
            path,
            entries: Mutex::new(None),
            saving: AtomicBool::new(false),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    fn lock_entries(&self) -> MutexGuard<'_, Option<Vec<LadderEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the ladder, ordered by ELO descending. Loads from disk on
    /// first access and keeps the rows cached.
    pub fn entries(&self) -> Vec<LadderEntry> {
        let mut guard = self.lock_entries();
        guard.get_or_insert_with(|| self.load_from_disk()).clone()
    }

    /// The player's current ELO, or 1000 when they have no row.
    pub fn rating(&self, name: &str) -> f64 {
        self.rating_cached(name, None)
    }

    /// Like [`rating`](Self::rating), memoized through an optional per-user
    /// cache keyed by format (a slot on a live user object).
    pub fn rating_cached(&self, name: &str, cache: Option<&mut HashMap<String, f64>>) -> f64 {
        let id = to_user_id(name);
        match cache {
            Some(cache) => {
                if let Some(&elo) = cache.get(&self.format) {
                    return elo;
                }
                let elo = self.lookup_elo(&id);
                cache.insert(self.format.clone(), elo);
                elo
            }
            None => self.lookup_elo(&id),
        }
    }

    fn lookup_elo(&self, id: &str) -> f64 {
        let mut guard = self.lock_entries();
        let entries = guard.get_or_insert_with(|| self.load_from_disk());
        entries
            .iter()
            .find(|e| e.user_id == id)
            .map(|e| e.elo)
            .unwrap_or(STARTING_ELO)
    }

    /// Record a finished battle: update both rows (creating them as needed),
    /// restore the ladder order, persist, and append one change line per
    /// player to `room`.
    ///
    /// `p1_score` is p1's result in [0, 1]; negative marks a
    /// scored-invalidated battle (both sides get 0). Returns
    /// (p1 score used, p1 new ELO, p2 new ELO). Battle-end path: save
    /// failures are logged, never raised.
    pub fn update_rating(
        &self,
        p1_name: &str,
        p2_name: &str,
        p1_score: f64,
        room: &mut dyn MessageSink,
    ) -> (f64, f64, f64) {
        let id1 = to_user_id(p1_name);
        let id2 = to_user_id(p2_name);
        if id1.is_empty() || id2.is_empty() || id1 == id2 {
            log::warn!("unrateable battle between {:?} and {:?}", p1_name, p2_name);
            return (p1_score.max(0.0), self.rating(p1_name), self.rating(p2_name));
        }

        let snapshot;
        let result;
        {
            let mut guard = self.lock_entries();
            let entries = guard.get_or_insert_with(|| self.load_from_disk());
            let i1 = find_or_insert(entries, &id1, p1_name);
            let i2 = find_or_insert(entries, &id2, p2_name);
            let old1 = entries[i1].elo;
            let old2 = entries[i2].elo;

            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            let (s1, new1, new2) = {
                let (p1, p2) = pair_mut(entries, i1, i2);
                rating::apply_battle(p1, p2, p1_score, &stamp)
            };
            let s2 = if p1_score < 0.0 { 0.0 } else { 1.0 - s1 };
            room.add_line(change_line(&entries[i1].display_name, old1, new1, s1));
            room.add_line(change_line(&entries[i2].display_name, old2, new2, s2));

            let new_i1 = reposition(entries, i1);
            let i2 = adjust_index(i2, i1, new_i1);
            reposition(entries, i2);

            snapshot = encode_ladder(entries);
            result = (s1, new1, new2);
        }
        self.save(&snapshot);
        result
    }

    /// The toplist as an HTML table, optionally filtered to ids starting
    /// with `prefix`.
    pub fn top_html(&self, prefix: Option<&str>) -> String {
        let prefix_id = prefix.map(to_user_id).unwrap_or_default();
        let mut out = String::from(
            "<table>\n<tr><th>Rank</th><th>Username</th><th>Elo</th><th>GXE</th>\
             <th>Glicko-1</th><th>W</th><th>L</th><th>T</th></tr>\n",
        );
        let mut shown = 0;
        for (rank, e) in self.entries().iter().enumerate() {
            if !prefix_id.is_empty() && !e.user_id.starts_with(&prefix_id) {
                continue;
            }
            shown += 1;
            if shown > TOP_LIMIT {
                break;
            }
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{:.0}</td><td>{}</td>\
                 <td>{:.1} &plusmn; {:.1}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                rank + 1,
                escape_html(&e.display_name),
                e.elo,
                gxe_cell(e.gxe),
                e.glicko,
                e.rd,
                e.w,
                e.l,
                e.t
            ));
        }
        out.push_str("</table>");
        out
    }

    /// A single HTML row summarizing this format's ratings for one player,
    /// or an empty string when they have no row.
    pub fn user_html(&self, name: &str) -> String {
        let id = to_user_id(name);
        let entries = self.entries();
        let Some(e) = entries.iter().find(|e| e.user_id == id) else {
            return String::new();
        };
        format!(
            "<tr><td>{}</td><td><strong>{:.0}</strong></td><td>{}</td>\
             <td>{:.1} &plusmn; {:.1}</td><td>{}-{}-{}</td></tr>",
            self.format,
            e.elo,
            gxe_cell(e.gxe),
            e.glicko,
            e.rd,
            e.w,
            e.l,
            e.t
        )
    }

    fn load_from_disk(&self) -> Vec<LadderEntry> {
        match fs::read_to_string(&self.path) {
            Ok(text) => decode_ladder(&text, &self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                log::warn!("could not read ladder {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn save(&self, contents: &str) {
        if self.saving.swap(true, Ordering::SeqCst) {
            // a save is already writing; the next update carries this state
            return;
        }
        if let Err(e) = self.write_file(contents) {
            log::error!("{}", e);
        }
        self.saving.store(false, Ordering::SeqCst);
    }

    fn write_file(&self, contents: &str) -> Result<(), LadderError> {
        write_atomic(&self.path, contents)
            .map_err(|e| LadderError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

/// Process-wide registry: one shared [`LadderStore`] per format id.
pub struct LadderRegistry {
    root: PathBuf,
    stores: RwLock<HashMap<String, Arc<LadderStore>>>,
}

impl LadderRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// The store for `format`, created on first access. Concurrent callers
    /// observe the same instance.
    pub fn get(&self, format: &str) -> Arc<LadderStore> {
        let key = to_user_id(format);
        {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(store) = stores.get(&key) {
                return store.clone();
            }
        }
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(key.clone())
            .or_insert_with(|| Arc::new(LadderStore::new(&self.root, &key)))
            .clone()
    }
}

fn change_line(display: &str, old_elo: f64, new_elo: f64, score: f64) -> String {
    let delta = new_elo - old_elo;
    let sign = if delta >= 0.0 { "+" } else { "" };
    format!(
        "{}'s rating: {:.0} -> {:.0} ({} the battle, {}{:.0})",
        display,
        old_elo,
        new_elo,
        Outcome::from_score(score).label(),
        sign,
        delta
    )
}

fn gxe_cell(gxe: Gxe) -> String {
    match gxe {
        Gxe::Percent(p) => format!("{:.1}%", p),
        Gxe::Unknown => "&ndash;".to_string(),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Index of the player's row, inserting a fresh one at the bottom when they
/// have none. Refreshes the stored display name.
fn find_or_insert(entries: &mut Vec<LadderEntry>, id: &str, display: &str) -> usize {
    match entries.iter().position(|e| e.user_id == id) {
        Some(i) => {
            entries[i].display_name = display.trim().to_string();
            i
        }
        None => {
            entries.push(LadderEntry::new(id.to_string(), display.trim()));
            entries.len() - 1
        }
    }
}

/// Disjoint mutable references to two rows.
fn pair_mut(
    entries: &mut [LadderEntry],
    i: usize,
    j: usize,
) -> (&mut LadderEntry, &mut LadderEntry) {
    if i < j {
        let (head, tail) = entries.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = entries.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

/// Move the row at `index` to its sorted position: scan up past rows rated
/// at or below it, then down past rows rated above it, and splice. Returns
/// the new index.
fn reposition(entries: &mut Vec<LadderEntry>, index: usize) -> usize {
    let elo = entries[index].elo;
    let mut new_index = index;
    while new_index > 0 && entries[new_index - 1].elo <= elo {
        new_index -= 1;
    }
    while new_index + 1 < entries.len() && entries[new_index + 1].elo > elo {
        new_index += 1;
    }
    if new_index != index {
        let row = entries.remove(index);
        entries.insert(new_index, row);
    }
    new_index
}

/// Where `index` ended up after another row moved from `removed` to
/// `inserted`.
fn adjust_index(index: usize, removed: usize, inserted: usize) -> usize {
    let mut index = index;
    if removed < index {
        index -= 1;
    }
    if inserted <= index {
        index += 1;
    }
    index
}

fn encode_ladder(entries: &[LadderEntry]) -> String {
    let mut out = String::with_capacity(64 * (entries.len() + 1));
    out.push_str(LADDER_HEADER);
    out.push_str("\r\n");
    for e in entries {
        let h2h = serde_json::to_string(&e.h2h).unwrap_or_else(|_| "{}".to_string());
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\r\n",
            e.elo,
            e.display_name,
            e.w,
            e.l,
            e.t,
            e.glicko,
            e.rd,
            e.gxe,
            e.games,
            e.last_update,
            h2h
        ));
    }
    out
}

fn decode_ladder(text: &str, path: &Path) -> Vec<LadderEntry> {
    let mut out = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if lineno == 0 && line.starts_with("Elo\t") {
            continue;
        }
        match decode_row(line) {
            Some(entry) => out.push(entry),
            None => log::warn!(
                "{}: skipping unreadable ladder row {}",
                path.display(),
                lineno + 1
            ),
        }
    }
    out
}

fn decode_row(line: &str) -> Option<LadderEntry> {
    let f: Vec<&str> = line.split('\t').collect();
    if f.len() >= 9 {
        let name = f[1].trim();
        let h2h = match f.get(10) {
            Some(raw) if !raw.trim().is_empty() => match serde_json::from_str(raw) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("resetting head-to-head data for {}: {}", name, e);
                    HashMap::new()
                }
            },
            _ => HashMap::new(),
        };
        Some(LadderEntry {
            user_id: to_user_id(name),
            elo: f[0].trim().parse().ok()?,
            display_name: name.to_string(),
            w: f[2].trim().parse().ok()?,
            l: f[3].trim().parse().ok()?,
            t: f[4].trim().parse().ok()?,
            glicko: f[5].trim().parse().ok()?,
            rd: f[6].trim().parse().ok()?,
            gxe: Gxe::parse(f[7].trim())?,
            games: f[8].trim().parse().ok()?,
            last_update: f.get(9).map(|s| s.to_string()).unwrap_or_default(),
            h2h,
        })
    } else if f.len() >= 5 {
        // legacy 5-column row: Elo, Username, W, L, T
        let name = f[1].trim();
        let w: u32 = f[2].trim().parse().ok()?;
        let l: u32 = f[3].trim().parse().ok()?;
        let t: u32 = f[4].trim().parse().ok()?;
        let games = w + l + t;
        let rd = (130.0 - 2.0 * games as f64).max(30.0);
        Some(LadderEntry {
            user_id: to_user_id(name),
            elo: f[0].trim().parse().ok()?,
            display_name: name.to_string(),
            w,
            l,
            t,
            glicko: STARTING_GLICKO,
            rd,
            gxe: glicko::gxe(STARTING_GLICKO, rd),
            games,
            last_update: String::new(),
            h2h: HashMap::new(),
        })
    } else {
        None
    }
}
