//! Startup configuration: tournament defaults for auto-creation and legacy
//! file loading.

use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;

/// Tournament defaults consumed by `load_or_initialize` when no persisted
/// bracket exists, and by the legacy loader for fields old files omit.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Defaults {
    pub format: String,
    pub best_of: u32,
    /// Entrant count for auto-created tournaments; 0 means "use the whole
    /// player list".
    pub participants: u32,
    pub player_list: Vec<String>,
    pub randomize_seeding: bool,
    /// Create a tournament from this config at startup when none is on disk.
    pub auto_init: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            format: "gen1ou".to_string(),
            best_of: 3,
            participants: 0,
            player_list: Vec::new(),
            randomize_seeding: false,
            auto_init: false,
        }
    }
}

impl Defaults {
    /// The entrant list for auto-creation: the first `participants` names
    /// when that is set and satisfiable, the whole list otherwise.
    pub fn entrants(&self) -> &[String] {
        let n = self.participants as usize;
        if n > 0 && n <= self.player_list.len() {
            &self.player_list[..n]
        } else {
            &self.player_list
        }
    }
}

/// Load defaults from a JSON file. A missing file is normal and yields the
/// built-in defaults; unreadable or malformed files warn and do the same.
pub fn load_defaults(path: &Path) -> Defaults {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Defaults::default(),
        Err(e) => {
            log::warn!("could not read config {}: {}", path.display(), e);
            return Defaults::default();
        }
    };
    match serde_json::from_str(&text) {
        Ok(defaults) => defaults,
        Err(e) => {
            log::warn!("could not parse config {}: {}", path.display(), e);
            Defaults::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_fields() {
        let d: Defaults = serde_json::from_str(
            r#"{"format":"gen3ou","bestOf":5,"participants":2,
                "playerList":["A","B","C"],"randomizeSeeding":true,"autoInit":true}"#,
        )
        .unwrap();
        assert_eq!(d.format, "gen3ou");
        assert_eq!(d.best_of, 5);
        assert!(d.randomize_seeding);
        assert!(d.auto_init);
        assert_eq!(d.entrants(), &["A".to_string(), "B".to_string()][..]);
    }

    #[test]
    fn zero_participants_means_whole_list() {
        let d = Defaults {
            player_list: vec!["A".into(), "B".into()],
            ..Defaults::default()
        };
        assert_eq!(d.entrants().len(), 2);
    }
}
