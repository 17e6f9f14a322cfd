// Demon and player records as stored in the collections, plus the request
// shapes that create and patch them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::scoring::{is_qualifying, FULL_PROGRESS};

pub const DEFAULT_AVATAR: &str = "👤";
const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/240x135/333333/ffffff?text=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demon {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub creator: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub image: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub video_url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    /// Absent on records written without one; never invented on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub avatar: String,
    /// Demon ids with progress of at least 51%, in the order they qualified.
    #[serde(default, deserialize_with = "lenient::id_list")]
    pub completed_demons: Vec<String>,
    /// Latest recorded percentage per demon id.
    #[serde(default, deserialize_with = "lenient::progress_map")]
    pub progress: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Deserializers that accept what older writers left in the collection files:
/// `null` for empty fields and fractional or quoted progress numbers.
mod lenient {
    use std::collections::BTreeMap;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
    }

    pub fn id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
    }

    /// Whole percentages; fractions are floored.
    pub fn percentage(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.floor() as i64),
            _ => None,
        }
    }

    pub fn progress_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, i64>, D::Error> {
        let raw = Option::<BTreeMap<String, Value>>::deserialize(d)?.unwrap_or_default();
        let mut progress = BTreeMap::new();
        for (id, value) in raw {
            match percentage(&value) {
                Some(p) => {
                    progress.insert(id, p);
                }
                None => {
                    return Err(D::Error::custom(format!(
                        "progress for {id} is not a number: {value}"
                    )))
                }
            }
        }
        Ok(progress)
    }
}

// ── Request types ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDemon {
    pub name: Option<String>,
    pub creator: Option<String>,
    pub image: Option<String>,
    pub video_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemonUpdate {
    pub name: Option<String>,
    pub creator: Option<String>,
    pub image: Option<String>,
    pub video_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub completed_demons: Option<Vec<String>>,
    pub progress: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub demon_id: Option<String>,
    pub progress: Option<i64>,
}

// ── Ids ───────────────────────────────────────────────────────────────

/// Millisecond stamp of the last id handed out by this process.
static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Time-based id such as `demon_1718000000000`. Strictly increasing within a
/// process, so two creates in the same millisecond still get distinct ids.
pub fn next_id(prefix: &str) -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ID_MILLIS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID_MILLIS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return format!("{prefix}_{candidate}"),
            Err(actual) => last = actual,
        }
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Percent-encode a string the way `encodeURIComponent` does.
fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Progress is a whole percentage in 0..=100.
pub fn validate_progress(progress: i64) -> Result<(), AppError> {
    if !(0..=FULL_PROGRESS).contains(&progress) {
        return Err(AppError::validation("Progress must be between 0 and 100"));
    }
    Ok(())
}

// ── Demon ─────────────────────────────────────────────────────────────

impl Demon {
    pub fn new(req: NewDemon, now: DateTime<Utc>) -> Result<Self, AppError> {
        let (Some(name), Some(creator)) = (required(req.name), required(req.creator)) else {
            return Err(AppError::validation("Name and creator are required"));
        };
        let image = required(req.image)
            .unwrap_or_else(|| format!("{PLACEHOLDER_IMAGE}{}", encode_component(&name)));
        Ok(Demon {
            id: next_id("demon"),
            name,
            creator,
            image,
            video_url: req.video_url.unwrap_or_default(),
            description: req.description.unwrap_or_default(),
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Overwrite the provided fields and refresh `updated_at`.
    pub fn apply(&mut self, update: DemonUpdate, now: DateTime<Utc>) -> Result<(), AppError> {
        if update.name.as_deref() == Some("") || update.creator.as_deref() == Some("") {
            return Err(AppError::validation("Name and creator cannot be empty"));
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(creator) = update.creator {
            self.creator = creator;
        }
        if let Some(image) = update.image {
            self.image = image;
        }
        if let Some(video_url) = update.video_url {
            self.video_url = video_url;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        self.updated_at = Some(now);
        Ok(())
    }
}

// ── Player ────────────────────────────────────────────────────────────

impl Player {
    pub fn new(req: NewPlayer, now: DateTime<Utc>) -> Result<Self, AppError> {
        let Some(name) = required(req.name) else {
            return Err(AppError::validation("Name is required"));
        };
        let progress = req.progress.unwrap_or_default();
        for value in progress.values() {
            validate_progress(*value)?;
        }

        // Keep the completed list in lockstep with the initial progress map.
        let mut completed_demons: Vec<String> = Vec::new();
        for id in req.completed_demons.unwrap_or_default() {
            let qualifies = progress.get(&id).map_or(true, |p| is_qualifying(*p));
            if qualifies && !id.is_empty() && !completed_demons.contains(&id) {
                completed_demons.push(id);
            }
        }
        for (id, value) in &progress {
            if is_qualifying(*value) && !completed_demons.contains(id) {
                completed_demons.push(id.clone());
            }
        }

        Ok(Player {
            id: next_id("player"),
            name,
            avatar: required(req.avatar).unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            completed_demons,
            progress,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    pub fn apply(&mut self, update: PlayerUpdate, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(name) = update.name {
            if name.is_empty() {
                return Err(AppError::validation("Name cannot be empty"));
            }
            self.name = name;
        }
        if let Some(avatar) = update.avatar {
            self.avatar = avatar;
        }
        self.updated_at = Some(now);
        Ok(())
    }

    /// Record `progress` percent on `demon_id`.
    ///
    /// Qualifying progress (>= 51) appends the demon to `completed_demons` if it
    /// is not already there; lower progress removes it. The progress map is then
    /// overwritten unconditionally, so list membership always mirrors the latest
    /// value. Nothing is modified when validation fails.
    pub fn record_progress(
        &mut self,
        demon_id: &str,
        progress: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if demon_id.is_empty() {
            return Err(AppError::validation("Demon ID and progress are required"));
        }
        validate_progress(progress)?;

        let listed = self.completed_demons.iter().any(|id| id == demon_id);
        if is_qualifying(progress) && !listed {
            self.completed_demons.push(demon_id.to_string());
        }
        if !is_qualifying(progress) && listed {
            self.completed_demons.retain(|id| id != demon_id);
        }
        self.progress.insert(demon_id.to_string(), progress);
        self.updated_at = Some(now);
        Ok(())
    }

    /// Recorded progress for a completed demon. Completions without an entry
    /// count as full clears.
    pub fn progress_for(&self, demon_id: &str) -> i64 {
        self.progress.get(demon_id).copied().unwrap_or(FULL_PROGRESS)
    }
}
