//! Playlist type representing an ordered collection of tracks.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Track;

/// A user playlist.
///
/// Song order is fixed when the playlist is built. The player keeps its own
/// cursor into it and never reorders or edits the songs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            tracks,
        }
    }

    /// Rebuild a stored playlist with its original id and creation time.
    pub fn restore(id: Uuid, name: impl Into<String>, created_at: DateTime<Utc>, tracks: Vec<Track>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at,
            tracks,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Index of the first occurrence of `track`.
    pub fn position_of(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t == track)
    }

    /// Track at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Subtitle text, e.g. "12 songs".
    pub fn subtitle(&self) -> String {
        let count = self.tracks.len();
        let songs = if count == 1 { "song" } else { "songs" };
        format!("{count} {songs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_track(id: &str) -> Track {
        Track::new(format!("Track {id}"), format!("/music/{id}.mp3"))
    }

    #[test]
    fn test_playlist_creation() {
        let playlist = Playlist::new("Road trip", vec![make_track("1"), make_track("2")]);
        assert_eq!(playlist.name(), "Road trip");
        assert_eq!(playlist.len(), 2);
        assert!(!playlist.is_empty());
        assert_eq!(playlist.subtitle(), "2 songs");
    }

    #[test]
    fn test_playlist_lookups() {
        let playlist = Playlist::new("Mix", vec![make_track("1"), make_track("2"), make_track("3")]);
        assert_eq!(playlist.position_of(&make_track("3")), Some(2));
        assert_eq!(playlist.position_of(&make_track("9")), None);
        assert_eq!(playlist.get(1).unwrap().title(), "Track 2");
        assert!(playlist.get(3).is_none());
    }

    #[test]
    fn test_restore_keeps_identity() {
        let original = Playlist::new("Saved", vec![make_track("1")]);
        let json = serde_json::to_string(&original).unwrap();
        let restored: Playlist = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);

        let rebuilt = Playlist::restore(original.id(), "Saved", original.created_at(), vec![]);
        assert_eq!(rebuilt.id(), original.id());
        assert_eq!(rebuilt.subtitle(), "0 songs");
    }
}
