//! Album type derived from the tracks in the library.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Playlist, Track};

/// An album assembled from tagged tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    /// Album name.
    pub name: String,
    /// Artist who made the album.
    pub album_artist: String,
    /// Release year, taken from the first track that has one.
    pub release_year: Option<String>,
    /// Album art, taken from the first track that has one.
    pub album_art: Option<PathBuf>,
    /// Songs ordered by track number.
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn new(name: impl Into<String>, album_artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            album_artist: album_artist.into(),
            release_year: None,
            album_art: None,
            tracks: Vec::new(),
        }
    }

    /// Group tracks into albums keyed by album name and album artist.
    ///
    /// Albums come out in the order they were first seen; songs inside an
    /// album are sorted by track number (stable, so untagged songs keep
    /// their library order). Tracks without an album tag are skipped.
    pub fn group(tracks: impl IntoIterator<Item = Track>) -> Vec<Self> {
        let mut albums: Vec<Self> = Vec::new();

        for track in tracks {
            if track.album().is_empty() {
                continue;
            }

            let index = albums
                .iter()
                .position(|a| a.name == track.album() && a.album_artist == track.effective_album_artist())
                .unwrap_or_else(|| {
                    albums.push(Self::new(track.album(), track.effective_album_artist()));
                    albums.len() - 1
                });

            let album = &mut albums[index];
            if album.release_year.is_none() && !track.year().is_empty() {
                album.release_year = Some(track.year().to_string());
            }
            if album.album_art.is_none() {
                album.album_art = track.album_art().map(PathBuf::from);
            }
            album.tracks.push(track);
        }

        for album in &mut albums {
            album.tracks.sort_by_key(Track::track_number);
        }

        albums
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Build a playlist so the album can be handed to the player.
    pub fn to_playlist(&self) -> Playlist {
        Playlist::new(self.name.clone(), self.tracks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, album: &str, artist: &str, number: u32) -> Track {
        Track::new(title, format!("/music/{title}.mp3"))
            .with_artist(artist)
            .with_album(album, "")
            .with_position(number, 3)
    }

    #[test]
    fn test_group_by_album() {
        let albums = Album::group(vec![
            song("b", "First", "Band", 2),
            song("x", "Second", "Other", 1),
            song("a", "First", "Band", 1),
            Track::new("loose", "/music/loose.mp3"),
        ]);

        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].name, "First");
        assert_eq!(albums[0].album_artist, "Band");
        let titles: Vec<&str> = albums[0].tracks.iter().map(Track::title).collect();
        assert_eq!(titles, ["a", "b"]);
        assert_eq!(albums[1].len(), 1);
    }

    #[test]
    fn test_same_name_different_artist() {
        let albums = Album::group(vec![
            song("a", "Greatest Hits", "One", 1),
            song("b", "Greatest Hits", "Two", 1),
        ]);
        assert_eq!(albums.len(), 2);
    }

    #[test]
    fn test_album_metadata_and_playlist() {
        let albums = Album::group(vec![
            song("a", "LP", "Band", 1),
            song("b", "LP", "Band", 2).with_year("1999").with_album_art("/art/lp.jpg"),
        ]);
        let album = albums.first().unwrap();
        assert_eq!(album.release_year.as_deref(), Some("1999"));
        assert!(album.album_art.is_some());

        let playlist = album.to_playlist();
        assert_eq!(playlist.name(), "LP");
        assert_eq!(playlist.get(0).unwrap().title(), "a");
    }
}
