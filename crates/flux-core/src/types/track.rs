//! Track type representing a single song file in the library.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single playable song.
///
/// Tracks are produced by the metadata reader and never change afterwards,
/// so fields are only exposed through accessors. The player only looks at
/// [`Track::file_name`]; everything else is descriptive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", default)]
pub struct Track {
    title: String,
    artist: String,
    album: String,
    album_artist: String,
    /// Position of the track on its album.
    track_number: u32,
    /// Number of tracks on the album.
    track_total: u32,
    /// Path to the album art image, if one was extracted.
    album_art: Option<PathBuf>,
    genre: String,
    year: String,
    publisher: String,
    /// Full path to the audio file.
    file_name: PathBuf,
}

impl Track {
    pub fn new(title: impl Into<String>, file_name: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>, album_artist: impl Into<String>) -> Self {
        self.album = album.into();
        self.album_artist = album_artist.into();
        self
    }

    #[must_use]
    pub const fn with_position(mut self, track_number: u32, track_total: u32) -> Self {
        self.track_number = track_number;
        self.track_total = track_total;
        self
    }

    #[must_use]
    pub fn with_album_art(mut self, path: impl Into<PathBuf>) -> Self {
        self.album_art = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    #[must_use]
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = year.into();
        self
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn album_artist(&self) -> &str {
        &self.album_artist
    }

    pub const fn track_number(&self) -> u32 {
        self.track_number
    }

    pub const fn track_total(&self) -> u32 {
        self.track_total
    }

    pub fn album_art(&self) -> Option<&Path> {
        self.album_art.as_deref()
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Path of the audio file backing this track.
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Album artist if tagged, otherwise the track artist.
    pub fn effective_album_artist(&self) -> &str {
        if self.album_artist.is_empty() {
            &self.artist
        } else {
            &self.album_artist
        }
    }

    /// "Artist - Title", or just the title when no artist is tagged.
    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}
