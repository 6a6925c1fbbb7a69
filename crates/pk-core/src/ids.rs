//! Deterministic catalog identifiers.
//!
//! A [`MovieId`] is a UUID v5 over the file's path relative to its media
//! root. Scanning an unchanged tree twice yields the same identifiers, so
//! they are safe to embed in bookmarkable URLs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;
use uuid::Uuid;

/// Namespace for v5 movie identifiers.
const MOVIE_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_44a2_9c3b_5e07_a18f_2c4d_7b90_e315);

/// Identifier of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(Uuid);

impl MovieId {
    /// Derive the identifier for a path relative to its media root.
    ///
    /// Separators are normalised to `/` and `.` components dropped, so
    /// `a/./b.mkv` and `a\b.mkv` (on Windows) map to the same id.
    #[must_use]
    pub fn from_relative_path(relative: &Path) -> Self {
        let key = normalized_key(relative);
        Self(Uuid::new_v5(&MOVIE_NAMESPACE, key.as_bytes()))
    }

    /// Return the inner UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// Join the normal components of `relative` with `/`.
pub fn normalized_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MovieId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<MovieId> for Uuid {
    fn from(id: MovieId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_same_id() {
        let a = MovieId::from_relative_path(Path::new("sci-fi/Alien (1979).mkv"));
        let b = MovieId::from_relative_path(Path::new("sci-fi/Alien (1979).mkv"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_differ() {
        let a = MovieId::from_relative_path(Path::new("a/movie.mkv"));
        let b = MovieId::from_relative_path(Path::new("b/movie.mkv"));
        assert_ne!(a, b);
    }

    #[test]
    fn curdir_components_ignored() {
        let a = MovieId::from_relative_path(Path::new("./a/./movie.mp4"));
        let b = MovieId::from_relative_path(Path::new("a/movie.mp4"));
        assert_eq!(a, b);
    }

    #[test]
    fn is_version_5() {
        let id = MovieId::from_relative_path(Path::new("movie.mp4"));
        assert_eq!(id.as_uuid().get_version_num(), 5);
    }

    #[test]
    fn display_and_from_str() {
        let id = MovieId::from_relative_path(Path::new("Heat.1995.mkv"));
        let parsed: MovieId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<MovieId>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id = MovieId::from_relative_path(Path::new("x.mkv"));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
