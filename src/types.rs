//! Common types used throughout songplay-etl
//!
//! This module contains the table catalog of the star schema, column names,
//! and small enums shared by configuration and output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page tag that marks a song playback event
pub const DEFAULT_PLAYBACK_PAGE: &str = "NextSong";

// ============================================================================
// Output Tables
// ============================================================================

/// The five tables of the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Songs dimension
    Songs,
    /// Artists dimension
    Artists,
    /// Users dimension
    Users,
    /// Time dimension
    Time,
    /// Songplays fact table
    Songplays,
}

impl Table {
    /// All tables in write order
    pub const ALL: [Table; 5] = [
        Table::Songs,
        Table::Artists,
        Table::Users,
        Table::Time,
        Table::Songplays,
    ];

    /// Sub-path of the table under the output root
    pub fn name(self) -> &'static str {
        match self {
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Users => "users",
            Table::Time => "time",
            Table::Songplays => "songplays",
        }
    }

    /// Columns the table is partitioned by, outermost first
    pub fn partition_columns(self) -> &'static [&'static str] {
        match self {
            Table::Songs => &[columns::YEAR, columns::ARTIST_ID],
            Table::Time | Table::Songplays => &[columns::YEAR, columns::MONTH],
            Table::Artists | Table::Users => &[],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Column Names
// ============================================================================

/// Column names of the raw records and of the output tables
pub mod columns {
    // Catalog records
    pub const SONG_ID: &str = "song_id";
    pub const TITLE: &str = "title";
    pub const DURATION: &str = "duration";
    pub const YEAR: &str = "year";
    pub const ARTIST_ID: &str = "artist_id";
    pub const ARTIST_NAME: &str = "artist_name";
    pub const ARTIST_LOCATION: &str = "artist_location";
    pub const ARTIST_LATITUDE: &str = "artist_latitude";
    pub const ARTIST_LONGITUDE: &str = "artist_longitude";
    pub const NUM_SONGS: &str = "num_songs";

    // Event records
    pub const ARTIST: &str = "artist";
    pub const AUTH: &str = "auth";
    pub const FIRST_NAME_RAW: &str = "firstName";
    pub const GENDER: &str = "gender";
    pub const ITEM_IN_SESSION: &str = "itemInSession";
    pub const LAST_NAME_RAW: &str = "lastName";
    pub const LENGTH: &str = "length";
    pub const LEVEL: &str = "level";
    pub const LOCATION: &str = "location";
    pub const METHOD: &str = "method";
    pub const PAGE: &str = "page";
    pub const REGISTRATION: &str = "registration";
    pub const SESSION_ID_RAW: &str = "sessionId";
    pub const SONG: &str = "song";
    pub const STATUS: &str = "status";
    pub const TS: &str = "ts";
    pub const USER_AGENT_RAW: &str = "userAgent";
    pub const USER_ID_RAW: &str = "userId";

    // Output tables
    pub const NAME: &str = "name";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const USER_ID: &str = "user_id";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const START_TIME: &str = "start_time";
    pub const HOUR: &str = "hour";
    pub const DAY: &str = "day";
    pub const WEEK: &str = "week";
    pub const MONTH: &str = "month";
    pub const WEEKDAY: &str = "weekday";
    pub const SESSION_ID: &str = "session_id";
    pub const USER_AGENT: &str = "user_agent";
}

// ============================================================================
// Compression
// ============================================================================

/// Parquet compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    Gzip,
    None,
}

impl From<Compression> for parquet::basic::Compression {
    fn from(codec: Compression) -> Self {
        match codec {
            Compression::Snappy => parquet::basic::Compression::SNAPPY,
            Compression::Zstd => {
                parquet::basic::Compression::ZSTD(parquet::basic::ZstdLevel::default())
            }
            Compression::Gzip => {
                parquet::basic::Compression::GZIP(parquet::basic::GzipLevel::default())
            }
            Compression::None => parquet::basic::Compression::UNCOMPRESSED,
        }
    }
}
