//! Event pipeline: users and time dimensions, songplays fact

use super::calendar::CalendarColumns;
use crate::error::{Error, Result};
use crate::frame::{Frame, JoinSpec, SqlEngine};
use crate::output::{TableWriteSummary, TableWriter};
use crate::types::columns::{
    ARTIST, ARTIST_ID, ARTIST_NAME, DAY, DURATION, FIRST_NAME, FIRST_NAME_RAW, GENDER, HOUR,
    LAST_NAME, LAST_NAME_RAW, LENGTH, LEVEL, LOCATION, MONTH, PAGE, SESSION_ID, SESSION_ID_RAW,
    SONG, SONG_ID, START_TIME, TITLE, TS, USER_AGENT, USER_AGENT_RAW, USER_ID, USER_ID_RAW, WEEK,
    WEEKDAY, YEAR,
};
use crate::types::Table;
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Int64Type};
use tracing::{info, warn};

/// Tables derived from event records
#[derive(Debug, Clone)]
pub struct EventTables {
    pub users: Frame,
    pub time: Frame,
    pub songplays: Frame,
}

/// Deduplicate raw events and keep only playback events
pub fn playback_events(sql: &SqlEngine, events: &Frame, playback_page: &str) -> Result<Frame> {
    let unique = events.distinct(sql)?;
    let playback = unique.filter_eq(PAGE, playback_page)?;
    info!(
        "Kept {} of {} distinct events with page {playback_page}",
        playback.num_rows(),
        unique.num_rows()
    );
    Ok(playback)
}

/// Users: one row per distinct user snapshot seen in playback events
pub fn users_table(sql: &SqlEngine, playback: &Frame) -> Result<Frame> {
    playback
        .select_as(&[
            (USER_ID_RAW, USER_ID),
            (FIRST_NAME_RAW, FIRST_NAME),
            (LAST_NAME_RAW, LAST_NAME),
            (GENDER, GENDER),
            (LEVEL, LEVEL),
        ])?
        .distinct(sql)
}

fn calendar(playback: &Frame) -> Result<CalendarColumns> {
    let ts = playback.column(TS)?;
    if ts.data_type() != &DataType::Int64 {
        return Err(Error::schema(format!(
            "Column '{TS}' must be Int64 epoch milliseconds, found {}",
            ts.data_type()
        )));
    }
    Ok(CalendarColumns::from_millis(ts.as_primitive::<Int64Type>()))
}

/// Time: distinct calendar decompositions of playback timestamps
pub fn time_table(sql: &SqlEngine, playback: &Frame) -> Result<Frame> {
    let parts = calendar(playback)?;
    playback
        .with_column(START_TIME, parts.start_time)?
        .with_column(HOUR, parts.hour)?
        .with_column(DAY, parts.day)?
        .with_column(WEEK, parts.week)?
        .with_column(MONTH, parts.month)?
        .with_column(YEAR, parts.year)?
        .with_column(WEEKDAY, parts.weekday)?
        .select(&[START_TIME, HOUR, DAY, WEEK, MONTH, YEAR, WEEKDAY])?
        .distinct(sql)
}

/// Join condition matching an event to catalog records
///
/// Ties are broken by the lowest song id, then the lowest artist id.
pub fn songplay_join() -> JoinSpec {
    JoinSpec::new()
        .on(ARTIST, ARTIST_NAME)
        .on(SONG, TITLE)
        .on(LENGTH, DURATION)
        .column(SONG_ID, SONG_ID)
        .column(ARTIST_ID, ARTIST_ID)
        .tie_break(SONG_ID)
        .tie_break(ARTIST_ID)
}

/// Songplays: one row per playback event, resolved against the catalog
pub fn songplays_table(sql: &SqlEngine, playback: &Frame, catalog: &Frame) -> Result<Frame> {
    let parts = calendar(playback)?;
    playback
        .with_column(MONTH, parts.month)?
        .with_column(YEAR, parts.year)?
        .left_join(sql, catalog, &songplay_join())?
        .select_as(&[
            (TS, START_TIME),
            (MONTH, MONTH),
            (YEAR, YEAR),
            (USER_ID_RAW, USER_ID),
            (LEVEL, LEVEL),
            (SONG_ID, SONG_ID),
            (ARTIST_ID, ARTIST_ID),
            (SESSION_ID_RAW, SESSION_ID),
            (LOCATION, LOCATION),
            (USER_AGENT_RAW, USER_AGENT),
        ])
}

/// Derive all event tables from raw events and raw catalog records
pub fn build_event_tables(
    sql: &SqlEngine,
    events: &Frame,
    catalog: &Frame,
    playback_page: &str,
) -> Result<EventTables> {
    let playback = playback_events(sql, events, playback_page)?;
    if playback.is_empty() {
        warn!("No events with page {playback_page}; event tables will be empty");
    }

    let tables = EventTables {
        users: users_table(sql, &playback)?,
        time: time_table(sql, &playback)?,
        songplays: songplays_table(sql, &playback, catalog)?,
    };
    let resolved = tables.songplays.num_rows()
        - tables.songplays.column(SONG_ID)?.null_count();
    info!(
        "Event pipeline: {} users, {} time rows, {} songplays ({resolved} resolved)",
        tables.users.num_rows(),
        tables.time.num_rows(),
        tables.songplays.num_rows()
    );
    Ok(tables)
}

/// Write the users, time and songplays tables
pub async fn write_event_tables(
    writer: &TableWriter,
    tables: &EventTables,
) -> Result<Vec<TableWriteSummary>> {
    Ok(vec![
        writer.write(Table::Users, &tables.users).await?,
        writer.write(Table::Time, &tables.time).await?,
        writer.write(Table::Songplays, &tables.songplays).await?,
    ])
}
