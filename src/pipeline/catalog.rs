//! Catalog pipeline: songs and artists dimensions

use crate::error::Result;
use crate::frame::{Frame, SqlEngine};
use crate::output::{TableWriteSummary, TableWriter};
use crate::types::columns::{
    ARTIST_ID, ARTIST_LATITUDE, ARTIST_LOCATION, ARTIST_LONGITUDE, ARTIST_NAME, DURATION,
    LATITUDE, LOCATION, LONGITUDE, NAME, SONG_ID, TITLE, YEAR,
};
use crate::types::Table;
use tracing::info;

/// Dimension tables derived from catalog records
#[derive(Debug, Clone)]
pub struct CatalogTables {
    pub songs: Frame,
    pub artists: Frame,
}

/// Songs: one row per distinct `(song_id, title, duration, year, artist_id)`
pub fn songs_table(sql: &SqlEngine, catalog: &Frame) -> Result<Frame> {
    catalog
        .select(&[SONG_ID, TITLE, DURATION, YEAR, ARTIST_ID])?
        .distinct(sql)
}

/// Artists: the `artist_*` columns under their dimension names
pub fn artists_table(sql: &SqlEngine, catalog: &Frame) -> Result<Frame> {
    catalog
        .select_as(&[
            (ARTIST_ID, ARTIST_ID),
            (ARTIST_LATITUDE, LATITUDE),
            (ARTIST_LONGITUDE, LONGITUDE),
            (ARTIST_LOCATION, LOCATION),
            (ARTIST_NAME, NAME),
        ])?
        .distinct(sql)
}

/// Deduplicate raw catalog records and project both dimensions
pub fn build_catalog_tables(sql: &SqlEngine, catalog: &Frame) -> Result<CatalogTables> {
    let unique = catalog.distinct(sql)?;
    if unique.num_rows() < catalog.num_rows() {
        info!(
            "Dropped {} duplicate catalog records",
            catalog.num_rows() - unique.num_rows()
        );
    }

    let tables = CatalogTables {
        songs: songs_table(sql, &unique)?,
        artists: artists_table(sql, &unique)?,
    };
    info!(
        "Catalog pipeline: {} songs, {} artists",
        tables.songs.num_rows(),
        tables.artists.num_rows()
    );
    Ok(tables)
}

/// Write the songs and artists tables
pub async fn write_catalog_tables(
    writer: &TableWriter,
    tables: &CatalogTables,
) -> Result<Vec<TableWriteSummary>> {
    Ok(vec![
        writer.write(Table::Songs, &tables.songs).await?,
        writer.write(Table::Artists, &tables.artists).await?,
    ])
}
