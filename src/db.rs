use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::Connection;

use crate::model::{
    Category, CitationRecord, DuplicateCitation, FacultyIdentity, FacultyRecord, Language,
    ProfileDetails,
};
use crate::parser::{ParseMode, ProcessedProfile};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            page_id    INTEGER NOT NULL REFERENCES pages(id),
            url        TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            scraped_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_url ON page_data(url);

        CREATE TABLE IF NOT EXISTS faculty (
            url            TEXT PRIMARY KEY,
            page_data_id   INTEGER NOT NULL REFERENCES page_data(id),
            name           TEXT,
            email          TEXT,
            details        TEXT,
            mode           TEXT NOT NULL CHECK(mode IN ('full','citations_only')),
            citation_count INTEGER NOT NULL DEFAULT 0,
            processed_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS citations (
            id          INTEGER PRIMARY KEY,
            faculty_url TEXT NOT NULL REFERENCES faculty(url) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            category    TEXT NOT NULL,
            year        INTEGER,
            language    TEXT NOT NULL,
            text        TEXT NOT NULL,
            doi         TEXT,
            UNIQUE(faculty_url, position)
        );
        CREATE INDEX IF NOT EXISTS idx_citations_faculty ON citations(faculty_url);
        CREATE INDEX IF NOT EXISTS idx_citations_category ON citations(category, year);

        CREATE TABLE IF NOT EXISTS duplicates (
            id          INTEGER PRIMARY KEY,
            faculty_url TEXT NOT NULL REFERENCES faculty(url) ON DELETE CASCADE,
            category    TEXT NOT NULL,
            kept        TEXT NOT NULL,
            dropped     TEXT NOT NULL,
            doi_match   BOOLEAN NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_duplicates_faculty ON duplicates(faculty_url);
        ",
    )?;
    Ok(())
}

// ── Discovery / scraping ──

pub fn insert_pages(conn: &Connection, urls: &[String]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO pages (url) VALUES (?1)")?;
        for url in urls {
            count += stmt.execute(rusqlite::params![url])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, url FROM pages WHERE visited = 0 ORDER BY id LIMIT {}",
            n
        ),
        None => "SELECT id, url FROM pages WHERE visited = 0 ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ScrapeRow {
    pub page_id: i64,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Prepared statements for streaming scrape results into the store.
pub struct ScrapeWriter<'c> {
    insert: rusqlite::Statement<'c>,
    visit: rusqlite::Statement<'c>,
}

impl<'c> ScrapeWriter<'c> {
    pub fn new(conn: &'c Connection) -> Result<Self> {
        Ok(ScrapeWriter {
            insert: conn.prepare(
                "INSERT INTO page_data (page_id, url, html, status, error, latency_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?,
            visit: conn.prepare(
                "UPDATE pages SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
            )?,
        })
    }

    pub fn save(&mut self, row: &ScrapeRow) -> Result<()> {
        self.insert.execute(rusqlite::params![
            row.page_id, row.url, row.html, row.status, row.error, row.latency_ms,
        ])?;
        self.visit.execute(rusqlite::params![row.page_id])?;
        Ok(())
    }
}

// ── Processing ──

pub struct StoredPage {
    pub page_data_id: i64,
    pub url: String,
    pub html: String,
}

/// Latest successful fetch per URL. Without `reprocess`, only pages whose
/// latest fetch has not been turned into a faculty record yet.
pub fn fetch_unprocessed(
    conn: &Connection,
    limit: Option<usize>,
    reprocess: bool,
) -> Result<Vec<StoredPage>> {
    let sql = format!(
        "SELECT pd.id, pd.url, pd.html
         FROM page_data pd
         LEFT JOIN faculty f ON f.page_data_id = pd.id
         WHERE pd.html IS NOT NULL
           AND pd.id = (SELECT MAX(id) FROM page_data x WHERE x.url = pd.url AND x.html IS NOT NULL)
           {}
         ORDER BY pd.id{}",
        if reprocess { "" } else { "AND f.url IS NULL" },
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredPage {
                page_data_id: row.get(0)?,
                url: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replaces each faculty member's stored record and citations wholesale.
pub fn save_records(
    conn: &Connection,
    page_ids: &[i64],
    profiles: &[ProcessedProfile],
    mode: ParseMode,
) -> Result<()> {
    let mode_key = match mode {
        ParseMode::Full => "full",
        ParseMode::CitationsOnly => "citations_only",
    };
    let tx = conn.unchecked_transaction()?;
    {
        let mut clear = tx.prepare("DELETE FROM citations WHERE faculty_url = ?1")?;
        let mut clear_dups = tx.prepare("DELETE FROM duplicates WHERE faculty_url = ?1")?;
        let mut f_stmt = tx.prepare(
            "INSERT OR REPLACE INTO faculty
             (url, page_data_id, name, email, details, mode, citation_count, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))",
        )?;
        let mut c_stmt = tx.prepare(
            "INSERT INTO citations (faculty_url, position, category, year, language, text, doi)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let mut d_stmt = tx.prepare(
            "INSERT INTO duplicates (faculty_url, category, kept, dropped, doi_match)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for (page_id, profile) in page_ids.iter().zip(profiles) {
            let r = &profile.record;
            let details = r
                .details
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            clear.execute(rusqlite::params![r.identity.url])?;
            clear_dups.execute(rusqlite::params![r.identity.url])?;
            f_stmt.execute(rusqlite::params![
                r.identity.url,
                page_id,
                r.identity.name,
                r.identity.email,
                details,
                mode_key,
                r.citation_count() as i64,
            ])?;
            for (position, c) in r.iter_citations().enumerate() {
                c_stmt.execute(rusqlite::params![
                    r.identity.url,
                    position as i64,
                    c.category.key(),
                    c.year,
                    c.language.tag(),
                    c.text,
                    c.doi,
                ])?;
            }
            for d in &r.duplicates {
                d_stmt.execute(rusqlite::params![
                    r.identity.url,
                    d.category.key(),
                    d.kept,
                    d.dropped,
                    d.doi_match,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

fn parse_column<T: std::str::FromStr>(idx: usize, value: String) -> rusqlite::Result<T> {
    value.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value {:?}", value).into(),
        )
    })
}

/// Every stored faculty record, ordered by URL.
pub fn load_records(conn: &Connection) -> Result<Vec<FacultyRecord>> {
    let mut f_stmt = conn.prepare("SELECT url, name, email, details FROM faculty ORDER BY url")?;
    let mut records: Vec<FacultyRecord> = f_stmt
        .query_map([], |row| {
            let details: Option<String> = row.get(3)?;
            Ok((
                FacultyIdentity {
                    url: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                },
                details,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(identity, details)| {
            let details = details
                .map(|d| serde_json::from_str::<ProfileDetails>(&d))
                .transpose()
                .with_context(|| format!("Corrupt details for {}", identity.url))?;
            Ok(FacultyRecord {
                details,
                ..FacultyRecord::empty(identity)
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut c_stmt = conn.prepare(
        "SELECT category, year, language, text, doi
         FROM citations WHERE faculty_url = ?1 ORDER BY position",
    )?;
    for record in &mut records {
        let rows = c_stmt
            .query_map(rusqlite::params![record.identity.url], |row| {
                Ok(CitationRecord {
                    category: parse_column::<Category>(0, row.get(0)?)?,
                    year: row.get(1)?,
                    language: parse_column::<Language>(2, row.get(2)?)?,
                    text: row.get(3)?,
                    doi: row.get(4)?,
                    owner: record.identity.clone(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut citations: BTreeMap<Category, Vec<CitationRecord>> = BTreeMap::new();
        for c in rows {
            citations.entry(c.category).or_default().push(c);
        }
        record.citations = citations;
    }

    let mut d_stmt = conn.prepare(
        "SELECT category, kept, dropped, doi_match
         FROM duplicates WHERE faculty_url = ?1 ORDER BY id",
    )?;
    for record in &mut records {
        record.duplicates = d_stmt
            .query_map(rusqlite::params![record.identity.url], |row| {
                Ok(DuplicateCitation {
                    category: parse_column::<Category>(0, row.get(0)?)?,
                    kept: row.get(1)?,
                    dropped: row.get(2)?,
                    doi_match: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(records)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub scraped: usize,
    pub errors: usize,
    pub processed: usize,
    pub citations: usize,
    pub duplicates: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    let total = count("SELECT COUNT(*) FROM pages")?;
    let visited = count("SELECT COUNT(*) FROM pages WHERE visited = 1")?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        scraped: count("SELECT COUNT(*) FROM page_data")?,
        errors: count("SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL")?,
        processed: count("SELECT COUNT(*) FROM faculty")?,
        citations: count("SELECT COUNT(*) FROM citations")?,
        duplicates: count("SELECT COUNT(*) FROM duplicates")?,
    })
}
