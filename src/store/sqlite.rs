use super::{ComparisonStore, NamedValue, Result, RuntimeSnafu, SqlxSnafu};
use crate::comparison::{ComparisonKey, ComparisonRecord};
use crate::config::Assay;
use crate::relation::Relationship;
use log::{debug, info};
use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use tokio::runtime::Runtime;

/// Tables read and written by the comparator
const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS bird (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        band TEXT,
        sex TEXT NOT NULL DEFAULT 'U'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS session (
        id INTEGER PRIMARY KEY,
        bird_id INTEGER NOT NULL REFERENCES bird(id),
        cv TEXT NOT NULL,
        type TEXT NOT NULL,
        create_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bird_relationship (
        subject_id INTEGER NOT NULL REFERENCES bird(id),
        type TEXT NOT NULL,
        object_id INTEGER NOT NULL REFERENCES bird(id),
        UNIQUE (subject_id, type, object_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bird_comparison (
        id INTEGER PRIMARY KEY,
        bird1_id INTEGER NOT NULL REFERENCES bird(id),
        bird1_session_id INTEGER NOT NULL REFERENCES session(id),
        comparison TEXT NOT NULL,
        bird2_id INTEGER NOT NULL REFERENCES bird(id),
        bird2_session_id INTEGER NOT NULL REFERENCES session(id),
        value REAL NOT NULL,
        UNIQUE (bird1_id, bird1_session_id, comparison, bird2_id, bird2_session_id)
    )"#,
    r#"CREATE INDEX IF NOT EXISTS session_bird_idx ON session (bird_id, cv, type)"#,
];

const READ_RELATIONSHIPS: &str = r#"
    SELECT s.name, r.type, o.name
    FROM bird_relationship r
    JOIN bird s ON s.id = r.subject_id
    JOIN bird o ON o.id = r.object_id"#;

const READ_PROCESSED: &str = r#"
    SELECT DISTINCT bird1_id, bird1_session_id, bird2_id, bird2_session_id
    FROM bird_comparison"#;

const READ_SESSION: &str = r#"
    SELECT s.id
    FROM session s
    JOIN bird b ON b.id = s.bird_id
    WHERE b.name = ? AND s.cv = ? AND s.type = ?
    ORDER BY s.create_date DESC, s.id DESC
    LIMIT 1"#;

const READ_METRIC: &str = r#"
    SELECT b1.name, b2.name, c.value
    FROM bird_comparison c
    JOIN bird b1 ON b1.id = c.bird1_id
    JOIN bird b2 ON b2.id = c.bird2_id
    WHERE c.comparison = ?
    ORDER BY 1, 2"#;

const WRITE_COMPARISON: &str = r#"
    INSERT OR IGNORE INTO bird_comparison
        (bird1_id, bird1_session_id, comparison, bird2_id, bird2_session_id, value)
    VALUES (?, ?, ?, ?, ?, ?)"#;

/// Colony database in an SQLite file.
///
/// sqlx is async; the store owns a current-thread runtime and blocks on
/// every query so the comparator can stay a plain loop. Writes open a
/// transaction lazily, which stays open until [`ComparisonStore::commit`]
/// or [`ComparisonStore::rollback`].
pub struct SqliteStore {
    rt: Runtime,
    conn: SqliteConnection,
    in_tx: bool,
}

impl SqliteStore {
    pub fn open(url: &str, create: bool) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context(RuntimeSnafu)?;
        let opts = SqliteConnectOptions::from_str(url)
            .context(SqlxSnafu)?
            .create_if_missing(create);
        let conn = rt.block_on(opts.connect()).context(SqlxSnafu)?;
        info!("connected to {url}");
        Ok(Self {
            rt,
            conn,
            in_tx: false,
        })
    }

    pub fn init_schema(&mut self) -> Result<()> {
        for stmt in SCHEMA {
            self.rt
                .block_on(sqlx::query(stmt).execute(&mut self.conn))
                .context(SqlxSnafu)?;
        }
        info!("schema ready");
        Ok(())
    }

    pub fn add_bird(&mut self, name: &str, sex: &str) -> Result<i64> {
        let res = self
            .rt
            .block_on(
                sqlx::query("INSERT INTO bird (name, sex) VALUES (?, ?)")
                    .bind(name)
                    .bind(sex)
                    .execute(&mut self.conn),
            )
            .context(SqlxSnafu)?;
        Ok(res.last_insert_rowid())
    }

    pub fn add_session(&mut self, bird_id: i64, assay: &Assay, create_date: &str) -> Result<i64> {
        let res = self
            .rt
            .block_on(
                sqlx::query("INSERT INTO session (bird_id, cv, type, create_date) VALUES (?, ?, ?, ?)")
                    .bind(bird_id)
                    .bind(assay.cv.as_str())
                    .bind(assay.kind.as_str())
                    .bind(create_date)
                    .execute(&mut self.conn),
            )
            .context(SqlxSnafu)?;
        Ok(res.last_insert_rowid())
    }

    pub fn add_relationship(&mut self, subject_id: i64, kind: &str, object_id: i64) -> Result<()> {
        self.rt
            .block_on(
                sqlx::query(
                    "INSERT OR IGNORE INTO bird_relationship (subject_id, type, object_id) VALUES (?, ?, ?)",
                )
                .bind(subject_id)
                .bind(kind)
                .bind(object_id)
                .execute(&mut self.conn),
            )
            .context(SqlxSnafu)?;
        Ok(())
    }

    fn execute_raw(&mut self, sql: &str) -> Result<()> {
        self.rt
            .block_on(sqlx::query(sql).execute(&mut self.conn))
            .context(SqlxSnafu)?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        let Self { rt, conn, .. } = self;
        rt.block_on(conn.close()).context(SqlxSnafu)
    }
}

impl ComparisonStore for SqliteStore {
    fn relationships(&mut self) -> Result<Vec<Relationship>> {
        let rows: Vec<(String, String, String)> = self
            .rt
            .block_on(sqlx::query_as(READ_RELATIONSHIPS).fetch_all(&mut self.conn))
            .context(SqlxSnafu)?;
        Ok(rows
            .into_iter()
            .map(|(subject, kind, object)| Relationship {
                subject,
                kind,
                object,
            })
            .collect())
    }

    fn processed_keys(&mut self) -> Result<Vec<ComparisonKey>> {
        let rows: Vec<(i64, i64, i64, i64)> = self
            .rt
            .block_on(sqlx::query_as(READ_PROCESSED).fetch_all(&mut self.conn))
            .context(SqlxSnafu)?;
        Ok(rows
            .into_iter()
            .map(|(b1, s1, b2, s2)| ComparisonKey {
                bird1_id: b1,
                session1_id: s1,
                bird2_id: b2,
                session2_id: s2,
            })
            .collect())
    }

    fn latest_session(&mut self, full_name: &str, assay: &Assay) -> Result<Option<i64>> {
        self.rt
            .block_on(
                sqlx::query_scalar::<_, i64>(READ_SESSION)
                    .bind(full_name)
                    .bind(assay.cv.as_str())
                    .bind(assay.kind.as_str())
                    .fetch_optional(&mut self.conn),
            )
            .context(SqlxSnafu)
    }

    fn insert_comparison(&mut self, rec: &ComparisonRecord) -> Result<bool> {
        if !self.in_tx {
            self.execute_raw("BEGIN")?;
            self.in_tx = true;
        }
        let k = &rec.key;
        let res = self
            .rt
            .block_on(
                sqlx::query(WRITE_COMPARISON)
                    .bind(k.bird1_id)
                    .bind(k.session1_id)
                    .bind(rec.metric.name())
                    .bind(k.bird2_id)
                    .bind(k.session2_id)
                    .bind(rec.value)
                    .execute(&mut self.conn),
            )
            .context(SqlxSnafu)?;
        debug!(
            "{} {}<->{}: {}",
            rec.metric, k.bird1_id, k.bird2_id, rec.value
        );
        Ok(res.rows_affected() == 1)
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.execute_raw("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_tx {
            self.execute_raw("ROLLBACK")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn metric_values(&mut self, metric: &str) -> Result<Vec<NamedValue>> {
        let rows: Vec<(String, String, f64)> = self
            .rt
            .block_on(
                sqlx::query_as(READ_METRIC)
                    .bind(metric)
                    .fetch_all(&mut self.conn),
            )
            .context(SqlxSnafu)?;
        Ok(rows
            .into_iter()
            .map(|(bird1, bird2, value)| NamedValue {
                bird1,
                bird2,
                value,
            })
            .collect())
    }

    fn birds_with_sex(&mut self, sex: &str) -> Result<Vec<String>> {
        self.rt
            .block_on(
                sqlx::query_scalar::<_, String>("SELECT name FROM bird WHERE sex = ? ORDER BY name")
                    .bind(sex)
                    .fetch_all(&mut self.conn),
            )
            .context(SqlxSnafu)
    }
}

#[cfg(test)]
fn memory_store() -> SqliteStore {
    let mut store = SqliteStore::open("sqlite::memory:", true).unwrap();
    store.init_schema().unwrap();
    store
}

#[test]
fn test_sqlite_latest_session_and_relationships() {
    let mut store = memory_store();
    let assay = Assay::default();
    let a = store.add_bird("20180101_blue1green2", "M").unwrap();
    let b = store.add_bird("20190412_red12yellow3", "F").unwrap();
    let old = store.add_session(a, &assay, "2019-01-01 00:00:00").unwrap();
    let new = store.add_session(a, &assay, "2021-06-01 00:00:00").unwrap();
    assert_ne!(old, new);
    store.add_relationship(b, "child", a).unwrap();

    assert_eq!(
        store.latest_session("20180101_blue1green2", &assay).unwrap(),
        Some(new)
    );
    assert_eq!(
        store.latest_session("20190412_red12yellow3", &assay).unwrap(),
        None
    );
    let rels = store.relationships().unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].subject, "20190412_red12yellow3");
    assert_eq!(rels[0].kind, "child");
    assert_eq!(store.birds_with_sex("M").unwrap(), vec!["20180101_blue1green2"]);
}

#[test]
fn test_sqlite_insert_ignore_commit_rollback() {
    use crate::comparison::Metric;
    let mut store = memory_store();
    let assay = Assay::default();
    let a = store.add_bird("a", "M").unwrap();
    let b = store.add_bird("b", "M").unwrap();
    let sa = store.add_session(a, &assay, "2020-01-01").unwrap();
    let sb = store.add_session(b, &assay, "2020-01-01").unwrap();
    let key = ComparisonKey {
        bird1_id: a,
        session1_id: sa,
        bird2_id: b,
        session2_id: sb,
    };
    let rec = ComparisonRecord {
        key,
        metric: Metric::AlleleMatchAll,
        value: 62.5,
    };
    assert!(store.insert_comparison(&rec).unwrap());
    assert!(!store.insert_comparison(&rec).unwrap());
    store.commit().unwrap();
    assert_eq!(store.processed_keys().unwrap(), vec![key]);

    let seq = ComparisonRecord {
        metric: Metric::AlleleMatchSeq,
        value: 50.0,
        ..rec.clone()
    };
    assert!(store.insert_comparison(&seq).unwrap());
    store.rollback().unwrap();
    assert!(store.metric_values("allele_match_seq").unwrap().is_empty());
    let all = store.metric_values("allele_match_all").unwrap();
    assert_eq!(
        all,
        vec![NamedValue {
            bird1: "a".into(),
            bird2: "b".into(),
            value: 62.5
        }]
    );
    store.close().unwrap();
}
