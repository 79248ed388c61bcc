use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;
use tempfile::TempDir;

use gridstore::{
    canvas::Canvas,
    persist::{CanvasStore, PageQuery, PersistError, sqlite::{SqliteCanvasStore, fts_query}},
    types::{Resolution, SortOrder},
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

fn canvas(name: &str, minutes: i64) -> Canvas {
    Canvas {
        name: name.to_string(),
        created: base_time() + Duration::minutes(minutes),
        resolution: Resolution::Standard,
        pixels: vec!["0".repeat(26); 15].join("\n"),
        shade: None,
    }
}

fn names(rows: &[Canvas]) -> Vec<&str> {
    rows.iter().map(|c| c.name.as_str()).collect()
}

fn count_schema_objects(path: &std::path::Path, kind: &str) -> i64 {
    let conn = Connection::open(path).expect("open raw");
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name LIKE 'canvases%'",
        [kind],
        |row| row.get(0),
    )
    .expect("count schema objects")
}

#[test]
fn reopening_keeps_a_single_copy_of_the_schema() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("canvases.db");

    let store = SqliteCanvasStore::open(&db_path).expect("first open");
    store.insert(&canvas("kept", 0)).expect("insert");
    drop(store);

    let reopened = SqliteCanvasStore::open(&db_path).expect("second open");
    assert_eq!(reopened.count().expect("count"), 1);
    drop(reopened);

    assert_eq!(count_schema_objects(&db_path, "trigger"), 3);
    assert_eq!(count_schema_objects(&db_path, "index"), 2);
    let fts_tables: i64 = Connection::open(&db_path)
        .expect("open raw")
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'canvases_fts'",
            [],
            |row| row.get(0),
        )
        .expect("count fts");
    assert_eq!(fts_tables, 1);
}

#[test]
fn open_fails_when_the_path_is_unusable() {
    let tmp = TempDir::new().expect("tmp");
    let missing_dir = tmp.path().join("nope").join("canvases.db");
    assert!(SqliteCanvasStore::open(missing_dir).is_err());
}

#[test]
fn duplicate_insert_is_a_conflict() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    store.insert(&canvas("A", 0)).expect("first insert");

    let err = store.insert(&canvas("A", 1)).unwrap_err();
    assert!(matches!(err, PersistError::Conflict { ref name } if name == "A"));

    // Names are case-sensitive.
    store.insert(&canvas("a", 2)).expect("different case");
    assert_eq!(store.count().expect("count"), 2);
}

#[test]
fn round_trips_every_field() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    let original = Canvas {
        name: "shaded hd".to_string(),
        created: base_time() + Duration::milliseconds(1_234),
        resolution: Resolution::HD,
        pixels: vec!["a".repeat(36); 22].join("\n"),
        shade: Some(vec!["5".repeat(36); 22].join("\n")),
    };
    store.insert(&original).expect("insert");

    let loaded = store.get_by_name("shaded hd").expect("get").expect("present");
    assert_eq!(loaded, original);
    assert_eq!(store.get_by_name("missing").expect("get"), None);
}

#[test]
fn bulk_insert_skips_existing_names_and_keeps_the_rest() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    store.insert(&canvas("old", 0)).expect("seed");

    let mut batch: Vec<Canvas> = (1..=9).map(|i| canvas(&format!("new-{i}"), i)).collect();
    batch.insert(4, canvas("old", 100));

    let report = store.bulk_insert(&batch).expect("bulk insert");
    assert_eq!(report.inserted, 9);
    assert_eq!(report.skipped, vec!["old".to_string()]);
    assert_eq!(store.count().expect("count"), 10);

    let old = store.get_by_name("old").expect("get").expect("present");
    assert_eq!(old.created, base_time());
}

#[test]
fn bulk_insert_tolerates_duplicates_inside_one_batch() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    let batch: Vec<Canvas> = (0..1000)
        .map(|i| {
            let name = if i == 501 { "canvas-500".to_string() } else { format!("canvas-{i}") };
            canvas(&name, i)
        })
        .collect();

    let report = store.bulk_insert(&batch).expect("bulk insert");
    assert_eq!(report.inserted, 999);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(store.count().expect("count"), 999);
}

#[test]
fn latest_and_random_lookups() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    assert_eq!(store.get_random().expect("random"), None);
    assert_eq!(store.get_latest().expect("latest"), None);

    store.insert(&canvas("middle", 5)).expect("insert");
    assert_eq!(store.get_random().expect("random").expect("one row").name, "middle");

    store.insert(&canvas("newest", 10)).expect("insert");
    store.insert(&canvas("oldest", 0)).expect("insert");
    assert_eq!(store.get_latest().expect("latest").expect("row").name, "newest");
}

#[test]
fn pages_are_ordered_by_creation_time() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    for (i, name) in ["c1", "c2", "c3", "c4", "c5"].iter().enumerate() {
        store.insert(&canvas(name, i as i64)).expect("insert");
    }

    let asc = store
        .get_page(&PageQuery {
            offset: 1,
            limit: 2,
            order: SortOrder::Asc,
            ..PageQuery::default()
        })
        .expect("page");
    assert_eq!(names(&asc), ["c2", "c3"]);

    let desc = store
        .get_page(&PageQuery {
            offset: 0,
            limit: 3,
            order: SortOrder::Desc,
            ..PageQuery::default()
        })
        .expect("page");
    assert_eq!(names(&desc), ["c5", "c4", "c3"]);

    let past_end = store
        .get_page(&PageQuery {
            offset: 5,
            limit: 3,
            ..PageQuery::default()
        })
        .expect("page");
    assert!(past_end.is_empty());
}

#[test]
fn search_filters_by_name_tokens() {
    let store = SqliteCanvasStore::open_in_memory().expect("open");
    store.insert(&canvas("blue moose", 0)).expect("insert");
    store.insert(&canvas("red moose", 1)).expect("insert");
    store.insert(&canvas("blue whale", 2)).expect("insert");

    let search = |text: &str| {
        store
            .get_page(&PageQuery {
                search: Some(text.to_string()),
                offset: 0,
                limit: 10,
                order: SortOrder::Asc,
            })
            .expect("search")
    };

    let mut blue = names(&search("blue")).into_iter().map(str::to_string).collect::<Vec<_>>();
    blue.sort();
    assert_eq!(blue, ["blue moose", "blue whale"]);

    assert_eq!(names(&search("blue AND whale")), ["blue whale"]);
    assert_eq!(names(&search("moose NOT red")), ["blue moose"]);
    assert_eq!(search("MOOSE").len(), 2);
    assert!(search("giraffe").is_empty());

    // Search syntax in plain words is neutralized rather than parsed.
    assert_eq!(search("moose\"").len(), 2);
    assert!(search("name:blue*").is_empty());
    assert!(search("NEAR(blue").is_empty());

    // Whitespace-only search behaves like no search.
    assert_eq!(search("   ").len(), 3);

    // Dangling operators are dropped instead of reaching FTS5 as bad syntax.
    assert_eq!(search("blue OR").len(), 2);
    assert_eq!(search("NOT blue").len(), 2);
    assert_eq!(names(&search("blue AND AND whale")), ["blue whale"]);
    assert_eq!(search("AND").len(), 3);
}

#[test]
fn fts_query_quotes_everything_but_operators() {
    assert_eq!(fts_query("blue AND whale"), "\"blue\" AND \"whale\"");
    assert_eq!(fts_query("say \"hi\""), "\"say\" \"\"\"hi\"\"\"");
    assert_eq!(fts_query("and or"), "\"and\" \"or\"");
    assert_eq!(fts_query(""), "");
    assert_eq!(fts_query("cat OR"), "\"cat\"");
    assert_eq!(fts_query("OR cat"), "\"cat\"");
    assert_eq!(fts_query("cat OR NOT dog"), "\"cat\" OR \"dog\"");
    assert_eq!(fts_query("AND OR NOT"), "");
}

#[test]
fn delete_removes_the_row_and_its_search_entry() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("delete.db");
    let store = SqliteCanvasStore::open(&db_path).expect("open");

    store.insert(&canvas("doomed moose", 0)).expect("insert");
    store.insert(&canvas("other", 1)).expect("insert");

    assert!(store.delete("doomed moose").expect("delete"));
    assert!(!store.delete("doomed moose").expect("second delete"));
    assert_eq!(store.get_by_name("doomed moose").expect("get"), None);

    let raw = Connection::open(&db_path).expect("open raw");
    let indexed: i64 = raw
        .query_row(
            "SELECT COUNT(*) FROM canvases_fts WHERE canvases_fts MATCH '\"doomed\"'",
            [],
            |row| row.get(0),
        )
        .expect("fts count");
    assert_eq!(indexed, 0);

    // The name is free again.
    store.insert(&canvas("doomed moose", 2)).expect("reinsert");
}

#[test]
fn bulk_insert_aborts_on_constraints_other_than_uniqueness() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("guarded.db");
    let store = SqliteCanvasStore::open(&db_path).expect("open");

    Connection::open(&db_path)
        .expect("open raw")
        .execute_batch(
            "CREATE TRIGGER reject_banned BEFORE INSERT ON canvases \
             WHEN NEW.name = 'banned' BEGIN SELECT RAISE(ABORT, 'banned name'); END;",
        )
        .expect("install trigger");

    let batch = vec![canvas("first", 0), canvas("banned", 1), canvas("last", 2)];
    let err = store.bulk_insert(&batch).unwrap_err();
    assert!(matches!(err, PersistError::Sqlite(_)), "got {err:?}");
    assert_eq!(store.count().expect("count"), 0);

    let single = store.insert(&canvas("banned", 3)).unwrap_err();
    assert!(matches!(single, PersistError::Sqlite(_)), "got {single:?}");
}

#[test]
fn readers_are_not_blocked_by_an_open_write_transaction() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("wal.db");
    let store = SqliteCanvasStore::open(&db_path).expect("open");
    store.insert(&canvas("seed", 0)).expect("seed");

    let writer = Connection::open(&db_path).expect("open raw");
    writer
        .execute_batch(
            "BEGIN IMMEDIATE; \
             INSERT INTO canvases(name, created_ms, hd, image) VALUES ('held', 1, 0, 'x');",
        )
        .expect("hold write lock");

    assert_eq!(store.get_by_name("seed").expect("read").expect("row").name, "seed");
    assert_eq!(store.get_by_name("held").expect("read"), None);
    assert_eq!(store.count().expect("count"), 1);

    writer.execute_batch("COMMIT").expect("commit");
    assert_eq!(store.count().expect("count"), 2);
}
