//! End-to-end engine tests: SQL in, rows out, against real heap files.

use marrow_common::{DataType, StorageConfig, Value};
use marrow_exec::{Database, Row};
use marrow_storage::{ColumnSchema, Record, Rid};
use tempfile::tempdir;

fn open_db(dir: &std::path::Path) -> Database {
    Database::open(StorageConfig {
        data_dir: dir.to_path_buf(),
        buffer_pages: 16,
        fsync_enabled: false,
    })
    .unwrap()
}

fn rows(db: &Database, sql: &str) -> Vec<Row> {
    db.execute(sql).unwrap().map(|r| r.unwrap()).collect()
}

fn ints(rows: &[Row], column: usize) -> Vec<i32> {
    rows.iter()
        .map(|r| r.values()[column].as_int().unwrap())
        .collect()
}

/// Students/enrollments fixture shared by the join scenarios.
fn setup_school(db: &Database) {
    db.create_table(
        "students",
        vec![
            ColumnSchema::new("id", DataType::Int, 0),
            ColumnSchema::new("name", DataType::Varchar, 50),
            ColumnSchema::new("active", DataType::Boolean, 0),
        ],
    )
    .unwrap();
    db.create_table(
        "enrollments",
        vec![
            ColumnSchema::new("eid", DataType::Int, 0),
            ColumnSchema::new("student_id", DataType::Int, 0),
            ColumnSchema::new("course", DataType::Varchar, 50),
        ],
    )
    .unwrap();

    for (id, name, active) in [
        (1, "Alice", true),
        (2, "Bob", false),
        (2, "Bobby", true),
        (3, "Eve", true),
    ] {
        db.insert(
            "students",
            &Record::new(vec![
                Value::Int(id),
                Value::Varchar(name.into()),
                Value::Boolean(active),
            ]),
        )
        .unwrap();
    }
    for (eid, sid, course) in [
        (100, 1, "Math"),
        (101, 1, "Physics"),
        (102, 2, "Chem"),
        (103, 2, "Bio"),
        (104, 3, "Math"),
    ] {
        db.insert(
            "enrollments",
            &Record::new(vec![
                Value::Int(eid),
                Value::Int(sid),
                Value::Varchar(course.into()),
            ]),
        )
        .unwrap();
    }
}

/// Scenario 1: heap round-trip through the SQL surface.
#[test]
fn test_heap_round_trip() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table(
        "users",
        vec![
            ColumnSchema::new("id", DataType::Int, 0),
            ColumnSchema::new("name", DataType::Varchar, 50),
            ColumnSchema::new("active", DataType::Boolean, 0),
        ],
    )
    .unwrap();

    for stmt in [
        "INSERT INTO users (id, name, active) VALUES (1, 'Alice', true)",
        "INSERT INTO users (id, name, active) VALUES (2, 'Bob', false)",
        "INSERT INTO users (id, name, active) VALUES (2, 'Bobby', true)",
    ] {
        db.execute(stmt).unwrap().for_each(drop);
    }

    let all = rows(&db, "SELECT * FROM users");
    assert_eq!(ints(&all, 0), vec![1, 2, 2]);

    assert_eq!(
        db.read("users", Rid::new(0, 0)).unwrap(),
        Record::new(vec![
            Value::Int(1),
            Value::Varchar("Alice".into()),
            Value::Boolean(true)
        ])
    );

    assert!(db.delete("users", Rid::new(0, 1)).unwrap());
    let all = rows(&db, "SELECT * FROM users");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].values()[1], Value::Varchar("Alice".into()));
    assert_eq!(all[1].values()[1], Value::Varchar("Bobby".into()));

    assert!(!db.delete("users", Rid::new(0, 1)).unwrap());
}

/// Scenario 2: indexed equality with duplicate keys, before and after a
/// delete.
#[test]
fn test_indexed_equality_with_duplicates() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    setup_school(&db);
    db.create_index("id_idx", "students", "id").unwrap();

    let records = db.index().lookup("id_idx", 2).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].values()[1], Value::Varchar("Bob".into()));
    assert_eq!(records[1].values()[1], Value::Varchar("Bobby".into()));

    // The equality plan goes through the index too.
    let via_sql = rows(&db, "SELECT * FROM students WHERE id = 2");
    assert_eq!(via_sql.len(), 2);

    // Delete Bob by RID; the index follows.
    assert!(db.delete("students", Rid::new(0, 1)).unwrap());
    let records = db.index().lookup("id_idx", 2).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].values(),
        &[
            Value::Int(2),
            Value::Varchar("Bobby".into()),
            Value::Boolean(true)
        ]
    );
}

/// Scenario 3: the range plan returns exactly the keyed window, in
/// ascending key order.
#[test]
fn test_range_plan() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table(
        "t",
        vec![
            ColumnSchema::new("id", DataType::Int, 0),
            ColumnSchema::new("tag", DataType::Varchar, 10),
        ],
    )
    .unwrap();
    db.create_index("t_id_idx", "t", "id").unwrap();

    // Insert out of order so ascending output proves the index path.
    let mut ids: Vec<i32> = (0..50).collect();
    ids.reverse();
    for id in ids {
        db.insert(
            "t",
            &Record::new(vec![Value::Int(id), Value::Varchar(format!("v{}", id))]),
        )
        .unwrap();
    }

    let result = rows(&db, "SELECT * FROM t WHERE id >= 5 AND id <= 12");
    assert_eq!(ints(&result, 0), vec![5, 6, 7, 8, 9, 10, 11, 12]);
}

/// Contradictory range bounds produce a plan that yields zero rows.
#[test]
fn test_contradictory_range_is_empty() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table("t", vec![ColumnSchema::new("id", DataType::Int, 0)])
        .unwrap();
    db.create_index("t_id_idx", "t", "id").unwrap();
    for id in 0..20 {
        db.insert("t", &Record::new(vec![Value::Int(id)])).unwrap();
    }

    assert!(rows(&db, "SELECT * FROM t WHERE id > 10 AND id < 5").is_empty());
}

/// A full-span range over the index sees every row.
#[test]
fn test_range_full_span() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table("t", vec![ColumnSchema::new("id", DataType::Int, 0)])
        .unwrap();
    db.create_index("t_id_idx", "t", "id").unwrap();
    for id in [i32::MIN, -7, 0, 7, i32::MAX] {
        db.insert("t", &Record::new(vec![Value::Int(id)])).unwrap();
    }

    assert_eq!(
        db.index()
            .range_lookup("t_id_idx", i32::MIN, i32::MAX)
            .unwrap()
            .len(),
        5
    );
}

/// Scenario 4: OR with a boolean term and an integer comparison.
#[test]
fn test_filter_with_or() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table(
        "rows",
        vec![
            ColumnSchema::new("id", DataType::Int, 0),
            ColumnSchema::new("label", DataType::Varchar, 10),
            ColumnSchema::new("active", DataType::Boolean, 0),
        ],
    )
    .unwrap();
    for (id, label, active) in [(1, "A", true), (2, "B", false), (3, "C", true), (4, "D", false)] {
        db.insert(
            "rows",
            &Record::new(vec![
                Value::Int(id),
                Value::Varchar(label.into()),
                Value::Boolean(active),
            ]),
        )
        .unwrap();
    }

    let result = rows(&db, "SELECT * FROM rows WHERE active = true OR id < 2");
    assert_eq!(ints(&result, 0), vec![1, 3]);

    // NOT over the boolean term flips the selection.
    let result = rows(&db, "SELECT * FROM rows WHERE NOT active");
    assert_eq!(ints(&result, 0), vec![2, 4]);

    // AND binds tighter than OR.
    let result = rows(&db, "SELECT * FROM rows WHERE active = false AND id > 2 OR id = 1");
    assert_eq!(ints(&result, 0), vec![1, 4]);
}

/// Scenario 5: inner join cardinality over duplicate join keys.
#[test]
fn test_inner_join_cardinality() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    setup_school(&db);

    let result = rows(
        &db,
        "SELECT * FROM students JOIN enrollments ON id = student_id",
    );
    // Alice 2, Bob 2, Bobby 2, Eve 1.
    assert_eq!(result.len(), 7);
    assert!(result.iter().all(|r| r.values().len() == 6));

    // Output schema is left columns then right columns.
    let schema = result[0].schema.as_deref().unwrap();
    let names: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "name", "active", "eid", "student_id", "course"]
    );
}

/// Scenario 6: projection over a filtered join.
#[test]
fn test_projection_after_join() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    setup_school(&db);

    let result = rows(
        &db,
        "SELECT name, course FROM students JOIN enrollments ON id = student_id \
         WHERE active = true",
    );
    // Bob (inactive) drops out: Alice 2, Bobby 2, Eve 1.
    assert_eq!(result.len(), 5);
    for row in &result {
        assert_eq!(row.values().len(), 2);
    }
    let names: Vec<&str> = result
        .iter()
        .map(|r| r.values()[0].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alice", "Alice", "Bobby", "Bobby", "Eve"]);
}

/// Planner monotonicity: every plan shape returns the same row multiset
/// as a filtered sequential scan.
#[test]
fn test_plan_equivalence_with_seq_scan() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table(
        "t",
        vec![
            ColumnSchema::new("id", DataType::Int, 0),
            ColumnSchema::new("grp", DataType::Int, 0),
        ],
    )
    .unwrap();
    for i in 0..100 {
        db.insert("t", &Record::new(vec![Value::Int(i % 25), Value::Int(i)]))
            .unwrap();
    }

    // Baseline with no index: pure scan + filter.
    let baseline = |sql: &str| {
        let mut got = ints(&rows(&db, sql), 1);
        got.sort();
        got
    };
    let eq_scan = baseline("SELECT * FROM t WHERE id = 7");
    let range_scan = baseline("SELECT * FROM t WHERE id >= 3 AND id <= 6");

    // Same queries once the index exists take the index plans.
    db.create_index("t_id_idx", "t", "id").unwrap();
    assert_eq!(baseline("SELECT * FROM t WHERE id = 7"), eq_scan);
    assert_eq!(baseline("SELECT * FROM t WHERE id >= 3 AND id <= 6"), range_scan);
}

/// DELETE through SQL keeps the index consistent with the heap.
#[test]
fn test_sql_delete_maintains_index() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table("t", vec![ColumnSchema::new("id", DataType::Int, 0)])
        .unwrap();
    db.create_index("t_id_idx", "t", "id").unwrap();
    for id in 0..10 {
        db.execute(&format!("INSERT INTO t (id) VALUES ({})", id))
            .unwrap()
            .for_each(drop);
    }

    let result: Vec<Row> = db
        .execute("DELETE FROM t WHERE id >= 5")
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(result[0].values()[1], Value::Int(5));

    for id in 0..10 {
        let hits = db.index().search_rids("t_id_idx", id).unwrap();
        assert_eq!(hits.len(), usize::from(id < 5), "key {}", id);
    }
    assert_eq!(rows(&db, "SELECT * FROM t").len(), 5);
}

/// Early termination of a SELECT stream releases the pipeline; the
/// engine stays usable.
#[test]
fn test_abandoned_select_stream() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    db.create_table("t", vec![ColumnSchema::new("id", DataType::Int, 0)])
        .unwrap();
    for id in 0..100 {
        db.insert("t", &Record::new(vec![Value::Int(id)])).unwrap();
    }

    {
        let mut stream = db.execute("SELECT * FROM t").unwrap();
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.values()[0], Value::Int(0));
        // Stream dropped here with 99 rows unread.
    }

    assert_eq!(rows(&db, "SELECT * FROM t").len(), 100);
}

/// Mutations observed through a cold cache: rows survive a reopen.
#[test]
fn test_rows_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let db = open_db(dir.path());
        db.create_table(
            "t",
            vec![
                ColumnSchema::new("id", DataType::Int, 0),
                ColumnSchema::new("name", DataType::Varchar, 30),
            ],
        )
        .unwrap();
        db.execute("INSERT INTO t (id, name) VALUES (42, 'persisted')")
            .unwrap()
            .for_each(drop);
    }

    // New engine instance over the same directory; the catalog is
    // in-memory, so the table is re-registered against the same file.
    let db = open_db(dir.path());
    db.catalog()
        .register_table(marrow_storage::TableSchema::new(
            "t",
            vec![
                ColumnSchema::new("id", DataType::Int, 0),
                ColumnSchema::new("name", DataType::Varchar, 30),
            ],
            dir.path().join("t.tbl"),
        ))
        .unwrap();

    let result = rows(&db, "SELECT * FROM t");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].values()[1], Value::Varchar("persisted".into()));
}
