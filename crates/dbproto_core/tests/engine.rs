//! End-to-end scenarios through the public `Server` surface.

use dbproto_core::{
    join_tables, JoinType, Query, Row, Scalar, Server, ServerConfig,
};
use dbproto_storage::{EncryptionKey, KEY_SIZE};
use std::collections::HashMap;
use tempfile::TempDir;

fn test_server(root: &TempDir) -> Server {
    let key = EncryptionKey::from_bytes(&[42u8; KEY_SIZE]).unwrap();
    let config = ServerConfig::new(key)
        .server_dir(root.path().join("databases"))
        .backup_dir(root.path().join("backups"));
    let server = Server::new(config);
    server.initialize().unwrap();
    server
}

fn row(pairs: &[(&str, Scalar)]) -> Row {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

#[test]
fn integer_primary_key_round_trip() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);
    let db = server.create_database("app").unwrap();
    let users = db.create_table("users", "id").unwrap();

    users
        .insert(row(&[("id", 1.into()), ("name", "Ada".into())]))
        .unwrap();

    let by_int = users.select(1).unwrap();
    assert_eq!(by_int["id"], Scalar::Int(1));
    assert_eq!(by_int["name"], Scalar::Text("Ada".to_string()));

    let by_string = users.select("1").unwrap();
    assert_eq!(by_string, by_int);
}

#[test]
fn update_preserves_index() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);
    let db = server.create_database("app").unwrap();
    let users = db.create_table("users", "id").unwrap();

    users
        .insert(row(&[("id", "u1".into()), ("role", "admin".into())]))
        .unwrap();
    users.update("u1", row(&[("role", "user".into())])).unwrap();

    let as_user = users
        .select_with_filter(row(&[("role", "user".into())]))
        .unwrap();
    assert_eq!(as_user.len(), 1);
    assert_eq!(as_user[0]["id"], Scalar::Text("u1".to_string()));

    let as_admin = users
        .select_with_filter(row(&[("role", "admin".into())]))
        .unwrap();
    assert!(as_admin.is_empty());
}

#[test]
fn transaction_rollback_restores_record_and_file() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);
    let db = server.create_database("app").unwrap();
    let table = db.create_table("kv", "id").unwrap();

    table
        .insert(row(&[("id", "k".into()), ("v", 1.into())]))
        .unwrap();

    let mut txn = table.begin();
    txn.update("k", row(&[("v", 2.into())])).unwrap();
    txn.rollback().unwrap();

    assert_eq!(table.select("k").unwrap()["v"], Scalar::Int(1));

    // The file's decrypted contents match: a fresh server over the same
    // directory sees the rolled-back value.
    drop(table);
    drop(db);
    drop(server);
    let server = test_server(&root);
    let table = server.database("app").unwrap().table("kv").unwrap();
    assert_eq!(table.select("k").unwrap()["v"], Scalar::Int(1));
}

#[test]
fn join_semantics() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);
    let db = server.create_database("app").unwrap();
    let t1 = db.create_table("users", "id").unwrap();
    let t2 = db.create_table("ages", "uid").unwrap();

    t1.insert(row(&[("id", 1.into()), ("name", "A".into())]))
        .unwrap();
    t1.insert(row(&[("id", 2.into()), ("name", "B".into())]))
        .unwrap();
    t2.insert(row(&[("uid", 1.into()), ("age", 30.into())]))
        .unwrap();

    let left = join_tables(&t1, &t2, "id", "uid", JoinType::Left).unwrap();
    assert_eq!(left.len(), 2);
    let matched = left
        .iter()
        .find(|r| r.get("t1.id") == Some(&Scalar::Int(1)))
        .unwrap();
    assert_eq!(matched["t1.name"], Scalar::Text("A".to_string()));
    assert_eq!(matched["t2.uid"], Scalar::Int(1));
    assert_eq!(matched["t2.age"], Scalar::Int(30));
    let unmatched = left
        .iter()
        .find(|r| r.get("t1.id") == Some(&Scalar::Int(2)))
        .unwrap();
    assert_eq!(unmatched["t1.name"], Scalar::Text("B".to_string()));
    assert!(!unmatched.contains_key("t2.uid"));

    let inner = join_tables(&t1, &t2, "id", "uid", JoinType::Inner).unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0]["t1.id"], Scalar::Int(1));
}

#[test]
fn query_scans_the_most_selective_index() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);
    let db = server.create_database("app").unwrap();
    let table = db.create_table("items", "id").unwrap();

    // Selectivity: `rare` 1/100, `common` 90/100.
    for n in 0..100i64 {
        let mut r = row(&[("id", n.into())]);
        if n < 90 {
            r.insert("common".to_string(), "y".into());
        }
        if n == 5 {
            r.insert("rare".to_string(), "x".into());
        }
        table.insert(r).unwrap();
    }

    let query = Query {
        filters: row(&[("rare", "x".into()), ("common", "y".into())]),
        ..Query::default()
    };
    assert_eq!(table.plan(&query).index_to_use.as_deref(), Some("rare"));

    let before = table.metrics().index_lookups();
    let results = table.query(&query).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], Scalar::Int(5));
    assert_eq!(table.metrics().index_lookups(), before + 1);
    assert_eq!(table.metrics().full_scans(), 0);
}

#[test]
fn backup_and_restore_reproduce_every_table() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);

    let mut snapshots: HashMap<(String, String), Vec<Row>> = HashMap::new();
    for db_name in ["north", "south"] {
        let db = server.create_database(db_name).unwrap();
        for table_name in ["users", "orders"] {
            let table = db.create_table(table_name, "id").unwrap();
            for n in 0..100i64 {
                table
                    .insert(row(&[
                        ("id", n.into()),
                        ("label", format!("{db_name}-{table_name}-{n}").into()),
                    ]))
                    .unwrap();
            }
            let mut all = table.select_all().unwrap();
            all.sort_by_key(|r| r["id"].key_string());
            snapshots.insert((db_name.to_string(), table_name.to_string()), all);
        }
    }

    let backup_path = server.backup_databases().unwrap();
    assert!(backup_path.exists());

    for db_name in ["north", "south"] {
        std::fs::remove_dir_all(root.path().join("databases").join(db_name)).unwrap();
    }
    server.load_databases().unwrap();
    assert!(server.list_databases().is_empty());

    server.restore_databases().unwrap();
    assert_eq!(server.list_databases(), ["north", "south"]);
    for ((db_name, table_name), expected) in snapshots {
        let table = server
            .database(&db_name)
            .unwrap()
            .table(&table_name)
            .unwrap();
        let mut all = table.select_all().unwrap();
        all.sort_by_key(|r| r["id"].key_string());
        assert_eq!(all, expected);
    }
}

#[test]
fn restart_reproduces_table_state() {
    let root = TempDir::new().unwrap();
    {
        let server = test_server(&root);
        let db = server.create_database("app").unwrap();
        let table = db.create_table("events", "id").unwrap();
        for n in 0..50i64 {
            table
                .insert(row(&[("id", n.into()), ("payload", format!("e{n}").into())]))
                .unwrap();
        }
        table.delete(13).unwrap();
        table.update("17", row(&[("payload", "patched".into())])).unwrap();
    }

    let server = test_server(&root);
    let table = server.database("app").unwrap().table("events").unwrap();
    let all = table.select_all().unwrap();
    assert_eq!(all.len(), 49);
    assert!(table.select(13).is_err());
    assert_eq!(
        table.select(17).unwrap()["payload"],
        Scalar::Text("patched".to_string())
    );
}

#[test]
fn batch_operations_survive_reload() {
    let root = TempDir::new().unwrap();
    let server = test_server(&root);
    let db = server.create_database("app").unwrap();
    let table = db.create_table("bulk", "id").unwrap();

    let rows: Vec<Row> = (0..10i64)
        .map(|n| row(&[("id", n.into()), ("n", n.into())]))
        .collect();
    assert!(table.insert_many(rows).is_empty());

    let mut updates = HashMap::new();
    updates.insert("3".to_string(), row(&[("n", 30.into())]));
    updates.insert("4".to_string(), row(&[("n", 40.into())]));
    assert!(table.update_many(updates).is_empty());

    assert!(table.delete_many(vec![Scalar::Int(9)]).is_empty());

    drop(table);
    drop(db);
    drop(server);
    let server = test_server(&root);
    let table = server.database("app").unwrap().table("bulk").unwrap();
    assert_eq!(table.select_all().unwrap().len(), 9);
    assert_eq!(table.select(3).unwrap()["n"], Scalar::Int(30));
    assert_eq!(table.select(4).unwrap()["n"], Scalar::Int(40));
}
