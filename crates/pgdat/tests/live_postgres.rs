//! Round trips against a real PostgreSQL server.
//!
//! Set `DATABASE_URL` (directly or in a `.env` file) to run these; without it
//! every test returns early.

use pgdat::tokio_postgres::{self, Client, NoTls};
use pgdat::{
    Array, Builder, DatError, DocExecer, Execer, FromRow, Tx, TxState, delete_from, insect,
    insert_into, select, select_doc, update, upsert,
};
use serde::Deserialize;
use std::time::Duration;

async fn connect() -> Option<Client> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL").ok()?;
    let (client, connection) = tokio_postgres::connect(&url, NoTls)
        .await
        .expect("DATABASE_URL is set but the server is unreachable");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
        .batch_execute(
            "CREATE TEMP TABLE people (
                id bigserial PRIMARY KEY,
                name text NOT NULL,
                email text,
                tags text[] NOT NULL DEFAULT '{}'
            )",
        )
        .await
        .expect("create temp table");
    Some(client)
}

#[derive(Debug, FromRow)]
struct Person {
    id: i64,
    name: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonDoc {
    id: i64,
    name: String,
}

async fn add(db: &Client, name: &str) -> i64 {
    insert_into("people")
        .columns(["name"])
        .values((name,))
        .returning(["id"])
        .query_scalar(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn crud_round_trip() {
    let Some(db) = connect().await else { return };

    let id = add(&db, "Ann").await;
    add(&db, "Bob").await;

    let people: Vec<Person> = select(["id", "name", "email"])
        .from("people")
        .order_by("id")
        .query_structs(&db)
        .await
        .unwrap();
    assert_eq!(people.len(), 2);
    assert_eq!(people[0].name, "Ann");
    assert!(people[0].email.is_none());

    let n = update("people")
        .set("email", "ann@example.com")
        .where_sql("id = $1", (id,))
        .exec(&db)
        .await
        .unwrap();
    assert_eq!(n, 1);

    let ann: Person = select(["id", "name", "email"])
        .from("people")
        .where_map([("id", id)])
        .query_struct(&db)
        .await
        .unwrap();
    assert_eq!(ann.email.as_deref(), Some("ann@example.com"));

    let names: Vec<String> = select(["name"])
        .from("people")
        .where_sql("id IN $1", (vec![id, id + 1],))
        .order_by("name")
        .query_slice(&db)
        .await
        .unwrap();
    assert_eq!(names, vec!["Ann", "Bob"]);

    let bound: Vec<String> = select(["name"])
        .from("people")
        .where_sql("id = ANY($1)", (Array::new([id, id + 1]),))
        .order_by("name")
        .set_is_interpolated(false)
        .query_slice(&db)
        .await
        .unwrap();
    assert_eq!(bound, names);

    let deleted = delete_from("people").where_sql("name = $1", ("Bob",)).exec(&db).await.unwrap();
    assert_eq!(deleted, 1);

    let missing = select(["id"])
        .from("people")
        .where_sql("name = $1", ("nobody",))
        .query_struct::<Person, _>(&db)
        .await;
    assert!(matches!(missing, Err(DatError::NotFound(_))));
}

#[tokio::test]
async fn interpolated_statement_matches_bound_one() {
    let Some(db) = connect().await else { return };
    add(&db, "O'Brien").await;

    let bound: i64 = select(["count(*)"])
        .from("people")
        .where_sql("name = $1", ("O'Brien",))
        .query_scalar(&db)
        .await
        .unwrap();
    let b = select(["count(*)"])
        .from("people")
        .where_sql("name = $1", ("O'Brien",))
        .set_is_interpolated(true);
    let (sql, args) = b.interpolate().unwrap();
    assert!(args.is_empty(), "{sql}");
    let inlined: i64 = b.query_scalar(&db).await.unwrap();
    assert_eq!(bound, inlined);
    assert_eq!(inlined, 1);
}

#[tokio::test]
async fn insect_and_upsert_are_idempotent() {
    let Some(db) = connect().await else { return };

    let first: i64 = insect("people")
        .columns(["name", "email"])
        .values(("Cy", "cy@example.com"))
        .where_sql("email = $1", ("cy@example.com",))
        .returning(["id"])
        .query_scalar(&db)
        .await
        .unwrap();
    let second: i64 = insect("people")
        .columns(["name", "email"])
        .values(("Cy", "cy@example.com"))
        .where_sql("email = $1", ("cy@example.com",))
        .returning(["id"])
        .query_scalar(&db)
        .await
        .unwrap();
    assert_eq!(first, second);

    let up: i64 = upsert("people")
        .columns(["name", "email"])
        .values(("Cyrus", "cy@example.com"))
        .where_sql("email = $1", ("cy@example.com",))
        .returning(["id"])
        .query_scalar(&db)
        .await
        .unwrap();
    assert_eq!(up, first);
    let name: String = select(["name"])
        .from("people")
        .where_sql("id = $1", (up,))
        .query_scalar(&db)
        .await
        .unwrap();
    assert_eq!(name, "Cyrus");
}

#[tokio::test]
async fn documents_and_json() {
    let Some(db) = connect().await else { return };
    let id = add(&db, "Dee").await;

    let doc: PersonDoc = select_doc(["id", "name"])
        .from("people")
        .where_sql("id = $1", (id,))
        .query_doc(&db)
        .await
        .unwrap();
    assert_eq!(doc.id, id);
    assert_eq!(doc.name, "Dee");

    let docs: Vec<PersonDoc> = select_doc(["id", "name"])
        .from("people")
        .query_docs(&db)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);

    let none: Vec<PersonDoc> = select(["id", "name"])
        .from("people")
        .where_sql("false", ())
        .query_object(&db)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn rolled_back_transaction_leaves_no_rows() {
    let Some(db) = connect().await else { return };

    let tx = Tx::begin(&db).await.unwrap();
    insert_into("people").columns(["name"]).values(("Eve",)).exec(&tx).await.unwrap();
    {
        let inner = tx.begin_nested().await.unwrap();
        insert_into("people").columns(["name"]).values(("Fay",)).exec(&inner).await.unwrap();
        inner.commit().await.unwrap();
    }
    tx.rollback().await.unwrap();
    assert_eq!(tx.state().await, TxState::RolledBack);

    let count: i64 = select(["count(*)"]).from("people").query_scalar(&db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn timeout_cancels_query() {
    let Some(db) = connect().await else { return };
    let err = pgdat::raw("SELECT pg_sleep(5)", ())
        .timeout(Duration::from_millis(100))
        .exec(&db)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}
