use std::time::Duration;

use shrinkray_core::{NewUrl, OwnerId, ShortCode, StorageError, UrlId, UrlStats};
use shrinkray_storage::postgres::SCHEMA;
use shrinkray_storage::{OwnershipStore, PgOwnershipStore, PgUrlStore, UrlStore};
use shrinkray_test_infra::postgres::{PostgresConfig, PostgresServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

struct Fixture {
    _postgres: PostgresServer,
    pool: PgPool,
    urls: PgUrlStore,
    owners: PgOwnershipStore,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let pool = connect_with_retry(&url).await;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .expect("create schema");

        Self {
            _postgres: postgres,
            urls: PgUrlStore::new(pool.clone()),
            owners: PgOwnershipStore::new(pool.clone()),
            pool,
        }
    }

    async fn row_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM url_rows")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn insert_owned(&self, code: &str, url: &str, owner: OwnerId) -> UrlId {
        let id = self.urls.insert(new_url(code, url)).await.unwrap();
        self.owners.assign_owner(id, owner).await.unwrap();
        id
    }
}

async fn connect_with_retry(url: &str) -> PgPool {
    let mut last_error = None;

    for _ in 0..20 {
        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

fn new_url(short: &str, url: &str) -> NewUrl {
    NewUrl::new(code(short), url)
}

#[tokio::test]
async fn ping_reaches_the_database() {
    let fixture = Fixture::start().await;
    fixture.urls.ping().await.unwrap();

    fixture.pool.close().await;
    let err = fixture.urls.ping().await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}

#[tokio::test]
async fn insert_and_find_by_short_code() {
    let fixture = Fixture::start().await;

    let id = fixture
        .urls
        .insert(new_url("abc123", "https://example.com"))
        .await
        .unwrap();

    let row = fixture
        .urls
        .find_by_short_code(&code("abc123"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.id, id);
    assert_eq!(row.original_url, "https://example.com");
    assert_eq!(row.owner_id, None);
    assert!(!row.deleted);

    assert!(fixture
        .urls
        .find_by_short_code(&code("missing"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_original_url_conflicts() {
    let fixture = Fixture::start().await;

    fixture
        .urls
        .insert(new_url("a1", "https://a.example"))
        .await
        .unwrap();
    let err = fixture
        .urls
        .insert(new_url("a2", "https://a.example"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::DuplicateOriginalUrl(url) if url == "https://a.example"));
    assert_eq!(
        fixture
            .urls
            .find_by_original_url("https://a.example")
            .await
            .unwrap(),
        Some(code("a1"))
    );
}

#[tokio::test]
async fn batch_with_duplicate_rolls_back_entirely() {
    let fixture = Fixture::start().await;
    fixture
        .urls
        .insert(new_url("a1", "https://a.example"))
        .await
        .unwrap();

    let err = fixture
        .urls
        .batch_insert(vec![
            new_url("b1", "https://b.example"),
            new_url("a2", "https://a.example"),
            new_url("c1", "https://c.example"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::DuplicateOriginalUrl(_)));
    assert_eq!(fixture.row_count().await, 1);
    assert!(fixture
        .urls
        .find_by_original_url("https://b.example")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn batch_insert_returns_ids_in_order() {
    let fixture = Fixture::start().await;

    let ids = fixture
        .urls
        .batch_insert(vec![
            new_url("a1", "https://a.example"),
            new_url("b1", "https://b.example"),
        ])
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    let first = fixture
        .urls
        .find_by_short_code(&code("a1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, ids[0]);
}

#[tokio::test]
async fn soft_delete_only_touches_owned_rows() {
    let fixture = Fixture::start().await;
    let alice = OwnerId::new();
    let bob = OwnerId::new();
    fixture.insert_owned("a1", "https://a.example", alice).await;
    fixture.insert_owned("b1", "https://b.example", bob).await;

    fixture
        .urls
        .soft_delete(&[code("a1"), code("b1")], alice)
        .await
        .unwrap();

    let a1 = fixture.urls.find_by_short_code(&code("a1")).await.unwrap().unwrap();
    let b1 = fixture.urls.find_by_short_code(&code("b1")).await.unwrap().unwrap();
    assert!(a1.deleted);
    assert!(!b1.deleted);

    // deleting again is a silent no-op
    fixture.urls.soft_delete(&[code("a1")], alice).await.unwrap();
}

#[tokio::test]
async fn deleted_original_url_can_be_shortened_again() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new();
    fixture.insert_owned("a1", "https://a.example", owner).await;
    fixture.urls.soft_delete(&[code("a1")], owner).await.unwrap();

    fixture
        .urls
        .insert(new_url("a2", "https://a.example"))
        .await
        .unwrap();

    assert_eq!(
        fixture
            .urls
            .find_by_original_url("https://a.example")
            .await
            .unwrap(),
        Some(code("a2"))
    );
}

#[tokio::test]
async fn assign_owner_to_unknown_id_is_not_found() {
    let fixture = Fixture::start().await;

    let err = fixture
        .owners
        .assign_owner(UrlId::new(), OwnerId::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn batch_owner_mismatch_assigns_nothing() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new();
    let id = fixture
        .urls
        .insert(new_url("a1", "https://a.example"))
        .await
        .unwrap();

    let err = fixture
        .owners
        .assign_owner_batch(&[id, UrlId::new()], owner)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::CountMismatch {
            expected: 2,
            actual: 1
        }
    ));
    assert!(fixture.urls.find_by_owner(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn stats_count_urls_and_owners() {
    let fixture = Fixture::start().await;
    let owner = OwnerId::new();
    fixture.insert_owned("a1", "https://a.example", owner).await;
    fixture.insert_owned("b1", "https://b.example", owner).await;
    fixture
        .urls
        .insert(new_url("c1", "https://c.example"))
        .await
        .unwrap();

    assert_eq!(
        fixture.urls.stats().await.unwrap(),
        UrlStats { urls: 3, users: 1 }
    );
}
