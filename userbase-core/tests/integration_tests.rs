//! Integration tests for userbase-core storage and services
//!
//! All database operations run against real DuckDB files in a temp dir.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;
use tempfile::TempDir;

use userbase_core::adapters::duckdb::DuckDbUserRepository;
use userbase_core::adapters::memory::InMemoryUserCache;
use userbase_core::config::StorageBackend;
use userbase_core::ports::UserRepository;
use userbase_core::services::{LogEvent, LogFilter, LoggingService};
use userbase_core::{EntryPoint, Error, User, UserPatch, UserService, UserbaseContext};

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a file-backed repository with schema initialized
fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbUserRepository> {
    let db_path = temp_dir.path().join("users.duckdb");
    let repo = DuckDbUserRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

fn create_service(repo: Arc<DuckDbUserRepository>) -> UserService {
    UserService::new(repo, Arc::new(InMemoryUserCache::new()))
}

// ============================================================================
// Repository Tests
// ============================================================================

#[test]
fn test_users_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let created = {
        let service = create_service(create_test_repo(&temp_dir));
        let ada = service.create_user("Ada", "ada@example.com").unwrap();
        let grace = service.create_user("Grace", "grace@example.com").unwrap();
        vec![ada, grace]
    };

    // Second open must not re-run migrations or reset the id sequence
    let repo = create_test_repo(&temp_dir);
    assert_eq!(repo.list_users().unwrap(), created);

    let service = create_service(repo);
    let third = service.create_user("Linus", "linus@example.com").unwrap();
    assert_eq!(third.id, 3);
}

#[test]
fn test_created_timestamp_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);

    let mut user = User::new("Ada", "ada@example.com");
    user.id = repo.insert_user(&user).unwrap();

    let loaded = repo.get_user(user.id).unwrap().expect("user should exist");
    assert_eq!(loaded.created, user.created);
    assert_eq!(loaded, user);
}

#[test]
fn test_update_and_delete_against_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_service(create_test_repo(&temp_dir));

    let user = service.create_user("Ada", "ada@example.com").unwrap();
    let patch = UserPatch {
        name: None,
        email: Some("ada@lovelace.dev".to_string()),
    };
    let updated = service.update_user(user.id, &patch).unwrap();
    assert_eq!(updated.email, "ada@lovelace.dev");
    assert_eq!(updated.created, user.created);

    service.delete_user(user.id).unwrap();
    assert!(matches!(service.get_user(user.id), Err(Error::NotFound(_))));
    assert_eq!(service.count().unwrap(), 0);
}

#[test]
fn test_concurrent_creates_serialize() {
    let temp_dir = TempDir::new().unwrap();
    let service = Arc::new(create_service(create_test_repo(&temp_dir)));

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                for i in 0..5 {
                    service
                        .create_user(&format!("t{}-{}", t, i), &format!("t{}-{}@example.com", t, i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let users = service.list_users().unwrap();
    assert_eq!(users.len(), 30);
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    assert_eq!(ids, (1..=30).collect::<Vec<_>>());
}

// ============================================================================
// Context Tests
// ============================================================================

#[test]
fn test_context_records_events() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = UserbaseContext::new(temp_dir.path(), EntryPoint::Cli).unwrap();
    assert_eq!(ctx.config.storage, StorageBackend::Duckdb);

    let user = ctx.user_service.create_user("Ada", "ada@example.com").unwrap();
    assert!(temp_dir.path().join("users.duckdb").exists());

    let logger = ctx.logging_service.as_ref().expect("event log should open");
    let recent = logger.entries(&LogFilter::recent(10)).unwrap();
    assert!(recent
        .iter()
        .any(|e| e.event == "user_created" && e.user_id == Some(user.id)));
}

#[test]
fn test_context_memory_backend_from_settings() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("settings.json"),
        r#"{ "storage": { "backend": "memory" } }"#,
    )
    .unwrap();

    let ctx = UserbaseContext::new(temp_dir.path(), EntryPoint::Cli).unwrap();
    assert_eq!(ctx.config.storage, StorageBackend::Memory);
    ctx.user_service.create_user("Ada", "ada@example.com").unwrap();
    assert!(!temp_dir.path().join("users.duckdb").exists());
}

#[test]
fn test_logging_service_reopens_existing_log() {
    let temp_dir = TempDir::new().unwrap();
    {
        let logger = LoggingService::new(temp_dir.path(), EntryPoint::Server, "test").unwrap();
        logger.log(LogEvent::new("server_started")).unwrap();
    }

    let logger = LoggingService::new(temp_dir.path(), EntryPoint::Cli, "test").unwrap();
    assert_eq!(logger.count().unwrap(), 1);
}
