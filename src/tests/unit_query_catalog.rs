use crate::database::queries::{QueryCatalog, QuerySource, SqlQuery};
use crate::error::WikiDbError;
use serde_json::{json, Map, Value};
use std::io::Write;
use tempfile::NamedTempFile;

// write a queries file with every key, then apply `edit` to it
fn queries_file(edit: impl FnOnce(&mut Map<String, Value>)) -> NamedTempFile {
    let mut entries = Map::new();
    for query in SqlQuery::ALL {
        entries.insert(
            query.resource_key(),
            json!(format!("SELECT '{}'", query.resource_key())),
        );
    }
    edit(&mut entries);

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(file, "{}", Value::Object(entries)).unwrap();
    file
}

fn assert_configuration_error(result: Result<QueryCatalog, WikiDbError>, needle: &str) {
    match result {
        Err(WikiDbError::Configuration(msg)) => {
            assert!(msg.contains(needle), "'{}' should mention '{}'", msg, needle)
        }
        Err(other) => panic!("Expected a configuration error, got {}", other),
        Ok(_) => panic!("Expected a configuration error, got a catalog"),
    }
}

#[test]
fn test_bundled_queries_cover_every_key() {
    let catalog = QueryCatalog::load(&QuerySource::Bundled).expect("Bundled queries should load");

    for query in SqlQuery::ALL {
        assert!(!catalog.get(query).trim().is_empty(), "{} is empty", query);
    }
    assert!(catalog
        .get(SqlQuery::CreatePagesTable)
        .contains("IF NOT EXISTS"));
}

#[test]
fn test_file_override_replaces_bundled_queries() {
    let file = queries_file(|_| {});

    let catalog = QueryCatalog::load(&QuerySource::File(file.path().to_path_buf())).unwrap();

    assert_eq!(catalog.get(SqlQuery::DeletePage), "SELECT 'sql.page.delete'");
}

// extra keys are ignored
#[test]
fn test_unknown_keys_are_ignored() {
    let file = queries_file(|entries| {
        entries.insert("sql.page.search".to_string(), json!("SELECT 1"));
    });

    assert!(QueryCatalog::load(&QuerySource::File(file.path().to_path_buf())).is_ok());
}

#[test]
fn test_missing_key_is_a_configuration_error() {
    let file = queries_file(|entries| {
        entries.remove("sql.page.update");
    });

    let result = QueryCatalog::load(&QuerySource::File(file.path().to_path_buf()));
    assert_configuration_error(result, "sql.page.update");
}

#[test]
fn test_blank_query_is_a_configuration_error() {
    let file = queries_file(|entries| {
        entries.insert("sql.page.get.all".to_string(), json!("   "));
    });

    let result = QueryCatalog::load(&QuerySource::File(file.path().to_path_buf()));
    assert_configuration_error(result, "sql.page.get.all");
}

#[test]
fn test_missing_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.json");

    let result = QueryCatalog::load(&QuerySource::File(path));
    assert_configuration_error(result, "nope.json");
}

#[test]
fn test_malformed_resource_is_a_configuration_error() {
    assert_configuration_error(QueryCatalog::from_json("sql.create.db=CREATE"), "Malformed");
    // values have to be strings
    assert_configuration_error(
        QueryCatalog::from_json(r#"{ "sql.create.db": 1 }"#),
        "Malformed",
    );
}
