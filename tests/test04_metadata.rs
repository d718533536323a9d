use std::sync::Arc;

use sql_prepared::metadata::{ColumnDefinition, ParameterDefinition};
use sql_prepared::prelude::*;
use sql_prepared::test_utils::{MockProtocol, ProbeBehavior};

fn setup(sql: &str) -> (ClientPreparedStatement, Arc<MockProtocol>) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    let mock = Arc::new(MockProtocol::new());
    let conn = Arc::new(Connection::new(mock.clone(), StatementOptions::default()));
    let stmt = conn.prepare_statement(sql).unwrap();
    (stmt, mock)
}

fn described() -> ProbeMetadata {
    ProbeMetadata {
        result: Some(ResultSetMetadata::new(vec![
            ColumnDefinition::new("id", "BIGINT"),
            ColumnDefinition::new("email", "VARCHAR"),
        ])),
        parameters: ParameterMetadata::Known(vec![ParameterDefinition {
            type_name: "BIGINT".into(),
            nullable: false,
            signed: true,
            precision: 19,
            scale: 0,
        }]),
    }
}

#[tokio::test]
async fn test04_metadata_is_probed_once() {
    let (mut stmt, mock) = setup("SELECT id, email FROM users WHERE id = ?");
    mock.set_probe(ProbeBehavior::Describe(described()));

    let first = stmt.metadata().await.unwrap().unwrap();
    let second = stmt.metadata().await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.column_names(), vec!["id", "email"]);

    let params = stmt.parameter_metadata().await.unwrap();
    assert_eq!(params.parameter_count(), Some(1));
    assert_eq!(params.parameter(1).map(|p| p.type_name.as_str()), Some("BIGINT"));

    assert_eq!(mock.probes_opened(), 1);
    assert_eq!(mock.probes_closed(), 1);
}

#[tokio::test]
async fn test04_statement_without_rows_has_no_result_metadata() {
    let (mut stmt, mock) = setup("UPDATE users SET email = ? WHERE id = ?");

    assert!(stmt.metadata().await.unwrap().is_none());
    assert!(stmt.metadata().await.unwrap().is_none());
    assert_eq!(mock.probes_opened(), 2);

    // Parameter metadata is cached after the first describe.
    assert!(!stmt.parameter_metadata().await.unwrap().is_unknown());
    assert_eq!(mock.probes_opened(), 2);
    assert_eq!(mock.probes_closed(), 2);
}

#[tokio::test]
async fn test04_syntax_error_propagates_and_is_not_cached() {
    let (mut stmt, mock) = setup("SELEC id FROM users WHERE id = ?");
    mock.set_probe(ProbeBehavior::DescribeFails(ProtocolError::syntax(
        "You have an error in your SQL syntax",
    )));

    let err = stmt.parameter_metadata().await.unwrap_err();
    assert!(matches!(err, SqlPreparedError::Syntax(_)));
    assert_eq!(mock.probes_opened(), 1);
    assert_eq!(mock.probes_closed(), 1);

    let err = stmt.metadata().await.unwrap_err();
    assert!(matches!(err, SqlPreparedError::Syntax(_)));
    assert_eq!(mock.probes_opened(), 2);
    assert_eq!(mock.probes_closed(), 2);
}

#[tokio::test]
async fn test04_syntax_error_when_opening_the_probe() {
    let (mut stmt, mock) = setup("SELECT FROM");
    mock.set_probe(ProbeBehavior::OpenFails(
        ProtocolError::execution("Unknown column").with_sql_state("42S22"),
    ));

    let err = stmt.metadata().await.unwrap_err();
    assert!(matches!(err, SqlPreparedError::Syntax(_)));
    assert_eq!(err.sql_state(), Some("42S22"));
    assert_eq!(mock.probes_opened(), 0);
}

#[tokio::test]
async fn test04_other_failures_degrade_to_unknown() {
    let (mut stmt, mock) = setup("CALL refresh(?)");
    mock.set_probe(ProbeBehavior::DescribeFails(ProtocolError::unsupported(
        "This command is not supported in the prepared statement protocol yet",
    )));

    let params = stmt.parameter_metadata().await.unwrap();
    assert!(params.is_unknown());
    assert_eq!(params.parameter_count(), None);
    assert!(stmt.metadata().await.unwrap().is_none());

    let again = stmt.parameter_metadata().await.unwrap();
    assert!(Arc::ptr_eq(&params, &again));
    assert_eq!(mock.probes_opened(), 2);
    assert_eq!(mock.probes_closed(), 2);
}

#[tokio::test]
async fn test04_result_metadata_recovers_after_transient_failure() {
    let (mut stmt, mock) = setup("SELECT id, email FROM users WHERE id = ?");
    mock.set_probe(ProbeBehavior::DescribeFails(ProtocolError::execution("transient")));
    assert!(stmt.metadata().await.unwrap().is_none());
    assert!(stmt.parameter_metadata().await.unwrap().is_unknown());

    mock.set_probe(ProbeBehavior::Describe(described()));
    let metadata = stmt.metadata().await.unwrap().unwrap();
    assert_eq!(metadata.column_names(), vec!["id", "email"]);
    assert_eq!(stmt.parameter_metadata().await.unwrap().parameter_count(), Some(1));
    assert_eq!(mock.probes_opened(), 2);

    // Cached from here on.
    stmt.metadata().await.unwrap();
    assert_eq!(mock.probes_opened(), 2);
}

#[tokio::test]
async fn test04_executed_result_set_metadata_wins_over_probe() {
    let (mut stmt, mock) = setup("SELECT name FROM users WHERE id = ?");
    let columns = Arc::new(ResultSetMetadata::new(vec![ColumnDefinition::new(
        "name", "VARCHAR",
    )]));
    mock.set_result_set(Some(ResultSet::new(Arc::clone(&columns))));
    stmt.set_parameter(1, 1).unwrap();
    stmt.execute().await.unwrap();

    let metadata = stmt.metadata().await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&metadata, &columns));
    assert_eq!(mock.probes_opened(), 0);
}

#[tokio::test]
async fn test04_clone_shares_cached_metadata() {
    let (mut stmt, mock) = setup("SELECT id, email FROM users WHERE id = ?");
    mock.set_probe(ProbeBehavior::Describe(described()));
    let original_meta = stmt.metadata().await.unwrap().unwrap();
    let original_params = stmt.parameter_metadata().await.unwrap();

    let mut clone = stmt.clone_statement().unwrap();
    let clone_meta = clone.metadata().await.unwrap().unwrap();
    let clone_params = clone.parameter_metadata().await.unwrap();

    assert!(Arc::ptr_eq(&original_meta, &clone_meta));
    assert!(Arc::ptr_eq(&original_params, &clone_params));
    assert_eq!(mock.probes_opened(), 1);
}
