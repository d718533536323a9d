use std::sync::Arc;
use std::time::Duration;

use sql_prepared::metadata::ColumnDefinition;
use sql_prepared::prelude::*;
use sql_prepared::test_utils::MockProtocol;

fn setup(
    mock: MockProtocol,
    sql: &str,
    options: StatementOptions,
) -> (ClientPreparedStatement, Arc<MockProtocol>) {
    let mock = Arc::new(mock);
    let conn = Arc::new(Connection::new(mock.clone(), options));
    let stmt = conn.prepare_statement(sql).unwrap();
    (stmt, mock)
}

fn users_result_set() -> ResultSet {
    let metadata = Arc::new(ResultSetMetadata::new(vec![
        ColumnDefinition::new("id", "BIGINT"),
        ColumnDefinition::new("name", "VARCHAR"),
    ]));
    let mut rs = ResultSet::new(metadata);
    rs.add_row_values(vec![ParameterValue::Int(1), ParameterValue::Text("alice".into())]);
    rs
}

#[tokio::test]
async fn test02_update_reports_count() {
    let (mut stmt, mock) = setup(
        MockProtocol::new(),
        "UPDATE t SET a = ? WHERE b = ?",
        StatementOptions::default(),
    );
    mock.set_update_count(3);
    stmt.set_parameter(1, 1).unwrap();
    stmt.set_parameter(2, 2).unwrap();

    assert!(!stmt.execute().await.unwrap());
    assert_eq!(stmt.update_count(), Some(3));
    assert_eq!(stmt.execute_update().await.unwrap(), 3);
    assert_eq!(stmt.execute_large_update().await.unwrap(), 3);
    assert_eq!(mock.executed().len(), 3);

    let results = stmt.results().unwrap();
    assert!(results.is_ended());
    assert!(!results.is_batch());
}

#[tokio::test]
async fn test02_query_returns_rows() {
    let (mut stmt, mock) = setup(
        MockProtocol::new(),
        "SELECT id, name FROM users WHERE id = ?",
        StatementOptions::builder().fetch_size(50).build().unwrap(),
    );
    mock.set_result_set(Some(users_result_set()));
    stmt.set_parameter(1, 1).unwrap();

    assert!(stmt.execute().await.unwrap());
    let rs = stmt.execute_query().await.unwrap();
    assert_eq!(rs.len(), 1);
    assert_eq!(
        rs.rows()[0].get("name"),
        Some(&ParameterValue::Text("alice".into()))
    );
    assert_eq!(stmt.results().unwrap().fetch_size(), 50);

    // Row-producing executions report no update count.
    assert_eq!(stmt.execute_update().await.unwrap(), 0);
    assert_eq!(stmt.update_count(), None);
}

#[tokio::test]
async fn test02_query_on_update_statement_returns_empty_rows() {
    let (mut stmt, _mock) = setup(
        MockProtocol::new(),
        "DELETE FROM t WHERE id = ?",
        StatementOptions::default(),
    );
    stmt.set_parameter(1, 9).unwrap();
    let rs = stmt.execute_query().await.unwrap();
    assert!(rs.is_empty());
    assert!(rs.metadata().is_none());
}

#[tokio::test]
async fn test02_server_failure_is_wrapped_and_results_finalised() {
    let (mut stmt, mock) = setup(
        MockProtocol::new().with_thread_id(7),
        "INSERT INTO t VALUES (?)",
        StatementOptions::builder()
            .dump_queries_on_exception(true)
            .build()
            .unwrap(),
    );
    mock.fail_matching(
        r"VALUES \(1\)",
        ProtocolError::execution("Duplicate entry '1'")
            .with_sql_state("23000")
            .with_error_code(1062),
    );
    stmt.set_parameter(1, 1).unwrap();

    let err = stmt.execute().await.unwrap_err();
    let SqlPreparedError::ServerExecution(server) = &err else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(server.message, "Duplicate entry '1'");
    assert!(server.context.contains("conn:7(M)"), "{}", server.context);
    assert!(server.context.contains("INSERT INTO t VALUES (?)"), "{}", server.context);
    assert!(server.context.contains("parameters [1]"), "{}", server.context);
    assert_eq!(err.sql_state(), Some("23000"));
    assert_eq!(err.error_code(), 1062);
    assert!(!err.is_local());
    assert!(stmt.results().unwrap().is_ended());

    // The statement stays usable after a failure.
    stmt.set_parameter(1, 2).unwrap();
    assert_eq!(stmt.execute_update().await.unwrap(), 1);
}

#[tokio::test]
async fn test02_syntax_failure_during_execution() {
    let (mut stmt, mock) = setup(MockProtocol::new(), "SELEC ?", StatementOptions::default());
    mock.fail_matching("SELEC", ProtocolError::syntax("You have an error in your SQL syntax"));
    stmt.set_parameter(1, 1).unwrap();

    let err = stmt.execute().await.unwrap_err();
    assert!(matches!(err, SqlPreparedError::Syntax(_)));
    assert_eq!(err.sql_state(), Some("42000"));
}

#[tokio::test(start_paused = true)]
async fn test02_local_timer_bounds_execution() {
    let (mut stmt, mock) = setup(
        MockProtocol::new(),
        "SELECT SLEEP(?)",
        StatementOptions::builder()
            .query_timeout(Some(Duration::from_millis(100)))
            .build()
            .unwrap(),
    );
    mock.set_delay(Some(Duration::from_secs(5)));
    stmt.set_parameter(1, 5).unwrap();

    let err = stmt.execute().await.unwrap_err();
    assert!(matches!(err, SqlPreparedError::Timeout(d) if d == Duration::from_millis(100)));
    assert_eq!(err.sql_state(), Some("70100"));
    assert_eq!(mock.server_timeouts(), vec![None]);
    assert!(stmt.results().unwrap().is_ended());

    // The lock was released: the next execution proceeds.
    mock.set_delay(None);
    assert!(!stmt.execute().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test02_server_enforced_timeout_is_forwarded() {
    let (mut stmt, mock) = setup(
        MockProtocol::new().with_server_timeout(true),
        "SELECT SLEEP(?)",
        StatementOptions::default(),
    );
    mock.set_delay(Some(Duration::from_millis(500)));
    stmt.set_query_timeout(Some(Duration::from_millis(100))).unwrap();
    stmt.set_parameter(1, 1).unwrap();

    // No local timer: the server would be the one to cut the query short.
    stmt.execute().await.unwrap();
    assert_eq!(mock.server_timeouts(), vec![Some(Duration::from_millis(100))]);
}

#[tokio::test]
async fn test02_zero_timeout_is_rejected() {
    let (mut stmt, _mock) = setup(MockProtocol::new(), "SELECT 1", StatementOptions::default());
    let err = stmt.set_query_timeout(Some(Duration::ZERO)).unwrap_err();
    assert!(matches!(err, SqlPreparedError::ConfigError(_)));
    assert_eq!(stmt.options().query_timeout, None);
}

#[tokio::test]
async fn test02_no_backslash_escapes_reaches_the_compiler() {
    let (mut stmt, mock) = setup(
        MockProtocol::new().with_no_backslash_escapes(true),
        "SELECT '\\' , ?",
        StatementOptions::default(),
    );
    assert!(stmt.compiled().no_backslash_escapes());
    assert_eq!(stmt.parameter_count(), 1);
    stmt.set_parameter(1, "a\\b").unwrap();
    stmt.execute().await.unwrap();
    assert_eq!(mock.executed(), vec!["SELECT '\\' , 'a\\b'"]);
}
