use std::sync::Arc;

use sql_prepared::prelude::*;
use sql_prepared::test_utils::MockProtocol;

fn setup(sql: &str, options: StatementOptions) -> (ClientPreparedStatement, Arc<MockProtocol>) {
    let mock = Arc::new(MockProtocol::new().with_thread_id(42).with_primary(false));
    let conn = Arc::new(Connection::new(mock.clone(), options));
    let stmt = conn.prepare_statement(sql).unwrap();
    (stmt, mock)
}

#[tokio::test]
async fn test01_bound_values_reach_their_positions() {
    let (mut stmt, mock) = setup("UPDATE t SET a = ?, b = ? WHERE id = ?", StatementOptions::default());
    assert_eq!(stmt.parameter_count(), 3);

    stmt.set_parameter(3, 7).unwrap();
    stmt.set_parameter(1, "x").unwrap();
    stmt.set_parameter(2, ParameterValue::Null).unwrap();
    stmt.execute().await.unwrap();

    assert_eq!(
        mock.executed_params(),
        vec![vec![
            ParameterValue::Text("x".into()),
            ParameterValue::Null,
            ParameterValue::Int(7),
        ]]
    );
    assert_eq!(mock.executed(), vec!["UPDATE t SET a = 'x', b = NULL WHERE id = 7"]);
}

#[tokio::test]
async fn test01_rebinding_overwrites_previous_value() {
    let (mut stmt, mock) = setup("SELECT ?", StatementOptions::default());
    stmt.set_parameter(1, 1).unwrap();
    stmt.set_parameter(1, 2).unwrap();
    stmt.execute().await.unwrap();
    assert_eq!(mock.executed_params(), vec![vec![ParameterValue::Int(2)]]);
}

#[tokio::test]
async fn test01_out_of_range_index_fails_locally() {
    let (mut stmt, mock) = setup("SELECT ? FROM dual", StatementOptions::default());

    for index in [0, 2, 100] {
        let err = stmt.set_parameter(index, "oops").unwrap_err();
        match &err {
            SqlPreparedError::BindingRange { index: i, value, context } => {
                assert_eq!(*i, index);
                assert_eq!(value, "'oops'");
                assert!(context.contains("conn:42(S)"), "{context}");
                assert!(context.contains("SELECT ? FROM dual"), "{context}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.sql_state(), Some("07009"));
        assert!(err.is_local());
    }
    assert!(mock.executed().is_empty());
    assert_eq!(mock.bulk_attempts(), 0);
}

#[tokio::test]
async fn test01_binding_error_truncates_long_queries() {
    let options = StatementOptions::builder()
        .max_query_size_to_log(10)
        .build()
        .unwrap();
    let (mut stmt, _mock) = setup("SELECT * FROM a_rather_long_table WHERE id = ?", options);

    let err = stmt.set_parameter(2, 1).unwrap_err();
    let SqlPreparedError::BindingRange { context, .. } = err else {
        panic!("expected a binding range error");
    };
    assert!(context.contains("SELECT * F..."), "{context}");
    assert!(!context.contains("a_rather_long_table"), "{context}");
}

#[tokio::test]
async fn test01_unset_parameter_fails_without_backend_calls() {
    let (mut stmt, mock) = setup("INSERT INTO t VALUES (?, ?)", StatementOptions::default());
    stmt.set_parameter(1, 1).unwrap();

    let err = stmt.execute().await.unwrap_err();
    assert!(matches!(
        err,
        SqlPreparedError::UnboundParameter { position: 2, param_count: 2 }
    ));
    assert_eq!(err.sql_state(), Some("07004"));
    assert!(mock.executed().is_empty());
    assert!(stmt.results().is_none());
}

#[tokio::test]
async fn test01_clear_parameters_unsets_every_slot() {
    let (mut stmt, mock) = setup("SELECT ?, ?", StatementOptions::default());
    stmt.set_parameter(1, 1).unwrap();
    stmt.set_parameter(2, 2).unwrap();
    stmt.add_batch().unwrap();

    stmt.clear_parameters().unwrap();
    assert!(stmt.parameter(1).is_none());
    assert_eq!(stmt.batch_size(), 1);

    let err = stmt.execute().await.unwrap_err();
    assert!(matches!(err, SqlPreparedError::UnboundParameter { position: 1, .. }));
    assert!(mock.executed().is_empty());
}

#[tokio::test]
async fn test01_statement_without_parameters_executes_directly() {
    let (mut stmt, mock) = setup("SELECT '?' -- ?\n", StatementOptions::default());
    assert_eq!(stmt.parameter_count(), 0);
    stmt.execute().await.unwrap();
    assert_eq!(mock.executed_params(), vec![Vec::<ParameterValue>::new()]);
}

#[tokio::test]
async fn test01_streamed_value_marks_long_data() {
    let (mut stmt, _mock) = setup("INSERT INTO blobs VALUES (?)", StatementOptions::default());
    stmt.set_parameter(1, ParameterValue::Blob(vec![1, 2])).unwrap();
    assert!(!stmt.has_long_data());

    stmt.set_parameter(1, ParameterValue::Stream(vec![0; 16])).unwrap();
    assert!(stmt.has_long_data());

    stmt.clear_batch().unwrap();
    assert!(!stmt.has_long_data());
}

#[test]
fn test01_display_renders_statement_and_parameters() {
    let (mut stmt, _mock) = setup("SELECT ?, ?", StatementOptions::default());
    assert_eq!(stmt.to_string(), "sql : 'SELECT ?, ?', parameters : [null,null]");

    stmt.set_parameter(1, "it's").unwrap();
    stmt.set_parameter(2, true).unwrap();
    assert_eq!(stmt.to_string(), "sql : 'SELECT ?, ?', parameters : ['it''s',1]");
}
