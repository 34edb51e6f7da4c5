//! Contract tests for the database template, driven by the stub factory.
//!
//! Tests verify that:
//! - Misplaced or malformed arguments fail before any connection is opened
//! - Every placeholder dialect receives the statement shape it expects
//! - Connections are always released and never committed by the template
//! - Named-colon vendors accept mapping parameters only

use sqltemplate::db::{
    BoundParams, ConnectionFactory, DatabaseTemplate, Dialect, FactoryRegistry,
    MySqlConnectionFactory, OracleConnectionFactory, RowHandler, SingleConnectionFactory,
    SqlSyntax, TupleRowHandler,
};
use sqltemplate::error::{ErrorKind, RowHandlerError};
use sqltemplate::models::{Argument, Params, QueryRequest, RequiredType, Row, SqlValue};
use sqltemplate::testing::{StubConnectionFactory, StubResponse};
use sqltemplate::{DataSourceConfig, FactoryOptions};
use std::collections::HashMap;
use std::sync::Arc;

const ALL_DIALECTS: [Dialect; 4] = [
    Dialect::Question,
    Dialect::Format,
    Dialect::Numbered,
    Dialect::Named,
];

/// Handler that never implements `process_row`.
struct InvalidRowHandler;

impl RowHandler for InvalidRowHandler {
    type Output = String;
}

/// Handler whose `process_row` expects a different row shape.
struct ImproperRowHandler;

impl RowHandler for ImproperRowHandler {
    type Output = (String, String, i32);

    fn process_row(&self, row: &Row) -> Result<Self::Output, RowHandlerError> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn expected_columns(&self) -> Option<usize> {
        Some(3)
    }
}

fn stub(dialect: Dialect) -> (Arc<StubConnectionFactory>, DatabaseTemplate) {
    let factory = Arc::new(StubConnectionFactory::new().with_dialect(dialect));
    let template = DatabaseTemplate::new(factory.clone());
    (factory, template)
}

fn animal_rows() -> StubResponse {
    StubResponse::new()
        .columns(["name", "category"])
        .row(["snake", "reptile"])
        .row(["racoon", "mammal"])
}

#[test]
fn test_positional_row_handler_always_rejected() {
    for dialect in ALL_DIALECTS {
        let (factory, template) = stub(dialect);
        for handler in [
            Argument::row_handler(&TupleRowHandler),
            Argument::row_handler(&InvalidRowHandler),
            Argument::row_handler(&ImproperRowHandler),
        ] {
            let request = QueryRequest::new("select * from animal")
                .arg(handler)
                .row_handler(TupleRowHandler);
            let err = template.query(request).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentMustBeNamed);
        }
        assert_eq!(factory.connect_count(), 0);
    }
}

#[test]
fn test_positional_handler_after_params_rejected() {
    let (_factory, template) = stub(Dialect::Question);
    let request = QueryRequest::new("select * from animal where name = ?")
        .params(("snake",))
        .arg(Argument::row_handler(&TupleRowHandler))
        .row_handler(TupleRowHandler);
    assert_eq!(
        template.query(request).unwrap_err().kind(),
        ErrorKind::ArgumentMustBeNamed
    );
}

#[test]
fn test_positional_required_type_always_rejected() {
    for dialect in ALL_DIALECTS {
        let (factory, template) = stub(dialect);
        let request = QueryRequest::new("select name from animal")
            .arg(RequiredType::Text)
            .required_type(RequiredType::Text);
        let err = template.query_for_object(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentMustBeNamed);
        assert_eq!(factory.connect_count(), 0);
    }
}

#[test]
fn test_bare_scalar_always_invalid() {
    let placeholders = [
        "select * from animal where name = ?",
        "select * from animal where name = %s",
        "select * from animal where name = :name",
    ];
    for dialect in ALL_DIALECTS {
        let (factory, template) = stub(dialect);
        for sql in placeholders {
            let request = QueryRequest::new(sql).params(Params::scalar("snake"));
            let err = template.query_for_list(request).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgumentType, "{dialect}: {sql}");
        }
        assert_eq!(factory.connect_count(), 0);
    }
}

#[test]
fn test_valid_handler_maps_every_row() {
    let (factory, template) = stub(Dialect::Question);
    factory.push_response(animal_rows());

    let rows = template
        .query(QueryRequest::new("select name, category from animal").row_handler(TupleRowHandler))
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], SqlValue::from("racoon"));
}

#[test]
fn test_invalid_handler_is_attribute_error() {
    let (factory, template) = stub(Dialect::Question);
    factory.push_response(animal_rows());

    let err = template
        .query(QueryRequest::new("select name, category from animal").row_handler(InvalidRowHandler))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Attribute);
    assert_eq!(factory.close_count(), 1);
}

#[test]
fn test_improper_handler_is_type_error() {
    let (factory, template) = stub(Dialect::Question);
    factory.push_response(animal_rows());

    let err = template
        .query(
            QueryRequest::new("select name, category from animal").row_handler(ImproperRowHandler),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_mixed_markers_translate_per_dialect() {
    let sql = "update animal set name = %s where category = ?";
    let expected = [
        (Dialect::Question, "update animal set name = ? where category = ?"),
        (Dialect::Format, "update animal set name = %s where category = %s"),
        (Dialect::Numbered, "update animal set name = $1 where category = $2"),
    ];
    for (dialect, translated) in expected {
        let (factory, template) = stub(dialect);
        factory.push_response(StubResponse::new().rowcount(1));

        assert_eq!(template.update((sql, ("python", "reptile"))).unwrap(), 1);
        let recorded = factory.last_statement().unwrap();
        assert_eq!(recorded.sql, translated);
        assert_eq!(
            recorded.params,
            BoundParams::Positional(vec![SqlValue::from("python"), SqlValue::from("reptile")])
        );
    }
}

#[test]
fn test_mysql_quoting_rules_follow_the_factory() {
    let factory = Arc::new(StubConnectionFactory::new().with_syntax(SqlSyntax::MySql));
    let template = DatabaseTemplate::new(Arc::new(SingleConnectionFactory::new(factory.clone())));
    factory.push_response(StubResponse::new().columns(["name"]).row(["snake"]));
    factory.push_response(StubResponse::new().rowcount(1));

    let rows = template
        .query_for_list((
            "select name from animal where name <> 'it\\'s' # or ?\n and category = ?",
            ("reptile",),
        ))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        factory.last_statement().unwrap().params,
        BoundParams::Positional(vec![SqlValue::from("reptile")])
    );

    template
        .update((r"update animal set name = 'a\\' where category = %s", ("reptile",)))
        .unwrap();
    assert_eq!(
        factory.last_statement().unwrap().sql,
        r"update animal set name = 'a\\' where category = ?"
    );

    let mysql = MySqlConnectionFactory::new("foo", "bar", "localhost", "mock");
    assert_eq!(mysql.syntax(), SqlSyntax::MySql);
    assert_eq!(
        SingleConnectionFactory::new(Arc::new(mysql)).syntax(),
        SqlSyntax::MySql
    );
}

#[test]
fn test_named_colon_dialect_takes_mappings_only() {
    let (factory, template) = stub(Dialect::Named);
    factory.push_response(StubResponse::new().columns(["name"]).row(["snake"]));

    let mut params = HashMap::new();
    params.insert("category", "reptile");
    let rows = template
        .query_for_list(("select name from animal where category = :category", params))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        factory.last_statement().unwrap().params,
        BoundParams::Named(vec![("category".to_string(), SqlValue::from("reptile"))])
    );

    let err = template
        .query_for_list(("select name from animal where category = ?", ("reptile",)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);
}

#[test]
fn test_oracle_validates_before_reporting_missing_driver() {
    let template = DatabaseTemplate::new(Arc::new(OracleConnectionFactory::new(
        "foo", "bar", "localhost", "mock",
    )));

    let err = template
        .query_for_list(("select * from animal where name = :name", ("snake",)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgumentType);

    let err = template
        .query_for_list((
            "select * from animal where name = :name",
            Params::named([("name", "snake")]),
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverUnavailable);
}

#[test]
fn test_every_call_opens_and_closes_one_connection() {
    let (factory, template) = stub(Dialect::Question);
    factory.push_response(StubResponse::new().columns(["n"]).row([4]));
    factory.push_response(StubResponse::new().rowcount(2));
    factory.push_response(StubResponse::new());

    template.query_for_int("select count(*) from animal").unwrap();
    template
        .update(("update animal set population = ?", (0,)))
        .unwrap();
    template.execute("drop table animal").unwrap();

    assert_eq!(factory.connect_count(), 3);
    assert_eq!(factory.close_count(), 3);
    assert_eq!(factory.commit_count(), 0);
    assert_eq!(factory.rollback_count(), 0);
}

#[test]
fn test_shared_connection_across_calls() {
    let target = Arc::new(StubConnectionFactory::new());
    target.push_response(StubResponse::new().rowcount(1));
    target.push_response(StubResponse::new().columns(["name"]).row(["python"]));

    let shared = Arc::new(SingleConnectionFactory::new(target.clone()));
    let template = DatabaseTemplate::new(shared.clone());

    template
        .update((
            "UPDATE animal SET name = ? WHERE category = ?",
            ("python", "reptile"),
        ))
        .unwrap();
    let name = template
        .query_for_object(
            QueryRequest::new("SELECT name FROM animal WHERE category = 'reptile'")
                .required_type(RequiredType::Text),
        )
        .unwrap();
    assert_eq!(name, SqlValue::from("python"));

    shared.commit().unwrap();
    shared.close().unwrap();

    assert_eq!(target.connect_count(), 1);
    assert_eq!(target.commit_count(), 1);
    assert_eq!(target.close_count(), 1);
}

#[test]
fn test_count_type_comes_from_factory() {
    let (factory, template) = stub(Dialect::Question);
    let factory_long = Arc::new(StubConnectionFactory::new().with_count_type(RequiredType::Long));
    factory.push_response(StubResponse::new().columns(["count"]).row([4]));
    factory_long.push_response(StubResponse::new().columns(["count"]).row([4]));

    let count = template
        .query_for_object(
            QueryRequest::new("select count(*) from animal").required_type(factory.count_type()),
        )
        .unwrap();
    assert_eq!(count, SqlValue::Int(4));

    let count = DatabaseTemplate::new(factory_long.clone())
        .query_for_object(
            QueryRequest::new("select count(*) from animal")
                .required_type(factory_long.count_type()),
        )
        .unwrap();
    assert_eq!(count, SqlValue::Long(4));
}

#[test]
fn test_registry_and_data_source_wiring() {
    let mut registry = FactoryRegistry::with_defaults();
    registry.register("stub", |_| {
        Ok(Arc::new(StubConnectionFactory::new()) as Arc<dyn ConnectionFactory>)
    });

    let factory = registry.create("stub", FactoryOptions::new()).unwrap();
    assert_eq!(factory.dialect(), Dialect::Question);

    let config = DataSourceConfig::from_json(
        r#"{"vendor": "mysql", "options": {"username": "foo", "password": "bar", "hostname": "localhost", "db": "mock"}, "single_connection": true}"#,
    )
    .unwrap();
    let factory = config.build_with(&registry).unwrap();
    assert_eq!(factory.name(), "mysql");
    assert_eq!(factory.count_type(), RequiredType::Long);
    assert!(format!("{factory:?}").contains("SingleConnectionFactory"));
}

#[test]
fn test_unconfigured_template_is_a_placeholder() {
    let template = DatabaseTemplate::default();
    assert!(template.connection_factory().is_none());
    for err in [
        template.query_for_list("select 1").unwrap_err(),
        template.query_for_long("select 1").unwrap_err(),
        template.execute("select 1").unwrap_err(),
        template
            .query_for_object(QueryRequest::new("select 1").required_type(RequiredType::Int))
            .unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::MissingCollaborator);
    }
}
