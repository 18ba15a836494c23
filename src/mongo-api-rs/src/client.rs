use crate::dispatch::{form_headers, Dispatcher};
use crate::{ClientError, Result};
use mongo_api_core::{ClientConfig, QueryResult, QueryState};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

const MISSING_DATABASE: &str = "You did not provide a database name";
const MISSING_DATA: &str = "You failed to provide some data to send to the server";
const NOT_FETCHED: &str =
    "Query did not return any data. Did you forget to fetch the results with get() first?";

/// MongoApi REST API Client
///
/// Configuration calls (`from_db`, `and_where`, `sort_by`, ...) mutate the
/// client and return it for chaining. Terminal operations send one blocking
/// request and always return a [`QueryResult`]; failures come back as
/// `{status: false, error}` rather than as `Err`.
///
/// Query state is not cleared by terminal operations. Call
/// [`reset_query`](Self::reset_query) before reusing a client for an
/// unrelated query.
pub struct MongoApiClient {
    config: ClientConfig,
    dispatcher: Dispatcher,
    query: QueryState,
    cached: Option<QueryResult>,
}

impl MongoApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        let query = QueryState::new(&config.default_database, &config.default_collection);

        tracing::debug!("MongoApi client targeting {}", dispatcher.base_url());

        Ok(Self {
            config,
            dispatcher,
            query,
            cached: None,
        })
    }

    /// Client for `http://{host}:{port}` with default settings
    pub fn connect(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::new(ClientConfig::new(host, port))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Accumulated target, filter, sort and pagination state
    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn cached_result(&self) -> Option<&QueryResult> {
        self.cached.as_ref()
    }

    pub fn from_db(&mut self, name: &str) -> &mut Self {
        self.query.set_database(name);
        self
    }

    pub fn into_db(&mut self, name: &str) -> &mut Self {
        self.from_db(name)
    }

    pub fn from_table(&mut self, name: &str) -> &mut Self {
        self.query.set_collection(name);
        self
    }

    pub fn into_table(&mut self, name: &str) -> &mut Self {
        self.from_table(name)
    }

    /// AND condition. Unknown operators are ignored.
    pub fn and_where(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.query.add_condition(field, operator, value);
        self
    }

    /// OR condition. Unknown operators are ignored.
    pub fn or_where(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.query.add_or_condition(field, operator, value);
        self
    }

    /// `direction` must be `asc` or `desc`, anything else is ignored
    pub fn sort_by(&mut self, field: &str, direction: &str) -> &mut Self {
        self.query.set_sort(field, direction);
        self
    }

    pub fn group_by(&mut self, field: &str) -> &mut Self {
        self.query.set_group_by(field);
        self
    }

    pub fn page(&mut self, page: i64) -> &mut Self {
        self.query.set_page(page);
        self
    }

    pub fn per_page(&mut self, per_page: i64) -> &mut Self {
        self.query.set_page_size(per_page);
        self
    }

    /// Clear filters, sorting, grouping and pagination; keeps the target
    pub fn reset_query(&mut self) -> &mut Self {
        self.query.reset();
        self
    }

    pub fn clear_cache(&mut self) -> &mut Self {
        self.cached = None;
        self
    }

    /// GET /db/databases
    pub fn list_databases(&self) -> QueryResult {
        flatten(self.send("/db/databases".to_string(), Method::GET, false, None))
    }

    /// GET /db/{db}/tables
    pub fn list_tables_in_db(&self, db_name: &str) -> QueryResult {
        flatten(require(db_name, MISSING_DATABASE).and_then(|()| {
            self.send(format!("/db/{}/tables", db_name), Method::GET, false, None)
        }))
    }

    /// GET /db/{db}/{table}/select with the current query
    pub fn select(&self) -> QueryResult {
        flatten(self.send(self.table_path("select"), Method::GET, true, None))
    }

    pub fn find(&self) -> QueryResult {
        self.select()
    }

    /// GET /db/{db}/{table}/get/{id}
    pub fn select_by_id(&self, id: &str) -> QueryResult {
        flatten(
            require(id, "You failed to provide a Mongo record ID.").and_then(|()| {
                self.send(self.table_path(&format!("get/{}", id)), Method::GET, false, None)
            }),
        )
    }

    pub fn find_by_id(&self, id: &str) -> QueryResult {
        self.select_by_id(id)
    }

    /// PUT /db/{db}/{table}/update-where with the current query
    pub fn update<T: Serialize + ?Sized>(&self, data: &T) -> QueryResult {
        flatten(to_body(data, MISSING_DATA).and_then(|body| {
            self.send(self.table_path("update-where"), Method::PUT, true, Some(&body))
        }))
    }

    /// PUT /db/{db}/{table}/update/{id}
    pub fn update_by_id<T: Serialize + ?Sized>(&self, id: &str, data: &T) -> QueryResult {
        const MISSING: &str = "You failed to provide some data + the mongoId to send to the server";

        flatten(
            require(id, MISSING)
                .and_then(|()| to_body(data, MISSING))
                .and_then(|body| {
                    self.send(
                        self.table_path(&format!("update/{}", id)),
                        Method::PUT,
                        false,
                        Some(&body),
                    )
                }),
        )
    }

    /// POST /db/{db}/{table}/insert with one record or an array of records
    pub fn insert<T: Serialize + ?Sized>(&self, data: &T) -> QueryResult {
        flatten(to_body(data, MISSING_DATA).and_then(|body| {
            self.send(self.table_path("insert"), Method::POST, false, Some(&body))
        }))
    }

    /// POST /db/{db}/{table}/insert-if; the server inserts only when the
    /// current query matches its condition
    pub fn insert_if<T: Serialize + ?Sized>(&self, data: &T) -> QueryResult {
        flatten(to_body(data, MISSING_DATA).and_then(|body| {
            self.send(self.table_path("insert-if"), Method::POST, true, Some(&body))
        }))
    }

    /// DELETE /db/{db}/{table}/delete-where with the current query
    pub fn delete(&self) -> QueryResult {
        flatten(self.send(self.table_path("delete-where"), Method::DELETE, true, None))
    }

    /// DELETE /db/{db}/{table}/delete/{id}
    pub fn delete_by_id(&self, id: &str) -> QueryResult {
        flatten(
            require(id, "You failed to provide a mongoId to send to the server.").and_then(|()| {
                self.send(
                    self.table_path(&format!("delete/{}", id)),
                    Method::DELETE,
                    false,
                    None,
                )
            }),
        )
    }

    /// DELETE /db/{db}/delete
    pub fn delete_database(&self, db_name: &str) -> QueryResult {
        flatten(require(db_name, MISSING_DATABASE).and_then(|()| {
            self.send(format!("/db/{}/delete", db_name), Method::DELETE, false, None)
        }))
    }

    /// DELETE /db/{db}/{table}/delete
    pub fn delete_tables_in_database(&self, db_name: &str, table_name: &str) -> QueryResult {
        const MISSING: &str = "You did not provide a valid database + table / collection name.";

        flatten(
            require(db_name, MISSING)
                .and_then(|()| require(table_name, MISSING))
                .and_then(|()| {
                    self.send(
                        format!("/db/{}/{}/delete", db_name, table_name),
                        Method::DELETE,
                        false,
                        None,
                    )
                }),
        )
    }

    /// Run `select` and keep the result for [`first`](Self::first) and
    /// [`count`](Self::count) when it succeeded and holds records
    pub fn get(&mut self) -> &mut Self {
        let result = self.select();
        if result.status() && result.has_records() {
            self.cached = Some(result);
        } else {
            tracing::debug!("Select returned nothing to cache");
        }
        self
    }

    /// `{status, count}` from the cached result, or from a fresh select when
    /// nothing is cached
    pub fn count(&self) -> QueryResult {
        let count = match &self.cached {
            Some(cached) => cached.record_count(),
            None => {
                let result = self.select();
                if !result.status() {
                    let error = result
                        .error()
                        .map(str::to_string)
                        .unwrap_or_else(|| result.to_string());
                    return QueryResult::failure(error);
                }
                result.record_count()
            }
        };

        let mut fields = Map::new();
        fields.insert("count".to_string(), Value::from(count));
        QueryResult::success(fields)
    }

    /// `{status, result}` holding the first cached record, or the whole
    /// cached result when it has no `results` list
    pub fn first(&self) -> QueryResult {
        let Some(cached) = &self.cached else {
            return QueryResult::failure(NOT_FETCHED);
        };

        let record = match cached.results() {
            Some(results) => match results.first() {
                Some(record) => record.clone(),
                None => return QueryResult::failure("The cached result holds no records"),
            },
            None => cached.as_value().clone(),
        };

        let mut fields = Map::new();
        fields.insert("result".to_string(), record);
        QueryResult::success(fields)
    }

    fn table_path(&self, action: &str) -> String {
        format!(
            "/db/{}/{}/{}",
            self.query.database(),
            self.query.collection(),
            action
        )
    }

    fn send(
        &self,
        path: String,
        method: Method,
        use_query: bool,
        body: Option<&Value>,
    ) -> Result<QueryResult> {
        let query = use_query.then(|| self.query.serialize());
        let headers = if body.is_some() {
            form_headers()
        } else {
            HeaderMap::new()
        };

        self.dispatcher.dispatch(&path, method, query, body, headers)
    }
}

fn flatten(result: Result<QueryResult>) -> QueryResult {
    result.unwrap_or_else(QueryResult::from)
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ClientError::Validation(message.to_string()));
    }
    Ok(())
}

/// Serialize a body, rejecting null and empty objects/arrays
fn to_body<T: Serialize + ?Sized>(data: &T, message: &str) -> Result<Value> {
    let body = serde_json::to_value(data)?;
    let empty = match &body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };

    if empty {
        return Err(ClientError::Validation(message.to_string()));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Nothing listens on port 1, so any request that escapes validation
    // comes back as a connection error.
    fn offline_client() -> MongoApiClient {
        MongoApiClient::connect("127.0.0.1", 1).unwrap()
    }

    fn assert_failure(result: &QueryResult, message: &str) {
        assert!(!result.status());
        assert_eq!(result.error(), Some(message));
    }

    #[test]
    fn test_validation_fails_before_network() {
        let client = offline_client();

        assert_failure(&client.list_tables_in_db(""), MISSING_DATABASE);
        assert_failure(&client.delete_database(""), MISSING_DATABASE);
        assert_failure(
            &client.select_by_id(""),
            "You failed to provide a Mongo record ID.",
        );
        assert_failure(
            &client.delete_by_id(""),
            "You failed to provide a mongoId to send to the server.",
        );
        assert_failure(
            &client.delete_tables_in_database("shop", ""),
            "You did not provide a valid database + table / collection name.",
        );
        assert_failure(
            &client.delete_tables_in_database("", "users"),
            "You did not provide a valid database + table / collection name.",
        );
    }

    #[test]
    fn test_missing_bodies_are_rejected() {
        let client = offline_client();

        assert_failure(&client.insert(&json!({})), MISSING_DATA);
        assert_failure(&client.insert(&Value::Null), MISSING_DATA);
        assert_failure(&client.insert_if(&json!([])), MISSING_DATA);
        assert_failure(&client.update(&json!({})), MISSING_DATA);

        let missing = "You failed to provide some data + the mongoId to send to the server";
        assert_failure(&client.update_by_id("abc", &json!({})), missing);
        assert_failure(&client.update_by_id("", &json!({"age": 3})), missing);
    }

    #[test]
    fn test_chaining_accumulates_state() {
        let mut client = offline_client();
        client
            .from_db("test-db")
            .from_table("users")
            .and_where("name", "=", "alice")
            .and_where("name", "≈", "ignored")
            .or_where("age", "between", json!([18, 30]))
            .sort_by("name", "sideways")
            .sort_by("age", "desc")
            .page(0)
            .page(1)
            .per_page(10);

        let query = client.query();
        assert_eq!(query.database(), "test-db");
        assert_eq!(query.collection(), "users");
        assert_eq!(query.and_conditions().len(), 1);
        assert_eq!(query.or_conditions()[0].to_wire(), "age,between,[18:30]");
        assert_eq!(query.sorts().len(), 1);
        assert_eq!(query.page(), Some(1));
        assert_eq!(query.page_size(), Some(10));
        assert_eq!(client.table_path("select"), "/db/test-db/users/select");
    }

    #[test]
    fn test_into_aliases_share_target() {
        let mut client = offline_client();
        client.into_db("archive").into_table("orders");
        assert_eq!(client.table_path("insert"), "/db/archive/orders/insert");

        client.from_db("").into_table("");
        assert_eq!(client.table_path("insert"), "/db/archive/orders/insert");
    }

    #[test]
    fn test_default_target_comes_from_config() {
        let client = offline_client();
        assert_eq!(
            client.table_path("insert"),
            "/db/my-db/my-collection/insert"
        );

        let mut config = ClientConfig::new("127.0.0.1", 1);
        config.default_database = "shop".to_string();
        let client = MongoApiClient::new(config).unwrap();
        assert_eq!(client.table_path("select"), "/db/shop/my-collection/select");
    }

    #[test]
    fn test_first_without_fetch() {
        let client = offline_client();
        assert_failure(&client.first(), NOT_FETCHED);
    }

    #[test]
    fn test_count_uses_cache_without_network() {
        let mut client = offline_client();
        client.cached = Some(QueryResult::new(json!({
            "status": true,
            "count": 5,
            "results": [{"name": "a"}, {"name": "b"}],
        })));

        assert_eq!(client.count().as_value(), &json!({"status": true, "count": 5}));
    }

    #[test]
    fn test_first_reads_cache() {
        let mut client = offline_client();
        client.cached = Some(QueryResult::new(json!({
            "status": true,
            "count": 2,
            "results": [{"name": "a"}, {"name": "b"}],
        })));
        assert_eq!(
            client.first().as_value(),
            &json!({"status": true, "result": {"name": "a"}})
        );

        let record = json!({"status": true, "_id": "665104538e80ecc6f646d6ce"});
        client.cached = Some(QueryResult::new(record.clone()));
        assert_eq!(
            client.first().as_value(),
            &json!({"status": true, "result": record})
        );
        assert_eq!(client.count().as_value(), &json!({"status": true, "count": 2}));
    }

    #[test]
    fn test_count_propagates_select_failure() {
        let client = offline_client();
        let result = client.count();
        assert!(!result.status());
        assert!(result
            .error()
            .unwrap()
            .starts_with("Error: Server not responding, due to: "));
    }

    #[test]
    fn test_get_keeps_cache_on_failure() {
        let mut client = offline_client();
        client.get();
        assert!(client.cached_result().is_none());
        assert_failure(&client.first(), NOT_FETCHED);
    }

    #[test]
    fn test_reset_query_keeps_target_and_cache() {
        let mut client = offline_client();
        client.cached = Some(QueryResult::new(json!({"status": true, "count": 1})));
        client.from_db("shop").and_where("a", "=", 1).reset_query();

        assert!(client.query().serialize().is_empty());
        assert_eq!(client.query().database(), "shop");
        assert!(client.cached_result().is_some());

        client.clear_cache();
        assert!(client.cached_result().is_none());
    }
}
