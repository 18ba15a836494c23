// Dispatcher tests against a local HTTP server
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use mongo_api_core::ClientConfig;
use mongo_api_rs::MongoApiClient;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::TcpListener;

type Params = web::Query<HashMap<String, String>>;

// Echo the request back so tests can assert on what went over the wire
async fn echo(req: HttpRequest, query: Params, body: web::Bytes) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let form = std::str::from_utf8(&body)
        .ok()
        .filter(|text| !text.is_empty())
        .and_then(|text| Params::from_query(text).ok())
        .map(|form| form.into_inner())
        .unwrap_or_default();

    HttpResponse::Ok().json(json!({
        "status": true,
        "method": req.method().as_str(),
        "path": req.path(),
        "query": query.into_inner(),
        "accept": header("accept"),
        "api_key": header("api_key"),
        "content_type": header("content-type"),
        "payload": form.get("payload"),
    }))
}

async fn items() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": true,
        "count": 2,
        "results": [{"name": "lamp"}, {"name": "desk"}],
    }))
}

async fn no_items() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": true, "count": 0, "results": []}))
}

async fn crash() -> HttpResponse {
    HttpResponse::InternalServerError().body("database exploded")
}

async fn crash_with_json() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({"status": false, "error": "Mongo is down"}))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({"status": false, "error": "Record not found"}))
}

fn start_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    std::thread::spawn(move || {
        actix_web::rt::System::new().block_on(async move {
            HttpServer::new(|| {
                App::new()
                    .route("/db/shop/items/select", web::get().to(items))
                    .route("/db/shop/empty/select", web::get().to(no_items))
                    .route("/db/broken/{tail:.*}", web::to(crash))
                    .route("/db/down/{tail:.*}", web::to(crash_with_json))
                    .route("/db/shop/items/get/{id}", web::get().to(not_found))
                    .default_service(web::to(echo))
            })
            .workers(1)
            .listen(listener)
            .unwrap()
            .run()
            .await
        })
    });

    port
}

fn client(port: u16) -> MongoApiClient {
    MongoApiClient::connect("127.0.0.1", port).unwrap()
}

fn field<'a>(result: &'a mongo_api_rs::QueryResult, key: &str) -> &'a Value {
    result.get(key).unwrap_or(&Value::Null)
}

#[test]
fn test_select_sends_query_string() {
    let port = start_server();
    let mut client = client(port);

    let result = client
        .from_db("test-db")
        .from_table("users")
        .and_where("name", "=", "alice")
        .page(1)
        .per_page(10)
        .select();

    assert!(result.status());
    assert_eq!(field(&result, "method"), "GET");
    assert_eq!(field(&result, "path"), "/db/test-db/users/select");
    assert_eq!(
        field(&result, "query"),
        &json!({"query_and": "[name,=,alice]", "page": "1", "per_page": "10"})
    );
    assert_eq!(field(&result, "accept"), "application/json");
    assert_eq!(field(&result, "api_key"), &Value::Null);
    assert_eq!(field(&result, "payload"), &Value::Null);
}

#[test]
fn test_insert_sends_payload_form() {
    let port = start_server();
    let client = client(port);

    let result = client.insert(&json!({"username": "bob"}));

    assert_eq!(field(&result, "method"), "POST");
    assert_eq!(field(&result, "path"), "/db/my-db/my-collection/insert");
    assert_eq!(field(&result, "query"), &json!({}));
    assert_eq!(
        field(&result, "content_type"),
        "application/x-www-form-urlencoded"
    );
    assert_eq!(field(&result, "payload"), r#"{"username":"bob"}"#);
}

#[test]
fn test_operation_paths_and_methods() {
    let port = start_server();
    let mut client = client(port);
    client.from_db("shop").from_table("users");

    let cases = [
        (client.list_databases(), "GET", "/db/databases"),
        (client.list_tables_in_db("shop"), "GET", "/db/shop/tables"),
        (client.find_by_id("abc"), "GET", "/db/shop/users/get/abc"),
        (client.update(&json!({"age": 3})), "PUT", "/db/shop/users/update-where"),
        (client.update_by_id("abc", &json!({"age": 3})), "PUT", "/db/shop/users/update/abc"),
        (client.insert_if(&json!({"age": 3})), "POST", "/db/shop/users/insert-if"),
        (client.delete(), "DELETE", "/db/shop/users/delete-where"),
        (client.delete_by_id("abc"), "DELETE", "/db/shop/users/delete/abc"),
        (client.delete_database("old"), "DELETE", "/db/old/delete"),
        (client.delete_tables_in_database("old", "logs"), "DELETE", "/db/old/logs/delete"),
    ];

    for (result, method, path) in cases {
        assert_eq!(field(&result, "method"), method, "{}", path);
        assert_eq!(field(&result, "path"), path);
    }
}

#[test]
fn test_query_params_only_on_query_operations() {
    let port = start_server();
    let mut client = client(port);
    client
        .from_db("shop")
        .from_table("users")
        .and_where("age", "between", json!([18, 30]))
        .or_where("name", "like", "al")
        .sort_by("age", "desc")
        .group_by("city");

    let expected = json!({
        "query_and": "[age,between,[18:30]]",
        "query_or": "[name,ilike,al]",
        "sort": "[age:desc]",
        "group_by": "city",
    });

    assert_eq!(field(&client.delete(), "query"), &expected);
    assert_eq!(field(&client.update(&json!({"a": 1})), "query"), &expected);
    assert_eq!(field(&client.insert_if(&json!({"a": 1})), "query"), &expected);

    assert_eq!(field(&client.insert(&json!({"a": 1})), "query"), &json!({}));
    assert_eq!(field(&client.delete_by_id("abc"), "query"), &json!({}));
}

#[test]
fn test_api_key_header() {
    let port = start_server();
    let client =
        MongoApiClient::new(ClientConfig::new("127.0.0.1", port).with_api_key("secret")).unwrap();

    let result = client.list_databases();
    assert_eq!(field(&result, "api_key"), "secret");
}

#[test]
fn test_server_error_is_normalized() {
    let port = start_server();
    let mut client = client(port);

    let result = client.from_db("broken").select();

    assert!(!result.status());
    let error = result.error().unwrap();
    assert!(error.starts_with("Internal Server Error (500): "), "{}", error);
    assert!(error.contains("database exploded"), "{}", error);
}

#[test]
fn test_json_error_bodies_pass_through() {
    let port = start_server();
    let mut client = client(port);

    let result = client.from_db("down").select();
    assert_eq!(
        result.as_value(),
        &json!({"status": false, "error": "Mongo is down"})
    );

    let result = client.from_db("shop").from_table("items").select_by_id("nope");
    assert_eq!(
        result.as_value(),
        &json!({"status": false, "error": "Record not found"})
    );
}

#[test]
fn test_connection_failure_is_normalized() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = client(port).list_databases();

    assert!(!result.status());
    assert!(result
        .error()
        .unwrap()
        .starts_with("Error: Server not responding, due to: "));
}

#[test]
fn test_get_then_first_and_count() {
    let port = start_server();
    let mut client = client(port);

    let first = client.from_db("shop").from_table("items").get().first();
    assert_eq!(
        first.as_value(),
        &json!({"status": true, "result": {"name": "lamp"}})
    );

    // Served from the cache even after the target moves away
    client.from_db("broken");
    assert_eq!(client.count().as_value(), &json!({"status": true, "count": 2}));
}

#[test]
fn test_get_skips_empty_results() {
    let port = start_server();
    let mut client = client(port);

    client.from_db("shop").from_table("empty").get();
    assert!(client.cached_result().is_none());
    assert!(!client.first().status());

    // Without a cache count runs a fresh select
    assert_eq!(client.count().as_value(), &json!({"status": true, "count": 0}));
}
