use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mongo_api_core::{ClientConfig, QueryResult};
use mongo_api_rs::MongoApiClient;
use serde_json::Value;

/// Query a MongoApi server from the command line
#[derive(Parser, Debug)]
#[command(name = "mongo-api-cli", version)]
pub struct Cli {
    /// JSON client configuration
    #[arg(long, default_value = "config.json")]
    pub config: String,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub scheme: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(scheme) = &self.scheme {
            config.scheme = scheme.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List databases
    Databases,
    /// List collections in a database
    Tables { db: String },
    /// Run a filtered select
    Select(QueryArgs),
    /// First record of a select
    First(QueryArgs),
    /// Number of records a select matches
    Count(QueryArgs),
    /// Fetch one record by id
    Get {
        #[command(flatten)]
        target: Target,
        id: String,
    },
    /// Insert a record or an array of records
    Insert {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        data: String,
    },
    /// Insert when the query matches
    InsertIf {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        data: String,
    },
    /// Update every record the query matches
    Update {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        data: String,
    },
    /// Update one record by id
    UpdateId {
        #[command(flatten)]
        target: Target,
        id: String,
        #[arg(long)]
        data: String,
    },
    /// Delete every record the query matches
    Delete(QueryArgs),
    /// Delete one record by id
    DeleteId {
        #[command(flatten)]
        target: Target,
        id: String,
    },
    /// Drop a database
    DropDb { db: String },
    /// Drop a collection
    DropTable { db: String, table: String },
}

#[derive(Args, Debug, Default)]
pub struct Target {
    #[arg(long)]
    pub db: Option<String>,

    #[arg(long)]
    pub table: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    #[command(flatten)]
    pub target: Target,

    /// AND condition, `between` takes `low:high`
    #[arg(long = "where", value_name = "FIELD,OP,VALUE")]
    pub and_where: Vec<String>,

    #[arg(long = "or-where", value_name = "FIELD,OP,VALUE")]
    pub or_where: Vec<String>,

    #[arg(long, value_name = "FIELD:DIR")]
    pub sort: Vec<String>,

    #[arg(long)]
    pub page: Option<i64>,

    #[arg(long)]
    pub per_page: Option<i64>,

    #[arg(long)]
    pub group_by: Option<String>,
}

impl Target {
    fn apply(&self, client: &mut MongoApiClient) {
        if let Some(db) = &self.db {
            client.from_db(db);
        }
        if let Some(table) = &self.table {
            client.from_table(table);
        }
    }
}

impl QueryArgs {
    fn apply(&self, client: &mut MongoApiClient) -> Result<()> {
        self.target.apply(client);

        for arg in &self.and_where {
            let (field, op, value) = parse_condition(arg)?;
            client.and_where(&field, &op, value);
        }
        for arg in &self.or_where {
            let (field, op, value) = parse_condition(arg)?;
            client.or_where(&field, &op, value);
        }
        for arg in &self.sort {
            let (field, direction) = arg
                .split_once(':')
                .with_context(|| format!("sort '{}' is not FIELD:DIR", arg))?;
            client.sort_by(field, direction);
        }
        if let Some(page) = self.page {
            client.page(page);
        }
        if let Some(per_page) = self.per_page {
            client.per_page(per_page);
        }
        if let Some(group_by) = &self.group_by {
            client.group_by(group_by);
        }
        Ok(())
    }
}

/// `field,op,value`; the value may itself contain commas
pub fn parse_condition(arg: &str) -> Result<(String, String, Value)> {
    let mut parts = arg.splitn(3, ',');
    let (Some(field), Some(op), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("condition '{}' is not FIELD,OP,VALUE", arg);
    };

    let value = match raw.split_once(':') {
        Some((low, high)) if op == "between" => {
            Value::Array(vec![parse_scalar(low), parse_scalar(high)])
        }
        _ => parse_scalar(raw),
    };

    Ok((field.to_string(), op.to_string(), value))
}

/// Numbers and booleans keep their type, anything else is a string
fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn parse_data(data: &str) -> Result<Value> {
    serde_json::from_str(data).context("--data must be valid JSON")
}

pub fn run(command: Command, client: &mut MongoApiClient) -> Result<QueryResult> {
    let result = match command {
        Command::Databases => client.list_databases(),
        Command::Tables { db } => client.list_tables_in_db(&db),
        Command::Select(query) => {
            query.apply(client)?;
            client.select()
        }
        Command::First(query) => {
            query.apply(client)?;
            client.get().first()
        }
        Command::Count(query) => {
            query.apply(client)?;
            client.count()
        }
        Command::Get { target, id } => {
            target.apply(client);
            client.select_by_id(&id)
        }
        Command::Insert { target, data } => {
            target.apply(client);
            client.insert(&parse_data(&data)?)
        }
        Command::InsertIf { query, data } => {
            query.apply(client)?;
            client.insert_if(&parse_data(&data)?)
        }
        Command::Update { query, data } => {
            query.apply(client)?;
            client.update(&parse_data(&data)?)
        }
        Command::UpdateId { target, id, data } => {
            target.apply(client);
            client.update_by_id(&id, &parse_data(&data)?)
        }
        Command::Delete(query) => {
            query.apply(client)?;
            client.delete()
        }
        Command::DeleteId { target, id } => {
            target.apply(client);
            client.delete_by_id(&id)
        }
        Command::DropDb { db } => client.delete_database(&db),
        Command::DropTable { db, table } => client.delete_tables_in_database(&db, &table),
    };

    Ok(result)
}
