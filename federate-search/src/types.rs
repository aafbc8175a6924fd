//! Core types: shard addresses, queries, hits, and partial/merged results.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{FederationError, Result};

/// Row member under which the originating shard is written on output.
pub const SHARD_FIELD: &str = "server";

/// Network location of one shard server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardAddress {
    scheme: String,
    host: String,
    port: u16,
}

impl ShardAddress {
    /// Standard port of a search shard server.
    pub const DEFAULT_PORT: u16 = 5985;

    /// Create a plain-HTTP shard address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "http".into(),
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, or `http(s)://host[:port]`.
    ///
    /// `default_port` is used when the address names no port.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Config`] for an empty or malformed address.
    pub fn parse(address: &str, default_port: u16) -> Result<Self> {
        let address = address.trim();
        let invalid = || FederationError::Config(format!("invalid shard address '{address}'"));

        if address.is_empty() {
            return Err(invalid());
        }

        if address.contains("://") {
            let url = Url::parse(address).map_err(|_| invalid())?;
            let host = url.host_str().ok_or_else(invalid)?;
            return Ok(Self {
                scheme: url.scheme().to_string(),
                host: host.to_string(),
                port: url.port().unwrap_or(default_port),
            });
        }

        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(invalid()),
            None => Ok(Self::new(address, default_port)),
        }
    }

    /// Host name of the shard.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the shard.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Root URL of the shard, e.g. `http://localhost:5985/`.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Config`] if the host cannot form a URL.
    pub fn base_url(&self) -> Result<Url> {
        let raw = format!("{}://{}:{}/", self.scheme, self.host, self.port);
        Url::parse(&raw).map_err(|e| FederationError::Config(format!("invalid shard URL {raw}: {e}")))
    }
}

impl FromStr for ShardAddress {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, Self::DEFAULT_PORT)
    }
}

impl fmt::Display for ShardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme == "http" {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// One search request, sent unchanged to every shard.
///
/// Parameters keep their insertion order so that every shard receives a
/// byte-identical query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    collection: String,
    params: Vec<(String, String)>,
}

impl Query {
    /// Create a query against `collection` (a server path such as
    /// `/search/enron/_design/view`) with no parameters.
    pub fn new(collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let collection = if collection.starts_with('/') {
            collection
        } else {
            format!("/{collection}")
        };
        Self {
            collection,
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Parse a raw `path?key=value&...` string.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::InvalidQuery`] if the path part is empty.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
        if path.trim_matches('/').is_empty() {
            return Err(FederationError::InvalidQuery(format!(
                "query '{raw}' names no collection path"
            )));
        }

        let params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Ok(Self {
            params,
            ..Self::new(path)
        })
    }

    /// The collection path, always starting with `/`.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// All parameters in insertion order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value of parameter `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Page size hint, if present and numeric.
    pub fn limit(&self) -> Option<usize> {
        self.param("limit").and_then(|v| v.trim().parse().ok())
    }

    /// Paging offset hint, if present and numeric.
    pub fn skip(&self) -> Option<u64> {
        self.param("skip").and_then(|v| v.trim().parse().ok())
    }

    /// Full URL of this query on `shard`.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::InvalidQuery`] if the collection path does
    /// not form a valid URL against the shard root.
    pub fn url_for(&self, shard: &ShardAddress) -> Result<Url> {
        let mut url = shard.base_url()?.join(&self.collection).map_err(|e| {
            FederationError::InvalidQuery(format!("bad collection path {}: {e}", self.collection))
        })?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        Ok(url)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.collection)?;
        if !self.params.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.params)
                .finish();
            write!(f, "?{encoded}")?;
        }
        Ok(())
    }
}

/// One column of a shard's explicit sort directive.
///
/// Shards describe their sort as an array of these in the top-level
/// `sort_order` member; each row then carries the matching column values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortField {
    /// Name of the sorted field.
    pub field: String,
    /// Whether the column runs against its natural direction.
    pub reverse: bool,
    /// Field type as reported by the shard (`string`, `int`, `score`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

impl SortField {
    /// Whether larger values of this column rank first.
    ///
    /// Relevance (`score`) columns are naturally descending; `reverse`
    /// flips whatever the natural direction is.
    pub fn is_descending(&self) -> bool {
        self.reverse != (self.kind == "score")
    }
}

/// One matched document as returned by a shard.
///
/// The shard's row object is kept verbatim, member order included; the
/// identifier, score, and sort key are typed views over it. Identifiers are
/// only unique within one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    id: String,
    score: Option<f64>,
    sort_key: Option<Vec<Value>>,
    shard: Option<String>,
    fields: Map<String, Value>,
}

impl Hit {
    /// Build a hit from a shard row object.
    ///
    /// The identifier is read from `_id`, or from `id` for shards that emit
    /// the newer row layout.
    ///
    /// # Errors
    ///
    /// Returns a reason string if the row carries no usable identifier.
    pub fn from_row(fields: Map<String, Value>) -> std::result::Result<Self, String> {
        let id = match fields.get("_id").or_else(|| fields.get("id")) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(format!("row identifier is not a string: {other}")),
            None => return Err("row without _id".into()),
        };
        let score = fields.get("score").and_then(Value::as_f64);
        let sort_key = fields.get("sort_order").map(|v| match v {
            Value::Array(values) => values.clone(),
            single => vec![single.clone()],
        });

        Ok(Self {
            id,
            score,
            sort_key,
            shard: None,
            fields,
        })
    }

    /// Convenience constructor used by tests and adapters.
    pub fn new(id: impl Into<String>, score: Option<f64>) -> Self {
        let id = id.into();
        let mut fields = Map::new();
        fields.insert("_id".into(), Value::String(id.clone()));
        if let Some(s) = score {
            if let Some(n) = serde_json::Number::from_f64(s) {
                fields.insert("score".into(), Value::Number(n));
            }
        }
        Self {
            id,
            score,
            sort_key: None,
            shard: None,
            fields,
        }
    }

    /// Attach an explicit sort key (the row's `sort_order` values).
    pub fn with_sort_key(mut self, key: Vec<Value>) -> Self {
        self.fields
            .insert("sort_order".into(), Value::Array(key.clone()));
        self.sort_key = Some(key);
        self
    }

    /// Stamp the originating shard, keeping an existing stamp.
    pub fn with_shard(mut self, shard: impl Into<String>) -> Self {
        if self.shard.is_none() {
            self.shard = Some(shard.into());
        }
        self
    }

    /// Document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Relevance score, higher is better.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Explicit sort key values, when the shard sorted by fields.
    pub fn sort_key(&self) -> Option<&[Value]> {
        self.sort_key.as_deref()
    }

    /// Identifier of the shard this hit came from.
    pub fn shard(&self) -> Option<&str> {
        self.shard.as_deref()
    }

    /// The row exactly as the shard sent it.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Serialize for Hit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let stamp = self
            .shard
            .as_deref()
            .filter(|_| !self.fields.contains_key(SHARD_FIELD));
        let len = self.fields.len() + usize::from(stamp.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        if let Some(shard) = stamp {
            map.serialize_entry(SHARD_FIELD, shard)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Hit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut fields = Map::deserialize(deserializer)?;
        let shard = match fields.shift_remove(SHARD_FIELD) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                fields.insert(SHARD_FIELD.into(), other);
                None
            }
            None => None,
        };
        let mut hit = Hit::from_row(fields).map_err(D::Error::custom)?;
        hit.shard = shard;
        Ok(hit)
    }
}

/// The answer of one shard to one query.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
    /// Identifier of the shard that produced this result.
    pub shard: String,
    /// Total matches the shard reported, independent of paging.
    pub total_rows: u64,
    /// The page of hits the shard returned, in shard order.
    pub hits: Vec<Hit>,
    /// The shard's explicit sort directive. `Some` means the shard sorted
    /// by fields and each hit carries a sort key.
    pub sort_order: Option<Vec<SortField>>,
    /// Page size the shard honoured, if reported.
    pub limit: Option<usize>,
    /// Paging offset the shard applied, if reported.
    pub skip: Option<u64>,
}

impl PartialResult {
    /// Create a result with no sort directive and no paging metadata.
    pub fn new(shard: impl Into<String>, total_rows: u64, hits: Vec<Hit>) -> Self {
        Self {
            shard: shard.into(),
            total_rows,
            hits,
            sort_order: None,
            limit: None,
            skip: None,
        }
    }

    /// Attach the shard's explicit sort directive.
    pub fn with_sort_order(mut self, sort_order: Vec<SortField>) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Record the page size the shard honoured.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The federated answer: a global total and one ranked, truncated page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    /// Sum of every merged shard's `total_rows`.
    pub total_rows: u64,
    /// Globally ranked hits, at most one page long.
    pub rows: Vec<Hit>,
    /// Shards left out of the merge. Only ever populated in best-effort mode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_shards: Vec<String>,
}
