/// Location of the counter record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Name of the DynamoDB table
    pub name: String,
    /// Name of the partition key attribute
    pub key_name: String,
    /// Partition key of the counter record
    pub key_value: String,
    /// Attribute holding the counter value
    pub value_attribute: String,
}

/// Configuration of the counter lambda. Resolved once when the
/// execution environment starts, never per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where the counter is stored
    pub table: Table,
    /// Origins which receive CORS headers. `*` allows every origin
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Default partition key attribute
    pub const DEFAULT_KEY_NAME: &'static str = "id";
    /// Default partition key of the counter record
    pub const DEFAULT_KEY_VALUE: &'static str = "view_counter";
    /// Default counter attribute
    pub const DEFAULT_VALUE_ATTRIBUTE: &'static str = "value";

    /// Reads the configuration from the process environment:
    ///
    /// * `COUNTER_TABLE_NAME` (required)
    /// * `COUNTER_KEY_NAME` (default: `id`)
    /// * `COUNTER_KEY_VALUE` (default: `view_counter`)
    /// * `COUNTER_VALUE_ATTRIBUTE` (default: `value`)
    /// * `COUNTER_ALLOWED_ORIGINS` (comma separated, default: none)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        use anyhow::Context;

        let var = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let name = lookup("COUNTER_TABLE_NAME")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .context("Missing COUNTER_TABLE_NAME env variable")?;
        let allowed_origins: Vec<String> = lookup("COUNTER_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(|o| o.trim_end_matches('/').to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            table: Table {
                name,
                key_name: var("COUNTER_KEY_NAME", Self::DEFAULT_KEY_NAME),
                key_value: var("COUNTER_KEY_VALUE", Self::DEFAULT_KEY_VALUE),
                value_attribute: var("COUNTER_VALUE_ATTRIBUTE", Self::DEFAULT_VALUE_ATTRIBUTE),
            },
            allowed_origins,
        })
    }
}
