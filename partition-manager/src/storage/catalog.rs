//! Instrument catalog
//!
//! Maps an instrument code to the database pool and schema holding its
//! collections. Listed instruments may point at their own database. Unlisted
//! instruments are a configuration error unless the router allows them, in
//! which case they live on the master database under the lower-cased code.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{RepositoryError, RepositoryResult};
use crate::config::{DatabaseSettings, InstrumentSettings};

/// PostgreSQL identifier length limit
const MAX_IDENTIFIER_LEN: usize = 63;

/// Pool and schema of one instrument's collections
#[derive(Debug, Clone)]
pub struct InstrumentTarget {
    pub pool: PgPool,
    pub schema: String,
}

#[derive(Debug, Clone)]
enum CatalogEntry {
    Enabled(InstrumentTarget),
    Disabled,
}

/// Routes instruments to their storage
#[derive(Debug, Clone)]
pub struct InstrumentRouter {
    master: PgPool,
    entries: HashMap<String, CatalogEntry>,
    allow_unlisted: bool,
}

impl InstrumentRouter {
    /// Router with an empty catalog
    pub fn new(master: PgPool) -> Self {
        Self {
            master,
            entries: HashMap::new(),
            allow_unlisted: false,
        }
    }

    /// Route instruments missing from the catalog to the master database
    /// instead of rejecting them
    pub fn allow_unlisted(mut self, allow: bool) -> Self {
        self.allow_unlisted = allow;
        self
    }

    /// Build the router from the instrument catalog.
    ///
    /// Instruments with their own URL get a lazily connected pool, so an
    /// unreachable instrument database only fails when it is first used.
    pub fn from_settings(
        master: PgPool,
        database: &DatabaseSettings,
        instruments: &HashMap<String, InstrumentSettings>,
    ) -> RepositoryResult<Self> {
        let mut entries = HashMap::with_capacity(instruments.len());

        for (code, entry) in instruments {
            let code = code.trim().to_uppercase();
            if !entry.enabled {
                entries.insert(code, CatalogEntry::Disabled);
                continue;
            }

            let schema = match &entry.schema {
                Some(schema) => schema.clone(),
                None => code.to_lowercase(),
            };
            validate_identifier(&schema)?;

            let pool = match &entry.url {
                Some(url) => {
                    debug!("Instrument {} uses a dedicated database", code);
                    PgPoolOptions::new()
                        .max_connections(database.max_connections)
                        .acquire_timeout(Duration::from_secs(database.acquire_timeout_secs))
                        .connect_lazy(url)?
                }
                None => master.clone(),
            };

            entries.insert(code, CatalogEntry::Enabled(InstrumentTarget { pool, schema }));
        }

        Ok(Self {
            master,
            entries,
            allow_unlisted: false,
        })
    }

    /// The master database pool
    pub fn master(&self) -> &PgPool {
        &self.master
    }

    /// Storage target of `instrument`
    pub fn target(&self, instrument: &str) -> RepositoryResult<InstrumentTarget> {
        let code = instrument.trim().to_uppercase();
        match self.entries.get(&code) {
            Some(CatalogEntry::Enabled(target)) => Ok(target.clone()),
            Some(CatalogEntry::Disabled) => Err(RepositoryError::Configuration(format!(
                "Instrument {} is disabled in the catalog",
                code
            ))),
            None if !self.allow_unlisted => Err(RepositoryError::Configuration(format!(
                "Instrument {} is not in the catalog",
                code
            ))),
            None => {
                let schema = code.to_lowercase();
                validate_identifier(&schema)?;
                Ok(InstrumentTarget {
                    pool: self.master.clone(),
                    schema,
                })
            }
        }
    }
}

/// Check that `name` is usable as an unquoted-safe SQL identifier
pub fn validate_identifier(name: &str) -> RepositoryResult<&str> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(name)
    } else {
        Err(RepositoryError::InvalidData(format!(
            "'{}' is not a valid identifier",
            name
        )))
    }
}

/// Quote an identifier for interpolation into DDL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema-qualified, quoted table name
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}
