//! Liveness of both indexes.

use anyhow::{bail, Result};
use serde::Serialize;

use hybrid_rag_core::store::{KeywordStore, VectorStore};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::{SqliteKeywordStore, SqliteVectorStore};

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `healthy` when both stores answer, `degraded` otherwise.
    pub status: &'static str,
    pub vector: StoreHealth,
    pub keyword: StoreHealth,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.vector.ok && self.keyword.ok
    }
}

pub async fn health(vector: &dyn VectorStore, keyword: &dyn KeywordStore) -> HealthReport {
    let (v, k) = tokio::join!(vector.heartbeat(), keyword.heartbeat());
    let vector = check(v);
    let keyword = check(k);
    HealthReport {
        status: if vector.ok && keyword.ok {
            "healthy"
        } else {
            "degraded"
        },
        vector,
        keyword,
    }
}

fn check(result: Result<()>) -> StoreHealth {
    match result {
        Ok(()) => StoreHealth {
            ok: true,
            error: None,
        },
        Err(e) => StoreHealth {
            ok: false,
            error: Some(format!("{:#}", e)),
        },
    }
}

/// CLI entry point for `hrag health`. Needs no embedding credentials.
pub async fn run_health(config: &Config, json: bool) -> Result<()> {
    let vector = SqliteVectorStore::new(db::connect(&config.stores.vector_path).await?);
    let keyword = SqliteKeywordStore::new(db::connect(&config.stores.keyword_path).await?);
    let report = health(&vector, &keyword).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{:<10} {:<6} ERROR", "STORE", "OK");
        for (name, store) in [("vector", &report.vector), ("keyword", &report.keyword)] {
            println!(
                "{:<10} {:<6} {}",
                name,
                store.ok,
                store.error.as_deref().unwrap_or("-")
            );
        }
        println!();
        println!("status: {}", report.status);
    }

    if !report.is_healthy() {
        bail!("index health is degraded");
    }
    Ok(())
}
