use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::engine::{Engine, EngineSettings};
use crate::limits::*;

/// One villa calendar per tenant, keyed by the database name on the
/// connection. Each gets its own engine and WAL file.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    settings: EngineSettings,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, settings: EngineSettings) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            settings,
        }
    }

    /// Get or lazily open the calendar for `tenant`.
    pub fn get_or_create(&self, tenant: &str) -> io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(io::Error::other("too many tenants"));
        }

        // Path traversal
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }

        // Two connections racing on a new tenant must share one engine.
        let engine = match self.engines.entry(tenant.to_string()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let engine = Arc::new(Engine::new(wal_path, self.settings.clone())?);
                info!(tenant = %safe_name, "calendar opened");
                e.insert(engine.clone());
                engine
            }
        };
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use ulid::Ulid;

    use crate::auth::Authorization;
    use crate::engine::{BlockInput, EngineError};
    use crate::model::*;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("staydesk_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, EngineSettings::default());
        let admin = Authorization::admin("owner");

        let villa_a = tm.get_or_create("villa_a").unwrap();
        let villa_b = tm.get_or_create("villa_b").unwrap();

        villa_a
            .create_block(
                &admin,
                BlockInput {
                    id: Ulid::new(),
                    start: d("2026-03-10"),
                    end: d("2026-03-12"),
                    kind: BlockKind::Maintenance,
                    reason: "roof repair".into(),
                    note: None,
                },
            )
            .await
            .unwrap();

        let err = villa_a
            .check_availability(&admin, d("2026-03-11"), d("2026-03-13"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));

        villa_b
            .check_availability(&admin, d("2026-03-11"), d("2026-03-13"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), EngineSettings::default());

        assert!(fs::read_dir(&dir).unwrap().next().is_none());
        assert!(tm.is_empty());

        let _eng = tm.get_or_create("seaview").unwrap();
        assert!(dir.join("seaview.wal").exists());
        assert_eq!(tm.len(), 1);
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = TenantManager::new(dir, EngineSettings::default());

        let eng1 = tm.get_or_create("foo").unwrap();
        let eng2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), EngineSettings::default());

        let _eng = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        assert!(tm.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, EngineSettings::default());

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn tenant_name_at_limit() {
        let dir = test_data_dir("name_at_limit");
        let tm = TenantManager::new(dir, EngineSettings::default());

        let name = "x".repeat(MAX_TENANT_NAME_LEN);
        tm.get_or_create(&name).unwrap();
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = TenantManager::new(dir, EngineSettings::default());

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("t{i}")).unwrap();
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
    }

    #[tokio::test]
    async fn tenant_state_survives_reopen() {
        let dir = test_data_dir("reopen");
        let admin = Authorization::admin("owner");
        let block_id = Ulid::new();
        {
            let tm = TenantManager::new(dir.clone(), EngineSettings::default());
            let villa = tm.get_or_create("villa").unwrap();
            villa
                .create_block(
                    &admin,
                    BlockInput {
                        id: block_id,
                        start: d("2026-04-01"),
                        end: d("2026-04-01"),
                        kind: BlockKind::OwnerStay,
                        reason: "owner visit".into(),
                        note: None,
                    },
                )
                .await
                .unwrap();
        }

        let tm = TenantManager::new(dir, EngineSettings::default());
        let villa = tm.get_or_create("villa").unwrap();
        let blocks = villa.list_blocks(&admin).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id, block_id);
    }
}
