//! An in-process host: a namespace seeded from configuration plus a dialer
//! that opens sessions against it.

use std::sync::Arc;

use tracing::info;
use ww_lang::anchor::Path;
use ww_lang::parser;

use crate::config::{ConfigError, WwConfig};
use crate::datum::Datum;
use crate::namespace::{Namespace, SpawnSettings};
use crate::rpc::LocalDialer;

#[derive(Debug)]
pub struct Host {
    config: WwConfig,
    namespace: Arc<Namespace>,
}

impl Host {
    pub fn new(config: WwConfig) -> Result<Self, ConfigError> {
        let namespace = Namespace::new(
            config.host.id.clone(),
            SpawnSettings {
                max_call_depth: config.lang.max_call_depth,
                import_roots: config.lang.import_paths.clone(),
            },
        );

        for seed in &config.seeds {
            let invalid = |message: String| ConfigError::Seed {
                path: seed.path.clone(),
                message,
            };
            let path = Path::parse(&seed.path).map_err(|e| invalid(e.to_string()))?;
            let form = parser::parse_one(&seed.value).map_err(|e| invalid(e.to_string()))?;
            let datum = Datum::try_from(&form).map_err(|e| invalid(e.to_string()))?;
            namespace
                .set(&path, datum)
                .map_err(|e| invalid(e.to_string()))?;
        }

        info!(host = %config.host.id, seeds = config.seeds.len(), "host ready");
        Ok(Self { config, namespace })
    }

    pub fn config(&self) -> &WwConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Dialer for the configured protocol.
    pub fn dialer(&self) -> LocalDialer {
        LocalDialer::new(Arc::clone(&self.namespace), self.config.rpc.protocol.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedConfig;

    #[test]
    fn seeds_are_read_not_evaluated() {
        let mut config = WwConfig::default();
        config.seeds.push(SeedConfig {
            path: "/expr".to_string(),
            value: "(+ 1 2)".to_string(),
        });
        let host = Host::new(config).unwrap();
        let stored = host.namespace().get(&Path::parse("/expr").unwrap()).unwrap();
        assert!(matches!(stored, Some(Datum::List(items)) if items.len() == 3));
    }

    #[test]
    fn unreadable_seed_is_rejected() {
        let mut config = WwConfig::default();
        config.seeds.push(SeedConfig {
            path: "/bad".to_string(),
            value: "(unclosed".to_string(),
        });
        assert!(matches!(Host::new(config), Err(ConfigError::Seed { .. })));
    }
}
