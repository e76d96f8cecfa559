use serde::{Deserialize, Serialize};

use crate::contact::ContactConfig;
use crate::index::IndexConfig;
use crate::purge::PurgeConfig;

/// Configuration for the catalog core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub index: IndexConfig,
    pub purge: PurgeConfig,
    pub contact: ContactConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexWriteMode;

    #[test]
    fn partial_sections_fill_defaults() {
        let config: CatalogConfig = serde_json::from_value(serde_json::json!({
            "index": {"write_mode": "last_writer_wins"},
            "purge": {"batch_ceiling": 250}
        }))
        .unwrap();
        assert_eq!(config.index.write_mode, IndexWriteMode::LastWriterWins);
        assert_eq!(config.index.max_attempts, 5);
        assert_eq!(config.purge.batch_ceiling, 250);
        assert_eq!(config.purge.page_size, 1000);
        assert_eq!(config.contact, ContactConfig::default());
    }
}
