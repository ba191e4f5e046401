/*!
 * Language resolution for subtitle streams.
 *
 * Maps the language tag reported for a stream to its canonical language
 * record, creating the record on first sight and backfilling its display
 * name once the configured table knows it.
 */

use anyhow::Result;
use log::{debug, info};

use crate::database::{LanguageRecord, Repository};
use crate::language_utils::{normalize_tag, LanguageTable};

/// Resolves language tags to stored language records
#[derive(Clone)]
pub struct LanguageResolver {
    repository: Repository,
    table: LanguageTable,
}

impl LanguageResolver {
    /// Create a resolver over a repository and a tag to display-name table
    pub fn new(repository: Repository, table: LanguageTable) -> Self {
        Self { repository, table }
    }

    /// Resolve a raw language tag to its canonical record.
    ///
    /// Blank tags resolve to the unknown language. Concurrent callers
    /// resolving the same unseen tag end up with the same single record.
    pub async fn resolve(&self, tag: &str) -> Result<LanguageRecord> {
        let code = normalize_tag(Some(tag));
        let name = self.table.name_for(&code).unwrap_or_default();

        let mut record = self.repository.get_or_create_language(&code, &name).await?;

        if !record.has_name() && !name.is_empty() {
            if self.repository.backfill_language_name(&code, &name).await? {
                info!("Backfilled name of language '{}' with {:?}", code, name);
                record.name = name;
            } else if let Some(current) = self.repository.get_language(&code).await? {
                record = current;
            }
        }

        debug!("Resolved language tag {:?} to {}", tag, record);
        Ok(record)
    }
}
