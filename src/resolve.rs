use crate::error::{KpiError, Result};
use crate::types::LeafRecord;
use std::collections::HashMap;
use tracing::debug;

/// Entity name to group key lookup, for datasets that only carry a store
/// name. Unknown names are errors rather than an "Unknown" bucket.
#[derive(Debug, Clone, Default)]
pub struct GroupDirectory {
    groups: HashMap<String, String>,
}

impl GroupDirectory {
    pub fn from_leaves(leaves: &[LeafRecord]) -> Result<Self> {
        let mut dir = Self::default();
        for leaf in leaves {
            dir.insert(&leaf.name, &leaf.group)?;
        }
        Ok(dir)
    }

    /// Register a name. Re-registering with the same group is a no-op.
    pub fn insert(&mut self, name: &str, group: &str) -> Result<()> {
        match self.groups.get(name) {
            Some(existing) if existing != group => Err(KpiError::AmbiguousGroup {
                name: name.to_string(),
                first: existing.clone(),
                second: group.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.groups.insert(name.to_string(), group.to_string());
                Ok(())
            }
        }
    }

    /// Make `alias` resolve to the same group as `canonical`.
    pub fn alias(&mut self, alias: &str, canonical: &str) -> Result<()> {
        let group = self.resolve(canonical)?.to_string();
        self.insert(alias, &group)
    }

    pub fn resolve(&self, name: &str) -> Result<&str> {
        self.groups
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| KpiError::UnresolvedGroupKey {
                key: name.to_string(),
                context: "group directory".to_string(),
            })
    }

    /// Copy `records` with each group taken from the directory.
    pub fn assign(&self, records: &[LeafRecord]) -> Result<Vec<LeafRecord>> {
        let out = records
            .iter()
            .map(|r| {
                let group = self.resolve(&r.name)?;
                Ok(LeafRecord {
                    group: group.to_string(),
                    ..r.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(records = out.len(), "assigned groups");
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> GroupDirectory {
        GroupDirectory::from_leaves(&[
            LeafRecord::new("Merthyr", "S1-3-BMR"),
            LeafRecord::new("Rugby", "S1-1-R"),
        ])
        .unwrap()
    }

    #[test]
    fn alias_resolves_to_canonical_group() {
        let mut dir = directory();
        dir.alias("Merthyr Tydfil", "Merthyr").unwrap();
        assert_eq!(dir.resolve("Merthyr Tydfil").unwrap(), "S1-3-BMR");
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn unknown_name_is_reported() {
        let dir = directory();
        assert!(matches!(
            dir.resolve("Swindon"),
            Err(KpiError::UnresolvedGroupKey { ref key, .. }) if key == "Swindon"
        ));
        let mut dir = dir;
        assert!(dir.alias("Tydfil", "Nowhere").is_err());
    }

    #[test]
    fn conflicting_groups_are_ambiguous() {
        let err = GroupDirectory::from_leaves(&[
            LeafRecord::new("Rugby", "S1-1-R"),
            LeafRecord::new("Rugby", "S1-2-BT"),
        ])
        .unwrap_err();
        assert!(matches!(err, KpiError::AmbiguousGroup { .. }));
    }

    #[test]
    fn assign_fills_groups_and_keeps_values() {
        let dir = directory();
        let reviews = vec![LeafRecord::new("Rugby", "").with_value("reviews", 2.0)];
        let out = dir.assign(&reviews).unwrap();
        assert_eq!(out[0].group, "S1-1-R");
        assert_eq!(out[0].get("reviews"), Some(2.0));
        assert!(dir.assign(&[LeafRecord::new("Swindon", "")]).is_err());
    }
}
