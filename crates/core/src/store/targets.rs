use crate::model::{FacilityId, YearlyTarget};
use crate::{StatsError, StatsResult};
use ptm_types::DiseaseType;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to yearly programme targets.
pub trait TargetStore: Send + Sync {
    /// The target for one facility, disease and year. `None` when no target was set, which
    /// callers treat as a target of zero.
    fn get_target(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<Option<u32>>;
}

type TargetKey = (FacilityId, DiseaseType, i32);

#[derive(Default)]
pub struct MemoryTargetStore {
    targets: RwLock<HashMap<TargetKey, u32>>,
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a target once.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidInput`] if a target already exists for the key.
    pub fn set_target(&self, target: YearlyTarget) -> StatsResult<()> {
        let mut targets = self.targets.write()?;
        let key = (target.facility, target.disease, target.year);
        if targets.contains_key(&key) {
            return Err(StatsError::InvalidInput(format!(
                "target for facility {} {} {} is already set",
                key.0, key.1, key.2
            )));
        }
        targets.insert(key, target.target);
        Ok(())
    }
}

impl TargetStore for MemoryTargetStore {
    fn get_target(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<Option<u32>> {
        let targets = self.targets.read()?;
        Ok(targets.get(&(facility.clone(), disease, year)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptm_uuid::ShardableUuid;

    #[test]
    fn missing_target_is_none() {
        let store = MemoryTargetStore::new();
        let facility = ShardableUuid::new();
        store
            .set_target(YearlyTarget {
                facility: facility.clone(),
                disease: DiseaseType::Ht,
                year: 2024,
                target: 40,
            })
            .unwrap();

        assert_eq!(store.get_target(&facility, DiseaseType::Ht, 2024).unwrap(), Some(40));
        assert_eq!(store.get_target(&facility, DiseaseType::Dm, 2024).unwrap(), None);
        assert_eq!(store.get_target(&facility, DiseaseType::Ht, 2025).unwrap(), None);
    }

    #[test]
    fn targets_are_set_once() {
        let store = MemoryTargetStore::new();
        let target = YearlyTarget {
            facility: ShardableUuid::new(),
            disease: DiseaseType::Dm,
            year: 2024,
            target: 10,
        };
        store.set_target(target.clone()).unwrap();
        assert!(matches!(store.set_target(target), Err(StatsError::InvalidInput(_))));
    }
}
