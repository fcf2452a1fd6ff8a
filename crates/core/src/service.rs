//! Statistics service.
//!
//! Wires the examination and target stores, the cache and the resolved configuration together
//! and exposes the engine's operations: classification, aggregation, cache maintenance after
//! writes, and ranking. Entry points (CLI, runner) are thin adapters over this type.
//!
//! Writes to one (facility, disease, year) are serialised on a per-year lock held from the
//! examination store update through the cache write, so a recompute never overwrites rows
//! computed from a newer examination log. Different years and facilities proceed in parallel.

use crate::aggregator::{Aggregator, Scope, ScopeStatistics, YearlyStatistics};
use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::classifier::Classification;
use crate::config::CoreConfig;
use crate::model::{Examination, ExaminationId, Facility, FacilityId, PatientId};
use crate::ranking::{self, DiseaseFilter, FacilityRankRow, Ranking};
use crate::recompute::{on_examination_written, RecomputeJob};
use crate::store::{ExaminationStore, MemoryExaminationStore, TargetStore};
use crate::{StatsError, StatsResult};
use ptm_types::{DiseaseType, Month};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

type YearKey = (FacilityId, DiseaseType, i32);

/// One writer lock per (facility, disease, year), created on first use.
#[derive(Default)]
struct YearLocks {
    locks: Mutex<HashMap<YearKey, Arc<Mutex<()>>>>,
}

impl YearLocks {
    fn get(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock()?;
        Ok(locks
            .entry((facility.clone(), disease, year))
            .or_default()
            .clone())
    }
}

/// Ranking payload for dashboards: every row plus the top and bottom slices.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub year: i32,
    pub month: Option<Month>,
    pub rows: Vec<FacilityRankRow>,
    pub top: Vec<FacilityRankRow>,
    pub bottom: Vec<FacilityRankRow>,
}

#[derive(Clone)]
pub struct StatisticsService {
    cfg: Arc<CoreConfig>,
    examinations: Arc<MemoryExaminationStore>,
    targets: Arc<dyn TargetStore>,
    cache: Arc<dyn CacheStore>,
    locks: Arc<YearLocks>,
    pending: Arc<Mutex<BTreeMap<YearKey, RecomputeJob>>>,
}

impl StatisticsService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        examinations: Arc<MemoryExaminationStore>,
        targets: Arc<dyn TargetStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            cfg,
            examinations,
            targets,
            cache,
            locks: Arc::default(),
            pending: Arc::default(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn examinations(&self) -> &MemoryExaminationStore {
        &self.examinations
    }

    fn aggregator(&self) -> Aggregator<'_> {
        Aggregator::new(self.examinations.as_ref(), self.cfg.controlled_rule())
    }

    pub fn classify_patient(
        &self,
        patient: &PatientId,
        disease: DiseaseType,
        year: i32,
        month: Option<Month>,
    ) -> StatsResult<Classification> {
        if self.examinations.patient(patient)?.is_none() {
            return Err(StatsError::UnknownPatient(patient.to_string()));
        }
        self.aggregator()
            .classify_patient(patient, disease, year, month)
    }

    /// Aggregate one scope straight from the examination store, bypassing the cache.
    pub fn aggregate(&self, scope: &Scope) -> StatsResult<ScopeStatistics> {
        self.aggregator().aggregate(scope)
    }

    pub fn aggregate_year(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<YearlyStatistics> {
        self.aggregator().aggregate_year(facility, disease, year)
    }

    /// Record an examination and bring the cache up to date for the rest of its year.
    pub fn record_examination(&self, examination: Examination) -> StatsResult<RecomputeJob> {
        let job = on_examination_written(&examination);
        let lock = self.locks.get(&job.facility, job.disease, job.year)?;
        let _guard = lock.lock()?;

        self.examinations.record(examination)?;
        self.recompute_locked(&job)?;
        Ok(job)
    }

    /// Record an examination and bump only the written month's counters.
    ///
    /// Later months and the year row may be stale afterwards. The returned job is queued and
    /// merged with other pending jobs for the same year; run it with
    /// [`StatisticsService::run_pending`] (or [`StatisticsService::run_recompute`]) before the
    /// cache is relied on for reporting.
    pub fn record_examination_fast(
        &self,
        examination: Examination,
    ) -> StatsResult<RecomputeJob> {
        let job = on_examination_written(&examination);
        let key = CacheKey::new(
            examination.facility.clone(),
            examination.disease(),
            examination.year,
            examination.month,
        );
        let patient = examination.patient.clone();

        let lock = self.locks.get(&key.facility, key.disease, key.year)?;
        let guard = lock.lock()?;
        if self.examinations.record(examination)? {
            let gender = self
                .examinations
                .patient(&patient)?
                .map(|p| p.gender)
                .unwrap_or_default();
            let classification = self.aggregator().classify_patient(
                &patient,
                key.disease,
                key.year,
                Some(key.month),
            )?;
            let entry = self
                .cache
                .increment(&key, gender, classification.is_standard)?;
            tracing::debug!(
                facility = %key.facility,
                disease = %key.disease,
                year = key.year,
                month = key.month.number(),
                total = entry.total_count(),
                "incremented cache row"
            );
        }
        drop(guard);

        self.queue(&job)?;
        tracing::info!(job = %job, "recompute pending");
        Ok(job)
    }

    /// Remove a current-year examination and recompute the rest of its year.
    pub fn remove_examination(&self, id: &ExaminationId) -> StatsResult<RecomputeJob> {
        let existing = self
            .examinations
            .examination(id)?
            .ok_or_else(|| StatsError::UnknownExamination(id.to_string()))?;
        let lock = self
            .locks
            .get(&existing.facility, existing.disease(), existing.year)?;
        let _guard = lock.lock()?;

        let removed = self.examinations.remove(id)?;
        let job = on_examination_written(&removed);
        self.recompute_locked(&job)?;
        Ok(job)
    }

    /// Re-aggregate the job's months and the year row and replace them in the cache in one
    /// write.
    pub fn run_recompute(
        &self,
        job: &RecomputeJob,
    ) -> StatsResult<BTreeMap<Month, ScopeStatistics>> {
        let lock = self.locks.get(&job.facility, job.disease, job.year)?;
        let _guard = lock.lock()?;
        self.recompute_locked(job)
    }

    /// Caller holds the year lock for `job`.
    fn recompute_locked(
        &self,
        job: &RecomputeJob,
    ) -> StatsResult<BTreeMap<Month, ScopeStatistics>> {
        let aggregator = self.aggregator();
        let monthly =
            aggregator.aggregate_months(&job.facility, job.disease, job.year, job.from_month)?;
        let year_row = aggregator
            .aggregate(&Scope::year(job.facility.clone(), job.disease, job.year))?
            .entry;
        let entries: BTreeMap<Month, CacheEntry> =
            monthly.iter().map(|(m, s)| (*m, s.entry)).collect();
        self.cache.replace_months(
            &job.facility,
            job.disease,
            job.year,
            job.from_month,
            &entries,
            year_row,
        )?;
        self.settle(job)?;

        tracing::info!(
            job = %job,
            patients = year_row.total_count(),
            "recomputed cache rows"
        );
        Ok(monthly)
    }

    /// Add `job` to the pending queue, merging with a queued job for the same year.
    fn queue(&self, job: &RecomputeJob) -> StatsResult<()> {
        let mut pending = self.pending.lock()?;
        let key = (job.facility.clone(), job.disease, job.year);
        let merged = match pending.get(&key) {
            Some(queued) => queued.merge(job).unwrap_or_else(|| job.clone()),
            None => job.clone(),
        };
        pending.insert(key, merged);
        Ok(())
    }

    /// Drop a pending job that `done` covers.
    fn settle(&self, done: &RecomputeJob) -> StatsResult<()> {
        let mut pending = self.pending.lock()?;
        let key = (done.facility.clone(), done.disease, done.year);
        if pending
            .get(&key)
            .is_some_and(|queued| done.from_month <= queued.from_month)
        {
            pending.remove(&key);
        }
        Ok(())
    }

    /// Jobs queued by the fast write path, one per (facility, disease, year).
    pub fn pending_jobs(&self) -> StatsResult<Vec<RecomputeJob>> {
        Ok(self.pending.lock()?.values().cloned().collect())
    }

    /// Run every pending job. Returns how many ran.
    ///
    /// Jobs that did not run because an earlier one failed stay queued.
    pub fn run_pending(&self) -> StatsResult<usize> {
        let jobs = self.pending_jobs()?;
        for job in &jobs {
            self.run_recompute(job)?;
        }
        tracing::info!(jobs = jobs.len(), "ran pending recompute jobs");
        Ok(jobs.len())
    }

    pub fn recompute_year(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<BTreeMap<Month, ScopeStatistics>> {
        self.run_recompute(&RecomputeJob::full_year(facility.clone(), disease, year))
    }

    /// Recompute every facility and disease for `year`, facilities in parallel.
    ///
    /// Returns the number of (facility, disease) years rewritten.
    pub fn recompute_year_for_all(&self, facilities: &[Facility], year: i32) -> StatsResult<usize> {
        let jobs: Vec<RecomputeJob> = facilities
            .iter()
            .flat_map(|f| {
                DiseaseType::ALL
                    .into_iter()
                    .map(move |d| RecomputeJob::full_year(f.id.clone(), d, year))
            })
            .collect();

        jobs.par_iter()
            .try_for_each(|job| self.run_recompute(job).map(|_| ()))?;

        tracing::info!(year, jobs = jobs.len(), "recomputed year for all facilities");
        Ok(jobs.len())
    }

    pub fn monthly_cache(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        month: Month,
    ) -> StatsResult<CacheEntry> {
        self.cache
            .read(&CacheKey::new(facility.clone(), disease, year, month))
    }

    /// Sum of the twelve monthly rows.
    pub fn yearly_summary(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<CacheEntry> {
        self.cache.yearly_summary(facility, disease, year)
    }

    /// Cached whole-year counts, each patient once.
    pub fn yearly_patients(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<CacheEntry> {
        self.cache.read_year_row(facility, disease, year)
    }

    pub fn rank_facilities(
        &self,
        facilities: &[Facility],
        year: i32,
        month: Option<Month>,
        filter: DiseaseFilter,
    ) -> StatsResult<Ranking> {
        ranking::rank_facilities(
            self.cache.as_ref(),
            self.targets.as_ref(),
            facilities,
            year,
            month,
            filter,
            self.cfg.achievement_basis(),
        )
    }

    /// Ranking with top/bottom slices sized by the configured highlight count.
    pub fn dashboard(
        &self,
        facilities: &[Facility],
        year: i32,
        month: Option<Month>,
        filter: DiseaseFilter,
    ) -> StatsResult<Dashboard> {
        let ranking = self.rank_facilities(facilities, year, month, filter)?;
        let n = self.cfg.highlight_count();
        Ok(Dashboard {
            year,
            month,
            top: ranking.top(n).to_vec(),
            bottom: ranking.bottom(n).to_vec(),
            rows: ranking.into_rows(),
        })
    }
}
