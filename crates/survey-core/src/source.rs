//! Read-only query surface consumed by the analysis engines
//!
//! Engines only see `&dyn SurveySource`, so they can run against the SQLite
//! [`Database`] in production and against hand-built fixtures in tests.

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    BenchmarkScope, Benchmarks, CategorySummary, HouseholdBasicInfo, LedgerRecord,
    MonthlySummary, RecordingPattern, TimeWindow,
};

pub trait SurveySource {
    fn get_household_basic_info(&self, household_code: &str) -> Result<Option<HouseholdBasicInfo>>;

    fn get_household_income_expense_data(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<LedgerRecord>>;

    fn get_household_monthly_summary(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<MonthlySummary>>;

    fn get_household_category_summary(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<CategorySummary>>;

    fn get_statistical_benchmarks(&self, scope: &BenchmarkScope) -> Result<Benchmarks>;

    fn get_household_recording_patterns(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Option<RecordingPattern>>;

    fn get_households_by_area(
        &self,
        town_name: Option<&str>,
        village_name: Option<&str>,
    ) -> Result<Vec<String>>;
}

impl SurveySource for Database {
    fn get_household_basic_info(&self, household_code: &str) -> Result<Option<HouseholdBasicInfo>> {
        Database::get_household_basic_info(self, household_code)
    }

    fn get_household_income_expense_data(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<LedgerRecord>> {
        Database::get_household_income_expense_data(self, household_code, window)
    }

    fn get_household_monthly_summary(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<MonthlySummary>> {
        Database::get_household_monthly_summary(self, household_code, window)
    }

    fn get_household_category_summary(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<CategorySummary>> {
        Database::get_household_category_summary(self, household_code, window)
    }

    fn get_statistical_benchmarks(&self, scope: &BenchmarkScope) -> Result<Benchmarks> {
        Database::get_statistical_benchmarks(self, scope)
    }

    fn get_household_recording_patterns(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Option<RecordingPattern>> {
        Database::get_household_recording_patterns(self, household_code, window)
    }

    fn get_households_by_area(
        &self,
        town_name: Option<&str>,
        village_name: Option<&str>,
    ) -> Result<Vec<String>> {
        Database::get_households_by_area(self, town_name, village_name)
    }
}
