//! Consumption profile engine
//!
//! Classifies a household into six independent tag dimensions:
//! - Structure: which expense categories dominate
//! - Level: per-capita monthly spend and its stability
//! - FinancialHealth: savings rate and deficit months
//! - IncomeStructure: wage, business, property or mixed income
//! - Lifestyle and Preference: category ratios confirmed by item-name keywords
//!
//! Ratios come from the category summary (coded rows only); keyword checks
//! look at the raw ledger rows.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::keywords::{KeywordRules, KeywordSet};
use crate::config::{AnalysisConfig, ProfileThresholds};
use crate::error::{Error, Result};
use crate::models::{
    AnalysisRange, CategorySummary, EntryKind, HouseholdBasicInfo, LedgerRecord, MonthlySummary,
    TimeWindow, STANDARD_EXPENSE_CATEGORIES,
};
use crate::source::SurveySource;
use crate::stats::{coefficient_of_variation, safe_ratio};

/// Closed tag vocabulary across all six dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProfileTag {
    #[serde(rename = "数据不足")]
    InsufficientData,

    // Structure
    #[serde(rename = "基本生活型")]
    BasicLiving,
    #[serde(rename = "发展享受型")]
    DevelopmentLeisure,
    #[serde(rename = "交通依赖型")]
    TransportDependent,
    #[serde(rename = "住房高压型")]
    HousingStressed,
    #[serde(rename = "教育投资型")]
    EducationInvesting,
    #[serde(rename = "健康关注型")]
    HealthConscious,
    #[serde(rename = "均衡消费型")]
    BalancedConsumption,

    // Level
    #[serde(rename = "高消费户")]
    HighSpending,
    #[serde(rename = "理性消费户")]
    RationalSpending,
    #[serde(rename = "节俭储蓄型")]
    FrugalSaver,
    #[serde(rename = "低消费户")]
    LowSpending,
    #[serde(rename = "消费稳定型")]
    StableConsumption,
    #[serde(rename = "消费波动型")]
    VolatileConsumption,

    // Financial health
    #[serde(rename = "高储蓄率家庭")]
    HighSavings,
    #[serde(rename = "稳健储蓄家庭")]
    SteadySavings,
    #[serde(rename = "月光家庭")]
    PaycheckToPaycheck,
    #[serde(rename = "债务驱动型")]
    DebtDriven,
    #[serde(rename = "收支失衡型")]
    Imbalanced,
    #[serde(rename = "收支平衡型")]
    Balanced,

    // Income structure
    #[serde(rename = "工资主导型")]
    WageDominant,
    #[serde(rename = "经营主导型")]
    BusinessDominant,
    #[serde(rename = "财产投资驱动型")]
    PropertyDriven,
    #[serde(rename = "多元收入型")]
    DiversifiedIncome,
    #[serde(rename = "单一收入型")]
    SingleSourceIncome,

    // Lifestyle
    #[serde(rename = "家庭成长型")]
    FamilyGrowth,
    #[serde(rename = "人情社交型")]
    SocialOriented,
    #[serde(rename = "数字生活家")]
    DigitalLife,
    #[serde(rename = "便捷生活追求者")]
    ConvenienceSeeker,
    #[serde(rename = "品质生活型")]
    QualityLiving,
    #[serde(rename = "朴素生活型")]
    SimpleLiving,

    // Preference
    #[serde(rename = "美食爱好者")]
    Foodie,
    #[serde(rename = "健康养生派")]
    Wellness,
    #[serde(rename = "爱宠家庭")]
    PetOwner,
    #[serde(rename = "汽车生活族")]
    CarLife,
    #[serde(rename = "居家装修族")]
    HomeImprover,
    #[serde(rename = "文化娱乐型")]
    CultureEntertainment,
    #[serde(rename = "实用主义型")]
    Pragmatic,
}

impl ProfileTag {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InsufficientData => "数据不足",
            Self::BasicLiving => "基本生活型",
            Self::DevelopmentLeisure => "发展享受型",
            Self::TransportDependent => "交通依赖型",
            Self::HousingStressed => "住房高压型",
            Self::EducationInvesting => "教育投资型",
            Self::HealthConscious => "健康关注型",
            Self::BalancedConsumption => "均衡消费型",
            Self::HighSpending => "高消费户",
            Self::RationalSpending => "理性消费户",
            Self::FrugalSaver => "节俭储蓄型",
            Self::LowSpending => "低消费户",
            Self::StableConsumption => "消费稳定型",
            Self::VolatileConsumption => "消费波动型",
            Self::HighSavings => "高储蓄率家庭",
            Self::SteadySavings => "稳健储蓄家庭",
            Self::PaycheckToPaycheck => "月光家庭",
            Self::DebtDriven => "债务驱动型",
            Self::Imbalanced => "收支失衡型",
            Self::Balanced => "收支平衡型",
            Self::WageDominant => "工资主导型",
            Self::BusinessDominant => "经营主导型",
            Self::PropertyDriven => "财产投资驱动型",
            Self::DiversifiedIncome => "多元收入型",
            Self::SingleSourceIncome => "单一收入型",
            Self::FamilyGrowth => "家庭成长型",
            Self::SocialOriented => "人情社交型",
            Self::DigitalLife => "数字生活家",
            Self::ConvenienceSeeker => "便捷生活追求者",
            Self::QualityLiving => "品质生活型",
            Self::SimpleLiving => "朴素生活型",
            Self::Foodie => "美食爱好者",
            Self::Wellness => "健康养生派",
            Self::PetOwner => "爱宠家庭",
            Self::CarLife => "汽车生活族",
            Self::HomeImprover => "居家装修族",
            Self::CultureEntertainment => "文化娱乐型",
            Self::Pragmatic => "实用主义型",
        }
    }
}

impl fmt::Display for ProfileTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The six tag dimensions of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagDimension {
    #[serde(rename = "消费结构型标签")]
    Structure,
    #[serde(rename = "消费水平型标签")]
    Level,
    #[serde(rename = "财务健康型标签")]
    FinancialHealth,
    #[serde(rename = "收入结构型标签")]
    IncomeStructure,
    #[serde(rename = "生活方式型标签")]
    Lifestyle,
    #[serde(rename = "消费偏好型标签")]
    Preference,
}

impl TagDimension {
    pub const ALL: [TagDimension; 6] = [
        Self::Structure,
        Self::Level,
        Self::FinancialHealth,
        Self::IncomeStructure,
        Self::Lifestyle,
        Self::Preference,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Structure => "消费结构型标签",
            Self::Level => "消费水平型标签",
            Self::FinancialHealth => "财务健康型标签",
            Self::IncomeStructure => "收入结构型标签",
            Self::Lifestyle => "生活方式型标签",
            Self::Preference => "消费偏好型标签",
        }
    }
}

/// Spend on one item name across the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitStat {
    pub total_amount: f64,
    pub frequency: usize,
    pub average_amount: f64,
    /// Share of total expense (0-1)
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureCategory {
    pub name: String,
    pub amount: f64,
    /// Percentage of total expenditure (0-100)
    pub percentage: f64,
}

/// Expense totals per standard category, largest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureBreakdown {
    pub categories: Vec<StructureCategory>,
    pub total_expenditure: f64,
    pub category_count: usize,
}

/// Label for expense prefixes outside the eight standard categories
pub const OTHER_CONSUMPTION: &str = "其他消费";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionProfile {
    pub household_code: String,
    pub head_name: String,
    pub analysis_range: AnalysisRange,
    pub structure_tags: Vec<ProfileTag>,
    pub level_tags: Vec<ProfileTag>,
    pub financial_health_tags: Vec<ProfileTag>,
    pub income_structure_tags: Vec<ProfileTag>,
    pub lifestyle_tags: Vec<ProfileTag>,
    pub preference_tags: Vec<ProfileTag>,
    /// Keyed by item name
    pub habits: BTreeMap<String, HabitStat>,
    pub structure: StructureBreakdown,
}

impl ConsumptionProfile {
    pub fn tags(&self, dimension: TagDimension) -> &[ProfileTag] {
        match dimension {
            TagDimension::Structure => &self.structure_tags,
            TagDimension::Level => &self.level_tags,
            TagDimension::FinancialHealth => &self.financial_health_tags,
            TagDimension::IncomeStructure => &self.income_structure_tags,
            TagDimension::Lifestyle => &self.lifestyle_tags,
            TagDimension::Preference => &self.preference_tags,
        }
    }

    /// True if any dimension fell back to the insufficient-data tag
    pub fn has_insufficient_dimension(&self) -> bool {
        TagDimension::ALL
            .iter()
            .any(|d| self.tags(*d).contains(&ProfileTag::InsufficientData))
    }
}

/// Profile result: computed, or no ledger rows in the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HouseholdProfile {
    Complete(ConsumptionProfile),
    InsufficientData { household_code: String },
}

impl HouseholdProfile {
    pub fn as_complete(&self) -> Option<&ConsumptionProfile> {
        match self {
            Self::Complete(profile) => Some(profile),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

/// Amount share per code prefix for one entry type
struct CategoryRatios {
    ratios: HashMap<String, f64>,
    total: f64,
}

impl CategoryRatios {
    fn new(summaries: &[CategorySummary], kind: EntryKind) -> Self {
        let rows: Vec<&CategorySummary> = summaries.iter().filter(|s| s.kind == kind).collect();
        let total: f64 = rows.iter().map(|s| s.total_amount).sum();
        let mut ratios = HashMap::new();
        for row in rows {
            *ratios.entry(row.prefix.clone()).or_insert(0.0) += safe_ratio(row.total_amount, total);
        }
        Self { ratios, total }
    }

    fn has_total(&self) -> bool {
        self.total > 0.0
    }

    fn get(&self, prefix: &str) -> f64 {
        self.ratios.get(prefix).copied().unwrap_or(0.0)
    }
}

/// True if any expense row (optionally restricted to a code prefix) matches the keywords
fn any_expense_item(records: &[LedgerRecord], prefix: Option<&str>, keywords: &KeywordSet) -> bool {
    expense_items(records, prefix, keywords).next().is_some()
}

fn expense_items<'r>(
    records: &'r [LedgerRecord],
    prefix: Option<&'r str>,
    keywords: &'r KeywordSet,
) -> impl Iterator<Item = &'r LedgerRecord> + 'r {
    records.iter().filter(move |r| {
        r.kind == EntryKind::Expense
            && prefix.map_or(true, |p| r.category_prefix() == Some(p))
            && r.item_name.as_deref().is_some_and(|name| keywords.matches(name))
    })
}

pub struct ProfileEngine<'a> {
    source: &'a dyn SurveySource,
    thresholds: ProfileThresholds,
    keywords: KeywordRules,
}

impl<'a> ProfileEngine<'a> {
    pub fn new(source: &'a dyn SurveySource) -> Self {
        Self {
            source,
            thresholds: ProfileThresholds::default(),
            keywords: KeywordRules::default(),
        }
    }

    pub fn with_config(source: &'a dyn SurveySource, config: &AnalysisConfig) -> Self {
        Self {
            source,
            thresholds: config.profile.clone(),
            keywords: config.keywords.clone(),
        }
    }

    /// Build the consumption profile for one household
    ///
    /// Unknown households are `Error::NotFound`; a household with no ledger
    /// rows in the window yields `HouseholdProfile::InsufficientData`.
    pub fn generate_household_profile(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<HouseholdProfile> {
        let basic = self
            .source
            .get_household_basic_info(household_code)?
            .ok_or_else(|| {
                warn!(household = %household_code, "No basic info for household");
                Error::NotFound(format!("household {}", household_code))
            })?;

        let records = self
            .source
            .get_household_income_expense_data(household_code, window)?;
        if records.is_empty() {
            debug!(household = %household_code, "No ledger rows in window");
            return Ok(HouseholdProfile::InsufficientData {
                household_code: household_code.to_string(),
            });
        }

        let categories = self
            .source
            .get_household_category_summary(household_code, window)?;
        let monthly = self
            .source
            .get_household_monthly_summary(household_code, window)?;

        Ok(HouseholdProfile::Complete(self.build_profile(
            &basic,
            window,
            &records,
            &categories,
            &monthly,
        )))
    }

    /// Profiles for many households; errors and empty profiles are skipped
    pub fn generate_batch_profiles(
        &self,
        household_codes: &[String],
        window: &TimeWindow,
    ) -> BTreeMap<String, ConsumptionProfile> {
        let mut profiles = BTreeMap::new();
        for code in household_codes {
            match self.generate_household_profile(code, window) {
                Ok(HouseholdProfile::Complete(profile)) => {
                    profiles.insert(code.clone(), profile);
                }
                Ok(HouseholdProfile::InsufficientData { .. }) => {
                    debug!(household = %code, "Skipping household without data");
                }
                Err(e) => {
                    warn!(household = %code, error = %e, "Profile generation failed, skipping");
                }
            }
        }
        info!(
            requested = household_codes.len(),
            profiled = profiles.len(),
            "Batch profiles generated"
        );
        profiles
    }

    /// Pure profile computation over fetched rows
    pub fn build_profile(
        &self,
        basic: &HouseholdBasicInfo,
        window: &TimeWindow,
        records: &[LedgerRecord],
        categories: &[CategorySummary],
        monthly: &[MonthlySummary],
    ) -> ConsumptionProfile {
        let expense = CategoryRatios::new(categories, EntryKind::Expense);
        let income = CategoryRatios::new(categories, EntryKind::Income);

        ConsumptionProfile {
            household_code: basic.household_code.clone(),
            head_name: basic.head_name.clone(),
            analysis_range: window.range(),
            structure_tags: structure_tags(&expense),
            level_tags: level_tags(monthly, basic.household_size),
            financial_health_tags: financial_health_tags(monthly),
            income_structure_tags: income_structure_tags(&income),
            lifestyle_tags: self.lifestyle_tags(&expense, records),
            preference_tags: self.preference_tags(&expense, records),
            habits: consumption_habits(records),
            structure: structure_breakdown(categories),
        }
    }

    fn lifestyle_tags(&self, expense: &CategoryRatios, records: &[LedgerRecord]) -> Vec<ProfileTag> {
        if !expense.has_total() {
            return vec![ProfileTag::InsufficientData];
        }

        let mut tags = Vec::new();
        if expense.get("36") > 0.15 {
            tags.push(ProfileTag::FamilyGrowth);
        }
        if expense.get("38") > 0.1 {
            tags.push(ProfileTag::SocialOriented);
        }
        if expense.get("35") > 0.15
            && any_expense_item(records, Some("35"), &self.keywords.digital)
        {
            tags.push(ProfileTag::DigitalLife);
        }
        if expense.get("34") > 0.08 {
            tags.push(ProfileTag::ConvenienceSeeker);
        }
        if expense.get("32") > 0.08 {
            tags.push(ProfileTag::QualityLiving);
        }

        if tags.is_empty() {
            tags.push(ProfileTag::SimpleLiving);
        }
        tags
    }

    fn preference_tags(&self, expense: &CategoryRatios, records: &[LedgerRecord]) -> Vec<ProfileTag> {
        if !expense.has_total() {
            return vec![ProfileTag::InsufficientData];
        }

        let mut tags = Vec::new();

        if expense.get("31") > 0.35 {
            let food_items: HashSet<&str> = records
                .iter()
                .filter(|r| r.is_expense_in("31"))
                .filter_map(|r| r.item_name.as_deref())
                .collect();
            if food_items.len() >= self.thresholds.foodie_min_items {
                tags.push(ProfileTag::Foodie);
            }
        }
        if expense.get("37") > 0.12 {
            tags.push(ProfileTag::Wellness);
        }

        let pet_spend: f64 = expense_items(records, None, &self.keywords.pet)
            .map(|r| r.amount)
            .sum();
        if pet_spend > self.thresholds.pet_spend_threshold {
            tags.push(ProfileTag::PetOwner);
        }

        if expense.get("35") > 0.15 && any_expense_item(records, Some("35"), &self.keywords.car) {
            tags.push(ProfileTag::CarLife);
        }
        if expense.get("33") > 0.2
            && any_expense_item(records, Some("33"), &self.keywords.renovation)
        {
            tags.push(ProfileTag::HomeImprover);
        }
        if expense.get("36") > 0.1
            && any_expense_item(records, Some("36"), &self.keywords.entertainment)
        {
            tags.push(ProfileTag::CultureEntertainment);
        }

        if tags.is_empty() {
            tags.push(ProfileTag::Pragmatic);
        }
        tags
    }
}

fn structure_tags(expense: &CategoryRatios) -> Vec<ProfileTag> {
    if !expense.has_total() {
        return vec![ProfileTag::InsufficientData];
    }

    let mut tags = Vec::new();
    let food = expense.get("31");
    if food > 0.4 {
        tags.push(ProfileTag::BasicLiving);
    } else if food < 0.2 {
        tags.push(ProfileTag::DevelopmentLeisure);
    }
    if expense.get("35") > 0.2 {
        tags.push(ProfileTag::TransportDependent);
    }
    if expense.get("33") > 0.3 {
        tags.push(ProfileTag::HousingStressed);
    }
    if expense.get("36") > 0.15 {
        tags.push(ProfileTag::EducationInvesting);
    }
    if expense.get("37") > 0.15 {
        tags.push(ProfileTag::HealthConscious);
    }

    if tags.is_empty() {
        tags.push(ProfileTag::BalancedConsumption);
    }
    tags
}

fn level_tags(monthly: &[MonthlySummary], household_size: u32) -> Vec<ProfileTag> {
    if monthly.is_empty() {
        return vec![ProfileTag::InsufficientData];
    }

    let expenses: Vec<f64> = monthly.iter().map(|m| m.expense_total).collect();
    let avg_monthly = expenses.iter().sum::<f64>() / expenses.len() as f64;
    let per_capita = avg_monthly / household_size.max(1) as f64;

    let mut tags = vec![if per_capita > 3000.0 {
        ProfileTag::HighSpending
    } else if per_capita > 1500.0 {
        ProfileTag::RationalSpending
    } else if per_capita > 800.0 {
        ProfileTag::FrugalSaver
    } else {
        ProfileTag::LowSpending
    }];

    if monthly.len() >= 3 {
        let cv = coefficient_of_variation(&expenses);
        if cv < 0.2 {
            tags.push(ProfileTag::StableConsumption);
        } else if cv > 0.5 {
            tags.push(ProfileTag::VolatileConsumption);
        }
    }
    tags
}

fn financial_health_tags(monthly: &[MonthlySummary]) -> Vec<ProfileTag> {
    if monthly.is_empty() {
        return vec![ProfileTag::InsufficientData];
    }

    let mut tags = Vec::new();
    let income: f64 = monthly.iter().map(|m| m.income_total).sum();
    let expense: f64 = monthly.iter().map(|m| m.expense_total).sum();

    if income > 0.0 {
        let savings_rate = (income - expense) / income;
        tags.push(if savings_rate > 0.3 {
            ProfileTag::HighSavings
        } else if savings_rate > 0.1 {
            ProfileTag::SteadySavings
        } else if savings_rate > -0.1 {
            ProfileTag::PaycheckToPaycheck
        } else {
            ProfileTag::DebtDriven
        });
    }

    let deficit_months = monthly.iter().filter(|m| m.balance() < 0.0).count();
    if deficit_months * 2 > monthly.len() {
        tags.push(ProfileTag::Imbalanced);
    } else if deficit_months == 0 {
        tags.push(ProfileTag::Balanced);
    }
    tags
}

fn income_structure_tags(income: &CategoryRatios) -> Vec<ProfileTag> {
    if !income.has_total() {
        return vec![ProfileTag::InsufficientData];
    }

    let mut tags = Vec::new();
    if income.get("21") > 0.6 {
        tags.push(ProfileTag::WageDominant);
    }
    if income.get("22") > 0.5 {
        tags.push(ProfileTag::BusinessDominant);
    }
    if income.get("23") > 0.3 {
        tags.push(ProfileTag::PropertyDriven);
    }

    let max_ratio = income.ratios.values().copied().fold(0.0, f64::max);
    if max_ratio < 0.6 && income.ratios.len() >= 2 {
        tags.push(ProfileTag::DiversifiedIncome);
    }

    if tags.is_empty() {
        tags.push(ProfileTag::SingleSourceIncome);
    }
    tags
}

/// Expense rows grouped by item name
fn consumption_habits(records: &[LedgerRecord]) -> BTreeMap<String, HabitStat> {
    let mut habits: BTreeMap<String, HabitStat> = BTreeMap::new();

    for record in records.iter().filter(|r| r.kind == EntryKind::Expense) {
        let name = record
            .item_name
            .clone()
            .unwrap_or_else(|| "未知项目".to_string());
        let habit = habits.entry(name).or_insert(HabitStat {
            total_amount: 0.0,
            frequency: 0,
            average_amount: 0.0,
            share: 0.0,
        });
        habit.total_amount += record.amount;
        habit.frequency += 1;
    }

    let total: f64 = habits.values().map(|h| h.total_amount).sum();
    for habit in habits.values_mut() {
        habit.average_amount = safe_ratio(habit.total_amount, habit.frequency as f64);
        habit.share = safe_ratio(habit.total_amount, total);
    }
    habits
}

/// Standard-category expense totals, sorted by amount descending
fn structure_breakdown(categories: &[CategorySummary]) -> StructureBreakdown {
    let mut totals: Vec<(&str, f64)> = STANDARD_EXPENSE_CATEGORIES
        .iter()
        .map(|(_, label)| (*label, 0.0))
        .chain(std::iter::once((OTHER_CONSUMPTION, 0.0)))
        .collect();

    for summary in categories.iter().filter(|s| s.kind == EntryKind::Expense) {
        if summary.total_amount <= 0.0 {
            continue;
        }
        let label = STANDARD_EXPENSE_CATEGORIES
            .iter()
            .find(|(prefix, _)| *prefix == summary.prefix)
            .map(|(_, label)| *label)
            .unwrap_or(OTHER_CONSUMPTION);
        if let Some(entry) = totals.iter_mut().find(|(name, _)| *name == label) {
            entry.1 += summary.total_amount;
        }
    }

    totals.retain(|(_, amount)| *amount > 0.0);
    // Stable sort keeps category order among equal amounts
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));

    let total: f64 = totals.iter().map(|(_, amount)| amount).sum();
    StructureBreakdown {
        category_count: totals.len(),
        total_expenditure: total,
        categories: totals
            .into_iter()
            .map(|(name, amount)| StructureCategory {
                name: name.to_string(),
                amount,
                percentage: safe_ratio(amount, total) * 100.0,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_fixtures::{expense, income, month, FixtureSource};

    fn category(prefix: &str, kind: EntryKind, total: f64) -> CategorySummary {
        CategorySummary {
            prefix: prefix.to_string(),
            kind,
            record_count: 1,
            total_amount: total,
            avg_amount: total,
            min_amount: total,
            max_amount: total,
            month_count: 1,
        }
    }

    #[test]
    fn test_structure_tags() {
        let cats = vec![
            category("31", EntryKind::Expense, 500.0),
            category("35", EntryKind::Expense, 250.0),
            category("34", EntryKind::Expense, 250.0),
        ];
        let tags = structure_tags(&CategoryRatios::new(&cats, EntryKind::Expense));
        assert_eq!(tags, vec![ProfileTag::BasicLiving, ProfileTag::TransportDependent]);

        let balanced = vec![
            category("31", EntryKind::Expense, 300.0),
            category("34", EntryKind::Expense, 700.0),
        ];
        assert_eq!(
            structure_tags(&CategoryRatios::new(&balanced, EntryKind::Expense)),
            vec![ProfileTag::BalancedConsumption]
        );
    }

    #[test]
    fn test_structure_tags_without_expense() {
        let cats = vec![category("21", EntryKind::Income, 1000.0)];
        assert_eq!(
            structure_tags(&CategoryRatios::new(&cats, EntryKind::Expense)),
            vec![ProfileTag::InsufficientData]
        );
    }

    #[test]
    fn test_level_tags_per_capita_and_stability() {
        let months = vec![
            month("2024", "01", 0.0, 4000.0),
            month("2024", "02", 0.0, 4000.0),
            month("2024", "03", 0.0, 4000.0),
        ];
        // 4000 / 2 people = 2000 per capita
        assert_eq!(
            level_tags(&months, 2),
            vec![ProfileTag::RationalSpending, ProfileTag::StableConsumption]
        );

        let volatile = vec![
            month("2024", "01", 0.0, 100.0),
            month("2024", "02", 0.0, 2000.0),
            month("2024", "03", 0.0, 100.0),
        ];
        assert_eq!(
            level_tags(&volatile, 1),
            vec![ProfileTag::LowSpending, ProfileTag::VolatileConsumption]
        );

        // Fewer than three months never gets a stability tag
        assert_eq!(level_tags(&months[..2], 1), vec![ProfileTag::HighSpending]);
    }

    #[test]
    fn test_financial_health_tags() {
        let saving = vec![
            month("2024", "01", 5000.0, 3000.0),
            month("2024", "02", 5000.0, 3000.0),
        ];
        assert_eq!(
            financial_health_tags(&saving),
            vec![ProfileTag::HighSavings, ProfileTag::Balanced]
        );

        let deficit = vec![
            month("2024", "01", 1000.0, 3000.0),
            month("2024", "02", 1000.0, 1500.0),
            month("2024", "03", 1000.0, 100.0),
        ];
        assert_eq!(
            financial_health_tags(&deficit),
            vec![ProfileTag::DebtDriven, ProfileTag::Imbalanced]
        );

        assert_eq!(financial_health_tags(&[]), vec![ProfileTag::InsufficientData]);
    }

    #[test]
    fn test_income_structure_tags() {
        let wage = vec![
            category("21", EntryKind::Income, 800.0),
            category("24", EntryKind::Income, 200.0),
        ];
        assert_eq!(
            income_structure_tags(&CategoryRatios::new(&wage, EntryKind::Income)),
            vec![ProfileTag::WageDominant]
        );

        let mixed = vec![
            category("21", EntryKind::Income, 400.0),
            category("22", EntryKind::Income, 350.0),
            category("24", EntryKind::Income, 250.0),
        ];
        assert_eq!(
            income_structure_tags(&CategoryRatios::new(&mixed, EntryKind::Income)),
            vec![ProfileTag::DiversifiedIncome]
        );

        let single = vec![category("24", EntryKind::Income, 1000.0)];
        assert_eq!(
            income_structure_tags(&CategoryRatios::new(&single, EntryKind::Income)),
            vec![ProfileTag::SingleSourceIncome]
        );
    }

    #[test]
    fn test_structure_breakdown_rolls_up_other() {
        let cats = vec![
            category("31", EntryKind::Expense, 300.0),
            category("51", EntryKind::Expense, 100.0),
            category("53", EntryKind::Expense, 100.0),
            category("32", EntryKind::Expense, 0.0),
            category("21", EntryKind::Income, 9999.0),
        ];
        let breakdown = structure_breakdown(&cats);
        assert_eq!(breakdown.category_count, 2);
        assert_eq!(breakdown.total_expenditure, 500.0);
        assert_eq!(breakdown.categories[0].name, "食品烟酒");
        assert_eq!(breakdown.categories[0].percentage, 60.0);
        assert_eq!(breakdown.categories[1].name, OTHER_CONSUMPTION);
        assert_eq!(breakdown.categories[1].amount, 200.0);
    }

    #[test]
    fn test_habits_group_by_item_name() {
        let records = vec![
            expense(1, "2024-01-02", Some("310101"), "大米", 60.0),
            expense(2, "2024-01-09", Some("310101"), "大米", 40.0),
            expense(3, "2024-01-10", Some("340101"), "洗衣粉", 100.0),
            income(4, "2024-01-15", Some("210101"), "工资", 3000.0),
        ];
        let habits = consumption_habits(&records);
        assert_eq!(habits.len(), 2);
        let rice = &habits["大米"];
        assert_eq!(rice.frequency, 2);
        assert_eq!(rice.average_amount, 50.0);
        assert_eq!(rice.share, 0.5);
    }

    #[test]
    fn test_profile_for_household_without_rows_is_insufficient() {
        let source = FixtureSource::new("H0");
        let engine = ProfileEngine::new(&source);
        let profile = engine
            .generate_household_profile("H0", &TimeWindow::all())
            .unwrap();
        assert!(profile.is_insufficient());
    }

    #[test]
    fn test_unknown_household_is_not_found() {
        let source = FixtureSource::new("H0");
        let engine = ProfileEngine::new(&source);
        assert!(matches!(
            engine.generate_household_profile("NOPE", &TimeWindow::all()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_keyword_tags_from_ledger() {
        let mut source = FixtureSource::new("H1");
        source.records = vec![
            expense(1, "2024-01-02", Some("350101"), "手机话费", 300.0),
            expense(2, "2024-01-03", Some("350201"), "汽车加油", 300.0),
            expense(3, "2024-01-04", Some("310101"), "猫粮", 600.0),
            expense(4, "2024-01-05", Some("360101"), "电影票", 200.0),
        ];
        source.derive_summaries();

        let engine = ProfileEngine::new(&source);
        let profile = engine
            .generate_household_profile("H1", &TimeWindow::all())
            .unwrap();
        let profile = profile.as_complete().unwrap();

        assert!(profile.lifestyle_tags.contains(&ProfileTag::DigitalLife));
        assert!(profile.preference_tags.contains(&ProfileTag::CarLife));
        assert!(profile.preference_tags.contains(&ProfileTag::PetOwner));
        assert!(profile.preference_tags.contains(&ProfileTag::CultureEntertainment));
        // Only one distinct food item
        assert!(!profile.preference_tags.contains(&ProfileTag::Foodie));
    }

    #[test]
    fn test_foodie_needs_distinct_items() {
        let mut source = FixtureSource::new("H1");
        source.records = (0..10)
            .map(|i| expense(i + 1, "2024-01-02", Some("310101"), &format!("菜{}", i), 50.0))
            .collect();
        source.derive_summaries();

        let engine = ProfileEngine::new(&source);
        let profile = engine
            .generate_household_profile("H1", &TimeWindow::all())
            .unwrap();
        assert!(profile
            .as_complete()
            .unwrap()
            .preference_tags
            .contains(&ProfileTag::Foodie));
    }

    #[test]
    fn test_tag_serializes_as_label() {
        let json = serde_json::to_string(&ProfileTag::InsufficientData).unwrap();
        assert_eq!(json, "\"数据不足\"");
        let dim = serde_json::to_string(&TagDimension::Lifestyle).unwrap();
        assert_eq!(dim, format!("\"{}\"", TagDimension::Lifestyle.label()));
    }

    #[test]
    fn test_batch_skips_errors_and_empty() {
        let mut source = FixtureSource::new("H1");
        source.records = vec![expense(1, "2024-01-02", Some("310101"), "大米", 60.0)];
        source.derive_summaries();

        let engine = ProfileEngine::new(&source);
        let codes = vec!["H1".to_string(), "MISSING".to_string()];
        let profiles = engine.generate_batch_profiles(&codes, &TimeWindow::all());
        assert_eq!(profiles.len(), 1);
        assert!(profiles.keys().all(|k| codes.contains(k)));
    }

    fn expense_ratios(rows: &[(&str, f64)]) -> CategoryRatios {
        let cats: Vec<CategorySummary> = rows
            .iter()
            .map(|(prefix, total)| category(prefix, EntryKind::Expense, *total))
            .collect();
        CategoryRatios::new(&cats, EntryKind::Expense)
    }

    fn income_ratios(rows: &[(&str, f64)]) -> CategoryRatios {
        let cats: Vec<CategorySummary> = rows
            .iter()
            .map(|(prefix, total)| category(prefix, EntryKind::Income, *total))
            .collect();
        CategoryRatios::new(&cats, EntryKind::Income)
    }

    #[test]
    fn test_structure_tags_above_thresholds() {
        let ratios = expense_ratios(&[
            ("31", 190.0),
            ("33", 310.0),
            ("36", 160.0),
            ("37", 160.0),
            ("34", 180.0),
        ]);
        assert_eq!(
            structure_tags(&ratios),
            vec![
                ProfileTag::DevelopmentLeisure,
                ProfileTag::HousingStressed,
                ProfileTag::EducationInvesting,
                ProfileTag::HealthConscious,
            ]
        );
    }

    #[test]
    fn test_structure_tags_at_thresholds() {
        let ratios = expense_ratios(&[
            ("31", 200.0),
            ("33", 300.0),
            ("36", 150.0),
            ("37", 150.0),
            ("34", 200.0),
        ]);
        assert_eq!(structure_tags(&ratios), vec![ProfileTag::BalancedConsumption]);

        let food_at_limit = expense_ratios(&[("31", 400.0), ("34", 600.0)]);
        assert_eq!(structure_tags(&food_at_limit), vec![ProfileTag::BalancedConsumption]);

        let food_over = expense_ratios(&[("31", 410.0), ("34", 590.0)]);
        assert_eq!(structure_tags(&food_over), vec![ProfileTag::BasicLiving]);
    }

    #[test]
    fn test_level_tags_per_capita_bands() {
        let single = |total: f64| vec![month("2024", "01", 0.0, total)];

        assert_eq!(level_tags(&single(3000.5), 1), vec![ProfileTag::HighSpending]);
        assert_eq!(level_tags(&single(3000.0), 1), vec![ProfileTag::RationalSpending]);
        assert_eq!(level_tags(&single(1500.0), 1), vec![ProfileTag::FrugalSaver]);
        assert_eq!(level_tags(&single(800.5), 1), vec![ProfileTag::FrugalSaver]);
        assert_eq!(level_tags(&single(800.0), 1), vec![ProfileTag::LowSpending]);
    }

    #[test]
    fn test_financial_health_savings_bands() {
        let one = |income: f64, expense: f64| vec![month("2024", "01", income, expense)];

        // 0.3 exactly falls to steady savings
        assert_eq!(
            financial_health_tags(&one(1000.0, 700.0)),
            vec![ProfileTag::SteadySavings, ProfileTag::Balanced]
        );
        assert_eq!(
            financial_health_tags(&one(1000.0, 800.0)),
            vec![ProfileTag::SteadySavings, ProfileTag::Balanced]
        );
        assert_eq!(
            financial_health_tags(&one(1000.0, 900.0)),
            vec![ProfileTag::PaycheckToPaycheck, ProfileTag::Balanced]
        );
        assert_eq!(
            financial_health_tags(&one(1000.0, 1000.0)),
            vec![ProfileTag::PaycheckToPaycheck, ProfileTag::Balanced]
        );
        assert_eq!(
            financial_health_tags(&one(1000.0, 1050.0)),
            vec![ProfileTag::PaycheckToPaycheck, ProfileTag::Imbalanced]
        );
        assert_eq!(
            financial_health_tags(&one(1000.0, 1100.0)),
            vec![ProfileTag::DebtDriven, ProfileTag::Imbalanced]
        );

        // No income: only the balance dimension applies
        assert_eq!(financial_health_tags(&one(0.0, 500.0)), vec![ProfileTag::Imbalanced]);
    }

    #[test]
    fn test_financial_health_half_deficit_months() {
        let months = vec![
            month("2024", "01", 1000.0, 1200.0),
            month("2024", "02", 1000.0, 600.0),
        ];
        // One deficit month out of two is neither imbalanced nor balanced
        assert_eq!(financial_health_tags(&months), vec![ProfileTag::PaycheckToPaycheck]);
    }

    #[test]
    fn test_income_structure_thresholds() {
        assert_eq!(
            income_structure_tags(&income_ratios(&[("22", 510.0), ("21", 490.0)])),
            vec![ProfileTag::BusinessDominant, ProfileTag::DiversifiedIncome]
        );
        assert_eq!(
            income_structure_tags(&income_ratios(&[("22", 500.0), ("21", 500.0)])),
            vec![ProfileTag::DiversifiedIncome]
        );
        assert_eq!(
            income_structure_tags(&income_ratios(&[("23", 310.0), ("21", 690.0)])),
            vec![ProfileTag::WageDominant, ProfileTag::PropertyDriven]
        );
        assert_eq!(
            income_structure_tags(&income_ratios(&[("23", 300.0), ("21", 700.0)])),
            vec![ProfileTag::WageDominant]
        );
        // 0.6 is neither wage dominant nor diversified
        assert_eq!(
            income_structure_tags(&income_ratios(&[("21", 600.0), ("24", 400.0)])),
            vec![ProfileTag::SingleSourceIncome]
        );
    }

    #[test]
    fn test_lifestyle_tags_thresholds() {
        let source = FixtureSource::new("H1");
        let engine = ProfileEngine::new(&source);

        let above = expense_ratios(&[
            ("36", 160.0),
            ("38", 110.0),
            ("34", 90.0),
            ("32", 90.0),
            ("31", 550.0),
        ]);
        assert_eq!(
            engine.lifestyle_tags(&above, &[]),
            vec![
                ProfileTag::FamilyGrowth,
                ProfileTag::SocialOriented,
                ProfileTag::ConvenienceSeeker,
                ProfileTag::QualityLiving,
            ]
        );

        let at = expense_ratios(&[
            ("36", 150.0),
            ("38", 100.0),
            ("34", 80.0),
            ("32", 80.0),
            ("31", 590.0),
        ]);
        assert_eq!(engine.lifestyle_tags(&at, &[]), vec![ProfileTag::SimpleLiving]);

        // Heavy transport spend without a digital item
        let transport = expense_ratios(&[("35", 500.0), ("31", 500.0)]);
        let records = vec![expense(1, "2024-01-02", Some("350101"), "公交卡", 500.0)];
        assert_eq!(
            engine.lifestyle_tags(&transport, &records),
            vec![ProfileTag::SimpleLiving]
        );
    }

    #[test]
    fn test_preference_tags_thresholds() {
        let source = FixtureSource::new("H1");
        let engine = ProfileEngine::new(&source);
        let renovation = vec![expense(1, "2024-01-02", Some("330101"), "装修材料", 210.0)];

        let above = expense_ratios(&[("37", 130.0), ("33", 210.0), ("34", 660.0)]);
        assert_eq!(
            engine.preference_tags(&above, &renovation),
            vec![ProfileTag::Wellness, ProfileTag::HomeImprover]
        );

        let at = expense_ratios(&[("37", 120.0), ("33", 200.0), ("34", 680.0)]);
        assert_eq!(engine.preference_tags(&at, &renovation), vec![ProfileTag::Pragmatic]);

        // Housing spend alone, no renovation item
        let rent = vec![expense(1, "2024-01-02", Some("330101"), "房租", 210.0)];
        assert_eq!(engine.preference_tags(&above, &rent), vec![ProfileTag::Wellness]);
    }

    #[test]
    fn test_pet_owner_threshold() {
        let source = FixtureSource::new("H1");
        let engine = ProfileEngine::new(&source);
        let ratios = expense_ratios(&[("34", 1000.0)]);

        let at = vec![expense(1, "2024-01-02", Some("340101"), "宠物用品", 500.0)];
        assert_eq!(engine.preference_tags(&ratios, &at), vec![ProfileTag::Pragmatic]);

        let over = vec![expense(1, "2024-01-02", Some("340101"), "宠物用品", 500.5)];
        assert_eq!(engine.preference_tags(&ratios, &over), vec![ProfileTag::PetOwner]);
    }
}
