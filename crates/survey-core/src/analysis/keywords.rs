//! Item-name keyword tables for lifestyle and preference tagging

use regex::Regex;

use crate::error::Result;

/// A named set of substrings matched against ledger item names
#[derive(Debug, Clone)]
pub struct KeywordSet {
    keywords: Vec<String>,
    matcher: Option<Regex>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k| !k.trim().is_empty())
            .collect();

        let matcher = if keywords.is_empty() {
            None
        } else {
            let alternation = keywords
                .iter()
                .map(|k| regex::escape(k.trim()))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&alternation)?)
        };

        Ok(Self { keywords, matcher })
    }

    /// True if any keyword occurs in `text`; an empty set never matches
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.as_ref().is_some_and(|re| re.is_match(text))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Keyword tables per tagging rule
#[derive(Debug, Clone)]
pub struct KeywordRules {
    /// Telecom/internet items under transport & communication
    pub digital: KeywordSet,
    pub pet: KeywordSet,
    pub car: KeywordSet,
    /// Furnishing and building items under housing
    pub renovation: KeywordSet,
    pub entertainment: KeywordSet,
}

pub const DEFAULT_DIGITAL: &[&str] = &["通信", "网络", "流量", "话费", "宽带"];
pub const DEFAULT_PET: &[&str] = &["宠物", "猫", "狗", "鸟", "鱼", "宠"];
pub const DEFAULT_CAR: &[&str] = &["汽车", "车", "油费", "停车", "保险", "维修"];
pub const DEFAULT_RENOVATION: &[&str] = &["装修", "家具", "电器", "建材"];
pub const DEFAULT_ENTERTAINMENT: &[&str] = &["娱乐", "旅游", "电影", "游戏", "运动"];

impl KeywordRules {
    pub fn from_lists(
        digital: &[String],
        pet: &[String],
        car: &[String],
        renovation: &[String],
        entertainment: &[String],
    ) -> Result<Self> {
        Ok(Self {
            digital: KeywordSet::new(digital.iter().cloned())?,
            pet: KeywordSet::new(pet.iter().cloned())?,
            car: KeywordSet::new(car.iter().cloned())?,
            renovation: KeywordSet::new(renovation.iter().cloned())?,
            entertainment: KeywordSet::new(entertainment.iter().cloned())?,
        })
    }
}

impl Default for KeywordRules {
    fn default() -> Self {
        // Escaped literals always compile
        let set = |words: &[&str]| KeywordSet::new(words.iter().copied()).unwrap_or(KeywordSet {
            keywords: Vec::new(),
            matcher: None,
        });
        Self {
            digital: set(DEFAULT_DIGITAL),
            pet: set(DEFAULT_PET),
            car: set(DEFAULT_CAR),
            renovation: set(DEFAULT_RENOVATION),
            entertainment: set(DEFAULT_ENTERTAINMENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_match_substrings() {
        let rules = KeywordRules::default();
        assert!(rules.digital.matches("手机话费充值"));
        assert!(rules.digital.matches("宽带年费"));
        assert!(!rules.digital.matches("公交卡"));
        assert!(rules.pet.matches("猫粮"));
        assert!(rules.car.matches("汽车加油"));
        assert!(rules.renovation.matches("厨房装修"));
        assert!(rules.entertainment.matches("电影票"));
    }

    #[test]
    fn test_keywords_are_literal() {
        let set = KeywordSet::new(["a.b", "(x)"]).unwrap();
        assert!(set.matches("xa.by"));
        assert!(!set.matches("axb"));
        assert!(set.matches("(x)"));
    }

    #[test]
    fn test_empty_set_never_matches() {
        let set = KeywordSet::new(Vec::<String>::new()).unwrap();
        assert!(!set.matches("anything"));
        let blanks = KeywordSet::new(["", "  "]).unwrap();
        assert!(blanks.keywords().is_empty());
        assert!(!blanks.matches(""));
    }
}
