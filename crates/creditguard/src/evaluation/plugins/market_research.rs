use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataSourcePlugin, FetchContext, PluginFailure, PluginKind, PluginPayload, PluginResult};
use crate::evaluation::domain::{
    CustomerId, InsightCategory, MarketInsight, MarketIntelligence, RiskLevel,
};

const DEFAULT_MAX_RESULTS: usize = 20;
const MAX_CONFIDENCE: f64 = 0.9;
const CONFIDENCE_PER_HIT: f64 = 0.15;

/// Query issued to the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub max_results: usize,
}

/// One raw result returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
}

/// News/web search backend.
#[async_trait]
pub trait MarketSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, super::CollaboratorError>;
}

/// Fan-in plugin turning fraud and economic news into structured insights.
pub struct MarketResearchPlugin<S> {
    search: Arc<S>,
    max_results: usize,
}

impl<S> MarketResearchPlugin<S>
where
    S: MarketSearch + 'static,
{
    pub fn new(search: Arc<S>) -> Self {
        Self {
            search,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }
}

#[async_trait]
impl<S> DataSourcePlugin for MarketResearchPlugin<S>
where
    S: MarketSearch + 'static,
{
    fn kind(&self) -> PluginKind {
        PluginKind::MarketResearch
    }

    async fn fetch(&self, customer_id: &CustomerId, context: &FetchContext) -> PluginResult {
        let query = SearchQuery {
            text: build_query(context),
            max_results: self.max_results,
        };

        let hits = match self.search.search(&query).await {
            Ok(hits) => hits,
            Err(err) => return PluginResult::Failure(PluginFailure::from(err)),
        };

        let insights = classify_hits(&hits);
        debug!(
            %customer_id,
            hits = hits.len(),
            insights = insights.len(),
            "market research classified"
        );

        PluginResult::Success(PluginPayload::MarketResearch(MarketIntelligence {
            query: query.text,
            insights,
        }))
    }
}

fn build_query(context: &FetchContext) -> String {
    let year = context.requested_at.year();
    let occupation = context.profile.employment.occupation.trim();
    if occupation.is_empty() {
        format!("credit card fraud trends {year}")
    } else {
        format!("credit card fraud trends {year} {occupation}")
    }
}

fn keywords(category: InsightCategory) -> &'static [&'static str] {
    match category {
        InsightCategory::CardSkimming => &["skimming", "card reader", "atm fraud", "point of sale"],
        InsightCategory::IdentityTheft => &[
            "identity theft",
            "social security",
            "personal information",
            "data breach",
        ],
        InsightCategory::SyntheticIdentity => {
            &["synthetic identity", "fake identity", "identity creation"]
        }
        InsightCategory::AccountTakeover => {
            &["account takeover", "credential stuffing", "password breach"]
        }
        InsightCategory::OnlineFraud => &[
            "online fraud",
            "e-commerce fraud",
            "digital fraud",
            "phishing",
        ],
        InsightCategory::EconomicHeadwinds => {
            &["recession", "unemployment", "inflation", "interest rate", "layoffs"]
        }
    }
}

fn grade_hit(content: &str) -> RiskLevel {
    if ["surge", "increase", "rising", "epidemic"]
        .iter()
        .any(|word| content.contains(word))
    {
        RiskLevel::High
    } else if ["concern", "alert", "warning"]
        .iter()
        .any(|word| content.contains(word))
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn rollup(grades: &[RiskLevel]) -> RiskLevel {
    let high = grades.iter().filter(|grade| **grade >= RiskLevel::High).count();
    let medium = grades.iter().filter(|grade| **grade == RiskLevel::Medium).count();
    if high >= 2 {
        RiskLevel::High
    } else if medium >= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Groups hits by keyword category; output follows [`InsightCategory::ALL`] order.
pub(crate) fn classify_hits(hits: &[SearchHit]) -> Vec<MarketInsight> {
    let mut matched: BTreeMap<InsightCategory, Vec<(&SearchHit, RiskLevel)>> = BTreeMap::new();

    for hit in hits {
        let content = format!("{} {}", hit.title, hit.description).to_lowercase();
        let grade = grade_hit(&content);
        for category in InsightCategory::ALL {
            if keywords(category)
                .iter()
                .any(|keyword| content.contains(keyword))
            {
                matched.entry(category).or_default().push((hit, grade));
            }
        }
    }

    matched
        .into_iter()
        .map(|(category, entries)| {
            let grades: Vec<RiskLevel> = entries.iter().map(|(_, grade)| *grade).collect();
            let mut sources: Vec<String> = Vec::new();
            for (hit, _) in &entries {
                if !sources.contains(&hit.source) {
                    sources.push(hit.source.clone());
                }
            }
            let lead = entries
                .first()
                .map(|(hit, _)| hit.title.as_str())
                .unwrap_or_default();

            MarketInsight {
                category,
                severity: rollup(&grades),
                title: category.title().to_string(),
                summary: format!("{} matching report(s); latest: {lead}", entries.len()),
                confidence: (entries.len() as f64 * CONFIDENCE_PER_HIT).min(MAX_CONFIDENCE),
                sources,
            }
        })
        .collect()
}
