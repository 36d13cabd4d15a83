use std::cmp::Ordering;

use super::config::ScoringConfig;
use crate::evaluation::domain::{
    BureauReport, CustomerProfile, FactorKind, MarketInsight, MarketIntelligence,
    PaymentHistory, RiskFactor, RiskLevel,
};

/// Every factor kind reaches this on its worst evidence.
const MAX_POINTS: f64 = 100.0;
const MARKET_BASELINE: f64 = 15.0;
const ECONOMIC_MEDIUM: f64 = 50.0;
const MARKET_WINDOW: usize = 5;

fn factor(
    config: &ScoringConfig,
    kind: FactorKind,
    points: f64,
    description: String,
    recommendation: &str,
) -> RiskFactor {
    let contribution = points.clamp(0.0, 100.0);
    RiskFactor {
        kind,
        name: kind.name().to_string(),
        weight: config.weights.weight(kind),
        contribution,
        severity: config.thresholds.classify(contribution),
        description,
        recommendation: recommendation.to_string(),
    }
}

pub(crate) fn credit_score_points(score: u16) -> f64 {
    match score {
        800.. => 5.0,
        750..=799 => 10.0,
        700..=749 => 20.0,
        650..=699 => 35.0,
        600..=649 => 50.0,
        550..=599 => 70.0,
        500..=549 => 85.0,
        _ => MAX_POINTS,
    }
}

pub(crate) fn debt_to_income_points(ratio: f64) -> (f64, &'static str) {
    if ratio > 0.60 {
        (MAX_POINTS, "Decline or require substantial debt reduction")
    } else if ratio > 0.50 {
        (80.0, "Require debt consolidation or co-signer")
    } else if ratio > 0.40 {
        (60.0, "Lower credit limits and close monitoring")
    } else if ratio > 0.30 {
        (35.0, "Standard underwriting acceptable")
    } else if ratio > 0.20 {
        (20.0, "Standard underwriting acceptable")
    } else {
        (10.0, "Qualified for premium products")
    }
}

fn payment_rating_points(rating: Option<PaymentHistory>) -> f64 {
    match rating {
        Some(PaymentHistory::Excellent) => 5.0,
        Some(PaymentHistory::Good) => 15.0,
        Some(PaymentHistory::Fair) => 45.0,
        Some(PaymentHistory::Poor) => 75.0,
        None => 10.0,
    }
}

fn delinquency_points(rate: f64) -> f64 {
    if rate > 0.50 {
        MAX_POINTS
    } else if rate > 0.30 {
        90.0
    } else if rate > 0.15 {
        70.0
    } else if rate > 0.0 {
        45.0
    } else {
        0.0
    }
}

/// Bureau ratio when reported, otherwise monthly debt over monthly income from the profile.
fn debt_to_income(report: &BureauReport, profile: &CustomerProfile) -> (f64, &'static str) {
    if let Some(ratio) = report.debt_to_income {
        return (ratio, "reported by bureau");
    }
    let monthly_income = profile.monthly_income();
    if monthly_income > 0.0 {
        (
            f64::from(profile.credit_history.monthly_debt_payments) / monthly_income,
            "derived from profile",
        )
    } else {
        (1.0, "no declared income")
    }
}

pub(crate) fn bureau_factors(
    report: &BureauReport,
    profile: &CustomerProfile,
    config: &ScoringConfig,
) -> Vec<RiskFactor> {
    let mut factors = Vec::new();

    let score = report.credit_score;
    let recommendation = if score < 650 {
        "Consider secured credit products or co-signer requirements"
    } else if score < 700 {
        "Standard underwriting with close monitoring"
    } else {
        "Eligible for premium credit products"
    };
    factors.push(factor(
        config,
        FactorKind::CreditScore,
        credit_score_points(score),
        format!("credit score {score}"),
        recommendation,
    ));

    let (ratio, origin) = debt_to_income(report, profile);
    let (points, recommendation) = debt_to_income_points(ratio);
    factors.push(factor(
        config,
        FactorKind::DebtToIncome,
        points,
        format!("debt-to-income ratio {:.1}% ({origin})", ratio * 100.0),
        recommendation,
    ));

    if report.payment_history.is_some() || report.total_accounts > 0 {
        let rate = report.delinquency_rate();
        let points = payment_rating_points(report.payment_history).max(delinquency_points(rate));
        let recommendation = if points >= 45.0 {
            "Implement enhanced payment monitoring"
        } else {
            "Standard payment monitoring"
        };
        factors.push(factor(
            config,
            FactorKind::PaymentHistory,
            points,
            format!(
                "{} of {} accounts delinquent ({:.1}%)",
                report.delinquent_accounts,
                report.total_accounts,
                rate * 100.0
            ),
            recommendation,
        ));
    }

    if let Some(utilization) = report.credit_utilization {
        let (points, recommendation) = if utilization > 0.95 {
            (MAX_POINTS, "Reduce limits until balances are paid down")
        } else if utilization > 0.80 {
            (80.0, "Monitor spending patterns and consider lower limits")
        } else if utilization > 0.50 {
            (50.0, "Encourage utilization management")
        } else if utilization > 0.30 {
            (30.0, "Encourage utilization management")
        } else {
            (10.0, "Utilization within optimal range")
        };
        factors.push(factor(
            config,
            FactorKind::CreditUtilization,
            points,
            format!("credit utilization {:.1}%", utilization * 100.0),
            recommendation,
        ));
    }

    if let Some(inquiries) = report.hard_inquiries_6m {
        let (points, recommendation) = match inquiries {
            8.. => (MAX_POINTS, "Investigate credit-seeking behavior"),
            5..=7 => (75.0, "Investigate credit-seeking behavior"),
            3..=4 => (45.0, "Monitor credit application patterns"),
            _ => (10.0, "No unusual credit-seeking activity"),
        };
        factors.push(factor(
            config,
            FactorKind::CreditInquiries,
            points,
            format!("{inquiries} hard inquiries in the past six months"),
            recommendation,
        ));
    }

    factors
}

/// Insights ordered by severity, then confidence, then category.
pub(crate) fn ranked_insights(intelligence: &MarketIntelligence) -> Vec<MarketInsight> {
    let mut ranked = intelligence.insights.clone();
    ranked.sort_by(insight_order);
    ranked
}

pub(crate) fn insight_order(a: &MarketInsight, b: &MarketInsight) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.category.cmp(&b.category))
}

/// Fraud points scale with elevated fraud trends among the five strongest fraud insights,
/// so a feed with all of them High saturates. Economic points follow the most severe
/// headwind reported.
pub(crate) fn market_factors(
    intelligence: &MarketIntelligence,
    config: &ScoringConfig,
) -> Vec<RiskFactor> {
    let ranked = ranked_insights(intelligence);
    let (fraud_ranked, economic_ranked): (Vec<&MarketInsight>, Vec<&MarketInsight>) = ranked
        .iter()
        .partition(|insight| insight.category.is_fraud_trend());

    let window = &fraud_ranked[..fraud_ranked.len().min(MARKET_WINDOW)];
    let fraud = elevated(window);
    let fraud_points = MARKET_BASELINE
        + (MAX_POINTS - MARKET_BASELINE) * fraud.len() as f64 / MARKET_WINDOW as f64;
    let fraud_description = if fraud.is_empty() {
        "no elevated fraud trends reported".to_string()
    } else {
        format!(
            "{} elevated fraud trend(s): {}",
            fraud.len(),
            titles(&fraud)
        )
    };
    let fraud_recommendation = if fraud.is_empty() {
        "Standard fraud controls"
    } else {
        "Implement enhanced fraud monitoring"
    };

    let worst_economic = economic_ranked.first().map(|insight| insight.severity);
    let economic_points = match worst_economic {
        Some(RiskLevel::High | RiskLevel::Critical) => MAX_POINTS,
        Some(RiskLevel::Medium) => ECONOMIC_MEDIUM,
        Some(RiskLevel::Low) | None => MARKET_BASELINE,
    };
    let (economic_description, economic_recommendation) = match worst_economic {
        Some(severity) if severity >= RiskLevel::Medium => (
            format!(
                "economic headwinds graded {}: {}",
                severity.label(),
                titles(&economic_ranked)
            ),
            "Apply conservative underwriting",
        ),
        _ => (
            "no elevated economic headwinds reported".to_string(),
            "No economic adjustment required",
        ),
    };

    vec![
        factor(
            config,
            FactorKind::MarketFraudTrend,
            fraud_points,
            fraud_description,
            fraud_recommendation,
        ),
        factor(
            config,
            FactorKind::EconomicConditions,
            economic_points,
            economic_description,
            economic_recommendation,
        ),
    ]
}

fn elevated<'a>(window: &[&'a MarketInsight]) -> Vec<&'a MarketInsight> {
    window
        .iter()
        .copied()
        .filter(|insight| insight.severity >= RiskLevel::High)
        .collect()
}

fn titles(insights: &[&MarketInsight]) -> String {
    insights
        .iter()
        .map(|insight| insight.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Total order used to sequence factors independently of payload arrival.
pub(crate) fn factor_order(a: &RiskFactor, b: &RiskFactor) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| a.contribution.total_cmp(&b.contribution))
        .then_with(|| a.description.cmp(&b.description))
}
