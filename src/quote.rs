// 💰 Quote Evaluation
// Turns a submitted form into product recommendations, a cost estimate and a timeline

use crate::wizard::{
    validate_submission, FormDraft, FormSubmission, SupportLevel, UserType, ADVANCED_ANALYTICS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const BASE_PRODUCT: &str = "Base plan";
pub const ENTERPRISE_PRODUCT: &str = "Enterprise plan";
pub const API_PRODUCT: &str = "API access";
pub const BUSINESS_PRODUCT: &str = "Business package";
pub const ANALYTICS_ADDON: &str = "Analytics add-on";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResult {
    pub id: i64,
    pub user_type: UserType,
    pub recommended_products: Vec<String>,
    pub estimated_cost: f64,
    pub timeline: String,
}

/// SubmitAck - body of a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub success: bool,
    pub message: String,
    pub data: QuoteResult,
}

/// SubmitError - a rejected submission, with the HTTP status it maps to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct SubmitError {
    pub status: u16,
    pub error: String,
}

impl SubmitError {
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        SubmitError {
            status,
            error: error.into(),
        }
    }
}

/// FormEndpoint - where the wizard sends a finished form
pub trait FormEndpoint {
    fn submit(&self, submission: &FormSubmission) -> Result<SubmitAck, SubmitError>;
}

/// In-process endpoint, same rules as the HTTP route
pub struct LocalEndpoint;

impl FormEndpoint for LocalEndpoint {
    fn submit(&self, submission: &FormSubmission) -> Result<SubmitAck, SubmitError> {
        acknowledge(submission)
    }
}

pub fn recommend_products(submission: &FormSubmission) -> Vec<String> {
    let mut products = vec![BASE_PRODUCT.to_string()];

    match submission.step1.user_type {
        UserType::Enterprise => {
            products.push(ENTERPRISE_PRODUCT.to_string());
            products.push(API_PRODUCT.to_string());
        }
        UserType::Business => products.push(BUSINESS_PRODUCT.to_string()),
        UserType::Individual => {}
    }

    if submission.step3.features.iter().any(|f| f == ADVANCED_ANALYTICS) {
        products.push(ANALYTICS_ADDON.to_string());
    }

    products
}

pub fn estimate_cost(submission: &FormSubmission) -> f64 {
    let base = match submission.step1.user_type {
        UserType::Enterprise => 999.0,
        UserType::Business => 299.0,
        UserType::Individual => 99.0,
    };

    let multiplier = match submission.step3.support_level {
        Some(SupportLevel::Premium) => 1.5,
        Some(SupportLevel::Enterprise) => 2.0,
        Some(SupportLevel::Basic) | None => 1.0,
    };

    base * multiplier
}

pub fn timeline(submission: &FormSubmission) -> &'static str {
    match submission.step3.support_level {
        Some(SupportLevel::Enterprise) => "1-2 weeks",
        _ => "2-4 weeks",
    }
}

pub fn evaluate(submission: &FormSubmission) -> QuoteResult {
    QuoteResult {
        id: chrono::Utc::now().timestamp_millis(),
        user_type: submission.step1.user_type,
        recommended_products: recommend_products(submission),
        estimated_cost: estimate_cost(submission),
        timeline: timeline(submission).to_string(),
    }
}

/// Validate a complete form and answer with its quote
pub fn acknowledge(submission: &FormSubmission) -> Result<SubmitAck, SubmitError> {
    validate_submission(submission).map_err(|e| SubmitError::new(400, e.to_string()))?;

    let data = evaluate(submission);
    info!(
        user_type = data.user_type.name(),
        products = data.recommended_products.len(),
        "quote evaluated"
    );

    Ok(SubmitAck {
        success: true,
        message: "query succeeded".to_string(),
        data,
    })
}

/// Server-side entry point: a draft missing any step is rejected
pub fn handle_submission(draft: &FormDraft) -> Result<SubmitAck, SubmitError> {
    let submission = draft
        .complete()
        .ok_or_else(|| SubmitError::new(400, "form data is incomplete"))?;
    acknowledge(&submission)
}
