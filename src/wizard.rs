// 🧭 Multi-Step Form Wizard
// Three steps, detail fields branching on the user type, progress persisted by key

use crate::persist::{load_json, save_json, KeyValueStore, WIZARD_KEY};
use crate::quote::{FormEndpoint, QuoteResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

// ============================================================================
// CHOICES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Individual,
    Business,
    Enterprise,
}

impl UserType {
    pub fn name(&self) -> &str {
        match self {
            UserType::Individual => "individual",
            UserType::Business => "business",
            UserType::Enterprise => "enterprise",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            UserType::Individual => "Individual",
            UserType::Business => "Business",
            UserType::Enterprise => "Enterprise",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Asia,
    Europe,
    Americas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Basic,
    Premium,
    Enterprise,
}

/// Feature that unlocks the analytics add-on recommendation
pub const ADVANCED_ANALYTICS: &str = "Advanced analytics";

const BASE_FEATURES: [&str; 3] = ["Basic analytics", "Report generation", "Data export"];

/// Features offered in step 3 for a user type
pub fn feature_options(user_type: UserType) -> Vec<&'static str> {
    let extra: &[&str] = match user_type {
        UserType::Enterprise => &[
            ADVANCED_ANALYTICS,
            "API integration",
            "Custom dashboards",
            "Multi-user management",
        ],
        UserType::Business => &[ADVANCED_ANALYTICS, "Team collaboration", "Data sync"],
        UserType::Individual => &["Personal dashboard", "Mobile app"],
    };
    BASE_FEATURES.iter().chain(extra.iter()).copied().collect()
}

/// Additional services offered in step 3 for a user type
pub fn additional_services(user_type: UserType) -> &'static [&'static str] {
    match user_type {
        UserType::Enterprise => &[
            "Dedicated account manager",
            "24/7 technical support",
            "On-site training",
            "Custom development",
        ],
        UserType::Business => &[
            "Priority technical support",
            "Online training",
            "Regular health checks",
        ],
        UserType::Individual => &[
            "Online consultation",
            "Learning resources",
            "Community support",
        ],
    }
}

/// Support level choice is offered to enterprises and high-priority businesses
pub fn shows_support_level(step1: &Step1) -> bool {
    match step1.user_type {
        UserType::Enterprise => true,
        UserType::Business => step1.priority == Priority::High,
        UserType::Individual => false,
    }
}

// ============================================================================
// STEP DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Step1 {
    pub user_type: UserType,
    pub region: Region,

    #[validate(length(min = 1, message = "choose a category"))]
    pub category: String,

    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[validate(length(min = 1, message = "enter a first name"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "enter a last name"))]
    pub last_name: String,

    #[validate(length(min = 1, message = "choose a date of birth"))]
    pub date_of_birth: String,

    #[validate(range(min = 0.0, message = "income cannot be negative"))]
    pub income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    #[validate(length(min = 1, message = "enter a company name"))]
    pub company_name: String,

    #[validate(length(min = 1, message = "choose an industry"))]
    pub industry: String,

    #[validate(range(min = 1, message = "employees must be greater than 0"))]
    pub employees: u32,

    #[validate(range(min = 0.0, message = "revenue cannot be negative"))]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseInfo {
    #[validate(length(min = 1, message = "enter an organization name"))]
    pub organization_name: String,

    #[validate(length(min = 1, message = "choose at least one department"))]
    pub departments: Vec<String>,

    #[validate(range(min = 0.0, message = "budget cannot be negative"))]
    pub budget: f64,

    #[validate(length(min = 1, message = "choose a timeline"))]
    pub timeline: String,
}

/// AccountDetails - the step 2 fields that depend on the user type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountDetails {
    #[serde(rename = "personalInfo")]
    Individual(PersonalInfo),
    #[serde(rename = "businessInfo")]
    Business(BusinessInfo),
    #[serde(rename = "enterpriseInfo")]
    Enterprise(EnterpriseInfo),
}

impl AccountDetails {
    pub fn user_type(&self) -> UserType {
        match self {
            AccountDetails::Individual(_) => UserType::Individual,
            AccountDetails::Business(_) => UserType::Business,
            AccountDetails::Enterprise(_) => UserType::Enterprise,
        }
    }

    fn validate_fields(&self) -> Result<(), ValidationErrors> {
        match self {
            AccountDetails::Individual(info) => info.validate(),
            AccountDetails::Business(info) => info.validate(),
            AccountDetails::Enterprise(info) => info.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Step2 {
    pub details: AccountDetails,

    #[validate(email(message = "enter a valid email address"))]
    pub contact_email: String,

    #[validate(length(min = 1, message = "enter a phone number"))]
    pub phone: String,

    #[validate(length(min = 1, message = "choose at least one preference"))]
    pub preferences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Step3 {
    #[validate(length(min = 1, message = "choose at least one feature"))]
    pub features: Vec<String>,

    #[serde(default)]
    pub custom_requirements: String,

    pub agreed_to_terms: bool,
    pub marketing_consent: bool,

    #[serde(default)]
    pub additional_services: Vec<String>,

    #[serde(default)]
    pub support_level: Option<SupportLevel>,
}

/// FormDraft - whatever has been entered so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    pub step1: Option<Step1>,
    pub step2: Option<Step2>,
    pub step3: Option<Step3>,
}

/// FormSubmission - a draft with every step present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub step1: Step1,
    pub step2: Step2,
    pub step3: Step3,
}

impl FormDraft {
    pub fn complete(&self) -> Option<FormSubmission> {
        Some(FormSubmission {
            step1: self.step1.clone()?,
            step2: self.step2.clone()?,
            step3: self.step3.clone()?,
        })
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl FieldError {
    fn new(context: &str, field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
            context: context.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

/// StepErrors - every problem found in one or more steps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepErrors(pub Vec<FieldError>);

impl StepErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    fn absorb(&mut self, context: &str, result: Result<(), ValidationErrors>) {
        if let Err(errors) = result {
            let mut found: Vec<FieldError> = errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |err| {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| err.code.to_string());
                        FieldError::new(context, &field.to_string(), message)
                    })
                })
                .collect();
            // field_errors() is a HashMap; keep reports stable
            found.sort_by(|a, b| a.field.cmp(&b.field));
            self.0.extend(found);
        }
    }

    fn into_result(self) -> Result<(), StepErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for StepErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for StepErrors {}

pub fn validate_step1(step1: &Step1) -> Result<(), StepErrors> {
    let mut errors = StepErrors::default();
    errors.absorb("step1", step1.validate());
    errors.into_result()
}

/// Step 2 fields, plus: the detail variant must match step 1's user type
pub fn validate_step2(step2: &Step2, step1: Option<&Step1>) -> Result<(), StepErrors> {
    let mut errors = StepErrors::default();
    errors.absorb("step2", step2.validate());
    errors.absorb("step2", step2.details.validate_fields());

    match step1 {
        Some(step1) if step1.user_type != step2.details.user_type() => {
            errors.push(FieldError::new(
                "step2",
                "details",
                format!(
                    "{} details entered for a {} user",
                    step2.details.user_type().name(),
                    step1.user_type.name()
                ),
            ));
        }
        Some(_) => {}
        None => errors.push(FieldError::new("step2", "step1", "complete step 1 first")),
    }

    errors.into_result()
}

/// Step 3 fields, plus terms acceptance and the choices step 1 allows
pub fn validate_step3(step3: &Step3, step1: Option<&Step1>) -> Result<(), StepErrors> {
    let mut errors = StepErrors::default();
    errors.absorb("step3", step3.validate());

    if !step3.agreed_to_terms {
        errors.push(FieldError::new("step3", "agreed_to_terms", "accept the terms of service"));
    }

    let Some(step1) = step1 else {
        errors.push(FieldError::new("step3", "step1", "complete step 1 first"));
        return errors.into_result();
    };

    let offered = feature_options(step1.user_type);
    for feature in &step3.features {
        if !offered.contains(&feature.as_str()) {
            errors.push(FieldError::new(
                "step3",
                "features",
                format!("{} is not offered to {} users", feature, step1.user_type.name()),
            ));
        }
    }

    let services = additional_services(step1.user_type);
    for service in &step3.additional_services {
        if !services.contains(&service.as_str()) {
            errors.push(FieldError::new(
                "step3",
                "additional_services",
                format!("{} is not offered to {} users", service, step1.user_type.name()),
            ));
        }
    }

    if step3.support_level.is_some() && !shows_support_level(step1) {
        errors.push(FieldError::new(
            "step3",
            "support_level",
            "support levels are offered to enterprises and high-priority businesses only",
        ));
    }

    errors.into_result()
}

pub fn validate_submission(submission: &FormSubmission) -> Result<(), StepErrors> {
    let mut errors = StepErrors::default();
    for result in [
        validate_step1(&submission.step1),
        validate_step2(&submission.step2, Some(&submission.step1)),
        validate_step3(&submission.step3, Some(&submission.step1)),
    ] {
        if let Err(StepErrors(found)) = result {
            errors.0.extend(found);
        }
    }
    errors.into_result()
}

// ============================================================================
// WIZARD STORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStep {
    pub id: usize,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub is_valid: bool,
}

pub fn default_steps() -> Vec<FormStep> {
    [
        ("Basic information", "Choose your user type and basic needs"),
        ("Details", "Fill in personal or company details"),
        ("Advanced options", "Choose features and services"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (title, description))| FormStep {
        id: i + 1,
        title: title.to_string(),
        description: description.to_string(),
        is_completed: false,
        is_valid: false,
    })
    .collect()
}

/// What survives a restart: position, step flags and the draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WizardSnapshot {
    current_step: usize,
    steps: Vec<FormStep>,
    form_data: FormDraft,
}

/// WizardStore - state of one form session
#[derive(Debug, Clone)]
pub struct WizardStore {
    current_step: usize,
    steps: Vec<FormStep>,
    draft: FormDraft,
    is_submitting: bool,
    submit_error: Option<String>,
    last_result: Option<QuoteResult>,
}

impl Default for WizardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardStore {
    pub fn new() -> Self {
        WizardStore {
            current_step: 1,
            steps: default_steps(),
            draft: FormDraft::default(),
            is_submitting: false,
            submit_error: None,
            last_result: None,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn steps(&self) -> &[FormStep] {
        &self.steps
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn last_result(&self) -> Option<&QuoteResult> {
        self.last_result.as_ref()
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn set_current_step(&mut self, step: usize) {
        if (1..=self.steps.len()).contains(&step) {
            self.current_step = step;
        }
    }

    /// Advance when the current step is valid; returns whether it moved
    pub fn next_step(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.current_step += 1;
        true
    }

    pub fn prev_step(&mut self) -> bool {
        if !self.can_go_prev() {
            return false;
        }
        self.current_step -= 1;
        true
    }

    pub fn can_go_next(&self) -> bool {
        self.step(self.current_step).map_or(false, |s| s.is_valid)
            && self.current_step < self.steps.len()
    }

    pub fn can_go_prev(&self) -> bool {
        self.current_step > 1
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step == self.steps.len()
    }

    /// Completed steps as a percentage
    pub fn progress(&self) -> f64 {
        let completed = self.steps.iter().filter(|s| s.is_completed).count();
        completed as f64 / self.steps.len() as f64 * 100.0
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    /// Store step 1; later steps are re-checked since they depend on it
    pub fn update_step1(&mut self, data: Step1) -> Result<(), StepErrors> {
        let result = validate_step1(&data);
        self.draft.step1 = Some(data);
        self.mark(1, result.is_ok());
        self.revalidate_dependents();
        result
    }

    pub fn update_step2(&mut self, data: Step2) -> Result<(), StepErrors> {
        let result = validate_step2(&data, self.draft.step1.as_ref());
        self.draft.step2 = Some(data);
        self.mark(2, result.is_ok());
        result
    }

    pub fn update_step3(&mut self, data: Step3) -> Result<(), StepErrors> {
        let result = validate_step3(&data, self.draft.step1.as_ref());
        self.draft.step3 = Some(data);
        self.mark(3, result.is_ok());
        result
    }

    pub fn set_step_valid(&mut self, step_id: usize, is_valid: bool) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) {
            step.is_valid = is_valid;
        }
    }

    pub fn set_step_completed(&mut self, step_id: usize, is_completed: bool) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) {
            step.is_completed = is_completed;
        }
    }

    pub fn reset(&mut self) {
        *self = WizardStore::new();
    }

    /// Send the complete form; on failure the error is kept in `submit_error`
    pub fn submit(&mut self, endpoint: &dyn FormEndpoint) -> Result<QuoteResult, String> {
        self.is_submitting = true;
        self.submit_error = None;

        let outcome = match self.draft.complete() {
            Some(submission) => endpoint
                .submit(&submission)
                .map(|ack| ack.data)
                .map_err(|e| e.to_string()),
            None => Err("form data is incomplete".to_string()),
        };

        self.is_submitting = false;
        match &outcome {
            Ok(result) => {
                info!(
                    user_type = result.user_type.name(),
                    cost = result.estimated_cost,
                    "form submitted"
                );
                self.last_result = Some(result.clone());
            }
            Err(message) => {
                warn!(reason = %message, "form submission failed");
                self.submit_error = Some(message.clone());
            }
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        let snapshot = WizardSnapshot {
            current_step: self.current_step,
            steps: self.steps.clone(),
            form_data: self.draft.clone(),
        };
        save_json(kv, WIZARD_KEY, &snapshot)
    }

    /// Restore a saved session; a fresh store when nothing was saved
    pub fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        let mut store = WizardStore::new();
        if let Some(snapshot) = load_json::<WizardSnapshot>(kv, WIZARD_KEY)? {
            let ids: Vec<usize> = snapshot.steps.iter().map(|s| s.id).collect();
            let expected: Vec<usize> = store.steps.iter().map(|s| s.id).collect();
            if ids == expected {
                store.steps = snapshot.steps;
            } else {
                warn!(?ids, "saved wizard steps do not match the form, keeping defaults");
            }
            store.draft = snapshot.form_data;
            store.set_current_step(snapshot.current_step);
        }
        Ok(store)
    }

    fn step(&self, id: usize) -> Option<&FormStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    fn mark(&mut self, step_id: usize, valid: bool) {
        self.set_step_valid(step_id, valid);
        self.set_step_completed(step_id, valid);
    }

    fn revalidate_dependents(&mut self) {
        let step1 = self.draft.step1.as_ref();
        let step2_ok = self
            .draft
            .step2
            .as_ref()
            .map(|s| validate_step2(s, step1).is_ok());
        let step3_ok = self
            .draft
            .step3
            .as_ref()
            .map(|s| validate_step3(s, step1).is_ok());

        if let Some(ok) = step2_ok {
            self.mark(2, ok);
        }
        if let Some(ok) = step3_ok {
            self.mark(3, ok);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use crate::quote::{LocalEndpoint, SubmitAck, SubmitError};

    pub(crate) fn business_step1() -> Step1 {
        Step1 {
            user_type: UserType::Business,
            region: Region::Europe,
            category: "Retail".to_string(),
            priority: Priority::High,
        }
    }

    pub(crate) fn business_step2() -> Step2 {
        Step2 {
            details: AccountDetails::Business(BusinessInfo {
                company_name: "Acme".to_string(),
                industry: "Manufacturing".to_string(),
                employees: 40,
                revenue: 1_200_000.0,
            }),
            contact_email: "ops@acme.test".to_string(),
            phone: "0912345678".to_string(),
            preferences: vec!["email".to_string()],
        }
    }

    pub(crate) fn business_step3() -> Step3 {
        Step3 {
            features: vec![ADVANCED_ANALYTICS.to_string(), "Data export".to_string()],
            custom_requirements: String::new(),
            agreed_to_terms: true,
            marketing_consent: false,
            additional_services: vec!["Online training".to_string()],
            support_level: Some(SupportLevel::Premium),
        }
    }

    struct RejectingEndpoint;

    impl FormEndpoint for RejectingEndpoint {
        fn submit(&self, _submission: &FormSubmission) -> Result<SubmitAck, SubmitError> {
            Err(SubmitError::new(500, "server error"))
        }
    }

    #[test]
    fn test_feature_options_by_user_type() {
        assert_eq!(feature_options(UserType::Enterprise).len(), 7);
        assert!(feature_options(UserType::Business).contains(&"Team collaboration"));
        assert!(!feature_options(UserType::Individual).contains(&ADVANCED_ANALYTICS));
    }

    #[test]
    fn test_support_level_visibility() {
        let mut step1 = business_step1();
        assert!(shows_support_level(&step1));
        step1.priority = Priority::Medium;
        assert!(!shows_support_level(&step1));
        step1.user_type = UserType::Enterprise;
        assert!(shows_support_level(&step1));
    }

    #[test]
    fn test_step1_requires_category() {
        let mut step1 = business_step1();
        step1.category.clear();

        let errors = validate_step1(&step1).unwrap_err();
        assert!(errors.has_field("category"));
        assert!(errors.to_string().contains("[step1] category: choose a category"));
    }

    #[test]
    fn test_step2_field_rules_per_variant() {
        let mut step2 = business_step2();
        step2.contact_email = "not-an-email".to_string();
        if let AccountDetails::Business(info) = &mut step2.details {
            info.employees = 0;
        }

        let errors = validate_step2(&step2, Some(&business_step1())).unwrap_err();
        assert!(errors.has_field("contact_email"));
        assert!(errors.has_field("employees"));
    }

    #[test]
    fn test_step2_variant_must_match_user_type() {
        let mut step1 = business_step1();
        step1.user_type = UserType::Individual;

        let errors = validate_step2(&business_step2(), Some(&step1)).unwrap_err();
        assert!(errors.has_field("details"));
    }

    #[test]
    fn test_step3_cross_rules() {
        let mut step1 = business_step1();
        step1.priority = Priority::Low;
        let mut step3 = business_step3();
        step3.agreed_to_terms = false;
        step3.additional_services.push("On-site training".to_string());

        let errors = validate_step3(&step3, Some(&step1)).unwrap_err();
        assert!(errors.has_field("agreed_to_terms"));
        assert!(errors.has_field("support_level"));
        assert!(errors.has_field("additional_services"));
        assert!(!errors.has_field("features"));
    }

    #[test]
    fn test_navigation_requires_valid_step() {
        let mut wizard = WizardStore::new();
        assert!(!wizard.can_go_prev());
        assert!(!wizard.next_step());

        wizard.update_step1(business_step1()).unwrap();
        assert!(wizard.next_step());
        assert_eq!(wizard.current_step(), 2);

        wizard.update_step2(business_step2()).unwrap();
        assert!(wizard.next_step());
        assert!(wizard.is_last_step());
        assert!(!wizard.can_go_next());

        assert!(wizard.prev_step());
        assert_eq!(wizard.current_step(), 2);
    }

    #[test]
    fn test_set_current_step_bounds() {
        let mut wizard = WizardStore::new();
        wizard.set_current_step(3);
        assert_eq!(wizard.current_step(), 3);
        wizard.set_current_step(0);
        wizard.set_current_step(4);
        assert_eq!(wizard.current_step(), 3);
    }

    #[test]
    fn test_changing_user_type_invalidates_details() {
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();
        wizard.update_step2(business_step2()).unwrap();
        assert!(wizard.steps()[1].is_valid);

        let mut step1 = business_step1();
        step1.user_type = UserType::Enterprise;
        wizard.update_step1(step1).unwrap();
        assert!(!wizard.steps()[1].is_valid);
        assert!(!wizard.steps()[1].is_completed);
    }

    #[test]
    fn test_progress() {
        let mut wizard = WizardStore::new();
        assert_eq!(wizard.progress(), 0.0);
        wizard.update_step1(business_step1()).unwrap();
        wizard.update_step2(business_step2()).unwrap();
        assert!((wizard.progress() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_submit_incomplete_form() {
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();

        let result = wizard.submit(&LocalEndpoint);
        assert_eq!(result, Err("form data is incomplete".to_string()));
        assert_eq!(wizard.submit_error(), Some("form data is incomplete"));
        assert!(!wizard.is_submitting());
    }

    #[test]
    fn test_submit_complete_form() {
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();
        wizard.update_step2(business_step2()).unwrap();
        wizard.update_step3(business_step3()).unwrap();

        let result = wizard.submit(&LocalEndpoint).unwrap();
        assert_eq!(result.user_type, UserType::Business);
        assert_eq!(result.estimated_cost, 448.5);
        assert_eq!(wizard.last_result(), Some(&result));
        assert_eq!(wizard.submit_error(), None);
    }

    #[test]
    fn test_submit_endpoint_failure_is_kept() {
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();
        wizard.update_step2(business_step2()).unwrap();
        wizard.update_step3(business_step3()).unwrap();

        assert!(wizard.submit(&RejectingEndpoint).is_err());
        assert_eq!(wizard.submit_error(), Some("server error"));
    }

    #[test]
    fn test_save_and_load_progress() {
        let kv = MemoryStore::new();
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();
        wizard.next_step();
        wizard.save(&kv).unwrap();

        let restored = WizardStore::load(&kv).unwrap();
        assert_eq!(restored.current_step(), 2);
        assert_eq!(restored.draft().step1, Some(business_step1()));
        assert!(restored.steps()[0].is_completed);

        let fresh = WizardStore::load(&MemoryStore::new()).unwrap();
        assert_eq!(fresh.current_step(), 1);
    }

    fn overwrite_saved_steps(kv: &MemoryStore, steps: serde_json::Value) {
        let raw = kv.get(WIZARD_KEY).unwrap().unwrap();
        let mut snapshot: serde_json::Value = serde_json::from_str(&raw).unwrap();
        snapshot["steps"] = steps;
        snapshot["currentStep"] = serde_json::json!(4);
        kv.set(WIZARD_KEY, &snapshot.to_string()).unwrap();
    }

    #[test]
    fn test_load_ignores_empty_saved_steps() {
        let kv = MemoryStore::new();
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();
        wizard.save(&kv).unwrap();
        overwrite_saved_steps(&kv, serde_json::json!([]));

        let restored = WizardStore::load(&kv).unwrap();
        assert_eq!(restored.steps().len(), 3);
        assert_eq!(restored.current_step(), 1);
        assert_eq!(restored.progress(), 0.0);
        assert_eq!(restored.draft().step1, Some(business_step1()));
    }

    #[test]
    fn test_load_ignores_extra_saved_steps() {
        let kv = MemoryStore::new();
        WizardStore::new().save(&kv).unwrap();

        let mut steps = serde_json::to_value(default_steps()).unwrap();
        let mut extra = steps[2].clone();
        extra["id"] = serde_json::json!(4);
        steps.as_array_mut().unwrap().push(extra);
        overwrite_saved_steps(&kv, steps);

        let mut restored = WizardStore::load(&kv).unwrap();
        assert_eq!(restored.steps().len(), 3);
        assert_eq!(restored.current_step(), 1);

        restored.set_current_step(4);
        assert_eq!(restored.current_step(), 1);
    }

    #[test]
    fn test_reset() {
        let mut wizard = WizardStore::new();
        wizard.update_step1(business_step1()).unwrap();
        wizard.next_step();
        wizard.reset();

        assert_eq!(wizard.current_step(), 1);
        assert_eq!(wizard.draft(), &FormDraft::default());
    }

    #[test]
    fn test_details_json_shape() {
        let json = serde_json::to_value(business_step2()).unwrap();
        assert_eq!(json["details"]["businessInfo"]["companyName"], "Acme");
        assert_eq!(json["contactEmail"], "ops@acme.test");
    }
}
