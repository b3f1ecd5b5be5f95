//! Evaluation service - runs prompts against test cases, grades the
//! responses, compares variants and derives improvement suggestions

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::evaluation::{
    CaseResult, ComparisonReport, EvaluationConfigError, EvaluationParameters, EvaluationReport,
    EvaluationSettings, ReportLocation, ReportRepository, StoredReport, Suggestion,
    SuggestionSubject, SuggestionThresholds, analyze, compare_reports, validate_prompt,
    validate_temperature,
};
use crate::domain::grader::{Grader, GraderRegistry, GradingContext};
use crate::domain::llm::{CompletionRequest, TextCompletion};
use crate::domain::prompt::PromptTemplate;
use crate::domain::test_case::{GeneratedCases, TestCase, validate_test_case_set};
use crate::domain::DomainError;
use crate::infrastructure::observability::{CaseOutcome, record_case};

/// One evaluation run
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub prompt: String,
    pub use_case: String,
    pub test_cases: Vec<TestCase>,
    /// Validator names in grading order; `None` uses the configured defaults
    pub validators: Option<Vec<String>>,
    pub use_model_grading: Option<bool>,
    pub temperature: Option<f32>,
    pub degradation_reason: Option<String>,
    pub generation_degraded: bool,
}

impl EvaluationRequest {
    pub fn new(
        prompt: impl Into<String>,
        use_case: impl Into<String>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            use_case: use_case.into(),
            test_cases,
            validators: None,
            use_model_grading: None,
            temperature: None,
            degradation_reason: None,
            generation_degraded: false,
        }
    }

    /// Run on a generated set, carrying its degraded flag into the report
    pub fn from_generated(
        prompt: impl Into<String>,
        use_case: impl Into<String>,
        generated: GeneratedCases,
    ) -> Self {
        let mut request = Self::new(prompt, use_case, generated.cases);
        request.generation_degraded = generated.degraded;
        request.degradation_reason = generated.reason;
        request
    }

    pub fn with_validators(mut self, validators: Vec<String>) -> Self {
        self.validators = Some(validators);
        self
    }

    pub fn with_model_grading(mut self, enabled: bool) -> Self {
        self.use_model_grading = Some(enabled);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A named prompt taking part in a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct PromptVariant {
    pub name: String,
    pub prompt: String,
}

impl PromptVariant {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}

/// Parameters shared by every variant of a comparison
#[derive(Debug, Clone)]
pub struct ComparisonOptions {
    pub use_case: String,
    pub validators: Option<Vec<String>>,
    pub use_model_grading: Option<bool>,
    pub temperature: Option<f32>,
    pub generation_degraded: bool,
    pub degradation_reason: Option<String>,
}

impl ComparisonOptions {
    pub fn new(use_case: impl Into<String>) -> Self {
        Self {
            use_case: use_case.into(),
            validators: None,
            use_model_grading: None,
            temperature: None,
            generation_degraded: false,
            degradation_reason: None,
        }
    }

    pub fn with_validators(mut self, validators: Vec<String>) -> Self {
        self.validators = Some(validators);
        self
    }

    pub fn with_model_grading(mut self, enabled: bool) -> Self {
        self.use_model_grading = Some(enabled);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_generation(mut self, degraded: bool, reason: Option<String>) -> Self {
        self.generation_degraded = degraded;
        self.degradation_reason = reason;
        self
    }

    fn request_for(&self, variant: &PromptVariant, test_cases: &[TestCase]) -> EvaluationRequest {
        EvaluationRequest {
            prompt: variant.prompt.clone(),
            use_case: self.use_case.clone(),
            test_cases: test_cases.to_vec(),
            validators: self.validators.clone(),
            use_model_grading: self.use_model_grading,
            temperature: self.temperature,
            degradation_reason: self.degradation_reason.clone(),
            generation_degraded: self.generation_degraded,
        }
    }
}

/// Outcome of `compare_prompts`
#[derive(Debug, Clone)]
pub enum ComparisonRun {
    Complete(ComparisonReport),
    /// Cancelled before every variant finished; finished work is kept
    Cancelled(PartialComparison),
}

impl ComparisonRun {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The ranked comparison, or `Cancelled` when the run was interrupted
    pub fn into_complete(self) -> Result<ComparisonReport, DomainError> {
        match self {
            Self::Complete(report) => Ok(report),
            Self::Cancelled(partial) => Err(DomainError::cancelled(format!(
                "Comparison cancelled with {} of {} variants evaluated",
                partial.completed.len(),
                partial.variant_count()
            ))),
        }
    }
}

/// Variant reports gathered before a comparison was cancelled
#[derive(Debug, Clone, Serialize)]
pub struct PartialComparison {
    /// Variants that ran on every case, keyed by name
    pub completed: BTreeMap<String, EvaluationReport>,
    /// Variant that was running when cancellation arrived, with the cases it finished
    pub interrupted: Option<(String, EvaluationReport)>,
    /// Variants that never started
    pub pending: Vec<String>,
}

impl PartialComparison {
    pub fn variant_count(&self) -> usize {
        self.completed.len() + usize::from(self.interrupted.is_some()) + self.pending.len()
    }

    /// Every report that holds at least one case result
    pub fn reports(&self) -> impl Iterator<Item = (&str, &EvaluationReport)> {
        self.completed
            .iter()
            .map(|(name, report)| (name.as_str(), report))
            .chain(
                self.interrupted
                    .iter()
                    .map(|(name, report)| (name.as_str(), report)),
            )
            .filter(|(_, report)| !report.case_results().is_empty())
    }
}

/// Dependencies for the evaluation service
pub struct EvaluationServiceDeps {
    /// Executes the prompt under evaluation
    pub client: Arc<dyn TextCompletion>,
    pub registry: Arc<GraderRegistry>,
    /// Appended after the code validators when model grading is on
    pub model_grader: Option<Arc<dyn Grader>>,
    pub repository: Option<Arc<dyn ReportRepository>>,
}

/// Fully resolved parameters of one run
struct RunPlan {
    template: PromptTemplate,
    graders: Vec<Arc<dyn Grader>>,
    temperature: f32,
}

/// Evaluation engine
pub struct EvaluationService {
    deps: EvaluationServiceDeps,
    settings: EvaluationSettings,
    thresholds: SuggestionThresholds,
}

impl EvaluationService {
    pub fn new(deps: EvaluationServiceDeps, settings: EvaluationSettings) -> Self {
        Self {
            deps,
            settings,
            thresholds: SuggestionThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: SuggestionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Evaluate one prompt against its test cases.
    ///
    /// Configuration problems fail before any model call. A failed model
    /// call only marks its own case as an execution error. When `cancel`
    /// fires, cases not yet started are skipped and the completed prefix is
    /// returned with `cancelled` set.
    pub async fn run_evaluation(
        &self,
        request: EvaluationRequest,
        cancel: &CancellationToken,
    ) -> Result<EvaluationReport, DomainError> {
        let validators = request
            .validators
            .clone()
            .unwrap_or_else(|| self.settings.validators.clone());
        let model_grading = request
            .use_model_grading
            .unwrap_or(self.settings.model_grading);

        let plan = self.plan(&request, &validators, model_grading)?;
        let started = Instant::now();
        let total = request.test_cases.len();

        info!(
            use_case = %request.use_case,
            cases = total,
            validators = ?validators,
            model_grading,
            temperature = plan.temperature,
            "Starting evaluation"
        );

        let plan_ref = &plan;
        let prompt = request.prompt.as_str();
        let use_case = request.use_case.as_str();

        let mut indexed: Vec<(usize, CaseResult)> = stream::iter(request.test_cases.iter().enumerate())
            .map(|(index, case)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some((index, self.run_case(plan_ref, prompt, use_case, case).await))
            })
            .buffer_unordered(self.settings.concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);

        // Keep only the contiguous completed prefix
        let results: Vec<CaseResult> = indexed
            .into_iter()
            .enumerate()
            .take_while(|(position, (index, _))| position == index)
            .map(|(_, (_, result))| result)
            .collect();

        let cancelled = results.len() < total;
        if cancelled {
            warn!(
                completed = results.len(),
                total, "Evaluation cancelled, returning partial report"
            );
        }

        let parameters = EvaluationParameters {
            temperature: plan.temperature,
            case_count: total,
            validators,
            model_grading,
            max_tokens: Some(self.settings.max_response_tokens),
        };

        let mut report = EvaluationReport::new(
            request.prompt,
            request.use_case,
            parameters,
            request.test_cases,
        )
        .with_results(results)
        .with_cancelled(cancelled)
        .with_duration_ms(started.elapsed().as_millis() as u64);

        if request.generation_degraded {
            report = report.with_generation_degraded(request.degradation_reason);
        }

        let stats = report.aggregate_stats();
        info!(
            report_id = %report.id(),
            avg_score = stats.avg_score,
            pass_rate = stats.pass_rate,
            failed_executions = stats.failed_executions,
            duration_ms = report.duration_ms(),
            "Evaluation finished"
        );

        Ok(report)
    }

    /// Evaluate every variant on the identical test-case sequence and rank
    /// them. If `cancel` fires, variants run so far are returned unranked as
    /// `ComparisonRun::Cancelled`.
    pub async fn compare_prompts(
        &self,
        variants: Vec<PromptVariant>,
        test_cases: Vec<TestCase>,
        options: ComparisonOptions,
        cancel: &CancellationToken,
    ) -> Result<ComparisonRun, DomainError> {
        validate_variants(&variants)?;

        // Fail on any configuration problem before the first variant runs
        let validators = options
            .validators
            .clone()
            .unwrap_or_else(|| self.settings.validators.clone());
        let model_grading = options
            .use_model_grading
            .unwrap_or(self.settings.model_grading);
        for variant in &variants {
            self.plan(
                &options.request_for(variant, &test_cases),
                &validators,
                model_grading,
            )?;
        }

        info!(
            variants = variants.len(),
            cases = test_cases.len(),
            use_case = %options.use_case,
            "Comparing prompt variants"
        );

        let mut reports = BTreeMap::new();
        for (position, variant) in variants.iter().enumerate() {
            let report = self
                .run_evaluation(options.request_for(variant, &test_cases), cancel)
                .await?;

            if report.cancelled() {
                let pending: Vec<String> = variants[position + 1..]
                    .iter()
                    .map(|v| v.name.clone())
                    .collect();
                warn!(
                    variant = %variant.name,
                    completed = reports.len(),
                    pending = pending.len(),
                    "Comparison cancelled, keeping finished variant reports"
                );
                return Ok(ComparisonRun::Cancelled(PartialComparison {
                    completed: reports,
                    interrupted: Some((variant.name.clone(), report)),
                    pending,
                }));
            }

            reports.insert(variant.name.clone(), report);
        }

        let comparison = compare_reports(reports, self.settings.confidence_level)?;
        info!(
            winner = %comparison.winner().name,
            avg_score = comparison.winner().avg_score,
            "Comparison finished"
        );

        Ok(ComparisonRun::Complete(comparison))
    }

    /// Rule-based suggestions for a report or comparison
    pub fn analyze(&self, subject: SuggestionSubject<'_>) -> Vec<Suggestion> {
        analyze(subject, &self.thresholds)
    }

    pub fn suggest_improvements(&self, subject: SuggestionSubject<'_>) -> Vec<String> {
        self.analyze(subject).into_iter().map(|s| s.message).collect()
    }

    pub async fn save_report(
        &self,
        report: impl Into<StoredReport>,
    ) -> Result<ReportLocation, DomainError> {
        let report = report.into();
        let location = self.repository()?.save(&report).await?;
        info!(report_id = %report.id(), location = %location, "Report saved");
        Ok(location)
    }

    pub async fn load_report(&self, location: &ReportLocation) -> Result<StoredReport, DomainError> {
        self.repository()?.load(location).await
    }

    pub async fn list_reports(&self) -> Result<Vec<ReportLocation>, DomainError> {
        self.repository()?.list().await
    }

    fn repository(&self) -> Result<&Arc<dyn ReportRepository>, DomainError> {
        self.deps
            .repository
            .as_ref()
            .ok_or_else(|| DomainError::configuration("No report repository configured"))
    }

    /// Validate a request and resolve its graders
    fn plan(
        &self,
        request: &EvaluationRequest,
        validators: &[String],
        model_grading: bool,
    ) -> Result<RunPlan, DomainError> {
        self.settings.validate()?;
        validate_prompt(&request.prompt)?;

        let temperature = request.temperature.unwrap_or(self.settings.temperature);
        validate_temperature(temperature)?;

        validate_test_case_set(&request.test_cases)?;
        self.settings
            .validate_case_count(request.test_cases.len())?;

        let mut graders = self.deps.registry.resolve(validators)?;
        if model_grading {
            let model_grader = self.deps.model_grader.clone().ok_or_else(|| {
                DomainError::configuration("Model grading requested but no model grader is configured")
            })?;
            graders.push(model_grader);
        }

        Ok(RunPlan {
            template: PromptTemplate::parse(request.prompt.as_str()),
            graders,
            temperature,
        })
    }

    async fn run_case(
        &self,
        plan: &RunPlan,
        prompt: &str,
        use_case: &str,
        case: &TestCase,
    ) -> CaseResult {
        let started = Instant::now();
        let rendered = plan.template.render_for_case(case.input_text(), use_case);

        let completion = CompletionRequest::new(rendered)
            .with_temperature(plan.temperature)
            .with_max_tokens(self.settings.max_response_tokens);

        let response = match self.deps.client.complete(completion).await {
            Ok(response) => response,
            Err(e) => {
                warn!(test_case = %case.id(), error = %e, "Model call failed for test case");
                record_case(CaseOutcome::Error, started.elapsed());
                return CaseResult::execution_error(
                    case.id().clone(),
                    e.to_string(),
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let context = GradingContext::new(prompt, case, use_case);
        let mut verdicts = Vec::with_capacity(plan.graders.len());
        for grader in &plan.graders {
            verdicts.push(grader.evaluate(&response, &context).await);
        }

        let result = CaseResult::graded(
            case.id().clone(),
            response,
            verdicts,
            started.elapsed().as_millis() as u64,
        );

        let outcome = if result.case_passed() {
            CaseOutcome::Passed
        } else {
            CaseOutcome::Failed
        };
        record_case(outcome, started.elapsed());

        debug!(
            test_case = %case.id(),
            score = result.case_score(),
            passed = result.case_passed(),
            latency_ms = result.latency_ms(),
            "Test case evaluated"
        );

        result
    }
}

fn validate_variants(variants: &[PromptVariant]) -> Result<(), EvaluationConfigError> {
    if variants.len() < 2 {
        return Err(EvaluationConfigError::TooFewVariants(variants.len()));
    }

    let mut seen = HashSet::new();
    for variant in variants {
        if variant.name.trim().is_empty() {
            return Err(EvaluationConfigError::EmptyVariantName);
        }
        if !seen.insert(variant.name.as_str()) {
            return Err(EvaluationConfigError::DuplicateVariant(variant.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::evaluation::MockReportRepository;
    use crate::domain::grader::GraderVerdict;
    use crate::domain::llm::ScriptedCompletion;
    use crate::domain::test_case::TestCaseId;
    use crate::infrastructure::grader::{
        GraderSettings, KeywordMode, LlmGrader, ModelGraderSettings, register_builtin_graders,
    };

    fn cases(inputs: &[&str]) -> Vec<TestCase> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| TestCase::new(TestCaseId::sequential(i + 1), *input))
            .collect()
    }

    fn five_cases() -> Vec<TestCase> {
        cases(&["alpha", "bravo", "charlie", "delta", "echo"])
    }

    fn registry(settings: &GraderSettings) -> Arc<GraderRegistry> {
        let registry = Arc::new(GraderRegistry::new());
        register_builtin_graders(&registry, settings).unwrap();
        registry
    }

    fn service(client: ScriptedCompletion, registry: Arc<GraderRegistry>) -> EvaluationService {
        EvaluationService::new(
            EvaluationServiceDeps {
                client: Arc::new(client),
                registry,
                model_grader: None,
                repository: None,
            },
            EvaluationSettings::default(),
        )
    }

    /// Echoes the rendered prompt back as the response
    fn echo() -> ScriptedCompletion {
        ScriptedCompletion::new(|request| Ok(request.prompt.clone()))
    }

    #[tokio::test]
    async fn test_results_follow_case_order() {
        let client = ScriptedCompletion::new(|request| {
            // Later cases answer first
            let delay = if request.prompt.contains("alpha") { 30 } else { 1 };
            std::thread::sleep(std::time::Duration::from_millis(delay));
            Ok(format!("answer for {}", request.prompt))
        });
        let svc = service(client, registry(&GraderSettings::default()));

        let report = svc
            .run_evaluation(
                EvaluationRequest::new("Reply to: {input}", "echo", five_cases())
                    .with_validators(vec!["length_validator".into()])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = report
            .case_results()
            .iter()
            .map(|r| r.test_case_id().as_str())
            .collect();
        assert_eq!(ids, vec!["case-1", "case-2", "case-3", "case-4", "case-5"]);
        assert_eq!(
            report.case_results()[0].generated_response(),
            "answer for Reply to: alpha"
        );
        assert!(!report.cancelled());
        assert_eq!(report.parameters().case_count, 5);
    }

    #[tokio::test]
    async fn test_prompt_without_placeholder_appends_input() {
        let client = echo();
        let svc = service(client.clone(), registry(&GraderSettings::default()));

        svc.run_evaluation(
            EvaluationRequest::new("Classify sentiment", "sentiment", five_cases())
                .with_validators(vec![])
                .with_model_grading(false)
                .with_temperature(0.3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 5);
        assert!(requests.iter().any(|r| r.prompt == "Classify sentiment\n\nalpha"));
        assert!(requests.iter().all(|r| r.temperature == 0.3));
    }

    #[tokio::test]
    async fn test_model_failure_isolated_to_one_case() {
        let client = ScriptedCompletion::new(|request| {
            if request.prompt.contains("charlie") {
                Err(DomainError::timeout("groq", 30_000))
            } else {
                Ok("A well formed and long enough answer".to_string())
            }
        });
        let svc = service(client, registry(&GraderSettings::default()));

        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec!["length_validator".into()])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.case_results().len(), 5);
        let failed = &report.case_results()[2];
        assert!(failed.is_error());
        assert_eq!(failed.case_score(), 0.0);
        assert!(!failed.case_passed());
        assert!(failed.verdicts().is_empty());

        let stats = report.aggregate_stats();
        assert_eq!(stats.failed_executions, 1);
        assert_eq!(stats.avg_score, 8.0);
        assert_eq!(stats.pass_rate, 0.8);
    }

    #[tokio::test]
    async fn test_any_failing_verdict_fails_the_case() {
        let settings = GraderSettings::default()
            .with_keywords(vec!["refund".into()], KeywordMode::RequireAll);
        let client = ScriptedCompletion::always("We will send a replacement instead.");
        let svc = service(client, registry(&settings));

        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "support", five_cases())
                    .with_validators(vec!["length_validator".into(), "keyword_checker".into()])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let first = &report.case_results()[0];
        let names: Vec<&str> = first.verdicts().iter().map(|v| v.grader_name.as_str()).collect();
        assert_eq!(names, vec!["length_validator", "keyword_checker"]);
        assert_eq!(first.case_score(), 5.0);
        assert!(!first.case_passed());
    }

    #[tokio::test]
    async fn test_model_grader_runs_last_and_fallback_is_isolated() {
        let grading_client = ScriptedCompletion::new(|request| {
            if request.prompt.contains("INPUT: bravo") {
                Ok("definitely not json".to_string())
            } else {
                Ok(r#"{"score": 9, "reason": "good", "weaknesses": []}"#.to_string())
            }
        });
        let model_grader: Arc<dyn Grader> = Arc::new(LlmGrader::new(
            Arc::new(grading_client),
            ModelGraderSettings::default(),
            7.0,
        ));

        let svc = EvaluationService::new(
            EvaluationServiceDeps {
                client: Arc::new(ScriptedCompletion::always("A well formed and long enough answer")),
                registry: registry(&GraderSettings::default()),
                model_grader: Some(model_grader),
                repository: None,
            },
            EvaluationSettings::default(),
        );

        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec!["length_validator".into()])
                    .with_model_grading(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        for (index, result) in report.case_results().iter().enumerate() {
            assert_eq!(result.verdicts().len(), 2);
            assert_eq!(result.verdicts()[1].grader_name, "model_grader");
            assert_eq!(result.verdicts()[1].is_fallback, index == 1);
        }
        assert_eq!(report.case_results()[1].verdict("model_grader").unwrap().score, 5.0);
        assert_eq!(report.aggregate_stats().fallback_verdicts, 1);
    }

    #[tokio::test]
    async fn test_configuration_errors_precede_model_calls() {
        let client = echo();
        let svc = service(client.clone(), registry(&GraderSettings::default()));
        let cancel = CancellationToken::new();

        let unknown = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec!["spelling".into()]),
                &cancel,
            )
            .await;
        assert!(matches!(unknown, Err(DomainError::Configuration { ref message }) if message.contains("spelling")));

        let hot = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec![])
                    .with_temperature(1.5),
                &cancel,
            )
            .await;
        assert!(matches!(hot, Err(DomainError::Configuration { .. })));

        let too_few = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", cases(&["a", "b"]))
                    .with_validators(vec![]),
                &cancel,
            )
            .await;
        assert!(matches!(too_few, Err(DomainError::Configuration { .. })));

        let empty_prompt = svc
            .run_evaluation(EvaluationRequest::new("  ", "demo", five_cases()), &cancel)
            .await;
        assert!(matches!(empty_prompt, Err(DomainError::Configuration { .. })));

        let no_model_grader = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec![])
                    .with_model_grading(true),
                &cancel,
            )
            .await;
        assert!(matches!(no_model_grader, Err(DomainError::Configuration { .. })));

        let mut duplicated = five_cases();
        duplicated[4] = TestCase::new(TestCaseId::sequential(1), "again");
        let duplicate_ids = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", duplicated).with_validators(vec![]),
                &cancel,
            )
            .await;
        assert!(matches!(duplicate_ids, Err(DomainError::Configuration { .. })));

        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_keeps_completed_prefix() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let trigger = cancel.clone();
        let counter = calls.clone();
        let client = ScriptedCompletion::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                trigger.cancel();
            }
            Ok("A well formed and long enough answer".to_string())
        });

        let svc = EvaluationService::new(
            EvaluationServiceDeps {
                client: Arc::new(client),
                registry: registry(&GraderSettings::default()),
                model_grader: None,
                repository: None,
            },
            EvaluationSettings::default().with_concurrency(1),
        );

        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec!["length_validator".into()])
                    .with_model_grading(false),
                &cancel,
            )
            .await
            .unwrap();

        assert!(report.cancelled());
        assert_eq!(report.case_results().len(), 2);
        assert_eq!(report.test_cases().len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generation_degraded_flag_carried() {
        let svc = service(echo(), registry(&GraderSettings::default()));
        let generated = GeneratedCases::degraded(five_cases(), "Unparsable generation reply");

        let report = svc
            .run_evaluation(
                EvaluationRequest::from_generated("{input}", "demo", generated)
                    .with_validators(vec![])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(report.generation_degraded());
        assert_eq!(report.degradation_reason(), Some("Unparsable generation reply"));
    }

    #[tokio::test]
    async fn test_compare_prompts_picks_winner() {
        let registry = registry(&GraderSettings::default());
        registry
            .register_fn("mentions_please", |response, _| {
                let polite = response.contains("please");
                GraderVerdict::new(
                    "mentions_please",
                    if polite { 9.0 } else { 4.0 },
                    polite,
                    "politeness",
                )
            })
            .unwrap();

        let svc = service(echo(), registry);
        let report = svc
            .compare_prompts(
                vec![
                    PromptVariant::new("terse", "Answer: {input}"),
                    PromptVariant::new("polite", "Answer politely, please: {input}"),
                ],
                five_cases(),
                ComparisonOptions::new("support")
                    .with_validators(vec!["mentions_please".into()])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .into_complete()
            .unwrap();

        assert_eq!(report.winner().name, "polite");
        assert_eq!(report.variant_reports().len(), 2);
        assert_eq!(
            report.deltas_between("polite", "terse"),
            Some(vec![-5.0; 5])
        );
    }

    #[tokio::test]
    async fn test_compare_prompts_rejects_bad_variants() {
        let client = echo();
        let svc = service(client.clone(), registry(&GraderSettings::default()));
        let cancel = CancellationToken::new();
        let options = ComparisonOptions::new("demo")
            .with_validators(vec![])
            .with_model_grading(false);

        let single = svc
            .compare_prompts(
                vec![PromptVariant::new("a", "{input}")],
                five_cases(),
                options.clone(),
                &cancel,
            )
            .await;
        assert!(matches!(single, Err(DomainError::Configuration { .. })));

        let duplicate = svc
            .compare_prompts(
                vec![
                    PromptVariant::new("a", "{input}"),
                    PromptVariant::new("a", "Say {input}"),
                ],
                five_cases(),
                options.clone(),
                &cancel,
            )
            .await;
        assert!(matches!(duplicate, Err(DomainError::Configuration { ref message }) if message.contains("Duplicate")));

        let empty_prompt = svc
            .compare_prompts(
                vec![PromptVariant::new("a", "{input}"), PromptVariant::new("b", "")],
                five_cases(),
                options,
                &cancel,
            )
            .await;
        assert!(matches!(empty_prompt, Err(DomainError::Configuration { .. })));

        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_comparison_cancelled_up_front_has_no_results() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let svc = service(echo(), registry(&GraderSettings::default()));

        let run = svc
            .compare_prompts(
                vec![PromptVariant::new("a", "{input}"), PromptVariant::new("b", "x {input}")],
                five_cases(),
                ComparisonOptions::new("demo")
                    .with_validators(vec![])
                    .with_model_grading(false),
                &cancel,
            )
            .await
            .unwrap();

        assert!(run.is_cancelled());
        let ComparisonRun::Cancelled(ref partial) = run else {
            panic!("expected a cancelled run");
        };
        assert!(partial.completed.is_empty());
        assert_eq!(partial.pending, vec!["b".to_string()]);
        assert_eq!(partial.reports().count(), 0);
        assert!(matches!(run.into_complete(), Err(DomainError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_comparison_keeps_finished_variants() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // The first variant runs all five cases, the second is cancelled on its second case
        let client = ScriptedCompletion::new(move |request| {
            if counter.fetch_add(1, Ordering::SeqCst) == 6 {
                trigger.cancel();
            }
            Ok(request.prompt.clone())
        });
        let svc = EvaluationService::new(
            EvaluationServiceDeps {
                client: Arc::new(client),
                registry: registry(&GraderSettings::default()),
                model_grader: None,
                repository: None,
            },
            EvaluationSettings::default().with_concurrency(1),
        );

        let run = svc
            .compare_prompts(
                vec![
                    PromptVariant::new("a", "{input}"),
                    PromptVariant::new("b", "b {input}"),
                    PromptVariant::new("c", "c {input}"),
                ],
                five_cases(),
                ComparisonOptions::new("demo")
                    .with_validators(vec![])
                    .with_model_grading(false),
                &cancel,
            )
            .await
            .unwrap();

        let ComparisonRun::Cancelled(partial) = run else {
            panic!("expected a cancelled run");
        };
        assert_eq!(partial.variant_count(), 3);
        assert_eq!(partial.completed.len(), 1);
        assert_eq!(partial.completed["a"].case_results().len(), 5);
        assert!(!partial.completed["a"].cancelled());

        let (name, interrupted) = partial.interrupted.as_ref().unwrap();
        assert_eq!(name, "b");
        assert!(interrupted.cancelled());
        assert_eq!(interrupted.case_results().len(), 2);
        assert_eq!(partial.pending, vec!["c".to_string()]);
        assert_eq!(
            partial.reports().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_save_report_uses_repository() {
        let mut repository = MockReportRepository::new();
        repository
            .expect_save()
            .withf(|report| report.kind() == "evaluation")
            .times(1)
            .returning(|_| Ok(ReportLocation::new("eval_report_1.json")));

        let svc = EvaluationService::new(
            EvaluationServiceDeps {
                client: Arc::new(echo()),
                registry: registry(&GraderSettings::default()),
                model_grader: None,
                repository: Some(Arc::new(repository)),
            },
            EvaluationSettings::default(),
        );

        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec![])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let location = svc.save_report(report).await.unwrap();
        assert_eq!(location.as_str(), "eval_report_1.json");
    }

    #[tokio::test]
    async fn test_save_without_repository_is_configuration_error() {
        let svc = service(echo(), registry(&GraderSettings::default()));
        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec![])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(
            svc.save_report(report).await,
            Err(DomainError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_suggestions_are_deterministic() {
        let svc = service(
            ScriptedCompletion::always("{broken json"),
            registry(&GraderSettings::default()),
        );
        let report = svc
            .run_evaluation(
                EvaluationRequest::new("{input}", "demo", five_cases())
                    .with_validators(vec!["json_validator".into()])
                    .with_model_grading(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let first = svc.suggest_improvements((&report).into());
        let second = svc.suggest_improvements((&report).into());
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
