//! Builder pattern for FraudDetector

use crate::config::FraudConfig;
use crate::detector::FraudDetector;
use crate::error::Result;
use fraudlens_core::FraudRule;
use fraudlens_repository::{FileSystemRuleRepository, MemoryRuleRepository, RuleRepository};
use fraudlens_runtime::{
    AmountAnalyzer, AssessmentStore, BehavioralProfiler, DeviceAnalyzer, FieldRegistry,
    GeolocationAnalyzer, InMemoryAssessmentStore, InMemoryTransactionHistory, IpReputationProvider,
    ListChecker, ListService, MetricsCollector, RiskScorer, RulesEngine, TransactionHistory,
    VelocityChecker,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for FraudDetector
///
/// Every collaborator is optional; missing ones default to empty in-memory
/// implementations.
///
/// # Example
///
/// ```rust,ignore
/// use fraudlens_sdk::{FraudConfig, FraudDetectorBuilder};
///
/// let detector = FraudDetectorBuilder::new()
///     .with_config(FraudConfig::from_yaml_file("fraudlens.yaml")?)
///     .with_rules_dir("rules")
///     .with_transaction_history(history)
///     .build()
///     .await?;
///
/// let assessment = detector.analyze_transaction(&tx).await;
/// ```
pub struct FraudDetectorBuilder {
    config: FraudConfig,
    rule_repository: Option<Arc<dyn RuleRepository>>,
    rules_dir: Option<PathBuf>,
    rules: Vec<FraudRule>,
    field_registry: Option<Arc<FieldRegistry>>,
    history: Option<Arc<dyn TransactionHistory>>,
    assessments: Option<Arc<dyn AssessmentStore>>,
    lists: Option<Arc<dyn ListChecker>>,
    reputation: Option<Arc<dyn IpReputationProvider>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl FraudDetectorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: FraudConfig::default(),
            rule_repository: None,
            rules_dir: None,
            rules: Vec::new(),
            field_registry: None,
            history: None,
            assessments: None,
            lists: None,
            reputation: None,
            metrics: None,
        }
    }

    /// Set the full configuration
    pub fn with_config(mut self, config: FraudConfig) -> Self {
        self.config = config;
        self
    }

    /// Store rules in a custom repository
    pub fn with_rule_repository(mut self, repository: Arc<dyn RuleRepository>) -> Self {
        self.rule_repository = Some(repository);
        self
    }

    /// Store rules as YAML files under a directory
    pub fn with_rules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rules_dir = Some(dir.into());
        self
    }

    /// Create a rule in the repository when the detector is built
    pub fn add_rule(mut self, rule: FraudRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Create several rules in the repository when the detector is built
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = FraudRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Resolve rule condition fields through a custom registry
    pub fn with_field_registry(mut self, registry: Arc<FieldRegistry>) -> Self {
        self.field_registry = Some(registry);
        self
    }

    pub fn with_transaction_history(mut self, history: Arc<dyn TransactionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_assessment_store(mut self, store: Arc<dyn AssessmentStore>) -> Self {
        self.assessments = Some(store);
        self
    }

    pub fn with_list_checker(mut self, lists: Arc<dyn ListChecker>) -> Self {
        self.lists = Some(lists);
        self
    }

    pub fn with_reputation_provider(mut self, provider: Arc<dyn IpReputationProvider>) -> Self {
        self.reputation = Some(provider);
        self
    }

    /// Share a metrics collector with the caller
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration, wire the components and load the rules
    pub async fn build(self) -> Result<FraudDetector> {
        let config = self.config;
        config.validate()?;

        let repository: Arc<dyn RuleRepository> = match (self.rule_repository, self.rules_dir) {
            (Some(repository), _) => repository,
            (None, Some(dir)) => Arc::new(FileSystemRuleRepository::new(&dir)?),
            (None, None) => Arc::new(MemoryRuleRepository::new()),
        };

        let history: Arc<dyn TransactionHistory> = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryTransactionHistory::new()));
        let assessments: Arc<dyn AssessmentStore> = self
            .assessments
            .unwrap_or_else(|| Arc::new(InMemoryAssessmentStore::new()));
        let lists: Arc<dyn ListChecker> = self
            .lists
            .unwrap_or_else(|| Arc::new(ListService::new()));
        let metrics = self.metrics.unwrap_or_default();

        let mut rules =
            RulesEngine::new(repository, &config.rules).with_assessment_store(assessments.clone());
        if let Some(registry) = self.field_registry {
            rules = rules.with_registry(registry);
        }
        for rule in self.rules {
            rules.create_rule(rule).await?;
        }
        let active = rules.active_rules(None).await?;
        tracing::info!(active_rules = active.len(), "Loaded fraud rules");

        let mut geolocation = GeolocationAnalyzer::new(history.clone(), config.geolocation.clone());
        if let Some(provider) = self.reputation {
            geolocation = geolocation.with_reputation_provider(provider);
        }

        let detector = FraudDetector {
            velocity: VelocityChecker::new(history.clone(), config.velocity.clone()),
            amount: AmountAnalyzer::new(config.scoring.high_risk_currencies.clone()),
            geolocation,
            device: DeviceAnalyzer::new(history.clone(), config.device.clone()),
            behavioral: BehavioralProfiler::new(history.clone(), config.behavioral.clone()),
            scorer: RiskScorer::new(config.scoring.clone())
                .with_rules_weight(config.rules.rules_weight),
            rules,
            history,
            assessments,
            lists,
            metrics,
            config,
        };

        tracing::info!(
            generator_timeout_ms = detector.config.detector.generator_timeout_ms,
            "FraudDetector ready"
        );
        Ok(detector)
    }
}

impl Default for FraudDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use fraudlens_core::Action;

    fn rule(id: &str) -> FraudRule {
        FraudRule::new(id, "High amount", Action::Review, 40.0).add_condition(
            fraudlens_core::FraudCondition::new(
                "amount",
                fraudlens_core::ConditionOperator::GreaterThan,
                5000.0,
            ),
        )
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        let detector = FraudDetectorBuilder::new().build().await.unwrap();
        assert!(detector.rules().list_rules().await.unwrap().is_empty());
        assert_eq!(detector.config(), &FraudConfig::default());
    }

    #[tokio::test]
    async fn test_build_creates_rules() {
        let detector = FraudDetectorBuilder::new()
            .add_rule(rule("high_amount"))
            .build()
            .await
            .unwrap();

        let rules = detector.rules().list_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "high_amount");
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let mut config = FraudConfig::default();
        config.scoring.thresholds.high = 10.0;

        let result = FraudDetectorBuilder::new().with_config(config).build().await;
        assert!(matches!(result, Err(SdkError::RuntimeError(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_rule() {
        let result = FraudDetectorBuilder::new()
            .add_rule(FraudRule::new("empty", "No conditions", Action::Review, 10.0))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_with_rules_dir() {
        let dir = tempfile::tempdir().unwrap();

        let detector = FraudDetectorBuilder::new()
            .with_rules_dir(dir.path())
            .add_rule(rule("persisted"))
            .build()
            .await
            .unwrap();
        assert_eq!(detector.rules().list_rules().await.unwrap().len(), 1);
        assert!(dir.path().join("persisted.yaml").exists());

        // A second detector over the same directory sees the stored rule
        let reloaded = FraudDetectorBuilder::new()
            .with_rules_dir(dir.path())
            .build()
            .await
            .unwrap();
        assert!(reloaded.rules().get_rule("persisted").await.unwrap().is_some());
    }
}
