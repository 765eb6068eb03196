//! File system based rule repository

use async_trait::async_trait;
use fraudlens_core::FraudRule;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{RepositoryError, RepositoryResult, RuleRepository};

/// File system based rule repository
///
/// Every rule lives in its own `<id>.yaml` file below the root directory.
/// Listing walks the tree recursively, so hand-maintained rule libraries may
/// use subdirectories. A rule file without an `id` takes its file stem.
pub struct FileSystemRuleRepository {
    /// Root path of the repository
    root_path: PathBuf,
    /// Serializes writers so create/update checks don't race
    write_lock: Mutex<()>,
}

impl FileSystemRuleRepository {
    /// Create a new file system repository
    ///
    /// # Example
    /// ```no_run
    /// use fraudlens_repository::FileSystemRuleRepository;
    ///
    /// let repo = FileSystemRuleRepository::new("rules").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(root_path: P) -> RepositoryResult<Self> {
        let path = root_path.as_ref();

        if !path.is_dir() {
            return Err(RepositoryError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let abs_path = path
            .absolutize()
            .map_err(|e| RepositoryError::Other(format!("Failed to absolutize path: {}", e)))?
            .to_path_buf();

        Ok(Self {
            root_path: abs_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of the repository
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Path of the file a rule with this ID is written to
    fn rule_path(&self, id: &str) -> RepositoryResult<PathBuf> {
        if id.is_empty()
            || id.contains('/')
            || id.contains('\\')
            || id.starts_with('.')
        {
            return Err(RepositoryError::InvalidPath {
                path: PathBuf::from(id),
            });
        }
        Ok(self.root_path.join(format!("{}.yaml", id)))
    }

    /// Recursively collect all YAML files below `dir`
    async fn collect_yaml_files(&self, dir: &Path, out: &mut Vec<PathBuf>) -> RepositoryResult<()> {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_dir() {
                Box::pin(self.collect_yaml_files(&path, out)).await?;
            } else if is_yaml(&path) {
                out.push(path);
            }
        }

        Ok(())
    }

    /// Parse a rule file, filling in the ID from the file stem if missing
    async fn load_rule_file(&self, path: &Path) -> RepositoryResult<FraudRule> {
        let content = fs::read_to_string(path).await?;
        let mut rule: FraudRule = serde_yaml::from_str(&content)?;

        if rule.id.is_empty() {
            rule.id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
        }

        Ok(rule)
    }

    /// Locate the file holding a rule, either `<id>.yaml` at the root or any
    /// file in the tree whose parsed ID matches
    async fn find_rule_file(&self, id: &str) -> RepositoryResult<Option<PathBuf>> {
        let direct = self.rule_path(id)?;
        if direct.exists() {
            return Ok(Some(direct));
        }

        let mut files = Vec::new();
        self.collect_yaml_files(&self.root_path, &mut files).await?;

        for path in files {
            match self.load_rule_file(&path).await {
                Ok(rule) if rule.id == id => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(None)
    }

    async fn write_rule(&self, path: &Path, rule: &FraudRule) -> RepositoryResult<()> {
        let content = serde_yaml::to_string(rule)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[async_trait]
impl RuleRepository for FileSystemRuleRepository {
    async fn list_rules(&self) -> RepositoryResult<Vec<FraudRule>> {
        let mut files = Vec::new();
        self.collect_yaml_files(&self.root_path, &mut files).await?;
        files.sort();

        let mut rules = Vec::with_capacity(files.len());
        for path in files {
            match self.load_rule_file(&path).await {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Failed to load rule file {}: {}", path.display(), e),
            }
        }

        debug!("Loaded {} rules from {}", rules.len(), self.root_path.display());
        Ok(rules)
    }

    async fn get_rule(&self, id: &str) -> RepositoryResult<Option<FraudRule>> {
        match self.find_rule_file(id).await? {
            Some(path) => Ok(Some(self.load_rule_file(&path).await?)),
            None => Ok(None),
        }
    }

    async fn create_rule(&self, rule: FraudRule) -> RepositoryResult<FraudRule> {
        let _guard = self.write_lock.lock().await;

        if self.find_rule_file(&rule.id).await?.is_some() {
            return Err(RepositoryError::AlreadyExists { id: rule.id });
        }

        let path = self.rule_path(&rule.id)?;
        self.write_rule(&path, &rule).await?;
        debug!("Created rule {} at {}", rule.id, path.display());
        Ok(rule)
    }

    async fn update_rule(&self, rule: FraudRule) -> RepositoryResult<FraudRule> {
        let _guard = self.write_lock.lock().await;

        let path = self
            .find_rule_file(&rule.id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                id: rule.id.clone(),
            })?;

        self.write_rule(&path, &rule).await?;
        Ok(rule)
    }

    async fn delete_rule(&self, id: &str) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;

        let path = self
            .find_rule_file(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() })?;

        fs::remove_file(&path).await?;
        Ok(())
    }
}
