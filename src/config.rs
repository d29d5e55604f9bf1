use anyhow::{Context, Result};
use budget_ledger::DeletePolicy;
use std::path::{Path, PathBuf};

pub(crate) const DB_ENV: &str = "BUDGET_LEDGER_DB";
pub(crate) const DELETE_POLICY_ENV: &str = "BUDGET_LEDGER_DELETE_POLICY";

/// Runtime settings, resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) db_path: PathBuf,
    pub(crate) delete_policy: DeletePolicy,
}

impl Settings {
    pub(crate) fn from_env() -> Result<Self> {
        let db_path = match std::env::var_os(DB_ENV).filter(|v| !v.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };
        Self::resolve(db_path, std::env::var(DELETE_POLICY_ENV).ok().as_deref())
    }

    fn resolve(db_path: PathBuf, delete_policy: Option<&str>) -> Result<Self> {
        let delete_policy = match delete_policy.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => DeletePolicy::parse(raw).with_context(|| {
                format!("{DELETE_POLICY_ENV} must be 'cascade' or 'block', got '{raw}'")
            })?,
            None => DeletePolicy::default(),
        };
        Ok(Self {
            db_path,
            delete_policy,
        })
    }

    /// Create the directory that will hold the database file.
    pub(crate) fn ensure_data_dir(&self) -> Result<()> {
        match self.db_path.parent() {
            Some(dir) if dir != Path::new("") => std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory: {}", dir.display())),
            _ => Ok(()),
        }
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "budget-ledger", "BudgetLedger")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(proj_dirs.data_dir().join("budget-ledger.db"))
}
