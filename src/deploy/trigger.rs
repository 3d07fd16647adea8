use serde::{Deserialize, Serialize};

/// Default deployer label when the trigger does not name one
pub const DEFAULT_DEPLOYER: &str = "External";

/// A request to deploy, as handed over by whatever received the push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTrigger {
    pub repository_url: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    pub deployer: String,
}

impl DeploymentTrigger {
    pub fn new(repository_url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            branch: branch.into(),
            commit_id: None,
            deployer: DEFAULT_DEPLOYER.to_string(),
        }
    }

    pub fn with_commit(mut self, commit_id: impl Into<String>) -> Self {
        self.commit_id = Some(commit_id.into());
        self
    }

    pub fn with_deployer(mut self, deployer: impl Into<String>) -> Self {
        self.deployer = deployer.into();
        self
    }
}
