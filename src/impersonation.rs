//! Impersonation evaluator
//!
//! Decides whether one simulated service identity may mint tokens for
//! another, using a fixed capability table. Identity labels are matched by
//! substring: any source label containing the marker of an identity that
//! holds the token-creator role, paired with any target label containing the
//! pipeline marker, is permitted. The matching is intentionally coarse.

use serde::Serialize;

/// Role that allows minting tokens for other service accounts
pub const TOKEN_CREATOR_ROLE: &str = "ServiceAccountTokenCreator";

pub const DENIED_HINT: &str = "Check which service accounts have token creator permissions";

const NEXT_STEP: &str =
    "Use this command with the terraform-pipeline service account to gain project access";

/// Kind of simulated service identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityClass {
    Compute,
    Pipeline,
    Monitoring,
}

impl IdentityClass {
    /// Substring that identifies this class in a label
    pub fn marker(&self) -> &'static str {
        match self {
            IdentityClass::Compute => "compute",
            IdentityClass::Pipeline => "pipeline",
            IdentityClass::Monitoring => "monitoring",
        }
    }
}

/// A row of the capability table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAccount {
    pub email: String,
    pub description: String,
    pub roles: Vec<String>,
    #[serde(skip)]
    pub class: IdentityClass,
}

impl ServiceAccount {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Outcome of an impersonation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permitted {
        reason: String,
        /// Advisory only; never executed
        command: String,
        next_step: String,
    },
    Denied {
        hint: String,
    },
}

impl Decision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Decision::Permitted { .. })
    }
}

/// Wire form of a [`Decision`]
#[derive(Debug, Serialize)]
pub struct DecisionBody {
    pub can_impersonate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<Decision> for DecisionBody {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Permitted {
                reason,
                command,
                next_step,
            } => Self {
                can_impersonate: true,
                reason: Some(reason),
                command: Some(command),
                next_step: Some(next_step),
                hint: None,
            },
            Decision::Denied { hint } => Self {
                can_impersonate: false,
                reason: None,
                command: None,
                next_step: None,
                hint: Some(hint),
            },
        }
    }
}

/// Static capability table, fixed at startup
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    project_id: String,
    accounts: Vec<ServiceAccount>,
}

impl CapabilityTable {
    /// The three service accounts deployed into `project_id`
    pub fn for_project(project_id: &str) -> Self {
        let account = |class, email: String, description: &str, roles: &[&str]| ServiceAccount {
            email,
            description: description.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            class,
        };

        let accounts = vec![
            account(
                IdentityClass::Compute,
                format!("{}-compute@developer.gserviceaccount.com", project_id),
                "Default compute service account",
                &["Editor", TOKEN_CREATOR_ROLE],
            ),
            account(
                IdentityClass::Pipeline,
                format!("terraform-pipeline@{}.iam.gserviceaccount.com", project_id),
                "Terraform deployment pipeline",
                &["TerraformPipelineProjectAdmin"],
            ),
            account(
                IdentityClass::Monitoring,
                format!("monitoring-function@{}.iam.gserviceaccount.com", project_id),
                "Monitoring function service account",
                &["Editor"],
            ),
        ];

        Self {
            project_id: project_id.to_string(),
            accounts,
        }
    }

    pub fn accounts(&self) -> &[ServiceAccount] {
        &self.accounts
    }

    /// Whether `source` may impersonate `target`
    pub fn evaluate(&self, source: &str, target: &str) -> Decision {
        let creator = self
            .accounts
            .iter()
            .filter(|a| a.has_role(TOKEN_CREATOR_ROLE))
            .find(|a| source.contains(a.class.marker()));

        match creator {
            Some(creator) if target.contains(IdentityClass::Pipeline.marker()) => {
                Decision::Permitted {
                    reason: format!(
                        "{} service account has {} role",
                        creator.class.marker(),
                        TOKEN_CREATOR_ROLE
                    ),
                    command: format!(
                        "gcloud projects add-iam-policy-binding {} --member=user:YOUR_EMAIL \
                         --role=roles/viewer --impersonate-service-account={}",
                        self.project_id, source
                    ),
                    next_step: NEXT_STEP.to_string(),
                }
            }
            _ => Decision::Denied {
                hint: DENIED_HINT.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CapabilityTable {
        CapabilityTable::for_project("range-123")
    }

    #[test]
    fn test_compute_to_pipeline_permitted() {
        let decision = table().evaluate("xxx-compute-yyy", "terraform-pipeline-zzz");
        match decision {
            Decision::Permitted {
                reason,
                command,
                next_step,
            } => {
                assert_eq!(reason, "compute service account has ServiceAccountTokenCreator role");
                assert_eq!(
                    command,
                    "gcloud projects add-iam-policy-binding range-123 --member=user:YOUR_EMAIL \
                     --role=roles/viewer --impersonate-service-account=xxx-compute-yyy"
                );
                assert_eq!(next_step, NEXT_STEP);
            }
            other => panic!("expected Permitted, got {:?}", other),
        }
    }

    #[test]
    fn test_monitoring_to_pipeline_denied() {
        let decision = table().evaluate("monitoring-function", "terraform-pipeline-zzz");
        assert_eq!(
            decision,
            Decision::Denied {
                hint: DENIED_HINT.to_string()
            }
        );
    }

    #[test]
    fn test_real_account_emails() {
        let table = table();
        let compute = &table.accounts()[0].email;
        let pipeline = &table.accounts()[1].email;
        let monitoring = &table.accounts()[2].email;

        assert!(table.evaluate(compute, pipeline).is_permitted());
        assert!(!table.evaluate(pipeline, compute).is_permitted());
        assert!(!table.evaluate(compute, monitoring).is_permitted());
        assert!(!table.evaluate("", "").is_permitted());
    }

    #[test]
    fn test_substring_matching_is_coarse() {
        // Unrelated labels that merely contain the markers still pass
        assert!(table()
            .evaluate("not-a-compute-account", "my-pipeline")
            .is_permitted());
        assert!(!table().evaluate("COMPUTE", "PIPELINE").is_permitted());
    }

    #[test]
    fn test_only_compute_holds_token_creator() {
        let creators: Vec<_> = table()
            .accounts()
            .iter()
            .filter(|a| a.has_role(TOKEN_CREATOR_ROLE))
            .map(|a| a.class)
            .collect();
        assert_eq!(creators, vec![IdentityClass::Compute]);
    }

    #[test]
    fn test_decision_body_shape() {
        let permitted =
            serde_json::to_value(DecisionBody::from(table().evaluate("compute", "pipeline")))
                .unwrap();
        assert_eq!(permitted["can_impersonate"], true);
        assert!(permitted.get("hint").is_none());
        assert!(permitted["command"].as_str().unwrap().starts_with("gcloud"));

        let denied =
            serde_json::to_value(DecisionBody::from(table().evaluate("x", "y"))).unwrap();
        assert_eq!(denied["can_impersonate"], false);
        assert_eq!(denied["hint"], DENIED_HINT);
        assert!(denied.get("command").is_none());
    }
}
