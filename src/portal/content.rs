//! Page data served by the portal
//!
//! Module pages are rendered elsewhere; the portal serves the data they show.

use serde::Serialize;

/// Deployment artifacts left by the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct Artifacts {
    pub logs: String,
    pub state: String,
    pub backup: String,
}

/// A deployment record on the status page
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub id: String,
    pub timestamp: String,
    pub status: String,
    pub deployed_by: String,
    pub artifacts: Artifacts,
}

/// Deployment history for a project
pub fn deployments(project_id: &str) -> Vec<Deployment> {
    let bucket = format!("gs://modeldata-prod-{}", project_id);
    vec![Deployment {
        id: "deploy-2024-01-15".to_string(),
        timestamp: "2024-01-15 14:23:11".to_string(),
        status: "completed".to_string(),
        deployed_by: format!("terraform-pipeline@{}.iam.gserviceaccount.com", project_id),
        artifacts: Artifacts {
            logs: format!("{}/deploy-logs.txt", bucket),
            state: format!("{}/terraform.tfstate", bucket),
            backup: format!("{}/terraform.tfstate.backup", bucket),
        },
    }]
}

/// Public developer API base URL
pub fn api_endpoint(project_id: &str, region: &str) -> String {
    format!(
        "https://{}-{}.cloudfunctions.net/cloudai-portal/api/v1/",
        region, project_id
    )
}

/// Access level granted by an `X-API-Key` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAccess {
    Public,
    Production,
    Admin,
}

impl KeyAccess {
    pub fn resolve(presented: &str, api_key: &str, admin_key: &str) -> Self {
        if presented == api_key {
            KeyAccess::Production
        } else if presented == admin_key {
            KeyAccess::Admin
        } else {
            KeyAccess::Public
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSets {
    pub dev: Vec<&'static str>,
    pub prod: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub status: &'static str,
    pub models: ModelSets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    pub note: &'static str,
}

impl ModelListing {
    pub fn for_access(access: KeyAccess) -> Self {
        let dev = vec!["sentiment-test", "nlp-experiment", "gpt5-benchmark-leaked"];
        let (prod, admin, note) = match access {
            KeyAccess::Public => (
                vec![],
                None,
                "Public access only. Use API key for production models.",
            ),
            KeyAccess::Production => (
                vec!["sentiment-v1", "translation-v2"],
                None,
                "Production models loaded",
            ),
            KeyAccess::Admin => (
                vec!["sentiment-v1", "translation-v2", "gpt5-production"],
                Some(true),
                "Admin access granted",
            ),
        };
        Self {
            status: "success",
            models: ModelSets { dev, prod },
            admin,
            note,
        }
    }
}

/// Keyword sentiment used by the prediction endpoint
pub fn sentiment(text: &str) -> &'static str {
    let text = text.to_lowercase();
    if text.contains("good") || text.contains("great") {
        "positive"
    } else if text.contains("bad") || text.contains("terrible") {
        "negative"
    } else {
        "neutral"
    }
}

/// First 20 characters of a bearer token
pub fn token_preview(token: &str) -> String {
    if token.chars().count() > 20 {
        format!("{}...", token.chars().take(20).collect::<String>())
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_access() {
        assert_eq!(KeyAccess::resolve("k", "k", "a"), KeyAccess::Production);
        assert_eq!(KeyAccess::resolve("a", "k", "a"), KeyAccess::Admin);
        assert_eq!(KeyAccess::resolve("", "k", "a"), KeyAccess::Public);
    }

    #[test]
    fn test_model_listing() {
        let public = ModelListing::for_access(KeyAccess::Public);
        assert!(public.models.prod.is_empty());
        assert_eq!(public.models.dev.len(), 3);

        let admin = ModelListing::for_access(KeyAccess::Admin);
        assert_eq!(admin.admin, Some(true));
        assert!(admin.models.prod.contains(&"gpt5-production"));
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(sentiment("This is GREAT"), "positive");
        assert_eq!(sentiment("terrible service"), "negative");
        assert_eq!(sentiment("fine"), "neutral");
    }

    #[test]
    fn test_token_preview() {
        assert_eq!(token_preview("short"), "short");
        assert_eq!(
            token_preview("ya29.abcdefghijklmnopqrstuvwxyz"),
            "ya29.abcdefghijklmno..."
        );
    }

    #[test]
    fn test_deployment_points_at_pipeline() {
        let d = &deployments("range-123")[0];
        assert_eq!(d.deployed_by, "terraform-pipeline@range-123.iam.gserviceaccount.com");
        assert_eq!(d.artifacts.state, "gs://modeldata-prod-range-123/terraform.tfstate");
    }
}
