//! GitHub API payloads.

use serde::{Deserialize, Serialize};

/// Which listing endpoint serves an owner's repositories.
///
/// Resolved once per chain from the owner's account type and carried with
/// every step, so no page ever re-inspects the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoListing {
    /// `/users/{owner}/repos`
    User,
    /// `/orgs/{owner}/repos`
    Organization,
}

impl RepoListing {
    /// Path of the listing endpoint for `owner`.
    pub fn path(self, owner: &str) -> String {
        match self {
            RepoListing::User => format!("/users/{owner}/repos"),
            RepoListing::Organization => format!("/orgs/{owner}/repos"),
        }
    }
}

/// The subset of `GET /users/{owner}` used to pick a [`RepoListing`].
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAccount {
    pub login: String,
    #[serde(rename = "type")]
    pub account_type: String,
}

impl GitHubAccount {
    pub fn listing(&self) -> RepoListing {
        if self.account_type == "Organization" {
            RepoListing::Organization
        } else {
            RepoListing::User
        }
    }
}

/// A repository as returned by the listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    #[serde(default)]
    pub stargazers_count: u64,
}

/// Repository webhook payload, reduced to what a star change needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryEventPayload {
    pub repository: EventRepository,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventRepository {
    pub name: String,
    pub owner: EventOwner,
    pub stargazers_count: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventOwner {
    pub login: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_accounts_use_org_listing() {
        let account: GitHubAccount =
            serde_json::from_str(r#"{"login":"TanStack","type":"Organization","id":1}"#)
                .expect("parse");
        assert_eq!(account.listing(), RepoListing::Organization);
        assert_eq!(account.listing().path("TanStack"), "/orgs/TanStack/repos");

        let account: GitHubAccount =
            serde_json::from_str(r#"{"login":"tannerlinsley","type":"User"}"#).expect("parse");
        assert_eq!(account.listing(), RepoListing::User);
        assert_eq!(account.listing().path("tannerlinsley"), "/users/tannerlinsley/repos");
    }

    #[test]
    fn repository_event_payload_ignores_extra_fields() {
        let payload: RepositoryEventPayload = serde_json::from_value(serde_json::json!({
            "action": "created",
            "repository": {
                "id": 7,
                "name": "query",
                "owner": {"login": "TanStack", "id": 1},
                "stargazers_count": 41000
            },
            "sender": {"login": "someone"}
        }))
        .expect("parse");
        assert_eq!(payload.repository.owner.login, "TanStack");
        assert_eq!(payload.repository.stargazers_count, 41_000);
    }
}
