use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use warden_application::PolicyMatcher;
use warden_core::AppResult;
use warden_domain::{PermissionGrant, PolicyTerm, RoleName};

type RuleSet = BTreeSet<(PolicyTerm, PolicyTerm)>;

/// Policy matcher holding grants indexed by role name.
///
/// Resources and actions match exactly or through the full `*` wildcard.
#[derive(Debug, Default)]
pub struct InMemoryPolicyMatcher {
    rules: RwLock<HashMap<RoleName, RuleSet>>,
}

impl InMemoryPolicyMatcher {
    /// Creates an empty matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyMatcher for InMemoryPolicyMatcher {
    async fn has_permission(
        &self,
        roles: &[RoleName],
        resource: &str,
        action: &str,
    ) -> AppResult<bool> {
        let rules = self.rules.read().await;

        Ok(roles
            .iter()
            .filter_map(|role| rules.get(role))
            .flatten()
            .any(|(resource_term, action_term)| {
                resource_term.matches(resource) && action_term.matches(action)
            }))
    }

    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        self.rules
            .write()
            .await
            .entry(grant.role().clone())
            .or_default()
            .insert((grant.resource().clone(), grant.action().clone()));

        Ok(())
    }

    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        let mut rules = self.rules.write().await;
        if let Some(role_rules) = rules.get_mut(grant.role()) {
            role_rules.remove(&(grant.resource().clone(), grant.action().clone()));
            if role_rules.is_empty() {
                rules.remove(grant.role());
            }
        }

        Ok(())
    }

    async fn replace_grants(&self, grants: Vec<PermissionGrant>) -> AppResult<()> {
        let mut next: HashMap<RoleName, RuleSet> = HashMap::new();
        for grant in grants {
            next.entry(grant.role().clone())
                .or_default()
                .insert((grant.resource().clone(), grant.action().clone()));
        }

        debug!(roles = next.len(), "policy matcher rules replaced");
        *self.rules.write().await = next;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use warden_application::PolicyMatcher;
    use warden_domain::{PermissionGrant, RoleName};

    use super::InMemoryPolicyMatcher;

    fn grant(role: &str, resource: &str, action: &str) -> PermissionGrant {
        PermissionGrant::parse(role, resource, action).unwrap_or_else(|_| unreachable!())
    }

    fn roles(names: &[&str]) -> Vec<RoleName> {
        names
            .iter()
            .map(|name| RoleName::new(*name).unwrap_or_else(|_| unreachable!()))
            .collect()
    }

    #[tokio::test]
    async fn exact_grant_matches_only_its_pair() {
        let matcher = InMemoryPolicyMatcher::new();
        let added = matcher.add_grant(&grant("editor", "posts", "write")).await;
        assert!(added.is_ok());

        let editor = roles(&["editor"]);
        assert!(matcher.has_permission(&editor, "posts", "write").await.unwrap_or(false));
        assert!(!matcher.has_permission(&editor, "posts", "delete").await.unwrap_or(true));
        assert!(!matcher.has_permission(&editor, "pages", "write").await.unwrap_or(true));
        assert!(
            !matcher
                .has_permission(&roles(&["viewer"]), "posts", "write")
                .await
                .unwrap_or(true)
        );
    }

    #[tokio::test]
    async fn wildcards_cover_any_value() {
        let matcher = InMemoryPolicyMatcher::new();
        assert!(matcher.add_grant(&grant("admin", "*", "*")).await.is_ok());
        assert!(matcher.add_grant(&grant("auditor", "*", "read")).await.is_ok());

        assert!(
            matcher
                .has_permission(&roles(&["admin"]), "billing", "delete")
                .await
                .unwrap_or(false)
        );
        assert!(
            matcher
                .has_permission(&roles(&["auditor"]), "billing", "read")
                .await
                .unwrap_or(false)
        );
        assert!(
            !matcher
                .has_permission(&roles(&["auditor"]), "billing", "delete")
                .await
                .unwrap_or(true)
        );
    }

    #[tokio::test]
    async fn add_then_remove_restores_previous_answer() {
        let matcher = InMemoryPolicyMatcher::new();
        let viewer = roles(&["viewer"]);
        let read = grant("viewer", "posts", "read");

        assert!(matcher.add_grant(&read).await.is_ok());
        assert!(matcher.add_grant(&read).await.is_ok());
        assert!(matcher.remove_grant(&read).await.is_ok());

        assert!(!matcher.has_permission(&viewer, "posts", "read").await.unwrap_or(true));
    }

    #[tokio::test]
    async fn replace_grants_drops_previous_rules() {
        let matcher = InMemoryPolicyMatcher::new();
        assert!(matcher.add_grant(&grant("viewer", "posts", "read")).await.is_ok());

        let replaced = matcher
            .replace_grants(vec![grant("editor", "posts", "write")])
            .await;
        assert!(replaced.is_ok());

        assert!(
            !matcher
                .has_permission(&roles(&["viewer"]), "posts", "read")
                .await
                .unwrap_or(true)
        );
        assert!(
            matcher
                .has_permission(&roles(&["editor"]), "posts", "write")
                .await
                .unwrap_or(false)
        );
    }
}
