//! Recipient resolution: turns a `RecipientPolicy` into concrete user ids.

use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::types::{RecipientPolicy, User};

pub struct RecipientResolver;

impl RecipientResolver {
    /// Resolve `policy` against the tenant's users.
    ///
    /// Only active users are returned. Order: role matches (in user order), then
    /// explicit ids (in policy order), then the actor. Duplicates are dropped.
    pub fn resolve(policy: &RecipientPolicy, users: &[User], actor_id: Option<Uuid>) -> Vec<Uuid> {
        let mut resolved: Vec<Uuid> = Vec::new();
        let mut push = |id: Uuid| {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        };

        for user in users.iter().filter(|u| u.active) {
            if policy.roles.contains(&user.role) {
                push(user.id);
            }
        }

        for id in &policy.user_ids {
            if users.iter().any(|u| u.id == *id && u.active) {
                push(*id);
            }
        }

        if policy.include_actor
            && let Some(actor) = actor_id
            && users.iter().any(|u| u.id == actor && u.active)
        {
            push(actor);
        }

        resolved
    }

    /// Load the tenant's users and resolve `policy` against them.
    pub async fn resolve_for_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        policy: &RecipientPolicy,
        actor_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Uuid>> {
        if policy.is_empty() {
            return Ok(Vec::new());
        }

        let users: Vec<User> = sqlx::query_as(
            "SELECT * FROM users WHERE tenant_id = $1 AND active = true ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;

        Ok(Self::resolve(policy, &users, actor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_common::types::UserRole;
    use chrono::Utc;

    fn user(role: UserRole, active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            email: format!("{}@example.com", Uuid::new_v4()),
            display_name: "Test".to_string(),
            password_hash: String::new(),
            role,
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_roles_then_ids_then_actor() {
        let captain = user(UserRole::Captain, true);
        let chief = user(UserRole::ChiefEngineer, true);
        let deckhand = user(UserRole::Crew, true);
        let users = vec![captain.clone(), chief.clone(), deckhand.clone()];

        let policy = RecipientPolicy {
            roles: vec![UserRole::ChiefEngineer],
            user_ids: vec![captain.id],
            include_actor: true,
        };

        let resolved = RecipientResolver::resolve(&policy, &users, Some(deckhand.id));
        assert_eq!(resolved, vec![chief.id, captain.id, deckhand.id]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let captain = user(UserRole::Captain, true);
        let users = vec![captain.clone()];
        let policy = RecipientPolicy {
            roles: vec![UserRole::Captain],
            user_ids: vec![captain.id, captain.id],
            include_actor: true,
        };
        assert_eq!(
            RecipientResolver::resolve(&policy, &users, Some(captain.id)),
            vec![captain.id]
        );
    }

    #[test]
    fn test_inactive_and_unknown_dropped() {
        let retired = user(UserRole::Engineer, false);
        let users = vec![retired.clone()];
        let policy = RecipientPolicy {
            roles: vec![UserRole::Engineer],
            user_ids: vec![retired.id, Uuid::new_v4()],
            include_actor: true,
        };
        assert!(RecipientResolver::resolve(&policy, &users, Some(retired.id)).is_empty());
    }

    #[test]
    fn test_actor_excluded_unless_requested() {
        let crew = user(UserRole::Crew, true);
        let users = vec![crew.clone()];
        let policy = RecipientPolicy::default();
        assert!(RecipientResolver::resolve(&policy, &users, Some(crew.id)).is_empty());
    }
}
