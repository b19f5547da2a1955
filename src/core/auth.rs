//! Authorization predicates
//!
//! The adapter does not evaluate permissions on its own. Each model (and each
//! action of that model) is bound to a predicate of shape
//! `(actor, verb, target) -> bool` supplied by the host. Models without a
//! predicate deny everything; namespaces allow everything.
//!
//! [`AuthPolicy`], [`policy_check`] and [`basic_auth_check`] are ready-made
//! predicate builders.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The fixed operation vocabulary exposed per model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
    Call,
    Describe,
}

impl Verb {
    /// Verbs that touch stored instances
    pub const CRUD: [Verb; 5] = [Verb::List, Verb::Get, Verb::Create, Verb::Update, Verb::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::List => "LIST",
            Verb::Create => "CREATE",
            Verb::Update => "UPDATE",
            Verb::Delete => "DELETE",
            Verb::Call => "CALL",
            Verb::Describe => "DESCRIBE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The actor performing a request, as established by the server layer
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// Authenticated user
    User {
        user_id: Uuid,
        roles: Vec<String>,
        /// Permission codes such as `inventory.view_widget`
        permissions: HashSet<String>,
    },

    /// Service-to-service communication
    Service { service_name: String },

    /// System administrator
    Admin { admin_id: Uuid },

    /// No authentication (public access)
    Anonymous,
}

impl AuthContext {
    /// Check if context represents an admin
    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    /// Check if context represents a service
    pub fn is_service(&self) -> bool {
        matches!(self, AuthContext::Service { .. })
    }

    /// Get user_id if available
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    /// Admins hold every permission
    pub fn has_perm(&self, permission: &str) -> bool {
        match self {
            AuthContext::User { permissions, .. } => permissions.contains(permission),
            AuthContext::Admin { .. } => true,
            _ => false,
        }
    }
}

/// What a request is aimed at
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthTarget<'a> {
    /// Instance ids the verb applies to (empty for LIST/CREATE/DESCRIBE)
    pub id_list: &'a [String],
    /// Action name for CALL
    pub action: Option<&'a str>,
}

impl<'a> AuthTarget<'a> {
    pub fn ids(id_list: &'a [String]) -> Self {
        Self {
            id_list,
            action: None,
        }
    }
}

/// Predicate deciding whether `actor` may apply `verb` to `target`
pub type CheckAuth = Arc<dyn Fn(&AuthContext, Verb, &AuthTarget<'_>) -> bool + Send + Sync>;

/// Predicate that allows everything
pub fn check_auth_true() -> CheckAuth {
    Arc::new(|_: &AuthContext, _: Verb, _: &AuthTarget<'_>| true)
}

/// Predicate that denies everything
pub fn check_auth_false() -> CheckAuth {
    Arc::new(|_: &AuthContext, _: Verb, _: &AuthTarget<'_>| false)
}

/// Permission-code based predicate for one model
///
/// CALL and DESCRIBE are always allowed. GET and LIST require
/// `<app>.view_<model>`, CREATE `<app>.add_<model>`, UPDATE
/// `<app>.change_<model>` and DELETE `<app>.delete_<model>`.
pub fn basic_auth_check(app_label: &str, model_name: &str) -> CheckAuth {
    let app = app_label.to_string();
    let model = model_name.to_lowercase();
    Arc::new(move |actor: &AuthContext, verb: Verb, _: &AuthTarget<'_>| {
        let action = match verb {
            Verb::Call | Verb::Describe => return true,
            Verb::Get | Verb::List => "view",
            Verb::Create => "add",
            Verb::Update => "change",
            Verb::Delete => "delete",
        };
        actor.has_perm(&format!("{}.{}_{}", app, action, model))
    })
}

/// Authorization policy for an operation
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any authenticated user
    Authenticated,

    /// User must have one of these roles
    HasRole(Vec<String>),

    /// Service-to-service only
    ServiceOnly,

    /// Admin only
    AdminOnly,

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom policy function
    Custom(fn(&AuthContext) -> bool),
}

impl AuthPolicy {
    /// Check if auth context satisfies this policy
    pub fn check(&self, context: &AuthContext) -> bool {
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Authenticated => !matches!(context, AuthContext::Anonymous),

            AuthPolicy::HasRole(required_roles) => match context {
                AuthContext::User { roles, .. } => required_roles.iter().any(|r| roles.contains(r)),
                _ => false,
            },

            AuthPolicy::ServiceOnly => context.is_service(),

            AuthPolicy::AdminOnly => context.is_admin(),

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(context)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(context)),

            AuthPolicy::Custom(f) => f(context),
        }
    }

    /// Parse policy from string (for YAML config)
    pub fn parse_policy(s: &str) -> Self {
        match s {
            "public" => AuthPolicy::Public,
            "authenticated" => AuthPolicy::Authenticated,
            "service_only" => AuthPolicy::ServiceOnly,
            "admin_only" => AuthPolicy::AdminOnly,
            s if s.starts_with("role:") => {
                AuthPolicy::HasRole(vec![s.trim_start_matches("role:").to_string()])
            }
            _ => AuthPolicy::Authenticated,
        }
    }

    /// Apply this policy to `verbs`; every other verb is denied
    pub fn for_verbs(self, verbs: &[Verb]) -> CheckAuth {
        let verbs: Vec<Verb> = verbs.to_vec();
        Arc::new(move |actor: &AuthContext, verb: Verb, _: &AuthTarget<'_>| {
            verbs.contains(&verb) && self.check(actor)
        })
    }

    /// Apply this policy to every verb
    pub fn into_check(self) -> CheckAuth {
        Arc::new(move |actor: &AuthContext, _: Verb, _: &AuthTarget<'_>| self.check(actor))
    }
}

/// Predicate from configured policy strings, one per verb
///
/// Verbs without a policy are denied.
pub fn policy_check(policies: &IndexMap<Verb, String>) -> CheckAuth {
    let policies: HashMap<Verb, AuthPolicy> = policies
        .iter()
        .map(|(verb, policy)| (*verb, AuthPolicy::parse_policy(policy)))
        .collect();
    Arc::new(move |actor: &AuthContext, verb: Verb, _: &AuthTarget<'_>| {
        policies.get(&verb).is_some_and(|policy| policy.check(actor))
    })
}
