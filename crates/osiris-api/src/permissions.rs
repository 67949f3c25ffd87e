use osiris_db::Database;
use osiris_types::models::CommunityRole;

use crate::convert;

/// Admin flag and community role of `user_id`, read together for permission checks.
pub(crate) fn standing(
    db: &Database,
    user_id: &str,
    community_id: Option<&str>,
) -> anyhow::Result<(bool, Option<CommunityRole>)> {
    let is_admin = db.get_user(user_id)?.is_some_and(|u| u.is_admin);
    let role = match community_id {
        Some(community_id) => db
            .get_membership(community_id, user_id)?
            .as_deref()
            .map(convert::parse::<CommunityRole>)
            .transpose()?,
        None => None,
    };
    Ok((is_admin, role))
}

/// Who is acting, and how they relate to the community the content lives in.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub user_id: &'a str,
    pub is_admin: bool,
    /// Role in the relevant community; `None` for non-members or content outside communities.
    pub role: Option<CommunityRole>,
}

impl Actor<'_> {
    fn is_staff(&self) -> bool {
        self.role.is_some_and(|r| r.is_staff())
    }
}

/// Authors, admins, and staff of the content's community may delete it.
pub fn can_delete_content(actor: &Actor<'_>, author_id: &str) -> bool {
    actor.user_id == author_id || can_moderate_community(actor)
}

pub fn can_moderate_community(actor: &Actor<'_>) -> bool {
    actor.is_admin || actor.is_staff()
}

/// Owners may ban anyone but themselves. Moderators may only ban members
/// and outsiders.
pub fn can_ban(actor_role: Option<CommunityRole>, target_role: Option<CommunityRole>) -> bool {
    match (actor_role, target_role) {
        (_, Some(CommunityRole::Owner)) => false,
        (Some(CommunityRole::Owner), _) => true,
        (Some(CommunityRole::Moderator), None | Some(CommunityRole::Member)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Option<CommunityRole>, is_admin: bool) -> Actor<'static> {
        Actor {
            user_id: "actor",
            is_admin,
            role,
        }
    }

    #[test]
    fn authors_and_staff_delete_content() {
        assert!(can_delete_content(&actor(None, false), "actor"));
        assert!(!can_delete_content(&actor(None, false), "someone"));
        assert!(!can_delete_content(&actor(Some(CommunityRole::Member), false), "someone"));
        assert!(can_delete_content(&actor(Some(CommunityRole::Moderator), false), "someone"));
        assert!(can_delete_content(&actor(Some(CommunityRole::Owner), false), "someone"));
        assert!(can_delete_content(&actor(None, true), "someone"));
    }

    #[test]
    fn moderation_needs_staff_or_admin() {
        assert!(!can_moderate_community(&actor(Some(CommunityRole::Member), false)));
        assert!(can_moderate_community(&actor(Some(CommunityRole::Moderator), false)));
        assert!(can_moderate_community(&actor(None, true)));
    }

    #[test]
    fn ban_hierarchy() {
        use CommunityRole::*;
        assert!(can_ban(Some(Owner), Some(Moderator)));
        assert!(can_ban(Some(Owner), None));
        assert!(!can_ban(Some(Owner), Some(Owner)));
        assert!(can_ban(Some(Moderator), Some(Member)));
        assert!(can_ban(Some(Moderator), None));
        assert!(!can_ban(Some(Moderator), Some(Moderator)));
        assert!(!can_ban(Some(Member), Some(Member)));
        assert!(!can_ban(None, None));
    }
}
