//! PostgREST query parameters for the tables hima uses

use hima_util::{GroupId, InviteCode, UserId};

pub const GROUPS_TABLE: &str = "groups";
pub const MEMBERS_TABLE: &str = "members";

/// Columns of `groups` embedded when listing a user's memberships
const GROUP_EMBED: &str = "group_id,groups(id,name,invite_code,created_at,created_by)";

pub type QueryParams = Vec<(&'static str, String)>;

/// `eq.<value>` filter operand
pub fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// `<base>/rest/v1/<table>`
pub fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

pub fn group_by_id(group_id: &GroupId) -> QueryParams {
    vec![("select", "*".into()), ("id", eq(group_id.as_str()))]
}

pub fn group_by_invite_code(code: &InviteCode) -> QueryParams {
    vec![
        ("select", "*".into()),
        ("invite_code", eq(&code.as_str().to_ascii_uppercase())),
    ]
}

pub fn group_members(group_id: &GroupId) -> QueryParams {
    vec![
        ("select", "*".into()),
        ("group_id", eq(group_id.as_str())),
        ("order", "joined_at.asc".into()),
    ]
}

/// Filter selecting one membership row; also used for PATCH targets
pub fn member_filter(group_id: &GroupId, user_id: &UserId) -> QueryParams {
    vec![("group_id", eq(group_id.as_str())), ("user_id", eq(user_id.as_str()))]
}

pub fn find_member(group_id: &GroupId, user_id: &UserId) -> QueryParams {
    let mut params = vec![("select", "*".to_string())];
    params.extend(member_filter(group_id, user_id));
    params
}

pub fn user_memberships(user_id: &UserId) -> QueryParams {
    vec![("select", GROUP_EMBED.into()), ("user_id", eq(user_id.as_str()))]
}
