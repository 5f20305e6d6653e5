//! Profile CRUD operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::now_rfc3339;
use crate::error::{AtelierError, Result};

/// Creative states a profile can sit in. Feed discovery compares these.
pub const CREATIVE_STATES: [&str; 5] = ["Idea", "Blocked", "Flow", "Revision", "Resting"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub disciplines: Vec<String>,
    pub current_state: String,
    pub avatar_url: Option<String>,
    pub plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    pub updated_at: String,
}

impl ProfileRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let disciplines_json: String = row.get("disciplines")?;
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            full_name: row.get("full_name")?,
            bio: row.get("bio")?,
            disciplines: serde_json::from_str(&disciplines_json).unwrap_or_default(),
            current_state: row.get("current_state")?,
            avatar_url: row.get("avatar_url")?,
            plan: row.get("plan")?,
            stripe_customer_id: row.get("stripe_customer_id")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields a profile owner may update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub disciplines: Option<Vec<String>>,
    pub current_state: Option<String>,
    pub avatar_url: Option<String>,
}

/// Create the profile row that pairs with a new account.
pub fn create_profile(conn: &Connection, id: &str, username: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, username, updated_at) VALUES (?1, ?2, ?3)",
        params![id, username, now_rfc3339()],
    )
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            AtelierError::Conflict(format!("Username taken: {}", username.unwrap_or("")))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<ProfileRow>> {
    conn.query_row(
        "SELECT * FROM profiles WHERE id = ?1",
        params![id],
        ProfileRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_profile_by_username(conn: &Connection, username: &str) -> Result<Option<ProfileRow>> {
    conn.query_row(
        "SELECT * FROM profiles WHERE username = ?1",
        params![username],
        ProfileRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn update_profile(conn: &Connection, id: &str, update: &ProfileUpdate) -> Result<ProfileRow> {
    if let Some(state) = &update.current_state {
        if !CREATIVE_STATES.contains(&state.as_str()) {
            return Err(AtelierError::Invalid(format!(
                "Unknown creative state: {}",
                state
            )));
        }
    }

    let existing = get_profile(conn, id)?
        .ok_or_else(|| AtelierError::NotFound(format!("Profile {}", id)))?;

    let disciplines = update
        .disciplines
        .clone()
        .unwrap_or(existing.disciplines);
    let disciplines_json = serde_json::to_string(&disciplines)?;

    conn.execute(
        "UPDATE profiles SET
            username = ?2, full_name = ?3, bio = ?4, disciplines = ?5,
            current_state = ?6, avatar_url = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            update.username.as_ref().or(existing.username.as_ref()),
            update.full_name.as_ref().or(existing.full_name.as_ref()),
            update.bio.as_ref().or(existing.bio.as_ref()),
            disciplines_json,
            update
                .current_state
                .as_ref()
                .unwrap_or(&existing.current_state),
            update.avatar_url.as_ref().or(existing.avatar_url.as_ref()),
            now_rfc3339(),
        ],
    )
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            AtelierError::Conflict("Username taken".into())
        } else {
            e.into()
        }
    })?;

    get_profile(conn, id)?.ok_or_else(|| AtelierError::Internal("Profile vanished".into()))
}

/// Substring search over username and full name, capped at 5 rows.
pub fn search_profiles(conn: &Connection, query: &str) -> Result<Vec<ProfileRow>> {
    let pattern = format!("%{}%", query);
    let mut stmt = conn.prepare(
        "SELECT * FROM profiles
         WHERE username LIKE ?1 OR full_name LIKE ?1
         ORDER BY username LIMIT 5",
    )?;
    let rows = stmt
        .query_map(params![pattern], ProfileRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_plan(conn: &Connection, id: &str, plan: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET plan = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, plan, now_rfc3339()],
    )?;
    Ok(())
}

pub fn set_stripe_customer(conn: &Connection, id: &str, customer_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET stripe_customer_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, customer_id, now_rfc3339()],
    )?;
    Ok(())
}

/// Reverse lookup for webhook events, which only carry the customer id.
pub fn get_profile_by_stripe_customer(
    conn: &Connection,
    customer_id: &str,
) -> Result<Option<ProfileRow>> {
    conn.query_row(
        "SELECT * FROM profiles WHERE stripe_customer_id = ?1",
        params![customer_id],
        ProfileRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}
