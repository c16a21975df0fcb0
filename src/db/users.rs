use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Role, User};
use crate::error::{AppError, AppResult};

/// Fields needed to register a user; also what an OAuth2 provider hands back.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub image: String,
    pub bio: String,
}

const USER_COLUMNS: &str = "id, name, email, image, role, bio";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        role: row.get(4)?,
        bio: row.get(5)?,
    })
}

pub fn find_user(conn: &Connection, user_id: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// Like [`find_user`] but an unknown id is a `NotFound`.
pub fn require_user(conn: &Connection, user_id: i64) -> AppResult<User> {
    find_user(conn, user_id)?.ok_or(AppError::NotFound)
}

pub fn create_user(conn: &Connection, user: &NewUser) -> AppResult<User> {
    conn.execute(
        "INSERT INTO users (name, email, image, role, bio) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.name, user.email, user.image, Role::User, user.bio],
    )?;
    require_user(conn, conn.last_insert_rowid())
}

/// Register the user on first login, refresh name and avatar afterwards.
/// Bio is never touched by a login.
pub fn upsert_by_email(conn: &Connection, profile: &NewUser) -> AppResult<User> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?1",
            params![profile.email],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE users SET name = ?1, image = ?2 WHERE id = ?3",
                params![profile.name, profile.image, id],
            )?;
            require_user(conn, id)
        }
        None => create_user(conn, profile),
    }
}
