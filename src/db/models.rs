use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub picture_path: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl User {
    const COLUMNS: &'static str = "u.id, u.first_name, u.last_name, u.email, u.password_hash, \
                                   u.picture_path, u.occupation, u.location, u.created_at";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            password_hash: row.get(4)?,
            picture_path: row.get(5)?,
            occupation: row.get(6)?,
            location: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM users u WHERE u.id = ?1", Self::COLUMNS),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    /// Email comparison is case-insensitive (the column is `COLLATE NOCASE`).
    pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM users u WHERE u.email = ?1", Self::COLUMNS),
            params![email],
            Self::from_row,
        )
        .optional()
    }

    /// Users this user has added, in the order they were added.
    pub fn friends_of(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM friendships f
             JOIN users u ON u.id = f.friend_id
             WHERE f.user_id = ?1
             ORDER BY f.created_at ASC, f.rowid ASC",
            Self::COLUMNS
        ))?;
        let friends = stmt
            .query_map(params![user_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(friends)
    }

    pub fn members_of(conn: &Connection, space_id: &str) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM space_memberships m
             JOIN users u ON u.id = m.user_id
             WHERE m.space_id = ?1
             ORDER BY m.joined_at ASC, m.rowid ASC",
            Self::COLUMNS
        ))?;
        let members = stmt
            .query_map(params![space_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }
}

/// A post as returned to clients. `user_id` and `created_at` keep their
/// snake_case keys for compatibility with existing front-ends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    #[serde(rename = "user_id")]
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub content: String,
    pub picture_path: Option<String>,
    #[serde(rename = "created_at")]
    pub created_at: String,
    /// Ids of users who liked the post
    pub likes: Vec<String>,
    /// Ids of users who disliked the post
    pub dislikes: Vec<String>,
    pub comment_count: i64,
}

impl Post {
    pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
    }

    pub fn owner_of(conn: &Connection, id: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
    }

    /// Newest first. `author` restricts the list to one user's posts.
    pub fn list(conn: &Connection, author: Option<&str>) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.user_id, p.first_name, p.last_name, p.content, p.picture_path,
                    p.created_at,
                    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
             FROM posts p
             WHERE ?1 IS NULL OR p.user_id = ?1
             ORDER BY p.created_at DESC, p.rowid DESC",
        )?;

        let mut posts = stmt
            .query_map(params![author], |row| {
                Ok(Post {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    content: row.get(4)?,
                    picture_path: row.get(5)?,
                    created_at: row.get(6)?,
                    likes: Vec::new(),
                    dislikes: Vec::new(),
                    comment_count: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for post in &mut posts {
            post.likes = reaction_user_ids(conn, "post_likes", &post.id)?;
            post.dislikes = reaction_user_ids(conn, "post_dislikes", &post.id)?;
        }

        Ok(posts)
    }
}

fn reaction_user_ids(
    conn: &Connection,
    table: &str,
    post_id: &str,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT user_id FROM {} WHERE post_id = ?1 ORDER BY created_at ASC, rowid ASC",
        table
    ))?;
    let ids = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub content: String,
    pub created_at: String,
}

impl Comment {
    const SELECT: &'static str = "SELECT c.id, c.post_id, c.user_id, u.first_name, u.last_name,
                                         c.content, c.created_at
                                  FROM comments c
                                  JOIN users u ON u.id = c.user_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            content: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("{} WHERE c.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    /// Oldest first.
    pub fn for_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.rowid ASC",
            Self::SELECT
        ))?;
        let comments = stmt
            .query_map(params![post_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: String,
    pub title: String,
    pub is_public: bool,
    pub creator_id: String,
    pub created_at: String,
    pub member_count: i64,
}

impl Space {
    const SELECT: &'static str = "SELECT s.id, s.title, s.is_public, s.creator_id, s.created_at,
                                         (SELECT COUNT(*) FROM space_memberships m
                                          WHERE m.space_id = s.id) AS member_count
                                  FROM spaces s";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            is_public: row.get(2)?,
            creator_id: row.get(3)?,
            created_at: row.get(4)?,
            member_count: row.get(5)?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("{} WHERE s.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY s.created_at DESC, s.rowid DESC",
            Self::SELECT
        ))?;
        let spaces = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(spaces)
    }

    /// Spaces the user is a member of, including the ones they created.
    pub fn joined_by(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} JOIN space_memberships j ON j.space_id = s.id
             WHERE j.user_id = ?1
             ORDER BY j.joined_at ASC, j.rowid ASC",
            Self::SELECT
        ))?;
        let spaces = stmt
            .query_map(params![user_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(spaces)
    }

    pub fn is_member(conn: &Connection, space_id: &str, user_id: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM space_memberships WHERE space_id = ?1 AND user_id = ?2",
            params![space_id, user_id],
            |row| row.get(0),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub id: String,
    pub user_id: String,
    pub space_id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Discussion {
    const SELECT: &'static str = "SELECT d.id, d.user_id, d.space_id, d.title, d.content,
                                         d.created_at, d.updated_at
                                  FROM discussions d";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            space_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("{} WHERE d.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    /// Newest first.
    pub fn in_space(conn: &Connection, space_id: &str) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE d.space_id = ?1 ORDER BY d.created_at DESC, d.rowid DESC",
            Self::SELECT
        ))?;
        let discussions = stmt
            .query_map(params![space_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(discussions)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionComment {
    pub id: String,
    pub user_id: String,
    pub space_id: String,
    pub discussion_id: String,
    /// Title of the discussion at the time the comment was written
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl DiscussionComment {
    const SELECT: &'static str = "SELECT id, user_id, space_id, discussion_id, title, content,
                                         created_at
                                  FROM discussion_comments";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            space_id: row.get(2)?,
            discussion_id: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!("{} WHERE id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    /// Oldest first.
    pub fn for_discussion(conn: &Connection, discussion_id: &str) -> rusqlite::Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE discussion_id = ?1 ORDER BY created_at ASC, rowid ASC",
            Self::SELECT
        ))?;
        let comments = stmt
            .query_map(params![discussion_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}
