use rusqlite::{params, OptionalExtension, Row};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use uuid::Uuid;

use super::{enum_col, fmt_ts, is_unique_violation, now, parse_ts, ts_col, Database};
use crate::error::{Error, Result};
use crate::models::*;

const USER_COLUMNS: &str = "id, username, email, nombre, apellido, rol, activo, created_at";

/// Argon2id hash of a password in PHC string format.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(Error::PasswordHash)?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(Error::PasswordHash)?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .is_ok_and(|hash| Argon2::default().verify_password(password.as_bytes(), &hash).is_ok())
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        nombre: row.get(3)?,
        apellido: row.get(4)?,
        rol: enum_col(row, 5, Role::from_str)?,
        activo: row.get(6)?,
        created_at: ts_col(row, 7)?,
    })
}

impl Database {
    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        if input.username.trim().is_empty() || input.password.is_empty() {
            return Err(Error::validation("username y password son requeridos"));
        }
        if input.nombre.trim().is_empty() || input.apellido.trim().is_empty() {
            return Err(Error::validation("nombre y apellido son requeridos"));
        }

        let hash = hash_password(&input.password)?;
        let ts = fmt_ts(now());

        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT INTO usuarios (username, email, password_hash, nombre, apellido, rol, activo, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                input.username.trim(),
                input.email.trim(),
                hash,
                input.nombre,
                input.apellido,
                input.rol.as_str(),
                ts
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::validation("el usuario o email ya existe"));
            }
            Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        drop(conn);

        tracing::info!(user_id = id, rol = input.rol.as_str(), "Created user {}", input.username);
        self.get_user(id)?.ok_or(Error::NotFound("usuario"))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = ?1"),
                [id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM usuarios WHERE username = ?1"),
                [username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM usuarios ORDER BY id"))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Active users holding `role`, for assignment pickers.
    pub fn list_active_by_role(&self, role: Role) -> Result<Vec<UserSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, nombre, apellido FROM usuarios
             WHERE rol = ?1 AND activo = 1 ORDER BY apellido, nombre",
        )?;
        let users = stmt
            .query_map([role.as_str()], |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    nombre: row.get(1)?,
                    apellido: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Deactivates a user and revokes their sessions. Returns false if no such user.
    pub fn deactivate_user(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE usuarios SET activo = 0, updated_at = ?1 WHERE id = ?2",
            params![fmt_ts(now()), id],
        )?;
        tx.execute("DELETE FROM sesiones WHERE usuario_id = ?1", [id])?;
        tx.commit()?;
        if changed > 0 {
            tracing::info!(user_id = id, "Deactivated user");
        }
        Ok(changed > 0)
    }

    /// Creates the `admin` account if no administrator exists yet.
    pub fn seed_admin(&self, password: &str) -> Result<bool> {
        let exists: bool = {
            let conn = self.conn();
            conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM usuarios WHERE rol = 'admin')",
                [],
                |row| row.get(0),
            )?
        };
        if exists {
            return Ok(false);
        }
        self.create_user(CreateUserInput {
            username: "admin".into(),
            email: "admin@construccion.com".into(),
            password: password.into(),
            nombre: "Administrador".into(),
            apellido: "Sistema".into(),
            rol: Role::Admin,
        })?;
        Ok(true)
    }

    /// Verifies credentials and issues a bearer token.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginSession> {
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT id, password_hash FROM usuarios WHERE username = ?1 AND activo = 1",
                [username],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((user_id, stored)) = found else {
            tracing::debug!("Login rejected for unknown user {}", username);
            return Err(Error::Unauthenticated);
        };
        if !verify_password(password, &stored) {
            tracing::debug!(user_id, "Login rejected: bad password");
            return Err(Error::Unauthenticated);
        }

        let token = Uuid::new_v4().simple().to_string();
        let created = now();
        let expires_at = created + self.config.token_ttl;
        conn.execute(
            "INSERT INTO sesiones (token, usuario_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, fmt_ts(created), fmt_ts(expires_at)],
        )?;
        drop(conn);

        let user = self.get_user(user_id)?.ok_or(Error::NotFound("usuario"))?;
        tracing::info!(user_id, "User logged in");
        Ok(LoginSession {
            token,
            user,
            expires_at,
        })
    }

    /// Resolves a bearer token to its active, unexpired user.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT s.expires_at, s.usuario_id FROM sesiones s
                 JOIN usuarios u ON u.id = s.usuario_id
                 WHERE s.token = ?1 AND u.activo = 1",
                [token],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        drop(conn);

        let Some((expires_at, user_id)) = found else {
            return Err(Error::Unauthenticated);
        };
        if parse_ts(0, &expires_at)? <= now() {
            self.logout(token)?;
            return Err(Error::Unauthenticated);
        }
        self.get_user(user_id)?.ok_or(Error::Unauthenticated)
    }

    pub fn logout(&self, token: &str) -> Result<()> {
        self.conn().execute("DELETE FROM sesiones WHERE token = ?1", [token])?;
        Ok(())
    }
}
