//! Diretório de usuários
//!
//! Operações de leitura e escrita de pacientes, médicos e administradores.
//! O e-mail é único entre todos os papéis (restrição UNIQUE na tabela).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{ImageRef, NewUser, Role, User, UserChanges};
use crate::Store;

const USER_COLUMNS: &str = "id, created_at, first_name, last_name, email, phone, nic_ciphertext, \
     nic_nonce, dob, gender, password_hash, role, doctor_department, avatar_public_id, \
     avatar_url, doc_avatar_public_id, doc_avatar_url";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    nic_ciphertext: Vec<u8>,
    nic_nonce: Vec<u8>,
    dob: NaiveDate,
    gender: String,
    password_hash: String,
    role: String,
    doctor_department: Option<String>,
    avatar_public_id: Option<String>,
    avatar_url: Option<String>,
    doc_avatar_public_id: Option<String>,
    doc_avatar_url: Option<String>,
}

fn image_ref(public_id: Option<String>, url: Option<String>) -> Option<ImageRef> {
    match (public_id, url) {
        (Some(public_id), Some(url)) => Some(ImageRef { public_id, url }),
        _ => None,
    }
}

impl Store {
    fn user_from_row(&self, row: UserRow) -> Result<User, DbError> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            nic: self.open_sealed(row.nic_ciphertext, row.nic_nonce)?,
            dob: row.dob,
            gender: row.gender.parse()?,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            doctor_department: row.doctor_department,
            avatar: image_ref(row.avatar_public_id, row.avatar_url),
            doc_avatar: image_ref(row.doc_avatar_public_id, row.doc_avatar_url),
            created_at: row.created_at,
        })
    }

    fn users_from_rows(&self, rows: Vec<UserRow>) -> Result<Vec<User>, DbError> {
        rows.into_iter().map(|row| self.user_from_row(row)).collect()
    }

    /// Cria um usuário. E-mail repetido resulta em `DbError::ConstraintViolation`.
    pub async fn create_user(&self, new: NewUser) -> Result<User, DbError> {
        let user = User {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            nic: new.nic,
            dob: new.dob,
            gender: new.gender,
            password_hash: new.password_hash,
            role: new.role,
            doctor_department: new.doctor_department,
            avatar: None,
            doc_avatar: new.doc_avatar,
            created_at: Utc::now(),
        };
        let nic = self.seal(&user.nic)?;

        sqlx::query(
            "INSERT INTO users
             (id, created_at, first_name, last_name, email, phone, nic_ciphertext, nic_nonce,
              dob, gender, password_hash, role, doctor_department, avatar_public_id, avatar_url,
              doc_avatar_public_id, doc_avatar_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(user.created_at)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&nic.ciphertext)
        .bind(&nic.nonce)
        .bind(user.dob)
        .bind(user.gender.as_str())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.doctor_department)
        .bind(user.avatar.as_ref().map(|a| a.public_id.clone()))
        .bind(user.avatar.as_ref().map(|a| a.url.clone()))
        .bind(user.doc_avatar.as_ref().map(|a| a.public_id.clone()))
        .bind(user.doc_avatar.as_ref().map(|a| a.url.clone()))
        .execute(self.pool())
        .await?;

        debug!("Usuário {} criado com papel {}", user.id, user.role);
        Ok(user)
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;

        row.map(|row| self.user_from_row(row)).transpose()
    }

    /// Busca por id exigindo o papel informado; papel diferente equivale a não encontrado
    pub async fn find_user_with_role(&self, id: Uuid, role: Role) -> Result<Option<User>, DbError> {
        Ok(self.find_user(id).await?.filter(|user| user.role == role))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                .bind(email)
                .fetch_optional(self.pool())
                .await?;

        row.map(|row| self.user_from_row(row)).transpose()
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(self.pool())
            .await?;
        Ok(count > 0)
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, DbError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE role = ? ORDER BY created_at ASC, rowid ASC",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(self.pool())
        .await?;

        self.users_from_rows(rows)
    }

    /// Médicos com o nome e o departamento informados
    pub async fn find_doctors(
        &self,
        first_name: &str,
        last_name: &str,
        department: &str,
    ) -> Result<Vec<User>, DbError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users
             WHERE role = 'Doctor' AND first_name = ? AND last_name = ? AND doctor_department = ?",
            USER_COLUMNS
        ))
        .bind(first_name)
        .bind(last_name)
        .bind(department)
        .fetch_all(self.pool())
        .await?;

        self.users_from_rows(rows)
    }

    /// Aplica alterações parciais; devolve `None` se o usuário não existir
    pub async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, DbError> {
        let Some(mut user) = self.find_user(id).await? else {
            return Ok(None);
        };
        changes.apply(&mut user);
        let nic = self.seal(&user.nic)?;

        sqlx::query(
            "UPDATE users SET
             first_name = ?, last_name = ?, email = ?, phone = ?, nic_ciphertext = ?,
             nic_nonce = ?, dob = ?, gender = ?, doctor_department = ?, avatar_public_id = ?,
             avatar_url = ?, doc_avatar_public_id = ?, doc_avatar_url = ?
             WHERE id = ?",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&nic.ciphertext)
        .bind(&nic.nonce)
        .bind(user.dob)
        .bind(user.gender.as_str())
        .bind(&user.doctor_department)
        .bind(user.avatar.as_ref().map(|a| a.public_id.clone()))
        .bind(user.avatar.as_ref().map(|a| a.url.clone()))
        .bind(user.doc_avatar.as_ref().map(|a| a.public_id.clone()))
        .bind(user.doc_avatar.as_ref().map(|a| a.url.clone()))
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(Some(user))
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove o usuário; devolve `false` se o id não existir
    pub async fn delete_user(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_users_by_role(&self, role: Role) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
