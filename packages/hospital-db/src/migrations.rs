//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_users.sql
    r#"
    -- Chave de dados embrulhada com a frase secreta do servidor
    CREATE TABLE IF NOT EXISTS master_keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TIMESTAMP NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 0,
        wrapped_key_ciphertext BLOB NOT NULL,
        wrapped_key_nonce BLOB NOT NULL,
        kdf_salt BLOB NOT NULL,
        key_version INTEGER NOT NULL
    );

    -- Pacientes, médicos e administradores
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        nic_ciphertext BLOB NOT NULL,
        nic_nonce BLOB NOT NULL,
        dob DATE NOT NULL,
        gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female')),
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('Patient', 'Doctor', 'Admin')),
        doctor_department TEXT,
        avatar_public_id TEXT,
        avatar_url TEXT,
        doc_avatar_public_id TEXT,
        doc_avatar_url TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_users_role ON users (role);
    CREATE INDEX IF NOT EXISTS idx_users_doctor_lookup
        ON users (role, first_name, last_name, doctor_department);
    "#,
    // 002_appointments_messages.sql
    r#"
    -- Consultas. doctor_id e patient_id não têm chave estrangeira:
    -- o histórico sobrevive à remoção do usuário.
    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        nic_ciphertext BLOB NOT NULL,
        nic_nonce BLOB NOT NULL,
        dob DATE NOT NULL,
        gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female')),
        appointment_date DATE NOT NULL,
        department TEXT NOT NULL,
        doctor_first_name TEXT NOT NULL,
        doctor_last_name TEXT NOT NULL,
        doctor_id BLOB NOT NULL,
        patient_id BLOB NOT NULL,
        has_visited BOOLEAN NOT NULL DEFAULT 0,
        address TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Pending'
            CHECK (status IN ('Pending', 'Accepted', 'Rejected'))
    );

    -- Mensagens do formulário de contato
    CREATE TABLE IF NOT EXISTS messages (
        id BLOB PRIMARY KEY NOT NULL,
        created_at TIMESTAMP NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        message TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_appointments_doctor_id ON appointments (doctor_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    CREATE INDEX IF NOT EXISTS idx_appointments_created_at ON appointments (created_at);
    CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at);
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool.begin().await.with_context(|| {
            format!("Falha ao iniciar transação para migração {}", migration_version)
        })?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.with_context(|| {
            format!("Falha ao confirmar transação para migração {}", migration_version)
        })?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}
