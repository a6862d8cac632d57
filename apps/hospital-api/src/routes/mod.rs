//! Rotas HTTP agrupadas por recurso

pub mod appointments;
pub mod dashboard;
pub mod messages;
pub mod users;
